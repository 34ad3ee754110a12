//! Unit tests for the module data model

use crate::*;

fn one_track_module() -> Module {
    let mut song = SubSong {
        channels: 1,
        ..SubSong::default()
    };
    song.tracks.push(Track::empty(4));
    song.order_lists.push(OrderList::from_tracks(&[0]));

    let mut instr = Instrument::default();
    instr.samples.push(Sample::from_pcm16(vec![0i16; 64], 8363));

    Module {
        name: "test".to_string(),
        sub_songs: vec![song],
        instruments: vec![instr],
    }
}

#[test]
fn validate_accepts_consistent_module() {
    assert!(one_track_module().validate().is_ok());
}

#[test]
fn validate_rejects_missing_track() {
    let mut module = one_track_module();
    module.sub_songs[0].order_lists[0]
        .entries
        .push(OrderEntry::new(7));
    assert!(matches!(
        module.validate(),
        Err(ModuleError::BadTrackRef(7))
    ));
}

#[test]
fn validate_rejects_loop_past_end() {
    let mut module = one_track_module();
    let sample = &mut module.instruments[0].samples[0];
    sample.flags |= SampleFlags::LOOP;
    sample.repeat_start = 60;
    sample.repeat_length = 16;
    assert!(matches!(
        module.validate(),
        Err(ModuleError::InInstrument { number: 1, .. })
    ));
}

#[test]
fn instrument_lookup_is_one_based() {
    let module = one_track_module();
    assert!(module.instrument(0).is_none());
    assert!(module.instrument(1).is_some());
    assert!(module.instrument(2).is_none());
}

#[test]
fn keyboard_defaults_to_identity_mapping() {
    let instr = Instrument::default();
    let entry = instr.keyboard_entry(4 * 12 + 9).unwrap();
    assert_eq!(entry.sample, 1);
    assert_eq!(entry.note, 4 * 12 + 10);
}

#[test]
fn synth_instruction_packs_src_dst() {
    let insn = SynthInstruction::new(3, 0xA, 0x5, 0x1234);
    assert_eq!(insn.src(), 0xA);
    assert_eq!(insn.dst(), 0x5);
    assert_eq!(insn.data, 0x1234);
}

#[test]
fn pcm_frame_widens_8_bit() {
    let pcm = PcmData::Mono8(vec![0x40, -0x40]);
    assert_eq!(pcm.frame(0), 0x4000);
    assert_eq!(pcm.frame(1), -0x4000);
    assert_eq!(pcm.frame(2), 0);
}

//! Unit tests for the playback engine

use nether_seq::{
    fx, note, op, Instrument, Module, OrderList, Sample, SubSong, SynthInstruction, SynthProgram,
    Track, TrackRow,
};

use crate::engine::{HookFlags, Player, PlayerHook};
use crate::mixer::{MixerChannelFlags, NullMixer};
use crate::tables::{linear_slide_up, note_frequency};

fn tone_sample(rate: u32) -> Sample {
    Sample::from_pcm16(vec![0x4000i16; 64], rate)
}

/// One-channel module over the given rows, one instrument, one sample
fn simple_module(rows: Vec<TrackRow>) -> Module {
    let mut song = SubSong {
        channels: 1,
        ..SubSong::default()
    };
    let len = rows.len() as u16;
    song.tracks.push(Track {
        rows,
        last_row: len.saturating_sub(1),
        ..Track::default()
    });
    song.order_lists.push(OrderList::from_tracks(&[0]));

    let mut instr = Instrument::default();
    instr.samples.push(tone_sample(8363));

    Module {
        name: "test".to_string(),
        sub_songs: vec![song],
        instruments: vec![instr],
    }
}

fn player(module: &Module) -> Player<'_, NullMixer> {
    Player::new(module, 0, NullMixer::new(8), 8)
}

fn empty_rows(count: usize) -> Vec<TrackRow> {
    vec![TrackRow::default(); count]
}

#[test]
fn test_silence_module_starts_no_voices() {
    let mut rows = empty_rows(1);
    rows[0] = TrackRow::default();
    let module = simple_module(rows);
    let mut player = player(&module);

    for _ in 0..1000 {
        player.handle_tick();
    }
    assert_eq!(player.active_voices, 0);
    assert!(player.song_end, "single-row silence must report song end");
    for (_, flags, ..) in &player.mixer.channels {
        assert!(!flags.contains(MixerChannelFlags::PLAY));
    }
}

#[test]
fn test_simple_note_plays_at_keyboard_rate() {
    // A-4 on a sample whose natural rate is 8363 Hz at C-4
    let mut rows = empty_rows(4);
    rows[0] = TrackRow::play(4, 10, 1);
    let module = simple_module(rows);
    let mut player = player(&module);

    player.handle_tick();
    assert_eq!(player.active_voices, 1);
    let voice = &player.voices[0];
    assert!(voice.allocated);
    assert_eq!(voice.mixer.rate, note_frequency(4 * 12 + 9, 0, 8363));
    assert_eq!(voice.mixer.volume, 255);
    assert!(voice.mixer.flags.contains(MixerChannelFlags::PLAY));

    // The row advance itself must not disturb the voice
    let rate = player.voices[0].mixer.rate;
    let volume = player.voices[0].mixer.volume;
    for _ in 0..6 {
        player.handle_tick();
    }
    assert_eq!(player.voices[0].mixer.rate, rate);
    assert_eq!(player.voices[0].mixer.volume, volume);
}

#[test]
fn test_linear_portamento_up_slides_every_tick() {
    let mut rows = empty_rows(2);
    rows[0] = TrackRow::play(4, 1, 1).with_fx(fx::PORTA_UP, 0x0100);
    let mut module = simple_module(rows);
    module.sub_songs[0].flags |= nether_seq::SongFlags::LINEAR_FREQ_TABLE;
    let mut player = player(&module);

    player.handle_tick();
    let base = player.voices[0].frequency;
    assert!(base > 0);

    // First continuous tick applies one table slide of 256 steps
    player.handle_tick();
    assert_eq!(player.voices[0].frequency, linear_slide_up(base, 256));

    // Every further tick of the row slides strictly upward
    let mut prev = player.voices[0].frequency;
    for _ in 2..6 {
        player.handle_tick();
        let now = player.voices[0].frequency;
        assert!(now > prev, "portamento up must always make progress");
        prev = now;
    }
}

#[test]
fn test_pattern_break_enters_next_order_at_row() {
    let mut rows_a = empty_rows(16);
    rows_a[0] = TrackRow::play(4, 1, 1);
    rows_a[5] = TrackRow::default().with_fx(fx::PATTERN_BREAK, 0x0008);
    let rows_b = empty_rows(16);

    let mut module = simple_module(rows_a);
    module.sub_songs[0].tracks.push(Track {
        rows: rows_b,
        last_row: 15,
        ..Track::default()
    });
    module.sub_songs[0].order_lists[0] = OrderList::from_tracks(&[0, 1]);
    let mut player = player(&module);

    for _ in 0..200 {
        player.handle_tick();
        if player.hosts[0].order == 1 {
            break;
        }
    }
    assert_eq!(player.hosts[0].order, 1);
    assert_eq!(player.hosts[0].track, Some(1));
    assert_eq!(player.hosts[0].row, 8);
    assert_eq!(player.hosts[0].tempo_counter, 0);
}

#[test]
fn test_nna_fade_keeps_old_note_in_background() {
    let mut rows = empty_rows(8);
    rows[0] = TrackRow::play(4, 10, 1);
    rows[1] = TrackRow::default().with_fx(fx::NNA_CTRL, 0x0003);
    rows[2] = TrackRow::play(5, 1, 1);
    let mut module = simple_module(rows);
    module.instruments[0].fade_out = 4096;
    let mut player = player(&module);

    // Through row 2 (ticks 0..12 inclusive triggers the second note)
    for _ in 0..13 {
        player.handle_tick();
    }
    assert!(player.voices[0].background, "old note moves to background");
    assert!(player.voices[0].fading, "NNA fade starts the fadeout");
    assert!(player.voices[1].allocated, "new note gets a fresh voice");
    assert_eq!(player.hosts[0].voice, Some(1));

    // 65535 at 4096 per tick runs out within 16 ticks
    for _ in 0..20 {
        player.handle_tick();
    }
    assert!(!player.voices[0].allocated, "faded-out voice is cut");
    assert!(player.voices[1].allocated);
}

#[test]
fn test_synth_vibrato_oscillates_around_base() {
    // Volume context: depth, then a sine sweep driven by var0 degrees
    let code = vec![
        SynthInstruction::new(op::VIBDPTH, 2, 0, 2),
        SynthInstruction::new(op::GETSINE, 0, 1, 0),
        SynthInstruction::new(op::ASHR, 2, 1, 8),
        SynthInstruction::new(op::VIBVAL, 1, 0, 0),
        SynthInstruction::new(op::ADD, 2, 0, 1),
        SynthInstruction::new(op::WAIT, 2, 0, 1),
        SynthInstruction::new(op::JUMP, 2, 0, 1),
        SynthInstruction::new(op::STOP, 2, 0, 0),
    ];
    let mut program = SynthProgram::from_code(code);
    program.entry = [0, 7, 7, 7];

    let mut rows = empty_rows(64);
    rows[0] = TrackRow::play(4, 1, 1);
    let mut module = simple_module(rows);
    module.sub_songs[0].flags |= nether_seq::SongFlags::LINEAR_FREQ_TABLE;
    module.instruments[0].samples[0].synth = Some(program);
    let mut player = player(&module);

    player.handle_tick();
    let base = player.voices[0].frequency as u64;

    let mut sum = 0u64;
    let mut lo = u32::MAX;
    let mut hi = 0u32;
    for _ in 0..360 {
        player.handle_tick();
        let f = player.voices[0].frequency;
        sum += f as u64;
        lo = lo.min(f);
        hi = hi.max(f);
    }
    let mean = sum / 360;
    assert!(hi > base as u32, "vibrato must swing above the base");
    assert!(lo < base as u32, "vibrato must swing below the base");
    let drift = mean.abs_diff(base);
    assert!(
        drift * 100 <= base,
        "mean {mean} drifted more than 1% from base {base}"
    );
}

#[test]
fn test_note_cut_zeroes_volume_at_tick() {
    let mut rows = empty_rows(4);
    rows[0] = TrackRow::play(4, 1, 1).with_fx(fx::NOTE_CUT, 0x0003);
    let module = simple_module(rows);
    let mut player = player(&module);

    for _ in 0..3 {
        player.handle_tick();
        assert!(player.voices[0].volume > 0);
    }
    player.handle_tick();
    assert_eq!(player.voices[0].volume, 0);
}

#[test]
fn test_pattern_loop_replays_marked_rows() {
    let mut rows = empty_rows(8);
    rows[0] = TrackRow::play(4, 1, 1);
    rows[1] = TrackRow::default().with_fx(fx::PATTERN_LOOP, 0x0000);
    rows[3] = TrackRow::default().with_fx(fx::PATTERN_LOOP, 0x0002);
    let module = simple_module(rows);
    let mut player = player(&module);

    let mut visited = Vec::new();
    for _ in 0..80 {
        player.handle_tick();
        if player.hosts[0].tempo_counter == 0 {
            visited.push(player.hosts[0].row);
        }
        if visited.len() >= 11 {
            break;
        }
    }
    assert_eq!(visited, vec![0, 1, 2, 3, 1, 2, 3, 1, 2, 3, 4]);
}

#[test]
fn test_pattern_delay_holds_the_row() {
    let mut rows = empty_rows(4);
    rows[1] = TrackRow::default().with_fx(fx::PATTERN_DELAY, 0x0002);
    let module = simple_module(rows);
    let mut player = player(&module);

    let mut visited = Vec::new();
    for _ in 0..40 {
        player.handle_tick();
        if player.hosts[0].tempo_counter == 0 {
            visited.push(player.hosts[0].row);
        }
        if visited.len() >= 5 {
            break;
        }
    }
    assert_eq!(visited, vec![0, 1, 1, 1, 2]);
}

#[test]
fn test_set_speed_pushes_tempo_to_mixer() {
    let mut rows = empty_rows(2);
    rows[0] = TrackRow::default().with_fx(fx::SET_SPEED, 0x0096);
    let module = simple_module(rows);
    let mut player = player(&module);

    player.handle_tick();
    assert_eq!(player.bpm_speed, 150);
    // Internal tempo units are ticks per ten seconds
    assert_eq!(player.mixer.tempo, 150 * 4);
}

#[test]
fn test_effects_used_blocks_double_fire_via_channel_control() {
    let mut song = SubSong {
        channels: 2,
        ..SubSong::default()
    };
    // Channel 0 routes its effects at channel 1
    let mut rows0 = empty_rows(4);
    rows0[0] = TrackRow::default()
        .with_fx(fx::CHANNEL_CTRL, 0x0001)
        .with_fx(fx::CHANNEL_CTRL, 0x0101)
        .with_fx(fx::CHANNEL_CTRL, 0x0030);
    rows0[1] = TrackRow::default().with_fx(fx::VOL_SLIDE_DOWN, 0x0100);
    // Channel 1 plays a note and carries the same slide in the same slot
    let mut rows1 = empty_rows(4);
    rows1[0] = TrackRow::play(4, 1, 1);
    rows1[1] = TrackRow::default().with_fx(fx::VOL_SLIDE_DOWN, 0x0100);

    song.tracks.push(Track {
        rows: rows0,
        last_row: 3,
        ..Track::default()
    });
    song.tracks.push(Track {
        rows: rows1,
        last_row: 3,
        ..Track::default()
    });
    song.order_lists.push(OrderList::from_tracks(&[0]));
    song.order_lists.push(OrderList::from_tracks(&[1]));

    let mut instr = Instrument::default();
    instr.samples.push(tone_sample(8363));
    let module = Module {
        name: "ctrl".to_string(),
        sub_songs: vec![song],
        instruments: vec![instr],
    };
    let mut player = Player::new(&module, 0, NullMixer::new(8), 8);

    // Rows 0 and 1 complete after 12 ticks; the slide fired on the five
    // continuous ticks of row 1 and must fire exactly once per tick
    for _ in 0..12 {
        player.handle_tick();
    }
    let voice = player.hosts[1].voice.expect("channel 1 has a voice") as usize;
    assert_eq!(player.voices[voice].volume, 250);
}

#[test]
fn test_trace_mode_is_a_pure_countdown() {
    let mut rows = empty_rows(4);
    rows[0] = TrackRow::play(4, 1, 1);
    let module = simple_module(rows);
    let mut player = player(&module);
    player.handle_tick();

    player.trace_count = 3;
    let row = player.hosts[0].row;
    let counter = player.hosts[0].tempo_counter;
    let freq = player.voices[0].frequency;
    let time = player.play_time;

    player.handle_tick();
    assert_eq!(player.trace_count, 2);
    assert_eq!(player.hosts[0].row, row);
    assert_eq!(player.hosts[0].tempo_counter, counter);
    assert_eq!(player.voices[0].frequency, freq);
    assert_eq!(player.play_time, time);
}

#[test]
fn test_playback_is_deterministic() {
    let mut rows = empty_rows(16);
    rows[0] = TrackRow::play(4, 10, 1);
    rows[4] = TrackRow::play(4, 3, 1).with_fx(fx::VIBRATO, 0x0208);
    rows[8] = TrackRow::play(5, 1, 1);
    let mut module = simple_module(rows);
    // Swings force seed consumption on every trigger
    module.instruments[0].volume_swing = 30;
    module.instruments[0].pitch_swing = 10;

    let mut a = Player::new(&module, 0, NullMixer::new(8), 8);
    let mut b = Player::new(&module, 0, NullMixer::new(8), 8);
    for _ in 0..100 {
        a.handle_tick();
        b.handle_tick();
        let sa: Vec<_> = a.voices.iter().map(|v| (v.frequency, v.final_volume)).collect();
        let sb: Vec<_> = b.voices.iter().map(|v| (v.frequency, v.final_volume)).collect();
        assert_eq!(sa, sb);
        assert_eq!(a.seed, b.seed);
    }
}

#[test]
fn test_playing_voice_frequency_is_never_zero() {
    let mut rows = empty_rows(8);
    rows[0] = TrackRow::play(4, 1, 1).with_fx(fx::PORTA_DOWN, 0xFFFF);
    let module = simple_module(rows);
    let mut player = player(&module);

    for _ in 0..48 {
        player.handle_tick();
        for voice in &player.voices {
            if voice.mixer.flags.contains(MixerChannelFlags::PLAY) && voice.allocated {
                assert!(voice.frequency > 0);
            }
        }
    }
}

fn bump_user_sync(player: &mut Player<'_, NullMixer>, _data: u64) {
    player.user_sync = player.user_sync.wrapping_add(1);
}

#[test]
fn test_beginning_hook_fires_each_processed_tick() {
    let module = simple_module(empty_rows(4));
    let mut player = player(&module);
    player.begin_hook = Some(PlayerHook {
        func: bump_user_sync,
        flags: HookFlags::BEGINNING,
        user_data: 0,
    });

    for _ in 0..5 {
        player.handle_tick();
    }
    assert_eq!(player.user_sync, 5);

    // Trace ticks skip the hook
    player.trace_count = 2;
    player.handle_tick();
    player.handle_tick();
    assert_eq!(player.user_sync, 5);
}

#[test]
fn test_mixer_gets_silence_for_dataless_sample() {
    let mut rows = empty_rows(4);
    rows[0] = TrackRow::play(4, 1, 1);
    let mut module = simple_module(rows);
    module.instruments[0].samples[0] = Sample::default();
    let mut player = player(&module);

    player.handle_tick();
    let voice = &player.voices[0];
    assert!(voice.allocated);
    assert!(voice.mixer.flags.contains(MixerChannelFlags::LOOP));
    assert_eq!(voice.mixer.length, 256);
}

#[test]
fn test_keyoff_without_envelope_starts_fade() {
    let mut rows = empty_rows(8);
    rows[0] = TrackRow::play(4, 1, 1);
    rows[1] = TrackRow {
        note: note::KEYOFF,
        ..TrackRow::default()
    };
    let mut module = simple_module(rows);
    module.instruments[0].fade_out = 8192;
    let mut player = player(&module);

    for _ in 0..7 {
        player.handle_tick();
    }
    assert!(player.voices[0].key_off);
    assert!(player.voices[0].fading);
    for _ in 0..10 {
        player.handle_tick();
    }
    assert!(!player.voices[0].allocated, "fadeout must end the voice");
}

//! Note reading and voice allocation
//!
//! Reads the new row's note and instrument, retires the old voice by the
//! host's new-note action, runs the duplicate checks, and brings a fresh
//! voice online.

use tracing::debug;

use nether_seq::{note, DuplicateAction, DuplicateCheck, Instrument, NewNoteAction, Sample};

use crate::mixer::{Mixer, MixerChannelFlags, PcmRef};
use crate::voices::SynthContext;
use crate::VOICE_STEAL_VOLUME;

use super::Player;

impl<'m, M: Mixer> Player<'m, M> {
    /// Read the row entered on this tick: presets, note, instrument
    pub(super) fn read_row(&mut self, ch: usize) {
        self.preset_row_effects(ch);
        let Some(row) = self.current_row(ch) else {
            return;
        };

        // A staged note delay keeps the whole note for later ticks
        if self.hosts[ch].note_delay_tick.is_some() {
            let host = &mut self.hosts[ch];
            host.delayed_octave = row.octave;
            host.delayed_note = row.note;
            host.delayed_instrument = row.instrument;
            return;
        }

        self.process_note(ch, row.octave, row.note, row.instrument);
    }

    /// Act on one note cell (also used when a note delay expires)
    pub(super) fn process_note(&mut self, ch: usize, octave: u8, cell_note: i8, instrument: u16) {
        match cell_note {
            note::NONE => {
                if instrument != 0 {
                    self.change_instrument(ch, instrument);
                }
            }
            note::KILL => {
                if let Some(v) = self.hosts[ch].voice.take() {
                    self.voices[v as usize].cut();
                }
            }
            note::OFF => {
                if let Some(v) = self.hosts[ch].voice {
                    let voice = &mut self.voices[v as usize];
                    voice.volume = 0;
                    voice.mixer.flags -= MixerChannelFlags::PLAY;
                }
            }
            note::KEYOFF => {
                if let Some(v) = self.hosts[ch].voice {
                    self.key_off_voice(v as usize);
                }
            }
            note::FADE => {
                if let Some(v) = self.hosts[ch].voice {
                    self.voices[v as usize].fading = true;
                }
            }
            note::HOLD_DELAY => {
                // TODO: MED hold delay is not implemented in the source
            }
            n if (note::C..=note::B).contains(&n) => {
                if instrument != 0 {
                    self.change_instrument(ch, instrument);
                }
                let key = (octave.min(9) as i32) * 12 + (n as i32 - 1);
                self.trigger_note(ch, key as u8);
            }
            _ => {}
        }
    }

    /// Make `instrument` current on the host, refreshing the policies and
    /// modulation envelopes that live at host scope
    pub(super) fn change_instrument(&mut self, ch: usize, instrument: u16) {
        let Some(instr) = self.module.instrument(instrument) else {
            debug!(channel = ch, instrument, "instrument out of range, ignored");
            return;
        };
        let host = &mut self.hosts[ch];
        host.instrument = instrument;
        host.nna = instr.nna;
        host.dct = instr.dct;
        host.dna = instr.dna;
        host.vibrato_env.set(instr.envelopes.vibrato.as_ref());
        host.tremolo_env.set(instr.envelopes.tremolo.as_ref());
        host.pannolo_env.set(instr.envelopes.pannolo.as_ref());
        host.track_tremolo_env
            .set(instr.envelopes.track_tremolo.as_ref());
        host.track_pannolo_env
            .set(instr.envelopes.track_pannolo.as_ref());

        // Refresh the default volume of a sounding note (classic
        // instrument-without-note column behaviour)
        if let Some(v) = host.voice {
            let sample_num = host.sample;
            if let Some(sample) = instr.sample(sample_num) {
                let voice = &mut self.voices[v as usize];
                voice.volume = sample.volume;
                voice.sub_volume = sample.sub_volume;
                voice.instr_volume = instr.global_volume;
            }
        }
    }

    /// Trigger a playable note on a host channel
    pub(super) fn trigger_note(&mut self, ch: usize, key: u8) {
        let instrument_num = self.hosts[ch].instrument;
        let Some(instr) = self.module.instrument(instrument_num) else {
            debug!(channel = ch, instrument = instrument_num, "note without instrument, ignored");
            return;
        };

        // Keyboard remap decides the actual sample and note
        let Some(entry) = instr.keyboard_entry(key.min(119)) else {
            return;
        };
        if entry.sample == 0 {
            return;
        }
        let Some(sample) = instr.sample(entry.sample) else {
            debug!(channel = ch, sample = entry.sample, "keyboard sample out of range, ignored");
            return;
        };
        self.hosts[ch].sample = entry.sample;

        // A pending tone portamento consumes the note as its target
        if self.hosts[ch].tone_porta_pending && self.hosts[ch].voice.is_some() {
            let (target, _) = self.note_to_frequency(ch, entry.note, instr, sample);
            self.hosts[ch].tone_porta_target = target.max(1);
            return;
        }

        let (_, final_key) = self.note_to_frequency(ch, entry.note, instr, sample);
        let voice_idx = self.allocate_voice(ch, entry.sample, final_key);
        let Some(v) = voice_idx else {
            return;
        };

        self.init_voice(ch, v, instr, sample, entry.sample, entry.note);
    }

    /// Frequency and final key for a keyboard note on this host, with
    /// every transpose applied
    pub(super) fn note_to_frequency(
        &self,
        ch: usize,
        keyboard_note: u8,
        instr: &Instrument,
        sample: &Sample,
    ) -> (u32, u8) {
        let host = &self.hosts[ch];
        let mut key = keyboard_note as i32 - 1;
        key += host.transpose as i32 + sample.transpose as i32;
        if let Some(list) = self.song.order_list(ch as u16) {
            if let Some(entry) = list.entries.get(host.order as usize) {
                if instr
                    .flags
                    .contains(nether_seq::InstrumentFlags::TRANSPOSABLE)
                {
                    key += entry.transpose as i32;
                }
            }
        }
        if let Some(track) = host.track.and_then(|t| self.song.track(t)) {
            key += track.transpose as i32;
        }
        let key = key.clamp(0, 119) as u8;
        let finetune = sample.finetune.saturating_add(host.finetune);
        (
            crate::tables::note_frequency(key, finetune, sample.rate),
            key,
        )
    }

    /// Retire the current voice per NNA, run the duplicate check, and
    /// pick the mixer channel for the new note
    fn allocate_voice(&mut self, ch: usize, sample_num: u16, key: u8) -> Option<usize> {
        let old_voice = self.hosts[ch].voice.map(|v| v as usize);
        let nna = self.hosts[ch].nna;

        // Step 1/2: what happens to the sounding voice
        if let Some(old) = old_voice {
            if self.voices[old].allocated && self.voices[old].audible() && nna != NewNoteAction::Cut
            {
                self.voices[old].background = true;
                match nna {
                    NewNoteAction::Continue => {}
                    NewNoteAction::NoteOff => self.key_off_voice(old),
                    NewNoteAction::NoteFade => self.voices[old].fading = true,
                    NewNoteAction::Cut => unreachable!("cut handled above"),
                }
                self.enter_synth_event(old, SynthEvent::Nna);
            } else {
                self.voices[old].cut();
            }
            self.hosts[ch].voice = None;
        }

        // Step 3: duplicate check against every voice of this host
        let dct = self.hosts[ch].dct;
        if !dct.is_empty() {
            let instrument_num = self.hosts[ch].instrument;
            for v in 0..self.voices.len() {
                let voice = &self.voices[v];
                if !voice.allocated || voice.host as usize != ch {
                    continue;
                }
                if Self::duplicate_matches(voice, dct, instrument_num, sample_num, key) {
                    let dna = self.hosts[ch].dna;
                    self.apply_duplicate_action(v, dna);
                    self.enter_synth_event(v, SynthEvent::Dna);
                }
            }
        }

        // Step 4a: a voice the mixer is done with
        let free = self
            .voices
            .iter()
            .position(|v| !v.allocated && !v.mixer.flags.contains(MixerChannelFlags::PLAY));
        if let Some(v) = free {
            return Some(v);
        }

        // Step 4b: the quietest background voice below the steal threshold
        let mut steal: Option<(usize, u32)> = None;
        for (v, voice) in self.voices.iter().enumerate() {
            if voice.background && voice.final_volume < VOICE_STEAL_VOLUME {
                if steal.map(|(_, vol)| voice.final_volume < vol).unwrap_or(true) {
                    steal = Some((v, voice.final_volume));
                }
            }
        }
        if let Some((v, _)) = steal {
            return Some(v);
        }

        // Out of voices: reclaim the voice this host just retired
        if let Some(old) = old_voice {
            self.voices[old].cut();
            return Some(old);
        }
        None
    }

    fn duplicate_matches(
        voice: &crate::voices::Voice<'m>,
        dct: DuplicateCheck,
        instrument: u16,
        sample: u16,
        key: u8,
    ) -> bool {
        let instr_match = voice.instrument == instrument;
        let sample_match = voice.sample == sample;
        let note_match = voice.key == key;

        let mut or_hit = false;
        or_hit |= dct.contains(DuplicateCheck::OR_INSTR_NOTE) && instr_match && note_match;
        or_hit |= dct.contains(DuplicateCheck::OR_SAMPLE_NOTE) && sample_match && note_match;
        or_hit |= dct.contains(DuplicateCheck::OR_INSTR) && instr_match;
        or_hit |= dct.contains(DuplicateCheck::OR_SAMPLE) && sample_match;

        let and_bits = dct & (DuplicateCheck::AND_INSTR_NOTE
            | DuplicateCheck::AND_SAMPLE_NOTE
            | DuplicateCheck::AND_INSTR
            | DuplicateCheck::AND_SAMPLE);
        let and_hit = !and_bits.is_empty() && {
            let mut hit = true;
            if and_bits.contains(DuplicateCheck::AND_INSTR_NOTE) {
                hit &= instr_match && note_match;
            }
            if and_bits.contains(DuplicateCheck::AND_SAMPLE_NOTE) {
                hit &= sample_match && note_match;
            }
            if and_bits.contains(DuplicateCheck::AND_INSTR) {
                hit &= instr_match;
            }
            if and_bits.contains(DuplicateCheck::AND_SAMPLE) {
                hit &= sample_match;
            }
            hit
        };

        or_hit || and_hit
    }

    /// Apply a duplicate-note (or decay) action to a voice
    pub(super) fn apply_duplicate_action(&mut self, v: usize, action: DuplicateAction) {
        match action {
            DuplicateAction::Cut => self.voices[v].cut(),
            DuplicateAction::NoteOff => self.key_off_voice(v),
            DuplicateAction::NoteFade => self.voices[v].fading = true,
        }
    }

    /// Keyoff a voice: release sustain, start the fade when no volume
    /// envelope carries the release, move synth contexts to their
    /// sustain entries
    pub(super) fn key_off_voice(&mut self, v: usize) {
        self.voices[v].trigger_key_off();
        self.enter_synth_event(v, SynthEvent::Sustain);
    }

    /// Bring a voice online for a freshly triggered note
    fn init_voice(
        &mut self,
        ch: usize,
        v: usize,
        instr: &'m Instrument,
        sample: &'m Sample,
        sample_num: u16,
        keyboard_note: u8,
    ) {
        let (frequency, final_key) = self.note_to_frequency(ch, keyboard_note, instr, sample);
        let host_instrument = self.hosts[ch].instrument;
        let (hold, decay) = {
            let host = &self.hosts[ch];
            (
                if host.hold != 0 { host.hold } else { instr.hold },
                if host.decay != 0 { host.decay } else { instr.decay },
            )
        };
        let (channel_panning, channel_sub_panning, channel_surround) = {
            let host = &self.hosts[ch];
            (
                host.channel_panning,
                host.channel_sub_panning,
                host.channel_surround,
            )
        };

        let voice = &mut self.voices[v];
        *voice = crate::voices::Voice::default();
        voice.host = ch as u16;
        voice.allocated = true;
        voice.instrument = host_instrument;
        voice.sample = sample_num;
        voice.key = final_key;

        voice.frequency = frequency.max(1);
        voice.volume = sample.volume;
        voice.sub_volume = sample.sub_volume;
        voice.instr_volume = instr.global_volume;
        voice.fade_out = instr.fade_out;
        voice.fade_out_count = 65535;
        voice.hold = hold;
        voice.decay = decay;
        voice.dca = instr.dca;
        voice.pitch_pan_separation = instr.pitch_pan_separation;
        voice.pitch_pan_center = instr.pitch_pan_center;
        voice.volume_swing = instr.volume_swing;
        voice.panning_swing = instr.panning_swing;
        voice.pitch_swing = instr.pitch_swing;

        // Panning: sample overrides channel when the instrument says so
        if instr
            .flags
            .contains(nether_seq::InstrumentFlags::SAMPLE_PANNING)
            && sample.flags.contains(nether_seq::SampleFlags::PANNING)
        {
            voice.panning = sample.panning;
            voice.sub_panning = sample.sub_panning;
            voice.surround = sample.flags.contains(nether_seq::SampleFlags::SURROUND);
        } else {
            voice.panning = channel_panning;
            voice.sub_panning = channel_sub_panning;
            voice.surround = channel_surround;
        }

        // Auto-modulation parameters travel with the voice
        voice.auto_vibrato_depth = sample.vibrato_depth;
        voice.auto_vibrato_rate = sample.vibrato_rate;
        voice.auto_vibrato_sweep = sample.vibrato_sweep;
        voice.auto_tremolo_depth = sample.tremolo_depth;
        voice.auto_tremolo_rate = sample.tremolo_rate;
        voice.auto_tremolo_sweep = sample.tremolo_sweep;
        voice.auto_pannolo_depth = sample.pannolo_depth;
        voice.auto_pannolo_rate = sample.pannolo_rate;
        voice.auto_pannolo_sweep = sample.pannolo_sweep;

        voice.envelopes.volume.set(instr.envelopes.volume.as_ref());
        voice
            .envelopes
            .panning
            .set(instr.envelopes.panning.as_ref());
        voice.envelopes.slide.set(instr.envelopes.slide.as_ref());
        voice
            .envelopes
            .auto_vibrato
            .set(instr.envelopes.auto_vibrato.as_ref());
        voice
            .envelopes
            .auto_tremolo
            .set(instr.envelopes.auto_tremolo.as_ref());
        voice
            .envelopes
            .auto_pannolo
            .set(instr.envelopes.auto_pannolo.as_ref());
        voice
            .envelopes
            .resonance
            .set(instr.envelopes.resonance.as_ref());

        voice.synth.load(sample.synth.as_ref());

        // Mixer view; a data-less sample plays the built-in silence loop
        voice.mixer.position = 0;
        if sample.data.is_empty() || sample.data.bits_per_sample() == 0 {
            voice.mixer.data = Some(PcmRef::Mono8(&crate::SILENCE));
            voice.mixer.length = crate::SILENCE.len() as u32;
            voice.mixer.repeat_start = 0;
            voice.mixer.repeat_length = crate::SILENCE.len() as u32;
            voice.mixer.repeat_count = 0;
            voice.mixer.bits_per_sample = 8;
            voice.mixer.flags = MixerChannelFlags::PLAY | MixerChannelFlags::LOOP;
        } else {
            voice.mixer.data = Some(PcmRef::from(&sample.data));
            voice.mixer.length = sample.len;
            voice.mixer.bits_per_sample = sample.data.bits_per_sample();
            voice.mixer.flags = MixerChannelFlags::PLAY;
            if sample.flags.contains(nether_seq::SampleFlags::LOOP) {
                voice.mixer.flags |= MixerChannelFlags::LOOP;
                voice.mixer.repeat_start = sample.repeat_start;
                voice.mixer.repeat_length = sample.repeat_length;
                voice.mixer.repeat_count = sample.repeat_count;
            }
            if sample.flags.contains(nether_seq::SampleFlags::PINGPONG) {
                voice.mixer.flags |= MixerChannelFlags::PINGPONG;
            }
            if sample.flags.contains(nether_seq::SampleFlags::BACKWARDS) {
                voice.mixer.flags |= MixerChannelFlags::BACKWARDS;
                voice.mixer.position = sample.len;
            }
        }
        voice.mixer.filter_cutoff = 0x1000;
        voice.mixer.rate = voice.frequency;
        voice.mixer.volume = 0;

        // Random swings consume the seed only when configured
        if voice.volume_swing != 0 {
            let swing = voice.volume_swing;
            let span = (voice.volume as u32 * swing as u32 / 100).max(1);
            let draw = self.rng_bounded(span * 2 + 1) as i32 - span as i32;
            let voice = &mut self.voices[v];
            voice.volume = (voice.volume as i32 + draw).clamp(0, 255) as u8;
        }
        if self.voices[v].pitch_swing != 0 {
            let swing = self.voices[v].pitch_swing;
            let freq = self.voices[v].frequency;
            let span = (freq as u64 * swing as u64 / 100).max(1) as u32;
            let draw = self.rng_bounded(span.saturating_mul(2).saturating_add(1)) as i64 - span as i64;
            let voice = &mut self.voices[v];
            voice.frequency = (voice.frequency as i64 + draw).clamp(1, u32::MAX as i64) as u32;
        }
        if self.voices[v].panning_swing != 0 {
            let swing = self.voices[v].panning_swing.min(255) as u32;
            let draw = self.rng_bounded(swing * 2 + 1) as i32 - swing as i32;
            let voice = &mut self.voices[v];
            voice.panning = (voice.panning as i32 + draw).clamp(0, 255) as u8;
        }

        self.hosts[ch].voice = Some(v as u16);
        self.hosts[ch].key = final_key;
    }

    /// Move synth contexts to their event entry points
    pub(super) fn enter_synth_event(&mut self, v: usize, event: SynthEvent) {
        let synth = &mut self.voices[v].synth;
        if synth.program.is_none() {
            return;
        }
        let (positions, mask) = match event {
            SynthEvent::Sustain => (synth.sustain_pos, synth.use_sustain_flags),
            SynthEvent::Nna => (synth.nna_pos, synth.use_nna_flags),
            SynthEvent::Dna => (synth.dna_pos, synth.use_dna_flags),
        };
        for c in SynthContext::ALL {
            let i = c as usize;
            if mask & (1 << i) != 0 {
                synth.entry_pos[i] = positions[i];
                synth.wait_count[i] = 0;
                synth.wait_type[i] = crate::voices::SynthState::NO_WAIT;
                synth.stop_mask &= !(1 << i);
            }
        }
    }
}

/// Synth VM events with their own entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SynthEvent {
    Sustain,
    Nna,
    Dna,
}

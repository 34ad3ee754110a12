//! Instrument, sample and synth effects (0x50 - 0x5C)

use nether_seq::{DuplicateAction, DuplicateCheck, EnvelopeFlags, NewNoteAction, TrackCompatFlags};

use crate::envelope::PlayerEnvelope;
use crate::mixer::Mixer;

use super::Player;

/// Apply one envelope-control change to an envelope runtime
fn apply_env_change(env: &mut PlayerEnvelope<'_>, change: u8, value: u16) {
    match change {
        // Envelopes carry their tables inline; there is no waveform bank
        // to retarget, so the waveform select is void
        0x00 => {}
        0x10 => env.restart(),
        0x01 => env.rep_flags -= EnvelopeFlags::RETRIG,
        0x11 => env.rep_flags |= EnvelopeFlags::RETRIG,
        0x02 => env.rep_flags -= EnvelopeFlags::RANDOM,
        0x12 => env.rep_flags |= EnvelopeFlags::RANDOM,
        0x22 => env.rep_flags -= EnvelopeFlags::RND_DELAY,
        0x32 => env.rep_flags |= EnvelopeFlags::RND_DELAY,
        0x03 => env.rep_flags -= EnvelopeFlags::LOOP,
        0x13 => env.rep_flags |= EnvelopeFlags::LOOP,
        0x04 | 0x14 => {
            env.pos = value;
            env.tempo_count = 0;
        }
        0x05 => env.tempo = value,
        0x15 => env.tempo = (env.tempo as i32 + value as i16 as i32).clamp(0, 0xFFFF) as u16,
        0x25 => env.tempo_count = value,
        0x06 => env.sustain_start = value,
        0x07 => env.sustain_end = value,
        0x08 => env.sustain_count = value,
        0x09 => env.sustain_counted = value,
        0x0A | 0x1A => env.loop_start = value,
        0x0B | 0x1B => env.loop_end = value,
        0x0C => env.loop_count = value,
        0x0D => env.loop_counted = value,
        0x0E => env.value_min = value as i16,
        0x0F => env.value_max = value as i16,
        _ => {}
    }
}

impl<'m, M: Mixer> Player<'m, M> {
    pub(super) fn fx_sample_offset_high(&mut self, ch: usize, data: u16) {
        self.hosts[ch].sample_offset_high = data;
    }

    pub(super) fn fx_sample_offset_low(&mut self, ch: usize, data: u16) {
        let offset = ((self.hosts[ch].sample_offset_high as u32) << 16) | data as u32;
        self.hosts[ch].sample_offset = offset;
        let Some(v) = self.hosts[ch].voice.map(|v| v as usize) else {
            return;
        };
        let voice = &mut self.voices[v];
        if offset >= voice.mixer.length {
            if self.hosts[ch]
                .compat_flags
                .contains(TrackCompatFlags::SAMPLE_OFFSET)
            {
                return;
            }
            voice.mixer.position = voice.mixer.length;
        } else {
            voice.mixer.position = offset;
        }
    }

    pub(super) fn fx_set_hold(&mut self, ch: usize, data: u16) {
        self.hosts[ch].hold = data;
        if let Some(v) = self.hosts[ch].voice {
            self.voices[v as usize].hold = data;
        }
    }

    pub(super) fn fx_set_decay(&mut self, ch: usize, data: u16) {
        self.hosts[ch].decay = data;
        if let Some(v) = self.hosts[ch].voice {
            self.voices[v as usize].decay = data;
        }
    }

    pub(super) fn fx_set_transpose(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        host.transpose = (data >> 8) as i8;
        host.finetune = data as i8;
    }

    pub(super) fn fx_instrument_ctrl(&mut self, _ch: usize, _data: u16) {
        // TODO: instrument control is not implemented in the source
    }

    pub(super) fn fx_instrument_change(&mut self, ch: usize, data: u16) {
        let Some(v) = self.hosts[ch].voice.map(|v| v as usize) else {
            return;
        };
        let selector = (data >> 12) as u8;
        let value = data & 0x0FFF;
        let voice = &mut self.voices[v];
        match selector {
            0x0 => voice.instr_volume = (value & 0xFF) as u8,
            0x1 => voice.volume_swing = value,
            0x2 => voice.panning_swing = value,
            0x3 => voice.pitch_swing = value,
            0x4 => voice.fade_out = value.saturating_mul(0x10),
            0x5 => {
                if value != 0 {
                    voice.fade_out_count = (value as i32) * 0x10;
                } else {
                    voice.fading = false;
                    voice.fade_out_count = 65535;
                }
            }
            0x6 => {
                let which = ((value >> 8) & 0x0F) as u8;
                let amount = (value & 0xFF) as u16;
                match which {
                    0x0 => voice.auto_vibrato_sweep = amount,
                    0x1 => voice.auto_vibrato_depth = amount as u8,
                    0x2 => voice.auto_vibrato_rate = amount as u8,
                    0x4 => voice.auto_tremolo_sweep = amount,
                    0x5 => voice.auto_tremolo_depth = amount as u8,
                    0x6 => voice.auto_tremolo_rate = amount as u8,
                    0x8 => voice.auto_pannolo_sweep = amount,
                    0x9 => voice.auto_pannolo_depth = amount as u8,
                    0xA => voice.auto_pannolo_rate = amount as u8,
                    _ => {}
                }
            }
            0x7 => voice.pitch_pan_separation = value as i16,
            0x8 => voice.pitch_pan_center = (value & 0xFF) as u8,
            0x9 => {
                voice.dca = match value {
                    0x001 => DuplicateAction::NoteOff,
                    0x002 => DuplicateAction::NoteFade,
                    _ => DuplicateAction::Cut,
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Synth control (0x57 stages, 0x58 applies)
    // ------------------------------------------------------------------

    pub(super) fn fx_synth_ctrl(&mut self, ch: usize, data: u16) {
        let (count, ty) = ((data >> 8) as u8, data as u8);
        {
            let host = &mut self.hosts[ch];
            host.synth_ctrl_count = count;
            host.synth_ctrl_type = ty & 0x7F;
            host.synth_ctrl_active = true;
        }
        if ty & 0x80 != 0 {
            let value = self.hosts[ch].synth_value;
            self.synth_ctrl_apply(ch, ty & 0x7F, count, value);
        }
    }

    pub(super) fn fx_set_synth_value(&mut self, ch: usize, data: u16) {
        self.hosts[ch].synth_value = data;
        if self.hosts[ch].synth_ctrl_active {
            let (ty, count) = {
                let host = &self.hosts[ch];
                (host.synth_ctrl_type, host.synth_ctrl_count)
            };
            self.synth_ctrl_apply(ch, ty, count, data);
        }
    }

    fn synth_ctrl_apply(&mut self, ch: usize, ty: u8, count: u8, value: u16) {
        let Some(v) = self.hosts[ch].voice.map(|v| v as usize) else {
            return;
        };
        for step in 0..=count as u16 {
            let target = ty as u16 + step;
            let synth = &mut self.voices[v].synth;
            match target {
                0x00..=0x03 => synth.entry_pos[target as usize] = value,
                0x04..=0x07 => synth.sustain_pos[target as usize - 0x04] = value,
                0x08..=0x0B => synth.nna_pos[target as usize - 0x08] = value,
                0x0C..=0x0F => synth.dna_pos[target as usize - 0x0C] = value,
                0x10..=0x1F => synth.vars[target as usize & 0x0F] = value as i16,
                0x20..=0x23 => synth.cond[target as usize - 0x20] = value,
                0x24 => self.synth_set_waveform(v, value, false),
                0x25 => synth.vibrato_waveform = value,
                0x26 => synth.tremolo_waveform = value,
                0x27 => synth.pannolo_waveform = value,
                0x28 => synth.arpeggio_waveform = value,
                _ => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Envelope control (0x59 stages, 0x5A applies)
    // ------------------------------------------------------------------

    pub(super) fn fx_envelope_ctrl(&mut self, ch: usize, data: u16) {
        let (kind, change) = ((data >> 8) as u8, data as u8);
        {
            let host = &mut self.hosts[ch];
            host.env_ctrl_kind = kind & 0x7F;
            host.env_ctrl_change = change;
            host.env_ctrl_active = true;
        }
        // Flag toggles and resets need no value command
        let immediate = matches!(
            change,
            0x10 | 0x01 | 0x11 | 0x02 | 0x12 | 0x22 | 0x32 | 0x03 | 0x13
        );
        if immediate {
            self.env_ctrl_apply(ch, kind & 0x7F, change, 0);
        } else if kind & 0x80 != 0 {
            let value = self.hosts[ch].env_value;
            self.env_ctrl_apply(ch, kind & 0x7F, change, value);
        }
    }

    pub(super) fn fx_set_envelope_value(&mut self, ch: usize, data: u16) {
        self.hosts[ch].env_value = data;
        if self.hosts[ch].env_ctrl_active {
            let (kind, change) = {
                let host = &self.hosts[ch];
                (host.env_ctrl_kind, host.env_ctrl_change)
            };
            self.env_ctrl_apply(ch, kind, change, data);
        }
    }

    /// Route an envelope change to wherever the selected envelope lives:
    /// the voice, the host channel or the globals
    fn env_ctrl_apply(&mut self, ch: usize, kind: u8, change: u8, value: u16) {
        let voice = self.hosts[ch].voice.map(|v| v as usize);
        match kind {
            0x00 => {
                if let Some(v) = voice {
                    apply_env_change(&mut self.voices[v].envelopes.volume, change, value);
                }
            }
            0x01 => {
                if let Some(v) = voice {
                    apply_env_change(&mut self.voices[v].envelopes.panning, change, value);
                }
            }
            0x02 => {
                if let Some(v) = voice {
                    apply_env_change(&mut self.voices[v].envelopes.slide, change, value);
                }
            }
            0x03 => apply_env_change(&mut self.hosts[ch].vibrato_env, change, value),
            0x04 => apply_env_change(&mut self.hosts[ch].tremolo_env, change, value),
            0x05 => apply_env_change(&mut self.hosts[ch].pannolo_env, change, value),
            // Channolo and spenolo envelopes belong to unimplemented
            // effects; arpeggio has no envelope runtime
            0x06 | 0x07 | 0x0F => {}
            0x08 => {
                if let Some(v) = voice {
                    apply_env_change(&mut self.voices[v].envelopes.auto_vibrato, change, value);
                }
            }
            0x09 => {
                if let Some(v) = voice {
                    apply_env_change(&mut self.voices[v].envelopes.auto_tremolo, change, value);
                }
            }
            0x0A => {
                if let Some(v) = voice {
                    apply_env_change(&mut self.voices[v].envelopes.auto_pannolo, change, value);
                }
            }
            0x0B => apply_env_change(&mut self.hosts[ch].track_tremolo_env, change, value),
            0x0C => apply_env_change(&mut self.hosts[ch].track_pannolo_env, change, value),
            0x0D => apply_env_change(&mut self.global_tremolo_env, change, value),
            0x0E => apply_env_change(&mut self.global_pannolo_env, change, value),
            0x10 => {
                if let Some(v) = voice {
                    apply_env_change(&mut self.voices[v].envelopes.resonance, change, value);
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // NNA control
    // ------------------------------------------------------------------

    pub(super) fn fx_nna_ctrl(&mut self, ch: usize, data: u16) {
        let (xx, yy) = ((data >> 8) as u8, data as u8);
        let host = &mut self.hosts[ch];
        match xx {
            0x00 => {
                host.nna = match yy {
                    0x01 => NewNoteAction::NoteOff,
                    0x02 => NewNoteAction::Continue,
                    0x03 => NewNoteAction::NoteFade,
                    _ => NewNoteAction::Cut,
                }
            }
            0x11 => {
                let bits = if yy == 0 { 0xFF } else { yy };
                host.dct |= DuplicateCheck::from_bits_truncate(bits);
            }
            0x01 => {
                let bits = if yy == 0 { 0xFF } else { yy };
                host.dct -= DuplicateCheck::from_bits_truncate(bits);
            }
            0x02 => {
                host.dna = match yy {
                    0x01 => DuplicateAction::NoteOff,
                    0x02 => DuplicateAction::NoteFade,
                    _ => DuplicateAction::Cut,
                }
            }
            _ => {}
        }
    }

    pub(super) fn fx_loop_ctrl(&mut self, _ch: usize, _data: u16) {
        // TODO: loop control is not implemented in the source
    }
}

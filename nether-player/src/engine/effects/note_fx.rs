//! Note effects (0x00 - 0x1D)

use tracing::trace;

use nether_seq::{fx, TrackCompatFlags};

use crate::hosts::HostFlags;
use crate::mixer::{Mixer, MixerChannelFlags};
use crate::tables::{amiga_slide_down, amiga_slide_up, linear_slide_down, linear_slide_up};

use super::Player;

/// Steps per semitone in the linear slide table
const SEMITONE_STEPS: u32 = 256;

impl<'m, M: Mixer> Player<'m, M> {
    fn voice_of(&self, ch: usize) -> Option<usize> {
        self.hosts[ch].voice.map(|v| v as usize)
    }

    /// Shift a frequency by a signed number of linear-table steps
    pub(in crate::engine) fn shift_frequency(&self, ch: usize, freq: u32, steps: i32) -> u32 {
        let linear = self.hosts[ch].flags.contains(HostFlags::LINEAR_FREQ);
        let magnitude = steps.unsigned_abs();
        match (steps >= 0, linear) {
            (true, true) => linear_slide_up(freq, magnitude),
            (true, false) => amiga_slide_up(freq, magnitude),
            (false, true) => linear_slide_down(freq, magnitude),
            (false, false) => amiga_slide_down(freq, magnitude),
        }
    }

    // ------------------------------------------------------------------
    // Portamento memory slots with compat-flag sharing
    // ------------------------------------------------------------------

    fn porta_slot<'h>(host: &'h mut crate::hosts::HostChannel<'m>, fx_byte: u8) -> &'h mut u16 {
        match fx_byte {
            fx::PORTA_UP => &mut host.porta_up,
            fx::PORTA_DOWN => &mut host.porta_down,
            fx::FINE_PORTA_UP => &mut host.fine_porta_up,
            fx::FINE_PORTA_DOWN => &mut host.fine_porta_down,
            fx::PORTA_UP_ONCE => &mut host.porta_up_once,
            fx::PORTA_DOWN_ONCE => &mut host.porta_down_once,
            fx::FINE_PORTA_UP_ONCE => &mut host.fine_porta_up_once,
            fx::FINE_PORTA_DOWN_ONCE => &mut host.fine_porta_down_once,
            fx::TONE_PORTA => &mut host.tone_porta,
            fx::FINE_TONE_PORTA => &mut host.fine_tone_porta,
            fx::TONE_PORTA_ONCE => &mut host.tone_porta_once,
            _ => &mut host.fine_tone_porta_once,
        }
    }

    fn porta_opposite(fx_byte: u8) -> u8 {
        match fx_byte {
            fx::PORTA_UP => fx::PORTA_DOWN,
            fx::PORTA_DOWN => fx::PORTA_UP,
            fx::FINE_PORTA_UP => fx::FINE_PORTA_DOWN,
            fx::FINE_PORTA_DOWN => fx::FINE_PORTA_UP,
            fx::PORTA_UP_ONCE => fx::PORTA_DOWN_ONCE,
            fx::PORTA_DOWN_ONCE => fx::PORTA_UP_ONCE,
            fx::FINE_PORTA_UP_ONCE => fx::FINE_PORTA_DOWN_ONCE,
            _ => fx::FINE_PORTA_UP_ONCE,
        }
    }

    fn porta_family(fx_byte: u8) -> [u8; 4] {
        let up = matches!(
            fx_byte,
            fx::PORTA_UP | fx::FINE_PORTA_UP | fx::PORTA_UP_ONCE | fx::FINE_PORTA_UP_ONCE
        );
        if up {
            [
                fx::PORTA_UP,
                fx::FINE_PORTA_UP,
                fx::PORTA_UP_ONCE,
                fx::FINE_PORTA_UP_ONCE,
            ]
        } else {
            [
                fx::PORTA_DOWN,
                fx::FINE_PORTA_DOWN,
                fx::PORTA_DOWN_ONCE,
                fx::FINE_PORTA_DOWN_ONCE,
            ]
        }
    }

    /// Read/update a portamento memory, honouring the track's slide
    /// memory sharing quirks
    fn porta_memory(&mut self, ch: usize, fx_byte: u8, data: u16) -> u16 {
        let compat = self.hosts[ch].compat_flags;
        let host = &mut self.hosts[ch];
        if data == 0 {
            return *Self::porta_slot(host, fx_byte);
        }
        *Self::porta_slot(host, fx_byte) = data;
        if compat.contains(TrackCompatFlags::SLIDES) {
            for slot in Self::porta_family(fx_byte) {
                *Self::porta_slot(host, slot) = data;
            }
        }
        if !compat.contains(TrackCompatFlags::OP_SLIDES) {
            let opposite = Self::porta_opposite(fx_byte);
            *Self::porta_slot(host, opposite) = data;
            if compat.contains(TrackCompatFlags::SLIDES) {
                for slot in Self::porta_family(opposite) {
                    *Self::porta_slot(host, slot) = data;
                }
            }
        }
        if compat.contains(TrackCompatFlags::TONE_PORTA) {
            host.tone_porta = data;
            host.fine_tone_porta = data;
        }
        if compat.contains(TrackCompatFlags::VOLUME_PITCH) {
            host.vol_slide_up = data;
            host.vol_slide_down = data;
        }
        data
    }

    /// Accumulate a portamento amount and move the voice frequency
    ///
    /// `fp` is in 1/256ths of a linear-table step (a full data word is
    /// one table step per 1/256 sub unit); the voice fraction
    /// accumulator carries the remainder between ticks.
    fn apply_porta(&mut self, ch: usize, v: usize, fp: u32, up: bool) {
        let extra = if self.hosts[ch].sub_slides_enabled {
            self.hosts[ch].pitch_sub_slide as u32
        } else {
            0
        };
        let voice = &mut self.voices[v];
        let total = voice.porta_fraction + fp + extra;
        voice.porta_fraction = total & 0xFF;
        let steps = (total >> 8) as i32;
        if steps == 0 {
            return;
        }
        let freq = self.voices[v].frequency;
        let steps = if up { steps } else { -steps };
        self.voices[v].frequency = self.shift_frequency(ch, freq, steps);
    }

    pub(super) fn fx_porta(&mut self, ch: usize, fx_byte: u8, data: u16, up: bool, fine: bool) {
        let mem = self.porta_memory(ch, fx_byte, data);
        let Some(v) = self.voice_of(ch) else {
            return;
        };
        // Fine slides are 16x more accurate than the plain ones
        let fp = if fine { (mem as u32) << 4 } else { (mem as u32) << 8 };
        self.apply_porta(ch, v, fp, up);
    }

    pub(super) fn fx_tone_porta(&mut self, ch: usize, fx_byte: u8, data: u16, fine: bool) {
        let mem = self.porta_memory(ch, fx_byte, data);
        let target = self.hosts[ch].tone_porta_target;
        if target == 0 {
            return;
        }
        let Some(v) = self.voice_of(ch) else {
            return;
        };
        let mut fp = if fine { (mem as u32) << 4 } else { (mem as u32) << 8 };

        // Glissando rounds the slide to whole halftone multiples
        let glissando = self.hosts[ch].glissando as u32;
        if glissando != 0 {
            let unit = SEMITONE_STEPS * glissando;
            fp = (fp >> 8).div_euclid(unit) * unit << 8;
        }

        let freq = self.voices[v].frequency;
        if freq == target {
            return;
        }
        let up = freq < target;
        self.apply_porta(ch, v, fp, up);
        // Overshoot snaps to the target; the target stays as memory
        let new_freq = self.voices[v].frequency;
        if (up && new_freq >= target) || (!up && new_freq <= target) {
            self.voices[v].frequency = target;
        }
    }

    pub(super) fn fx_arpeggio(&mut self, ch: usize, data: u16) {
        if data != 0 {
            let host = &mut self.hosts[ch];
            host.arpeggio_first = (data >> 8) as i8;
            host.arpeggio_second = data as i8;
        }
        let Some(v) = self.voice_of(ch) else {
            return;
        };
        let host = &self.hosts[ch];
        let halftones = match host.arpeggio_tick % 3 {
            0 => 0,
            1 => host.arpeggio_first as i32,
            _ => host.arpeggio_second as i32,
        };
        let base = if host.arpeggio_saved_freq != 0 {
            host.arpeggio_saved_freq
        } else {
            self.voices[v].frequency
        };
        self.hosts[ch].arpeggio_tick += 1;
        self.hosts[ch].arpeggio_saved_freq = base;
        self.voices[v].frequency = if halftones == 0 {
            base
        } else {
            self.shift_frequency(ch, base, halftones * SEMITONE_STEPS as i32)
        };
    }

    pub(super) fn fx_note_slide(&mut self, ch: usize, data: u16) {
        {
            let host = &mut self.hosts[ch];
            let (kind, amount) = ((data >> 8) as u8, data as u8);
            if kind != 0 {
                host.note_slide_type = kind;
            }
            if amount != 0 {
                host.note_slide = amount;
            }
        }
        let Some(v) = self.voice_of(ch) else {
            return;
        };
        let host = &self.hosts[ch];
        let notes = host.note_slide as i32;
        let steps = match host.note_slide_type {
            0x10 | 0x1F => notes * SEMITONE_STEPS as i32,
            0x20 | 0x2F => -notes * SEMITONE_STEPS as i32,
            _ => return,
        };
        let freq = self.voices[v].frequency;
        self.voices[v].frequency = self.shift_frequency(ch, freq, steps);
    }

    // ------------------------------------------------------------------
    // Vibrato
    // ------------------------------------------------------------------

    pub(super) fn preset_vibrato(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        let (rate, depth) = ((data >> 8) as u8, data as i8);
        if rate != 0 {
            host.vibrato_rate = rate;
        }
        if depth != 0 {
            host.vibrato_depth = depth;
        }
    }

    pub(super) fn fx_vibrato(&mut self, ch: usize, data: u16, fine: bool) {
        self.preset_vibrato(ch, data);
        let Some(v) = self.voice_of(ch) else {
            return;
        };
        let mut seed = self.seed;
        let host = &mut self.hosts[ch];
        let mut value = host.vibrato_env.value;
        for _ in 0..host.vibrato_rate {
            value = host.vibrato_env.step(true, &mut seed);
        }
        self.seed = seed;

        let offset = (value as i32 * host.vibrato_depth as i32) >> if fine { 6 } else { 4 };
        let base = if host.vibrato_saved_freq != 0 {
            host.vibrato_saved_freq
        } else {
            self.voices[v].frequency
        };
        self.hosts[ch].vibrato_saved_freq = base;
        self.voices[v].frequency = self.shift_frequency(ch, base, offset);
    }

    // ------------------------------------------------------------------
    // Note timing: keyoff, fade, cut, tremor, retrigger
    // ------------------------------------------------------------------

    pub(super) fn fx_do_keyoff(&mut self, ch: usize, data: u16) {
        if self.hosts[ch].tempo_counter != data {
            return;
        }
        if let Some(v) = self.voice_of(ch) {
            self.key_off_voice(v);
        }
    }

    pub(super) fn fx_do_hold_delay(&mut self, _ch: usize, _data: u16) {
        // TODO: MED hold delay is not implemented in the source
    }

    pub(super) fn fx_note_fade(&mut self, ch: usize, data: u16) {
        if self.hosts[ch].tempo_counter != data {
            return;
        }
        if let Some(v) = self.voice_of(ch) {
            self.voices[v].fading = true;
        }
    }

    pub(super) fn fx_note_cut(&mut self, ch: usize, data: u16) {
        let kill = data & 0xF000 != 0;
        let tick = data & 0x0FFF;
        if self.hosts[ch].tempo_counter != tick {
            return;
        }
        let Some(v) = self.voice_of(ch) else {
            return;
        };
        if kill {
            self.voices[v].cut();
            self.hosts[ch].voice = None;
        } else {
            self.voices[v].volume = 0;
            self.voices[v].sub_volume = 0;
        }
    }

    pub(super) fn fx_tremor(&mut self, ch: usize, data: u16) {
        let Some(v) = self.voice_of(ch) else {
            return;
        };
        let host = &mut self.hosts[ch];
        if host.tempo_counter == 0 {
            if data != 0 {
                host.tremor_on = (data >> 8) as u8;
                host.tremor_off = data as u8;
            }
            host.tremor_count = 0;
        }
        if host.tremor_on == 0 && host.tremor_off == 0 {
            return;
        }
        host.tremor_count += 1;
        if host.tremor_muted {
            if host.tremor_count >= host.tremor_off as u16 {
                host.tremor_muted = false;
                host.tremor_count = 0;
                let (volume, sub) = host.tremor_saved;
                let voice = &mut self.voices[v];
                voice.volume = volume;
                voice.sub_volume = sub;
            }
        } else if host.tremor_count >= host.tremor_on as u16 {
            host.tremor_muted = true;
            host.tremor_count = 0;
            let voice = &mut self.voices[v];
            self.hosts[ch].tremor_saved = (voice.volume, voice.sub_volume);
            voice.volume = 0;
            voice.sub_volume = 0;
        }
    }

    /// Retrigger interval, honouring the divider encoding
    fn retrig_interval(&self, ch: usize, data: u16) -> u16 {
        if data >= 0x8000 {
            let divider = (data & 0x00FF).max(1);
            self.hosts[ch].tempo / divider
        } else {
            data
        }
    }

    fn retrigger_voice(&mut self, v: usize) {
        let voice = &mut self.voices[v];
        voice.mixer.position = 0;
        voice.mixer.flags |= MixerChannelFlags::PLAY;
        voice.mixer.flags -= MixerChannelFlags::BACKWARDS;
    }

    pub(super) fn fx_retrig(&mut self, ch: usize, data: u16) {
        let interval = {
            let computed = self.retrig_interval(ch, data);
            let host = &mut self.hosts[ch];
            if computed != 0 {
                host.retrig_tick = computed;
            }
            host.retrig_tick
        };
        if interval == 0 {
            return;
        }
        let tick = self.hosts[ch].tempo_counter;
        if tick % interval != 0 {
            return;
        }
        if let Some(v) = self.voice_of(ch) {
            self.retrigger_voice(v);
        }
    }

    pub(super) fn fx_multi_retrig(&mut self, ch: usize, data: u16) {
        {
            let host = &mut self.hosts[ch];
            let (count, vol) = ((data >> 8) as u8, data as u8);
            if count != 0 {
                host.multi_retrig_tick = count as u16;
            }
            if vol != 0 {
                host.multi_retrig_vol = vol;
            }
        }
        let interval = self.hosts[ch].multi_retrig_tick;
        if interval == 0 {
            return;
        }
        let tick = self.hosts[ch].tempo_counter;
        if tick % interval != 0 {
            return;
        }
        let Some(v) = self.voice_of(ch) else {
            return;
        };
        self.retrigger_voice(v);

        // The load-bearing dual path: tracker volume mode uses a fixed
        // amplifier of 4, free mode the per-channel amplifier
        let scale: i32 = if self.old_volumes() {
            4
        } else {
            self.hosts[ch].multi_retrig_scale.max(1) as i32
        };
        let mode = self.hosts[ch].multi_retrig_vol;
        let voice = &mut self.voices[v];
        let volume = voice.volume as i32;
        let new_volume = match mode {
            0x80..=0xBF => volume + (mode as i32 - 0x7F) * scale,
            0xC0..=0xFF => volume - (mode as i32 - 0xBF) * scale,
            0x01..=0x7F => {
                let mul = (mode >> 4) as i32;
                let div = (mode & 0x0F) as i32;
                if mul == 0 || div == 0 {
                    volume
                } else {
                    volume * mul / div
                }
            }
            _ => volume,
        };
        voice.volume = new_volume.clamp(0, 255) as u8;
    }

    // ------------------------------------------------------------------
    // Extended control and effect scheduling
    // ------------------------------------------------------------------

    pub(super) fn fx_extended_ctrl(&mut self, ch: usize, data: u16) {
        let selector = (data >> 12) as u8;
        let value = data & 0x0FFF;
        match selector {
            0x0 => {
                if value == 0 {
                    self.hosts[ch].flags |= HostFlags::LINEAR_FREQ;
                } else {
                    self.hosts[ch].flags -= HostFlags::LINEAR_FREQ;
                }
            }
            0x1 => self.hosts[ch].glissando = value & 0xFF,
            0x2 => {
                let part = (value >> 8) as u8 | 0x20;
                let arg = (value & 0xFF) as u8;
                match part {
                    0x20 => {
                        if !self.old_volumes() {
                            self.hosts[ch].multi_retrig_scale = arg.max(1).min(4);
                        }
                    }
                    0x21 => self.hosts[ch].sub_slides_enabled = arg != 0,
                    0x22 => {
                        let host = &mut self.hosts[ch];
                        host.retrig_divider = arg;
                        if arg != 0 {
                            host.multi_retrig_tick = (host.tempo / (arg as u16).max(1)).max(1);
                        }
                    }
                    _ => {}
                }
            }
            0x3 | 0x4 | 0x5 => {
                // Cut / fade / keyoff all background voices of this host
                for v in 0..self.voices.len() {
                    let voice = &self.voices[v];
                    if !(voice.allocated && voice.background && voice.host as usize == ch) {
                        continue;
                    }
                    match selector {
                        0x3 => self.voices[v].cut(),
                        0x4 => self.voices[v].fading = true,
                        _ => self.key_off_voice(v),
                    }
                }
            }
            0x6 => self.hosts[ch].pitch_sub_slide = (value & 0xFF) as u8,
            _ => {}
        }
    }

    pub(super) fn fx_invert_loop(&mut self, ch: usize, _data: u16) {
        // Module data is immutable here, so the sample-mangling Funk It!
        // effect cannot be honoured; it degrades to silence like a NULL
        // effect slot.
        trace!(channel = ch, "invert loop ignored (read-only sample data)");
    }

    pub(super) fn fx_execute_fx(&mut self, ch: usize, data: u16) {
        self.hosts[ch].exec_fx_tick = Some(data);
    }

    pub(super) fn fx_stop_fx(&mut self, ch: usize, data: u16) {
        self.hosts[ch].stop_fx = Some(((data >> 8) as u8, (data & 0x7F) as u8));
    }
}

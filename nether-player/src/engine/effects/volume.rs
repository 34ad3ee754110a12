//! Volume effects (0x20 - 0x2F)
//!
//! All volume state is a 16-bit slide word `volume << 8 | sub_volume`.
//! Slides saturate; tracker volume mode (OLD_VOLUMES) rescales operands
//! so 0x00-0x40 ranges behave like 0x00-0xFF.

use nether_seq::{fx, TrackCompatFlags};

use crate::mixer::Mixer;

use super::Player;

impl<'m, M: Mixer> Player<'m, M> {
    fn voice_volume_word(&self, ch: usize) -> Option<(usize, u16)> {
        let v = self.hosts[ch].voice? as usize;
        let voice = &self.voices[v];
        Some((v, ((voice.volume as u16) << 8) | voice.sub_volume as u16))
    }

    fn set_voice_volume_word(&mut self, v: usize, word: u16) {
        let voice = &mut self.voices[v];
        voice.volume = (word >> 8) as u8;
        voice.sub_volume = word as u8;
    }

    fn track_volume_word(&self, ch: usize) -> u16 {
        let host = &self.hosts[ch];
        ((host.track_volume as u16) << 8) | host.track_sub_volume as u16
    }

    fn set_track_volume_word(&mut self, ch: usize, word: u16) {
        let host = &mut self.hosts[ch];
        host.track_volume = (word >> 8) as u8;
        host.track_sub_volume = word as u8;
    }

    fn slide_slot<'h>(host: &'h mut crate::hosts::HostChannel<'m>, byte: u8) -> &'h mut u16 {
        match byte {
            fx::VOL_SLIDE_UP => &mut host.vol_slide_up,
            fx::VOL_SLIDE_DOWN => &mut host.vol_slide_down,
            fx::FINE_VOL_SLIDE_UP => &mut host.fine_vol_slide_up,
            fx::FINE_VOL_SLIDE_DOWN => &mut host.fine_vol_slide_down,
            fx::TRACK_VOL_SLIDE_UP => &mut host.track_vol_slide_up,
            fx::TRACK_VOL_SLIDE_DOWN => &mut host.track_vol_slide_down,
            fx::FINE_TRACK_VOL_SLIDE_UP => &mut host.fine_track_vol_slide_up,
            fx::FINE_TRACK_VOL_SLIDE_DOWN => &mut host.fine_track_vol_slide_down,
            fx::PAN_SLIDE_LEFT => &mut host.pan_slide_left,
            fx::PAN_SLIDE_RIGHT => &mut host.pan_slide_right,
            fx::FINE_PAN_SLIDE_LEFT => &mut host.fine_pan_slide_left,
            fx::FINE_PAN_SLIDE_RIGHT => &mut host.fine_pan_slide_right,
            fx::TRACK_PAN_SLIDE_LEFT => &mut host.track_pan_slide_left,
            fx::TRACK_PAN_SLIDE_RIGHT => &mut host.track_pan_slide_right,
            fx::FINE_TRACK_PAN_SLIDE_LEFT => &mut host.fine_track_pan_slide_left,
            _ => &mut host.fine_track_pan_slide_right,
        }
    }

    fn slide_opposite(byte: u8) -> u8 {
        match byte {
            fx::VOL_SLIDE_UP => fx::VOL_SLIDE_DOWN,
            fx::VOL_SLIDE_DOWN => fx::VOL_SLIDE_UP,
            fx::FINE_VOL_SLIDE_UP => fx::FINE_VOL_SLIDE_DOWN,
            fx::FINE_VOL_SLIDE_DOWN => fx::FINE_VOL_SLIDE_UP,
            fx::TRACK_VOL_SLIDE_UP => fx::TRACK_VOL_SLIDE_DOWN,
            fx::TRACK_VOL_SLIDE_DOWN => fx::TRACK_VOL_SLIDE_UP,
            fx::FINE_TRACK_VOL_SLIDE_UP => fx::FINE_TRACK_VOL_SLIDE_DOWN,
            fx::FINE_TRACK_VOL_SLIDE_DOWN => fx::FINE_TRACK_VOL_SLIDE_UP,
            fx::PAN_SLIDE_LEFT => fx::PAN_SLIDE_RIGHT,
            fx::PAN_SLIDE_RIGHT => fx::PAN_SLIDE_LEFT,
            fx::FINE_PAN_SLIDE_LEFT => fx::FINE_PAN_SLIDE_RIGHT,
            fx::FINE_PAN_SLIDE_RIGHT => fx::FINE_PAN_SLIDE_LEFT,
            fx::TRACK_PAN_SLIDE_LEFT => fx::TRACK_PAN_SLIDE_RIGHT,
            fx::TRACK_PAN_SLIDE_RIGHT => fx::TRACK_PAN_SLIDE_LEFT,
            fx::FINE_TRACK_PAN_SLIDE_LEFT => fx::FINE_TRACK_PAN_SLIDE_RIGHT,
            _ => fx::FINE_TRACK_PAN_SLIDE_LEFT,
        }
    }

    /// Update a non-portamento slide memory, honouring the track quirks
    /// that share slide memories across commands and directions
    pub(super) fn volume_memory(&mut self, ch: usize, fx_byte: u8, data: u16) -> u16 {
        let compat = self.hosts[ch].compat_flags;
        if data == 0 {
            return *Self::slide_slot(&mut self.hosts[ch], fx_byte);
        }
        *Self::slide_slot(&mut self.hosts[ch], fx_byte) = data;
        if !compat.contains(TrackCompatFlags::OP_VOLUME_SLIDES) {
            *Self::slide_slot(&mut self.hosts[ch], Self::slide_opposite(fx_byte)) = data;
        }
        if compat.contains(TrackCompatFlags::VOLUME_SLIDES) {
            for byte in [
                fx::VOL_SLIDE_UP,
                fx::VOL_SLIDE_DOWN,
                fx::TRACK_VOL_SLIDE_UP,
                fx::TRACK_VOL_SLIDE_DOWN,
                fx::PAN_SLIDE_LEFT,
                fx::PAN_SLIDE_RIGHT,
                fx::TRACK_PAN_SLIDE_LEFT,
                fx::TRACK_PAN_SLIDE_RIGHT,
            ] {
                *Self::slide_slot(&mut self.hosts[ch], byte) = data;
            }
        }
        if compat.contains(TrackCompatFlags::VOLUME_PITCH) {
            let host = &mut self.hosts[ch];
            host.porta_up = data;
            host.porta_down = data;
        }
        data
    }

    /// Extra sub-slide applied when SET_SUB_SLIDE targets this level
    fn sub_slide_extra(&self, ch: usize, target_bit: u8) -> i32 {
        let host = &self.hosts[ch];
        if host.sub_slides_enabled && host.sub_slide_bits & target_bit != 0 {
            host.sub_slide as i32
        } else {
            0
        }
    }

    // ------------------------------------------------------------------
    // Note volume
    // ------------------------------------------------------------------

    pub(super) fn fx_set_volume(&mut self, ch: usize, data: u16) {
        let word = self.scale_volume_word(data);
        if let Some((v, _)) = self.voice_volume_word(ch) {
            self.set_voice_volume_word(v, word);
        }
    }

    pub(super) fn fx_vol_slide(&mut self, ch: usize, fx_byte: u8, data: u16, up: bool) {
        let mem = self.volume_memory(ch, fx_byte, data);
        let Some((v, word)) = self.voice_volume_word(ch) else {
            return;
        };
        let delta = self.scale_volume_word(mem) as i32 + self.sub_slide_extra(ch, 0x01);
        let delta = if up { delta } else { -delta };
        self.set_voice_volume_word(v, Self::slide_word(word, delta));
    }

    pub(super) fn fx_vol_slide_to(&mut self, ch: usize, data: u16) {
        let (xx, yy) = ((data >> 8) as u8, data as u8);
        match xx {
            0x01..=0xFE => {
                self.hosts[ch].vol_slide_to_target =
                    self.scale_volume_word(((xx as u16) << 8) | yy as u16);
            }
            _ => {
                // 0x00 slides every tick, 0xFF only on the first
                if xx == 0xFF && self.hosts[ch].tempo_counter != 0 {
                    return;
                }
                if yy != 0 {
                    self.hosts[ch].vol_slide_to = yy as u16;
                }
                let rate = self.scale_volume_word(self.hosts[ch].vol_slide_to << 8);
                let target = self.hosts[ch].vol_slide_to_target;
                if let Some((v, word)) = self.voice_volume_word(ch) {
                    self.set_voice_volume_word(v, Self::slide_word_toward(word, target, rate));
                }
            }
        }
    }

    pub(super) fn fx_tremolo(&mut self, ch: usize, data: u16) {
        {
            let host = &mut self.hosts[ch];
            let (rate, depth) = ((data >> 8) as u8, data as i8);
            if rate != 0 {
                host.tremolo_rate = rate;
            }
            if depth != 0 {
                host.tremolo_depth = depth;
            }
        }
        let Some((v, word)) = self.voice_volume_word(ch) else {
            return;
        };
        let mut seed = self.seed;
        let host = &mut self.hosts[ch];
        let mut value = host.tremolo_env.value;
        for _ in 0..host.tremolo_rate {
            value = host.tremolo_env.step(true, &mut seed);
        }
        self.seed = seed;
        let offset = ((value as i32 * host.tremolo_depth as i32) >> 8) << 8;
        let rollback = host.tremolo_slide;
        host.tremolo_slide = offset;
        let word = Self::slide_word(word, offset - rollback);
        self.set_voice_volume_word(v, word);
    }

    // ------------------------------------------------------------------
    // Track volume
    // ------------------------------------------------------------------

    pub(super) fn fx_set_track_volume(&mut self, ch: usize, data: u16) {
        let word = self.scale_volume_word(data);
        self.set_track_volume_word(ch, word);
    }

    pub(super) fn fx_track_vol_slide(&mut self, ch: usize, fx_byte: u8, data: u16, up: bool) {
        let mem = self.volume_memory(ch, fx_byte, data);
        let word = self.track_volume_word(ch);
        let delta = self.scale_volume_word(mem) as i32 + self.sub_slide_extra(ch, 0x02);
        let delta = if up { delta } else { -delta };
        self.set_track_volume_word(ch, Self::slide_word(word, delta));
    }

    pub(super) fn fx_track_vol_slide_to(&mut self, ch: usize, data: u16) {
        let (xx, yy) = ((data >> 8) as u8, data as u8);
        match xx {
            0x01..=0xFE => {
                self.hosts[ch].track_vol_slide_to_target =
                    self.scale_volume_word(((xx as u16) << 8) | yy as u16);
            }
            _ => {
                if xx == 0xFF && self.hosts[ch].tempo_counter != 0 {
                    return;
                }
                if yy != 0 {
                    self.hosts[ch].track_vol_slide_to = yy as u16;
                }
                let rate = self.scale_volume_word(self.hosts[ch].track_vol_slide_to << 8);
                let target = self.hosts[ch].track_vol_slide_to_target;
                let word = self.track_volume_word(ch);
                self.set_track_volume_word(ch, Self::slide_word_toward(word, target, rate));
            }
        }
    }

    pub(super) fn fx_track_tremolo(&mut self, ch: usize, data: u16) {
        {
            let host = &mut self.hosts[ch];
            let (rate, depth) = ((data >> 8) as u8, data as i8);
            if rate != 0 {
                host.track_tremolo_rate = rate;
            }
            if depth != 0 {
                host.track_tremolo_depth = depth;
            }
        }
        let word = self.track_volume_word(ch);
        let mut seed = self.seed;
        let host = &mut self.hosts[ch];
        let mut value = host.track_tremolo_env.value;
        for _ in 0..host.track_tremolo_rate {
            value = host.track_tremolo_env.step(true, &mut seed);
        }
        self.seed = seed;
        let offset = ((value as i32 * host.track_tremolo_depth as i32) >> 8) << 8;
        let rollback = host.track_tremolo_slide;
        host.track_tremolo_slide = offset;
        let word = Self::slide_word(word, offset - rollback);
        self.set_track_volume_word(ch, word);
    }
}

//! Global effects (0x60 - 0x7F): speed, channel control, global mix state

use nether_seq::fx;

use crate::hosts::ChannelControl;
use crate::mixer::Mixer;

use super::Player;

impl<'m, M: Mixer> Player<'m, M> {
    fn push_tempo(&mut self) {
        self.recompute_tempo();
        let tempo = self.effective_tempo();
        self.mixer.set_tempo(tempo);
    }

    /// Current timing-mode value with its clamp range
    fn speed_value(&self) -> (u16, u16, u16) {
        if self.speed_type == 2 {
            (self.spd_speed, self.song.spd_min, self.song.spd_max)
        } else {
            (self.bpm_speed, self.song.bpm_speed_min, self.song.bpm_speed_max)
        }
    }

    fn set_speed_value(&mut self, value: u16) {
        if self.speed_type == 2 {
            self.spd_speed = value;
        } else {
            self.bpm_speed = value;
        }
        self.push_tempo();
    }

    pub(super) fn fx_set_speed(&mut self, _ch: usize, data: u16) {
        let selector = (data >> 12) as u8;
        let value = data & 0x0FFF;
        let set_only = selector & 0x8 != 0;
        match selector & 0x7 {
            0 => {
                let v = if value == 0 { self.song.bpm_speed } else { value };
                self.bpm_speed = v.clamp(self.song.bpm_speed_min, self.song.bpm_speed_max);
                if !set_only {
                    self.speed_type = 0;
                }
            }
            1 => {
                let v = if value == 0 { self.song.bpm_tempo } else { value };
                self.bpm_tempo = v.clamp(self.song.bpm_tempo_min, self.song.bpm_tempo_max);
                if !set_only {
                    self.speed_type = 0;
                }
            }
            2 => {
                let v = if value == 0 { self.song.spd_speed } else { value };
                self.spd_speed = v.clamp(self.song.spd_min, self.song.spd_max);
                if !set_only {
                    self.speed_type = 2;
                }
            }
            7 => {
                let mul = ((value >> 4) & 0x0F) as u32;
                let div = (value & 0x0F) as u32;
                self.relative_speed = if mul != 0 && div != 0 {
                    (mul << 16) / div
                } else {
                    0x10000
                };
            }
            _ => {}
        }
        self.push_tempo();
    }

    pub(super) fn fx_speed_slide(&mut self, _ch: usize, fx_byte: u8, data: u16, faster: bool) {
        let mem = match fx_byte {
            fx::SPEED_SLIDE_FASTER => Self::fx_memory(&mut self.speed_slide_faster, data),
            fx::SPEED_SLIDE_SLOWER => Self::fx_memory(&mut self.speed_slide_slower, data),
            fx::FINE_SPEED_SLIDE_FASTER => {
                Self::fx_memory(&mut self.fine_speed_slide_faster, data)
            }
            _ => Self::fx_memory(&mut self.fine_speed_slide_slower, data),
        };
        if mem == 0 {
            return;
        }
        let (value, min, max) = self.speed_value();
        let delta = if faster { mem as i32 } else { -(mem as i32) };
        let value = (value as i32 + delta).clamp(min as i32, max as i32) as u16;
        self.set_speed_value(value);
    }

    pub(super) fn fx_speed_slide_to(&mut self, ch: usize, data: u16) {
        let (xx, yy) = ((data >> 8) as u8, data as u8);
        match xx {
            0x01..=0xFE => self.speed_slide_to_target = xx,
            _ => {
                if xx == 0xFF && self.hosts[ch].tempo_counter != 0 {
                    return;
                }
                if yy != 0 {
                    self.speed_slide_to = yy;
                }
                let rate = (self.speed_slide_to as i8).unsigned_abs() as u16;
                if rate == 0 || self.speed_slide_to_target == 0 {
                    return;
                }
                let (value, min, max) = self.speed_value();
                let target = (self.speed_slide_to_target as u16).clamp(min, max);
                let value = if value < target {
                    value.saturating_add(rate).min(target)
                } else {
                    value.saturating_sub(rate).max(target)
                };
                self.set_speed_value(value);
            }
        }
    }

    pub(super) fn fx_spenolo(&mut self, ch: usize, data: u16) {
        // TODO: spenolo is not implemented in the source; the staging is
        // kept so modules relying on memory reads stay consistent
        let (rate, depth) = ((data >> 8) as u8, data as i8);
        if rate != 0 {
            self.spenolo_rate = rate;
        }
        if depth != 0 {
            self.spenolo_depth = depth;
        }
        let _ = ch;
    }

    pub(super) fn fx_channel_ctrl(&mut self, ch: usize, data: u16) {
        let selector = (data >> 8) as u8;
        let zz = data as u8;
        match selector {
            0x00 => {
                let host = &mut self.hosts[ch];
                match zz {
                    0x00 => host.ctrl = ChannelControl::Off,
                    0x01 => host.ctrl = ChannelControl::Normal,
                    0x02 => host.ctrl = ChannelControl::Multiple,
                    0x03 => host.ctrl = ChannelControl::Global,
                    0x04 => {
                        let target = host.ctrl_channel as usize;
                        host.select_channel(target, true);
                    }
                    0x05 => {
                        let target = host.ctrl_channel as usize;
                        host.select_channel(target, false);
                    }
                    0x06 => {
                        for byte in host.ctrl_bitmap.iter_mut() {
                            *byte = !*byte;
                        }
                    }
                    // TODO: the once/tick/row/track control scopes are
                    // not implemented in the source
                    0x10..=0x14 => {}
                    0x20 => host.ctrl_affect_notes = true,
                    0x21 => host.ctrl_affect_notes = false,
                    0x30 => host.ctrl_affect_non_notes = true,
                    0x31 => host.ctrl_affect_non_notes = false,
                    _ => {}
                }
            }
            0x01 => self.hosts[ch].ctrl_channel = zz as u16,
            // TODO: effect-channel slides and channolo are not
            // implemented in the source
            0x02..=0x0A => {}
            0x10 => match zz {
                0x00 => self.hosts[ch].channel_surround = false,
                0x01 => self.hosts[ch].channel_surround = true,
                0x10 => self.hosts[ch].track_surround = false,
                0x11 => self.hosts[ch].track_surround = true,
                0x20 => self.global_surround = false,
                0x21 => self.global_surround = true,
                _ => {}
            },
            0x11 => self.hosts[ch].muted = zz == 0,
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Global volume
    // ------------------------------------------------------------------

    fn global_volume_word(&self) -> u16 {
        ((self.global_volume as u16) << 8) | self.global_sub_volume as u16
    }

    fn set_global_volume_word(&mut self, word: u16) {
        self.global_volume = (word >> 8) as u8;
        self.global_sub_volume = word as u8;
    }

    pub(super) fn fx_set_global_volume(&mut self, _ch: usize, data: u16) {
        let word = self.scale_volume_word(data);
        self.set_global_volume_word(word);
    }

    pub(super) fn fx_global_vol_slide(&mut self, ch: usize, fx_byte: u8, data: u16, up: bool) {
        let mem = match fx_byte {
            fx::GLOBAL_VOL_SLIDE_UP => Self::fx_memory(&mut self.global_vol_slide_up, data),
            fx::GLOBAL_VOL_SLIDE_DOWN => Self::fx_memory(&mut self.global_vol_slide_down, data),
            fx::FINE_GLOBAL_VOL_SLIDE_UP => {
                Self::fx_memory(&mut self.fine_global_vol_slide_up, data)
            }
            _ => Self::fx_memory(&mut self.fine_global_vol_slide_down, data),
        };
        let host = &self.hosts[ch];
        let extra = if host.sub_slides_enabled && host.sub_slide_bits & 0x04 != 0 {
            host.sub_slide as i32
        } else {
            0
        };
        let delta = self.scale_volume_word(mem) as i32 + extra;
        let delta = if up { delta } else { -delta };
        let word = Self::slide_word(self.global_volume_word(), delta);
        self.set_global_volume_word(word);
    }

    pub(super) fn fx_global_vol_slide_to(&mut self, ch: usize, data: u16) {
        let (xx, yy) = ((data >> 8) as u8, data as u8);
        match xx {
            0x01..=0xFE => {
                self.global_vol_slide_to_target =
                    self.scale_volume_word(((xx as u16) << 8) | yy as u16);
            }
            _ => {
                if xx == 0xFF && self.hosts[ch].tempo_counter != 0 {
                    return;
                }
                if yy != 0 {
                    self.global_vol_slide_to = yy as u16;
                }
                let rate = self.scale_volume_word(self.global_vol_slide_to << 8);
                let target = self.global_vol_slide_to_target;
                let word = Self::slide_word_toward(self.global_volume_word(), target, rate);
                self.set_global_volume_word(word);
            }
        }
    }

    pub(super) fn fx_global_tremolo(&mut self, ch: usize, data: u16) {
        if data != 0 {
            self.global_tremolo_rate = (data >> 8) as u8;
            self.global_tremolo_depth = data as i8;
        }
        // The shape comes from the executing channel's instrument
        if self.global_tremolo_env.envelope.is_none() {
            if let Some(instr) = self.module.instrument(self.hosts[ch].instrument) {
                self.global_tremolo_env
                    .set(instr.envelopes.tremolo.as_ref());
            }
        }
        let mut seed = self.seed;
        let mut value = self.global_tremolo_env.value;
        for _ in 0..self.global_tremolo_rate {
            value = self.global_tremolo_env.step(true, &mut seed);
        }
        self.seed = seed;
        let offset = ((value as i32 * self.global_tremolo_depth as i32) >> 8) << 8;
        let rollback = self.global_tremolo_slide;
        self.global_tremolo_slide = offset;
        let word = Self::slide_word(self.global_volume_word(), offset - rollback);
        self.set_global_volume_word(word);
    }

    // ------------------------------------------------------------------
    // Global panning
    // ------------------------------------------------------------------

    fn global_pan_word(&self) -> u16 {
        ((self.global_panning as u16) << 8) | self.global_sub_panning as u16
    }

    fn set_global_pan_word(&mut self, word: u16) {
        self.global_panning = (word >> 8) as u8;
        self.global_sub_panning = word as u8;
        self.global_surround = false;
    }

    pub(super) fn fx_set_global_panning(&mut self, _ch: usize, data: u16) {
        self.set_global_pan_word(data);
    }

    pub(super) fn fx_global_pan_slide(&mut self, ch: usize, fx_byte: u8, data: u16, right: bool) {
        let mem = match fx_byte {
            fx::GLOBAL_PAN_SLIDE_LEFT => Self::fx_memory(&mut self.global_pan_slide_left, data),
            fx::GLOBAL_PAN_SLIDE_RIGHT => {
                Self::fx_memory(&mut self.global_pan_slide_right, data)
            }
            fx::FINE_GLOBAL_PAN_SLIDE_LEFT => {
                Self::fx_memory(&mut self.fine_global_pan_slide_left, data)
            }
            _ => Self::fx_memory(&mut self.fine_global_pan_slide_right, data),
        };
        let host = &self.hosts[ch];
        let extra = if host.sub_slides_enabled && host.sub_slide_bits & 0x20 != 0 {
            host.sub_slide as i32
        } else {
            0
        };
        let delta = mem as i32 + extra;
        let delta = if right { delta } else { -delta };
        let word = Self::slide_word(self.global_pan_word(), delta);
        self.set_global_pan_word(word);
    }

    pub(super) fn fx_global_pan_slide_to(&mut self, ch: usize, data: u16) {
        let (xx, yy) = ((data >> 8) as u8, data as u8);
        match xx {
            0x01..=0xFE => {
                self.global_pan_slide_to_target = ((xx as u16) << 8) | yy as u16;
            }
            _ => {
                if xx == 0xFF && self.hosts[ch].tempo_counter != 0 {
                    return;
                }
                if yy != 0 {
                    self.global_pan_slide_to = yy as u16;
                }
                let rate = self.global_pan_slide_to << 8;
                let target = self.global_pan_slide_to_target;
                let word = Self::slide_word_toward(self.global_pan_word(), target, rate);
                self.set_global_pan_word(word);
            }
        }
    }

    pub(super) fn fx_global_pannolo(&mut self, ch: usize, data: u16) {
        if data != 0 {
            self.global_pannolo_rate = (data >> 8) as u8;
            self.global_pannolo_depth = data as i8;
        }
        if self.global_pannolo_env.envelope.is_none() {
            if let Some(instr) = self.module.instrument(self.hosts[ch].instrument) {
                self.global_pannolo_env
                    .set(instr.envelopes.pannolo.as_ref());
            }
        }
        let mut seed = self.seed;
        let mut value = self.global_pannolo_env.value;
        for _ in 0..self.global_pannolo_rate {
            value = self.global_pannolo_env.step(true, &mut seed);
        }
        self.seed = seed;
        let offset = ((value as i32 * self.global_pannolo_depth as i32) >> 8) << 8;
        let rollback = self.global_pannolo_slide;
        self.global_pannolo_slide = offset;
        let word = Self::slide_word(self.global_pan_word(), offset - rollback);
        self.set_global_pan_word(word);
    }

    pub(super) fn fx_user_sync(&mut self, _ch: usize, data: u16) {
        self.user_sync = data;
    }
}

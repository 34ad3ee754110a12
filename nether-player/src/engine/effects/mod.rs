//! Effect dispatch
//!
//! A 128-slot descriptor table keyed by the 7-bit effect command drives
//! the two-pass row execution: the first pass fires first-tick-only
//! effects, the second the continuous ones. Channel control can reroute
//! an effect to other host channels; the per-tick `effects_used` bitmap
//! keeps any effect slot from firing twice on the same channel and tick.

mod global;
mod instr;
mod note_fx;
mod panning;
mod track;
mod volume;

use nether_seq::fx;

use crate::hosts::ChannelControl;
use crate::mixer::Mixer;

use super::Player;

/// One slot of the effect dispatch table
#[derive(Debug, Clone, Copy)]
pub(super) struct EffectDesc {
    /// Slot is populated (NULL slots are silently skipped)
    pub used: bool,
    /// Fires on ticks >= std_exec_tick instead of only the first tick
    pub continuous: bool,
    /// Participates in the pre-row preset sweep
    pub preset: bool,
    /// Default tick a continuous effect first fires on
    pub std_exec_tick: u8,
    /// Counts as a note effect for channel-control affect masks
    pub note_fx: bool,
}

const NONE: EffectDesc = EffectDesc {
    used: false,
    continuous: false,
    preset: false,
    std_exec_tick: 0,
    note_fx: false,
};

const fn first(note_fx: bool) -> EffectDesc {
    EffectDesc {
        used: true,
        continuous: false,
        preset: false,
        std_exec_tick: 0,
        note_fx,
    }
}

const fn cont(std_exec_tick: u8, note_fx: bool) -> EffectDesc {
    EffectDesc {
        used: true,
        continuous: true,
        preset: false,
        std_exec_tick,
        note_fx,
    }
}

const fn preset_of(base: EffectDesc) -> EffectDesc {
    EffectDesc {
        used: base.used,
        continuous: base.continuous,
        preset: true,
        std_exec_tick: base.std_exec_tick,
        note_fx: base.note_fx,
    }
}

/// The 128-entry dispatch table
pub(super) const EFFECT_TABLE: [EffectDesc; 128] = {
    let mut t = [NONE; 128];

    // Note effects
    t[fx::ARPEGGIO as usize] = cont(0, true);
    t[fx::PORTA_UP as usize] = cont(1, true);
    t[fx::PORTA_DOWN as usize] = cont(1, true);
    t[fx::FINE_PORTA_UP as usize] = cont(1, true);
    t[fx::FINE_PORTA_DOWN as usize] = cont(1, true);
    t[fx::PORTA_UP_ONCE as usize] = first(true);
    t[fx::PORTA_DOWN_ONCE as usize] = first(true);
    t[fx::FINE_PORTA_UP_ONCE as usize] = first(true);
    t[fx::FINE_PORTA_DOWN_ONCE as usize] = first(true);
    t[fx::TONE_PORTA as usize] = preset_of(cont(1, true));
    t[fx::FINE_TONE_PORTA as usize] = preset_of(cont(1, true));
    t[fx::TONE_PORTA_ONCE as usize] = preset_of(first(true));
    t[fx::FINE_TONE_PORTA_ONCE as usize] = preset_of(first(true));
    t[fx::NOTE_SLIDE as usize] = first(true);
    t[fx::VIBRATO as usize] = preset_of(cont(1, true));
    t[fx::FINE_VIBRATO as usize] = preset_of(cont(1, true));
    t[fx::VIBRATO_ONCE as usize] = preset_of(first(true));
    t[fx::FINE_VIBRATO_ONCE as usize] = preset_of(first(true));
    t[fx::DO_KEYOFF as usize] = cont(0, true);
    t[fx::DO_HOLD_DELAY as usize] = cont(0, true);
    t[fx::NOTE_FADE as usize] = cont(0, true);
    t[fx::NOTE_CUT as usize] = cont(0, true);
    t[fx::NOTE_DELAY as usize] = preset_of(cont(0, true));
    t[fx::TREMOR as usize] = cont(0, true);
    t[fx::RETRIG_NOTE as usize] = cont(0, true);
    t[fx::MULTI_RETRIG as usize] = cont(0, true);
    t[fx::EXTENDED_CTRL as usize] = first(true);
    t[fx::INVERT_LOOP as usize] = cont(0, true);
    t[fx::EXECUTE_FX as usize] = first(true);
    t[fx::STOP_FX as usize] = first(true);

    // Volume effects
    t[fx::SET_VOLUME as usize] = first(false);
    t[fx::VOL_SLIDE_UP as usize] = cont(1, false);
    t[fx::VOL_SLIDE_DOWN as usize] = cont(1, false);
    t[fx::FINE_VOL_SLIDE_UP as usize] = first(false);
    t[fx::FINE_VOL_SLIDE_DOWN as usize] = first(false);
    t[fx::VOL_SLIDE_TO as usize] = cont(1, false);
    t[fx::TREMOLO as usize] = preset_of(cont(1, false));
    t[fx::TREMOLO_ONCE as usize] = preset_of(first(false));
    t[fx::SET_TRACK_VOLUME as usize] = first(false);
    t[fx::TRACK_VOL_SLIDE_UP as usize] = cont(1, false);
    t[fx::TRACK_VOL_SLIDE_DOWN as usize] = cont(1, false);
    t[fx::FINE_TRACK_VOL_SLIDE_UP as usize] = first(false);
    t[fx::FINE_TRACK_VOL_SLIDE_DOWN as usize] = first(false);
    t[fx::TRACK_VOL_SLIDE_TO as usize] = cont(1, false);
    t[fx::TRACK_TREMOLO as usize] = preset_of(cont(1, false));
    t[fx::TRACK_TREMOLO_ONCE as usize] = preset_of(first(false));

    // Panning effects
    t[fx::SET_PANNING as usize] = first(false);
    t[fx::PAN_SLIDE_LEFT as usize] = cont(1, false);
    t[fx::PAN_SLIDE_RIGHT as usize] = cont(1, false);
    t[fx::FINE_PAN_SLIDE_LEFT as usize] = first(false);
    t[fx::FINE_PAN_SLIDE_RIGHT as usize] = first(false);
    t[fx::PAN_SLIDE_TO as usize] = cont(1, false);
    t[fx::PANNOLO as usize] = preset_of(cont(1, false));
    t[fx::PANNOLO_ONCE as usize] = preset_of(first(false));
    t[fx::SET_TRACK_PANNING as usize] = first(false);
    t[fx::TRACK_PAN_SLIDE_LEFT as usize] = cont(1, false);
    t[fx::TRACK_PAN_SLIDE_RIGHT as usize] = cont(1, false);
    t[fx::FINE_TRACK_PAN_SLIDE_LEFT as usize] = first(false);
    t[fx::FINE_TRACK_PAN_SLIDE_RIGHT as usize] = first(false);
    t[fx::TRACK_PAN_SLIDE_TO as usize] = cont(1, false);
    t[fx::TRACK_PANNOLO as usize] = preset_of(cont(1, false));
    t[fx::TRACK_PANNOLO_ONCE as usize] = preset_of(first(false));

    // Track effects
    t[fx::SET_TEMPO as usize] = first(false);
    t[fx::SET_RELATIVE_TEMPO as usize] = first(false);
    t[fx::PATTERN_BREAK as usize] = first(false);
    t[fx::POSITION_JUMP as usize] = first(false);
    t[fx::RELATIVE_POSITION_JUMP as usize] = first(false);
    t[fx::CHANGE_PATTERN as usize] = first(false);
    t[fx::REVERSE_PLAY as usize] = first(false);
    t[fx::PATTERN_DELAY as usize] = first(false);
    t[fx::FINE_PATTERN_DELAY as usize] = first(false);
    t[fx::PATTERN_LOOP as usize] = first(false);
    t[fx::GOSUB as usize] = first(false);
    t[fx::GOSUB_RETURN as usize] = first(false);
    t[fx::CHANNEL_SYNC as usize] = first(false);
    t[fx::SET_SUB_SLIDE as usize] = first(false);

    // Instrument, sample and synth effects
    t[fx::SAMPLE_OFFSET_HIGH as usize] = first(false);
    t[fx::SAMPLE_OFFSET_LOW as usize] = first(false);
    t[fx::SET_HOLD as usize] = first(false);
    t[fx::SET_DECAY as usize] = first(false);
    t[fx::SET_TRANSPOSE as usize] = preset_of(first(false));
    t[fx::INSTRUMENT_CTRL as usize] = first(false);
    t[fx::INSTRUMENT_CHANGE as usize] = first(false);
    t[fx::SYNTH_CTRL as usize] = first(false);
    t[fx::SET_SYNTH_VALUE as usize] = first(false);
    t[fx::ENVELOPE_CTRL as usize] = first(false);
    t[fx::SET_ENVELOPE_VALUE as usize] = first(false);
    t[fx::NNA_CTRL as usize] = first(false);
    t[fx::LOOP_CTRL as usize] = first(false);

    // Global effects
    t[fx::SET_SPEED as usize] = first(false);
    t[fx::SPEED_SLIDE_FASTER as usize] = cont(1, false);
    t[fx::SPEED_SLIDE_SLOWER as usize] = cont(1, false);
    t[fx::FINE_SPEED_SLIDE_FASTER as usize] = first(false);
    t[fx::FINE_SPEED_SLIDE_SLOWER as usize] = first(false);
    t[fx::SPEED_SLIDE_TO as usize] = cont(1, false);
    t[fx::SPENOLO as usize] = cont(1, false);
    t[fx::SPENOLO_ONCE as usize] = first(false);
    t[fx::CHANNEL_CTRL as usize] = first(false);
    t[fx::SET_GLOBAL_VOLUME as usize] = first(false);
    t[fx::GLOBAL_VOL_SLIDE_UP as usize] = cont(1, false);
    t[fx::GLOBAL_VOL_SLIDE_DOWN as usize] = cont(1, false);
    t[fx::FINE_GLOBAL_VOL_SLIDE_UP as usize] = first(false);
    t[fx::FINE_GLOBAL_VOL_SLIDE_DOWN as usize] = first(false);
    t[fx::GLOBAL_VOL_SLIDE_TO as usize] = cont(1, false);
    t[fx::GLOBAL_TREMOLO as usize] = cont(1, false);
    t[fx::GLOBAL_TREMOLO_ONCE as usize] = first(false);
    t[fx::SET_GLOBAL_PANNING as usize] = first(false);
    t[fx::GLOBAL_PAN_SLIDE_LEFT as usize] = cont(1, false);
    t[fx::GLOBAL_PAN_SLIDE_RIGHT as usize] = cont(1, false);
    t[fx::FINE_GLOBAL_PAN_SLIDE_LEFT as usize] = first(false);
    t[fx::FINE_GLOBAL_PAN_SLIDE_RIGHT as usize] = first(false);
    t[fx::GLOBAL_PAN_SLIDE_TO as usize] = cont(1, false);
    t[fx::GLOBAL_PANNOLO as usize] = cont(1, false);
    t[fx::GLOBAL_PANNOLO_ONCE as usize] = first(false);
    t[fx::USER_SYNC as usize] = first(false);

    t
};

impl<'m, M: Mixer> Player<'m, M> {
    /// Pre-row sweep: effects that must seed host state before the note
    /// cell is read
    pub(in crate::engine) fn preset_row_effects(&mut self, ch: usize) {
        let Some(row) = self.current_row(ch) else {
            return;
        };
        for effect in &row.effects {
            let fx_byte = effect.command & 0x7F;
            if !EFFECT_TABLE[fx_byte as usize].preset {
                continue;
            }
            self.preset_effect(ch, fx_byte, effect.data);
        }
    }

    /// Run the row's effects for the current tick, both passes
    pub(in crate::engine) fn run_row_effects(&mut self, ch: usize) {
        // An expired note delay replays the stored note cell first
        let tick = self.hosts[ch].tempo_counter;
        if self.hosts[ch].note_delay_tick == Some(tick) && tick != 0 {
            self.hosts[ch].note_delay_tick = None;
            let host = &self.hosts[ch];
            let (octave, note, instrument) = (
                host.delayed_octave,
                host.delayed_note,
                host.delayed_instrument,
            );
            self.process_note(ch, octave, note, instrument);
        }

        for continuous_pass in [false, true] {
            let Some(row) = self.current_row(ch) else {
                return;
            };
            for slot in 0..row.effects.len() {
                let effect = row.effects[slot];
                self.run_one_effect(ch, ch, slot, effect.command, effect.data, continuous_pass);

                // Channel control reroutes the effect to other hosts
                if self.hosts[ch].ctrl != ChannelControl::Off {
                    let fx_byte = (effect.command & 0x7F) as usize;
                    let desc = &EFFECT_TABLE[fx_byte];
                    let affect = if desc.note_fx {
                        self.hosts[ch].ctrl_affect_notes
                    } else {
                        self.hosts[ch].ctrl_affect_non_notes
                    };
                    if affect {
                        for target in 0..self.hosts.len() {
                            if target != ch && self.hosts[ch].controls_channel(target) {
                                self.run_one_effect(
                                    ch,
                                    target,
                                    slot,
                                    effect.command,
                                    effect.data,
                                    continuous_pass,
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    /// Gate one effect slot and dispatch it against `target`
    ///
    /// `src` is the channel whose row carries the effect; `target` the
    /// channel whose state it mutates (differs under channel control).
    fn run_one_effect(
        &mut self,
        src: usize,
        target: usize,
        slot: usize,
        command: u8,
        data: u16,
        continuous_pass: bool,
    ) {
        let fx_byte = command & 0x7F;
        let desc = &EFFECT_TABLE[fx_byte as usize];
        if !desc.used || desc.continuous != continuous_pass {
            return;
        }

        let tick = self.hosts[src].tempo_counter;
        if desc.continuous {
            let exec_tick = self.hosts[target]
                .exec_fx_tick
                .unwrap_or(desc.std_exec_tick as u16);
            if tick < exec_tick {
                return;
            }
        } else if tick != 0 {
            return;
        }

        if let Some((stop_tick, stop_fx)) = self.hosts[target].stop_fx {
            if stop_fx == fx_byte && tick >= stop_tick as u16 {
                return;
            }
        }

        let bit = 1u16 << (slot & 0x0F);
        if self.hosts[target].effects_used & bit != 0 {
            return;
        }
        self.hosts[target].effects_used |= bit;

        self.dispatch_effect(target, fx_byte, data);
    }

    /// The tagged dispatch over the whole command range
    pub(in crate::engine) fn dispatch_effect(&mut self, ch: usize, fx_byte: u8, data: u16) {
        if EFFECT_TABLE[fx_byte as usize].used {
            self.hosts[ch].last_fx = fx_byte;
        }
        match fx_byte {
            fx::ARPEGGIO => self.fx_arpeggio(ch, data),
            fx::PORTA_UP | fx::PORTA_UP_ONCE => self.fx_porta(ch, fx_byte, data, true, false),
            fx::PORTA_DOWN | fx::PORTA_DOWN_ONCE => {
                self.fx_porta(ch, fx_byte, data, false, false)
            }
            fx::FINE_PORTA_UP | fx::FINE_PORTA_UP_ONCE => {
                self.fx_porta(ch, fx_byte, data, true, true)
            }
            fx::FINE_PORTA_DOWN | fx::FINE_PORTA_DOWN_ONCE => {
                self.fx_porta(ch, fx_byte, data, false, true)
            }
            fx::TONE_PORTA | fx::TONE_PORTA_ONCE => self.fx_tone_porta(ch, fx_byte, data, false),
            fx::FINE_TONE_PORTA | fx::FINE_TONE_PORTA_ONCE => {
                self.fx_tone_porta(ch, fx_byte, data, true)
            }
            fx::NOTE_SLIDE => self.fx_note_slide(ch, data),
            fx::VIBRATO | fx::VIBRATO_ONCE => self.fx_vibrato(ch, data, false),
            fx::FINE_VIBRATO | fx::FINE_VIBRATO_ONCE => self.fx_vibrato(ch, data, true),
            fx::DO_KEYOFF => self.fx_do_keyoff(ch, data),
            fx::DO_HOLD_DELAY => self.fx_do_hold_delay(ch, data),
            fx::NOTE_FADE => self.fx_note_fade(ch, data),
            fx::NOTE_CUT => self.fx_note_cut(ch, data),
            fx::NOTE_DELAY => {}
            fx::TREMOR => self.fx_tremor(ch, data),
            fx::RETRIG_NOTE => self.fx_retrig(ch, data),
            fx::MULTI_RETRIG => self.fx_multi_retrig(ch, data),
            fx::EXTENDED_CTRL => self.fx_extended_ctrl(ch, data),
            fx::INVERT_LOOP => self.fx_invert_loop(ch, data),
            fx::EXECUTE_FX => self.fx_execute_fx(ch, data),
            fx::STOP_FX => self.fx_stop_fx(ch, data),

            fx::SET_VOLUME => self.fx_set_volume(ch, data),
            fx::VOL_SLIDE_UP | fx::FINE_VOL_SLIDE_UP => {
                self.fx_vol_slide(ch, fx_byte, data, true)
            }
            fx::VOL_SLIDE_DOWN | fx::FINE_VOL_SLIDE_DOWN => {
                self.fx_vol_slide(ch, fx_byte, data, false)
            }
            fx::VOL_SLIDE_TO => self.fx_vol_slide_to(ch, data),
            fx::TREMOLO | fx::TREMOLO_ONCE => self.fx_tremolo(ch, data),
            fx::SET_TRACK_VOLUME => self.fx_set_track_volume(ch, data),
            fx::TRACK_VOL_SLIDE_UP | fx::FINE_TRACK_VOL_SLIDE_UP => {
                self.fx_track_vol_slide(ch, fx_byte, data, true)
            }
            fx::TRACK_VOL_SLIDE_DOWN | fx::FINE_TRACK_VOL_SLIDE_DOWN => {
                self.fx_track_vol_slide(ch, fx_byte, data, false)
            }
            fx::TRACK_VOL_SLIDE_TO => self.fx_track_vol_slide_to(ch, data),
            fx::TRACK_TREMOLO | fx::TRACK_TREMOLO_ONCE => self.fx_track_tremolo(ch, data),

            fx::SET_PANNING => self.fx_set_panning(ch, data),
            fx::PAN_SLIDE_LEFT | fx::FINE_PAN_SLIDE_LEFT => {
                self.fx_pan_slide(ch, fx_byte, data, false)
            }
            fx::PAN_SLIDE_RIGHT | fx::FINE_PAN_SLIDE_RIGHT => {
                self.fx_pan_slide(ch, fx_byte, data, true)
            }
            fx::PAN_SLIDE_TO => self.fx_pan_slide_to(ch, data),
            fx::PANNOLO | fx::PANNOLO_ONCE => self.fx_pannolo(ch, data),
            fx::SET_TRACK_PANNING => self.fx_set_track_panning(ch, data),
            fx::TRACK_PAN_SLIDE_LEFT | fx::FINE_TRACK_PAN_SLIDE_LEFT => {
                self.fx_track_pan_slide(ch, fx_byte, data, false)
            }
            fx::TRACK_PAN_SLIDE_RIGHT | fx::FINE_TRACK_PAN_SLIDE_RIGHT => {
                self.fx_track_pan_slide(ch, fx_byte, data, true)
            }
            fx::TRACK_PAN_SLIDE_TO => self.fx_track_pan_slide_to(ch, data),
            fx::TRACK_PANNOLO | fx::TRACK_PANNOLO_ONCE => self.fx_track_pannolo(ch, data),

            fx::SET_TEMPO => self.fx_set_tempo(ch, data),
            fx::SET_RELATIVE_TEMPO => self.fx_set_relative_tempo(ch, data),
            fx::PATTERN_BREAK => self.fx_pattern_break(ch, data),
            fx::POSITION_JUMP => self.fx_position_jump(ch, data),
            fx::RELATIVE_POSITION_JUMP => self.fx_relative_position_jump(ch, data),
            fx::CHANGE_PATTERN => self.fx_change_pattern(ch, data),
            fx::REVERSE_PLAY => self.fx_reverse_play(ch, data),
            fx::PATTERN_DELAY => self.fx_pattern_delay(ch, data),
            fx::FINE_PATTERN_DELAY => self.fx_fine_pattern_delay(ch, data),
            fx::PATTERN_LOOP => self.fx_pattern_loop(ch, data),
            fx::GOSUB => self.fx_gosub(ch, data),
            fx::GOSUB_RETURN => self.fx_gosub_return(ch, data),
            fx::CHANNEL_SYNC => self.fx_channel_sync(ch, data),
            fx::SET_SUB_SLIDE => self.fx_set_sub_slide(ch, data),

            fx::SAMPLE_OFFSET_HIGH => self.fx_sample_offset_high(ch, data),
            fx::SAMPLE_OFFSET_LOW => self.fx_sample_offset_low(ch, data),
            fx::SET_HOLD => self.fx_set_hold(ch, data),
            fx::SET_DECAY => self.fx_set_decay(ch, data),
            fx::SET_TRANSPOSE => self.fx_set_transpose(ch, data),
            fx::INSTRUMENT_CTRL => self.fx_instrument_ctrl(ch, data),
            fx::INSTRUMENT_CHANGE => self.fx_instrument_change(ch, data),
            fx::SYNTH_CTRL => self.fx_synth_ctrl(ch, data),
            fx::SET_SYNTH_VALUE => self.fx_set_synth_value(ch, data),
            fx::ENVELOPE_CTRL => self.fx_envelope_ctrl(ch, data),
            fx::SET_ENVELOPE_VALUE => self.fx_set_envelope_value(ch, data),
            fx::NNA_CTRL => self.fx_nna_ctrl(ch, data),
            fx::LOOP_CTRL => self.fx_loop_ctrl(ch, data),

            fx::SET_SPEED => self.fx_set_speed(ch, data),
            fx::SPEED_SLIDE_FASTER | fx::FINE_SPEED_SLIDE_FASTER => {
                self.fx_speed_slide(ch, fx_byte, data, true)
            }
            fx::SPEED_SLIDE_SLOWER | fx::FINE_SPEED_SLIDE_SLOWER => {
                self.fx_speed_slide(ch, fx_byte, data, false)
            }
            fx::SPEED_SLIDE_TO => self.fx_speed_slide_to(ch, data),
            fx::SPENOLO | fx::SPENOLO_ONCE => self.fx_spenolo(ch, data),
            fx::CHANNEL_CTRL => self.fx_channel_ctrl(ch, data),
            fx::SET_GLOBAL_VOLUME => self.fx_set_global_volume(ch, data),
            fx::GLOBAL_VOL_SLIDE_UP | fx::FINE_GLOBAL_VOL_SLIDE_UP => {
                self.fx_global_vol_slide(ch, fx_byte, data, true)
            }
            fx::GLOBAL_VOL_SLIDE_DOWN | fx::FINE_GLOBAL_VOL_SLIDE_DOWN => {
                self.fx_global_vol_slide(ch, fx_byte, data, false)
            }
            fx::GLOBAL_VOL_SLIDE_TO => self.fx_global_vol_slide_to(ch, data),
            fx::GLOBAL_TREMOLO | fx::GLOBAL_TREMOLO_ONCE => self.fx_global_tremolo(ch, data),
            fx::SET_GLOBAL_PANNING => self.fx_set_global_panning(ch, data),
            fx::GLOBAL_PAN_SLIDE_LEFT | fx::FINE_GLOBAL_PAN_SLIDE_LEFT => {
                self.fx_global_pan_slide(ch, fx_byte, data, false)
            }
            fx::GLOBAL_PAN_SLIDE_RIGHT | fx::FINE_GLOBAL_PAN_SLIDE_RIGHT => {
                self.fx_global_pan_slide(ch, fx_byte, data, true)
            }
            fx::GLOBAL_PAN_SLIDE_TO => self.fx_global_pan_slide_to(ch, data),
            fx::GLOBAL_PANNOLO | fx::GLOBAL_PANNOLO_ONCE => self.fx_global_pannolo(ch, data),
            fx::USER_SYNC => self.fx_user_sync(ch, data),

            _ => {}
        }
    }

    /// Preset sweep dispatch
    fn preset_effect(&mut self, ch: usize, fx_byte: u8, data: u16) {
        match fx_byte {
            fx::TONE_PORTA | fx::FINE_TONE_PORTA | fx::TONE_PORTA_ONCE
            | fx::FINE_TONE_PORTA_ONCE => {
                // The row's note becomes the slide target instead of
                // retriggering the voice
                self.hosts[ch].tone_porta_pending = true;
            }
            fx::VIBRATO | fx::FINE_VIBRATO | fx::VIBRATO_ONCE | fx::FINE_VIBRATO_ONCE => {
                self.preset_vibrato(ch, data);
            }
            fx::TREMOLO | fx::TREMOLO_ONCE | fx::TRACK_TREMOLO | fx::TRACK_TREMOLO_ONCE => {}
            fx::PANNOLO | fx::PANNOLO_ONCE | fx::TRACK_PANNOLO | fx::TRACK_PANNOLO_ONCE => {}
            fx::NOTE_DELAY => {
                if data != 0 {
                    self.hosts[ch].note_delay_tick = Some(data);
                }
            }
            fx::SET_TRANSPOSE => self.fx_set_transpose(ch, data),
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Shared slide arithmetic
    // ------------------------------------------------------------------

    /// True when the sub-song uses tracker 0x00-0x40 volume ranges
    pub(super) fn old_volumes(&self) -> bool {
        self.song
            .compat_flags
            .contains(nether_seq::SongCompatFlags::OLD_VOLUMES)
    }

    /// Rescale a volume data word in old-volume mode
    pub(super) fn scale_volume_word(&self, data: u16) -> u16 {
        if self.old_volumes() {
            if data < 0x4000 {
                data << 2
            } else {
                0xFFFF
            }
        } else {
            data
        }
    }

    /// Apply a signed delta to a 16-bit volume word, saturating
    pub(super) fn slide_word(value: u16, delta: i32) -> u16 {
        (value as i32 + delta).clamp(0, 0xFFFF) as u16
    }

    /// Move a 16-bit word monotonically toward a target, snapping on
    /// overshoot
    pub(super) fn slide_word_toward(value: u16, target: u16, rate: u16) -> u16 {
        if value < target {
            value.saturating_add(rate).min(target)
        } else {
            value.saturating_sub(rate).max(target)
        }
    }

    /// Effect memory update: returns the operand, remembering non-zero
    /// data words
    pub(super) fn fx_memory(memory: &mut u16, data: u16) -> u16 {
        if data != 0 {
            *memory = data;
        }
        *memory
    }
}

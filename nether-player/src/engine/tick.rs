//! The per-tick orchestrator
//!
//! Six phases, in order: pull back mixer state, trace/hook dispatch,
//! global timing advance, per-host row processing, per-voice update,
//! bookkeeping.

use crate::hosts::HostFlags;
use crate::mixer::{Mixer, MixerChannelFlags};
use crate::TIME_BASE;

use super::row::RowAdvance;
use super::{HookFlags, Player};

impl<'m, M: Mixer> Player<'m, M> {
    /// Process one audio tick
    ///
    /// Infallible at its boundary: missing or inconsistent input is
    /// normalised, never reported.
    pub fn handle_tick(&mut self) {
        if self.hosts.is_empty() || self.voices.is_empty() {
            return;
        }

        // Phase 1: refresh voice positions and play flags from the mixer
        self.pull_mixer_state();

        // Phase 2: trace mode pauses everything else
        if self.trace_count > 0 {
            self.trace_count -= 1;
            return;
        }
        if let Some(hook) = self.begin_hook {
            if hook.flags.contains(HookFlags::BEGINNING)
                || (hook.flags.contains(HookFlags::SONG_END) && self.song_end)
            {
                (hook.func)(self, hook.user_data);
            }
        }

        // Phase 3: global timing advance
        self.advance_play_time();

        // Phase 4: per host channel row processing, in index order. The
        // effects_used bitmaps clear once per tick so channel-control
        // rerouting cannot double-fire an effect slot.
        for host in &mut self.hosts {
            host.effects_used = 0;
        }
        for ch in 0..self.hosts.len() {
            self.process_host(ch);
        }

        // Phase 5: per voice update, in index order
        for v in 0..self.voices.len() {
            self.update_voice(v);
        }

        // Phase 6: bookkeeping
        self.active_voices = self
            .voices
            .iter()
            .filter(|v| v.mixer.flags.contains(MixerChannelFlags::PLAY))
            .count() as u16;
        if !self.song_end && self.hosts.iter().all(|h| h.reported_end) {
            self.song_end = true;
        }
        if let Some(hook) = self.end_hook {
            if hook.flags.contains(HookFlags::BEGINNING)
                || (hook.flags.contains(HookFlags::SONG_END) && self.song_end)
            {
                (hook.func)(self, hook.user_data);
            }
        }
        self.tick_count += 1;
    }

    /// Phase 1: pull playback position and play state back per voice
    fn pull_mixer_state(&mut self) {
        for (idx, voice) in self.voices.iter_mut().enumerate() {
            if !voice.allocated {
                continue;
            }
            let status = self.mixer.get_channel(idx);
            // Mixer-driven changes must not read as engine-side changes
            voice.mixer.position = status.position;
            voice.last_push.position = status.position;
            let pulled = status.flags & (MixerChannelFlags::BACKWARDS | MixerChannelFlags::PLAY);
            voice.mixer.flags =
                (voice.mixer.flags - (MixerChannelFlags::BACKWARDS | MixerChannelFlags::PLAY))
                    | pulled;
            voice.last_push.flags =
                (voice.last_push.flags - (MixerChannelFlags::BACKWARDS | MixerChannelFlags::PLAY))
                    | pulled;
        }
    }

    /// Phase 3: accumulate wall-clock and musical play time
    ///
    /// `advance = TIME_BASE x 655360 / effective_tempo`, carried with a
    /// 32-bit fractional accumulator so long runs do not drift.
    fn advance_play_time(&mut self) {
        let wall = ((TIME_BASE * 10) << 32) / self.effective_tempo() as u64;
        let sum = self.play_time_frac as u64 + (wall & 0xFFFF_FFFF);
        self.play_time += (wall >> 32) + (sum >> 32);
        self.play_time_frac = sum as u32;

        let ticks = ((TIME_BASE * 10) << 32) / self.tempo.max(1) as u64;
        let sum = self.play_ticks_frac as u64 + (ticks & 0xFFFF_FFFF);
        self.play_ticks += (ticks >> 32) + (sum >> 32);
        self.play_ticks_frac = sum as u32;
    }

    /// Phase 4 for one host channel
    fn process_host(&mut self, ch: usize) {
        if !self.hosts[ch].playing() {
            return;
        }
        self.hosts[ch].flags -= HostFlags::NOTE_END_GUARD;

        let host = &mut self.hosts[ch];
        if host.tempo == 0 {
            // Tempo zero parks the channel entirely
            return;
        }
        host.tempo_counter += 1;
        let boundary = host.tempo_counter >= host.fine_pattern_delay + host.tempo;

        if boundary {
            self.hosts[ch].tempo_counter = 0;
            let mut advance = self.row_boundary(ch);
            // END sentinel: cross at most one order boundary per tick
            while advance == RowAdvance::Row && self.row_is_end(ch) {
                if !self.note_end_sentinel(ch) {
                    advance = RowAdvance::None;
                    break;
                }
            }
            match advance {
                RowAdvance::Row => self.read_row(ch),
                RowAdvance::Held => self.preset_row_effects(ch),
                RowAdvance::None => return,
            }
        }

        if self.hosts[ch].playing() {
            self.run_row_effects(ch);
        }
    }
}

//! Row boundary and order-list traversal
//!
//! The pattern-flow state machine of a host channel: advancing rows,
//! honouring pattern delay/break/loop/jump flags, walking the order list
//! with its skip and end markers, and detecting song end.

use tracing::trace;

use nether_seq::{note, OrderFlags, TrackFlags};

use crate::hosts::HostFlags;
use crate::mixer::Mixer;
use crate::PlayMode;

use super::Player;

/// Outcome of a row-boundary transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RowAdvance {
    /// Channel has nothing to play
    None,
    /// A new row was entered: read notes and fire effects
    Row,
    /// Row held under pattern delay: effects re-run, notes do not
    Held,
}

impl<'m, M: Mixer> Player<'m, M> {
    /// Enter the order list at `start`, walking forward over skipped
    /// entries until a playable one is found
    ///
    /// Disables the channel (play-once) or wraps to the repeat start when
    /// the end of the list is reached. Returns true when a playable entry
    /// was entered.
    pub(super) fn enter_order(&mut self, ch: usize, start: u16) -> bool {
        let song = self.song;
        let Some(list) = song.order_list(ch as u16) else {
            self.hosts[ch].flags |= HostFlags::DISABLED;
            return false;
        };
        let length = (list.length as usize).min(list.entries.len());
        let host = &mut self.hosts[ch];
        if host.order_played.len() != length {
            host.order_played = vec![0; length];
        }

        let mut pos = start as usize;
        let mut wrapped = false;
        loop {
            let Some(entry) = list.entries.get(pos).filter(|_| pos < length) else {
                // Fell past the last entry
                host.reported_end = true;
                if self.play_mode == PlayMode::Once || wrapped {
                    host.flags |= HostFlags::SONG_END;
                    host.track = None;
                    return false;
                }
                wrapped = true;
                pos = list.rep_start as usize;
                continue;
            };

            if entry.flags.contains(OrderFlags::END_SONG) {
                host.reported_end = true;
                host.flags |= HostFlags::SONG_END;
                host.track = None;
                return false;
            }
            if entry.flags.contains(OrderFlags::END_ORDER) {
                host.reported_end = true;
                if self.play_mode == PlayMode::Once || wrapped {
                    host.flags |= HostFlags::SONG_END;
                    host.track = None;
                    return false;
                }
                wrapped = true;
                pos = list.rep_start as usize;
                continue;
            }

            let skip = entry.track.is_none()
                || (self.play_mode == PlayMode::Once
                    && entry.flags.contains(OrderFlags::NOT_IN_ONCE))
                || (self.play_mode == PlayMode::Repeat
                    && entry.flags.contains(OrderFlags::NOT_IN_REPEAT));
            if skip {
                pos += 1;
                continue;
            }

            // Recursion guard against GoSub/jump loops
            if host.order_played[pos] >= song.gosub_stack_size {
                trace!(channel = ch, order = pos, "order re-entry limit, disabling");
                host.flags |= HostFlags::DISABLED;
                host.track = None;
                return false;
            }
            host.order_played[pos] += 1;

            let track_idx = entry.track.expect("skip covers missing track");
            let Some(track) = song.track(track_idx) else {
                pos += 1;
                continue;
            };

            host.order = pos as u16;
            host.track = Some(track_idx);
            host.first_row = entry.first_row;
            host.last_row = if entry.last_row == 0xFFFF {
                track.last_row
            } else {
                entry.last_row
            };
            host.compat_flags = track.compat_flags;

            if track.flags.contains(TrackFlags::REVERSE) {
                host.flags |= HostFlags::BACKWARDS;
            }
            host.row = if host.flags.contains(HostFlags::BACKWARDS) {
                host.last_row
            } else {
                host.first_row
            };

            if entry.tempo != 0 {
                host.tempo = entry.tempo;
                host.flags |= HostFlags::TEMPO_OVERRIDE;
            } else if track.flags.contains(TrackFlags::USE_TIMING)
                && !host.flags.contains(HostFlags::TEMPO_OVERRIDE)
            {
                host.tempo = track.frames;
            }

            // Track volume, overridable per order entry
            let base_volume = if entry.flags.contains(OrderFlags::SET_VOLUME) {
                (entry.volume, entry.sub_volume)
            } else {
                (track.volume, track.sub_volume)
            };
            host.track_volume = ((base_volume.0 as u16 * list.volume as u16) / 255) as u8;
            host.track_sub_volume = base_volume.1;
            if track.flags.contains(TrackFlags::PANNING) {
                host.track_panning = track.panning;
                host.track_sub_panning = track.sub_panning;
                host.track_surround = track.flags.contains(TrackFlags::SURROUND);
            }
            return true;
        }
    }

    /// Row-boundary transition for one host channel
    ///
    /// Applies the pending pattern-flow flags in priority order, advances
    /// the row (or holds it under pattern delay) and crosses order
    /// boundaries.
    pub(super) fn row_boundary(&mut self, ch: usize) -> RowAdvance {
        // Roll back the arpeggio adjustment so the new row starts from
        // the true note frequency
        if self.hosts[ch].arpeggio_saved_freq != 0 {
            if let Some(v) = self.hosts[ch].voice {
                self.voices[v as usize].frequency = self.hosts[ch].arpeggio_saved_freq;
            }
            self.hosts[ch].arpeggio_saved_freq = 0;
        }
        if self.hosts[ch].vibrato_saved_freq != 0 {
            if let Some(v) = self.hosts[ch].voice {
                self.voices[v as usize].frequency = self.hosts[ch].vibrato_saved_freq;
            }
            self.hosts[ch].vibrato_saved_freq = 0;
        }

        let host = &mut self.hosts[ch];
        host.reset_row_state();
        host.fine_pattern_delay = 0;

        // The very first boundary reads the entry row instead of
        // advancing past it
        if host.flags.contains(HostFlags::ROW_FRESH) {
            host.flags -= HostFlags::ROW_FRESH;
            return if host.track.is_some() {
                RowAdvance::Row
            } else {
                RowAdvance::None
            };
        }

        // Pattern delay holds the row without advancing
        if host.pattern_delay != 0 {
            if host.pattern_delay_count < host.pattern_delay {
                host.pattern_delay_count += 1;
                return if host.track.is_some() {
                    RowAdvance::Held
                } else {
                    RowAdvance::None
                };
            }
            host.pattern_delay = 0;
            host.pattern_delay_count = 0;
        }

        if host.flags.contains(HostFlags::PATTERN_LOOP) {
            host.flags -= HostFlags::PATTERN_LOOP;
            return if host.track.is_some() {
                RowAdvance::Row
            } else {
                RowAdvance::None
            };
        }

        if host.flags.contains(HostFlags::CHG_PATTERN) {
            host.flags -= HostFlags::CHG_PATTERN;
            let target = host.chg_pattern;
            if self.song.track(target).is_some() {
                let host = &mut self.hosts[ch];
                host.track = Some(target);
                let track = self.song.track(target).expect("checked above");
                host.first_row = 0;
                host.last_row = track.last_row;
                host.row = if host.flags.contains(HostFlags::BACKWARDS) {
                    host.last_row
                } else {
                    0
                };
            }
            return if self.hosts[ch].track.is_some() {
                RowAdvance::Row
            } else {
                RowAdvance::None
            };
        }

        if host.flags.contains(HostFlags::POSITION_JUMP) {
            host.flags -= HostFlags::POSITION_JUMP | HostFlags::PATTERN_BREAK;
            let target_order = host.jump_order;
            let break_row = host.break_row;
            host.break_row = 0;
            if self.enter_order(ch, target_order) {
                let host = &mut self.hosts[ch];
                host.row = break_row.clamp(host.first_row, host.last_row);
                return RowAdvance::Row;
            }
            return RowAdvance::None;
        }

        if host.flags.contains(HostFlags::PATTERN_BREAK) {
            host.flags -= HostFlags::PATTERN_BREAK;
            let next = host.order + 1;
            let break_row = host.break_row;
            host.break_row = 0;
            if self.enter_order(ch, next) {
                let host = &mut self.hosts[ch];
                host.row = break_row.clamp(host.first_row, host.last_row);
                return RowAdvance::Row;
            }
            return RowAdvance::None;
        }

        // Plain row advance, backwards under reverse play
        if host.flags.contains(HostFlags::BACKWARDS) {
            if host.row > host.first_row {
                host.row -= 1;
                return RowAdvance::Row;
            }
        } else if host.row < host.last_row {
            host.row += 1;
            return RowAdvance::Row;
        }

        let next = self.hosts[ch].order + 1;
        if self.enter_order(ch, next) {
            RowAdvance::Row
        } else {
            RowAdvance::None
        }
    }

    /// Handle the END row sentinel: leave the order entry at most once
    /// per tick, disabling the channel on a ping-pong
    pub(super) fn note_end_sentinel(&mut self, ch: usize) -> bool {
        let host = &mut self.hosts[ch];
        if host.flags.contains(HostFlags::NOTE_END_GUARD) {
            host.flags |= HostFlags::DISABLED;
            host.track = None;
            return false;
        }
        host.flags |= HostFlags::NOTE_END_GUARD;
        let next = host.order + 1;
        self.enter_order(ch, next)
    }

    /// Current row of a host channel, if any
    pub(super) fn current_row(&self, ch: usize) -> Option<&'m nether_seq::TrackRow> {
        let host = &self.hosts[ch];
        let track = self.song.track(host.track?)?;
        track.row(host.row)
    }

    /// True when the row carries the END pattern sentinel
    pub(super) fn row_is_end(&self, ch: usize) -> bool {
        self.current_row(ch)
            .map(|row| row.note == note::END)
            .unwrap_or(false)
    }
}

//! Track effects (0x40 - 0x4D): tempo and pattern flow

use nether_seq::SongCompatFlags;

use crate::hosts::HostFlags;
use crate::mixer::Mixer;

use super::Player;

impl<'m, M: Mixer> Player<'m, M> {
    pub(super) fn fx_set_tempo(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        if data == 0 {
            // Tempo zero marks the song end for this channel
            host.flags |= HostFlags::SONG_END;
            host.reported_end = true;
            return;
        }
        host.tempo = data.clamp(self.song.frames_min, self.song.frames_max);
        host.flags |= HostFlags::TEMPO_OVERRIDE;
    }

    pub(super) fn fx_set_relative_tempo(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        let tempo = (host.tempo as i32 + data as i16 as i32)
            .clamp(self.song.frames_min as i32, self.song.frames_max as i32);
        host.tempo = tempo as u16;
        host.flags |= HostFlags::TEMPO_OVERRIDE;
    }

    pub(super) fn fx_pattern_break(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        host.break_row = data;
        host.flags |= HostFlags::PATTERN_BREAK;
    }

    pub(super) fn fx_position_jump(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        host.jump_order = data;
        host.break_row = 0;
        host.flags |= HostFlags::POSITION_JUMP;
    }

    pub(super) fn fx_relative_position_jump(&mut self, ch: usize, data: u16) {
        // The order scan bumps its counter twice per entry, so only every
        // second step lands: the effective jump is ceil(n / 2). Kept
        // as-is for byte compatibility with existing modules.
        let n = data as i16 as i32;
        let step = if n >= 0 { (n + 1) / 2 } else { -((-n + 1) / 2) };
        let host = &mut self.hosts[ch];
        host.jump_order = (host.order as i32 + step).max(0) as u16;
        host.break_row = 0;
        host.flags |= HostFlags::POSITION_JUMP;
    }

    pub(super) fn fx_change_pattern(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        host.chg_pattern = data;
        host.flags |= HostFlags::CHG_PATTERN;
    }

    pub(super) fn fx_reverse_play(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        match data {
            0xFF00 => host.flags |= HostFlags::BACKWARDS,
            0x0001 => host.flags -= HostFlags::BACKWARDS,
            0 => host.flags.toggle(HostFlags::BACKWARDS),
            _ => {}
        }
    }

    pub(super) fn fx_pattern_delay(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        if host.pattern_delay == 0 {
            host.pattern_delay = data;
            host.pattern_delay_count = 0;
        }
    }

    pub(super) fn fx_fine_pattern_delay(&mut self, ch: usize, data: u16) {
        self.hosts[ch].fine_pattern_delay = data;
    }

    pub(super) fn fx_pattern_loop(&mut self, ch: usize, data: u16) {
        // GLOBAL_LOOP shares one loop stack through channel 0
        let stack_ch = if self
            .song
            .compat_flags
            .contains(SongCompatFlags::GLOBAL_LOOP)
        {
            0
        } else {
            ch
        };
        let row = self.hosts[ch].row;

        if data == 0 {
            let host = &mut self.hosts[stack_ch];
            if host.loop_stack.is_empty() {
                return;
            }
            // A full stack overwrites the newest mark; re-marking the
            // same row keeps the running loop count alive
            let slot = host.loop_depth.min(host.loop_stack.len() - 1);
            if host.loop_stack[slot].row != row {
                host.loop_stack[slot] = crate::hosts::LoopMark { row, count: 0 };
                if host.loop_depth < host.loop_stack.len() - 1 {
                    host.loop_depth += 1;
                }
            }
            return;
        }

        let (jump_row, jump) = {
            let host = &mut self.hosts[stack_ch];
            if host.loop_stack.is_empty() {
                return;
            }
            let top = host.loop_depth.min(host.loop_stack.len() - 1);
            let slot = if host.loop_depth > 0 && host.loop_stack[top].row > row {
                top - 1
            } else {
                top
            };
            let idx = slot.min(host.loop_stack.len() - 1);
            let mark = &mut host.loop_stack[idx];
            if mark.count == 0 {
                mark.count = data;
                (mark.row, true)
            } else {
                mark.count -= 1;
                if mark.count == 0 {
                    // Exhausted: pop the mark, fall through the loop
                    if host.loop_depth > 0 {
                        host.loop_depth -= 1;
                    }
                    (0, false)
                } else {
                    (mark.row, true)
                }
            }
        };
        if jump {
            let host = &mut self.hosts[ch];
            host.row = jump_row;
            host.flags |= HostFlags::PATTERN_LOOP;
        }
    }

    pub(super) fn fx_gosub(&mut self, _ch: usize, _data: u16) {
        // TODO: GoSub is not implemented in the source
    }

    pub(super) fn fx_gosub_return(&mut self, _ch: usize, _data: u16) {
        // TODO: GoSub return is not implemented in the source
    }

    pub(super) fn fx_channel_sync(&mut self, _ch: usize, _data: u16) {
        // TODO: channel synchronization is not implemented in the source
    }

    pub(super) fn fx_set_sub_slide(&mut self, ch: usize, data: u16) {
        let host = &mut self.hosts[ch];
        host.sub_slide_bits = (data >> 8) as u8;
        host.sub_slide = data as u8;
    }
}

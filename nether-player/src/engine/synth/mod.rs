//! Synth VM
//!
//! Four independent program contexts per voice (volume, panning, slide,
//! special) execute the sample's micro-program once per tick, in that
//! order. All contexts share the sixteen 16-bit variables; each has its
//! own condition code word, wait and kill counters and entry point.
//! Negative opcodes fall through to the track effect table.

mod ops;

use tracing::trace;

use crate::mixer::Mixer;
use crate::voices::{SynthContext, SynthState};

use super::Player;

/// Instruction budget per context per tick; a program spinning past this
/// yields instead of hanging the tick handler
const SYNTH_BUDGET: u32 = 1024;

/// What an executed instruction tells the per-tick loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SynthStep {
    /// Keep decoding
    Continue,
    /// Context yields until next tick
    Yield,
    /// Kill countdown expired: the voice dies now
    Dead,
}

impl<'m, M: Mixer> Player<'m, M> {
    /// Run every synth context of a voice for this tick
    ///
    /// Returns false when a context reported the voice dead.
    pub(super) fn run_synth(&mut self, v: usize) -> bool {
        if self.voices[v].synth.program.is_none() {
            return true;
        }
        for context in SynthContext::ALL {
            if !self.execute_synth(v, context) {
                return false;
            }
        }
        true
    }

    /// Execute one context until it yields
    fn execute_synth(&mut self, v: usize, context: SynthContext) -> bool {
        let ctx = context as usize;
        {
            let synth = &mut self.voices[v].synth;
            if synth.stop_mask & (1 << ctx) != 0 {
                return true;
            }

            // Kill countdown is terminal for the whole voice
            if synth.kill_active[ctx] {
                if synth.kill_count[ctx] == 0 {
                    return false;
                }
                synth.kill_count[ctx] -= 1;
            }

            // Tick wait
            if synth.wait_count[ctx] != 0 {
                synth.wait_count[ctx] -= 1;
                if synth.wait_count[ctx] != 0 {
                    return true;
                }
            }

            // Cross-context line wait
            let target = synth.wait_type[ctx];
            if target >= 0 {
                let reached = synth.entry_pos[target as usize] >= synth.wait_line[ctx];
                if !reached {
                    return true;
                }
                synth.wait_type[ctx] = SynthState::NO_WAIT;
            }
        }

        let mut budget = SYNTH_BUDGET;
        loop {
            let (pos, insn) = {
                let synth = &self.voices[v].synth;
                let Some(program) = synth.program else {
                    return true;
                };
                let pos = synth.entry_pos[ctx];
                let Some(insn) = program.code.get(pos as usize).copied() else {
                    // Running off the code halts the context
                    self.voices[v].synth.stop_mask |= 1 << ctx;
                    return true;
                };
                (pos, insn)
            };
            self.voices[v].synth.entry_pos[ctx] = pos.wrapping_add(1);

            let step = if insn.opcode < 0 {
                // Effect fallthrough; the guard keeps effects from
                // re-entering the VM
                let fx_byte = (!insn.opcode) as u8 & 0x7F;
                let operand = self.synth_operand(v, insn);
                if !self.synth_fx_guard {
                    self.synth_fx_guard = true;
                    let ch = self.voices[v].host as usize;
                    self.dispatch_effect(ch, fx_byte, operand);
                    self.synth_fx_guard = false;
                }
                SynthStep::Continue
            } else {
                self.synth_op(v, ctx, insn)
            };

            match step {
                SynthStep::Dead => return false,
                SynthStep::Yield => return true,
                SynthStep::Continue => {}
            }

            // A jump onto the executed line is a deliberate self-loop
            if self.voices[v].synth.entry_pos[ctx] == pos {
                return true;
            }
            if self.voices[v].synth.stop_mask & (1 << ctx) != 0 {
                return true;
            }

            budget -= 1;
            if budget == 0 {
                trace!(voice = v, context = ctx, "synth budget exhausted, yielding");
                return true;
            }
        }
    }

    /// Uniform operand resolution: immediate + source variable
    pub(super) fn synth_operand(&self, v: usize, insn: nether_seq::SynthInstruction) -> u16 {
        let synth = &self.voices[v].synth;
        insn.data.wrapping_add(synth.vars[insn.src()] as u16)
    }
}

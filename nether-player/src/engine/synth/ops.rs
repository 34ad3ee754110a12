//! Synth opcode implementations
//!
//! ALU ops update the executing context's condition codes (Z/N/V/C plus
//! the sticky X); queries and sound ops leave them untouched. 32-bit
//! operations read and write the little-endian register pair
//! `(dst, dst + 1)`, or just `var[15]` in the single-register form.

use nether_seq::{op, SynthInstruction};

use crate::mixer::{Mixer, MixerChannelFlags, PcmRef};
use crate::tables::sine_value;
use crate::voices::{cond, SynthState};

use super::super::Player;
use super::SynthStep;

/// Base of the Amiga period conversion (without the 2^32 scale)
const PERIOD_BASE: u64 = 8363 * 1712 * 4;

fn set_nz(word: &mut u16, result: u16) {
    *word &= !(cond::Z | cond::N);
    if result == 0 {
        *word |= cond::Z;
    }
    if result & 0x8000 != 0 {
        *word |= cond::N;
    }
}

fn set_logic_flags(word: &mut u16, result: u16) {
    set_nz(word, result);
    *word &= !(cond::V | cond::C);
}

fn set_arith_flags(word: &mut u16, result: u16, carry: bool, overflow: bool) {
    set_nz(word, result);
    *word &= !(cond::V | cond::C | cond::X);
    if overflow {
        *word |= cond::V;
    }
    if carry {
        *word |= cond::C | cond::X;
    }
}

impl<'m> SynthState<'m> {
    fn read32(&self, dst: usize) -> u32 {
        if dst == 15 {
            self.vars[15] as u16 as u32
        } else {
            (self.vars[dst] as u16 as u32) | ((self.vars[dst + 1] as u16 as u32) << 16)
        }
    }

    fn write32(&mut self, dst: usize, value: u32) {
        if dst == 15 {
            self.vars[15] = value as i16;
        } else {
            self.vars[dst] = value as i16;
            self.vars[dst + 1] = (value >> 16) as i16;
        }
    }
}

impl<'m, M: Mixer> Player<'m, M> {
    /// Execute one non-negative opcode; returns how the loop proceeds
    pub(super) fn synth_op(&mut self, v: usize, ctx: usize, insn: SynthInstruction) -> SynthStep {
        let operand = self.synth_operand(v, insn);
        let dst = insn.dst();

        match insn.opcode {
            // ----------------------------------------------------------
            // Control flow
            // ----------------------------------------------------------
            op::STOP => {
                let synth = &mut self.voices[v].synth;
                let bits = (operand & 0x0F) as u8;
                if bits == 0 {
                    synth.stop_mask |= 1 << ctx;
                } else {
                    synth.stop_mask ^= bits;
                }
                if synth.stop_mask & (1 << ctx) != 0 {
                    return SynthStep::Yield;
                }
            }
            op::KILL => {
                let synth = &mut self.voices[v].synth;
                if operand == 0 {
                    return SynthStep::Dead;
                }
                synth.kill_active[ctx] = true;
                synth.kill_count[ctx] = operand;
                return SynthStep::Yield;
            }
            op::WAIT => {
                let synth = &mut self.voices[v].synth;
                synth.wait_count[ctx] = operand;
                if operand != 0 {
                    return SynthStep::Yield;
                }
            }
            op::WAITVOL | op::WAITPAN | op::WAITSLD | op::WAITSPC => {
                let target = (insn.opcode - op::WAITVOL) as i8;
                let synth = &mut self.voices[v].synth;
                synth.wait_type[ctx] = target;
                synth.wait_line[ctx] = operand;
                return SynthStep::Yield;
            }
            op::JUMP => self.voices[v].synth.entry_pos[ctx] = operand,
            op::JUMPEQ..=op::JUMPHI => {
                let word = self.voices[v].synth.cond[ctx];
                let z = word & cond::Z != 0;
                let n = word & cond::N != 0;
                let o = word & cond::V != 0;
                let c = word & cond::C != 0;
                let take = match insn.opcode {
                    op::JUMPEQ => z,
                    op::JUMPNE => !z,
                    op::JUMPPL => !n,
                    op::JUMPMI => n,
                    op::JUMPLT => n != o,
                    op::JUMPLE => z || (n != o),
                    op::JUMPGT => !z && (n == o),
                    op::JUMPGE => n == o,
                    op::JUMPVS => o,
                    op::JUMPVC => !o,
                    op::JUMPCS => c,
                    op::JUMPCC => !c,
                    op::JUMPLS => c || z,
                    _ => !c && !z,
                };
                if take {
                    self.voices[v].synth.entry_pos[ctx] = operand;
                }
            }
            op::JUMPVOL | op::JUMPPAN | op::JUMPSLD | op::JUMPSPC => {
                let target = (insn.opcode - op::JUMPVOL) as usize;
                self.voices[v].synth.entry_pos[target] = operand;
            }
            op::CALL => {
                let synth = &mut self.voices[v].synth;
                synth.vars[dst] = synth.entry_pos[ctx] as i16;
                synth.entry_pos[ctx] = operand;
            }
            op::RET => {
                let synth = &mut self.voices[v].synth;
                synth.entry_pos[ctx] = synth.vars[dst] as u16;
            }
            op::POSVAR => {
                let synth = &mut self.voices[v].synth;
                synth.vars[dst] = synth.entry_pos[ctx] as i16;
            }
            op::NOP => {}

            // ----------------------------------------------------------
            // Arithmetic
            // ----------------------------------------------------------
            op::LOAD => {
                let synth = &mut self.voices[v].synth;
                synth.vars[dst] = operand as i16;
                set_logic_flags(&mut synth.cond[ctx], operand);
            }
            op::ADD | op::ADDX => {
                let synth = &mut self.voices[v].synth;
                let a = synth.vars[dst] as u16;
                let x = if insn.opcode == op::ADDX && synth.cond[ctx] & cond::X != 0 {
                    1
                } else {
                    0
                };
                let wide = a as u32 + operand as u32 + x;
                let result = wide as u16;
                let overflow = (a ^ result) & (operand ^ result) & 0x8000 != 0;
                synth.vars[dst] = result as i16;
                set_arith_flags(&mut synth.cond[ctx], result, wide > 0xFFFF, overflow);
            }
            op::SUB | op::SUBX | op::CMP => {
                let synth = &mut self.voices[v].synth;
                let a = synth.vars[dst] as u16;
                let x = if insn.opcode == op::SUBX && synth.cond[ctx] & cond::X != 0 {
                    1
                } else {
                    0
                };
                let result = a.wrapping_sub(operand).wrapping_sub(x);
                let borrow = (operand as u32 + x as u32) > a as u32;
                let overflow = (a ^ operand) & (a ^ result) & 0x8000 != 0;
                if insn.opcode == op::CMP {
                    // Compare sets flags only, X stays
                    let word = &mut synth.cond[ctx];
                    set_nz(word, result);
                    *word &= !(cond::V | cond::C);
                    if overflow {
                        *word |= cond::V;
                    }
                    if borrow {
                        *word |= cond::C;
                    }
                } else {
                    synth.vars[dst] = result as i16;
                    set_arith_flags(&mut synth.cond[ctx], result, borrow, overflow);
                }
            }
            op::MULU => {
                let synth = &mut self.voices[v].synth;
                let product = (synth.vars[dst] as u16 as u32) * operand as u32;
                synth.vars[dst] = product as i16;
                set_logic_flags(&mut synth.cond[ctx], product as u16);
            }
            op::MULS => {
                let synth = &mut self.voices[v].synth;
                let product = synth.vars[dst] as i32 * operand as i16 as i32;
                synth.vars[dst] = product as i16;
                set_logic_flags(&mut synth.cond[ctx], product as u16);
            }
            op::DMULU => {
                let synth = &mut self.voices[v].synth;
                let product = (synth.vars[dst] as u16 as u32) * operand as u32;
                synth.write32(dst, product);
                set_logic_flags(&mut synth.cond[ctx], (product >> 16) as u16 | product as u16);
            }
            op::DMULS => {
                let synth = &mut self.voices[v].synth;
                let product = (synth.vars[dst] as i32 * operand as i16 as i32) as u32;
                synth.write32(dst, product);
                set_logic_flags(&mut synth.cond[ctx], (product >> 16) as u16 | product as u16);
            }
            op::DIVU | op::DIVS | op::MODU | op::MODS => {
                let synth = &mut self.voices[v].synth;
                if operand == 0 {
                    // Division by zero never traps: flags flag it, the
                    // destination stays put
                    synth.cond[ctx] |= cond::C | cond::V | cond::Z | cond::N;
                } else {
                    let a = synth.vars[dst];
                    let result = match insn.opcode {
                        op::DIVU => ((a as u16) / operand) as i16,
                        op::MODU => ((a as u16) % operand) as i16,
                        op::DIVS => (a as i32 / operand as i16 as i32) as i16,
                        _ => (a as i32 % operand as i16 as i32) as i16,
                    };
                    synth.vars[dst] = result;
                    set_logic_flags(&mut synth.cond[ctx], result as u16);
                }
            }
            op::DDIVU | op::DDIVS => {
                let synth = &mut self.voices[v].synth;
                if operand == 0 {
                    synth.cond[ctx] |= cond::C | cond::V | cond::Z | cond::N;
                } else if insn.opcode == op::DDIVU {
                    let dividend = synth.read32(dst);
                    let quotient = dividend / operand as u32;
                    synth.write32(dst, quotient);
                    set_logic_flags(&mut synth.cond[ctx], quotient as u16);
                } else {
                    let dividend = synth.read32(dst) as i32;
                    let quotient = dividend / operand as i16 as i32;
                    synth.write32(dst, quotient as u32);
                    set_logic_flags(&mut synth.cond[ctx], quotient as u16);
                }
            }

            // ----------------------------------------------------------
            // Bit operations
            // ----------------------------------------------------------
            op::ASHL | op::LSHL => {
                let synth = &mut self.voices[v].synth;
                let count = (operand & 0xFF).min(16) as u32;
                let a = synth.vars[dst] as u16;
                let (result, carry) = if count == 0 {
                    (a, false)
                } else {
                    let wide = (a as u32) << count;
                    (wide as u16, wide & 0x1_0000 != 0)
                };
                synth.vars[dst] = result as i16;
                set_arith_flags(&mut synth.cond[ctx], result, carry, false);
            }
            op::ASHR => {
                let synth = &mut self.voices[v].synth;
                let count = (operand & 0xFF).min(16) as u32;
                let a = synth.vars[dst] as i16;
                let carry = count > 0 && (a >> (count - 1).min(15)) & 1 != 0;
                let result = (a >> count.min(15)) as u16;
                synth.vars[dst] = result as i16;
                set_arith_flags(&mut synth.cond[ctx], result, carry, false);
            }
            op::LSHR => {
                let synth = &mut self.voices[v].synth;
                let count = (operand & 0xFF).min(16) as u32;
                let a = synth.vars[dst] as u16;
                let (result, carry) = if count == 0 {
                    (a, false)
                } else {
                    let wide = (a as u32) << 1 >> count;
                    (
                        (wide >> 1) as u16,
                        wide & 1 != 0,
                    )
                };
                synth.vars[dst] = result as i16;
                set_arith_flags(&mut synth.cond[ctx], result, carry, false);
            }
            op::ROL | op::ROR => {
                let synth = &mut self.voices[v].synth;
                let count = (operand & 0x0F) as u32;
                let a = synth.vars[dst] as u16;
                let result = if insn.opcode == op::ROL {
                    a.rotate_left(count)
                } else {
                    a.rotate_right(count)
                };
                synth.vars[dst] = result as i16;
                set_logic_flags(&mut synth.cond[ctx], result);
            }
            op::ROLX | op::RORX => {
                // 17-bit rotate through the extend bit
                let synth = &mut self.voices[v].synth;
                let count = (operand % 17) as u32;
                let x = (synth.cond[ctx] & cond::X != 0) as u32;
                let wide = (synth.vars[dst] as u16 as u32) | (x << 16);
                let rotated = if count == 0 {
                    wide
                } else if insn.opcode == op::ROLX {
                    ((wide << count) | (wide >> (17 - count))) & 0x1_FFFF
                } else {
                    ((wide >> count) | (wide << (17 - count))) & 0x1_FFFF
                };
                let result = rotated as u16;
                synth.vars[dst] = result as i16;
                let word = &mut synth.cond[ctx];
                set_nz(word, result);
                *word &= !(cond::C | cond::X | cond::V);
                if rotated & 0x1_0000 != 0 {
                    *word |= cond::C | cond::X;
                }
            }
            op::OR | op::AND | op::XOR => {
                let synth = &mut self.voices[v].synth;
                let a = synth.vars[dst] as u16;
                let result = match insn.opcode {
                    op::OR => a | operand,
                    op::AND => a & operand,
                    _ => a ^ operand,
                };
                synth.vars[dst] = result as i16;
                set_logic_flags(&mut synth.cond[ctx], result);
            }
            op::NOT => {
                let synth = &mut self.voices[v].synth;
                let result = !operand;
                synth.vars[dst] = result as i16;
                set_logic_flags(&mut synth.cond[ctx], result);
            }
            op::NEG | op::NEGX => {
                let synth = &mut self.voices[v].synth;
                let x = if insn.opcode == op::NEGX && synth.cond[ctx] & cond::X != 0 {
                    1u16
                } else {
                    0
                };
                let result = 0u16.wrapping_sub(operand).wrapping_sub(x);
                let borrow = operand != 0 || x != 0;
                let overflow = result == 0x8000;
                synth.vars[dst] = result as i16;
                set_arith_flags(&mut synth.cond[ctx], result, borrow, overflow);
            }
            op::EXTB => {
                let synth = &mut self.voices[v].synth;
                let result = operand as u8 as i8 as i16 as u16;
                synth.vars[dst] = result as i16;
                set_logic_flags(&mut synth.cond[ctx], result);
            }
            op::EXT => {
                let synth = &mut self.voices[v].synth;
                let wide = operand as i16 as i32 as u32;
                synth.write32(dst, wide);
                set_logic_flags(&mut synth.cond[ctx], operand);
            }
            op::XCHG => {
                let synth = &mut self.voices[v].synth;
                let src = insn.src();
                let old_dst = synth.vars[dst];
                synth.vars[dst] = (synth.vars[src] as u16).wrapping_add(insn.data) as i16;
                synth.vars[src] = old_dst;
            }
            op::SWAP => {
                let synth = &mut self.voices[v].synth;
                let a = synth.vars[dst] as u16;
                let result = a.rotate_left(8);
                synth.vars[dst] = result as i16;
                set_logic_flags(&mut synth.cond[ctx], result);
            }

            // ----------------------------------------------------------
            // Queries
            // ----------------------------------------------------------
            op::GETWAVE => {
                let value = self.voices[v].synth.sample_waveform.unwrap_or(0);
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETWLEN => {
                let value = self.voices[v].mixer.length as u16;
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETWPOS => {
                let value = self.voices[v].mixer.position as u16;
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETCHAN => {
                let value = self.voices[v].host;
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETNOTE => {
                let value = self.voices[v].key as u16;
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETRANS => {
                let ch = self.voices[v].host as usize;
                let value = self.hosts[ch].transpose as i16;
                self.voices[v].synth.vars[dst] = value;
            }
            op::GETPTCH => {
                let value = (self.voices[v].frequency >> 16) as u16;
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETPER => {
                let freq = self.voices[v].frequency.max(1);
                let value = (PERIOD_BASE / freq as u64) as u16;
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETFX => {
                let ch = self.voices[v].host as usize;
                let value = self.hosts[ch].last_fx as u16;
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETARPW | op::GETVIBW | op::GETTRMW | op::GETPANW => {
                let synth = &mut self.voices[v].synth;
                let value = match insn.opcode {
                    op::GETARPW => synth.arpeggio_waveform,
                    op::GETVIBW => synth.vibrato_waveform,
                    op::GETTRMW => synth.tremolo_waveform,
                    _ => synth.pannolo_waveform,
                };
                synth.vars[dst] = value as i16;
            }
            op::GETARPV | op::GETVIBV | op::GETTRMV | op::GETPANV => {
                let wave_num = {
                    let synth = &self.voices[v].synth;
                    match insn.opcode {
                        op::GETARPV => synth.arpeggio_waveform,
                        op::GETVIBV => synth.vibrato_waveform,
                        op::GETTRMV => synth.tremolo_waveform,
                        _ => synth.pannolo_waveform,
                    }
                };
                let value = self.synth_wave_sample(v, wave_num, operand as u32);
                self.voices[v].synth.vars[dst] = value;
            }
            op::GETARPL | op::GETVIBL | op::GETTRML | op::GETPANL => {
                let wave_num = {
                    let synth = &self.voices[v].synth;
                    match insn.opcode {
                        op::GETARPL => synth.arpeggio_waveform,
                        op::GETVIBL => synth.vibrato_waveform,
                        op::GETTRML => synth.tremolo_waveform,
                        _ => synth.pannolo_waveform,
                    }
                };
                let len = self
                    .voices[v]
                    .synth
                    .program
                    .and_then(|p| p.waveform(wave_num))
                    .map(|w| w.len())
                    .unwrap_or(0);
                self.voices[v].synth.vars[dst] = len as u16 as i16;
            }
            op::GETARPP | op::GETVIBP | op::GETTRMP | op::GETPANP => {
                let synth = &mut self.voices[v].synth;
                let value = match insn.opcode {
                    op::GETARPP => synth.arpeggio_pos,
                    op::GETVIBP => synth.vibrato_pos,
                    op::GETTRMP => synth.tremolo_pos,
                    _ => synth.pannolo_pos,
                };
                synth.vars[dst] = value as u16 as i16;
            }
            op::GETRND => {
                let bound = if operand == 0 { 0x10000 } else { operand as u32 };
                let value = self.rng_bounded(bound) as u16;
                self.voices[v].synth.vars[dst] = value as i16;
            }
            op::GETSINE => {
                let value = sine_value(operand as i16 as i32);
                self.voices[v].synth.vars[dst] = value;
            }

            // ----------------------------------------------------------
            // Sound
            // ----------------------------------------------------------
            op::PORTAUP | op::PORTADN => {
                let ch = self.voices[v].host as usize;
                let freq = self.voices[v].frequency;
                let steps = if insn.opcode == op::PORTAUP {
                    operand as i32
                } else {
                    -(operand as i32)
                };
                self.voices[v].frequency = self.shift_frequency(ch, freq, steps);
            }
            op::VIBSPD => self.voices[v].synth.vibrato_speed = operand,
            op::VIBDPTH => self.voices[v].synth.vibrato_depth = operand as i16,
            op::VIBWAVE => self.voices[v].synth.vibrato_waveform = operand,
            op::VIBWAVP => self.voices[v].synth.vibrato_pos = operand as u32,
            op::VIBRATO => {
                let (wave, speed) = {
                    let synth = &self.voices[v].synth;
                    (synth.vibrato_waveform, synth.vibrato_speed)
                };
                let pos = self.voices[v].synth.vibrato_pos;
                let value = self.synth_wave_sample(v, wave, pos);
                self.voices[v].synth.vibrato_pos =
                    self.advance_wave_pos(v, wave, pos, speed as u32);
                self.synth_vibrato_apply(v, value as i32);
            }
            op::VIBVAL => self.synth_vibrato_apply(v, operand as i16 as i32),
            op::ARPSPD => self.voices[v].synth.arpeggio_speed = operand,
            op::ARPWAVE => self.voices[v].synth.arpeggio_waveform = operand,
            op::ARPWAVP => self.voices[v].synth.arpeggio_pos = operand as u32,
            op::ARPEGIO => {
                let wave = self.voices[v].synth.arpeggio_waveform;
                let pos = self.voices[v].synth.arpeggio_pos;
                let value = self.synth_wave_sample(v, wave, pos);
                let speed = self.voices[v].synth.arpeggio_speed.max(1);
                self.voices[v].synth.arpeggio_tick += 1;
                if self.voices[v].synth.arpeggio_tick >= speed {
                    self.voices[v].synth.arpeggio_tick = 0;
                    self.voices[v].synth.arpeggio_pos = self.advance_wave_pos(v, wave, pos, 1);
                }
                self.synth_arpeggio_apply(v, (value >> 8) as i32);
            }
            op::ARPVAL => self.synth_arpeggio_apply(v, operand as i16 as i32),
            op::SETWAVE => self.synth_set_waveform(v, operand, true),
            op::ISETWAV => self.synth_set_waveform(v, operand, false),
            op::SETWAVP => self.voices[v].mixer.position = operand as u32,
            op::SETRANS => {
                let ch = self.voices[v].host as usize;
                let old = self.hosts[ch].transpose as i32;
                let new = operand as i16 as i32;
                self.hosts[ch].transpose = new.clamp(-128, 127) as i8;
                let freq = self.voices[v].frequency;
                self.voices[v].frequency = self.shift_frequency(ch, freq, (new - old) * 256);
            }
            op::SETNOTE => {
                let ch = self.voices[v].host as usize;
                let old = self.voices[v].key as i32;
                let new = (operand as i32).clamp(0, 119);
                self.voices[v].key = new as u8;
                let freq = self.voices[v].frequency;
                self.voices[v].frequency = self.shift_frequency(ch, freq, (new - old) * 256);
            }
            op::SETPTCH => {
                let value = self.voices[v].synth.read32(dst).wrapping_add(insn.data as u32);
                self.voices[v].frequency = value.max(1);
            }
            op::SETPER => {
                if operand != 0 {
                    let freq = (PERIOD_BASE / operand as u64).min(u32::MAX as u64) as u32;
                    self.voices[v].frequency = freq.max(1);
                }
            }
            op::RESET => {
                self.synth_reset(v, operand);
            }
            op::VOLSLUP | op::VOLSLDN => {
                let voice = &mut self.voices[v];
                let word = ((voice.volume as u16) << 8) | voice.sub_volume as u16;
                let delta = if insn.opcode == op::VOLSLUP {
                    operand as i32
                } else {
                    -(operand as i32)
                };
                let word = Self::slide_word(word, delta);
                voice.volume = (word >> 8) as u8;
                voice.sub_volume = word as u8;
            }
            op::TRMSPD => self.voices[v].synth.tremolo_speed = operand,
            op::TRMDPTH => self.voices[v].synth.tremolo_depth = operand as i16,
            op::TRMWAVE => self.voices[v].synth.tremolo_waveform = operand,
            op::TRMWAVP => self.voices[v].synth.tremolo_pos = operand as u32,
            op::TREMOLO => {
                let (wave, speed) = {
                    let synth = &self.voices[v].synth;
                    (synth.tremolo_waveform, synth.tremolo_speed)
                };
                let pos = self.voices[v].synth.tremolo_pos;
                let value = self.synth_wave_sample(v, wave, pos);
                self.voices[v].synth.tremolo_pos =
                    self.advance_wave_pos(v, wave, pos, speed as u32);
                self.synth_tremolo_apply(v, value as i32);
            }
            op::TRMVAL => self.synth_tremolo_apply(v, operand as i16 as i32),
            op::PANLEFT | op::PANRGHT => {
                let voice = &mut self.voices[v];
                let word = ((voice.panning as u16) << 8) | voice.sub_panning as u16;
                let delta = if insn.opcode == op::PANRGHT {
                    operand as i32
                } else {
                    -(operand as i32)
                };
                let word = Self::slide_word(word, delta);
                voice.panning = (word >> 8) as u8;
                voice.sub_panning = word as u8;
            }
            op::PANSPD => self.voices[v].synth.pannolo_speed = operand,
            op::PANDPTH => self.voices[v].synth.pannolo_depth = operand as i16,
            op::PANWAVE => self.voices[v].synth.pannolo_waveform = operand,
            op::PANWAVP => self.voices[v].synth.pannolo_pos = operand as u32,
            op::PANNOLO => {
                let (wave, speed) = {
                    let synth = &self.voices[v].synth;
                    (synth.pannolo_waveform, synth.pannolo_speed)
                };
                let pos = self.voices[v].synth.pannolo_pos;
                let value = self.synth_wave_sample(v, wave, pos);
                self.voices[v].synth.pannolo_pos =
                    self.advance_wave_pos(v, wave, pos, speed as u32);
                self.synth_pannolo_apply(v, value as i32);
            }
            op::PANVAL => self.synth_pannolo_apply(v, operand as i16 as i32),

            _ => {}
        }
        SynthStep::Continue
    }

    // ------------------------------------------------------------------
    // Waveform access
    // ------------------------------------------------------------------

    fn synth_wave_sample(&self, v: usize, wave_num: u16, pos: u32) -> i16 {
        self.voices[v]
            .synth
            .program
            .and_then(|p| p.waveform(wave_num))
            .map(|w| {
                if w.is_empty() {
                    0
                } else {
                    w.value(pos % w.len())
                }
            })
            .unwrap_or(0)
    }

    fn advance_wave_pos(&self, v: usize, wave_num: u16, pos: u32, speed: u32) -> u32 {
        let Some(wave) = self
            .voices[v]
            .synth
            .program
            .and_then(|p| p.waveform(wave_num))
        else {
            return pos;
        };
        if wave.is_empty() {
            return pos;
        }
        let next = pos + speed;
        if wave.repeat_length != 0 && next >= wave.repeat_start + wave.repeat_length {
            wave.repeat_start + (next - wave.repeat_start) % wave.repeat_length
        } else {
            next % wave.len().max(1)
        }
    }

    // ------------------------------------------------------------------
    // Modulation application with rollback
    // ------------------------------------------------------------------

    fn synth_vibrato_apply(&mut self, v: usize, value: i32) {
        let ch = self.voices[v].host as usize;
        let depth = self.voices[v].synth.vibrato_depth as i32;
        let base = if self.voices[v].synth.vibrato_base != 0 {
            self.voices[v].synth.vibrato_base
        } else {
            self.voices[v].frequency
        };
        self.voices[v].synth.vibrato_base = base;
        let steps = (value * depth) >> 4;
        self.voices[v].frequency = self.shift_frequency(ch, base, steps);
    }

    fn synth_arpeggio_apply(&mut self, v: usize, halftones: i32) {
        let ch = self.voices[v].host as usize;
        let base = if self.voices[v].synth.arpeggio_base != 0 {
            self.voices[v].synth.arpeggio_base
        } else {
            self.voices[v].frequency
        };
        self.voices[v].synth.arpeggio_base = base;
        self.voices[v].frequency = self.shift_frequency(ch, base, halftones * 256);
    }

    fn synth_tremolo_apply(&mut self, v: usize, value: i32) {
        let voice = &mut self.voices[v];
        let offset = ((value * voice.synth.tremolo_depth as i32) >> 8) << 8;
        let rollback = voice.synth.tremolo_slide;
        voice.synth.tremolo_slide = offset;
        let word = ((voice.volume as u16) << 8) | voice.sub_volume as u16;
        let word = Self::slide_word(word, offset - rollback);
        voice.volume = (word >> 8) as u8;
        voice.sub_volume = word as u8;
    }

    fn synth_pannolo_apply(&mut self, v: usize, value: i32) {
        let voice = &mut self.voices[v];
        let offset = ((value * voice.synth.pannolo_depth as i32) >> 8) << 8;
        let rollback = voice.synth.pannolo_slide;
        voice.synth.pannolo_slide = offset;
        let word = ((voice.panning as u16) << 8) | voice.sub_panning as u16;
        let word = Self::slide_word(word, offset - rollback);
        voice.panning = (word >> 8) as u8;
        voice.sub_panning = word as u8;
    }

    /// Selective rollback of the synth modulation state (reset op);
    /// a set immediate bit disables the corresponding clear
    fn synth_reset(&mut self, v: usize, mask: u16) {
        if mask & 0x01 == 0 {
            if self.voices[v].synth.arpeggio_base != 0 {
                self.voices[v].frequency = self.voices[v].synth.arpeggio_base;
                self.voices[v].synth.arpeggio_base = 0;
            }
            self.voices[v].synth.arpeggio_tick = 0;
        }
        if mask & 0x02 == 0 {
            if self.voices[v].synth.vibrato_base != 0 {
                self.voices[v].frequency = self.voices[v].synth.vibrato_base;
                self.voices[v].synth.vibrato_base = 0;
            }
        }
        if mask & 0x04 == 0 {
            let voice = &mut self.voices[v];
            let rollback = voice.synth.tremolo_slide;
            if rollback != 0 {
                let word = ((voice.volume as u16) << 8) | voice.sub_volume as u16;
                let word = Self::slide_word(word, -rollback);
                voice.volume = (word >> 8) as u8;
                voice.sub_volume = word as u8;
                voice.synth.tremolo_slide = 0;
            }
        }
        if mask & 0x08 == 0 {
            let voice = &mut self.voices[v];
            let rollback = voice.synth.pannolo_slide;
            if rollback != 0 {
                let word = ((voice.panning as u16) << 8) | voice.sub_panning as u16;
                let word = Self::slide_word(word, -rollback);
                voice.panning = (word >> 8) as u8;
                voice.sub_panning = word as u8;
                voice.synth.pannolo_slide = 0;
            }
        }
        if mask & 0x10 == 0 {
            self.voices[v].porta_fraction = 0;
        }
    }

    /// Replace the audible data with a synth waveform
    ///
    /// `mark_synth` additionally tags the mixer channel as playing synth
    /// data; the i-variant leaves the flag untouched.
    pub(in crate::engine) fn synth_set_waveform(&mut self, v: usize, wave_num: u16, mark_synth: bool) {
        let Some((data, len, repeat_start, repeat_length)) = self
            .voices[v]
            .synth
            .program
            .and_then(|p| p.waveform(wave_num))
            .map(|w| (&w.data, w.len(), w.repeat_start, w.repeat_length))
        else {
            return;
        };
        let voice = &mut self.voices[v];
        voice.synth.sample_waveform = Some(wave_num);
        voice.mixer.data = Some(PcmRef::from(data));
        voice.mixer.length = len;
        voice.mixer.bits_per_sample = data.bits_per_sample();
        voice.mixer.position = 0;
        voice.mixer.repeat_start = repeat_start;
        voice.mixer.repeat_length = repeat_length;
        voice.mixer.repeat_count = 0;
        voice.mixer.flags |= MixerChannelFlags::PLAY;
        if repeat_length != 0 {
            voice.mixer.flags |= MixerChannelFlags::LOOP;
        }
        if mark_synth {
            voice.mixer.flags |= MixerChannelFlags::SYNTH;
        }
    }
}

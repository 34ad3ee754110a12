//! Envelope runtime: per-voice/per-host envelope playback state

use nether_seq::{Envelope, EnvelopeFlags};

use crate::tables::{lcg_bounded, lcg_step};

/// Runtime state of one envelope instance
///
/// Copies the loop/sustain metadata out of the module envelope at load so
/// effect commands can retarget it without touching the read-only module.
/// Stepping honours, in priority order: sustain (while no keyoff was
/// seen), the regular loop, then one-shot terminal playback.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerEnvelope<'m> {
    /// Envelope table, None = inactive
    pub envelope: Option<&'m Envelope>,
    /// Current position
    pub pos: u16,
    /// Current output value
    pub value: i16,
    /// Ticks per step (0 = terminal, envelope holds)
    pub tempo: u16,
    /// Gate counter cycling [0, tempo)
    pub tempo_count: u16,
    /// Sustain loop bounds and counting
    pub sustain_start: u16,
    pub sustain_end: u16,
    pub sustain_count: u16,
    pub sustain_counted: u16,
    /// Loop bounds and counting
    pub loop_start: u16,
    pub loop_end: u16,
    pub loop_count: u16,
    pub loop_counted: u16,
    /// Runtime copy of the repeat flags
    pub rep_flags: EnvelopeFlags,
    /// Random draw bounds
    pub value_min: i16,
    pub value_max: i16,
    /// Currently stepping backwards (ping-pong direction)
    pub backwards: bool,
}

impl<'m> PlayerEnvelope<'m> {
    /// Load an envelope (or clear with None) and reset the runtime state
    pub fn set(&mut self, envelope: Option<&'m Envelope>) {
        *self = Self::default();
        let Some(env) = envelope else {
            return;
        };
        self.envelope = Some(env);
        self.tempo = env.tempo;
        self.sustain_start = env.sustain_start;
        self.sustain_end = env.sustain_end;
        self.sustain_count = env.sustain_count;
        self.loop_start = env.loop_start;
        self.loop_end = env.loop_end;
        self.loop_count = env.loop_count;
        self.rep_flags = env.flags;
        self.value_min = env.value_min;
        self.value_max = env.value_max;
        self.backwards = env.flags.contains(EnvelopeFlags::BACKWARDS);
        self.value = self.table_value(0);
    }

    /// True when an envelope is loaded and still stepping
    pub fn active(&self) -> bool {
        self.envelope.is_some() && self.tempo != 0
    }

    /// Current bounds given whether sustain still applies
    fn bounds(&self, sustain: bool) -> (u16, u16, bool) {
        let env = self.envelope.expect("bounds on empty envelope");
        let points = env.points();
        let last = points.saturating_sub(1);
        if sustain
            && self.rep_flags.contains(EnvelopeFlags::SUSTAIN)
            && (self.sustain_count == 0 || self.sustain_counted < self.sustain_count)
        {
            (self.sustain_start.min(last), self.sustain_end.min(last), true)
        } else if self.rep_flags.contains(EnvelopeFlags::LOOP)
            && (self.loop_count == 0 || self.loop_counted < self.loop_count)
        {
            (self.loop_start.min(last), self.loop_end.min(last), true)
        } else {
            (0, last, false)
        }
    }

    fn table_value(&self, pos: u16) -> i16 {
        self.envelope
            .and_then(|env| env.data.get(pos as usize).copied())
            .unwrap_or(0)
    }

    /// Advance one tick and return the current value
    ///
    /// `sustain` is true while the owning voice has not yet received
    /// keyoff. RANDOM envelopes consume the engine seed exactly once per
    /// actual step.
    pub fn step(&mut self, sustain: bool, seed: &mut i32) -> i16 {
        let Some(env) = self.envelope else {
            return 0;
        };
        if self.tempo == 0 || env.data.is_empty() {
            return self.value;
        }

        // Tempo gate: step only when the counter wraps to zero
        let mut effective_tempo = self.tempo;
        if self.rep_flags.contains(EnvelopeFlags::RND_DELAY) {
            *seed = lcg_step(*seed);
            let draw = lcg_bounded(*seed, 255) as u16 + 1;
            effective_tempo = self.tempo.saturating_mul(draw);
        }
        if self.tempo_count != 0 {
            self.tempo_count += 1;
            if self.tempo_count >= effective_tempo {
                self.tempo_count = 0;
            }
            return self.value;
        }
        self.tempo_count = if effective_tempo > 1 { 1 } else { 0 };

        let (start, end, looping) = self.bounds(sustain);
        let mut pos = self.pos.min(env.points().saturating_sub(1));

        if self.backwards {
            if pos <= start {
                if looping {
                    if self.rep_flags.contains(EnvelopeFlags::PINGPONG) {
                        self.backwards = false;
                        pos = start.saturating_add(1).min(end);
                    } else {
                        pos = end;
                    }
                    self.count_loop(sustain);
                } else {
                    pos = start;
                }
            } else {
                pos -= 1;
            }
        } else if pos >= end {
            if looping {
                if self.rep_flags.contains(EnvelopeFlags::PINGPONG) {
                    self.backwards = true;
                    pos = end.saturating_sub(1).max(start);
                } else {
                    pos = start;
                }
                self.count_loop(sustain);
            } else {
                pos = end;
            }
        } else {
            pos += 1;
        }
        // Running out of a one-shot table is terminal: hold the last value
        if !looping && (pos >= end || (self.backwards && pos <= start)) {
            self.tempo = 0;
        }
        self.pos = pos;

        self.value = if self.rep_flags.contains(EnvelopeFlags::RANDOM) {
            *seed = lcg_step(*seed);
            let span = (self.value_max as i32 - self.value_min as i32).max(0) as u32 + 1;
            (self.value_min as i32 + lcg_bounded(*seed, span) as i32) as i16
        } else if self.rep_flags.contains(EnvelopeFlags::FIRST_ADD) {
            self.table_value(0).saturating_add(self.table_value(pos))
        } else {
            self.table_value(pos)
        };
        self.value
    }

    fn count_loop(&mut self, sustain: bool) {
        if sustain && self.rep_flags.contains(EnvelopeFlags::SUSTAIN) {
            if self.sustain_count != 0 {
                self.sustain_counted += 1;
            }
        } else if self.loop_count != 0 {
            self.loop_counted += 1;
        }
    }

    /// Rewind to the start without reloading metadata
    pub fn restart(&mut self) {
        self.pos = 0;
        self.tempo_count = 0;
        self.loop_counted = 0;
        self.sustain_counted = 0;
        self.backwards = self.rep_flags.contains(EnvelopeFlags::BACKWARDS);
        if let Some(env) = self.envelope {
            self.tempo = env.tempo;
        }
        self.value = self.table_value(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Envelope {
        Envelope {
            data: (0..8).map(|i| i * 100).collect(),
            ..Envelope::default()
        }
    }

    #[test]
    fn test_one_shot_runs_to_end_and_holds() {
        let env = ramp();
        let mut pe = PlayerEnvelope::default();
        pe.set(Some(&env));
        let mut seed = 1;
        for _ in 0..7 {
            pe.step(false, &mut seed);
        }
        assert_eq!(pe.pos, 7);
        assert_eq!(pe.value, 700);
        assert_eq!(pe.tempo, 0, "terminal after running out");
        // Further stepping holds the last value
        pe.step(false, &mut seed);
        assert_eq!(pe.value, 700);
    }

    #[test]
    fn test_loop_wraps() {
        let mut env = ramp();
        env.flags = EnvelopeFlags::LOOP;
        env.loop_start = 2;
        env.loop_end = 4;
        let mut pe = PlayerEnvelope::default();
        pe.set(Some(&env));
        let mut seed = 1;
        let mut positions = Vec::new();
        for _ in 0..6 {
            pe.step(false, &mut seed);
            positions.push(pe.pos);
        }
        assert_eq!(positions, vec![1, 2, 3, 4, 2, 3]);
    }

    #[test]
    fn test_sustain_dominates_until_keyoff() {
        let mut env = ramp();
        env.flags = EnvelopeFlags::SUSTAIN;
        env.sustain_start = 1;
        env.sustain_end = 2;
        let mut pe = PlayerEnvelope::default();
        pe.set(Some(&env));
        let mut seed = 1;
        for _ in 0..5 {
            pe.step(true, &mut seed);
            assert!(pe.pos >= 1 && pe.pos <= 2);
        }
        // After keyoff the envelope runs free to the end
        for _ in 0..10 {
            pe.step(false, &mut seed);
        }
        assert_eq!(pe.pos, 7);
    }

    #[test]
    fn test_pingpong_mirrors() {
        let mut env = ramp();
        env.flags = EnvelopeFlags::LOOP | EnvelopeFlags::PINGPONG;
        env.loop_start = 0;
        env.loop_end = 3;
        let mut pe = PlayerEnvelope::default();
        pe.set(Some(&env));
        let mut seed = 1;
        let mut positions = Vec::new();
        for _ in 0..8 {
            pe.step(false, &mut seed);
            positions.push(pe.pos);
        }
        assert_eq!(positions, vec![1, 2, 3, 2, 1, 0, 1, 2]);
    }

    #[test]
    fn test_tempo_gates_steps() {
        let mut env = ramp();
        env.tempo = 3;
        let mut pe = PlayerEnvelope::default();
        pe.set(Some(&env));
        let mut seed = 1;
        pe.step(false, &mut seed);
        assert_eq!(pe.pos, 1);
        pe.step(false, &mut seed);
        pe.step(false, &mut seed);
        assert_eq!(pe.pos, 1, "gated while the counter cycles");
        pe.step(false, &mut seed);
        assert_eq!(pe.pos, 2);
    }

    #[test]
    fn test_random_draws_within_bounds() {
        let mut env = ramp();
        env.flags = EnvelopeFlags::RANDOM | EnvelopeFlags::LOOP;
        env.loop_end = 7;
        env.value_min = -50;
        env.value_max = 50;
        let mut pe = PlayerEnvelope::default();
        pe.set(Some(&env));
        let mut seed = 0x1234_5678;
        for _ in 0..100 {
            let v = pe.step(false, &mut seed);
            assert!((-50..=50).contains(&v));
        }
    }

    #[test]
    fn test_empty_envelope_is_inert() {
        let mut pe: PlayerEnvelope<'_> = PlayerEnvelope::default();
        let mut seed = 1;
        assert_eq!(pe.step(false, &mut seed), 0);
        assert!(!pe.active());
    }
}

//! Envelopes: tables of signed 16-bit values with loop and sustain metadata

use bitflags::bitflags;

/// One envelope table
///
/// The value at position `pos` is simply `data[pos]`; the player advances
/// `pos` at the envelope tempo, honouring the sustain loop while the note
/// has not seen keyoff and the regular loop afterwards.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Envelope values, one per envelope tick
    pub data: Vec<i16>,
    /// Ticks per envelope step (0 = frozen)
    pub tempo: u16,
    /// Sustain loop start position
    pub sustain_start: u16,
    /// Sustain loop end position
    pub sustain_end: u16,
    /// Sustain loop count (0 = forever)
    pub sustain_count: u16,
    /// Loop start position
    pub loop_start: u16,
    /// Loop end position
    pub loop_end: u16,
    /// Loop count (0 = forever)
    pub loop_count: u16,
    /// Lowest value drawn in RANDOM mode
    pub value_min: i16,
    /// Highest value drawn in RANDOM mode
    pub value_max: i16,
    /// Repeat behaviour flags
    pub flags: EnvelopeFlags,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            tempo: 1,
            sustain_start: 0,
            sustain_end: 0,
            sustain_count: 0,
            loop_start: 0,
            loop_end: 0,
            loop_count: 0,
            value_min: i16::MIN,
            value_max: i16::MAX,
            flags: EnvelopeFlags::empty(),
        }
    }
}

impl Envelope {
    /// Envelope over the given values, played once at tempo 1
    pub fn from_values(data: Vec<i16>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Number of envelope positions
    pub fn points(&self) -> u16 {
        self.data.len() as u16
    }
}

bitflags! {
    /// Envelope repeat behaviour
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EnvelopeFlags: u8 {
        /// Loop between loop_start and loop_end after keyoff
        const LOOP      = 0x01;
        /// Use the sustain loop while no keyoff was seen
        const SUSTAIN   = 0x02;
        /// Mirror direction at loop bounds instead of wrapping
        const PINGPONG  = 0x04;
        /// Start stepping backwards
        const BACKWARDS = 0x08;
        /// Draw values uniformly from [value_min, value_max]
        const RANDOM    = 0x10;
        /// Scale the step tempo by the random draw
        const RND_DELAY = 0x20;
        /// Add value_adjustment on top of the first sample as base
        const FIRST_ADD = 0x40;
        /// Retrigger the envelope on every new note
        const RETRIG    = 0x80;
    }
}

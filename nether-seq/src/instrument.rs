//! Instruments: samples, envelopes, note mapping, NNA policies

use bitflags::bitflags;

use crate::envelope::Envelope;
use crate::error::ModuleError;
use crate::sample::Sample;

/// One instrument of the module
///
/// Instruments own their samples and all per-instrument envelopes. The
/// keyboard table maps each of the 120 playable keys (10 octaves x 12
/// notes) to a sample number and a replacement note.
#[derive(Debug, Clone)]
pub struct Instrument {
    /// Instrument name
    pub name: String,
    /// Samples owned by this instrument (keyboard entries are 1-based)
    pub samples: Vec<Sample>,
    /// Key -> (sample, note) mapping
    pub keyboard: Box<[KeyboardEntry; 120]>,
    /// Envelope set
    pub envelopes: InstrumentEnvelopes,

    /// Instrument global volume (255 = no scaling)
    pub global_volume: u8,
    /// Random note-on volume variation, percent
    pub volume_swing: u16,
    /// Random note-on panning variation
    pub panning_swing: u16,
    /// Random note-on pitch variation, percent
    pub pitch_swing: u16,
    /// Fadeout subtracted from the fade counter per tick
    pub fade_out: u16,
    /// MED-style hold tick count (0 = no hold handling)
    pub hold: u16,
    /// MED-style decay tick count
    pub decay: u16,

    /// New-note action when a fresh note arrives on a busy channel
    pub nna: NewNoteAction,
    /// Duplicate-check mask deciding what counts as a duplicate
    pub dct: DuplicateCheck,
    /// Action applied to duplicates found by the check
    pub dna: DuplicateAction,
    /// Action taken when the decay counter expires
    pub dca: DuplicateAction,

    /// Pitch panning separation (-128..127, 0 = off)
    pub pitch_pan_separation: i16,
    /// Center key for pitch panning
    pub pitch_pan_center: u8,

    /// Instrument flags
    pub flags: InstrumentFlags,
}

impl Default for Instrument {
    fn default() -> Self {
        let mut keyboard = Box::new([KeyboardEntry::default(); 120]);
        for (key, entry) in keyboard.iter_mut().enumerate() {
            entry.sample = 1;
            entry.note = key as u8 + 1;
        }
        Self {
            name: String::new(),
            samples: Vec::new(),
            keyboard,
            envelopes: InstrumentEnvelopes::default(),
            global_volume: 255,
            volume_swing: 0,
            panning_swing: 0,
            pitch_swing: 0,
            fade_out: 0,
            hold: 0,
            decay: 0,
            nna: NewNoteAction::Cut,
            dct: DuplicateCheck::empty(),
            dna: DuplicateAction::Cut,
            dca: DuplicateAction::Cut,
            pitch_pan_separation: 0,
            pitch_pan_center: 4 * 12,
            flags: InstrumentFlags::empty(),
        }
    }
}

impl Instrument {
    /// Look up the keyboard entry for a key (octave * 12 + note - 1)
    pub fn keyboard_entry(&self, key: u8) -> Option<KeyboardEntry> {
        self.keyboard.get(key as usize).copied()
    }

    /// Get a sample by its 1-based keyboard number
    pub fn sample(&self, number: u16) -> Option<&Sample> {
        if number == 0 {
            return None;
        }
        self.samples.get(number as usize - 1)
    }

    pub(crate) fn validate(&self) -> Result<(), ModuleError> {
        for entry in self.keyboard.iter() {
            if entry.sample != 0 && entry.sample as usize > self.samples.len() {
                return Err(ModuleError::BadSampleRef(entry.sample));
            }
        }
        for sample in &self.samples {
            sample.validate()?;
        }
        Ok(())
    }
}

/// One key of the keyboard mapping table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardEntry {
    /// Sample number (1-based, 0 = no sample on this key)
    pub sample: u16,
    /// Note actually played for this key (1-based semitone)
    pub note: u8,
}

/// All envelopes an instrument can carry
///
/// The track and global tremolo/pannolo envelopes live at sub-song scope
/// and are referenced from here so one instrument set can drive them.
#[derive(Debug, Clone, Default)]
pub struct InstrumentEnvelopes {
    pub volume: Option<Envelope>,
    pub panning: Option<Envelope>,
    pub slide: Option<Envelope>,
    pub vibrato: Option<Envelope>,
    pub tremolo: Option<Envelope>,
    pub pannolo: Option<Envelope>,
    pub channolo: Option<Envelope>,
    pub spenolo: Option<Envelope>,
    pub auto_vibrato: Option<Envelope>,
    pub auto_tremolo: Option<Envelope>,
    pub auto_pannolo: Option<Envelope>,
    pub resonance: Option<Envelope>,
    pub track_tremolo: Option<Envelope>,
    pub track_pannolo: Option<Envelope>,
}

/// New-note action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum NewNoteAction {
    /// Cut the previous note immediately
    #[default]
    Cut = 0,
    /// Do a keyoff on the previous note
    NoteOff = 1,
    /// Keep the previous note playing in the background
    Continue = 2,
    /// Fade the previous note out
    NoteFade = 3,
}

/// Action applied to duplicate (or decayed) notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DuplicateAction {
    /// Cut the note
    #[default]
    Cut = 0,
    /// Do a keyoff
    NoteOff = 1,
    /// Fade the note out
    NoteFade = 2,
}

bitflags! {
    /// Duplicate-check type mask
    ///
    /// The low nibble bits are OR-combined, the high nibble bits are
    /// AND-combined; a note is a duplicate when any OR bit matches or
    /// all set AND bits match.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DuplicateCheck: u8 {
        /// Same instrument and note (OR combined)
        const OR_INSTR_NOTE   = 0x01;
        /// Same sample and note (OR combined)
        const OR_SAMPLE_NOTE  = 0x02;
        /// Same instrument (OR combined)
        const OR_INSTR        = 0x04;
        /// Same sample (OR combined)
        const OR_SAMPLE       = 0x08;
        /// Same instrument and note (AND combined)
        const AND_INSTR_NOTE  = 0x10;
        /// Same sample and note (AND combined)
        const AND_SAMPLE_NOTE = 0x20;
        /// Same instrument (AND combined)
        const AND_INSTR       = 0x40;
        /// Same sample (AND combined)
        const AND_SAMPLE      = 0x80;
    }
}

bitflags! {
    /// Instrument behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstrumentFlags: u8 {
        /// Prefer sample panning over instrument panning
        const SAMPLE_PANNING     = 0x01;
        /// Apply order entry transpose to final note
        const TRANSPOSABLE       = 0x02;
        /// Portamento slides affect the sample, not the note
        const PORTA_SAMPLE       = 0x04;
        /// Auto-vibrato uses linear frequency scaling
        const AUTO_VIBRATO_LINEAR = 0x80;
    }
}

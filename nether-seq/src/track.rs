//! Tracks, rows and effect commands

use bitflags::bitflags;

/// A reusable sequence of rows
#[derive(Debug, Clone)]
pub struct Track {
    /// Track title
    pub name: String,
    /// Row data
    pub rows: Vec<TrackRow>,
    /// Last valid row (defaults to rows.len() - 1 at build time)
    pub last_row: u16,
    /// Track volume (255 = no scaling)
    pub volume: u8,
    /// 1/256th fractions of track volume
    pub sub_volume: u8,
    /// Track panning (0x80 = center)
    pub panning: u8,
    /// 1/256th fractions of track panning
    pub sub_panning: u8,
    /// Note transpose for the whole track
    pub transpose: i8,
    /// Compatibility quirks for slide memory sharing
    pub compat_flags: TrackCompatFlags,
    /// Playback flags
    pub flags: TrackFlags,
    /// Initial ticks per row, active with [`TrackFlags::USE_TIMING`]
    pub frames: u16,
    /// Initial SPD speed, active with [`TrackFlags::SPD_TIMING`]
    pub spd_speed: u16,
    /// Initial rows per beat
    pub bpm_tempo: u16,
    /// Initial beats per minute
    pub bpm_speed: u16,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            name: String::new(),
            rows: Vec::new(),
            last_row: 63,
            volume: 255,
            sub_volume: 0,
            panning: 0x80,
            sub_panning: 0,
            transpose: 0,
            compat_flags: TrackCompatFlags::empty(),
            flags: TrackFlags::empty(),
            frames: 6,
            spd_speed: 33,
            bpm_tempo: 4,
            bpm_speed: 125,
        }
    }
}

impl Track {
    /// Empty track with the given number of rows
    pub fn empty(rows: u16) -> Self {
        Self {
            rows: vec![TrackRow::default(); rows as usize],
            last_row: rows.saturating_sub(1),
            ..Self::default()
        }
    }

    /// Get a row, if in range
    pub fn row(&self, row: u16) -> Option<&TrackRow> {
        self.rows.get(row as usize)
    }
}

/// One row of a track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRow {
    /// Octave the note is played in (0..9)
    pub octave: u8,
    /// Note (1..12 = C..B within `octave`, negative = sentinel, see [`note`])
    pub note: i8,
    /// Instrument number (1-based, 0 = keep previous)
    pub instrument: u16,
    /// Effect commands on this row
    pub effects: Vec<RowEffect>,
}

impl TrackRow {
    /// Row playing a note with an instrument
    pub fn play(octave: u8, note: i8, instrument: u16) -> Self {
        Self {
            octave,
            note,
            instrument,
            effects: Vec::new(),
        }
    }

    /// Attach an effect command
    pub fn with_fx(mut self, command: u8, data: u16) -> Self {
        self.effects.push(RowEffect { command, data });
        self
    }

    /// True when the row carries a playable (positive) note
    pub fn has_note(&self) -> bool {
        self.note >= note::C && self.note <= note::B
    }
}

/// One effect command of a row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowEffect {
    /// Effect command byte (high bit ignored by the player)
    pub command: u8,
    /// Effect data word, big-endian pairs `xxyy`
    pub data: u16,
}

bitflags! {
    /// Track slide-memory compatibility quirks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TrackCompatFlags: u8 {
        /// Sample offset beyond end of sample is ignored
        const SAMPLE_OFFSET    = 0x01;
        /// Tone portamento shares memory with portamentos
        const TONE_PORTA       = 0x02;
        /// Portamentos of the same direction share memory
        const SLIDES           = 0x04;
        /// Non-portamento slides share memory
        const VOLUME_SLIDES    = 0x08;
        /// Opposed portamento directions keep separate memory
        const OP_SLIDES        = 0x10;
        /// Opposed non-portamento slides keep separate memory
        const OP_VOLUME_SLIDES = 0x20;
        /// Volume and pitch slides share memory
        const VOLUME_PITCH     = 0x40;
    }
}

bitflags! {
    /// Track playback flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TrackFlags: u8 {
        /// Use the track timing fields
        const USE_TIMING = 0x01;
        /// SPD timing instead of BpM
        const SPD_TIMING = 0x02;
        /// Use track panning fields
        const PANNING    = 0x04;
        /// Track surround panning
        const SURROUND   = 0x08;
        /// Play this track backwards
        const REVERSE    = 0x10;
    }
}

/// Note values used in [`TrackRow::note`]
pub mod note {
    /// No note on this row
    pub const NONE: i8 = 0;
    /// C-n
    pub const C: i8 = 1;
    /// B-n (H-n)
    pub const B: i8 = 12;
    /// `^^^` note kill
    pub const KILL: i8 = -1;
    /// `^^-` note off
    pub const OFF: i8 = -2;
    /// `===` keyoff note
    pub const KEYOFF: i8 = -3;
    /// `-|-` hold delay
    pub const HOLD_DELAY: i8 = -4;
    /// `-\-` note fade
    pub const FADE: i8 = -5;
    /// END pattern end marker
    pub const END: i8 = -16;
}

/// Effect command bytes
///
/// The data word layout for each command follows the playback engine
/// documentation; a data word of zero re-uses the previous operand for
/// every effect that keeps memory.
pub mod fx {
    // Note effects
    pub const ARPEGGIO: u8 = 0x00;
    pub const PORTA_UP: u8 = 0x01;
    pub const PORTA_DOWN: u8 = 0x02;
    pub const FINE_PORTA_UP: u8 = 0x03;
    pub const FINE_PORTA_DOWN: u8 = 0x04;
    pub const PORTA_UP_ONCE: u8 = 0x05;
    pub const PORTA_DOWN_ONCE: u8 = 0x06;
    pub const FINE_PORTA_UP_ONCE: u8 = 0x07;
    pub const FINE_PORTA_DOWN_ONCE: u8 = 0x08;
    pub const TONE_PORTA: u8 = 0x09;
    pub const FINE_TONE_PORTA: u8 = 0x0A;
    pub const TONE_PORTA_ONCE: u8 = 0x0B;
    pub const FINE_TONE_PORTA_ONCE: u8 = 0x0C;
    pub const NOTE_SLIDE: u8 = 0x0D;
    pub const VIBRATO: u8 = 0x0E;
    pub const FINE_VIBRATO: u8 = 0x0F;
    pub const VIBRATO_ONCE: u8 = 0x10;
    pub const FINE_VIBRATO_ONCE: u8 = 0x11;
    pub const DO_KEYOFF: u8 = 0x12;
    pub const DO_HOLD_DELAY: u8 = 0x13;
    pub const NOTE_FADE: u8 = 0x14;
    pub const NOTE_CUT: u8 = 0x15;
    pub const NOTE_DELAY: u8 = 0x16;
    pub const TREMOR: u8 = 0x17;
    pub const RETRIG_NOTE: u8 = 0x18;
    pub const MULTI_RETRIG: u8 = 0x19;
    pub const EXTENDED_CTRL: u8 = 0x1A;
    pub const INVERT_LOOP: u8 = 0x1B;
    pub const EXECUTE_FX: u8 = 0x1C;
    pub const STOP_FX: u8 = 0x1D;

    // Volume effects
    pub const SET_VOLUME: u8 = 0x20;
    pub const VOL_SLIDE_UP: u8 = 0x21;
    pub const VOL_SLIDE_DOWN: u8 = 0x22;
    pub const FINE_VOL_SLIDE_UP: u8 = 0x23;
    pub const FINE_VOL_SLIDE_DOWN: u8 = 0x24;
    pub const VOL_SLIDE_TO: u8 = 0x25;
    pub const TREMOLO: u8 = 0x26;
    pub const TREMOLO_ONCE: u8 = 0x27;
    pub const SET_TRACK_VOLUME: u8 = 0x28;
    pub const TRACK_VOL_SLIDE_UP: u8 = 0x29;
    pub const TRACK_VOL_SLIDE_DOWN: u8 = 0x2A;
    pub const FINE_TRACK_VOL_SLIDE_UP: u8 = 0x2B;
    pub const FINE_TRACK_VOL_SLIDE_DOWN: u8 = 0x2C;
    pub const TRACK_VOL_SLIDE_TO: u8 = 0x2D;
    pub const TRACK_TREMOLO: u8 = 0x2E;
    pub const TRACK_TREMOLO_ONCE: u8 = 0x2F;

    // Panning effects
    pub const SET_PANNING: u8 = 0x30;
    pub const PAN_SLIDE_LEFT: u8 = 0x31;
    pub const PAN_SLIDE_RIGHT: u8 = 0x32;
    pub const FINE_PAN_SLIDE_LEFT: u8 = 0x33;
    pub const FINE_PAN_SLIDE_RIGHT: u8 = 0x34;
    pub const PAN_SLIDE_TO: u8 = 0x35;
    pub const PANNOLO: u8 = 0x36;
    pub const PANNOLO_ONCE: u8 = 0x37;
    pub const SET_TRACK_PANNING: u8 = 0x38;
    pub const TRACK_PAN_SLIDE_LEFT: u8 = 0x39;
    pub const TRACK_PAN_SLIDE_RIGHT: u8 = 0x3A;
    pub const FINE_TRACK_PAN_SLIDE_LEFT: u8 = 0x3B;
    pub const FINE_TRACK_PAN_SLIDE_RIGHT: u8 = 0x3C;
    pub const TRACK_PAN_SLIDE_TO: u8 = 0x3D;
    pub const TRACK_PANNOLO: u8 = 0x3E;
    pub const TRACK_PANNOLO_ONCE: u8 = 0x3F;

    // Track effects
    pub const SET_TEMPO: u8 = 0x40;
    pub const SET_RELATIVE_TEMPO: u8 = 0x41;
    pub const PATTERN_BREAK: u8 = 0x42;
    pub const POSITION_JUMP: u8 = 0x43;
    pub const RELATIVE_POSITION_JUMP: u8 = 0x44;
    pub const CHANGE_PATTERN: u8 = 0x45;
    pub const REVERSE_PLAY: u8 = 0x46;
    pub const PATTERN_DELAY: u8 = 0x47;
    pub const FINE_PATTERN_DELAY: u8 = 0x48;
    pub const PATTERN_LOOP: u8 = 0x49;
    pub const GOSUB: u8 = 0x4A;
    pub const GOSUB_RETURN: u8 = 0x4B;
    pub const CHANNEL_SYNC: u8 = 0x4C;
    pub const SET_SUB_SLIDE: u8 = 0x4D;

    // Instrument, sample and synth effects
    pub const SAMPLE_OFFSET_HIGH: u8 = 0x50;
    pub const SAMPLE_OFFSET_LOW: u8 = 0x51;
    pub const SET_HOLD: u8 = 0x52;
    pub const SET_DECAY: u8 = 0x53;
    pub const SET_TRANSPOSE: u8 = 0x54;
    pub const INSTRUMENT_CTRL: u8 = 0x55;
    pub const INSTRUMENT_CHANGE: u8 = 0x56;
    pub const SYNTH_CTRL: u8 = 0x57;
    pub const SET_SYNTH_VALUE: u8 = 0x58;
    pub const ENVELOPE_CTRL: u8 = 0x59;
    pub const SET_ENVELOPE_VALUE: u8 = 0x5A;
    pub const NNA_CTRL: u8 = 0x5B;
    pub const LOOP_CTRL: u8 = 0x5C;

    // Global effects
    pub const SET_SPEED: u8 = 0x60;
    pub const SPEED_SLIDE_FASTER: u8 = 0x61;
    pub const SPEED_SLIDE_SLOWER: u8 = 0x62;
    pub const FINE_SPEED_SLIDE_FASTER: u8 = 0x63;
    pub const FINE_SPEED_SLIDE_SLOWER: u8 = 0x64;
    pub const SPEED_SLIDE_TO: u8 = 0x65;
    pub const SPENOLO: u8 = 0x66;
    pub const SPENOLO_ONCE: u8 = 0x67;
    pub const CHANNEL_CTRL: u8 = 0x68;
    pub const SET_GLOBAL_VOLUME: u8 = 0x69;
    pub const GLOBAL_VOL_SLIDE_UP: u8 = 0x6A;
    pub const GLOBAL_VOL_SLIDE_DOWN: u8 = 0x6B;
    pub const FINE_GLOBAL_VOL_SLIDE_UP: u8 = 0x6C;
    pub const FINE_GLOBAL_VOL_SLIDE_DOWN: u8 = 0x6D;
    pub const GLOBAL_VOL_SLIDE_TO: u8 = 0x6E;
    pub const GLOBAL_TREMOLO: u8 = 0x6F;
    pub const GLOBAL_TREMOLO_ONCE: u8 = 0x70;
    pub const SET_GLOBAL_PANNING: u8 = 0x71;
    pub const GLOBAL_PAN_SLIDE_LEFT: u8 = 0x72;
    pub const GLOBAL_PAN_SLIDE_RIGHT: u8 = 0x73;
    pub const FINE_GLOBAL_PAN_SLIDE_LEFT: u8 = 0x74;
    pub const FINE_GLOBAL_PAN_SLIDE_RIGHT: u8 = 0x75;
    pub const GLOBAL_PAN_SLIDE_TO: u8 = 0x76;
    pub const GLOBAL_PANNOLO: u8 = 0x77;
    pub const GLOBAL_PANNOLO_ONCE: u8 = 0x78;
    pub const USER_SYNC: u8 = 0x7F;
}

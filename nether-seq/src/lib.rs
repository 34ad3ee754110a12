//! Nether-Seq: sequencer module data model for Nethercore
//!
//! This crate provides the in-memory representation of a sequencer module:
//! instruments with their samples and envelopes, synthetic waveforms and
//! synth programs, and per-channel ordered tracks of rows with effect
//! commands. It is the read-only input consumed by the `nether-player`
//! playback engine.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  Module                       │
//! │  - sub_songs: Vec<SubSong>                    │
//! │  - instruments: Vec<Instrument>               │
//! └───────────────────────────────────────────────┘
//!      SubSong                 Instrument
//!      - order lists (1/chan)  - samples: Vec<Sample>
//!      - tracks: Vec<Track>    - envelopes (volume, panning, ...)
//!      - timing + flags        Sample
//!      Track                   - PCM data, loop geometry
//!      - rows: Vec<TrackRow>   - synth: Option<SynthProgram>
//! ```
//!
//! All data here is immutable during playback. The player keeps its own
//! runtime state (host channels, voices) and refers back into the module
//! by index, never by mutation.

mod envelope;
mod error;
mod instrument;
mod order;
mod sample;
mod song;
mod synth;
mod track;

#[cfg(test)]
mod tests;

pub use envelope::{Envelope, EnvelopeFlags};
pub use error::ModuleError;
pub use instrument::{
    DuplicateAction, DuplicateCheck, Instrument, InstrumentEnvelopes, InstrumentFlags,
    KeyboardEntry, NewNoteAction,
};
pub use order::{OrderEntry, OrderFlags, OrderList, OrderListFlags};
pub use sample::{PcmData, Sample, SampleFlags};
pub use song::{SongCompatFlags, SongFlags, SubSong};
pub use synth::{op, SynthInstruction, SynthProgram, SynthWaveform, SYNTH_CONTEXTS, SYNTH_VARIABLES};
pub use track::{fx, note, RowEffect, Track, TrackCompatFlags, TrackFlags, TrackRow};

/// Complete sequencer module (read-only playback input)
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Module title
    pub name: String,
    /// Sub-songs (at least one for a playable module)
    pub sub_songs: Vec<SubSong>,
    /// Instrument bank (1-based in row encoding)
    pub instruments: Vec<Instrument>,
}

impl Module {
    /// Look up an instrument by its 1-based row encoding number
    pub fn instrument(&self, number: u16) -> Option<&Instrument> {
        if number == 0 {
            return None;
        }
        self.instruments.get(number as usize - 1)
    }

    /// Validate cross-references (keyboard tables, loop geometry, order lists)
    pub fn validate(&self) -> Result<(), ModuleError> {
        if self.sub_songs.is_empty() {
            return Err(ModuleError::NoSubSongs);
        }
        for (i, instr) in self.instruments.iter().enumerate() {
            instr
                .validate()
                .map_err(|e| e.with_instrument(i as u16 + 1))?;
        }
        for song in &self.sub_songs {
            song.validate()?;
        }
        Ok(())
    }
}

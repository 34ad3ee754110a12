//! Validation errors for programmatically built modules

use thiserror::Error;

/// Errors reported by [`crate::Module::validate`]
///
/// The playback engine itself never sees these: invalid references are
/// normalised at play time. Validation exists so module builders get a
/// diagnostic instead of silence.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Module has no sub-songs
    #[error("module has no sub-songs")]
    NoSubSongs,
    /// Sub-song initial tempo is zero
    #[error("sub-song initial tempo is zero")]
    ZeroTempo,
    /// Order entry points at a track outside the pool
    #[error("order entry references missing track {0}")]
    BadTrackRef(u16),
    /// Keyboard entry points at a sample the instrument does not own
    #[error("keyboard references missing sample {0}")]
    BadSampleRef(u16),
    /// Loop geometry inconsistent with sample length or flags
    #[error("sample loop geometry out of bounds")]
    BadSampleGeometry,
    /// Wrapper adding the offending instrument number
    #[error("instrument {number}: {source}")]
    InInstrument {
        number: u16,
        #[source]
        source: Box<ModuleError>,
    },
}

impl ModuleError {
    pub(crate) fn with_instrument(self, number: u16) -> Self {
        ModuleError::InInstrument {
            number,
            source: Box::new(self),
        }
    }
}

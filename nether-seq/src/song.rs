//! Sub-song structure: timing, global levels, order lists and tracks

use bitflags::bitflags;

use crate::error::ModuleError;
use crate::order::OrderList;
use crate::track::Track;

/// One sub-song of a module
///
/// A sub-song owns one order list per host channel and the pool of tracks
/// the order entries point into. Timing is either BpM based (`bpm_speed` x
/// `bpm_tempo`) or MED-style SPD, selected by [`SongFlags::SPD_TIMING`].
#[derive(Debug, Clone)]
pub struct SubSong {
    /// Sub-song title
    pub name: String,
    /// One order list per host channel
    pub order_lists: Vec<OrderList>,
    /// Track pool referenced by order entries
    pub tracks: Vec<Track>,
    /// Number of host channels
    pub channels: u16,

    /// Initial ticks per row
    pub frames: u16,
    /// Initial relative speed nominator (0 = disabled)
    pub speed_mul: u8,
    /// Initial relative speed denominator (0 = disabled)
    pub speed_div: u8,
    /// Initial MED-style SPD speed
    pub spd_speed: u16,
    /// Initial rows per beat
    pub bpm_tempo: u16,
    /// Initial beats per minute
    pub bpm_speed: u16,

    /// Lower limit for ticks per row
    pub frames_min: u16,
    /// Upper limit for ticks per row
    pub frames_max: u16,
    /// Lower limit for SPD timing values
    pub spd_min: u16,
    /// Upper limit for SPD timing values
    pub spd_max: u16,
    /// Lower limit for rows per beat
    pub bpm_tempo_min: u16,
    /// Upper limit for rows per beat
    pub bpm_tempo_max: u16,
    /// Lower limit for beats per minute
    pub bpm_speed_min: u16,
    /// Upper limit for beats per minute
    pub bpm_speed_max: u16,

    /// Global volume scaling every other volume (255 = no scaling)
    pub global_volume: u8,
    /// 1/256th fractions of global volume
    pub global_sub_volume: u8,
    /// Global stereo separation scale (0 = full separation)
    pub global_panning: u8,
    /// 1/256th fractions of global panning
    pub global_sub_panning: u8,

    /// Maximum GoSub nesting depth
    pub gosub_stack_size: u16,
    /// Maximum pattern loop nesting depth
    pub loop_stack_size: u16,

    /// Compatibility quirks
    pub compat_flags: SongCompatFlags,
    /// Playback flags
    pub flags: SongFlags,
}

impl Default for SubSong {
    fn default() -> Self {
        Self {
            name: String::new(),
            order_lists: Vec::new(),
            tracks: Vec::new(),
            channels: 16,
            frames: 6,
            speed_mul: 0,
            speed_div: 0,
            spd_speed: 33,
            bpm_tempo: 4,
            bpm_speed: 125,
            frames_min: 1,
            frames_max: 255,
            spd_min: 1,
            spd_max: 255,
            bpm_tempo_min: 1,
            bpm_tempo_max: 255,
            bpm_speed_min: 1,
            bpm_speed_max: 255,
            global_volume: 255,
            global_sub_volume: 0,
            global_panning: 0,
            global_sub_panning: 0,
            gosub_stack_size: 4,
            loop_stack_size: 1,
            compat_flags: SongCompatFlags::empty(),
            flags: SongFlags::empty(),
        }
    }
}

impl SubSong {
    /// Get a track by its pool index
    pub fn track(&self, number: u16) -> Option<&Track> {
        self.tracks.get(number as usize)
    }

    /// Get the order list for a host channel
    pub fn order_list(&self, channel: u16) -> Option<&OrderList> {
        self.order_lists.get(channel as usize)
    }

    pub(crate) fn validate(&self) -> Result<(), ModuleError> {
        if self.frames == 0 {
            return Err(ModuleError::ZeroTempo);
        }
        for list in &self.order_lists {
            for entry in &list.entries {
                if let Some(track) = entry.track {
                    if track as usize >= self.tracks.len() {
                        return Err(ModuleError::BadTrackRef(track));
                    }
                }
            }
        }
        Ok(())
    }
}

bitflags! {
    /// Compatibility quirks that change effect handling per sub-song
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SongCompatFlags: u8 {
        /// Tracks are synchronous (linked together, pattern based)
        const SYNC            = 0x01;
        /// Pattern loop memory is shared across all channels
        const GLOBAL_LOOP     = 0x02;
        /// Enforce Amiga hardware period limits on portamento
        const AMIGA_LIMITS    = 0x04;
        /// Volume commands range 0x00-0x40 instead of 0x00-0xFF
        const OLD_VOLUMES     = 0x08;
        /// Global volume/panning changes affect new notes only
        const GLOBAL_NEW_ONLY = 0x10;
    }
}

bitflags! {
    /// Sub-song playback flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SongFlags: u8 {
        /// Linear frequency table instead of Amiga periods
        const LINEAR_FREQ_TABLE = 0x01;
        /// MED-style SPD timing instead of BpM
        const SPD_TIMING        = 0x02;
        /// Mono output
        const MONO              = 0x04;
        /// Initial global surround panning
        const SURROUND          = 0x08;
    }
}

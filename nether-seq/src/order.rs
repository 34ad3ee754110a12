//! Per-channel order lists

use bitflags::bitflags;

/// One entry of a channel's order list
///
/// Points at a track in the sub-song pool and optionally overrides its
/// row range, transpose, tempo and volume.
#[derive(Debug, Clone)]
pub struct OrderEntry {
    /// Track pool index, or None for an empty (skipped) slot
    pub track: Option<u16>,
    /// First row to play
    pub first_row: u16,
    /// Last row to play (0xFFFF = take from track)
    pub last_row: u16,
    /// Note transpose applied to the whole track
    pub transpose: i8,
    /// Relative instrument number mapping (0 = off)
    pub instr_transpose: i16,
    /// Tempo override (0 = keep current tempo)
    pub tempo: u16,
    /// Times this entry was entered (GoSub recursion guard)
    pub played: u16,
    /// Track volume override, active with [`OrderFlags::SET_VOLUME`]
    pub volume: u8,
    /// 1/256th fractions of the volume override
    pub sub_volume: u8,
    /// Entry flags
    pub flags: OrderFlags,
}

impl Default for OrderEntry {
    fn default() -> Self {
        Self {
            track: None,
            first_row: 0,
            last_row: 0xFFFF,
            transpose: 0,
            instr_transpose: 0,
            tempo: 0,
            played: 0,
            volume: 255,
            sub_volume: 0,
            flags: OrderFlags::empty(),
        }
    }
}

impl OrderEntry {
    /// Entry pointing at a track with default row range
    pub fn new(track: u16) -> Self {
        Self {
            track: Some(track),
            ..Self::default()
        }
    }
}

/// Order list for one host channel
#[derive(Debug, Clone)]
pub struct OrderList {
    /// Order entries in playback order
    pub entries: Vec<OrderEntry>,
    /// Number of entries actually used
    pub length: u16,
    /// Entry to restart from in repeat mode
    pub rep_start: u16,
    /// Channel volume (255 = no scaling)
    pub volume: u8,
    /// 1/256th fractions of channel volume
    pub sub_volume: u8,
    /// Initial track panning (0x80 = center)
    pub track_panning: u8,
    /// 1/256th fractions of track panning
    pub track_sub_panning: u8,
    /// Initial channel panning (0x80 = center)
    pub channel_panning: u8,
    /// 1/256th fractions of channel panning
    pub channel_sub_panning: u8,
    /// List flags
    pub flags: OrderListFlags,
}

impl Default for OrderList {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            length: 0,
            rep_start: 0,
            volume: 255,
            sub_volume: 0,
            track_panning: 0x80,
            track_sub_panning: 0,
            channel_panning: 0x80,
            channel_sub_panning: 0,
            flags: OrderListFlags::empty(),
        }
    }
}

impl OrderList {
    /// Order list over the given track indices
    pub fn from_tracks(tracks: &[u16]) -> Self {
        Self {
            entries: tracks.iter().map(|&t| OrderEntry::new(t)).collect(),
            length: tracks.len() as u16,
            ..Self::default()
        }
    }
}

bitflags! {
    /// Per-entry order flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OrderFlags: u8 {
        /// Entry marks end of order for this channel
        const END_ORDER     = 0x01;
        /// Entry marks end of the whole song
        const END_SONG      = 0x02;
        /// Skip this entry in one-time playback mode
        const NOT_IN_ONCE   = 0x04;
        /// Skip this entry in repeat playback mode
        const NOT_IN_REPEAT = 0x08;
        /// Entry is a track synchronization point
        const TRACK_SYNC    = 0x10;
        /// Entry volume overrides track volume
        const SET_VOLUME    = 0x20;
    }
}

bitflags! {
    /// Per-channel order list flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OrderListFlags: u8 {
        /// Initial channel surround instead of stereo panning
        const CHANNEL_SURROUND = 0x01;
        /// Initial track surround instead of stereo panning
        const TRACK_SURROUND   = 0x02;
        /// Channel starts muted
        const MUTED            = 0x04;
    }
}

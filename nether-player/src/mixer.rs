//! Mixer interface: the downstream PCM renderer consuming channel snapshots

use bitflags::bitflags;

use nether_seq::PcmData;

/// Borrowed view of the PCM a channel plays from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmRef<'m> {
    /// Signed 8-bit mono
    Mono8(&'m [i8]),
    /// Signed 16-bit mono
    Mono16(&'m [i16]),
}

impl<'m> PcmRef<'m> {
    /// Length in sample frames
    pub fn len(&self) -> u32 {
        match self {
            PcmRef::Mono8(d) => d.len() as u32,
            PcmRef::Mono16(d) => d.len() as u32,
        }
    }

    /// True when no frames are present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bits per sample frame
    pub fn bits_per_sample(&self) -> u8 {
        match self {
            PcmRef::Mono8(_) => 8,
            PcmRef::Mono16(_) => 16,
        }
    }
}

impl<'m> PcmRef<'m> {
    /// Identity comparison by data pointer and length
    pub fn ptr_eq(&self, other: &PcmRef<'m>) -> bool {
        match (self, other) {
            (PcmRef::Mono8(a), PcmRef::Mono8(b)) => std::ptr::eq(*a, *b),
            (PcmRef::Mono16(a), PcmRef::Mono16(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

impl<'m> From<&'m PcmData> for PcmRef<'m> {
    fn from(data: &'m PcmData) -> Self {
        match data {
            PcmData::Mono8(d) => PcmRef::Mono8(d),
            PcmData::Mono16(d) => PcmRef::Mono16(d),
        }
    }
}

bitflags! {
    /// Mixer channel state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MixerChannelFlags: u8 {
        /// Channel is playing
        const PLAY      = 0x01;
        /// Loop between repeat_start and repeat_start + repeat_length
        const LOOP      = 0x02;
        /// Loop ping-pong instead of forward
        const PINGPONG  = 0x04;
        /// Playing backwards
        const BACKWARDS = 0x08;
        /// Surround panning
        const SURROUND  = 0x10;
        /// Data is a synth waveform, not sample PCM
        const SYNTH     = 0x20;
    }
}

/// Complete per-voice snapshot pushed to the mixer every tick
#[derive(Debug, Clone, Copy, Default)]
pub struct MixerChannel<'m> {
    /// Playback position in frames
    pub position: u32,
    /// Playable length in frames
    pub length: u32,
    /// PCM payload
    pub data: Option<PcmRef<'m>>,
    /// Output frequency in Hz
    pub rate: u32,
    /// Final mixer volume (0..255)
    pub volume: u32,
    /// Final stereo panning (0x80 = center)
    pub panning: u8,
    /// Loop start frame
    pub repeat_start: u32,
    /// Loop length in frames
    pub repeat_length: u32,
    /// Remaining loop count (0 = forever)
    pub repeat_count: u32,
    /// Bits per sample frame
    pub bits_per_sample: u8,
    /// Resonant filter cutoff hint (0x1000 = open)
    pub filter_cutoff: u16,
    /// Resonant filter damping hint
    pub filter_damping: u16,
    /// State bits
    pub flags: MixerChannelFlags,
}

/// Playback state pulled back from the mixer at tick start
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelStatus {
    /// Current playback position in frames
    pub position: u32,
    /// Current state bits
    pub flags: MixerChannelFlags,
}

/// The downstream sample mixer
///
/// The engine calls these synchronously from inside the tick handler; the
/// mixer must not call back into the engine. Channel indices are the
/// voice indices of the engine.
pub trait Mixer {
    /// Pull back playback position and flags for a channel
    fn get_channel(&self, channel: usize) -> ChannelStatus;

    /// Push a complete channel snapshot
    fn set_channel(&mut self, channel: usize, state: &MixerChannel<'_>);

    /// Push only volume, panning and rate
    fn set_channel_volume_panning_pitch(&mut self, channel: usize, state: &MixerChannel<'_>);

    /// Push only position, repeat geometry and flags
    fn set_channel_position_repeat_flags(&mut self, channel: usize, state: &MixerChannel<'_>);

    /// Push filter parameters (the engine does no filtering itself)
    fn set_channel_filter(&mut self, channel: usize, state: &MixerChannel<'_>);

    /// Change the tick rate (internal tempo units: ticks per ten seconds)
    fn set_tempo(&mut self, tempo: u32);
}

/// Mixer that records the last pushed state and counts calls
///
/// Stands in for a real renderer in tests and headless runs.
#[derive(Debug, Default)]
pub struct NullMixer {
    /// Last snapshot per channel (positions, flags, volume, rate, panning)
    pub channels: Vec<(u32, MixerChannelFlags, u32, u32, u8)>,
    /// Last tempo pushed
    pub tempo: u32,
    /// Total set_channel* calls
    pub set_calls: u64,
}

impl NullMixer {
    /// Mixer with `channels` channels
    pub fn new(channels: usize) -> Self {
        Self {
            channels: vec![(0, MixerChannelFlags::empty(), 0, 0, 0x80); channels],
            tempo: 0,
            set_calls: 0,
        }
    }

    fn store(&mut self, channel: usize, state: &MixerChannel<'_>) {
        if let Some(slot) = self.channels.get_mut(channel) {
            *slot = (
                state.position,
                state.flags,
                state.volume,
                state.rate,
                state.panning,
            );
        }
        self.set_calls += 1;
    }
}

impl Mixer for NullMixer {
    fn get_channel(&self, channel: usize) -> ChannelStatus {
        self.channels
            .get(channel)
            .map(|&(position, flags, ..)| ChannelStatus { position, flags })
            .unwrap_or_default()
    }

    fn set_channel(&mut self, channel: usize, state: &MixerChannel<'_>) {
        self.store(channel, state);
    }

    fn set_channel_volume_panning_pitch(&mut self, channel: usize, state: &MixerChannel<'_>) {
        self.store(channel, state);
    }

    fn set_channel_position_repeat_flags(&mut self, channel: usize, state: &MixerChannel<'_>) {
        self.store(channel, state);
    }

    fn set_channel_filter(&mut self, channel: usize, state: &MixerChannel<'_>) {
        self.store(channel, state);
    }

    fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo;
    }
}

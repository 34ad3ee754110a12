//! Samples: PCM data, loop geometry, auto-modulation, synth attachment

use bitflags::bitflags;

use crate::error::ModuleError;
use crate::synth::SynthProgram;

/// Raw PCM payload of a sample or synth waveform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PcmData {
    /// Signed 8-bit mono
    Mono8(Vec<i8>),
    /// Signed 16-bit mono
    Mono16(Vec<i16>),
}

impl PcmData {
    /// Length in sample frames
    pub fn len(&self) -> u32 {
        match self {
            PcmData::Mono8(d) => d.len() as u32,
            PcmData::Mono16(d) => d.len() as u32,
        }
    }

    /// True when no frames are present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bits per sample frame
    pub fn bits_per_sample(&self) -> u8 {
        match self {
            PcmData::Mono8(_) => 8,
            PcmData::Mono16(_) => 16,
        }
    }

    /// Frame at `index` widened to 16 bits (0 when out of range)
    pub fn frame(&self, index: u32) -> i16 {
        match self {
            PcmData::Mono8(d) => d
                .get(index as usize)
                .map(|&v| (v as i16) << 8)
                .unwrap_or(0),
            PcmData::Mono16(d) => d.get(index as usize).copied().unwrap_or(0),
        }
    }
}

impl Default for PcmData {
    fn default() -> Self {
        PcmData::Mono8(Vec::new())
    }
}

/// One sample of an instrument
#[derive(Debug, Clone)]
pub struct Sample {
    /// Sample name
    pub name: String,
    /// PCM payload (may be empty for pure synth sounds)
    pub data: PcmData,
    /// Playable length in frames (<= data.len())
    pub len: u32,
    /// Loop start frame
    pub repeat_start: u32,
    /// Loop length in frames (non-zero iff LOOP flag set)
    pub repeat_length: u32,
    /// Loop count (0 = forever)
    pub repeat_count: u32,
    /// Sustain loop start frame
    pub sustain_start: u32,
    /// Sustain loop length in frames
    pub sustain_length: u32,
    /// Sustain loop count (0 = forever)
    pub sustain_count: u32,

    /// Natural playback rate in Hz (rate at the reference note)
    pub rate: u32,
    /// Lowest frequency the mixer accepts for this sample
    pub rate_min: u32,
    /// Highest frequency the mixer accepts for this sample
    pub rate_max: u32,
    /// Relative note transpose
    pub transpose: i8,
    /// Finetune, signed 1/128ths of a semitone
    pub finetune: i8,

    /// Default volume (255 = full)
    pub volume: u8,
    /// 1/256th fractions of the default volume
    pub sub_volume: u8,
    /// Default panning (0x80 = center), used with SAMPLE_PANNING
    pub panning: u8,
    /// 1/256th fractions of the default panning
    pub sub_panning: u8,

    /// Auto-vibrato sweep ramp-in length in ticks
    pub vibrato_sweep: u16,
    /// Auto-vibrato depth
    pub vibrato_depth: u8,
    /// Auto-vibrato rate
    pub vibrato_rate: u8,
    /// Auto-tremolo sweep ramp-in length in ticks
    pub tremolo_sweep: u16,
    /// Auto-tremolo depth
    pub tremolo_depth: u8,
    /// Auto-tremolo rate
    pub tremolo_rate: u8,
    /// Auto-pannolo sweep ramp-in length in ticks
    pub pannolo_sweep: u16,
    /// Auto-pannolo depth
    pub pannolo_depth: u8,
    /// Auto-pannolo rate
    pub pannolo_rate: u8,

    /// Synth program driving this sample, if any
    pub synth: Option<SynthProgram>,
    /// Sample flags
    pub flags: SampleFlags,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: String::new(),
            data: PcmData::default(),
            len: 0,
            repeat_start: 0,
            repeat_length: 0,
            repeat_count: 0,
            sustain_start: 0,
            sustain_length: 0,
            sustain_count: 0,
            rate: 8363,
            rate_min: 1,
            rate_max: u32::MAX,
            transpose: 0,
            finetune: 0,
            volume: 255,
            sub_volume: 0,
            panning: 0x80,
            sub_panning: 0,
            vibrato_sweep: 0,
            vibrato_depth: 0,
            vibrato_rate: 0,
            tremolo_sweep: 0,
            tremolo_depth: 0,
            tremolo_rate: 0,
            pannolo_sweep: 0,
            pannolo_depth: 0,
            pannolo_rate: 0,
            synth: None,
            flags: SampleFlags::empty(),
        }
    }
}

impl Sample {
    /// Sample over the given 16-bit PCM at its natural rate
    pub fn from_pcm16(data: Vec<i16>, rate: u32) -> Self {
        let len = data.len() as u32;
        Self {
            data: PcmData::Mono16(data),
            len,
            rate,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ModuleError> {
        if self.len > self.data.len() {
            return Err(ModuleError::BadSampleGeometry);
        }
        if self.flags.contains(SampleFlags::LOOP) {
            if self.repeat_length == 0 {
                return Err(ModuleError::BadSampleGeometry);
            }
            if self.repeat_start.saturating_add(self.repeat_length) > self.len {
                return Err(ModuleError::BadSampleGeometry);
            }
        } else if self.repeat_length != 0 {
            return Err(ModuleError::BadSampleGeometry);
        }
        Ok(())
    }
}

bitflags! {
    /// Sample playback flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SampleFlags: u8 {
        /// Loop between repeat_start and repeat_start + repeat_length
        const LOOP             = 0x01;
        /// Loop ping-pong instead of forward
        const PINGPONG         = 0x02;
        /// Start playback backwards
        const BACKWARDS        = 0x04;
        /// Sustain loop active until keyoff
        const SUSTAIN_LOOP     = 0x08;
        /// Sustain loop ping-pong
        const SUSTAIN_PINGPONG = 0x10;
        /// Use the sample panning fields
        const PANNING          = 0x20;
        /// Sample panning is surround
        const SURROUND         = 0x40;
    }
}

//! Voice state
//!
//! One voice per mixer channel: a sounding note. A voice is either the
//! foreground voice of its host channel or a background voice kept alive
//! by a new-note action until it fades out, is cut, or gets recycled.

use nether_seq::{DuplicateAction, SynthProgram};

use crate::envelope::PlayerEnvelope;
use crate::mixer::MixerChannel;
use crate::{SYNTH_CONTEXTS, SYNTH_VARIABLES};

/// The four synth execution contexts, in per-tick execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SynthContext {
    Volume = 0,
    Panning = 1,
    Slide = 2,
    Special = 3,
}

impl SynthContext {
    /// All contexts in execution order
    pub const ALL: [SynthContext; SYNTH_CONTEXTS] = [
        SynthContext::Volume,
        SynthContext::Panning,
        SynthContext::Slide,
        SynthContext::Special,
    ];
}

/// Condition code bits of a synth context
pub mod cond {
    /// Zero
    pub const Z: u16 = 0x01;
    /// Negative
    pub const N: u16 = 0x02;
    /// Overflow
    pub const V: u16 = 0x04;
    /// Carry
    pub const C: u16 = 0x08;
    /// Extend (sticky carry)
    pub const X: u16 = 0x10;
}

/// Synth VM state of one voice
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthState<'m> {
    /// Program being executed (None = no synth on this sample)
    pub program: Option<&'m SynthProgram>,
    /// Sixteen shared variables
    pub vars: [i16; SYNTH_VARIABLES],
    /// Condition code word per context
    pub cond: [u16; SYNTH_CONTEXTS],
    /// Next instruction line per context
    pub entry_pos: [u16; SYNTH_CONTEXTS],
    /// Sustain release entry per context
    pub sustain_pos: [u16; SYNTH_CONTEXTS],
    /// NNA trigger entry per context
    pub nna_pos: [u16; SYNTH_CONTEXTS],
    /// DNA trigger entry per context
    pub dna_pos: [u16; SYNTH_CONTEXTS],
    /// Remaining wait ticks per context
    pub wait_count: [u16; SYNTH_CONTEXTS],
    /// Line another context must reach to release the wait
    pub wait_line: [u16; SYNTH_CONTEXTS],
    /// Context index waited on, negative = not waiting
    pub wait_type: [i8; SYNTH_CONTEXTS],
    /// Remaining ticks until the kill countdown ends the voice
    pub kill_count: [u16; SYNTH_CONTEXTS],
    /// Kill countdown armed per context
    pub kill_active: [bool; SYNTH_CONTEXTS],
    /// Per-context stop bits (bit set = context halted)
    pub stop_mask: u8,
    /// Which contexts take NNA/DNA/sustain entries (copied from program)
    pub use_nna_flags: u8,
    pub use_dna_flags: u8,
    pub use_sustain_flags: u8,

    /// Waveform driving the audible sample after setwave (index)
    pub sample_waveform: Option<u16>,
    /// Modulation waveform selections
    pub arpeggio_waveform: u16,
    pub vibrato_waveform: u16,
    pub tremolo_waveform: u16,
    pub pannolo_waveform: u16,
    /// Cursors into the modulation waveforms
    pub arpeggio_pos: u32,
    pub vibrato_pos: u32,
    pub tremolo_pos: u32,
    pub pannolo_pos: u32,

    /// Synth-driven modulation parameters
    pub vibrato_speed: u16,
    pub vibrato_depth: i16,
    /// Frequency before the running vibrato offset (0 = none applied)
    pub vibrato_base: u32,
    pub arpeggio_speed: u16,
    pub arpeggio_tick: u16,
    /// Frequency before the running arpeggio offset (0 = none applied)
    pub arpeggio_base: u32,
    pub tremolo_speed: u16,
    pub tremolo_depth: i16,
    /// Applied tremolo volume-word offset, rolled back on re-apply
    pub tremolo_slide: i32,
    pub pannolo_speed: u16,
    pub pannolo_depth: i16,
    /// Applied pannolo panning-word offset, rolled back on re-apply
    pub pannolo_slide: i32,
}

impl<'m> SynthState<'m> {
    /// Wait-type value meaning "not waiting on any context"
    pub const NO_WAIT: i8 = -1;

    /// Load a program and reset all execution state
    pub fn load(&mut self, program: Option<&'m SynthProgram>) {
        *self = Self::default();
        self.wait_type = [Self::NO_WAIT; SYNTH_CONTEXTS];
        if let Some(p) = program {
            self.program = Some(p);
            self.vars = p.variables;
            self.cond = p.condition;
            self.entry_pos = p.entry;
            self.sustain_pos = p.sustain_entry;
            self.nna_pos = p.nna_entry;
            self.dna_pos = p.dna_entry;
            self.use_nna_flags = p.use_nna_flags;
            self.use_dna_flags = p.use_dna_flags;
            self.use_sustain_flags = p.use_sustain_flags;
        }
    }
}

/// Envelopes evaluated at voice scope
///
/// The row-effect driven vibrato/tremolo/pannolo envelopes live on the
/// host channel; the global tremolo/pannolo pair lives in the player
/// globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceEnvelopes<'m> {
    pub volume: PlayerEnvelope<'m>,
    pub panning: PlayerEnvelope<'m>,
    pub slide: PlayerEnvelope<'m>,
    pub auto_vibrato: PlayerEnvelope<'m>,
    pub auto_tremolo: PlayerEnvelope<'m>,
    pub auto_pannolo: PlayerEnvelope<'m>,
    pub resonance: PlayerEnvelope<'m>,
}

/// Per-mixer-channel sounding note
#[derive(Debug, Clone, Default)]
pub struct Voice<'m> {
    /// Owning host channel index
    pub host: u16,
    /// Voice is bound to a host (foreground or background)
    pub allocated: bool,
    /// Voice was displaced by an NNA and plays in the background
    pub background: bool,

    /// Instrument number (1-based into the module)
    pub instrument: u16,
    /// Sample number (1-based within the instrument)
    pub sample: u16,
    /// Key being played (octave * 12 + note - 1)
    pub key: u8,

    /// Current output frequency in Hz
    pub frequency: u32,
    /// 1/256th sub-slide accumulator for portamento
    pub porta_fraction: u32,

    /// Note volume (0..255)
    pub volume: u8,
    /// 1/256th fractions of the note volume
    pub sub_volume: u8,
    /// Instrument volume scale (0..255)
    pub instr_volume: u8,
    /// Final mixer volume of the last update
    pub final_volume: u32,
    /// Final mixer panning of the last update
    pub final_panning: u8,

    /// Note panning (0x80 = center)
    pub panning: u8,
    /// 1/256th fractions of the note panning
    pub sub_panning: u8,
    /// Surround panning active
    pub surround: bool,

    /// Fadeout subtracted per tick while fading
    pub fade_out: u16,
    /// Remaining fadeout level (starts at 65535)
    pub fade_out_count: i32,
    /// Voice is fading out
    pub fading: bool,

    /// Remaining hold ticks (0 = no hold handling)
    pub hold: u16,
    /// Decay tick threshold
    pub decay: u16,
    /// Action fired when the decay expires
    pub dca: DuplicateAction,

    /// Random swings applied at note trigger
    pub volume_swing: u16,
    pub panning_swing: u16,
    pub pitch_swing: u16,

    /// Pitch panning separation (0 = off)
    pub pitch_pan_separation: i16,
    /// Center key for pitch panning
    pub pitch_pan_center: u8,

    /// Keyoff was received (sustain no longer applies)
    pub key_off: bool,

    /// Auto-vibrato parameters (copied from the sample at trigger)
    pub auto_vibrato_depth: u8,
    pub auto_vibrato_rate: u8,
    pub auto_vibrato_sweep: u16,
    pub auto_vibrato_count: u32,
    /// Auto-tremolo parameters
    pub auto_tremolo_depth: u8,
    pub auto_tremolo_rate: u8,
    pub auto_tremolo_sweep: u16,
    pub auto_tremolo_count: u32,
    /// Auto-pannolo parameters
    pub auto_pannolo_depth: u8,
    pub auto_pannolo_rate: u8,
    pub auto_pannolo_sweep: u16,
    pub auto_pannolo_count: u32,

    /// Envelope set
    pub envelopes: VoiceEnvelopes<'m>,
    /// Synth VM state
    pub synth: SynthState<'m>,

    /// Current mixer view (effects and the synth VM mutate this)
    pub mixer: MixerChannel<'m>,
    /// Snapshot actually pushed last tick, for change detection
    pub last_push: MixerChannel<'m>,
}

impl<'m> Voice<'m> {
    /// Release the voice and silence its mixer view
    pub fn cut(&mut self) {
        self.allocated = false;
        self.background = false;
        self.fading = false;
        self.frequency = 0;
        self.final_volume = 0;
        self.mixer.flags = crate::MixerChannelFlags::empty();
        self.mixer.volume = 0;
    }

    /// True while the mixer still plays this voice
    pub fn audible(&self) -> bool {
        self.mixer
            .flags
            .contains(crate::MixerChannelFlags::PLAY)
    }

    /// Mark keyoff: sustain loops stop applying, fadeout starts if the
    /// volume envelope cannot carry the release
    pub fn trigger_key_off(&mut self) {
        self.key_off = true;
        if !self.envelopes.volume.active() {
            self.fading = true;
        }
    }
}

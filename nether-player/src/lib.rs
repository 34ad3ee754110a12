//! Nether-Player: polyphonic sequencer playback engine
//!
//! This crate implements the per-tick playback handler for `nether-seq`
//! modules. Once per audio tick the engine walks the pattern data on row
//! boundaries, spawns and retires voices according to the new-note-action
//! rules, executes the effect commands, advances the per-voice envelopes
//! and runs the synth micro-programs, then pushes a complete channel
//! snapshot to a downstream sample mixer.
//!
//! # Architecture
//!
//! - **Player** (engine module) - Globals, host channels and voices; owns
//!   all runtime state and the RNG seed
//! - **HostChannel** - Per-channel track performer: pattern flow, effect
//!   memories, modulation state
//! - **Voice** - Per-mixer-channel sounding note: sample playback view,
//!   envelopes, synth VM state
//! - **Mixer** (trait) - The external sample mixer consuming the per-tick
//!   channel snapshots
//!
//! The engine is single-threaded and cooperative: the tick handler runs to
//! completion with no yield points, all suspension is integer counters.
//! All slide and envelope math is fixed-point so identical input and seed
//! reproduce identical tick-by-tick output.

mod envelope;
mod hosts;
mod mixer;
mod tables;
mod voices;

pub mod engine;

pub use engine::{HookFlags, PlayMode, Player, PlayerHook};
pub use envelope::PlayerEnvelope;
pub use hosts::{ChannelControl, HostChannel, HostFlags};
pub use mixer::{ChannelStatus, Mixer, MixerChannel, MixerChannelFlags, NullMixer, PcmRef};
pub use tables::{
    amiga_slide_down, amiga_slide_up, linear_slide_down, linear_slide_up, note_frequency,
    sine_value, LINEAR_SLIDE_LUT, SEMITONE_LUT, SINE_LUT,
};
pub use voices::{SynthContext, SynthState, Voice, VoiceEnvelopes};

/// Time base for play-time accounting (microseconds per second)
pub const TIME_BASE: u64 = 1_000_000;

/// Number of synth execution contexts per voice
pub const SYNTH_CONTEXTS: usize = nether_seq::SYNTH_CONTEXTS;

/// Number of shared synth variables per voice
pub const SYNTH_VARIABLES: usize = nether_seq::SYNTH_VARIABLES;

/// Multiplier of the play-time linear congruential generator
pub const RNG_MULTIPLIER: i32 = -1153374675;

/// Built-in silence, swapped in for playing voices whose sample has no data
pub static SILENCE: [i8; 256] = [0; 256];

/// Background voices quieter than this are preferred for reuse
pub const VOICE_STEAL_VOLUME: u32 = 256;

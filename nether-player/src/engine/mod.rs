//! Playback engine
//!
//! Core playback logic for the sequencer engine including:
//! - The six-phase tick orchestrator
//! - Row and pattern-flow processing
//! - Voice allocation (NNA/DCT/DNA) and note triggering
//! - Effect dispatch
//! - Synth VM execution
//! - Per-voice update and mixer output

mod effects;
mod row;
mod synth;
mod tick;
mod trigger;
mod update;

#[cfg(test)]
mod tests;

use bitflags::bitflags;
use nether_seq::{Module, SubSong};

use crate::envelope::PlayerEnvelope;
use crate::hosts::HostChannel;
use crate::mixer::Mixer;
use crate::tables::{lcg_bounded, lcg_step};
use crate::voices::Voice;

/// Default number of mixer channels (voices) when the host does not choose
pub const DEFAULT_VOICES: usize = 64;

/// Playback mode: honoured by the order-entry skip flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    /// Play the song once, channels disable at their end
    Once,
    /// Loop back to the order list repeat start
    #[default]
    Repeat,
}

bitflags! {
    /// Hook trigger mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HookFlags: u8 {
        /// Fire on every processed tick
        const BEGINNING = 0x01;
        /// Fire (also) once song end is detected
        const SONG_END  = 0x02;
    }
}

/// Callback registration for the tick hooks
pub struct PlayerHook<M: Mixer> {
    /// Called as `(engine, user_data)`
    pub func: fn(&mut Player<'_, M>, u64),
    /// When to fire
    pub flags: HookFlags,
    /// Opaque word handed back to the callback
    pub user_data: u64,
}

impl<M: Mixer> Clone for PlayerHook<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Mixer> Copy for PlayerHook<M> {}

impl<M: Mixer> std::fmt::Debug for PlayerHook<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHook")
            .field("flags", &self.flags)
            .field("user_data", &self.user_data)
            .finish()
    }
}

/// The playback engine
///
/// Owns every piece of runtime state: the globals tier directly as
/// fields, one [`HostChannel`] per sub-song channel and one [`Voice`] per
/// mixer channel. The module is borrowed read-only and outlives the
/// engine.
pub struct Player<'m, M: Mixer> {
    /// Module being played
    pub module: &'m Module,
    /// Sub-song being played
    pub song: &'m SubSong,
    /// Downstream sample mixer
    pub mixer: M,

    /// Track performers, one per sub-song channel
    pub hosts: Vec<HostChannel<'m>>,
    /// Sounding notes, one per mixer channel
    pub voices: Vec<Voice<'m>>,

    // Timing
    /// Internal tempo in ticks per ten seconds
    pub tempo: u32,
    /// Relative speed, 16.16 (0x10000 = 1.0)
    pub relative_speed: u32,
    /// Relative pitch, 16.16 (0x10000 = 1.0)
    pub relative_pitch: u32,
    /// Selected timing mode (0 = BpM speed, 1 = BpM tempo, 2 = SPD)
    pub speed_type: u8,
    /// Beats per minute
    pub bpm_speed: u16,
    /// Rows per beat
    pub bpm_tempo: u16,
    /// MED-style SPD speed
    pub spd_speed: u16,

    // Global speed slide memories
    pub speed_slide_faster: u16,
    pub speed_slide_slower: u16,
    pub fine_speed_slide_faster: u16,
    pub fine_speed_slide_slower: u16,
    pub speed_slide_to: u8,
    pub speed_slide_to_target: u8,
    /// Spenolo state (kept staged; execution is a tagged stub)
    pub spenolo_rate: u8,
    pub spenolo_depth: i8,

    // Global mix state
    pub global_volume: u8,
    pub global_sub_volume: u8,
    pub global_panning: u8,
    pub global_sub_panning: u8,
    pub global_surround: bool,
    pub mono: bool,

    // Global volume/panning slide memories
    pub global_vol_slide_up: u16,
    pub global_vol_slide_down: u16,
    pub fine_global_vol_slide_up: u16,
    pub fine_global_vol_slide_down: u16,
    pub global_vol_slide_to: u16,
    pub global_vol_slide_to_target: u16,
    pub global_pan_slide_left: u16,
    pub global_pan_slide_right: u16,
    pub fine_global_pan_slide_left: u16,
    pub fine_global_pan_slide_right: u16,
    pub global_pan_slide_to: u16,
    pub global_pan_slide_to_target: u16,

    // Global tremolo / pannolo
    pub global_tremolo_rate: u8,
    pub global_tremolo_depth: i8,
    pub global_tremolo_env: PlayerEnvelope<'m>,
    pub global_tremolo_slide: i32,
    pub global_pannolo_rate: u8,
    pub global_pannolo_depth: i8,
    pub global_pannolo_env: PlayerEnvelope<'m>,
    pub global_pannolo_slide: i32,

    // Bookkeeping
    /// Playback mode
    pub play_mode: PlayMode,
    /// Wall-clock play time in TIME_BASE units
    pub play_time: u64,
    /// 32-bit fraction carried between ticks
    pub play_time_frac: u32,
    /// Musical tick time in TIME_BASE units (ignores relative speed)
    pub play_ticks: u64,
    /// 32-bit fraction carried between ticks
    pub play_ticks_frac: u32,
    /// Ticks handled so far
    pub tick_count: u64,
    /// RNG seed (LCG)
    pub seed: i32,
    /// Trace mode countdown (tick handler returns early while > 0)
    pub trace_count: u32,
    /// Every host channel reported song end
    pub song_end: bool,
    /// Voices with the PLAY flag after the last tick
    pub active_voices: u16,
    /// User sync value captured by effect 0x7F
    pub user_sync: u16,
    /// Effect dispatch is running on behalf of the synth VM
    pub(crate) synth_fx_guard: bool,

    /// Hook fired before row processing
    pub begin_hook: Option<PlayerHook<M>>,
    /// Hook fired after bookkeeping
    pub end_hook: Option<PlayerHook<M>>,
}

impl<'m, M: Mixer> Player<'m, M> {
    /// Create an engine over a sub-song with `voices` mixer channels
    ///
    /// Host channels and voices are sized here and never reallocated;
    /// `voices` should exceed the channel count to leave room for
    /// background voices.
    pub fn new(module: &'m Module, sub_song: usize, mixer: M, voices: usize) -> Self {
        let song = module
            .sub_songs
            .get(sub_song)
            .unwrap_or_else(|| module.sub_songs.first().expect("module has no sub-songs"));

        let mut player = Self {
            module,
            song,
            mixer,
            hosts: Vec::new(),
            voices: Vec::new(),
            tempo: 500,
            relative_speed: 0x10000,
            relative_pitch: 0x10000,
            speed_type: 0,
            bpm_speed: 125,
            bpm_tempo: 4,
            spd_speed: 33,
            speed_slide_faster: 0,
            speed_slide_slower: 0,
            fine_speed_slide_faster: 0,
            fine_speed_slide_slower: 0,
            speed_slide_to: 0,
            speed_slide_to_target: 0,
            spenolo_rate: 0,
            spenolo_depth: 0,
            global_volume: 255,
            global_sub_volume: 0,
            global_panning: 0,
            global_sub_panning: 0,
            global_surround: false,
            mono: false,
            global_vol_slide_up: 0,
            global_vol_slide_down: 0,
            fine_global_vol_slide_up: 0,
            fine_global_vol_slide_down: 0,
            global_vol_slide_to: 0,
            global_vol_slide_to_target: 0,
            global_pan_slide_left: 0,
            global_pan_slide_right: 0,
            fine_global_pan_slide_left: 0,
            fine_global_pan_slide_right: 0,
            global_pan_slide_to: 0,
            global_pan_slide_to_target: 0,
            global_tremolo_rate: 0,
            global_tremolo_depth: 0,
            global_tremolo_env: PlayerEnvelope::default(),
            global_tremolo_slide: 0,
            global_pannolo_rate: 0,
            global_pannolo_depth: 0,
            global_pannolo_env: PlayerEnvelope::default(),
            global_pannolo_slide: 0,
            play_mode: PlayMode::default(),
            play_time: 0,
            play_time_frac: 0,
            play_ticks: 0,
            play_ticks_frac: 0,
            tick_count: 0,
            seed: crate::RNG_MULTIPLIER,
            trace_count: 0,
            song_end: false,
            active_voices: 0,
            user_sync: 0,
            synth_fx_guard: false,
            begin_hook: None,
            end_hook: None,
        };
        player.voices = (0..voices.max(song.channels as usize))
            .map(|_| Voice::default())
            .collect();
        player.reset();
        player
    }

    /// Reset playback to the beginning of the sub-song
    pub fn reset(&mut self) {
        let song = self.song;

        self.bpm_speed = song.bpm_speed;
        self.bpm_tempo = song.bpm_tempo;
        self.spd_speed = song.spd_speed;
        self.speed_type = if song.flags.contains(nether_seq::SongFlags::SPD_TIMING) {
            2
        } else {
            0
        };
        self.relative_speed = if song.speed_mul != 0 && song.speed_div != 0 {
            ((song.speed_mul as u32) << 16) / song.speed_div as u32
        } else {
            0x10000
        };
        self.relative_pitch = 0x10000;
        self.global_volume = song.global_volume;
        self.global_sub_volume = song.global_sub_volume;
        self.global_panning = song.global_panning;
        self.global_sub_panning = song.global_sub_panning;
        self.global_surround = song.flags.contains(nether_seq::SongFlags::SURROUND);
        self.mono = song.flags.contains(nether_seq::SongFlags::MONO);
        self.play_time = 0;
        self.play_time_frac = 0;
        self.play_ticks = 0;
        self.play_ticks_frac = 0;
        self.tick_count = 0;
        self.seed = crate::RNG_MULTIPLIER;
        self.song_end = false;
        self.active_voices = 0;
        self.user_sync = 0;

        self.recompute_tempo();

        self.hosts = (0..song.channels as usize)
            .map(|ch| {
                let mut host = HostChannel::default();
                host.loop_stack =
                    vec![crate::hosts::LoopMark::default(); song.loop_stack_size as usize];
                host.tempo = song.frames;
                host.multi_retrig_scale = 1;
                if song
                    .flags
                    .contains(nether_seq::SongFlags::LINEAR_FREQ_TABLE)
                {
                    host.flags |= crate::hosts::HostFlags::LINEAR_FREQ;
                }
                if let Some(list) = song.order_list(ch as u16) {
                    host.track_volume = list.volume;
                    host.track_sub_volume = list.sub_volume;
                    host.track_panning = list.track_panning;
                    host.track_sub_panning = list.track_sub_panning;
                    host.track_surround = list
                        .flags
                        .contains(nether_seq::OrderListFlags::TRACK_SURROUND);
                    host.channel_panning = list.channel_panning;
                    host.channel_sub_panning = list.channel_sub_panning;
                    host.channel_surround = list
                        .flags
                        .contains(nether_seq::OrderListFlags::CHANNEL_SURROUND);
                    host.muted = list.flags.contains(nether_seq::OrderListFlags::MUTED);
                } else {
                    host.channel_panning = 0x80;
                }
                host
            })
            .collect();

        for voice in &mut self.voices {
            *voice = Voice::default();
        }

        // Enter the first order entry of every channel; the first tick
        // then lands directly on a row boundary that reads the entry row.
        for ch in 0..self.hosts.len() {
            self.enter_order(ch, 0);
            let host = &mut self.hosts[ch];
            host.flags |= crate::hosts::HostFlags::ROW_FRESH;
            host.tempo_counter = (host.fine_pattern_delay + host.tempo).saturating_sub(1);
        }

        let tempo = self.effective_tempo();
        self.mixer.set_tempo(tempo);
    }

    /// Current internal tempo scaled by the relative speed
    pub fn effective_tempo(&self) -> u32 {
        ((self.tempo as u64 * self.relative_speed as u64) >> 16).max(1) as u32
    }

    /// Recompute the internal tempo from the selected timing mode
    ///
    /// Internal tempo units are ticks per ten seconds, so BpM timing maps
    /// to `bpm_speed x bpm_tempo` and SPD to `spd x 10`.
    pub fn recompute_tempo(&mut self) {
        self.tempo = if self.speed_type == 2 {
            self.spd_speed as u32 * 10
        } else {
            self.bpm_speed as u32 * self.bpm_tempo as u32
        }
        .max(1);
    }

    /// Advance the LCG and return the fresh draw
    pub fn rng(&mut self) -> i32 {
        self.seed = lcg_step(self.seed);
        self.seed
    }

    /// Bounded uniform draw, consuming the seed exactly once
    pub fn rng_bounded(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        let draw = self.rng();
        lcg_bounded(draw, bound)
    }

    /// Number of host channels
    pub fn channels(&self) -> usize {
        self.hosts.len()
    }
}

//! Host channel state
//!
//! One host channel per sub-song channel: the track performer. It owns
//! the pattern-flow position, every per-channel effect memory, the
//! modulation envelopes driven from row effects, and routes notes to the
//! voice it currently controls.

use bitflags::bitflags;

use nether_seq::{DuplicateAction, DuplicateCheck, NewNoteAction, TrackCompatFlags};

use crate::envelope::PlayerEnvelope;

/// One pattern-loop stack slot
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopMark {
    /// Row the mark was set on
    pub row: u16,
    /// Remaining loop count
    pub count: u16,
}

/// Channel-control routing mode (effect 0x68)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelControl {
    /// No rerouting
    #[default]
    Off,
    /// Route to one target channel
    Normal,
    /// Route to every channel in the selection bitmap
    Multiple,
    /// Route to all channels
    Global,
}

bitflags! {
    /// Host channel pattern-flow and mode flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HostFlags: u16 {
        /// Leave the current order entry at the break row
        const PATTERN_BREAK  = 0x0001;
        /// Jump to an absolute order entry
        const POSITION_JUMP  = 0x0002;
        /// Re-enter the saved pattern-loop row
        const PATTERN_LOOP   = 0x0004;
        /// Switch the track pointer without leaving the order entry
        const CHG_PATTERN    = 0x0008;
        /// Rows advance backwards
        const BACKWARDS      = 0x0010;
        /// Channel reported end of song
        const SONG_END       = 0x0020;
        /// Channel no longer processes anything
        const DISABLED       = 0x0040;
        /// Linear frequency table for slides on this channel
        const LINEAR_FREQ    = 0x0080;
        /// Note-end sentinel handled this tick (ping-pong guard)
        const NOTE_END_GUARD = 0x0100;
        /// Order tempo override is in force
        const TEMPO_OVERRIDE = 0x0200;
        /// Current row has not been read yet (initial state)
        const ROW_FRESH      = 0x0400;
    }
}

/// Per-channel track performer state
#[derive(Debug, Clone, Default)]
pub struct HostChannel<'m> {
    // Pattern flow
    /// Current track pool index (None = nothing to play)
    pub track: Option<u16>,
    /// Current order entry index
    pub order: u16,
    /// Current row
    pub row: u16,
    /// First playable row of the current order entry
    pub first_row: u16,
    /// Last playable row of the current order entry
    pub last_row: u16,
    /// Ticks per row
    pub tempo: u16,
    /// Tick counter cycling [0, fine_pattern_delay + tempo)
    pub tempo_counter: u16,
    /// Extra ticks added to the current row
    pub fine_pattern_delay: u16,
    /// Rows to compact into one (pattern delay)
    pub pattern_delay: u16,
    /// Pattern delay progress
    pub pattern_delay_count: u16,
    /// Break target row
    pub break_row: u16,
    /// Position jump target order
    pub jump_order: u16,
    /// Change-pattern target track
    pub chg_pattern: u16,
    /// Pattern loop stack (depth = sub-song loop_stack_size)
    pub loop_stack: Vec<LoopMark>,
    /// Next free loop stack slot
    pub loop_depth: usize,
    /// GoSub return stack (depth = sub-song gosub_stack_size)
    pub gosub_stack: Vec<(u16, u16)>,
    /// Times each order entry was entered (GoSub recursion guard)
    pub order_played: Vec<u16>,
    /// Channel wrapped or finished at least once
    pub reported_end: bool,
    /// Pattern-flow flags
    pub flags: HostFlags,

    // Note state
    /// Current instrument number (1-based, 0 = none yet)
    pub instrument: u16,
    /// Current sample number within the instrument (1-based)
    pub sample: u16,
    /// Key of the last played note (octave * 12 + note - 1)
    pub key: u8,
    /// Transpose staged by SET_TRANSPOSE for the next note
    pub transpose: i8,
    /// Finetune staged by SET_TRANSPOSE for the next note
    pub finetune: i8,
    /// Hold count staged for new notes
    pub hold: u16,
    /// Decay count staged for new notes
    pub decay: u16,

    // Portamento memories (full data words, slide + 1/256 sub-slide)
    pub porta_up: u16,
    pub porta_down: u16,
    pub fine_porta_up: u16,
    pub fine_porta_down: u16,
    pub porta_up_once: u16,
    pub porta_down_once: u16,
    pub fine_porta_up_once: u16,
    pub fine_porta_down_once: u16,
    pub tone_porta: u16,
    pub fine_tone_porta: u16,
    pub tone_porta_once: u16,
    pub fine_tone_porta_once: u16,
    /// Tone portamento target frequency (0 = none yet)
    pub tone_porta_target: u32,
    /// This row's tone portamento captures the note as its target
    pub tone_porta_pending: bool,

    // Note slide memory
    pub note_slide_type: u8,
    pub note_slide: u8,

    // Volume slide memories
    pub vol_slide_up: u16,
    pub vol_slide_down: u16,
    pub fine_vol_slide_up: u16,
    pub fine_vol_slide_down: u16,
    pub vol_slide_to: u16,
    pub vol_slide_to_target: u16,
    pub track_vol_slide_up: u16,
    pub track_vol_slide_down: u16,
    pub fine_track_vol_slide_up: u16,
    pub fine_track_vol_slide_down: u16,
    pub track_vol_slide_to: u16,
    pub track_vol_slide_to_target: u16,

    // Panning slide memories
    pub pan_slide_left: u16,
    pub pan_slide_right: u16,
    pub fine_pan_slide_left: u16,
    pub fine_pan_slide_right: u16,
    pub pan_slide_to: u16,
    pub pan_slide_to_target: u16,
    pub track_pan_slide_left: u16,
    pub track_pan_slide_right: u16,
    pub fine_track_pan_slide_left: u16,
    pub fine_track_pan_slide_right: u16,
    pub track_pan_slide_to: u16,
    pub track_pan_slide_to_target: u16,

    // Arpeggio
    /// First and second arpeggio halftones (signed, backwards allowed)
    pub arpeggio_first: i8,
    pub arpeggio_second: i8,
    /// Tick position within the three-step arpeggio cycle
    pub arpeggio_tick: u16,
    /// Voice frequency before the current arpeggio adjustment (0 = none)
    pub arpeggio_saved_freq: u32,

    // Vibrato (frequency), tremolo (volume), pannolo (panning)
    pub vibrato_rate: u8,
    pub vibrato_depth: i8,
    pub vibrato_env: PlayerEnvelope<'m>,
    /// Voice frequency before the current vibrato offset (0 = none)
    pub vibrato_saved_freq: u32,
    pub tremolo_rate: u8,
    pub tremolo_depth: i8,
    pub tremolo_env: PlayerEnvelope<'m>,
    /// Applied tremolo volume offset, rolled back before re-applying
    pub tremolo_slide: i32,
    pub pannolo_rate: u8,
    pub pannolo_depth: i8,
    pub pannolo_env: PlayerEnvelope<'m>,
    pub pannolo_slide: i32,

    // Track-wide tremolo/pannolo
    pub track_tremolo_rate: u8,
    pub track_tremolo_depth: i8,
    pub track_tremolo_env: PlayerEnvelope<'m>,
    pub track_tremolo_slide: i32,
    pub track_pannolo_rate: u8,
    pub track_pannolo_depth: i8,
    pub track_pannolo_env: PlayerEnvelope<'m>,
    pub track_pannolo_slide: i32,

    // Tremor
    pub tremor_on: u8,
    pub tremor_off: u8,
    pub tremor_count: u16,
    pub tremor_muted: bool,
    /// Volume stashed while the tremor off-phase mutes the voice
    pub tremor_saved: (u8, u8),

    // Retrigger
    /// Retrigger interval in ticks (0 = off)
    pub retrig_tick: u16,
    /// Multi-retrigger volume change mode byte
    pub multi_retrig_vol: u8,
    /// Multi-retrigger tick count memory
    pub multi_retrig_tick: u16,
    /// Volume amplifier for multi-retrigger adds (extended control)
    pub multi_retrig_scale: u8,
    /// Tempo divider applied to retrigger counts (extended control)
    pub retrig_divider: u8,

    // Note delay staging (other tick triggers compare inline per tick)
    pub note_delay_tick: Option<u16>,
    /// Row payload replayed when the note delay expires
    pub delayed_octave: u8,
    pub delayed_note: i8,
    pub delayed_instrument: u16,

    // Sample offset
    pub sample_offset_high: u16,
    pub sample_offset: u32,

    // Effect execution control
    /// Execute continuous effects only at this tick (EXECUTE_FX)
    pub exec_fx_tick: Option<u16>,
    /// Stop one effect at a tick: (tick, effect byte)
    pub stop_fx: Option<(u8, u8)>,
    /// Effect-slot bitmap, set once an effect fired this tick
    pub effects_used: u16,
    /// Last effect byte dispatched on this channel
    pub last_fx: u8,

    // Sub-slide control
    /// Target mask from SET_SUB_SLIDE
    pub sub_slide_bits: u8,
    /// Sub-slide value applied to the targets
    pub sub_slide: u8,
    /// Sub-slides enabled (extended control)
    pub sub_slides_enabled: bool,
    /// Pitch sub-slide accumulator value (extended control)
    pub pitch_sub_slide: u8,

    // Glissando (0 = off, otherwise round slides to nearest n halftones)
    pub glissando: u16,

    // Synth/envelope control staging
    pub synth_ctrl_type: u8,
    pub synth_ctrl_count: u8,
    pub synth_ctrl_active: bool,
    /// Last value handed to SET_SYNTH_VALUE
    pub synth_value: u16,
    pub env_ctrl_kind: u8,
    pub env_ctrl_change: u8,
    pub env_ctrl_active: bool,
    /// Last value handed to SET_ENVELOPE_VALUE
    pub env_value: u16,

    // New-note policies (copied from the instrument, overridden by NNA_CTRL)
    pub nna: NewNoteAction,
    pub dct: DuplicateCheck,
    pub dna: DuplicateAction,

    // Channel control routing
    pub ctrl: ChannelControl,
    /// Target channel in Normal mode
    pub ctrl_channel: u16,
    /// Selection bitmap in Multiple mode (one bit per host channel)
    pub ctrl_bitmap: [u8; 32],
    pub ctrl_affect_notes: bool,
    pub ctrl_affect_non_notes: bool,

    // Track-level mix state
    pub track_volume: u8,
    pub track_sub_volume: u8,
    pub track_panning: u8,
    pub track_sub_panning: u8,
    pub track_surround: bool,
    /// Channel panning new notes start from (order list initial)
    pub channel_panning: u8,
    pub channel_sub_panning: u8,
    pub channel_surround: bool,
    pub muted: bool,

    // Compat flags of the current track
    pub compat_flags: TrackCompatFlags,

    /// Voice currently owned by this host (foreground)
    pub voice: Option<u16>,
}

impl<'m> HostChannel<'m> {
    /// Reset everything that is scoped to a single row
    ///
    /// Called on every row boundary before the new row is read.
    pub fn reset_row_state(&mut self) {
        self.effects_used = 0;
        self.arpeggio_tick = 0;
        self.arpeggio_first = 0;
        self.arpeggio_second = 0;
        self.retrig_tick = 0;
        self.note_delay_tick = None;
        self.tone_porta_pending = false;
        self.exec_fx_tick = None;
        self.stop_fx = None;
        self.tremor_on = 0;
        self.tremor_off = 0;
    }

    /// True when channel control routes to the given channel
    pub fn controls_channel(&self, channel: usize) -> bool {
        match self.ctrl {
            ChannelControl::Off => false,
            ChannelControl::Normal => self.ctrl_channel as usize == channel,
            ChannelControl::Multiple => {
                channel < 256 && self.ctrl_bitmap[channel / 8] & (1 << (channel % 8)) != 0
            }
            ChannelControl::Global => true,
        }
    }

    /// Flip a channel in the Multiple-mode selection bitmap
    pub fn select_channel(&mut self, channel: usize, selected: bool) {
        if channel < 256 {
            let bit = 1u8 << (channel % 8);
            if selected {
                self.ctrl_bitmap[channel / 8] |= bit;
            } else {
                self.ctrl_bitmap[channel / 8] &= !bit;
            }
        }
    }

    /// True when the channel still takes part in row processing
    pub fn playing(&self) -> bool {
        !self
            .flags
            .intersects(HostFlags::DISABLED | HostFlags::SONG_END)
    }
}

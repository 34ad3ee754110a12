//! Per-voice update (phase 5)
//!
//! Steps the voice envelopes, applies fadeout and the auto-modulations,
//! runs the synth VM, clamps the frequency against the sample limits and
//! composes the final mixer volume and panning before pushing the
//! snapshot downstream. At most one mixer call goes out per voice and
//! tick.

use nether_seq::Sample;

use crate::mixer::{Mixer, MixerChannel, MixerChannelFlags};

use super::Player;

/// Which auto-modulation lane is being stepped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoMod {
    Vibrato,
    Tremolo,
    Pannolo,
}

impl<'m, M: Mixer> Player<'m, M> {
    /// Update one voice and push its state to the mixer
    pub(super) fn update_voice(&mut self, v: usize) {
        if !self.voices[v].allocated {
            // A cut voice still owes the mixer one stop notification
            if self.voices[v].last_push.flags.contains(MixerChannelFlags::PLAY) {
                let stopped = MixerChannel {
                    flags: MixerChannelFlags::empty(),
                    volume: 0,
                    ..self.voices[v].last_push
                };
                self.mixer.set_channel(v, &stopped);
                self.voices[v].last_push = stopped;
                self.voices[v].mixer.flags -= MixerChannelFlags::PLAY;
            }
            return;
        }

        let sustain = !self.voices[v].key_off;

        // Volume, panning, slide and resonance envelopes
        let mut seed = self.seed;
        let (vol_env, vol_terminal) = {
            let env = &mut self.voices[v].envelopes.volume;
            if env.envelope.is_some() {
                env.step(sustain, &mut seed);
                (Some(env.value), env.tempo == 0)
            } else {
                (None, false)
            }
        };
        let pan_env = {
            let env = &mut self.voices[v].envelopes.panning;
            if env.envelope.is_some() {
                env.step(sustain, &mut seed);
                Some(env.value)
            } else {
                None
            }
        };
        let slide_env = {
            let env = &mut self.voices[v].envelopes.slide;
            if env.envelope.is_some() {
                env.step(sustain, &mut seed);
                Some(env.value)
            } else {
                None
            }
        };
        let resonance_env = {
            let env = &mut self.voices[v].envelopes.resonance;
            if env.envelope.is_some() {
                env.step(sustain, &mut seed);
                Some(env.value)
            } else {
                None
            }
        };
        self.seed = seed;

        // A volume envelope that ran out at zero ends the voice
        if vol_terminal && vol_env == Some(0) {
            self.cut_and_stop(v);
            return;
        }

        // The slide envelope is a cumulative per-tick pitch slide
        if let Some(slide) = slide_env {
            if slide != 0 {
                let ch = self.voices[v].host as usize;
                let freq = self.voices[v].frequency;
                self.voices[v].frequency = self.shift_frequency(ch, freq, slide as i32);
            }
        }

        // Fadeout
        if self.voices[v].fading {
            let voice = &mut self.voices[v];
            voice.fade_out_count -= voice.fade_out.max(1) as i32;
            if voice.fade_out_count <= 0 {
                self.cut_and_stop(v);
                return;
            }
        }

        // MED-style hold: when the hold runs out the decay action fires,
        // with the decay value bounding the remaining fade
        if self.voices[v].hold != 0 {
            self.voices[v].hold -= 1;
            if self.voices[v].hold == 0 {
                let dca = self.voices[v].dca;
                self.apply_duplicate_action(v, dca);
                if !self.voices[v].allocated {
                    return;
                }
                let voice = &mut self.voices[v];
                if voice.fading && voice.decay != 0 {
                    voice.fade_out_count = voice.fade_out_count.min(voice.decay as i32 * 0x10);
                }
            }
        }

        // Auto-vibrato (frequency), auto-tremolo (volume) and
        // auto-pannolo (panning); all three affect the output only
        let auto_vib_steps = self.auto_modulation(v, AutoMod::Vibrato);
        let auto_trm = self.auto_modulation(v, AutoMod::Tremolo);
        let auto_pan = self.auto_modulation(v, AutoMod::Pannolo);

        // Synth VM; any dead context ends the voice immediately
        if !self.run_synth(v) {
            self.cut_and_stop(v);
            return;
        }

        // Frequency clamp against the sample limits; a clamp to zero
        // ends the voice
        let sample = self.voice_sample(v);
        let (rate_min, rate_max) = sample
            .map(|s| (s.rate_min.min(s.rate_max), s.rate_max.max(s.rate_min)))
            .unwrap_or((1, u32::MAX));
        let base_freq = self.voices[v].frequency.clamp(rate_min, rate_max);
        self.voices[v].frequency = base_freq;
        if base_freq == 0 {
            self.cut_and_stop(v);
            return;
        }
        let ch = self.voices[v].host as usize;
        let out_freq = if auto_vib_steps != 0 {
            self.shift_frequency(ch, base_freq, auto_vib_steps)
        } else {
            base_freq
        };
        let rate = ((out_freq as u64 * self.relative_pitch as u64) >> 16).max(1) as u32;

        // Final volume: host x instrument x envelope x global x fadeout
        // x track, composed in fixed point and bounded to [0, 255]
        let final_volume = {
            let voice = &self.voices[v];
            let host = &self.hosts[ch];
            if host.muted {
                0
            } else {
                let note_vol = (voice.volume as i32 + (auto_trm >> 8)).clamp(0, 255) as u64;
                let coarse = note_vol
                    * host.track_volume as u64
                    * voice.instr_volume as u64
                    * self.global_volume as u64;
                let env_scale = match vol_env {
                    Some(value) => (value.clamp(0, i16::MAX) as u64) * 2,
                    None => 65536,
                };
                let fade_scale = voice.fade_out_count.clamp(0, 65535) as u64 + 1;
                let scaled = (coarse * env_scale >> 16) * fade_scale >> 16;
                (scaled / (255 * 255 * 255)).min(255) as u32
            }
        };

        // Final panning: note pan offset around the track pan, panning
        // envelope and pitch-pan separation folded in, then the global
        // separation scale
        let final_panning = {
            let voice = &self.voices[v];
            let host = &self.hosts[ch];
            let mut pan = host.track_panning as i32 + (voice.panning as i32 - 0x80);
            pan += auto_pan >> 8;
            if let Some(value) = pan_env {
                pan += (value >> 8) as i32;
            }
            if voice.pitch_pan_separation != 0 {
                let span = voice.key as i32 - voice.pitch_pan_center as i32;
                pan += (span * voice.pitch_pan_separation as i32) >> 4;
            }
            let mut pan = pan.clamp(0, 255);
            if self.global_panning != 0 {
                pan = 0x80 + ((pan - 0x80) * (255 - self.global_panning as i32)) / 255;
            }
            if self.mono {
                pan = 0x80;
            }
            pan as u8
        };

        let surround = !self.mono
            && (self.voices[v].surround
                || self.hosts[ch].track_surround
                || self.global_surround);

        // Resonance envelope drives the filter hint (0x1000 = open)
        let (filter_cutoff, filter_damping) = match resonance_env {
            Some(value) => ((value.clamp(0, 0x0FFF)) as u16, (value as u16) >> 4 & 0x0FFF),
            None => (0x1000, 0),
        };

        let voice = &mut self.voices[v];
        voice.final_volume = final_volume;
        voice.final_panning = final_panning;

        let mut candidate = voice.mixer;
        candidate.rate = rate;
        candidate.volume = final_volume;
        candidate.panning = final_panning;
        candidate.filter_cutoff = filter_cutoff;
        candidate.filter_damping = filter_damping;
        if surround {
            candidate.flags |= MixerChannelFlags::SURROUND;
        } else {
            candidate.flags -= MixerChannelFlags::SURROUND;
        }

        // Sustain loop geometry applies until keyoff, then the regular
        // loop takes over
        if let Some(sample) = sample {
            if sample
                .flags
                .contains(nether_seq::SampleFlags::SUSTAIN_LOOP)
                && !candidate.flags.contains(MixerChannelFlags::SYNTH)
            {
                if sustain {
                    candidate.repeat_start = sample.sustain_start;
                    candidate.repeat_length = sample.sustain_length;
                    candidate.repeat_count = sample.sustain_count;
                    candidate.flags |= MixerChannelFlags::LOOP;
                    if sample
                        .flags
                        .contains(nether_seq::SampleFlags::SUSTAIN_PINGPONG)
                    {
                        candidate.flags |= MixerChannelFlags::PINGPONG;
                    }
                } else if sample.flags.contains(nether_seq::SampleFlags::LOOP) {
                    candidate.repeat_start = sample.repeat_start;
                    candidate.repeat_length = sample.repeat_length;
                    candidate.repeat_count = sample.repeat_count;
                } else {
                    candidate.flags -= MixerChannelFlags::LOOP | MixerChannelFlags::PINGPONG;
                    candidate.repeat_length = 0;
                }
            }
        }

        self.push_voice(v, candidate);
    }

    /// One auto-modulation step: envelope value x depth x sweep ramp,
    /// returned in 1/256 units of the respective target
    fn auto_modulation(&mut self, v: usize, which: AutoMod) -> i32 {
        let (depth, rate, sweep, count) = {
            let voice = &self.voices[v];
            match which {
                AutoMod::Vibrato => (
                    voice.auto_vibrato_depth,
                    voice.auto_vibrato_rate,
                    voice.auto_vibrato_sweep,
                    voice.auto_vibrato_count,
                ),
                AutoMod::Tremolo => (
                    voice.auto_tremolo_depth,
                    voice.auto_tremolo_rate,
                    voice.auto_tremolo_sweep,
                    voice.auto_tremolo_count,
                ),
                AutoMod::Pannolo => (
                    voice.auto_pannolo_depth,
                    voice.auto_pannolo_rate,
                    voice.auto_pannolo_sweep,
                    voice.auto_pannolo_count,
                ),
            }
        };
        if depth == 0 {
            return 0;
        }
        let mut seed = self.seed;
        let mut value = 0i16;
        {
            let env = match which {
                AutoMod::Vibrato => &mut self.voices[v].envelopes.auto_vibrato,
                AutoMod::Tremolo => &mut self.voices[v].envelopes.auto_tremolo,
                AutoMod::Pannolo => &mut self.voices[v].envelopes.auto_pannolo,
            };
            if env.envelope.is_some() {
                for _ in 0..rate.max(1) {
                    value = env.step(true, &mut seed);
                }
            }
        }
        self.seed = seed;

        // Sweep ramps the depth in from zero over `sweep` ticks
        let scaled = value as i64 * depth as i64;
        let swept = if sweep != 0 && count < sweep as u32 {
            let voice = &mut self.voices[v];
            match which {
                AutoMod::Vibrato => voice.auto_vibrato_count = count + 1,
                AutoMod::Tremolo => voice.auto_tremolo_count = count + 1,
                AutoMod::Pannolo => voice.auto_pannolo_count = count + 1,
            }
            scaled * count as i64 / sweep as i64
        } else {
            scaled
        };
        (swept >> 6) as i32
    }

    fn voice_sample(&self, v: usize) -> Option<&'m Sample> {
        let voice = &self.voices[v];
        self.module
            .instrument(voice.instrument)
            .and_then(|i| i.sample(voice.sample))
    }

    /// Cut a voice and tell the mixer to stop the channel
    pub(super) fn cut_and_stop(&mut self, v: usize) {
        let host = self.voices[v].host as usize;
        if self.hosts.get(host).and_then(|h| h.voice) == Some(v as u16) {
            self.hosts[host].voice = None;
        }
        self.voices[v].cut();
        let stopped = MixerChannel {
            flags: MixerChannelFlags::empty(),
            volume: 0,
            ..self.voices[v].last_push
        };
        self.mixer.set_channel(v, &stopped);
        self.voices[v].last_push = stopped;
        self.voices[v].mixer = stopped;
    }

    /// Push at most one mixer update for the voice
    fn push_voice(&mut self, v: usize, candidate: MixerChannel<'m>) {
        let last = self.voices[v].last_push;

        let data_changed = match (candidate.data, last.data) {
            (Some(a), Some(b)) => !a.ptr_eq(&b),
            (None, None) => false,
            _ => true,
        };
        let geometry_changed = data_changed
            || candidate.position != last.position
            || candidate.length != last.length
            || candidate.repeat_start != last.repeat_start
            || candidate.repeat_length != last.repeat_length
            || candidate.repeat_count != last.repeat_count
            || candidate.bits_per_sample != last.bits_per_sample
            || candidate.flags != last.flags;
        let vpp_changed = candidate.volume != last.volume
            || candidate.panning != last.panning
            || candidate.rate != last.rate;
        let filter_changed = candidate.filter_cutoff != last.filter_cutoff
            || candidate.filter_damping != last.filter_damping;

        if geometry_changed {
            self.mixer.set_channel(v, &candidate);
        } else if vpp_changed {
            self.mixer.set_channel_volume_panning_pitch(v, &candidate);
        } else if filter_changed {
            self.mixer.set_channel_filter(v, &candidate);
        }

        let voice = &mut self.voices[v];
        voice.mixer = candidate;
        voice.last_push = candidate;
    }
}

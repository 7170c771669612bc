// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! A pad's audio chain.
//!
//! Each chain plays one sample through a fixed series of nodes:
//! sample voices, highpass, lowpass and finally pan/volume into the output bus.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::session::performance::{EffectSettings, LOWPASS_OPEN_HZ};

use super::bus::OutputBus;
use super::envelope::Envelope;
use super::error::LoadError;
use super::filter::StateVariableFilter;
use super::loader::LoadedSample;

/// Maximum simultaneous voices per chain. The oldest voice is stolen beyond this.
const MAX_VOICES: usize = 16;

/// Lifecycle of a chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainStatus {
    /// The sample is still being fetched. Triggers are ignored.
    Loading,
    /// The sample is loaded and triggers sound.
    Ready,
    /// The sample could not be loaded. The pad stays silent.
    Failed(String),
    /// The chain has been torn down.
    Destroyed,
}

impl ChainStatus {
    /// Whether loading has finished one way or another.
    pub fn is_settled(&self) -> bool {
        *self != ChainStatus::Loading
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStatus::Loading => write!(f, "loading"),
            ChainStatus::Ready => write!(f, "ready"),
            ChainStatus::Failed(reason) => write!(f, "failed: {}", reason),
            ChainStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Converts decibels to a linear gain.
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Equal-power gains for a mono signal at the given pan position.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}

struct Voice {
    position: usize,
    envelope: Envelope,
    /// Frame at which the voice releases itself, for timed triggers.
    release_at: Option<usize>,
    /// Held voices are released by `trigger_release`.
    held: bool,
}

struct Dsp {
    sample: Option<LoadedSample>,
    voices: Vec<Voice>,
    highpass: StateVariableFilter,
    lowpass: StateVariableFilter,
    settings: EffectSettings,
    left_gain: f32,
    right_gain: f32,
    scratch: Vec<f32>,
}

impl Dsp {
    fn apply(&mut self, settings: &EffectSettings) {
        self.settings = *settings;
        self.highpass.set_cutoff(settings.highpass_hz);
        self.lowpass.set_cutoff(settings.lowpass_hz);

        let gain = db_to_gain(settings.volume_db);
        let (left, right) = pan_gains(settings.pan);
        self.left_gain = gain * left;
        self.right_gain = gain * right;
    }

    fn start_voice(&mut self, sample_rate: u32, release_after: Option<f64>) {
        if self.voices.len() >= MAX_VOICES {
            self.voices.remove(0);
        }
        let mut envelope = Envelope::new(
            sample_rate,
            self.settings.attack_seconds,
            self.settings.release_seconds,
        );
        envelope.trigger();
        self.voices.push(Voice {
            position: 0,
            envelope,
            release_at: release_after.map(|seconds| (seconds.max(0.0) * sample_rate as f64) as usize),
            held: release_after.is_none(),
        });
    }

    fn render_add(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if self.voices.is_empty() {
            return;
        }
        let data = match &self.sample {
            Some(sample) => sample.data().clone(),
            None => return,
        };

        self.scratch.clear();
        self.scratch.resize(frames, 0.0);
        for voice in self.voices.iter_mut() {
            for out in self.scratch.iter_mut() {
                if voice.position >= data.len() || voice.envelope.is_finished() {
                    break;
                }
                if voice.release_at == Some(voice.position) {
                    voice.envelope.release();
                    voice.release_at = None;
                }
                *out += data[voice.position] * voice.envelope.next_level();
                voice.position += 1;
            }
        }
        self.voices
            .retain(|voice| voice.position < data.len() && !voice.envelope.is_finished());

        // Highpass at or below zero is off, and the lowpass is open at its default cutoff.
        let highpass_active = self.settings.highpass_hz > 0.0;
        let lowpass_active = self.settings.lowpass_hz < LOWPASS_OPEN_HZ;
        for (i, sample) in self.scratch.iter().enumerate() {
            let mut sample = *sample;
            if highpass_active {
                sample = self.highpass.process(sample);
            }
            if lowpass_active {
                sample = self.lowpass.process(sample);
            }
            left[i] += sample * self.left_gain;
            right[i] += sample * self.right_gain;
        }
    }
}

/// One pad's signal path into the shared output bus.
pub struct AudioChain {
    id: String,
    source_url: String,
    sample_rate: u32,
    dsp: Mutex<Dsp>,
    status: watch::Sender<ChainStatus>,
    bus: Mutex<Option<Weak<OutputBus>>>,
    /// Voices started since creation.
    triggers: AtomicUsize,
}

impl AudioChain {
    /// Creates a chain in the loading state with the given settings applied.
    pub fn new(
        id: &str,
        source_url: &str,
        sample_rate: u32,
        settings: &EffectSettings,
    ) -> Arc<AudioChain> {
        let mut dsp = Dsp {
            sample: None,
            voices: Vec::with_capacity(MAX_VOICES),
            highpass: StateVariableFilter::highpass(sample_rate, settings.highpass_hz),
            lowpass: StateVariableFilter::lowpass(sample_rate, settings.lowpass_hz),
            settings: *settings,
            left_gain: 0.0,
            right_gain: 0.0,
            scratch: Vec::new(),
        };
        dsp.apply(settings);

        let (status, _) = watch::channel(ChainStatus::Loading);
        Arc::new(AudioChain {
            id: id.to_string(),
            source_url: source_url.to_string(),
            sample_rate,
            dsp: Mutex::new(dsp),
            status,
            bus: Mutex::new(None),
            triggers: AtomicUsize::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn status(&self) -> ChainStatus {
        self.status.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.status.borrow() == ChainStatus::Ready
    }

    /// Watches status changes.
    pub fn subscribe(&self) -> watch::Receiver<ChainStatus> {
        self.status.subscribe()
    }

    /// Completes loading. Ignored once the chain has left the loading state.
    pub fn finish_loading(&self, result: Result<LoadedSample, LoadError>) {
        let mut dsp = self.dsp.lock();
        self.status.send_if_modified(|status| {
            if *status != ChainStatus::Loading {
                return false;
            }
            match &result {
                Ok(sample) => {
                    dsp.sample = Some(sample.clone());
                    *status = ChainStatus::Ready;
                    debug!(id = self.id, frames = sample.frames(), "Chain ready");
                }
                Err(e) => {
                    warn!(id = self.id, source_url = self.source_url, err = %e, "Unable to load sample");
                    *status = ChainStatus::Failed(e.to_string());
                }
            }
            true
        });
    }

    /// Waits until loading has finished and returns the settled status.
    pub async fn wait_settled(&self) -> ChainStatus {
        let mut receiver = self.subscribe();
        let settled = match receiver.wait_for(ChainStatus::is_settled).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        };
        settled
    }

    /// Starts a held voice. Returns false if the chain cannot sound.
    pub fn trigger_attack(&self) -> bool {
        self.start_voice(None)
    }

    /// Releases every held voice.
    pub fn trigger_release(&self) -> bool {
        if !self.is_ready() {
            return false;
        }
        let mut dsp = self.dsp.lock();
        for voice in dsp.voices.iter_mut().filter(|voice| voice.held) {
            voice.envelope.release();
            voice.held = false;
        }
        true
    }

    /// Starts a voice that releases itself after `duration` seconds.
    pub fn trigger_attack_release(&self, duration: f64) -> bool {
        self.start_voice(Some(duration))
    }

    fn start_voice(&self, release_after: Option<f64>) -> bool {
        if !self.is_ready() {
            debug!(id = self.id, status = %self.status(), "Ignoring trigger");
            return false;
        }
        self.dsp.lock().start_voice(self.sample_rate, release_after);
        self.triggers.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Applies effect settings to the live nodes. Voices already sounding keep their envelope.
    pub fn apply_settings(&self, settings: &EffectSettings) {
        self.dsp.lock().apply(settings);
    }

    pub fn settings(&self) -> EffectSettings {
        self.dsp.lock().settings
    }

    /// Number of voices started since the chain was created.
    pub fn trigger_count(&self) -> usize {
        self.triggers.load(Ordering::Relaxed)
    }

    /// Number of voices currently sounding.
    pub fn active_voices(&self) -> usize {
        self.dsp.lock().voices.len()
    }

    /// Connects the chain to a bus. A chain is only ever connected once.
    pub fn connect(self: &Arc<Self>, bus: &Arc<OutputBus>) -> bool {
        let mut connected = self.bus.lock();
        if connected.is_some() || *self.status.borrow() == ChainStatus::Destroyed {
            warn!(id = self.id, "Chain is already connected");
            return false;
        }
        *connected = Some(Arc::downgrade(bus));
        bus.attach(self.clone());
        true
    }

    /// Tears the chain down and releases its nodes. Safe to call repeatedly.
    pub fn destroy(&self) {
        let changed = self.status.send_if_modified(|status| {
            if *status == ChainStatus::Destroyed {
                return false;
            }
            *status = ChainStatus::Destroyed;
            true
        });
        if !changed {
            return;
        }

        if let Some(bus) = self.bus.lock().take().and_then(|bus| bus.upgrade()) {
            bus.detach(&self.id);
        }
        let mut dsp = self.dsp.lock();
        dsp.voices.clear();
        dsp.sample = None;
        dsp.highpass.reset();
        dsp.lowpass.reset();
        info!(id = self.id, "Chain destroyed");
    }

    /// Mixes this chain's output into the given buffers.
    pub(super) fn render_add(&self, left: &mut [f32], right: &mut [f32]) {
        self.dsp.lock().render_add(left, right);
    }
}

impl fmt::Debug for AudioChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioChain")
            .field("id", &self.id)
            .field("source_url", &self.source_url)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::audio::bus::OutputBus;
    use crate::audio::error::LoadError;
    use crate::audio::loader::LoadedSample;
    use crate::session::performance::EffectSettings;

    use super::{db_to_gain, pan_gains, AudioChain, ChainStatus};

    const RATE: u32 = 1000;

    fn ready_chain(settings: &EffectSettings) -> Arc<AudioChain> {
        let chain = AudioChain::new("kit/1-Kick", "kick.wav", RATE, settings);
        chain.finish_loading(Ok(LoadedSample::new(vec![1.0; 500], RATE)));
        chain
    }

    fn render(chain: &AudioChain, frames: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        chain.render_add(&mut left, &mut right);
        (left, right)
    }

    #[test]
    fn test_gain_helpers() {
        assert_eq!(1.0, db_to_gain(0.0));
        assert!((db_to_gain(-6.0) - 0.501).abs() < 0.001);
        assert_eq!(0.0, db_to_gain(f32::NEG_INFINITY));

        let (left, right) = pan_gains(0.0);
        assert!((left - right).abs() < 1e-6);
        assert!((left * left + right * right - 1.0).abs() < 1e-6);
        let (left, right) = pan_gains(-1.0);
        assert_eq!(1.0, left);
        assert!(right.abs() < 1e-6);
    }

    #[test]
    fn test_triggers_ignored_until_ready() {
        let chain = AudioChain::new("kit/1-Kick", "kick.wav", RATE, &EffectSettings::default());
        assert_eq!(ChainStatus::Loading, chain.status());
        assert!(!chain.trigger_attack());
        assert!(!chain.trigger_attack_release(0.1));
        assert_eq!(0, chain.active_voices());

        chain.finish_loading(Ok(LoadedSample::new(vec![1.0; 10], RATE)));
        assert!(chain.trigger_attack());
        assert_eq!(1, chain.active_voices());
        assert_eq!(1, chain.trigger_count());
    }

    #[test]
    fn test_failed_chain_is_silent() {
        let chain = AudioChain::new("kit/1-Kick", "kick.wav", RATE, &EffectSettings::default());
        chain.finish_loading(Err(LoadError::NotFound("kick.wav".to_string())));
        assert!(matches!(chain.status(), ChainStatus::Failed(_)));
        assert!(!chain.trigger_attack());

        // Loading cannot resurrect a settled chain.
        chain.finish_loading(Ok(LoadedSample::new(vec![1.0; 10], RATE)));
        assert!(matches!(chain.status(), ChainStatus::Failed(_)));
    }

    #[test]
    fn test_attack_release_plays_for_duration() {
        let chain = ready_chain(&EffectSettings::default());
        assert!(chain.trigger_attack_release(0.1));

        let (left, right) = render(&chain, 300);
        assert!(left[50] > 0.5);
        assert_eq!(left[50], right[50]);
        // Released at 100 frames with the shortest ramp.
        assert_eq!(0.0, left[200]);
        assert_eq!(0, chain.active_voices());
    }

    #[test]
    fn test_release_stops_held_voice() {
        let chain = ready_chain(&EffectSettings::default());
        chain.trigger_attack();
        let (left, _) = render(&chain, 50);
        assert!(left[49] > 0.5);

        assert!(chain.trigger_release());
        let (left, _) = render(&chain, 50);
        assert_eq!(0.0, left[49]);
        assert_eq!(0, chain.active_voices());
    }

    #[test]
    fn test_settings_apply_live() {
        let chain = ready_chain(&EffectSettings::default());
        chain.apply_settings(&EffectSettings {
            pan: 1.0,
            volume_db: -6.0,
            ..Default::default()
        });
        chain.trigger_attack();
        let (left, right) = render(&chain, 10);
        assert!(left[5].abs() < 1e-6);
        assert!((right[5] - db_to_gain(-6.0)).abs() < 1e-3);
    }

    #[test]
    fn test_connect_once_and_destroy_idempotent() {
        let bus = Arc::new(OutputBus::new(RATE));
        let chain = ready_chain(&EffectSettings::default());
        assert!(chain.connect(&bus));
        assert!(!chain.connect(&bus));
        assert_eq!(1, bus.chain_count());

        chain.destroy();
        chain.destroy();
        assert_eq!(ChainStatus::Destroyed, chain.status());
        assert_eq!(0, bus.chain_count());
        assert!(!chain.trigger_attack());
        assert!(!chain.connect(&bus));
    }

    #[tokio::test]
    async fn test_wait_settled() {
        let chain = AudioChain::new("kit/1-Kick", "kick.wav", RATE, &EffectSettings::default());
        let loading = chain.clone();
        let handle = tokio::spawn(async move { loading.wait_settled().await });
        chain.finish_loading(Ok(LoadedSample::new(vec![1.0; 10], RATE)));
        assert_eq!(ChainStatus::Ready, handle.await.expect("join"));
    }
}

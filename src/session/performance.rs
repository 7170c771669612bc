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
//! Per-sample performance data: effect settings and recorded events.

use serde::{Deserialize, Serialize};

use crate::catalog::SampleDescriptor;

/// Cutoff at which the lowpass filter is considered open.
pub const LOWPASS_OPEN_HZ: f32 = 20000.0;

/// Live effect parameters of a pad's chain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    /// Gain in decibels.
    pub volume_db: f32,
    /// Stereo position in [-1, 1].
    pub pan: f32,
    /// Highpass cutoff. Zero disables the filter.
    pub highpass_hz: f32,
    /// Lowpass cutoff. 20 kHz leaves the filter open.
    pub lowpass_hz: f32,
    pub attack_seconds: f32,
    pub release_seconds: f32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        EffectSettings {
            volume_db: 0.0,
            pan: 0.0,
            highpass_hz: 0.0,
            lowpass_hz: LOWPASS_OPEN_HZ,
            attack_seconds: 0.0,
            release_seconds: 0.0,
        }
    }
}

impl EffectSettings {
    /// Overwrites only the fields present in the patch.
    pub fn merge(&mut self, patch: &EffectSettingsPatch) {
        if let Some(volume_db) = patch.volume_db {
            self.volume_db = volume_db;
        }
        if let Some(pan) = patch.pan {
            self.pan = pan;
        }
        if let Some(highpass_hz) = patch.highpass_hz {
            self.highpass_hz = highpass_hz;
        }
        if let Some(lowpass_hz) = patch.lowpass_hz {
            self.lowpass_hz = lowpass_hz;
        }
        if let Some(attack_seconds) = patch.attack_seconds {
            self.attack_seconds = attack_seconds;
        }
        if let Some(release_seconds) = patch.release_seconds {
            self.release_seconds = release_seconds;
        }
    }
}

/// A partial update to [`EffectSettings`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectSettingsPatch {
    pub volume_db: Option<f32>,
    pub pan: Option<f32>,
    pub highpass_hz: Option<f32>,
    pub lowpass_hz: Option<f32>,
    pub attack_seconds: Option<f32>,
    pub release_seconds: Option<f32>,
}

impl EffectSettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == EffectSettingsPatch::default()
    }
}

/// A single captured press.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Transport position of the press, in seconds.
    pub start_time: f64,
    /// Seconds the pad was held. Zero until the press is released.
    pub duration: f64,
}

impl RecordedEvent {
    /// Whether the press has not been released yet.
    pub fn is_open(&self) -> bool {
        self.duration == 0.0
    }
}

/// Everything recorded and configured for one sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SamplePerformance {
    /// Absent for ids the session does not know.
    pub descriptor: Option<SampleDescriptor>,
    pub settings: EffectSettings,
    /// Events in capture order.
    pub events: Vec<RecordedEvent>,
}

impl SamplePerformance {
    pub fn new(descriptor: SampleDescriptor) -> SamplePerformance {
        SamplePerformance {
            descriptor: Some(descriptor),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::{EffectSettings, EffectSettingsPatch, LOWPASS_OPEN_HZ};

    #[test]
    fn test_merge_only_present_fields() {
        let mut settings = EffectSettings::default();
        settings.merge(&EffectSettingsPatch {
            pan: Some(-0.5),
            highpass_hz: Some(120.0),
            ..Default::default()
        });

        assert_eq!(-0.5, settings.pan);
        assert_eq!(120.0, settings.highpass_hz);
        assert_eq!(0.0, settings.volume_db);
        assert_eq!(LOWPASS_OPEN_HZ, settings.lowpass_hz);

        settings.merge(&EffectSettingsPatch::default());
        assert_eq!(-0.5, settings.pan);
        assert!(EffectSettingsPatch::default().is_empty());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: EffectSettings =
            serde_json::from_str("{\"volume_db\": -6.0}").expect("settings");
        assert_eq!(-6.0, settings.volume_db);
        assert_eq!(LOWPASS_OPEN_HZ, settings.lowpass_hz);
    }
}

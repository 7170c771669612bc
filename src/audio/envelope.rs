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
//! A linear attack/release envelope for sample voices.

/// Shortest ramp applied on release, to avoid clicks.
const MIN_RELEASE_SECONDS: f32 = 0.005;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Sustain,
    Release,
}

#[derive(Clone, Debug)]
pub struct Envelope {
    stage: EnvelopeStage,
    level: f32,
    attack_step: f32,
    release_samples: f32,
    release_step: f32,
}

impl Envelope {
    pub fn new(sample_rate: u32, attack_seconds: f32, release_seconds: f32) -> Envelope {
        let sample_rate = sample_rate as f32;
        let attack_samples = attack_seconds.max(0.0) * sample_rate;
        Envelope {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            attack_step: if attack_samples >= 1.0 {
                1.0 / attack_samples
            } else {
                1.0
            },
            release_samples: (release_seconds.max(MIN_RELEASE_SECONDS) * sample_rate).max(1.0),
            release_step: 0.0,
        }
    }

    /// Opens the gate.
    pub fn trigger(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    /// Closes the gate. The release ramps down from the current level.
    pub fn release(&mut self) {
        if self.stage == EnvelopeStage::Idle || self.stage == EnvelopeStage::Release {
            return;
        }
        self.stage = EnvelopeStage::Release;
        self.release_step = self.level / self.release_samples;
    }

    #[inline]
    pub fn next_level(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {}
            EnvelopeStage::Attack => {
                self.level += self.attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {}
            EnvelopeStage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Whether the envelope has finished its release.
    pub fn is_finished(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }
}

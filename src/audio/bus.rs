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
//! The shared output bus. Every connected chain is summed here, scaled by the
//! master gain and written to the device buffer.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::chain::AudioChain;

#[derive(Default)]
struct Scratch {
    left: Vec<f32>,
    right: Vec<f32>,
}

pub struct OutputBus {
    sample_rate: u32,
    chains: RwLock<Vec<Arc<AudioChain>>>,
    master_gain: RwLock<f32>,
    scratch: Mutex<Scratch>,
}

impl OutputBus {
    pub fn new(sample_rate: u32) -> OutputBus {
        OutputBus {
            sample_rate,
            chains: RwLock::new(Vec::new()),
            master_gain: RwLock::new(1.0),
            scratch: Mutex::new(Scratch::default()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn master_gain(&self) -> f32 {
        *self.master_gain.read()
    }

    pub fn set_master_gain(&self, gain: f32) {
        *self.master_gain.write() = gain.max(0.0);
    }

    pub fn chain_count(&self) -> usize {
        self.chains.read().len()
    }

    pub(super) fn attach(&self, chain: Arc<AudioChain>) {
        debug!(id = chain.id(), "Chain connected to bus");
        self.chains.write().push(chain);
    }

    pub(super) fn detach(&self, id: &str) {
        self.chains.write().retain(|chain| chain.id() != id);
    }

    /// Renders one interleaved block. Channel 0 is left, channel 1 is right and
    /// any further channels are silent. A single channel gets the mono sum.
    pub fn render(&self, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        if channels == 0 {
            return;
        }
        let frames = output.len() / channels;

        let mut scratch = self.scratch.lock();
        let Scratch { left, right } = &mut *scratch;
        left.clear();
        left.resize(frames, 0.0);
        right.clear();
        right.resize(frames, 0.0);

        for chain in self.chains.read().iter() {
            chain.render_add(left, right);
        }

        let gain = self.master_gain();
        for (frame, out) in output.chunks_exact_mut(channels).enumerate() {
            if channels == 1 {
                out[0] = (left[frame] + right[frame]) * 0.5 * gain;
            } else {
                out[0] = left[frame] * gain;
                out[1] = right[frame] * gain;
            }
        }
    }
}

impl std::fmt::Debug for OutputBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBus")
            .field("sample_rate", &self.sample_rate)
            .field("chains", &self.chain_count())
            .field("master_gain", &self.master_gain())
            .finish()
    }
}

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
//! A two-pole state variable filter in trapezoidal (TPT) form.

use std::f32::consts::TAU;

/// The quality factor used for both pad filters.
const DEFAULT_Q: f32 = 1.0;

/// Upper bound on the cutoff as a fraction of the sample rate. The prewarp
/// diverges at Nyquist.
const MAX_CUTOFF_RATIO: f32 = 0.49;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Lowpass,
    Highpass,
}

pub struct StateVariableFilter {
    mode: FilterMode,
    sample_rate: f32,
    cutoff_hz: f32,
    g: f32,
    k: f32,
    ic1eq: f32,
    ic2eq: f32,
}

impl StateVariableFilter {
    pub fn new(mode: FilterMode, sample_rate: u32, cutoff_hz: f32) -> StateVariableFilter {
        let mut filter = StateVariableFilter {
            mode,
            sample_rate: sample_rate as f32,
            cutoff_hz: 0.0,
            g: 0.0,
            k: 1.0 / DEFAULT_Q,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        filter.set_cutoff(cutoff_hz);
        filter
    }

    pub fn lowpass(sample_rate: u32, cutoff_hz: f32) -> StateVariableFilter {
        Self::new(FilterMode::Lowpass, sample_rate, cutoff_hz)
    }

    pub fn highpass(sample_rate: u32, cutoff_hz: f32) -> StateVariableFilter {
        Self::new(FilterMode::Highpass, sample_rate, cutoff_hz)
    }

    /// Sets the cutoff. The stored value is kept as given; only the coefficient is clamped.
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        if cutoff_hz == self.cutoff_hz && self.g > 0.0 {
            return;
        }
        self.cutoff_hz = cutoff_hz;
        let clamped = cutoff_hz.clamp(1.0, self.sample_rate * MAX_CUTOFF_RATIO);
        let wd = TAU * clamped;
        let wa = (2.0 * self.sample_rate) * (wd / (2.0 * self.sample_rate)).tan();
        self.g = wa / (2.0 * self.sample_rate);
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let (g, k) = (self.g, self.k);
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        match self.mode {
            FilterMode::Lowpass => v2,
            FilterMode::Highpass => sample - k * v1 - v2,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

impl std::fmt::Debug for StateVariableFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateVariableFilter")
            .field("mode", &self.mode)
            .field("cutoff_hz", &self.cutoff_hz)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::f32::consts::TAU;

    use super::StateVariableFilter;

    fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TAU * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn peak(buffer: &[f32]) -> f32 {
        buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = StateVariableFilter::lowpass(48000, 500.0);
        let mut buffer = vec![1.0; 4800];
        filter.render(&mut buffer);
        assert!((buffer[4799] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = StateVariableFilter::highpass(48000, 500.0);
        let mut buffer = vec![1.0; 4800];
        filter.render(&mut buffer);
        assert!(buffer[4799].abs() < 0.01);
    }

    #[test]
    fn test_lowpass_attenuates_above_cutoff() {
        let mut filter = StateVariableFilter::lowpass(48000, 500.0);
        let mut buffer = sine(5000.0, 48000, 4800);
        filter.render(&mut buffer);
        // Two poles, a decade above cutoff.
        assert!(peak(&buffer[480..]) < 0.05);
    }

    #[test]
    fn test_cutoff_above_nyquist_stays_finite() {
        let mut filter = StateVariableFilter::lowpass(44100, 30000.0);
        assert_eq!(30000.0, filter.cutoff());
        let mut buffer = sine(1000.0, 44100, 1024);
        filter.render(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }
}

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
//! Audio: sample loading, per-pad chains, the output bus and the device stream.

pub mod bus;
pub mod chain;
pub mod cpal;
pub mod envelope;
pub mod error;
pub mod factory;
pub mod filter;
pub mod loader;

pub use bus::OutputBus;
pub use chain::{AudioChain, ChainStatus};
pub use error::{LoadError, OutputError};
pub use factory::{ChainFactory, LoadingChainFactory};
pub use loader::{FileSampleLoader, LoadedSample, SampleLoader};

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, OutputError> {
    cpal::list_devices()
}

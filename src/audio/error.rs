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
use std::path::PathBuf;

/// Errors raised while loading a sample into a chain.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("no audio track found in {0}")]
    NoAudioTrack(PathBuf),

    #[error("{path} does not declare a sample rate")]
    UnknownSampleRate { path: PathBuf },

    #[error("{0} contains no audio")]
    Empty(PathBuf),

    #[error("sample {0} is not available")]
    NotFound(String),
}

/// Errors raised while opening the audio output.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("no output device named {0}")]
    NoDevice(String),

    #[error("unable to list devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("unable to read device name: {0}")]
    Name(#[from] cpal::DeviceNameError),

    #[error("unable to find a default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unable to query output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("unable to start output stream: {0}")]
    Stream(String),
}

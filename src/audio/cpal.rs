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
//! Audio output through cpal.

use std::fmt;
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use tracing::{error, info, span, Level};

use super::bus::OutputBus;
use super::error::OutputError;

/// An output device as reported by the host.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Lists output devices across every available host.
pub fn list_devices() -> Result<Vec<DeviceInfo>, OutputError> {
    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                error!(err = e.to_string(), host = host_id.name(), "Unable to open host");
                continue;
            }
        };
        let host_devices = match host.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = configs.map(|config| config.channels()).max().unwrap_or(0);
            if max_channels > 0 {
                devices.push(DeviceInfo {
                    name: device.name()?,
                    host: host_id.name().to_string(),
                    max_channels,
                });
            }
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

/// An opened output device and the stream config it will run at.
pub struct OutputDevice {
    name: String,
    device: cpal::Device,
    config: cpal::StreamConfig,
}

impl OutputDevice {
    /// Opens the named device, or the host's default output device when no name is given.
    pub fn open(name: Option<&str>) -> Result<OutputDevice, OutputError> {
        let host = cpal::default_host();
        let device = match name {
            Some(name) => {
                let mut found = None;
                for device in host.output_devices()? {
                    if device.name()?.trim() == name {
                        found = Some(device);
                        break;
                    }
                }
                found.ok_or_else(|| OutputError::NoDevice(name.to_string()))?
            }
            None => host
                .default_output_device()
                .ok_or_else(|| OutputError::NoDevice("default".to_string()))?,
        };

        let config = device.default_output_config()?.config();
        Ok(OutputDevice {
            name: device.name()?,
            device,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Starts rendering the bus. Audio stops when the returned stream is dropped.
    pub fn start(&self, bus: Arc<OutputBus>) -> Result<OutputStream, OutputError> {
        let device = self.device.clone();
        let config = self.config.clone();
        let name = self.name.clone();
        let channels = config.channels as usize;

        let (started_tx, started_rx) = bounded::<Result<(), OutputError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        // The stream is owned by this thread for its whole life.
        let handle = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output");
            let _enter = span.enter();

            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    bus.render(data, channels);
                },
                |err| error!(err = err.to_string(), "Output stream error"),
                None,
            );
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = started_tx.send(Err(OutputError::Stream(e.to_string())));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = started_tx.send(Err(OutputError::Stream(e.to_string())));
                return;
            }

            info!(device = name, "Output stream started");
            let _ = started_tx.send(Ok(()));
            let _ = stop_rx.recv();
            info!(device = name, "Output stream stopped");
        });

        match started_rx.recv() {
            Ok(Ok(())) => Ok(OutputStream {
                stop: Some(stop_tx),
                handle: Some(handle),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(OutputError::Stream("output thread exited".to_string())),
        }
    }
}

impl fmt::Debug for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputDevice")
            .field("name", &self.name)
            .field("channels", &self.channels())
            .field("sample_rate", &self.sample_rate())
            .finish()
    }
}

/// A running output stream.
pub struct OutputStream {
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        // Dropping the sender wakes the output thread.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Output thread panicked");
            }
        }
    }
}

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
use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use padsampler::audio::{self, cpal::OutputDevice};
use padsampler::catalog::{CatalogProvider, FileListCatalog};
use padsampler::config::SessionConfig;
use padsampler::controller::{keyboard, Controller};
use padsampler::session::Session;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A drum pad sampler."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the samples a collection resolves to.
    Catalog {
        /// The path to the session config.
        config_path: String,
        /// The collection to resolve.
        selector: String,
    },
    /// Start will start the sampler with the keyboard controller.
    Start {
        /// The path to the session config.
        config_path: String,
        /// Runs without opening an audio device.
        #[arg(long)]
        no_audio: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Catalog {
            config_path,
            selector,
        } => {
            let config = SessionConfig::deserialize(&PathBuf::from(config_path))?;
            let catalog = FileListCatalog::new(config.catalog(), config.archival_limit());
            let descriptors = catalog.fetch_sample_set(&selector)?;

            if descriptors.is_empty() {
                println!("No samples found for {}.", selector);
                return Ok(());
            }

            print!("{}", serde_yml::to_string(&descriptors)?);
        }
        Commands::Start {
            config_path,
            no_audio,
        } => {
            let config = SessionConfig::deserialize(&PathBuf::from(config_path))?;
            let device = if no_audio {
                None
            } else {
                Some(OutputDevice::open(config.device())?)
            };
            let sample_rate = device
                .as_ref()
                .map(|device| device.sample_rate())
                .unwrap_or(config.sample_rate());

            let session = Arc::new(Session::from_config(&config, sample_rate)?);
            let (change, ready) = session.set_collection(config.default_collection()).await;
            info!(
                collection = config.default_collection(),
                added = change.added.len(),
                "Loading samples"
            );
            let report = ready.wait().await;
            for (id, reason) in report.failed.iter() {
                warn!(id = id, reason = reason, "Sample failed to load");
            }
            println!("{} of {} pads ready.", report.ready.len(), session.pads().len());

            let _stream = match device.as_ref() {
                Some(device) => Some(device.start(session.bus())?),
                None => None,
            };

            Controller::new(session.clone(), Arc::new(keyboard::Driver::new()))?
                .join()
                .await?;
            session.teardown();
        }
    }

    Ok(())
}

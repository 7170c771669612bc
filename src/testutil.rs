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
//! Shared helpers for tests.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::audio::chain::AudioChain;
use crate::audio::error::LoadError;
use crate::audio::factory::ChainFactory;
use crate::audio::loader::{LoadedSample, SampleLoader};
use crate::catalog::{CatalogError, CatalogProvider, SampleDescriptor, SampleKind};
use crate::session::performance::EffectSettings;
use crate::transport::Clock;

/// Wait for the given predicate to return true or fail.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed().unwrap_or_default();
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes interleaved 32-bit float samples to a WAV file, creating parent directories.
pub fn write_wav(
    path: PathBuf,
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: channels.len() as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = channels.iter().map(|c| c.len()).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in channels.iter() {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;
    Ok(())
}

pub fn descriptor(id: &str, source_url: &str) -> SampleDescriptor {
    SampleDescriptor {
        id: id.to_string(),
        kind: SampleKind::Kit,
        title: source_url.to_string(),
        label: id.to_string(),
        source_url: source_url.to_string(),
        attribution: None,
    }
}

/// A clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

/// A clock that moves forward by a fixed step on every read.
pub struct TickingClock {
    now: Mutex<Duration>,
    step: Duration,
}

impl TickingClock {
    pub fn new(step: Duration) -> TickingClock {
        TickingClock {
            now: Mutex::new(Duration::ZERO),
            step,
        }
    }
}

impl Clock for TickingClock {
    fn now(&self) -> Duration {
        let mut now = self.now.lock();
        *now += self.step;
        *now
    }
}

/// Serves a short constant sample for every URL except the ones marked as failing.
pub struct StaticLoader {
    sample_rate: u32,
    failures: HashSet<String>,
}

impl StaticLoader {
    pub fn new(sample_rate: u32) -> StaticLoader {
        StaticLoader {
            sample_rate,
            failures: HashSet::new(),
        }
    }

    pub fn with_failure(mut self, source_url: &str) -> StaticLoader {
        self.failures.insert(source_url.to_string());
        self
    }
}

impl SampleLoader for StaticLoader {
    fn load(&self, source_url: &str) -> Result<LoadedSample, LoadError> {
        if self.failures.contains(source_url) {
            return Err(LoadError::NotFound(source_url.to_string()));
        }
        Ok(LoadedSample::new(vec![0.5; 64], self.sample_rate))
    }
}

/// Creates chains that settle immediately and counts creations and teardowns per id.
pub struct CountingFactory {
    loader: StaticLoader,
    created: Mutex<HashMap<String, usize>>,
    destroyed: Mutex<HashMap<String, usize>>,
}

impl CountingFactory {
    pub fn new() -> CountingFactory {
        CountingFactory {
            loader: StaticLoader::new(1000),
            created: Mutex::new(HashMap::new()),
            destroyed: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_failure(mut self, source_url: &str) -> CountingFactory {
        self.loader = self.loader.with_failure(source_url);
        self
    }

    pub fn created(&self, id: &str) -> usize {
        self.created.lock().get(id).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, id: &str) -> usize {
        self.destroyed.lock().get(id).copied().unwrap_or(0)
    }
}

impl ChainFactory for CountingFactory {
    fn create_chain(
        &self,
        descriptor: &SampleDescriptor,
        settings: &EffectSettings,
    ) -> Arc<AudioChain> {
        *self.created.lock().entry(descriptor.id.clone()).or_default() += 1;
        let chain = AudioChain::new(&descriptor.id, &descriptor.source_url, 1000, settings);
        chain.finish_loading(self.loader.load(&descriptor.source_url));
        chain
    }

    fn destroy_chain(&self, chain: &AudioChain) {
        *self.destroyed.lock().entry(chain.id().to_string()).or_default() += 1;
        chain.destroy();
    }
}

/// An in-memory catalog. Unknown collections fail like a missing file list entry.
#[derive(Default)]
pub struct StaticCatalog {
    collections: HashMap<String, Vec<SampleDescriptor>>,
}

impl StaticCatalog {
    pub fn new() -> StaticCatalog {
        StaticCatalog::default()
    }

    /// Adds a collection of archival samples named after their index.
    pub fn with_collection(mut self, collection: &str, count: usize) -> StaticCatalog {
        let descriptors = (1..=count)
            .map(|index| SampleDescriptor {
                id: format!("{}/{}-clip", collection, index),
                kind: SampleKind::Archival,
                title: format!("clip{}.mp3", index),
                label: format!("clip{}", index),
                source_url: format!("loc/{}/excerpts/clip{}.mp3", collection, index),
                attribution: None,
            })
            .collect();
        self.collections.insert(collection.to_string(), descriptors);
        self
    }
}

impl CatalogProvider for StaticCatalog {
    fn fetch_sample_set(&self, selector: &str) -> Result<Vec<SampleDescriptor>, CatalogError> {
        self.collections
            .get(selector)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownCollection(selector.to_string()))
    }

    fn collections(&self) -> Result<Vec<String>, CatalogError> {
        let mut collections: Vec<String> = self.collections.keys().cloned().collect();
        collections.sort();
        Ok(collections)
    }
}

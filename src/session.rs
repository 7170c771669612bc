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
//! The sampler session.
//!
//! A session owns the transport, the sampler registry, the state store, the
//! scheduler and the pad controller, and is the single entry point for whatever
//! drives the sampler.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::audio::bus::OutputBus;
use crate::audio::chain::ChainStatus;
use crate::audio::factory::{ChainFactory, LoadingChainFactory};
use crate::audio::loader::FileSampleLoader;
use crate::catalog::{dedupe, CatalogError, CatalogProvider, FileListCatalog, SampleDescriptor};
use crate::config::SessionConfig;
use crate::registry::{ReadySignal, SamplerRegistry, SetChange};
use crate::scheduler::{ScheduleState, Scheduler};
use crate::transport::{
    Clock, Quantization, SystemClock, Transport, TransportSnapshot, TransportState,
};

pub mod error;
pub mod pad;
pub mod performance;
pub mod store;

use error::SessionError;
use pad::{PadController, PadState};
use performance::{EffectSettings, EffectSettingsPatch, RecordedEvent, SamplePerformance};
use store::SessionStore;

/// Whether the archival set could be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogStatus {
    /// No collection has been requested yet.
    Unloaded,
    Available { collection: String, samples: usize },
    /// The catalog failed; no archival samples are available.
    Unavailable { collection: String, reason: String },
}

impl fmt::Display for CatalogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogStatus::Unloaded => write!(f, "no collection loaded"),
            CatalogStatus::Available {
                collection,
                samples,
            } => write!(f, "{} ({} samples)", collection, samples),
            CatalogStatus::Unavailable { collection, reason } => {
                write!(f, "{}: no samples available ({})", collection, reason)
            }
        }
    }
}

/// A view of one pad for display.
#[derive(Clone, Debug, PartialEq)]
pub struct PadInfo {
    pub descriptor: SampleDescriptor,
    pub status: ChainStatus,
    pub state: PadState,
    pub schedule: ScheduleState,
    pub selected: bool,
    pub events: usize,
}

impl fmt::Display for PadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} [{}] ({}, events: {}, {:?})",
            if self.selected { "*" } else { "" },
            self.descriptor.label,
            self.descriptor.id,
            self.status,
            self.events,
            self.schedule,
        )
    }
}

/// Tunables for a session.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    pub bpm: f64,
    pub quantization: Quantization,
    pub scheduler_tick: Duration,
    pub master_gain: f32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            bpm: 120.0,
            quantization: Quantization::Off,
            scheduler_tick: Duration::from_millis(2),
            master_gain: 1.0,
        }
    }
}

pub struct Session {
    kit: Vec<SampleDescriptor>,
    archival: RwLock<Vec<SampleDescriptor>>,
    catalog: Arc<dyn CatalogProvider>,
    catalog_status: RwLock<CatalogStatus>,
    bus: Arc<OutputBus>,
    registry: Arc<SamplerRegistry>,
    store: Arc<SessionStore>,
    transport: Arc<Transport>,
    scheduler: Scheduler,
    pads: PadController,
    /// Serializes collection switches.
    switching: tokio::sync::Mutex<()>,
}

impl Session {
    /// Creates a session and starts loading the kit.
    pub fn new(
        kit: Vec<SampleDescriptor>,
        catalog: Arc<dyn CatalogProvider>,
        factory: Arc<dyn ChainFactory>,
        bus: Arc<OutputBus>,
        clock: Arc<dyn Clock>,
        options: SessionOptions,
    ) -> Result<Session, SessionError> {
        let transport = Arc::new(Transport::new(clock, options.bpm)?);
        transport.set_quantization(options.quantization)?;
        bus.set_master_gain(options.master_gain);

        let registry = Arc::new(SamplerRegistry::new(factory));
        let store = Arc::new(SessionStore::new());
        let kit = dedupe(kit);
        let _ = registry.replace_set(&kit);
        store.sync_set(&kit);

        let scheduler = Scheduler::new(transport.clone(), registry.clone(), options.scheduler_tick);
        let pads = PadController::new(registry.clone(), store.clone(), transport.clone());

        info!(kit = kit.len(), bpm = options.bpm, "Session created");
        Ok(Session {
            kit,
            archival: RwLock::new(Vec::new()),
            catalog,
            catalog_status: RwLock::new(CatalogStatus::Unloaded),
            bus,
            registry,
            store,
            transport,
            scheduler,
            pads,
            switching: tokio::sync::Mutex::new(()),
        })
    }

    /// Creates a session that loads samples from disk and reads collections from
    /// the configured file list.
    pub fn from_config(config: &SessionConfig, sample_rate: u32) -> Result<Session, SessionError> {
        let bus = Arc::new(OutputBus::new(sample_rate));
        let loader = Arc::new(FileSampleLoader::new(config.samples_root(), sample_rate));
        let factory = Arc::new(LoadingChainFactory::new(loader, bus.clone()));
        let catalog = Arc::new(FileListCatalog::new(config.catalog(), config.archival_limit()));

        Session::new(
            config.kit(),
            catalog,
            factory,
            bus,
            Arc::new(SystemClock::new()),
            SessionOptions {
                bpm: config.bpm(),
                quantization: config.quantization(),
                scheduler_tick: config.scheduler_tick(),
                master_gain: config.master_gain(),
            },
        )
    }

    /// Replaces the archival set with the given collection. If the catalog fails the
    /// archival set becomes empty; the kit is never affected.
    pub async fn set_collection(&self, selector: &str) -> (SetChange, ReadySignal) {
        let _switching = self.switching.lock().await;
        info!(collection = selector, "Switching collection");

        let catalog = self.catalog.clone();
        let owned_selector = selector.to_string();
        let fetched = tokio::task::spawn_blocking(move || catalog.fetch_sample_set(&owned_selector))
            .await
            .unwrap_or_else(|e| Err(CatalogError::Interrupted(e.to_string())));

        let archival = match fetched {
            Ok(descriptors) => {
                // Kit ids win over archival duplicates.
                let descriptors = dedupe(
                    descriptors
                        .into_iter()
                        .filter(|d| !self.kit.iter().any(|k| k.id == d.id))
                        .collect(),
                );
                *self.catalog_status.write() = CatalogStatus::Available {
                    collection: selector.to_string(),
                    samples: descriptors.len(),
                };
                descriptors
            }
            Err(e) => {
                warn!(collection = selector, err = %e, "No samples available");
                *self.catalog_status.write() = CatalogStatus::Unavailable {
                    collection: selector.to_string(),
                    reason: e.to_string(),
                };
                Vec::new()
            }
        };

        let mut active = archival.clone();
        active.extend(self.kit.iter().cloned());
        let (change, ready) = self.registry.replace_set(&active);
        self.store.sync_set(&active);
        for id in change.removed.iter() {
            self.pads.evict(id);
        }
        *self.archival.write() = archival;

        if self.transport.state().is_running() {
            if let Err(e) = self.scheduler.reschedule(self.all_events()) {
                warn!(err = %e, "Unable to reschedule after collection switch");
            }
        }
        (change, ready)
    }

    /// Starts the transport and schedules every recorded event.
    pub fn play(&self) -> Result<usize, SessionError> {
        if !self.transport.play() {
            return Ok(0);
        }
        self.scheduler.schedule(self.all_events())
    }

    /// Cancels every pending trigger and stops the transport. Sounding voices ring out.
    pub fn stop(&self) {
        // Stop first so a concurrent reschedule sees the transport halted.
        self.transport.stop();
        self.scheduler.cancel_all();
    }

    pub fn toggle_record(&self) -> TransportState {
        self.transport.toggle_record()
    }

    /// Changes the quantize grid. Pending triggers are rebuilt while playing.
    pub fn set_quantization(&self, quantization: Quantization) -> Result<(), SessionError> {
        self.transport.set_quantization(quantization)?;
        info!(quantization = %quantization, "Quantization changed");
        if self.transport.state().is_running() {
            self.scheduler.reschedule(self.all_events())?;
        }
        Ok(())
    }

    /// Changes the tempo. Quantized triggers are rebuilt while playing.
    pub fn set_bpm(&self, bpm: f64) -> Result<(), SessionError> {
        self.transport.set_bpm(bpm)?;
        info!(bpm = bpm, "Tempo changed");
        if self.transport.state().is_running() && self.transport.quantization().is_active() {
            self.scheduler.reschedule(self.all_events())?;
        }
        Ok(())
    }

    pub fn set_master_gain(&self, gain: f32) {
        self.bus.set_master_gain(gain);
    }

    pub fn master_gain(&self) -> f32 {
        self.bus.master_gain()
    }

    /// The master bus every chain renders into.
    pub fn bus(&self) -> Arc<OutputBus> {
        self.bus.clone()
    }

    /// Merges the patch into the pad's settings and applies them to its chain.
    pub fn update_settings(
        &self,
        id: &str,
        patch: &EffectSettingsPatch,
    ) -> Result<EffectSettings, SessionError> {
        let settings = self
            .store
            .update_settings(id, patch)
            .ok_or_else(|| SessionError::UnknownPad(id.to_string()))?;
        if let Some(chain) = self.registry.get(id) {
            chain.apply_settings(&settings);
        }
        Ok(settings)
    }

    pub fn press(&self, id: &str) -> Result<bool, SessionError> {
        self.pads.press(id)
    }

    pub fn release(&self, id: &str) -> Result<bool, SessionError> {
        self.pads.release(id)
    }

    pub fn pointer_leave(&self, id: &str) -> Result<bool, SessionError> {
        self.pads.pointer_leave(id)
    }

    /// Returns a snapshot of the pad's performance.
    pub fn performance(&self, id: &str) -> SamplePerformance {
        self.store.get_performance(id)
    }

    /// Every active pad, archival samples first and then the kit.
    pub fn pads(&self) -> Vec<PadInfo> {
        let selected = self.pads.selected();
        self.descriptors()
            .into_iter()
            .map(|descriptor| {
                let id = descriptor.id.as_str();
                PadInfo {
                    status: self
                        .registry
                        .get(id)
                        .map(|chain| chain.status())
                        .unwrap_or(ChainStatus::Destroyed),
                    state: self.pads.state(id),
                    schedule: self.scheduler.state(id),
                    selected: selected.as_deref() == Some(id),
                    events: self.store.events(id).len(),
                    descriptor,
                }
            })
            .collect()
    }

    /// Active descriptors in display order.
    pub fn descriptors(&self) -> Vec<SampleDescriptor> {
        let mut descriptors = self.archival.read().clone();
        descriptors.extend(self.kit.iter().cloned());
        descriptors
    }

    pub fn selected(&self) -> Option<String> {
        self.pads.selected()
    }

    pub fn transport(&self) -> TransportSnapshot {
        self.transport.snapshot()
    }

    pub fn catalog_status(&self) -> CatalogStatus {
        self.catalog_status.read().clone()
    }

    /// Lists the collections the catalog offers.
    pub async fn collections(&self) -> Result<Vec<String>, CatalogError> {
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || catalog.collections())
            .await
            .unwrap_or_else(|e| Err(CatalogError::Interrupted(e.to_string())))
    }

    /// A signal over every active chain.
    pub fn ready(&self) -> ReadySignal {
        self.registry.ready()
    }

    /// Stops playback and tears down every chain.
    pub fn teardown(&self) {
        self.stop();
        self.registry.clear();
        info!("Session torn down");
    }

    fn all_events(&self) -> Vec<(String, Vec<RecordedEvent>)> {
        self.descriptors()
            .into_iter()
            .map(|descriptor| {
                let events = self.store.events(&descriptor.id);
                (descriptor.id, events)
            })
            .collect()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("registry", &self.registry)
            .field("catalog_status", &*self.catalog_status.read())
            .finish()
    }
}

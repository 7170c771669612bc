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
//! The sampler registry.
//!
//! Maps pad ids to their live chains. There is at most one chain per id, and the
//! registry is the only place chains are created or torn down.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::audio::chain::{AudioChain, ChainStatus};
use crate::audio::factory::ChainFactory;
use crate::catalog::{dedupe, SampleDescriptor};
use crate::session::performance::EffectSettings;

/// The outcome of replacing the active set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetChange {
    /// Ids whose chains were torn down.
    pub removed: Vec<String>,
    /// Ids whose chains were created.
    pub added: Vec<String>,
    /// Ids whose chains were left untouched.
    pub kept: Vec<String>,
}

/// How each chain in a set finished loading.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadyReport {
    pub ready: Vec<String>,
    /// Ids and failure reasons.
    pub failed: Vec<(String, String)>,
}

impl ReadyReport {
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves once every chain of a set has settled.
#[must_use]
pub struct ReadySignal {
    chains: Vec<Arc<AudioChain>>,
}

impl ReadySignal {
    /// Waits for every chain to finish loading.
    pub async fn wait(self) -> ReadyReport {
        let mut report = ReadyReport::default();
        for chain in self.chains {
            match chain.wait_settled().await {
                ChainStatus::Ready => report.ready.push(chain.id().to_string()),
                ChainStatus::Failed(reason) => {
                    report.failed.push((chain.id().to_string(), reason))
                }
                // Torn down before it settled; it no longer belongs to the set.
                ChainStatus::Destroyed | ChainStatus::Loading => {}
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

pub struct SamplerRegistry {
    factory: Arc<dyn ChainFactory>,
    chains: RwLock<HashMap<String, Arc<AudioChain>>>,
}

impl SamplerRegistry {
    pub fn new(factory: Arc<dyn ChainFactory>) -> SamplerRegistry {
        SamplerRegistry {
            factory,
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a chain for the descriptor unless one already exists for its id.
    pub fn register(&self, descriptor: &SampleDescriptor) -> Arc<AudioChain> {
        let mut chains = self.chains.write();
        if let Some(chain) = chains.get(&descriptor.id) {
            debug!(id = descriptor.id, "Chain already registered");
            return chain.clone();
        }
        let chain = self
            .factory
            .create_chain(descriptor, &EffectSettings::default());
        chains.insert(descriptor.id.clone(), chain.clone());
        chain
    }

    /// Destroys and forgets the chain for the id. Unknown ids are ignored.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.chains.write().remove(id);
        match removed {
            Some(chain) => {
                self.factory.destroy_chain(&chain);
                true
            }
            None => false,
        }
    }

    /// Makes the registry hold exactly the given set. Ids that are not in the new set
    /// are torn down first; new ids are created afterwards and existing ones are kept.
    pub fn replace_set(&self, descriptors: &[SampleDescriptor]) -> (SetChange, ReadySignal) {
        let descriptors = dedupe(descriptors.to_vec());
        let wanted: HashSet<&str> = descriptors.iter().map(|d| d.id.as_str()).collect();
        let mut change = SetChange::default();

        let mut chains = self.chains.write();
        let evicted: Vec<String> = chains
            .keys()
            .filter(|id| !wanted.contains(id.as_str()))
            .cloned()
            .collect();
        for id in evicted {
            if let Some(chain) = chains.remove(&id) {
                self.factory.destroy_chain(&chain);
            }
            change.removed.push(id);
        }

        let mut set = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors.iter() {
            match chains.get(&descriptor.id) {
                Some(chain) => {
                    change.kept.push(descriptor.id.clone());
                    set.push(chain.clone());
                }
                None => {
                    let chain = self
                        .factory
                        .create_chain(descriptor, &EffectSettings::default());
                    chains.insert(descriptor.id.clone(), chain.clone());
                    change.added.push(descriptor.id.clone());
                    set.push(chain);
                }
            }
        }

        info!(
            removed = change.removed.len(),
            added = change.added.len(),
            kept = change.kept.len(),
            "Replaced sample set"
        );
        (change, ReadySignal { chains: set })
    }

    pub fn get(&self, id: &str) -> Option<Arc<AudioChain>> {
        self.chains.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.chains.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.chains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.read().is_empty()
    }

    /// A signal over every registered chain.
    pub fn ready(&self) -> ReadySignal {
        ReadySignal {
            chains: self.chains.read().values().cloned().collect(),
        }
    }

    /// Tears down every chain.
    pub fn clear(&self) {
        let drained: Vec<Arc<AudioChain>> = self.chains.write().drain().map(|(_, c)| c).collect();
        for chain in drained.iter() {
            self.factory.destroy_chain(chain);
        }
        info!(chains = drained.len(), "Registry cleared");
    }
}

impl std::fmt::Debug for SamplerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerRegistry")
            .field("chains", &self.len())
            .finish()
    }
}

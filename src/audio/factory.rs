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
//! Chain construction.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::SampleDescriptor;
use crate::session::performance::EffectSettings;

use super::bus::OutputBus;
use super::chain::AudioChain;
use super::loader::SampleLoader;

/// Builds and tears down per-pad chains.
pub trait ChainFactory: Send + Sync + 'static {
    /// Creates a chain for the descriptor. Loading may finish after this returns.
    fn create_chain(
        &self,
        descriptor: &SampleDescriptor,
        settings: &EffectSettings,
    ) -> Arc<AudioChain>;

    /// Releases every node of the chain.
    fn destroy_chain(&self, chain: &AudioChain) {
        chain.destroy();
    }
}

/// Connects new chains to the bus and loads their samples on the rayon pool.
pub struct LoadingChainFactory {
    loader: Arc<dyn SampleLoader>,
    bus: Arc<OutputBus>,
}

impl LoadingChainFactory {
    pub fn new(loader: Arc<dyn SampleLoader>, bus: Arc<OutputBus>) -> LoadingChainFactory {
        LoadingChainFactory { loader, bus }
    }
}

impl ChainFactory for LoadingChainFactory {
    fn create_chain(
        &self,
        descriptor: &SampleDescriptor,
        settings: &EffectSettings,
    ) -> Arc<AudioChain> {
        let chain = AudioChain::new(
            &descriptor.id,
            &descriptor.source_url,
            self.bus.sample_rate(),
            settings,
        );
        chain.connect(&self.bus);

        debug!(id = descriptor.id, source_url = descriptor.source_url, "Loading chain");
        let loader = self.loader.clone();
        let loading = chain.clone();
        rayon::spawn(move || {
            let result = loader.load(loading.source_url());
            loading.finish_loading(result);
        });
        chain
    }
}

impl std::fmt::Debug for LoadingChainFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingChainFactory")
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::audio::bus::OutputBus;
    use crate::audio::chain::ChainStatus;
    use crate::session::performance::EffectSettings;
    use crate::testutil::{descriptor, eventually, StaticLoader};

    use super::{ChainFactory, LoadingChainFactory};

    #[test]
    fn test_chains_load_in_background() {
        let bus = Arc::new(OutputBus::new(1000));
        let loader = Arc::new(StaticLoader::new(1000).with_failure("broken.wav"));
        let factory = LoadingChainFactory::new(loader, bus.clone());

        let good = factory.create_chain(&descriptor("kick", "kick.wav"), &EffectSettings::default());
        let bad = factory.create_chain(&descriptor("snare", "broken.wav"), &EffectSettings::default());
        assert_eq!(2, bus.chain_count());

        eventually(|| good.status() == ChainStatus::Ready, "Chain never became ready");
        eventually(
            || matches!(bad.status(), ChainStatus::Failed(_)),
            "Chain never failed",
        );

        factory.destroy_chain(&good);
        factory.destroy_chain(&good);
        assert_eq!(1, bus.chain_count());
    }
}

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
//! Press and release handling for pads.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::registry::SamplerRegistry;
use crate::transport::Transport;

use super::error::SessionError;
use super::store::SessionStore;

/// Interaction state of a pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadState {
    Idle,
    Pressed,
}

pub struct PadController {
    registry: Arc<SamplerRegistry>,
    store: Arc<SessionStore>,
    transport: Arc<Transport>,
    /// Pads that are currently held down.
    pressed: RwLock<HashMap<String, PadState>>,
    selected: RwLock<Option<String>>,
}

impl PadController {
    pub fn new(
        registry: Arc<SamplerRegistry>,
        store: Arc<SessionStore>,
        transport: Arc<Transport>,
    ) -> PadController {
        PadController {
            registry,
            store,
            transport,
            pressed: RwLock::new(HashMap::new()),
            selected: RwLock::new(None),
        }
    }

    /// Sounds the pad, selects it and captures the press while recording.
    /// Returns false if the pad was already held.
    pub fn press(&self, id: &str) -> Result<bool, SessionError> {
        let chain = self
            .registry
            .get(id)
            .ok_or_else(|| SessionError::UnknownPad(id.to_string()))?;

        {
            let mut pressed = self.pressed.write();
            if pressed.get(id) == Some(&PadState::Pressed) {
                debug!(id = id, "Ignoring repeated press");
                return Ok(false);
            }
            pressed.insert(id.to_string(), PadState::Pressed);
        }

        chain.trigger_attack();
        *self.selected.write() = Some(id.to_string());

        let transport = self.transport.snapshot();
        if transport.state.is_recording() {
            let position = transport.position_seconds;
            self.store.append_event_start(id, position);
            debug!(id = id, start_time = position, "Captured press");
        }
        Ok(true)
    }

    /// Releases the pad and closes its open event while recording.
    /// Returns false if the pad was not held.
    pub fn release(&self, id: &str) -> Result<bool, SessionError> {
        if self.pressed.write().remove(id).is_none() {
            return Ok(false);
        }

        if let Some(chain) = self.registry.get(id) {
            chain.trigger_release();
        }

        let transport = self.transport.snapshot();
        if transport.state.is_recording() {
            let position = transport.position_seconds;
            match self.store.close_latest_event(id, position) {
                Ok(event) => debug!(id = id, duration = event.duration, "Captured release"),
                Err(e) => debug!(err = %e, "Release not recorded"),
            }
        }
        Ok(true)
    }

    /// The pointer left the pad while it was held. Treated exactly like a release.
    pub fn pointer_leave(&self, id: &str) -> Result<bool, SessionError> {
        self.release(id)
    }

    pub fn state(&self, id: &str) -> PadState {
        self.pressed
            .read()
            .get(id)
            .copied()
            .unwrap_or(PadState::Idle)
    }

    pub fn selected(&self) -> Option<String> {
        self.selected.read().clone()
    }

    /// Forgets a pad that left the active set.
    pub fn evict(&self, id: &str) {
        self.pressed.write().remove(id);
        let mut selected = self.selected.write();
        if selected.as_deref() == Some(id) {
            *selected = None;
        }
    }
}

impl std::fmt::Debug for PadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadController")
            .field("pressed", &self.pressed.read().len())
            .field("selected", &*self.selected.read())
            .finish()
    }
}

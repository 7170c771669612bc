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
//! The session state store.
//!
//! Owns every sample's performance. Readers always receive snapshots; nothing
//! outside the store holds a reference into it.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use crate::catalog::SampleDescriptor;

use super::error::SessionError;
use super::performance::{EffectSettings, EffectSettingsPatch, RecordedEvent, SamplePerformance};

#[derive(Default)]
pub struct SessionStore {
    performances: RwLock<HashMap<String, SamplePerformance>>,
}

impl SessionStore {
    pub fn new() -> SessionStore {
        SessionStore::default()
    }

    /// Returns a snapshot of the performance, or an empty one for unknown ids.
    pub fn get_performance(&self, id: &str) -> SamplePerformance {
        self.performances
            .read()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns a snapshot of the recorded events.
    pub fn events(&self, id: &str) -> Vec<RecordedEvent> {
        self.performances
            .read()
            .get(id)
            .map(|performance| performance.events.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.performances.read().contains_key(id)
    }

    /// Merges the patch into the pad's settings and returns the result.
    /// Unknown ids are left alone.
    pub fn update_settings(&self, id: &str, patch: &EffectSettingsPatch) -> Option<EffectSettings> {
        let mut performances = self.performances.write();
        let performance = performances.get_mut(id)?;
        performance.settings.merge(patch);
        Some(performance.settings)
    }

    /// Captures a press at the given transport position.
    pub fn append_event_start(&self, id: &str, start_time: f64) {
        match self.performances.write().get_mut(id) {
            Some(performance) => performance.events.push(RecordedEvent {
                start_time,
                duration: 0.0,
            }),
            None => debug!(id = id, "Ignoring event for unknown pad"),
        }
    }

    /// Closes the most recent event if it is still open and started before `end_time`.
    pub fn close_latest_event(&self, id: &str, end_time: f64) -> Result<RecordedEvent, SessionError> {
        let mut performances = self.performances.write();
        let latest = performances
            .get_mut(id)
            .and_then(|performance| performance.events.last_mut())
            .filter(|event| event.is_open() && end_time > event.start_time);

        match latest {
            Some(event) => {
                event.duration = end_time - event.start_time;
                Ok(*event)
            }
            None => Err(SessionError::SchedulingConflict {
                id: id.to_string(),
                end: end_time,
            }),
        }
    }

    /// Aligns the store with the active sample set. Performances for ids that are
    /// no longer present are dropped, kept ids retain their data, and new ids start empty.
    pub fn sync_set(&self, descriptors: &[SampleDescriptor]) {
        let mut performances = self.performances.write();
        let active: HashSet<&str> = descriptors.iter().map(|d| d.id.as_str()).collect();
        performances.retain(|id, _| active.contains(id.as_str()));

        for descriptor in descriptors {
            performances
                .entry(descriptor.id.clone())
                .and_modify(|performance| performance.descriptor = Some(descriptor.clone()))
                .or_insert_with(|| SamplePerformance::new(descriptor.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.performances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.performances.read().is_empty()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("performances", &self.len())
            .finish()
    }
}

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
//! Sample catalogs.
//!
//! A catalog resolves a collection selector (a genre such as "jazz") into the
//! descriptors of the archival samples that belong to it. Kit samples are fixed
//! and come from configuration instead.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod error;
pub mod filelist;

pub use error::CatalogError;
pub use filelist::FileListCatalog;

/// Where a sample came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// A fixed drum kit sample.
    Kit,
    /// A sample resolved from the catalog by collection.
    Archival,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKind::Kit => write!(f, "kit"),
            SampleKind::Archival => write!(f, "archival"),
        }
    }
}

/// Identity and source of a single sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDescriptor {
    /// Unique across every sample active at the same time. Never changes.
    pub id: String,
    pub kind: SampleKind,
    /// The full title, usually the file name.
    pub title: String,
    /// The short name shown on the pad.
    pub label: String,
    /// Location of the audio, relative to the samples root unless absolute.
    pub source_url: String,
    /// Credit for archival material, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

impl fmt::Display for SampleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}): {}", self.label, self.id, self.kind, self.source_url)
    }
}

/// Resolves collection selectors into sample sets.
pub trait CatalogProvider: Send + Sync + 'static {
    /// Returns the descriptors for the given collection.
    fn fetch_sample_set(&self, selector: &str) -> Result<Vec<SampleDescriptor>, CatalogError>;

    /// Lists the collections this catalog knows about.
    fn collections(&self) -> Result<Vec<String>, CatalogError>;
}

/// Removes descriptors whose id was already seen. The first occurrence wins.
pub fn dedupe(descriptors: Vec<SampleDescriptor>) -> Vec<SampleDescriptor> {
    let mut seen: HashSet<String> = HashSet::with_capacity(descriptors.len());
    descriptors
        .into_iter()
        .filter(|descriptor| {
            if seen.insert(descriptor.id.clone()) {
                true
            } else {
                let err = CatalogError::DuplicateId(descriptor.id.clone());
                warn!(err = %err, source_url = descriptor.source_url, "Rejecting sample");
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::{dedupe, SampleDescriptor, SampleKind};

    fn descriptor(id: &str, source_url: &str) -> SampleDescriptor {
        SampleDescriptor {
            id: id.to_string(),
            kind: SampleKind::Archival,
            title: source_url.to_string(),
            label: source_url.to_string(),
            source_url: source_url.to_string(),
            attribution: None,
        }
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let deduped = dedupe(vec![
            descriptor("a", "first.wav"),
            descriptor("b", "second.wav"),
            descriptor("a", "third.wav"),
        ]);
        assert_eq!(2, deduped.len());
        assert_eq!("first.wav", deduped[0].source_url);
        assert_eq!("b", deduped[1].id);
    }
}

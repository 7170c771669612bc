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
//! A catalog backed by a JSON file list.
//!
//! The file maps each collection to the file names of its excerpts:
//!
//! ```json
//! { "jazz": ["take-five.mp3", "so-what.mp3"], "folk-songs": ["..."] }
//! ```
//!
//! Excerpts live under `loc/<collection>/excerpts/` relative to the samples root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{dedupe, CatalogError, CatalogProvider, SampleDescriptor, SampleKind};

/// The number of excerpts taken from a collection when no limit is configured.
pub const DEFAULT_LIMIT: usize = 12;

/// Reads collections from a JSON file list on every fetch.
pub struct FileListCatalog {
    path: PathBuf,
    limit: usize,
}

impl FileListCatalog {
    pub fn new(path: &Path, limit: usize) -> FileListCatalog {
        FileListCatalog {
            path: path.to_path_buf(),
            limit,
        }
    }

    fn read(&self) -> Result<BTreeMap<String, Vec<String>>, CatalogError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| CatalogError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl CatalogProvider for FileListCatalog {
    fn fetch_sample_set(&self, selector: &str) -> Result<Vec<SampleDescriptor>, CatalogError> {
        let mut collections = self.read()?;
        let files = collections
            .remove(selector)
            .ok_or_else(|| CatalogError::UnknownCollection(selector.to_string()))?;

        debug!(
            collection = selector,
            available = files.len(),
            limit = self.limit,
            "Resolving collection"
        );

        let descriptors = files
            .into_iter()
            .take(self.limit)
            .enumerate()
            .map(|(index, file)| describe(selector, index, file))
            .collect();
        let descriptors = dedupe(descriptors);

        info!(
            collection = selector,
            samples = descriptors.len(),
            "Resolved collection"
        );
        Ok(descriptors)
    }

    fn collections(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.read()?.into_keys().collect())
    }
}

impl std::fmt::Debug for FileListCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileListCatalog")
            .field("path", &self.path)
            .field("limit", &self.limit)
            .finish()
    }
}

fn describe(collection: &str, index: usize, file: String) -> SampleDescriptor {
    let label = file.split('.').next().unwrap_or_default().to_string();
    SampleDescriptor {
        id: format!("{}/{}-{}", collection, index + 1, label),
        kind: SampleKind::Archival,
        source_url: format!("loc/{}/excerpts/{}", collection, file),
        title: file,
        label,
        attribution: None,
    }
}

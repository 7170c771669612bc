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
use std::path::PathBuf;

/// Errors raised while resolving a sample set from a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unable to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("collection {0} not found in catalog")]
    UnknownCollection(String),

    #[error("duplicate sample id {0}")]
    DuplicateId(String),

    #[error("catalog lookup was interrupted: {0}")]
    Interrupted(String),
}

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

/// Errors raised by the session engine.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A release arrived with no open press to close. Logged, never surfaced to users.
    #[error("no open event to close for pad {id} at {end}s")]
    SchedulingConflict { id: String, end: f64 },

    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),

    #[error("quantize subdivision must be positive, got {0}")]
    InvalidSubdivision(u32),

    #[error("no pad with id {0}")]
    UnknownPad(String),

    #[error("the scheduler is no longer running")]
    SchedulerGone,
}

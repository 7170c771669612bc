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
//! The shared musical clock.
//!
//! The transport tracks whether the session is running and whether recording is
//! armed, the tempo, and the active quantization grid. Position is measured from
//! the moment playback started and resets to zero on stop.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::info;

use crate::session::error::SessionError;

/// A monotonic time source.
pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// The wall clock, backed by [`Instant`].
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Running and record-arm state of the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    /// Not running, record not armed.
    Stopped,
    /// Not running, record armed. Presses are not captured until playback starts.
    Armed,
    /// Running, record not armed.
    Playing,
    /// Running with record armed. Presses are captured.
    Recording,
}

impl TransportState {
    pub fn play(self) -> TransportState {
        match self {
            TransportState::Stopped => TransportState::Playing,
            TransportState::Armed => TransportState::Recording,
            running => running,
        }
    }

    pub fn stop(self) -> TransportState {
        match self {
            TransportState::Playing => TransportState::Stopped,
            TransportState::Recording => TransportState::Armed,
            stopped => stopped,
        }
    }

    pub fn toggle_record(self) -> TransportState {
        match self {
            TransportState::Stopped => TransportState::Armed,
            TransportState::Armed => TransportState::Stopped,
            TransportState::Playing => TransportState::Recording,
            TransportState::Recording => TransportState::Playing,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, TransportState::Playing | TransportState::Recording)
    }

    pub fn is_armed(self) -> bool {
        matches!(self, TransportState::Armed | TransportState::Recording)
    }

    /// Presses are only captured while running with record armed.
    pub fn is_recording(self) -> bool {
        self == TransportState::Recording
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Stopped => "stopped",
            TransportState::Armed => "armed",
            TransportState::Playing => "playing",
            TransportState::Recording => "recording",
        };
        write!(f, "{}", name)
    }
}

/// How recorded start times are mapped onto trigger times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantization {
    /// Triggers fire at the recorded time.
    Off,
    /// Triggers snap to the nearest 1/subdivision note.
    Grid { subdivision: u32 },
}

impl Quantization {
    /// Maps a recorded time onto its trigger time at the given tempo.
    pub fn apply(&self, time: f64, bpm: f64) -> f64 {
        match self {
            Quantization::Off => time,
            Quantization::Grid { subdivision } => quantize(time, bpm, *subdivision),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Quantization::Grid { .. })
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantization::Off => write!(f, "off"),
            Quantization::Grid { subdivision } => write!(f, "1/{}", subdivision),
        }
    }
}

/// Snaps a time in seconds to the nearest 1/subdivision note at the given tempo.
/// A quarter note (subdivision 4) is one beat.
pub fn quantize(time: f64, bpm: f64, subdivision: u32) -> f64 {
    let grid = (60.0 / bpm) * (4.0 / subdivision as f64);
    grid * (time / grid).round()
}

/// A point-in-time view of the transport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportSnapshot {
    pub state: TransportState,
    pub bpm: f64,
    pub quantization: Quantization,
    pub position_seconds: f64,
}

struct Inner {
    state: TransportState,
    bpm: f64,
    quantization: Quantization,
    /// Clock reading when playback started. Only set while running.
    started_at: Option<Duration>,
}

/// The session's single shared clock.
pub struct Transport {
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner>,
}

impl Transport {
    /// Creates a stopped transport at the given tempo.
    pub fn new(clock: Arc<dyn Clock>, bpm: f64) -> Result<Transport, SessionError> {
        validate_bpm(bpm)?;
        Ok(Transport {
            clock,
            inner: RwLock::new(Inner {
                state: TransportState::Stopped,
                bpm,
                quantization: Quantization::Off,
                started_at: None,
            }),
        })
    }

    /// Starts the transport. Returns false if it was already running.
    pub fn play(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.state.is_running() {
            return false;
        }
        inner.state = inner.state.play();
        inner.started_at = Some(self.clock.now());
        info!(state = %inner.state, bpm = inner.bpm, "Transport started");
        true
    }

    /// Stops the transport and rewinds to zero. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let mut inner = self.inner.write();
        if !inner.state.is_running() {
            return false;
        }
        inner.state = inner.state.stop();
        inner.started_at = None;
        info!(state = %inner.state, "Transport stopped");
        true
    }

    /// Toggles the record arm and returns the new state.
    pub fn toggle_record(&self) -> TransportState {
        let mut inner = self.inner.write();
        inner.state = inner.state.toggle_record();
        info!(state = %inner.state, "Record toggled");
        inner.state
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<(), SessionError> {
        validate_bpm(bpm)?;
        self.inner.write().bpm = bpm;
        Ok(())
    }

    pub fn set_quantization(&self, quantization: Quantization) -> Result<(), SessionError> {
        if let Quantization::Grid { subdivision: 0 } = quantization {
            return Err(SessionError::InvalidSubdivision(0));
        }
        self.inner.write().quantization = quantization;
        Ok(())
    }

    pub fn state(&self) -> TransportState {
        self.inner.read().state
    }

    pub fn bpm(&self) -> f64 {
        self.inner.read().bpm
    }

    pub fn quantization(&self) -> Quantization {
        self.inner.read().quantization
    }

    /// Seconds since playback started, or zero while stopped.
    pub fn position(&self) -> f64 {
        let inner = self.inner.read();
        self.position_of(&inner)
    }

    /// Clock reading at which the transport reaches the given position, if running.
    pub fn instant_of(&self, position: f64) -> Option<Duration> {
        self.inner
            .read()
            .started_at
            .map(|started_at| started_at + Duration::from_secs_f64(position.max(0.0)))
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        let inner = self.inner.read();
        TransportSnapshot {
            state: inner.state,
            bpm: inner.bpm,
            quantization: inner.quantization,
            position_seconds: self.position_of(&inner),
        }
    }

    fn position_of(&self, inner: &Inner) -> f64 {
        match inner.started_at {
            Some(started_at) => self
                .clock
                .now()
                .saturating_sub(started_at)
                .as_secs_f64(),
            None => 0.0,
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Transport")
            .field("state", &inner.state)
            .field("bpm", &inner.bpm)
            .field("quantization", &inner.quantization)
            .finish()
    }
}

fn validate_bpm(bpm: f64) -> Result<(), SessionError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(SessionError::InvalidTempo(bpm))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::session::error::SessionError;
    use crate::testutil::ManualClock;

    use super::{quantize, Quantization, Transport, TransportState};

    #[test]
    fn test_quantize_snaps_to_grid() {
        // At 120 bpm a quarter note is half a second.
        assert_eq!(0.5, quantize(0.47, 120.0, 4));
        assert_eq!(0.0, quantize(0.2, 120.0, 4));
        assert_eq!(0.25, quantize(0.2, 120.0, 8));
        assert_eq!(2.0, quantize(1.9, 120.0, 1));
    }

    #[test]
    fn test_quantize_is_idempotent() {
        for time in [0.0, 0.13, 0.47, 1.26, 3.99] {
            let once = quantize(time, 97.0, 16);
            assert_eq!(once, quantize(once, 97.0, 16));
        }
    }

    #[test]
    fn test_quantization_off_passes_through() {
        assert_eq!(0.47, Quantization::Off.apply(0.47, 120.0));
        assert_eq!(
            0.5,
            Quantization::Grid { subdivision: 4 }.apply(0.47, 120.0)
        );
    }

    #[test]
    fn test_state_transitions() {
        let state = TransportState::Stopped;
        assert_eq!(TransportState::Armed, state.toggle_record());
        assert_eq!(TransportState::Recording, state.toggle_record().play());
        assert_eq!(TransportState::Armed, state.toggle_record().play().stop());
        assert_eq!(
            TransportState::Playing,
            state.play().toggle_record().toggle_record()
        );
        assert!(!TransportState::Armed.is_recording());
        assert!(TransportState::Recording.is_recording());
    }

    #[test]
    fn test_position_follows_clock() -> Result<(), SessionError> {
        let clock = Arc::new(ManualClock::new());
        let transport = Transport::new(clock.clone(), 120.0)?;

        clock.advance(Duration::from_secs(5));
        assert_eq!(0.0, transport.position());

        assert!(transport.play());
        assert!(!transport.play());
        clock.advance(Duration::from_millis(1500));
        assert_eq!(1.5, transport.position());

        assert!(transport.stop());
        assert_eq!(0.0, transport.position());
        assert!(!transport.stop());
        Ok(())
    }

    #[test]
    fn test_invalid_tempo_rejected() {
        let clock = Arc::new(ManualClock::new());
        assert!(matches!(
            Transport::new(clock.clone(), 0.0),
            Err(SessionError::InvalidTempo(_))
        ));

        let transport = Transport::new(clock, 90.0).expect("transport");
        assert!(transport.set_bpm(-1.0).is_err());
        assert!(transport.set_bpm(f64::NAN).is_err());
        assert_eq!(90.0, transport.bpm());
        assert!(transport
            .set_quantization(Quantization::Grid { subdivision: 0 })
            .is_err());
    }
}

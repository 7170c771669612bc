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
use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Level};

use crate::session::error::SessionError;
use crate::session::Session;
use crate::transport::Quantization;

pub mod keyboard;

/// Controller events that will trigger behavior in the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Presses a pad, by display number or id.
    Press(String),

    /// Releases a pad.
    Release(String),

    /// The pointer left a held pad.
    Leave(String),

    /// Presses a pad and releases it after the given number of seconds.
    Hit(String, f64),

    /// Starts the transport and plays back recorded events.
    Play,

    /// Stops the transport and cancels pending playback.
    Stop,

    /// Toggles record arm.
    Record,

    /// Sets the quantize grid, or turns quantization off.
    Quantize(Option<u32>),

    /// Changes the tempo.
    Bpm(f64),

    /// Switches the archival collection.
    Collection(String),

    /// Prints the active pads.
    Pads,

    /// Prints the transport and catalog status.
    Status,

    /// Stops the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives a session from controller events.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(session: Arc<Session>, driver: Arc<dyn Driver>) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(session, driver).await }),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers session operations by watching the driver and getting events from it.
    async fn trigger_events(session: Arc<Session>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(pads = session.pads().len(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");
            if event == Event::Quit {
                break;
            }
            if let Err(e) = Controller::handle(&session, event).await {
                error!(err = %e, "Error talking to session");
            }
        }

        info!("Controller closing.");
        drop(events_rx);
        join_handle.abort();
        if let Err(e) = join_handle.await {
            if !e.is_cancelled() {
                error!("Error waiting for event monitor to stop: {}", e);
            }
        }
    }

    async fn handle(session: &Arc<Session>, event: Event) -> Result<(), SessionError> {
        match event {
            Event::Press(pad) => {
                session.press(&resolve_pad(session, &pad)?)?;
            }
            Event::Release(pad) => {
                session.release(&resolve_pad(session, &pad)?)?;
            }
            Event::Leave(pad) => {
                session.pointer_leave(&resolve_pad(session, &pad)?)?;
            }
            Event::Hit(pad, seconds) => {
                let hold = match Duration::try_from_secs_f64(seconds) {
                    Ok(hold) => hold,
                    Err(e) => {
                        warn!(seconds = seconds, err = %e, "Invalid hit duration");
                        return Ok(());
                    }
                };
                let id = resolve_pad(session, &pad)?;
                session.press(&id)?;
                let session = session.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(hold).await;
                    if let Err(e) = session.release(&id) {
                        warn!(err = %e, "Unable to release pad");
                    }
                });
            }
            Event::Play => {
                let scheduled = session.play()?;
                info!(triggers = scheduled, "Playing");
            }
            Event::Stop => session.stop(),
            Event::Record => {
                let state = session.toggle_record();
                println!("Transport: {}", state);
            }
            Event::Quantize(subdivision) => {
                let quantization = match subdivision {
                    Some(subdivision) => Quantization::Grid { subdivision },
                    None => Quantization::Off,
                };
                session.set_quantization(quantization)?;
            }
            Event::Bpm(bpm) => session.set_bpm(bpm)?,
            Event::Collection(collection) => {
                let (change, ready) = session.set_collection(&collection).await;
                println!(
                    "Collection {}: {} added, {} removed",
                    collection,
                    change.added.len(),
                    change.removed.len()
                );
                let report = ready.wait().await;
                for (id, reason) in report.failed.iter() {
                    println!("- {} failed to load: {}", id, reason);
                }
            }
            Event::Pads => {
                println!("Pads:");
                for (index, pad) in session.pads().iter().enumerate() {
                    println!("{:>3}. {}", index + 1, pad);
                }
            }
            Event::Status => {
                let transport = session.transport();
                println!(
                    "Transport: {} at {:.2}s, {} bpm, quantize {}",
                    transport.state,
                    transport.position_seconds,
                    transport.bpm,
                    transport.quantization
                );
                println!("Catalog: {}", session.catalog_status());
            }
            Event::Quit => {}
        }
        Ok(())
    }
}

/// Resolves a pad reference. Numbers refer to the display order, starting at 1.
fn resolve_pad(session: &Session, pad: &str) -> Result<String, SessionError> {
    match pad.parse::<usize>() {
        Ok(number) => number
            .checked_sub(1)
            .and_then(|index| session.descriptors().into_iter().nth(index))
            .map(|descriptor| descriptor.id)
            .ok_or_else(|| SessionError::UnknownPad(pad.to_string())),
        Err(_) => Ok(pad.to_string()),
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::audio::bus::OutputBus;
    use crate::config::kit;
    use crate::session::pad::PadState;
    use crate::session::{Session, SessionOptions};
    use crate::testutil::{eventually, CountingFactory, ManualClock, StaticCatalog};
    use crate::transport::{Quantization, TransportState};

    use super::{Driver, Event};

    /// Sends a fixed script of events and then closes.
    struct ScriptedDriver {
        events: Vec<Event>,
    }

    impl Driver for ScriptedDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = self.events.clone();
            tokio::task::spawn_blocking(move || {
                for event in events {
                    if events_tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let session = Arc::new(Session::new(
            kit::descriptors(&kit::default_kit()),
            Arc::new(StaticCatalog::new().with_collection("jazz", 2)),
            Arc::new(CountingFactory::new()),
            Arc::new(OutputBus::new(1000)),
            Arc::new(ManualClock::new()),
            SessionOptions {
                scheduler_tick: Duration::from_millis(1),
                ..Default::default()
            },
        )?);

        let driver = Arc::new(ScriptedDriver {
            events: vec![
                Event::Collection("jazz".to_string()),
                Event::Press("1".to_string()),
                Event::Release("1".to_string()),
                Event::Press("kit/1-Kick".to_string()),
                Event::Quantize(Some(8)),
                Event::Bpm(90.0),
                Event::Record,
                Event::Play,
                Event::Press("99".to_string()),
                Event::Pads,
                Event::Status,
            ],
        });
        let mut controller = super::Controller::new(session.clone(), driver)?;
        controller.join().await?;

        eventually(
            || session.transport().state == TransportState::Recording,
            "Session never started recording",
        );
        assert_eq!(6, session.pads().len());
        assert_eq!(Some("kit/1-Kick".to_string()), session.selected());
        assert_eq!(
            Quantization::Grid { subdivision: 8 },
            session.transport().quantization
        );
        assert_eq!(90.0, session.transport().bpm);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hit_with_unrepresentable_duration() -> Result<(), Box<dyn Error>> {
        let session = Arc::new(Session::new(
            kit::descriptors(&kit::default_kit()),
            Arc::new(StaticCatalog::new()),
            Arc::new(CountingFactory::new()),
            Arc::new(OutputBus::new(1000)),
            Arc::new(ManualClock::new()),
            SessionOptions::default(),
        )?);

        super::Controller::handle(&session, Event::Hit("1".to_string(), 1e300)).await?;
        assert_eq!(PadState::Idle, session.pads()[0].state);
        assert_eq!(None, session.selected());

        super::Controller::handle(&session, Event::Hit("1".to_string(), 0.01)).await?;
        assert_eq!(Some("kit/1-Kick".to_string()), session.selected());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quit_stops_controller() -> Result<(), Box<dyn Error>> {
        let session = Arc::new(Session::new(
            kit::descriptors(&kit::default_kit()),
            Arc::new(StaticCatalog::new()),
            Arc::new(CountingFactory::new()),
            Arc::new(OutputBus::new(1000)),
            Arc::new(ManualClock::new()),
            SessionOptions::default(),
        )?);
        let driver = Arc::new(ScriptedDriver {
            events: vec![Event::Quit, Event::Play],
        });
        let mut controller = super::Controller::new(session.clone(), driver)?;
        controller.join().await?;
        assert_eq!(TransportState::Stopped, session.transport().state);
        Ok(())
    }
}

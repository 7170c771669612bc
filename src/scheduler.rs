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
//! The transport-synchronized event scheduler.
//!
//! Recorded events are turned into triggers on the transport's timeline and fired
//! from a dedicated timing thread. Every batch of triggers belongs to an epoch;
//! cancelling bumps the epoch under the same lock the timing thread holds while
//! firing, so once a cancel returns no trigger from an earlier epoch can sound.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use crate::registry::SamplerRegistry;
use crate::session::error::SessionError;
use crate::session::performance::RecordedEvent;
use crate::transport::{Quantization, Transport};

/// Schedule state of a single pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
    /// Nothing pending.
    Idle,
    /// Triggers are pending and none has fired yet.
    Scheduled,
    /// At least one trigger fired and more are pending.
    Playing,
}

/// A single planned trigger on the transport timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannedTrigger {
    /// Transport position in seconds.
    pub time: f64,
    /// Seconds to hold before releasing.
    pub duration: f64,
}

/// Maps recorded events onto triggers. Events that were never released have no
/// duration to play and are skipped, as are triggers earlier than `from`.
pub fn plan_triggers(
    events: &[RecordedEvent],
    quantization: Quantization,
    bpm: f64,
    from: f64,
) -> Vec<PlannedTrigger> {
    events
        .iter()
        .filter(|event| event.duration > 0.0)
        .map(|event| PlannedTrigger {
            time: quantization.apply(event.start_time, bpm),
            duration: event.duration,
        })
        .filter(|trigger| trigger.time >= from)
        .collect()
}

struct Trigger {
    /// Clock reading at which to fire.
    at: Duration,
    seq: u64,
    epoch: u64,
    pad: String,
    duration: f64,
}

impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Trigger {}

impl PartialOrd for Trigger {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Trigger {
    // Reversed so the heap pops the earliest trigger first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Where on the timeline planning starts.
#[derive(Clone, Copy)]
enum PlanFrom {
    Start,
    Position,
}

enum Command {
    Schedule(Vec<Trigger>),
    Shutdown,
}

struct PadSchedule {
    state: ScheduleState,
    pending: usize,
}

#[derive(Default)]
struct Gate {
    epoch: u64,
    seq: u64,
    pads: HashMap<String, PadSchedule>,
}

pub struct Scheduler {
    transport: Arc<Transport>,
    gate: Arc<Mutex<Gate>>,
    commands: Sender<Command>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Starts the timing thread. It wakes at least once per tick while triggers are pending.
    pub fn new(
        transport: Arc<Transport>,
        registry: Arc<SamplerRegistry>,
        tick: Duration,
    ) -> Scheduler {
        let gate = Arc::new(Mutex::new(Gate::default()));
        let (commands, commands_rx) = unbounded::<Command>();

        let thread_gate = gate.clone();
        let thread_transport = transport.clone();
        let handle = thread::spawn(move || {
            let span = span!(Level::INFO, "scheduler");
            let _enter = span.enter();
            info!(tick_ms = tick.as_millis(), "Scheduler started");

            let clock = thread_transport.clock();
            let mut heap: BinaryHeap<Trigger> = BinaryHeap::new();
            loop {
                let received = match heap.peek() {
                    None => commands_rx
                        .recv()
                        .map_err(|_| RecvTimeoutError::Disconnected),
                    Some(next) => {
                        let wait = next.at.saturating_sub(clock.now()).min(tick);
                        commands_rx.recv_timeout(wait)
                    }
                };

                match received {
                    Ok(Command::Schedule(triggers)) => heap.extend(triggers),
                    Ok(Command::Shutdown) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        error!("Scheduler command channel closed");
                        break;
                    }
                }

                let now = clock.now();
                let mut gate = thread_gate.lock();
                let epoch = gate.epoch;
                heap.retain(|trigger| trigger.epoch == epoch);
                while heap.peek().is_some_and(|trigger| trigger.at <= now) {
                    let Some(trigger) = heap.pop() else {
                        break;
                    };
                    fire(&mut gate, &registry, trigger);
                }
            }
            info!("Scheduler stopped");
        });

        Scheduler {
            transport,
            gate,
            commands,
            handle: Some(handle),
        }
    }

    /// Schedules every pad's events from the start of the timeline. Triggers already
    /// due fire right away. Returns the number of triggers queued.
    pub fn schedule(&self, pads: Vec<(String, Vec<RecordedEvent>)>) -> Result<usize, SessionError> {
        self.queue(pads, PlanFrom::Start)
    }

    /// Replaces every pending trigger with a fresh plan. Triggers behind the
    /// current position are dropped.
    pub fn reschedule(&self, pads: Vec<(String, Vec<RecordedEvent>)>) -> Result<usize, SessionError> {
        self.cancel_all();
        self.queue(pads, PlanFrom::Position)
    }

    fn queue(
        &self,
        pads: Vec<(String, Vec<RecordedEvent>)>,
        from: PlanFrom,
    ) -> Result<usize, SessionError> {
        // Checked under the gate, so nothing is queued once the transport has
        // stopped and cancel_all has returned.
        let mut gate = self.gate.lock();
        let snapshot = self.transport.snapshot();
        if !snapshot.state.is_running() {
            return Ok(0);
        }
        let from = match from {
            PlanFrom::Start => 0.0,
            PlanFrom::Position => snapshot.position_seconds,
        };
        let epoch = gate.epoch;
        let mut triggers = Vec::new();
        for (pad, events) in pads {
            let planned = plan_triggers(
                &events,
                snapshot.quantization,
                snapshot.bpm,
                from,
            );
            if planned.is_empty() {
                continue;
            }

            gate.pads.insert(
                pad.clone(),
                PadSchedule {
                    state: ScheduleState::Scheduled,
                    pending: planned.len(),
                },
            );
            for trigger in planned {
                let Some(at) = self.transport.instant_of(trigger.time) else {
                    continue;
                };
                gate.seq += 1;
                triggers.push(Trigger {
                    at,
                    seq: gate.seq,
                    epoch,
                    pad: pad.clone(),
                    duration: trigger.duration,
                });
            }
        }

        let queued = triggers.len();
        debug!(triggers = queued, epoch = epoch, "Scheduling triggers");
        self.commands
            .send(Command::Schedule(triggers))
            .map_err(|_| SessionError::SchedulerGone)?;
        Ok(queued)
    }

    /// Cancels every pending trigger and returns all pads to idle. No cancelled
    /// trigger fires after this returns.
    pub fn cancel_all(&self) {
        let mut gate = self.gate.lock();
        gate.epoch += 1;
        let cancelled: usize = gate.pads.values().map(|pad| pad.pending).sum();
        gate.pads.clear();
        debug!(cancelled = cancelled, epoch = gate.epoch, "Cancelled triggers");
    }

    pub fn state(&self, pad: &str) -> ScheduleState {
        self.gate
            .lock()
            .pads
            .get(pad)
            .map(|pad| pad.state)
            .unwrap_or(ScheduleState::Idle)
    }

    /// Triggers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.gate.lock().pads.values().map(|pad| pad.pending).sum()
    }
}

fn fire(gate: &mut Gate, registry: &SamplerRegistry, trigger: Trigger) {
    let Some(pad) = gate.pads.get_mut(&trigger.pad) else {
        return;
    };
    pad.pending = pad.pending.saturating_sub(1);
    if pad.pending == 0 {
        gate.pads.remove(&trigger.pad);
    } else {
        pad.state = ScheduleState::Playing;
    }

    match registry.get(&trigger.pad) {
        Some(chain) => {
            let sounded = chain.trigger_attack_release(trigger.duration);
            debug!(
                pad = trigger.pad,
                duration = trigger.duration,
                sounded = sounded,
                "Trigger fired"
            );
        }
        None => debug!(pad = trigger.pad, "Trigger for unregistered pad"),
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Scheduler thread panicked");
            }
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gate = self.gate.lock();
        f.debug_struct("Scheduler")
            .field("epoch", &gate.epoch)
            .field("pads", &gate.pads.len())
            .finish()
    }
}

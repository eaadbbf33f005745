//! Async liveness monitor.
//!
//! Runs a [`LivenessController`] on a tokio task: a `tokio::time::interval`
//! drives the poll, and check-ins / override swaps arrive as commands. The
//! task is the single owner of the controller, so every recomputation
//! happens on one logical timeline.
//!
//! Disposal goes through [`MonitorHandle::shutdown`] (or dropping the
//! handle). It closes the controller's publish gate before aborting the
//! task, so a tick or check-in that is already underway cannot publish.

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::controller::{LivenessController, PublishGate};
use super::deadline::SwitchStatus;
use super::resolver::SettingsOverride;
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::store::SettingsStore;

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 64;

enum Command {
    CheckIn(oneshot::Sender<Result<SwitchStatus>>),
    SetOverride(
        Option<SettingsOverride>,
        oneshot::Sender<Result<Option<SwitchStatus>>>,
    ),
}

/// Spawns controllers onto the current tokio runtime.
pub struct LivenessMonitor;

impl LivenessMonitor {
    /// Activate `controller` and keep it fresh on its poll interval.
    ///
    /// Activation happens before this returns, so subscribers see the first
    /// status immediately. Must be called from within a tokio runtime.
    pub fn spawn<S, C>(mut controller: LivenessController<S, C>) -> MonitorHandle
    where
        S: SettingsStore + Send + 'static,
        C: Clock + 'static,
    {
        if let Err(e) = controller.activate() {
            warn!(error = %e, "initial evaluation failed; retrying on next poll");
        }

        let first_poll = Instant::now() + controller.poll_interval();
        let gate = controller.gate();
        let statuses = controller.subscribe();
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let task = tokio::spawn(run(controller, first_poll, command_rx, events.clone()));

        MonitorHandle {
            commands,
            statuses,
            events,
            gate,
            task: Some(task),
        }
    }
}

async fn run<S, C>(
    mut controller: LivenessController<S, C>,
    first_poll: Instant,
    mut commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<Event>,
) where
    S: SettingsStore,
    C: Clock,
{
    let period = controller.poll_interval();
    let mut interval = interval_at(first_poll, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    forward_events(&mut controller, &events);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Failures are already logged by the controller.
                let _ = controller.refresh();
            }
            command = commands.recv() => match command {
                Some(Command::CheckIn(reply)) => {
                    let _ = reply.send(controller.check_in());
                }
                Some(Command::SetOverride(override_, reply)) => {
                    let _ = reply.send(controller.set_override(override_));
                }
                None => break,
            },
        }
        forward_events(&mut controller, &events);
    }

    debug!("liveness monitor stopping");
    controller.deactivate();
}

fn forward_events<S, C>(controller: &mut LivenessController<S, C>, events: &broadcast::Sender<Event>)
where
    S: SettingsStore,
    C: Clock,
{
    for event in controller.take_events() {
        // No subscribers is fine.
        let _ = events.send(event);
    }
}

/// Owner of a running monitor.
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    statuses: watch::Receiver<Option<SwitchStatus>>,
    events: broadcast::Sender<Event>,
    gate: PublishGate,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Receiver of every published status.
    pub fn subscribe(&self) -> watch::Receiver<Option<SwitchStatus>> {
        self.statuses.clone()
    }

    /// Receiver of check-in and phase-change events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Last published status.
    pub fn status(&self) -> Option<SwitchStatus> {
        *self.statuses.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some() && self.gate.is_open()
    }

    /// Check in now; resolves once the store write is confirmed and the
    /// fresh status has been published.
    pub async fn check_in(&self) -> Result<SwitchStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CheckIn(reply)).await?;
        rx.await.map_err(|_| CoreError::MonitorStopped)?
    }

    /// Swap the preview override and recompute at once.
    pub async fn set_override(
        &self,
        override_: Option<SettingsOverride>,
    ) -> Result<Option<SwitchStatus>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetOverride(override_, reply)).await?;
        rx.await.map_err(|_| CoreError::MonitorStopped)?
    }

    /// Stop the monitor. Synchronous: nothing is published after this returns.
    pub fn shutdown(&mut self) {
        self.gate.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        if self.task.is_none() {
            return Err(CoreError::MonitorStopped);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::MonitorStopped)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

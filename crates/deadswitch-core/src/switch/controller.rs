//! Liveness controller.
//!
//! Owns the re-evaluation cadence and the check-in action. Like the rest of
//! the engine it has no internal thread: callers either drive `tick()`
//! themselves or hand the controller to [`LivenessMonitor`](super::LivenessMonitor).
//!
//! ## Phases
//!
//! ```text
//! AliveMultiDay <-> Alive24h     (protocol length change only)
//! Alive*        ->  Dead         (elapsed time only)
//! Dead          ->  Alive*       (check-in only)
//! ```
//!
//! Phases and events follow the persisted settings. Once the persisted
//! settings have been published dead they stay dead until a check-in newer
//! than the one that expired is observed, either through
//! [`LivenessController::check_in`] or in the shared store.
//!
//! A preview override is a what-if: the published status is evaluated from
//! the overridden config as-is, it never latches death and it never emits
//! `SwitchTripped` or `SwitchRearmed`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::deadline::{deadline_ms, evaluate, SwitchPhase, SwitchStatus};
use super::resolver::{resolve, EffectiveConfig, SettingsOverride};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::events::{ms_to_datetime, Event};
use crate::store::{SettingsPatch, SettingsStore};

/// Default re-evaluation cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest accepted cadence; `tokio::time::interval` rejects zero.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct GateState {
    sender: watch::Sender<Option<SwitchStatus>>,
    open: bool,
    /// Bumped on every close so work started before a close can never publish.
    epoch: u64,
}

/// The single point through which statuses reach observers.
///
/// Closing the gate is synchronous: once `close()` returns, nothing started
/// before it (a pending poll, a check-in whose store write is in flight)
/// can publish.
#[derive(Debug, Clone)]
pub struct PublishGate {
    inner: Arc<Mutex<GateState>>,
}

impl Default for PublishGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishGate {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            inner: Arc::new(Mutex::new(GateState {
                sender,
                open: false,
                epoch: 0,
            })),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SwitchStatus>> {
        self.lock().sender.subscribe()
    }

    /// Last published status, if any.
    pub fn latest(&self) -> Option<SwitchStatus> {
        *self.lock().sender.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn close(&self) {
        let mut state = self.lock();
        state.open = false;
        state.epoch = state.epoch.wrapping_add(1);
    }

    fn open(&self) {
        self.lock().open = true;
    }

    fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Publish if the gate is open and has not been closed since `epoch`.
    fn publish(&self, epoch: u64, status: SwitchStatus) -> bool {
        let state = self.lock();
        if !state.open || state.epoch != epoch {
            return false;
        }
        state.sender.send_replace(Some(status));
        true
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drives the resolver and calculator for one observer.
///
/// Several controllers may share one store; each keeps its own cadence,
/// override and published status.
#[derive(Debug)]
pub struct LivenessController<S, C = SystemClock> {
    store: S,
    clock: C,
    poll_interval: Duration,
    override_: Option<SettingsOverride>,
    gate: PublishGate,
    active: bool,
    next_poll_ms: Option<i64>,
    /// `now` of the last publication; evaluations never go below it.
    last_now_ms: Option<i64>,
    last_status: Option<SwitchStatus>,
    /// Phase of the persisted settings at the last publication.
    last_persisted: Option<SwitchPhase>,
    /// Persisted last check-in at the moment death was first published.
    dead_latch: Option<i64>,
    events: Vec<Event>,
}

impl<S: SettingsStore> LivenessController<S, SystemClock> {
    /// Controller reading the system clock.
    pub fn with_system_clock(store: S) -> Self {
        Self::new(store, SystemClock)
    }
}

impl<S: SettingsStore, C: Clock> LivenessController<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            poll_interval: DEFAULT_POLL_INTERVAL,
            override_: None,
            gate: PublishGate::new(),
            active: false,
            next_poll_ms: None,
            last_now_ms: None,
            last_status: None,
            last_persisted: None,
            dead_latch: None,
            events: Vec::new(),
        }
    }

    /// Set the re-evaluation cadence. Clamped to [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_override(mut self, override_: SettingsOverride) -> Self {
        self.override_ = Some(override_);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.active && self.gate.is_open()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn current_override(&self) -> Option<&SettingsOverride> {
        self.override_.as_ref()
    }

    /// Last status this controller published.
    pub fn status(&self) -> Option<SwitchStatus> {
        self.last_status
    }

    pub fn phase(&self) -> Option<SwitchPhase> {
        self.last_status.map(|s| s.phase())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SwitchStatus>> {
        self.gate.subscribe()
    }

    /// Handle that can close publication from outside the controller.
    pub fn gate(&self) -> PublishGate {
        self.gate.clone()
    }

    /// Drain events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start observing: evaluate and publish now, then arm the poll cadence.
    ///
    /// The cadence is armed even if this first evaluation fails, so the next
    /// `tick()` retries.
    pub fn activate(&mut self) -> Result<SwitchStatus> {
        self.active = true;
        self.gate.open();
        self.next_poll_ms = Some(self.clock.now_ms().saturating_add(self.poll_interval_ms()));
        debug!(interval_secs = self.poll_interval.as_secs(), "liveness controller activated");
        let epoch = self.gate.epoch();
        self.evaluate_and_publish(epoch)
    }

    /// Stop observing. Nothing is published after this returns.
    pub fn deactivate(&mut self) {
        if self.active {
            debug!("liveness controller deactivated");
        }
        self.active = false;
        self.next_poll_ms = None;
        self.gate.close();
    }

    /// Caller-driven poll. Re-evaluates once the poll interval has elapsed
    /// and returns the published status, or `None` if nothing was due.
    pub fn tick(&mut self) -> Result<Option<SwitchStatus>> {
        if !self.is_active() {
            return Ok(None);
        }
        let now = self.clock.now_ms();
        match self.next_poll_ms {
            Some(due) if now < due => return Ok(None),
            _ => {}
        }
        self.next_poll_ms = Some(now.saturating_add(self.poll_interval_ms()));
        self.refresh()
    }

    /// Re-evaluate immediately, ignoring the cadence.
    pub fn refresh(&mut self) -> Result<Option<SwitchStatus>> {
        if !self.is_active() {
            return Ok(None);
        }
        let epoch = self.gate.epoch();
        let status = self.evaluate_and_publish(epoch)?;
        Ok(Some(status))
    }

    /// Replace the preview override. Recomputes at once while active so
    /// previews never lag behind the poll interval.
    pub fn set_override(
        &mut self,
        override_: Option<SettingsOverride>,
    ) -> Result<Option<SwitchStatus>> {
        self.override_ = override_.filter(|o| !o.is_empty());
        self.refresh()
    }

    /// Record a check-in at the current time and republish.
    ///
    /// The store write comes first; if it fails the error is returned and
    /// nothing is published. If the controller is deactivated while the
    /// write is in flight, the fresh status is returned but not published.
    pub fn check_in(&mut self) -> Result<SwitchStatus> {
        let epoch = self.gate.epoch();
        let now = self.monotonic_now();

        if let Err(e) = self.store.update_settings(SettingsPatch::check_in(now)) {
            warn!(error = %e, "check-in write failed; keeping previous status");
            return Err(e);
        }

        info!(last_check_in_ms = now, "checked in");
        self.dead_latch = None;
        self.events.push(Event::CheckedIn {
            last_check_in_ms: now,
            at: ms_to_datetime(now),
        });

        if self.active {
            self.evaluate_and_publish(epoch)
        } else {
            Ok(self.compute()?.status)
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn poll_interval_ms(&self) -> i64 {
        i64::try_from(self.poll_interval.as_millis()).unwrap_or(i64::MAX)
    }

    fn monotonic_now(&self) -> i64 {
        let now = self.clock.now_ms();
        match self.last_now_ms {
            Some(prev) if prev > now => prev,
            _ => now,
        }
    }

    /// Resolver + calculator, with the dead latch applied to the persisted
    /// settings. No side effects.
    fn compute(&self) -> Result<Evaluation> {
        let settings = self.store.get_settings()?;
        let now = self.monotonic_now();

        let persisted_config = resolve(&settings, None, now);
        let mut persisted = evaluate(&persisted_config, now);
        if let Some(latched) = self.dead_latch {
            if !persisted.is_dead && persisted_config.last_check_in_ms <= latched {
                persisted = SwitchStatus::dead(persisted.is_24h_mode);
            }
        }

        let (config, status) = match &self.override_ {
            Some(override_) => {
                let config = resolve(&settings, Some(override_), now);
                (config, evaluate(&config, now))
            }
            None => (persisted_config, persisted),
        };

        Ok(Evaluation {
            config,
            status,
            persisted_config,
            persisted,
            now,
        })
    }

    fn evaluate_and_publish(&mut self, epoch: u64) -> Result<SwitchStatus> {
        let eval = match self.compute() {
            Ok(eval) => eval,
            Err(e) => {
                warn!(error = %e, "settings read failed; keeping last published status");
                return Err(e);
            }
        };
        let status = eval.status;

        debug!(
            protocol_length_days = eval.config.protocol_length_days,
            days_remaining = status.days_remaining,
            hours_remaining = status.hours_remaining,
            is_dead = status.is_dead,
            preview = self.override_.is_some(),
            "switch evaluated"
        );

        if !self.gate.publish(epoch, status) {
            debug!("publication suppressed; controller no longer active");
            return Ok(status);
        }

        self.record_transition(&eval);
        self.last_now_ms = Some(eval.now);
        self.last_status = Some(status);
        self.last_persisted = Some(eval.persisted.phase());
        self.dead_latch = if eval.persisted.is_dead {
            Some(self.dead_latch.unwrap_or(eval.persisted_config.last_check_in_ms))
        } else {
            None
        };
        Ok(status)
    }

    fn record_transition(&mut self, eval: &Evaluation) {
        let at = ms_to_datetime(eval.now);

        if let Some(previous) = self.last_persisted {
            match (previous == SwitchPhase::Dead, eval.persisted.is_dead) {
                (false, true) => {
                    let deadline = deadline_ms(&eval.persisted_config, eval.now);
                    info!(deadline_ms = deadline, "switch tripped");
                    self.events.push(Event::SwitchTripped { deadline_ms: deadline, at });
                }
                (true, false) => {
                    let phase = eval.persisted.phase();
                    info!(phase = ?phase, "switch re-armed");
                    self.events.push(Event::SwitchRearmed { phase, at });
                }
                _ => {}
            }
        }

        // Mode changes are reported for what observers see, previews included.
        let Some(from) = self.last_status.map(|s| s.phase()) else {
            return;
        };
        let to = eval.status.phase();
        if from != to && from != SwitchPhase::Dead && to != SwitchPhase::Dead {
            info!(from = ?from, to = ?to, "protocol mode changed");
            self.events.push(Event::ModeChanged { from, to, at });
        }
    }
}

/// One pass of the resolver and calculator.
struct Evaluation {
    /// Config behind the published status, override applied.
    config: EffectiveConfig,
    status: SwitchStatus,
    persisted_config: EffectiveConfig,
    /// Status of the persisted settings alone, latch applied.
    persisted: SwitchStatus,
    now: i64,
}

impl<S, C> Drop for LivenessController<S, C> {
    fn drop(&mut self) {
        self.gate.close();
    }
}

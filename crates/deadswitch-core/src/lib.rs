//! # deadswitch Core Library
//!
//! This library provides the core logic of a dead man's switch: it tracks
//! whether the user has checked in within a configurable protocol length
//! and derives, at any instant, how much time remains before the user is
//! declared dead. The `deadswitch` CLI is a thin layer over the same core.
//!
//! ## Architecture
//!
//! - **Resolver**: merges a preview override over the persisted settings
//! - **Deadline calculator**: pure `(config, now) -> SwitchStatus`
//! - **Liveness controller**: owns the poll cadence and the check-in action;
//!   publishes statuses on a watch channel
//! - **Liveness monitor**: runs a controller on a tokio task
//! - **Storage**: SQLite settings store and TOML configuration
//!
//! ## Key Components
//!
//! - [`evaluate`]: Deadline calculator
//! - [`LivenessController`]: Lifecycle-managed re-evaluation and check-in
//! - [`LivenessMonitor`]: Async driver with a single disposal point
//! - [`SettingsStore`]: Collaborator trait for persisted settings
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod storage;
pub mod store;
pub mod switch;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, StoreError, ValidationError};
pub use events::Event;
pub use storage::{Config, SettingsDb};
pub use store::{MemorySettingsStore, SettingsPatch, SettingsStore};
pub use switch::{
    evaluate, resolve, EffectiveConfig, LivenessController, LivenessMonitor, MonitorHandle,
    SettingsOverride, StoredSettings, SwitchPhase, SwitchStatus,
};

mod controller;
mod deadline;
mod monitor;
mod resolver;

pub use controller::{LivenessController, PublishGate, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use deadline::{deadline_ms, evaluate, SwitchPhase, SwitchStatus};
pub use monitor::{LivenessMonitor, MonitorHandle};
pub use resolver::{
    resolve, EffectiveConfig, SettingsOverride, StoredSettings, DEFAULT_PROTOCOL_LENGTH_DAYS,
};

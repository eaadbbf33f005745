pub mod check_in;
pub mod config;
pub mod protocol;
pub mod status;
pub mod watch;

use chrono::{DateTime, SecondsFormat, Utc};
use deadswitch_core::events::ms_to_datetime;
use deadswitch_core::switch::deadline_ms;
use deadswitch_core::{Config, EffectiveConfig, SettingsDb, SwitchPhase, SwitchStatus};
use serde::Serialize;

/// Open the settings database, creating the settings record on first use.
pub fn open_store(config: &Config) -> Result<SettingsDb, Box<dyn std::error::Error>> {
    let db = SettingsDb::open()?;
    db.initialize(config.protocol.default_length_days, Utc::now().timestamp_millis())?;
    Ok(db)
}

/// JSON shape printed by `status` and `check-in`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub status: SwitchStatus,
    pub phase: SwitchPhase,
    pub protocol_length_days: i64,
    pub last_check_in: String,
    pub deadline: String,
    pub preview: bool,
}

impl StatusReport {
    pub fn new(status: SwitchStatus, config: &EffectiveConfig, now_ms: i64, preview: bool) -> Self {
        Self {
            status,
            phase: status.phase(),
            protocol_length_days: config.protocol_length_days,
            last_check_in: rfc3339(ms_to_datetime(config.last_check_in_ms)),
            deadline: rfc3339(ms_to_datetime(deadline_ms(config, now_ms))),
            preview,
        }
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

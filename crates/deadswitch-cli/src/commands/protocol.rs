use clap::Subcommand;
use deadswitch_core::{Config, SettingsStore};
use tracing::warn;

use super::open_store;

#[derive(Subcommand)]
pub enum ProtocolAction {
    /// Show the stored protocol settings
    Show,
    /// Set the protocol length in days
    Set {
        /// Days of inactivity tolerated before the switch trips
        days: i64,
    },
}

pub fn run(action: ProtocolAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(config)?;

    match action {
        ProtocolAction::Show => {
            let settings = db.get_settings()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ProtocolAction::Set { days } => {
            db.set_protocol_length(days)?;
            if !config.protocol.is_supported(days) {
                warn!(
                    days,
                    supported = ?config.protocol.supported_lengths,
                    "protocol length is not one of the supported lengths"
                );
            }
            println!("ok");
        }
    }
    Ok(())
}

use clap::Subcommand;
use deadswitch_core::Config;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show one config value
    Get {
        /// Dot-separated key (e.g. "protocol.default_length_days", "monitor.poll_interval_secs")
        key: String,
    },
    /// Change one config value and save
    Set {
        /// Dot-separated key
        key: String,
        /// New value, parsed as the key's type
        value: String,
    },
    /// Print the whole config
    List,
    /// Overwrite the config file with the defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = lookup(&config, &key)?;
            print_json(&json!({ "key": key, "value": value }))?;
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            let previous = lookup(&config, &key)?;
            config.set(&key, &value)?;
            let current = lookup(&config, &key)?;
            info!(%key, %previous, %current, "config updated");

            if key == "protocol.default_length_days" {
                if let Some(days) = current.as_i64() {
                    if !config.protocol.is_supported(days) {
                        warn!(
                            days,
                            supported = ?config.protocol.supported_lengths,
                            "default protocol length is not one of the supported lengths"
                        );
                    }
                }
            }
            print_json(&json!({ "key": key, "previous": previous, "value": current }))?;
        }
        ConfigAction::List => {
            let config = Config::load()?;
            print_json(&serde_json::to_value(&config)?)?;
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            info!("config reset to defaults");
            print_json(&json!({
                "path": Config::path()?.display().to_string(),
                "config": config,
            }))?;
        }
    }
    Ok(())
}

/// Typed value at a dot-separated key.
fn lookup(config: &Config, key: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let tree = serde_json::to_value(config)?;
    let pointer = format!("/{}", key.replace('.', "/"));
    tree.pointer(&pointer)
        .cloned()
        .ok_or_else(|| format!("unknown config key: {key}").into())
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

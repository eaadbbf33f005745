use chrono::{DateTime, Utc};
use clap::Args;
use deadswitch_core::{
    evaluate, resolve, Config, SettingsOverride, SettingsStore, ValidationError,
};

use super::{open_store, StatusReport};

#[derive(Args)]
pub struct StatusArgs {
    /// Preview with this protocol length (days) instead of the stored one
    #[arg(long)]
    pub days: Option<i64>,
    /// Preview with this last check-in (RFC 3339) instead of the stored one
    #[arg(long)]
    pub last_check_in: Option<String>,
}

impl StatusArgs {
    fn preview(&self) -> Result<Option<SettingsOverride>, ValidationError> {
        let last_check_in_ms = self
            .last_check_in
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let over = SettingsOverride {
            protocol_length_days: self.days,
            last_check_in_ms,
        };
        Ok((!over.is_empty()).then_some(over))
    }
}

pub fn parse_timestamp(input: &str) -> Result<i64, ValidationError> {
    DateTime::parse_from_rfc3339(input)
        .map(|at| at.with_timezone(&Utc).timestamp_millis())
        .map_err(|e| ValidationError::InvalidTimestamp {
            input: input.to_string(),
            message: e.to_string(),
        })
}

pub fn run(args: StatusArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let preview = args.preview()?;
    let db = open_store(config)?;
    let settings = db.get_settings()?;

    let now = Utc::now().timestamp_millis();
    let effective = resolve(&settings, preview.as_ref(), now);
    let status = evaluate(&effective, now);

    let report = StatusReport::new(status, &effective, now, preview.is_some());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        assert_eq!(parse_timestamp("1970-01-01T01:00:00+01:00").unwrap(), 0);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn no_flags_means_no_preview() {
        let args = StatusArgs {
            days: None,
            last_check_in: None,
        };
        assert!(args.preview().unwrap().is_none());

        let args = StatusArgs {
            days: Some(1),
            last_check_in: None,
        };
        assert_eq!(args.preview().unwrap(), Some(SettingsOverride::protocol_length(1)));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::switch::SwitchPhase;

/// Check-ins and phase changes produce an Event. Statuses themselves are
/// published on the controller's watch channel.
/// Callers drain events from the controller; downstream features (legacy
/// release, ghost posting) react to `SwitchTripped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    CheckedIn {
        /// Epoch milliseconds written to the store.
        last_check_in_ms: i64,
        at: DateTime<Utc>,
    },
    /// The deadline passed with no check-in.
    SwitchTripped {
        deadline_ms: i64,
        at: DateTime<Utc>,
    },
    /// The switch left the dead phase through a check-in.
    SwitchRearmed {
        phase: SwitchPhase,
        at: DateTime<Utc>,
    },
    /// Effective protocol length moved into or out of 24h mode.
    ModeChanged {
        from: SwitchPhase,
        to: SwitchPhase,
        at: DateTime<Utc>,
    },
}

/// Epoch milliseconds to a UTC timestamp, saturating at the representable range.
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(if ms < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::CheckedIn {
            last_check_in_ms: 0,
            at: ms_to_datetime(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CheckedIn");
        assert_eq!(json["last_check_in_ms"], 0);
    }

    #[test]
    fn out_of_range_millis_saturate() {
        assert_eq!(ms_to_datetime(i64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(ms_to_datetime(i64::MIN), DateTime::<Utc>::MIN_UTC);
    }
}

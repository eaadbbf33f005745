//! Configuration resolver.
//!
//! Merges an optional preview override over the persisted settings. The
//! precedence is field-wise: an override field, when present, always wins;
//! otherwise the stored field; otherwise the default.

use serde::{Deserialize, Serialize};

/// Protocol length used when neither the store nor the override has one.
pub const DEFAULT_PROTOCOL_LENGTH_DAYS: i64 = 7;

/// Settings as read from the store. Either field may be missing on first use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default)]
    pub protocol_length_days: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub last_check_in_ms: Option<i64>,
}

/// Ephemeral "what-if" values used while the user edits the protocol.
/// Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsOverride {
    #[serde(default)]
    pub protocol_length_days: Option<i64>,
    #[serde(default)]
    pub last_check_in_ms: Option<i64>,
}

impl SettingsOverride {
    pub fn protocol_length(days: i64) -> Self {
        Self {
            protocol_length_days: Some(days),
            last_check_in_ms: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.protocol_length_days.is_none() && self.last_check_in_ms.is_none()
    }
}

/// Fully resolved configuration fed to the deadline calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub protocol_length_days: i64,
    pub last_check_in_ms: i64,
}

/// Resolve the effective configuration.
///
/// A missing last check-in resolves to `now_ms` so a fresh install does not
/// start out already expired.
pub fn resolve(
    settings: &StoredSettings,
    override_: Option<&SettingsOverride>,
    now_ms: i64,
) -> EffectiveConfig {
    let over = override_.copied().unwrap_or_default();
    EffectiveConfig {
        protocol_length_days: over
            .protocol_length_days
            .or(settings.protocol_length_days)
            .unwrap_or(DEFAULT_PROTOCOL_LENGTH_DAYS),
        last_check_in_ms: over
            .last_check_in_ms
            .or(settings.last_check_in_ms)
            .unwrap_or(now_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn empty_settings_use_defaults() {
        let cfg = resolve(&StoredSettings::default(), None, NOW);
        assert_eq!(cfg.protocol_length_days, 7);
        assert_eq!(cfg.last_check_in_ms, NOW);
    }

    #[test]
    fn stored_values_pass_through() {
        let settings = StoredSettings {
            protocol_length_days: Some(30),
            last_check_in_ms: Some(NOW - 1_000),
        };
        let cfg = resolve(&settings, None, NOW);
        assert_eq!(cfg.protocol_length_days, 30);
        assert_eq!(cfg.last_check_in_ms, NOW - 1_000);
    }

    #[test]
    fn override_protocol_length_wins_over_settings() {
        let settings = StoredSettings {
            protocol_length_days: Some(7),
            last_check_in_ms: Some(NOW),
        };
        let over = SettingsOverride::protocol_length(1);
        let cfg = resolve(&settings, Some(&over), NOW);
        assert_eq!(cfg.protocol_length_days, 1);
        assert_eq!(cfg.last_check_in_ms, NOW);
    }

    #[test]
    fn partial_override_only_replaces_its_field() {
        let settings = StoredSettings {
            protocol_length_days: Some(30),
            last_check_in_ms: None,
        };
        let over = SettingsOverride {
            protocol_length_days: None,
            last_check_in_ms: Some(42),
        };
        let cfg = resolve(&settings, Some(&over), NOW);
        assert_eq!(cfg.protocol_length_days, 30);
        assert_eq!(cfg.last_check_in_ms, 42);
    }

    #[test]
    fn empty_override_is_same_as_none() {
        let settings = StoredSettings {
            protocol_length_days: Some(1),
            last_check_in_ms: Some(NOW - 5),
        };
        let over = SettingsOverride::default();
        assert!(over.is_empty());
        assert_eq!(resolve(&settings, Some(&over), NOW), resolve(&settings, None, NOW));
    }
}

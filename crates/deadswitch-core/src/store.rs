//! Settings store collaborator.
//!
//! The store is the single source of truth for `{protocol_length_days,
//! last_check_in_ms}`. Several controllers may share one store; writes are
//! last-write-wins and the core never locks across an evaluation.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::switch::StoredSettings;

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub protocol_length_days: Option<i64>,
    #[serde(default)]
    pub last_check_in_ms: Option<i64>,
}

impl SettingsPatch {
    pub fn check_in(at_ms: i64) -> Self {
        Self {
            protocol_length_days: None,
            last_check_in_ms: Some(at_ms),
        }
    }

    pub fn protocol_length(days: i64) -> Self {
        Self {
            protocol_length_days: Some(days),
            last_check_in_ms: None,
        }
    }

    /// Apply this patch on top of `settings`.
    pub fn apply_to(&self, settings: &mut StoredSettings) {
        if let Some(days) = self.protocol_length_days {
            settings.protocol_length_days = Some(days);
        }
        if let Some(at) = self.last_check_in_ms {
            settings.last_check_in_ms = Some(at);
        }
    }
}

/// Persistent settings collaborator.
///
/// `update_settings` must only return `Ok` once the write has been durably
/// recorded; the controller publishes a reset status only after that.
pub trait SettingsStore {
    fn get_settings(&self) -> Result<StoredSettings>;

    fn update_settings(&self, patch: SettingsPatch) -> Result<()>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for Arc<S> {
    fn get_settings(&self) -> Result<StoredSettings> {
        (**self).get_settings()
    }

    fn update_settings(&self, patch: SettingsPatch) -> Result<()> {
        (**self).update_settings(patch)
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for &S {
    fn get_settings(&self) -> Result<StoredSettings> {
        (**self).get_settings()
    }

    fn update_settings(&self, patch: SettingsPatch) -> Result<()> {
        (**self).update_settings(patch)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    settings: StoredSettings,
    fail_writes: bool,
    fail_reads: bool,
    writes: usize,
}

/// In-process store. Clones share the same settings, which is how several
/// UI surfaces observe one switch.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemorySettingsStore {
    pub fn new(settings: StoredSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                settings,
                ..MemoryState::default()
            })),
        }
    }

    /// Current settings without going through the trait.
    pub fn snapshot(&self) -> StoredSettings {
        self.lock().settings
    }

    /// Make subsequent writes fail (until reset with `false`).
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make subsequent reads fail (until reset with `false`).
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the plain-data state
        // half-written, so recover from poisoning.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_settings(&self) -> Result<StoredSettings> {
        let state = self.lock();
        if state.fail_reads {
            return Err(StoreError::ReadFailed("memory store read disabled".into()).into());
        }
        Ok(state.settings)
    }

    fn update_settings(&self, patch: SettingsPatch) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StoreError::WriteFailed("memory store write disabled".into()).into());
        }
        patch.apply_to(&mut state.settings);
        state.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_touches_present_fields() {
        let mut settings = StoredSettings {
            protocol_length_days: Some(7),
            last_check_in_ms: Some(10),
        };
        SettingsPatch::check_in(99).apply_to(&mut settings);
        assert_eq!(settings.protocol_length_days, Some(7));
        assert_eq!(settings.last_check_in_ms, Some(99));

        SettingsPatch::protocol_length(30).apply_to(&mut settings);
        assert_eq!(settings.protocol_length_days, Some(30));
        assert_eq!(settings.last_check_in_ms, Some(99));
    }

    #[test]
    fn clones_share_state() {
        let store = MemorySettingsStore::default();
        let other = store.clone();
        store.update_settings(SettingsPatch::check_in(5)).unwrap();
        assert_eq!(other.get_settings().unwrap().last_check_in_ms, Some(5));
        assert_eq!(other.write_count(), 1);
    }

    #[test]
    fn failed_write_leaves_settings_untouched() {
        let store = MemorySettingsStore::new(StoredSettings {
            protocol_length_days: Some(1),
            last_check_in_ms: Some(1),
        });
        store.set_fail_writes(true);
        assert!(store.update_settings(SettingsPatch::check_in(2)).is_err());
        assert_eq!(store.snapshot().last_check_in_ms, Some(1));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn failed_read_reports_store_error() {
        let store = MemorySettingsStore::default();
        store.set_fail_reads(true);
        let err = store.get_settings().unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Store(StoreError::ReadFailed(_))));
    }
}

//! SQLite-backed settings store.
//!
//! Settings live as one JSON record in a key-value table, so the schema does
//! not change when fields are added.

use std::path::Path;

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use super::data_dir;
use crate::error::{DatabaseError, Result, ValidationError};
use crate::store::{SettingsPatch, SettingsStore};
use crate::switch::StoredSettings;

const SETTINGS_KEY: &str = "switch_settings";

/// SQLite database holding the switch settings.
pub struct SettingsDb {
    conn: Connection,
}

impl SettingsDb {
    /// Open the database at `~/.config/deadswitch/deadswitch.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("deadswitch.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        debug!(path = %path.display(), "settings database opened");
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Create the settings record on first use.
    ///
    /// Missing fields are filled with `default_days` and `now_ms`; fields
    /// already present are left alone. Returns the settings as stored.
    pub fn initialize(&self, default_days: i64, now_ms: i64) -> Result<StoredSettings> {
        let mut settings = self.get_settings()?;
        if settings.protocol_length_days.is_some() && settings.last_check_in_ms.is_some() {
            return Ok(settings);
        }
        settings.protocol_length_days.get_or_insert(default_days);
        settings.last_check_in_ms.get_or_insert(now_ms);
        self.write_settings(&settings)?;
        info!(
            protocol_length_days = ?settings.protocol_length_days,
            "settings initialized"
        );
        Ok(settings)
    }

    /// Change the protocol length. Lengths below one day are rejected.
    pub fn set_protocol_length(&self, days: i64) -> Result<()> {
        if days < 1 {
            return Err(ValidationError::InvalidProtocolLength { days }.into());
        }
        self.update_settings(SettingsPatch::protocol_length(days))
    }

    fn write_settings(&self, settings: &StoredSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        self.kv_set(SETTINGS_KEY, &json)?;
        Ok(())
    }
}

impl SettingsStore for SettingsDb {
    fn get_settings(&self) -> Result<StoredSettings> {
        match self.kv_get(SETTINGS_KEY)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| DatabaseError::CorruptSettings(e.to_string()).into()),
            None => Ok(StoredSettings::default()),
        }
    }

    fn update_settings(&self, patch: SettingsPatch) -> Result<()> {
        // IMMEDIATE takes the write lock up front so a writer on another
        // connection cannot interleave with the read-modify-write.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let mut settings = self.get_settings()?;
        patch.apply_to(&mut settings);
        self.write_settings(&settings)?;
        tx.commit()?;
        Ok(())
    }
}

//! SQLite-backed local cache for campaigns, leads, and activities.
//!
//! The database lives at `~/.leadsync/leadsync.db` and is the durable layer
//! between the remote APIs and the derivation engine. Every sync pass writes
//! through `with_transaction` so a failed pass leaves the store exactly as it
//! was; committed prior passes are never touched. Upserts merge rather than
//! overwrite — see `upsert_leads` for the enrichment-field rules.

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, Connection};

pub mod types;
pub use types::*;

mod activities;
mod campaigns;
mod leads;
mod weights;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.leadsync/leadsync.db` and apply
    /// the schema.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(Self::default_path()?)
    }

    /// Open a database at an explicit path. Used by tests and the `--db` flag.
    pub fn open_at(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(StoreError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.leadsync/leadsync.db`.
    fn default_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeDirNotFound)?;
        Ok(home.join(".leadsync").join("leadsync.db"))
    }

    pub(crate) fn now_iso() -> String {
        Utc::now().to_rfc3339()
    }

    /// Delete all rows belonging to a campaign, children first.
    pub fn clear_campaign(&self, campaign_id: &str) -> Result<(), StoreError> {
        self.with_transaction(|db| {
            db.conn
                .execute("DELETE FROM activities WHERE campaign_id = ?1", params![campaign_id])?;
            db.conn
                .execute("DELETE FROM leads WHERE campaign_id = ?1", params![campaign_id])?;
            db.conn
                .execute("DELETE FROM campaigns WHERE campaign_id = ?1", params![campaign_id])?;
            Ok(())
        })
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::{ActivityRecord, LeadRecord, Store};

    /// Create a temporary on-disk database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the
    /// test; test temp dirs are cleaned up by the OS.
    pub fn test_db() -> Store {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        Store::open_at(path).expect("Failed to open test database")
    }

    pub fn sample_lead(lead_id: &str, email: &str) -> LeadRecord {
        LeadRecord {
            lead_id: lead_id.to_string(),
            email: Some(email.to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            ..Default::default()
        }
    }

    pub fn sample_activity(id: &str, lead_id: &str, occurred_at: &str) -> ActivityRecord {
        ActivityRecord {
            id: id.to_string(),
            lead_id: lead_id.to_string(),
            activity_type: "emailsOpened".to_string(),
            type_display: "Email opened".to_string(),
            occurred_at: occurred_at.to_string(),
            details: String::new(),
            raw_json: "{}".to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

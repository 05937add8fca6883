//! Shared type definitions for the local store.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

/// Errors specific to local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from the `campaigns` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub campaign_id: String,
    pub name: String,
    pub status: String,
    pub last_synced_at: Option<String>,
    pub created_at: String,
}

/// Incoming lead payload for `upsert_leads`.
///
/// The enrichment fields (`hubspot_id` through `seniority`) merge with
/// first-non-null-wins semantics; a `None` here never erases a stored value.
#[derive(Debug, Clone, Default)]
pub struct LeadRecord {
    pub lead_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub hubspot_id: Option<String>,
    pub linkedin_url: Option<String>,
    pub company: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub seniority: Option<String>,
}

/// A row from the `leads` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub lead_id: String,
    pub campaign_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub hubspot_id: Option<String>,
    pub linkedin_url: Option<String>,
    pub company: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub seniority: Option<String>,
    pub last_updated_at: Option<String>,
    pub created_at: String,
}

/// Incoming activity payload for `upsert_activities`.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub id: String,
    pub lead_id: String,
    pub activity_type: String,
    pub type_display: String,
    pub occurred_at: String,
    pub details: String,
    pub raw_json: String,
}

/// A row from the `activities` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub lead_id: String,
    pub campaign_id: String,
    pub activity_type: String,
    pub type_display: Option<String>,
    pub occurred_at: String,
    pub details: Option<String>,
    pub synced_at: String,
}

/// An activity joined with the owning lead's display fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityWithLead {
    pub id: String,
    pub lead_id: String,
    pub campaign_id: String,
    pub activity_type: String,
    pub type_display: Option<String>,
    pub occurred_at: String,
    pub details: Option<String>,
    pub lead_email: Option<String>,
    pub lead_first_name: Option<String>,
    pub lead_last_name: Option<String>,
    pub hubspot_id: Option<String>,
    pub linkedin_url: Option<String>,
}

/// Per-campaign cache statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStats {
    pub leads: i64,
    pub activities: i64,
    pub leads_with_hubspot: i64,
    pub last_synced_at: Option<String>,
}

/// Immutable snapshot of both scoring weight tables.
///
/// Loaded once at the start of a derivation run so a concurrent re-import
/// cannot change scoring mid-batch. Industry keys are lowercased on load.
#[derive(Debug, Clone, Default)]
pub struct ScoreTables {
    pub industry: HashMap<String, f64>,
    pub seniority: HashMap<String, f64>,
}

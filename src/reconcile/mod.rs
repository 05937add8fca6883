//! Note reconciliation against the HubSpot activity narrative.
//!
//! Lemlist writes one note per activity into HubSpot; retries and re-syncs on
//! that side produce duplicates. The reconciler parses the notes, groups
//! exact duplicates for cleanup, and diffs the note-derived events against
//! the local cache for drift diagnostics. Notes are never an authoritative
//! source — the drift report is read-only.

pub mod parser;

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::api::hubspot::{HubSpotApi, MAX_BATCH};
use crate::api::ApiError;
use crate::db::{Store, StoreError};
use crate::error::EngineError;
use crate::sync::ProgressFn;

use parser::{CompositeParser, NoteParser, ParsedNote};

/// A HubSpot note with its owning-lead context and parse result.
#[derive(Debug, Clone)]
pub struct ContactNote {
    pub note_id: String,
    pub contact_id: String,
    pub lead_email: String,
    pub created_at: String,
    /// None for foreign notes (not written by the outreach integration).
    pub parsed: Option<ParsedNote>,
}

/// Which member of a duplicate group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepPolicy {
    Newest,
    Oldest,
}

/// Outcome of a batched duplicate deletion.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub requested: usize,
    pub deleted: usize,
    pub failed: usize,
    pub failed_ids: Vec<String>,
}

/// (email lowercased, activity type, campaign name)
pub type EventKey = (String, String, String);

/// Symmetric difference between note-derived events and cached activities.
/// Diagnostic only; nothing acts on it automatically.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub matched: usize,
    pub notes_only: Vec<EventKey>,
    pub store_only: Vec<EventKey>,
}

pub struct Reconciler<'a, C: HubSpotApi> {
    store: &'a Store,
    hubspot: &'a C,
    parser: CompositeParser,
}

impl<'a, C: HubSpotApi> Reconciler<'a, C> {
    pub fn new(store: &'a Store, hubspot: &'a C) -> Self {
        Self {
            store,
            hubspot,
            parser: CompositeParser::default(),
        }
    }

    /// Use a different parser stack (e.g. with additional note formats).
    pub fn with_parser(store: &'a Store, hubspot: &'a C, parser: CompositeParser) -> Self {
        Self {
            store,
            hubspot,
            parser,
        }
    }

    /// Fetch and parse every note attached to the campaign's enriched leads.
    /// Per-lead fetch failures are logged and skipped; bad credentials and
    /// exhausted rate limits abort.
    pub async fn fetch_notes(
        &self,
        campaign_id: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<ContactNote>, EngineError> {
        let leads = self.store.leads_with_hubspot_ids(campaign_id)?;
        let total = leads.len();
        let mut notes = Vec::new();

        for (i, lead) in leads.iter().enumerate() {
            let Some(contact_id) = lead.hubspot_id.as_deref() else {
                continue;
            };
            let email = lead.email.clone().unwrap_or_default();

            match self.hubspot.fetch_notes_for_contact(contact_id).await {
                Ok(contact_notes) => {
                    for note in contact_notes {
                        notes.push(ContactNote {
                            parsed: self.parser.parse(&note.body),
                            note_id: note.id,
                            contact_id: contact_id.to_string(),
                            lead_email: email.clone(),
                            created_at: note.created_at,
                        });
                    }
                }
                Err(e @ (ApiError::Unauthorized | ApiError::RateLimited { .. })) => {
                    return Err(e.into());
                }
                Err(e) => {
                    log::warn!("Failed to fetch notes for {}: {}", email, e);
                }
            }

            if let Some(progress) = progress {
                progress(i + 1, total);
            }
        }

        log::info!(
            "Fetched {} notes ({} recognized) across {} leads",
            notes.len(),
            notes.iter().filter(|n| n.parsed.is_some()).count(),
            total
        );
        Ok(notes)
    }

    /// Group duplicate notes.
    ///
    /// The key is (contact, activity type, campaign, step) — the free-text
    /// message body is deliberately NOT part of it, since retried sends carry
    /// differing personalization for the same underlying event. Foreign notes
    /// never group. Groups come back sorted newest-first.
    pub fn find_duplicates(&self, notes: &[ContactNote]) -> Vec<Vec<ContactNote>> {
        let mut groups: HashMap<(String, String, String, u32), Vec<ContactNote>> = HashMap::new();

        for note in notes {
            let Some(parsed) = &note.parsed else {
                continue;
            };
            groups
                .entry((
                    note.contact_id.clone(),
                    parsed.activity_type.clone(),
                    parsed.campaign.clone(),
                    parsed.step,
                ))
                .or_default()
                .push(note.clone());
        }

        let mut duplicates: Vec<Vec<ContactNote>> = groups
            .into_values()
            .filter(|group| group.len() > 1)
            .collect();
        for group in &mut duplicates {
            group.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        // Deterministic report order.
        duplicates.sort_by(|a, b| a[0].note_id.cmp(&b[0].note_id));

        log::info!("Found {} duplicate note groups", duplicates.len());
        duplicates
    }

    /// Delete all but one member of each duplicate group, batched at the
    /// provider limit. A failed batch is recorded (count and ids) and the
    /// operation continues with the next batch.
    pub async fn delete_duplicates(
        &self,
        duplicates: &[Vec<ContactNote>],
        keep: KeepPolicy,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<DeleteReport, EngineError> {
        let mut to_delete = Vec::new();
        for group in duplicates {
            // Groups arrive newest-first from find_duplicates.
            let survivor_index = match keep {
                KeepPolicy::Newest => 0,
                KeepPolicy::Oldest => group.len() - 1,
            };
            for (i, note) in group.iter().enumerate() {
                if i != survivor_index {
                    to_delete.push(note.note_id.clone());
                }
            }
        }

        let mut report = DeleteReport {
            requested: to_delete.len(),
            ..Default::default()
        };

        let total = to_delete.len();
        let mut done = 0;
        for chunk in to_delete.chunks(MAX_BATCH) {
            match self.hubspot.batch_archive_notes(chunk).await {
                Ok(()) => report.deleted += chunk.len(),
                Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
                Err(e) => {
                    log::error!("Failed to archive a batch of {} notes: {}", chunk.len(), e);
                    report.failed += chunk.len();
                    report.failed_ids.extend(chunk.iter().cloned());
                }
            }
            done += chunk.len();
            if let Some(progress) = progress {
                progress(done, total);
            }
        }

        log::info!(
            "Deleted {} duplicate notes, {} failed",
            report.deleted,
            report.failed
        );
        Ok(report)
    }

    /// Diff note-derived events against the cached activities of a campaign.
    pub fn drift_report(
        &self,
        notes: &[ContactNote],
        campaign_id: &str,
    ) -> Result<DriftReport, StoreError> {
        let campaign_name = self
            .store
            .get_campaign(campaign_id)?
            .map(|c| c.name)
            .unwrap_or_default();

        let note_keys: BTreeSet<EventKey> = notes
            .iter()
            .filter_map(|note| {
                note.parsed.as_ref().map(|parsed| {
                    (
                        note.lead_email.to_lowercase(),
                        parsed.activity_type.clone(),
                        parsed.campaign.clone(),
                    )
                })
            })
            .collect();

        let store_keys: BTreeSet<EventKey> = self
            .store
            .activities_for_campaign(campaign_id)?
            .into_iter()
            .filter_map(|activity| {
                activity.lead_email.map(|email| {
                    (
                        email.to_lowercase(),
                        activity.activity_type,
                        campaign_name.clone(),
                    )
                })
            })
            .collect();

        Ok(DriftReport {
            matched: note_keys.intersection(&store_keys).count(),
            notes_only: note_keys.difference(&store_keys).cloned().collect(),
            store_only: store_keys.difference(&note_keys).cloned().collect(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Derivation engine: computes scoring properties from the cache and pushes
//! them back to HubSpot.
//!
//! Write-back goes out in fixed-size batches (provider max 100 records). A
//! batch that fails with a missing-record error degrades to per-contact
//! retries so the healthy records still land; any other batch error fails
//! only that batch's records. Property maps never carry literal nulls — an
//! unknown value means the key is omitted.

pub mod engagement;
pub mod fit;
pub mod seniority;

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::hubspot::{ContactUpdate, CrmContact, HubSpotApi, MAX_BATCH};
use crate::api::ApiError;
use crate::config::HubSpotConfig;
use crate::db::Store;
use crate::error::EngineError;
use crate::sync::ProgressFn;

use engagement::EngagementSummary;
use fit::FitMisses;

/// Per-unit-of-work outcome counts for a write-back run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Fit write-back outcome, including the three could-not-compute counters.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitPushReport {
    #[serde(flatten)]
    pub push: PushReport,
    pub misses: FitMisses,
}

#[derive(Debug, Clone)]
pub struct DeriveOptions {
    /// Records per batch write, clamped to the provider max.
    pub batch_size: usize,
    /// Delay between batch writes (batch endpoints allow 4 req/s).
    pub batch_delay: Duration,
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_delay: Duration::from_millis(250),
        }
    }
}

impl From<&HubSpotConfig> for DeriveOptions {
    fn from(config: &HubSpotConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: config.batch_delay,
        }
    }
}

/// Build the engagement property map. Unknown values are omitted, never null.
fn engagement_properties(summary: &EngagementSummary) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "lemlist_engagement_score".to_string(),
        Value::from(summary.score),
    );
    properties.insert(
        "lemlist_engagement_status".to_string(),
        Value::from(summary.status),
    );
    properties.insert(
        "lemlist_total_activities".to_string(),
        Value::from(summary.total_activities as i64),
    );
    if let Some(last) = &summary.last_activity_at {
        properties.insert(
            "lemlist_last_activity_at".to_string(),
            Value::from(last.clone()),
        );
    }
    properties
}

pub struct DerivationEngine<'a, C: HubSpotApi> {
    store: &'a Store,
    hubspot: &'a C,
    options: DeriveOptions,
}

impl<'a, C: HubSpotApi> DerivationEngine<'a, C> {
    pub fn new(store: &'a Store, hubspot: &'a C, options: DeriveOptions) -> Self {
        let batch_size = options.batch_size.clamp(1, MAX_BATCH);
        Self {
            store,
            hubspot,
            options: DeriveOptions {
                batch_size,
                ..options
            },
        }
    }

    /// Compute engagement for every enriched lead of a campaign and push the
    /// results. Engagement reads the person's activities across ALL campaigns
    /// even though the lead set is campaign-scoped.
    pub async fn push_engagement(
        &self,
        campaign_id: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<PushReport, EngineError> {
        let leads = self.store.leads_with_hubspot_ids(campaign_id)?;
        let total = leads.len();
        let mut report = PushReport::default();
        let now = Utc::now();

        for chunk in leads.chunks(self.options.batch_size) {
            let mut updates = Vec::with_capacity(chunk.len());
            for lead in chunk {
                let Some(hubspot_id) = lead.hubspot_id.clone() else {
                    continue;
                };
                let Some(email) = lead.email.as_deref() else {
                    report.skipped += 1;
                    continue;
                };
                let activities = self.store.activities_for_email(email)?;
                if activities.is_empty() {
                    report.skipped += 1;
                    continue;
                }
                let summary = engagement::summarize(&activities, now);
                updates.push(ContactUpdate {
                    id: hubspot_id,
                    properties: engagement_properties(&summary),
                });
            }

            self.push_batch(updates, &mut report).await?;
            report.processed += chunk.len();
            if let Some(progress) = progress {
                progress(report.processed, total);
            }
            if report.processed < total {
                tokio::time::sleep(self.options.batch_delay).await;
            }
        }

        log::info!(
            "Engagement push for {}: {} ok, {} failed, {} skipped of {}",
            campaign_id,
            report.success,
            report.failed,
            report.skipped,
            report.processed
        );
        Ok(report)
    }

    /// Compute both fit dimensions for every CRM contact and push them.
    ///
    /// Industry comes from the contact's first associated company; seniority
    /// from the title cascade. Uncomputable dimensions score zero and are
    /// tallied per reason in the report.
    pub async fn push_fit(
        &self,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<FitPushReport, EngineError> {
        let tables = self.store.load_score_tables()?;
        let contacts = self.hubspot.fetch_contacts_with_companies(&["jobtitle"]).await?;

        let company_ids: Vec<String> = contacts
            .iter()
            .filter_map(|c| c.company_ids.first().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let companies = self
            .hubspot
            .batch_fetch_companies(&company_ids, &["industry"])
            .await?;

        let total = contacts.len();
        let mut report = FitPushReport::default();

        for chunk in contacts.chunks(self.options.batch_size) {
            let mut updates = Vec::with_capacity(chunk.len());
            for contact in chunk {
                updates.push(ContactUpdate {
                    id: contact.id.clone(),
                    properties: self.fit_properties(contact, &companies, &tables, &mut report.misses),
                });
            }

            self.push_batch(updates, &mut report.push).await?;
            report.push.processed += chunk.len();
            if let Some(progress) = progress {
                progress(report.push.processed, total);
            }
            if report.push.processed < total {
                tokio::time::sleep(self.options.batch_delay).await;
            }
        }

        log::info!(
            "Fit push: {} ok, {} failed of {} ({} no company, {} unmapped industry, {} unset seniority)",
            report.push.success,
            report.push.failed,
            report.push.processed,
            report.misses.missing_company,
            report.misses.unmapped_industry,
            report.misses.unset_seniority
        );
        Ok(report)
    }

    fn fit_properties(
        &self,
        contact: &CrmContact,
        companies: &std::collections::HashMap<String, crate::api::hubspot::CrmCompany>,
        tables: &crate::db::ScoreTables,
        misses: &mut FitMisses,
    ) -> Map<String, Value> {
        // None: no associated company. Some(""): company without an industry.
        let industry = contact.company_ids.first().map(|company_id| {
            companies
                .get(company_id)
                .and_then(|c| c.prop("industry"))
                .unwrap_or("")
        });
        let title = contact.prop("jobtitle");

        let scores = fit::fit_scores(tables, industry, title, misses);

        let mut properties = Map::new();
        properties.insert(
            "industry_fit_score".to_string(),
            Value::from(scores.industry_score),
        );
        properties.insert(
            "seniority_fit_score".to_string(),
            Value::from(scores.seniority_score),
        );
        if let Some(title) = title {
            properties.insert(
                "seniority_level".to_string(),
                Value::from(seniority::classify(title).as_str()),
            );
        }
        properties
    }

    /// Send one batch. Missing-record failures degrade to per-contact
    /// retries; bad credentials abort the run; anything else fails just this
    /// batch's records.
    async fn push_batch(
        &self,
        updates: Vec<ContactUpdate>,
        report: &mut PushReport,
    ) -> Result<(), EngineError> {
        if updates.is_empty() {
            return Ok(());
        }

        match self.hubspot.batch_update_contacts(&updates).await {
            Ok(()) => {
                report.success += updates.len();
            }
            Err(ApiError::NotFound) => {
                log::warn!(
                    "Batch update reported missing contacts, retrying {} records individually",
                    updates.len()
                );
                for update in &updates {
                    match self.hubspot.update_contact(&update.id, &update.properties).await {
                        Ok(()) => report.success += 1,
                        Err(ApiError::NotFound) => {
                            log::warn!("Contact {} not found in HubSpot", update.id);
                            report.failed += 1;
                        }
                        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
                        Err(e) => {
                            log::error!("Failed to update contact {}: {}", update.id, e);
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
            Err(e) => {
                log::error!("Batch update failed: {}", e);
                report.failed += updates.len();
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

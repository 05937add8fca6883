//! Campaign synchronization engine.
//!
//! Two modes per campaign, decided by the presence of a prior campaign row:
//! a first load pulls everything, an incremental pass re-reads the remote
//! collection (the API has no server-side delta filter) and persists only
//! activities newer than the stored watermark. All writes for one pass go
//! through a single transaction — a failed pass leaves the cache untouched.

use std::collections::HashSet;

use serde::Serialize;

use crate::api::lemlist::{LemlistApi, RemoteActivity, RemoteLeadDetail};
use crate::api::ApiError;
use crate::config::SyncTuning;
use crate::db::{ActivityRecord, Lead, LeadRecord, Store};
use crate::derive::seniority;
use crate::error::EngineError;

/// Activity types that carry no analytical signal and are dropped at ingest.
pub const FILTERED_ACTIVITY_TYPES: &[&str] = &["hasEmailAddress", "conditionChosen"];

/// Activity types collapsed to one event per (lead, template, step). Email
/// clients re-fire tracking pixels; only the first open is meaningful.
const DEDUPLICATED_ACTIVITY_TYPES: &[&str] = &["emailsOpened"];

/// Observational progress callback: monotonically increasing (current, total).
pub type ProgressFn<'a> = &'a dyn Fn(usize, usize);

// ============================================================================
// Activity shaping
// ============================================================================

/// Human-readable label for an activity type.
pub fn display_name(activity: &RemoteActivity) -> String {
    if activity.activity_type == "conditionChosen" {
        return activity
            .condition_label
            .clone()
            .unwrap_or_else(|| "Condition evaluated".to_string());
    }
    let label = match activity.activity_type.as_str() {
        "emailsSent" => "Email sent",
        "emailsOpened" => "Email opened",
        "emailsClicked" => "Email clicked",
        "emailsReplied" => "Email replied",
        "emailsBounced" => "Email bounced",
        "emailsFailed" => "Email failed",
        "emailsUnsubscribed" => "Unsubscribed",
        "linkedinVisitDone" => "LinkedIn profile visited",
        "linkedinSent" => "LinkedIn message sent",
        "linkedinOpened" => "LinkedIn message opened",
        "linkedinReplied" => "LinkedIn replied",
        "linkedinInviteDone" => "LinkedIn invite sent",
        "linkedinInviteAccepted" => "LinkedIn invite accepted",
        "aircallDone" => "Call done",
        "aircallAnswered" => "Call answered",
        "manualDone" => "Manual task done",
        "interested" => "Interested",
        "notInterested" => "Not interested",
        "outOfOffice" => "Out of office",
        "skipped" => "Skipped",
        other => return other.to_string(),
    };
    label.to_string()
}

/// Extract the most meaningful detail string from an activity payload.
pub fn activity_details(activity: &RemoteActivity) -> String {
    if activity.activity_type == "conditionChosen" {
        let label = activity.condition_label.as_deref().unwrap_or("unknown");
        return match activity.condition_value {
            Some(true) => format!("Condition: {} → met", label),
            Some(false) => format!("Condition: {} → not met", label),
            None => format!("Condition: {}", label),
        };
    }
    activity
        .subject
        .clone()
        .or_else(|| activity.url.clone())
        .or_else(|| activity.message.clone())
        .unwrap_or_default()
}

fn filter_noise(activities: Vec<RemoteActivity>) -> Vec<RemoteActivity> {
    activities
        .into_iter()
        .filter(|a| !FILTERED_ACTIVITY_TYPES.contains(&a.activity_type.as_str()))
        .collect()
}

/// Collapse repeated open events to the first per (lead, template, step).
fn collapse_duplicate_opens(activities: Vec<RemoteActivity>) -> Vec<RemoteActivity> {
    let mut seen = HashSet::new();
    activities
        .into_iter()
        .filter(|a| {
            if !DEDUPLICATED_ACTIVITY_TYPES.contains(&a.activity_type.as_str()) {
                return true;
            }
            seen.insert((
                a.lead_email.clone().unwrap_or_default(),
                a.email_template_id.clone().unwrap_or_default(),
                a.sequence_step.unwrap_or(-1),
            ))
        })
        .collect()
}

/// Extract the distinct leads referenced by a batch of activities.
///
/// Identity is the Lemlist lead id, not the email — the same email can
/// legitimately appear under two lead ids in two campaigns and must not be
/// merged.
fn extract_leads(activities: &[RemoteActivity]) -> Vec<LeadRecord> {
    let mut seen = HashSet::new();
    let mut leads = Vec::new();

    for activity in activities {
        let Some(lead_id) = activity.lead_id.as_deref() else {
            continue;
        };
        if !seen.insert(lead_id.to_string()) {
            continue;
        }
        leads.push(LeadRecord {
            lead_id: lead_id.to_string(),
            email: activity.lead_email.clone(),
            first_name: activity.lead_first_name.clone(),
            last_name: activity.lead_last_name.clone(),
            hubspot_id: activity.hubspot_lead_id.clone(),
            linkedin_url: activity.linkedin_url.clone(),
            company: activity.lead_company_name.clone(),
            department: None,
            job_title: activity.job_title.clone(),
            seniority: activity
                .job_title
                .as_deref()
                .map(|t| seniority::classify(t).as_str().to_string()),
        });
    }

    leads
}

/// Shape one remote activity into a storable record.
///
/// When the source omits an event id, the fallback key is
/// `lead:type:timestamp` — a best-effort dedup key, not a uniqueness
/// guarantee. Including the type means same-instant events of different types
/// never collide; two same-typed events at identical timestamp granularity
/// still would, and the raw payload is retained to diagnose that case.
fn activity_record(activity: &RemoteActivity) -> Option<ActivityRecord> {
    let lead_id = activity.lead_id.as_deref()?;
    let occurred_at = activity.created_at.as_deref()?;
    if activity.activity_type.is_empty() {
        return None;
    }

    let id = activity.id.clone().unwrap_or_else(|| {
        format!("{}:{}:{}", lead_id, activity.activity_type, occurred_at)
    });

    Some(ActivityRecord {
        id,
        lead_id: lead_id.to_string(),
        activity_type: activity.activity_type.clone(),
        type_display: display_name(activity),
        occurred_at: occurred_at.to_string(),
        details: activity_details(activity),
        raw_json: activity.raw.to_string(),
    })
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    FirstLoad,
    Incremental,
}

/// Result of one sync pass over a campaign.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub mode: SyncMode,
    pub activities_fetched: usize,
    pub activities_persisted: usize,
    pub leads_persisted: usize,
    pub enriched: usize,
}

/// Result of an enrichment pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichReport {
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
}

pub struct SyncEngine<'a, L: LemlistApi> {
    store: &'a Store,
    lemlist: &'a L,
    tuning: SyncTuning,
}

impl<'a, L: LemlistApi> SyncEngine<'a, L> {
    pub fn new(store: &'a Store, lemlist: &'a L, tuning: SyncTuning) -> Self {
        Self {
            store,
            lemlist,
            tuning,
        }
    }

    /// Run one sync pass for a campaign.
    ///
    /// First load (no prior campaign row, or `force_full`) pulls and persists
    /// everything, then runs the bounded enrichment pass. Incremental re-reads
    /// the full remote collection but persists only activities strictly newer
    /// than the watermark, and enriches only the leads those carried.
    pub async fn sync_campaign(
        &self,
        campaign_id: &str,
        name_hint: Option<&str>,
        status_hint: Option<&str>,
        force_full: bool,
    ) -> Result<SyncOutcome, EngineError> {
        let existing = self.store.get_campaign(campaign_id)?;
        let first_load = existing.is_none() || force_full;
        let mode = if first_load {
            SyncMode::FirstLoad
        } else {
            SyncMode::Incremental
        };

        log::info!(
            "Syncing campaign {} ({:?} mode)",
            campaign_id,
            mode
        );

        let fetched = self.lemlist.fetch_activities(campaign_id).await?;
        let activities_fetched = fetched.len();
        let mut activities = collapse_duplicate_opens(filter_noise(fetched));

        if !first_load {
            if let Some(watermark) = self.store.latest_activity_timestamp(campaign_id)? {
                // Timestamps are RFC 3339 UTC, so the string comparison is the
                // chronological one. Strictly greater: the watermark activity
                // itself is already persisted.
                activities.retain(|a| {
                    a.created_at
                        .as_deref()
                        .map(|t| t > watermark.as_str())
                        .unwrap_or(false)
                });
            }
        }

        let leads = extract_leads(&activities);
        let records: Vec<ActivityRecord> = activities.iter().filter_map(activity_record).collect();

        let name = name_hint
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|c| c.name.clone()))
            .unwrap_or_else(|| format!("Campaign {}", campaign_id));
        let status = status_hint
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|c| c.status.clone()))
            .unwrap_or_else(|| "unknown".to_string());

        self.store.with_transaction(|db| {
            db.upsert_campaign(campaign_id, &name, &status)?;
            db.upsert_leads(&leads, campaign_id)?;
            db.upsert_activities(&records, campaign_id)?;
            Ok(())
        })?;

        log::info!(
            "Campaign {}: {} activities fetched, {} persisted, {} leads",
            campaign_id,
            activities_fetched,
            records.len(),
            leads.len()
        );

        // Bounded synchronous enrichment. On a first load only the first
        // `enrichment_cap` leads get the detail look-up here; the rest wait
        // for `enrich_pending`. An incremental pass enriches every lead it
        // actually carried (there are few).
        let pending = if first_load {
            self.store
                .leads_missing_enrichment(campaign_id, self.tuning.enrichment_cap)?
        } else {
            let mut rows = Vec::new();
            for lead in &leads {
                if let Some(row) = self.store.get_lead(&lead.lead_id)? {
                    if row.hubspot_id.is_none() && row.email.is_some() {
                        rows.push(row);
                    }
                }
            }
            rows
        };
        let report = self.enrich_rows(&pending, None).await?;

        Ok(SyncOutcome {
            mode,
            activities_fetched,
            activities_persisted: records.len(),
            leads_persisted: leads.len(),
            enriched: report.success,
        })
    }

    /// Out-of-band batch enrichment: walk every lead still missing a HubSpot
    /// ID and fill in whatever the detail look-up returns. Individual
    /// failures are counted, not fatal; bad credentials and exhausted rate
    /// limits abort the job.
    pub async fn enrich_pending(
        &self,
        campaign_id: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<EnrichReport, EngineError> {
        let pending = self.store.leads_missing_enrichment(campaign_id, 10_000)?;
        self.enrich_rows(&pending, progress).await
    }

    /// On-demand refresh for a single lead — the degenerate case of the sync
    /// primitive used by interactive callers. Returns false when the lead is
    /// not cached for this campaign.
    pub async fn refresh_lead(
        &self,
        campaign_id: &str,
        email: &str,
    ) -> Result<bool, EngineError> {
        let Some(lead) = self.store.get_lead_by_email(email, campaign_id)? else {
            return Ok(false);
        };
        match self.lemlist.fetch_lead_detail(email).await? {
            Some(detail) => {
                self.apply_detail(&lead, &detail)?;
                Ok(true)
            }
            None => Ok(true),
        }
    }

    async fn enrich_rows(
        &self,
        rows: &[Lead],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<EnrichReport, EngineError> {
        let mut report = EnrichReport::default();
        let total = rows.len();

        for (i, lead) in rows.iter().enumerate() {
            let Some(email) = lead.email.as_deref() else {
                continue;
            };

            match self.lemlist.fetch_lead_detail(email).await {
                Ok(Some(detail)) => {
                    if detail.hubspot_lead_id.is_some() || detail.linkedin_url.is_some() {
                        report.success += 1;
                    }
                    self.apply_detail(lead, &detail)?;
                }
                Ok(None) => {}
                // Retrying per-lead cannot fix these two; surface them.
                Err(e @ (ApiError::Unauthorized | ApiError::RateLimited { .. })) => {
                    return Err(e.into());
                }
                Err(e) => {
                    log::warn!("Detail look-up failed for {}: {}", email, e);
                    report.failed += 1;
                }
            }

            report.processed += 1;
            if let Some(progress) = progress {
                progress(i + 1, total);
            }

            let last = i + 1 == total;
            if !last {
                tokio::time::sleep(self.tuning.detail_delay).await;
                if (i + 1) % self.tuning.batch_size == 0 {
                    tokio::time::sleep(self.tuning.batch_pause).await;
                }
            }
        }

        Ok(report)
    }

    fn apply_detail(&self, lead: &Lead, detail: &RemoteLeadDetail) -> Result<(), EngineError> {
        let seniority = detail
            .job_title
            .as_deref()
            .or(lead.job_title.as_deref())
            .map(|t| seniority::classify(t).as_str().to_string());

        self.store.update_lead_enrichment(
            &lead.lead_id,
            detail.hubspot_lead_id.as_deref(),
            detail.linkedin_url.as_deref(),
            detail.company_name.as_deref(),
            detail.department.as_deref(),
            detail.job_title.as_deref(),
            seniority.as_deref(),
        )?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::lemlist::RemoteCampaign;
    use crate::db::test_utils::test_db;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn remote_activity(
        id: Option<&str>,
        activity_type: &str,
        lead_id: &str,
        email: &str,
        created_at: &str,
    ) -> RemoteActivity {
        RemoteActivity {
            id: id.map(str::to_string),
            activity_type: activity_type.to_string(),
            lead_id: Some(lead_id.to_string()),
            lead_email: Some(email.to_string()),
            lead_first_name: Some("Ada".to_string()),
            created_at: Some(created_at.to_string()),
            raw: serde_json::json!({ "type": activity_type }),
            ..Default::default()
        }
    }

    struct MockLemlist {
        activities: Vec<RemoteActivity>,
        details: HashMap<String, RemoteLeadDetail>,
        detail_calls: AtomicUsize,
    }

    impl MockLemlist {
        fn new(activities: Vec<RemoteActivity>) -> Self {
            Self {
                activities,
                details: HashMap::new(),
                detail_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LemlistApi for MockLemlist {
        async fn fetch_campaigns(
            &self,
            _status: Option<&str>,
        ) -> Result<Vec<RemoteCampaign>, ApiError> {
            Ok(Vec::new())
        }

        async fn fetch_activities(
            &self,
            _campaign_id: &str,
        ) -> Result<Vec<RemoteActivity>, ApiError> {
            Ok(self.activities.clone())
        }

        async fn fetch_lead_detail(
            &self,
            email: &str,
        ) -> Result<Option<RemoteLeadDetail>, ApiError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.details.get(email).cloned())
        }
    }

    fn tuning_without_delays() -> SyncTuning {
        SyncTuning {
            enrichment_cap: 50,
            detail_delay: Duration::ZERO,
            batch_size: 50,
            batch_pause: Duration::ZERO,
        }
    }

    fn store_snapshot(store: &Store, campaign_id: &str) -> (usize, usize, Vec<String>) {
        let leads = store.leads_for_campaign(campaign_id).unwrap();
        let activities = store.activities_for_campaign(campaign_id).unwrap();
        let ids = activities.iter().map(|a| a.id.clone()).collect();
        (leads.len(), activities.len(), ids)
    }

    #[tokio::test]
    async fn test_first_load_twice_is_idempotent() {
        let db = test_db();
        let mock = MockLemlist::new(vec![
            remote_activity(Some("act_1"), "emailsSent", "lead_1", "ada@example.com", "2026-07-01T10:00:00+00:00"),
            remote_activity(Some("act_2"), "emailsOpened", "lead_1", "ada@example.com", "2026-07-01T11:00:00+00:00"),
            remote_activity(Some("act_3"), "emailsSent", "lead_2", "bob@example.com", "2026-07-01T12:00:00+00:00"),
        ]);
        let engine = SyncEngine::new(&db, &mock, tuning_without_delays());

        engine.sync_campaign("cmp_1", Some("Q3"), Some("running"), false).await.unwrap();
        let first = store_snapshot(&db, "cmp_1");

        let outcome = engine.sync_campaign("cmp_1", Some("Q3"), Some("running"), true).await.unwrap();
        assert_eq!(outcome.mode, SyncMode::FirstLoad);
        let second = store_snapshot(&db, "cmp_1");

        assert_eq!(first, second);
        assert_eq!(second.0, 2);
        assert_eq!(second.1, 3);
    }

    #[tokio::test]
    async fn test_incremental_persists_only_past_watermark() {
        let db = test_db();
        let mock = MockLemlist::new(vec![
            remote_activity(Some("act_1"), "emailsSent", "lead_1", "ada@example.com", "2026-07-01T10:00:00+00:00"),
            remote_activity(Some("act_2"), "emailsOpened", "lead_1", "ada@example.com", "2026-07-02T10:00:00+00:00"),
        ]);
        let engine = SyncEngine::new(&db, &mock, tuning_without_delays());
        engine.sync_campaign("cmp_1", None, None, false).await.unwrap();

        // Remote now has one genuinely new activity plus everything old.
        let mut activities = mock.activities.clone();
        activities.push(remote_activity(
            Some("act_3"),
            "emailsReplied",
            "lead_1",
            "ada@example.com",
            "2026-07-03T09:00:00+00:00",
        ));
        let mock2 = MockLemlist::new(activities);
        let engine2 = SyncEngine::new(&db, &mock2, tuning_without_delays());

        let outcome = engine2.sync_campaign("cmp_1", None, None, false).await.unwrap();
        assert_eq!(outcome.mode, SyncMode::Incremental);
        assert_eq!(outcome.activities_fetched, 3);
        assert_eq!(outcome.activities_persisted, 1);

        assert_eq!(
            db.latest_activity_timestamp("cmp_1").unwrap().as_deref(),
            Some("2026-07-03T09:00:00+00:00")
        );
    }

    #[tokio::test]
    async fn test_incremental_without_new_data_leaves_watermark() {
        let db = test_db();
        let mock = MockLemlist::new(vec![remote_activity(
            Some("act_1"),
            "emailsSent",
            "lead_1",
            "ada@example.com",
            "2026-07-01T10:00:00+00:00",
        )]);
        let engine = SyncEngine::new(&db, &mock, tuning_without_delays());

        engine.sync_campaign("cmp_1", None, None, false).await.unwrap();
        let before = db.latest_activity_timestamp("cmp_1").unwrap();

        let outcome = engine.sync_campaign("cmp_1", None, None, false).await.unwrap();
        assert_eq!(outcome.activities_persisted, 0);
        assert_eq!(db.latest_activity_timestamp("cmp_1").unwrap(), before);
    }

    #[tokio::test]
    async fn test_first_load_enrichment_respects_cap() {
        let db = test_db();
        let mut mock = MockLemlist::new(vec![
            remote_activity(Some("a1"), "emailsSent", "lead_1", "ada@example.com", "2026-07-01T10:00:00+00:00"),
            remote_activity(Some("a2"), "emailsSent", "lead_2", "bob@example.com", "2026-07-01T11:00:00+00:00"),
            remote_activity(Some("a3"), "emailsSent", "lead_3", "eve@example.com", "2026-07-01T12:00:00+00:00"),
        ]);
        mock.details.insert(
            "ada@example.com".to_string(),
            RemoteLeadDetail {
                hubspot_lead_id: Some("4711".to_string()),
                ..Default::default()
            },
        );

        let mut tuning = tuning_without_delays();
        tuning.enrichment_cap = 2;
        let engine = SyncEngine::new(&db, &mock, tuning);

        engine.sync_campaign("cmp_1", None, None, false).await.unwrap();

        assert_eq!(mock.detail_calls.load(Ordering::SeqCst), 2);
        let lead = db.get_lead("lead_1").unwrap().unwrap();
        assert_eq!(lead.hubspot_id.as_deref(), Some("4711"));
        // The third lead is left for the batch job.
        assert_eq!(db.leads_missing_enrichment("cmp_1", 100).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_enrich_pending_reports_and_progress() {
        let db = test_db();
        let mut mock = MockLemlist::new(vec![
            remote_activity(Some("a1"), "emailsSent", "lead_1", "ada@example.com", "2026-07-01T10:00:00+00:00"),
            remote_activity(Some("a2"), "emailsSent", "lead_2", "bob@example.com", "2026-07-01T11:00:00+00:00"),
        ]);
        mock.details.insert(
            "bob@example.com".to_string(),
            RemoteLeadDetail {
                linkedin_url: Some("https://linkedin.com/in/bob".to_string()),
                job_title: Some("Senior Team Lead".to_string()),
                ..Default::default()
            },
        );

        let mut tuning = tuning_without_delays();
        tuning.enrichment_cap = 0;
        let engine = SyncEngine::new(&db, &mock, tuning);
        engine.sync_campaign("cmp_1", None, None, false).await.unwrap();

        let seen = std::sync::Mutex::new(Vec::new());
        let progress = |current: usize, total: usize| {
            seen.lock().unwrap().push((current, total));
        };
        let report = engine.enrich_pending("cmp_1", Some(&progress)).await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.success, 1);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);

        let bob = db.get_lead("lead_2").unwrap().unwrap();
        assert_eq!(bob.job_title.as_deref(), Some("Senior Team Lead"));
        assert_eq!(bob.seniority.as_deref(), Some("manager"));
    }

    #[tokio::test]
    async fn test_enrichment_aborts_on_unauthorized() {
        struct UnauthorizedLemlist;

        #[async_trait]
        impl LemlistApi for UnauthorizedLemlist {
            async fn fetch_campaigns(
                &self,
                _status: Option<&str>,
            ) -> Result<Vec<RemoteCampaign>, ApiError> {
                Err(ApiError::Unauthorized)
            }
            async fn fetch_activities(
                &self,
                _campaign_id: &str,
            ) -> Result<Vec<RemoteActivity>, ApiError> {
                Err(ApiError::Unauthorized)
            }
            async fn fetch_lead_detail(
                &self,
                _email: &str,
            ) -> Result<Option<RemoteLeadDetail>, ApiError> {
                Err(ApiError::Unauthorized)
            }
        }

        let db = test_db();
        let seed = MockLemlist::new(vec![remote_activity(
            Some("a1"),
            "emailsSent",
            "lead_1",
            "ada@example.com",
            "2026-07-01T10:00:00+00:00",
        )]);
        let mut tuning = tuning_without_delays();
        tuning.enrichment_cap = 0;
        SyncEngine::new(&db, &seed, tuning.clone())
            .sync_campaign("cmp_1", None, None, false)
            .await
            .unwrap();

        let engine = SyncEngine::new(&db, &UnauthorizedLemlist, tuning);
        let result = engine.enrich_pending("cmp_1", None).await;
        assert!(matches!(
            result,
            Err(EngineError::Api(ApiError::Unauthorized))
        ));
    }

    #[test]
    fn test_collapse_duplicate_opens_keeps_first() {
        let open = |email: &str, template: &str, step: i64| RemoteActivity {
            activity_type: "emailsOpened".to_string(),
            lead_email: Some(email.to_string()),
            email_template_id: Some(template.to_string()),
            sequence_step: Some(step),
            ..Default::default()
        };

        let collapsed = collapse_duplicate_opens(vec![
            open("ada@example.com", "tpl_1", 1),
            open("ada@example.com", "tpl_1", 1),
            open("ada@example.com", "tpl_1", 2),
            open("bob@example.com", "tpl_1", 1),
        ]);
        assert_eq!(collapsed.len(), 3);
    }

    #[test]
    fn test_extract_leads_keyed_by_lead_id_not_email() {
        let activities = vec![
            remote_activity(Some("a1"), "emailsSent", "lead_1", "ada@example.com", "t1"),
            remote_activity(Some("a2"), "emailsOpened", "lead_1", "ada@example.com", "t2"),
            remote_activity(Some("a3"), "emailsSent", "lead_2", "ada@example.com", "t3"),
        ];
        let leads = extract_leads(&activities);
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].lead_id, "lead_1");
        assert_eq!(leads[1].lead_id, "lead_2");
    }

    #[test]
    fn test_activity_record_composite_fallback_id() {
        let activity = remote_activity(
            None,
            "emailsReplied",
            "lead_1",
            "ada@example.com",
            "2026-07-01T10:00:00+00:00",
        );
        let record = activity_record(&activity).unwrap();
        assert_eq!(record.id, "lead_1:emailsReplied:2026-07-01T10:00:00+00:00");
    }

    #[test]
    fn test_noise_types_filtered() {
        let filtered = filter_noise(vec![
            remote_activity(Some("a1"), "hasEmailAddress", "lead_1", "a@b.c", "t1"),
            remote_activity(Some("a2"), "conditionChosen", "lead_1", "a@b.c", "t2"),
            remote_activity(Some("a3"), "emailsSent", "lead_1", "a@b.c", "t3"),
        ]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].activity_type, "emailsSent");
    }
}

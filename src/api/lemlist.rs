//! Lemlist API client.
//!
//! Campaigns and activities are offset-paginated JSON arrays; lead detail is
//! a per-email lookup. Auth is HTTP Basic with an empty username and the API
//! key as password.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::config::LemlistConfig;

use super::pagination::fetch_offset_pages;
use super::{ApiError, Auth, RequestClient, RetryPolicy};

// ============================================================================
// Remote types
// ============================================================================

/// A campaign as returned by `/campaigns`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCampaign {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// An activity as returned by `/activities`.
///
/// Only the fields the engine reads are typed; the full payload is retained
/// in `raw` for the audit column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteActivity {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub lead_id: Option<String>,
    pub lead_email: Option<String>,
    pub lead_first_name: Option<String>,
    pub lead_last_name: Option<String>,
    pub lead_company_name: Option<String>,
    pub job_title: Option<String>,
    pub hubspot_lead_id: Option<String>,
    #[serde(alias = "linkedinPublicUrl", alias = "linkedinUrlSalesNav")]
    pub linkedin_url: Option<String>,
    pub created_at: Option<String>,
    pub email_template_id: Option<String>,
    pub sequence_step: Option<i64>,
    pub subject: Option<String>,
    pub url: Option<String>,
    pub message: Option<String>,
    pub condition_label: Option<String>,
    pub condition_value: Option<bool>,
    #[serde(skip)]
    pub raw: Value,
}

/// Lead detail as returned by `/leads/{email}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteLeadDetail {
    pub hubspot_lead_id: Option<String>,
    #[serde(alias = "linkedinPublicUrl", alias = "linkedin")]
    pub linkedin_url: Option<String>,
    pub company_name: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
}

// ============================================================================
// Trait seam
// ============================================================================

/// The Lemlist operations the sync engine depends on. The engine is generic
/// over this trait so tests can run against scripted fixtures.
#[async_trait]
pub trait LemlistApi {
    /// All campaigns, optionally filtered by status.
    async fn fetch_campaigns(&self, status: Option<&str>) -> Result<Vec<RemoteCampaign>, ApiError>;

    /// The complete activity collection for a campaign. The remote offers no
    /// server-side delta filter, so this is always a full read.
    async fn fetch_activities(&self, campaign_id: &str) -> Result<Vec<RemoteActivity>, ApiError>;

    /// Detail lookup for one lead by email. `Ok(None)` when unknown.
    async fn fetch_lead_detail(&self, email: &str) -> Result<Option<RemoteLeadDetail>, ApiError>;
}

// ============================================================================
// Client
// ============================================================================

pub struct LemlistClient {
    client: RequestClient,
    config: LemlistConfig,
}

impl LemlistClient {
    pub fn new(config: LemlistConfig) -> Result<Self, ApiError> {
        let client = RequestClient::new(
            &config.base_url,
            Auth::Basic(config.api_key.clone()),
            config.timeout,
            RetryPolicy {
                max_attempts: config.max_retries,
            },
            Some(config.rate_limit_threshold),
        )?;
        Ok(Self { client, config })
    }

    /// Check the API key with a one-item probe.
    pub async fn verify_token(&self) -> Result<bool, ApiError> {
        let query = [("limit", "1".to_string())];
        match self
            .client
            .execute(Method::GET, "/campaigns", &query, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(ApiError::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Lemlist endpoints return either an array or (rarely) a single object.
    fn into_items(value: Value) -> Vec<Value> {
        match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            other => vec![other],
        }
    }
}

fn parse_activity(value: Value) -> Option<RemoteActivity> {
    match serde_json::from_value::<RemoteActivity>(value.clone()) {
        Ok(mut activity) => {
            activity.raw = value;
            Some(activity)
        }
        Err(e) => {
            log::warn!("Skipping undecodable activity: {}", e);
            None
        }
    }
}

#[async_trait]
impl LemlistApi for LemlistClient {
    async fn fetch_campaigns(&self, status: Option<&str>) -> Result<Vec<RemoteCampaign>, ApiError> {
        let page_size = self.config.page_size;
        let items = fetch_offset_pages(page_size, self.config.page_delay, |offset| async move {
            let mut query = vec![
                ("limit", page_size.to_string()),
                ("offset", offset.to_string()),
            ];
            if let Some(status) = status {
                query.push(("status", status.to_string()));
            }
            let value = self
                .client
                .execute(Method::GET, "/campaigns", &query, None)
                .await?;
            Ok(Self::into_items(value))
        })
        .await?;

        let mut campaigns = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<RemoteCampaign>(item) {
                Ok(campaign) => campaigns.push(campaign),
                Err(e) => log::warn!("Skipping undecodable campaign: {}", e),
            }
        }
        Ok(campaigns)
    }

    async fn fetch_activities(&self, campaign_id: &str) -> Result<Vec<RemoteActivity>, ApiError> {
        let page_size = self.config.page_size;
        let items = fetch_offset_pages(page_size, self.config.page_delay, |offset| async move {
            let query = vec![
                ("campaignId", campaign_id.to_string()),
                ("limit", page_size.to_string()),
                ("offset", offset.to_string()),
            ];
            let value = self
                .client
                .execute(Method::GET, "/activities", &query, None)
                .await?;
            Ok(Self::into_items(value))
        })
        .await?;

        Ok(items.into_iter().filter_map(parse_activity).collect())
    }

    async fn fetch_lead_detail(&self, email: &str) -> Result<Option<RemoteLeadDetail>, ApiError> {
        let path = format!("/leads/{}", email);
        match self.client.execute(Method::GET, &path, &[], None).await {
            Ok(value) => {
                // The API wraps the lead in a single-element array.
                let first = match value {
                    Value::Array(mut items) if !items.is_empty() => items.remove(0),
                    Value::Array(_) | Value::Null => return Ok(None),
                    other => other,
                };
                Ok(Some(serde_json::from_value(first)?))
            }
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_deserialization_keeps_raw_payload() {
        let json = serde_json::json!({
            "_id": "act_42",
            "type": "emailsOpened",
            "leadId": "lead_7",
            "leadEmail": "Ada@Example.com",
            "leadFirstName": "Ada",
            "createdAt": "2026-07-01T10:00:00.000Z",
            "emailTemplateId": "tpl_1",
            "sequenceStep": 2,
            "customTrackingField": "kept-in-raw"
        });

        let activity = parse_activity(json.clone()).unwrap();
        assert_eq!(activity.id.as_deref(), Some("act_42"));
        assert_eq!(activity.activity_type, "emailsOpened");
        assert_eq!(activity.lead_id.as_deref(), Some("lead_7"));
        assert_eq!(activity.sequence_step, Some(2));
        assert_eq!(activity.raw["customTrackingField"], "kept-in-raw");
    }

    #[test]
    fn test_activity_missing_id_is_allowed() {
        let json = serde_json::json!({
            "type": "emailsSent",
            "leadId": "lead_1",
            "createdAt": "2026-07-01T10:00:00.000Z"
        });
        let activity = parse_activity(json).unwrap();
        assert!(activity.id.is_none());
    }

    #[test]
    fn test_lead_detail_linkedin_aliases() {
        let detail: RemoteLeadDetail = serde_json::from_value(serde_json::json!({
            "hubspotLeadId": "4711",
            "linkedinPublicUrl": "https://linkedin.com/in/ada"
        }))
        .unwrap();
        assert_eq!(detail.hubspot_lead_id.as_deref(), Some("4711"));
        assert_eq!(
            detail.linkedin_url.as_deref(),
            Some("https://linkedin.com/in/ada")
        );
    }

    #[test]
    fn test_campaign_deserialization() {
        let campaign: RemoteCampaign = serde_json::from_value(serde_json::json!({
            "_id": "cmp_1",
            "name": "Q3 Outbound",
            "status": "running"
        }))
        .unwrap();
        assert_eq!(campaign.id, "cmp_1");
        assert_eq!(campaign.status.as_deref(), Some("running"));
    }
}

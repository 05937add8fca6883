//! HubSpot CRM API client.
//!
//! Contacts and notes are cursor-paginated; companies and property updates go
//! through the batch endpoints (max 100 records per request, 4 requests per
//! second). Auth is a private-app Bearer token.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::HubSpotConfig;

use super::pagination::{fetch_cursor_pages, CursorPage};
use super::{ApiError, Auth, RequestClient, RetryPolicy};

/// Provider limit for every batch endpoint.
pub const MAX_BATCH: usize = 100;

// ============================================================================
// Remote types
// ============================================================================

/// A contact with its requested properties and associated company ids.
#[derive(Debug, Clone)]
pub struct CrmContact {
    pub id: String,
    pub properties: Map<String, Value>,
    pub company_ids: Vec<String>,
}

impl CrmContact {
    /// Read a string property, treating explicit nulls and empty strings as
    /// absent.
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A company with its requested properties.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmCompany {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl CrmCompany {
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A note attached to a contact.
#[derive(Debug, Clone)]
pub struct CrmNote {
    pub id: String,
    pub body: String,
    pub created_at: String,
}

/// One record of a batch property update. Property maps must omit unknown
/// values entirely — the batch endpoint rejects literal nulls.
#[derive(Debug, Clone, Serialize)]
pub struct ContactUpdate {
    pub id: String,
    pub properties: Map<String, Value>,
}

// ----------------------------------------------------------------------------
// Wire shapes
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<PagingNext>,
}

#[derive(Debug, Deserialize)]
struct PagingNext {
    after: String,
}

#[derive(Debug, Deserialize)]
struct ContactListResponse {
    #[serde(default)]
    results: Vec<RawContact>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct RawContact {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    associations: Option<RawAssociations>,
}

#[derive(Debug, Deserialize)]
struct RawAssociations {
    #[serde(default)]
    companies: Option<RawAssociationList>,
}

#[derive(Debug, Deserialize)]
struct RawAssociationList {
    #[serde(default)]
    results: Vec<RawAssociationRef>,
}

#[derive(Debug, Deserialize)]
struct RawAssociationRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CompanyBatchResponse {
    #[serde(default)]
    results: Vec<CrmCompany>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteAssociationResponse {
    #[serde(default)]
    results: Vec<NoteAssociationRef>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteAssociationRef {
    to_object_id: i64,
}

#[derive(Debug, Deserialize)]
struct RawNote {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

// ============================================================================
// Trait seam
// ============================================================================

/// The HubSpot operations the derivation engine and reconciler depend on.
#[async_trait]
pub trait HubSpotApi {
    /// Update properties on a single contact.
    async fn update_contact(
        &self,
        contact_id: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), ApiError>;

    /// Batch-update up to [`MAX_BATCH`] contacts in one request.
    async fn batch_update_contacts(&self, updates: &[ContactUpdate]) -> Result<(), ApiError>;

    /// Every contact with the given properties and its company associations.
    async fn fetch_contacts_with_companies(
        &self,
        properties: &[&str],
    ) -> Result<Vec<CrmContact>, ApiError>;

    /// Batch-read companies by id, chunked internally.
    async fn batch_fetch_companies(
        &self,
        company_ids: &[String],
        properties: &[&str],
    ) -> Result<HashMap<String, CrmCompany>, ApiError>;

    /// All notes associated with a contact. A contact without notes (or an
    /// unknown contact) yields an empty list.
    async fn fetch_notes_for_contact(&self, contact_id: &str) -> Result<Vec<CrmNote>, ApiError>;

    /// Archive up to [`MAX_BATCH`] notes in one request.
    async fn batch_archive_notes(&self, note_ids: &[String]) -> Result<(), ApiError>;
}

// ============================================================================
// Client
// ============================================================================

pub struct HubSpotClient {
    client: RequestClient,
    config: HubSpotConfig,
}

impl HubSpotClient {
    pub fn new(config: HubSpotConfig) -> Result<Self, ApiError> {
        let client = RequestClient::new(
            &config.base_url,
            Auth::Bearer(config.api_token.clone()),
            config.timeout,
            RetryPolicy {
                max_attempts: config.max_retries,
            },
            None,
        )?;
        Ok(Self { client, config })
    }

    /// Check the token with a one-item probe.
    pub async fn verify_token(&self) -> Result<bool, ApiError> {
        let query = [("limit", "1".to_string())];
        match self
            .client
            .execute(Method::GET, "/crm/v3/objects/contacts", &query, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(ApiError::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn fetch_note(&self, note_id: &str) -> Result<Option<CrmNote>, ApiError> {
        let path = format!("/crm/v3/objects/notes/{}", note_id);
        let query = [(
            "properties",
            "hs_note_body,hs_timestamp,hs_createdate".to_string(),
        )];
        match self.client.execute(Method::GET, &path, &query, None).await {
            Ok(value) => {
                let raw: RawNote = serde_json::from_value(value)?;
                let body = raw
                    .properties
                    .get("hs_note_body")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let created_at = raw
                    .properties
                    .get("hs_createdate")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(Some(CrmNote {
                    id: raw.id,
                    body,
                    created_at,
                }))
            }
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl HubSpotApi for HubSpotClient {
    async fn update_contact(
        &self,
        contact_id: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), ApiError> {
        let path = format!("/crm/v3/objects/contacts/{}", contact_id);
        let body = serde_json::json!({ "properties": properties });
        self.client
            .execute(Method::PATCH, &path, &[], Some(&body))
            .await?;
        Ok(())
    }

    async fn batch_update_contacts(&self, updates: &[ContactUpdate]) -> Result<(), ApiError> {
        if updates.is_empty() {
            return Ok(());
        }
        debug_assert!(updates.len() <= MAX_BATCH, "callers batch to MAX_BATCH");

        let body = serde_json::json!({ "inputs": updates });
        self.client
            .execute(
                Method::POST,
                "/crm/v3/objects/contacts/batch/update",
                &[],
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn fetch_contacts_with_companies(
        &self,
        properties: &[&str],
    ) -> Result<Vec<CrmContact>, ApiError> {
        let properties_param = properties.join(",");
        let page_size = self.config.page_size;

        let raw = fetch_cursor_pages(self.config.batch_delay, |after| {
            let properties_param = properties_param.clone();
            async move {
                let mut query = vec![
                    ("limit", page_size.to_string()),
                    ("properties", properties_param),
                    ("associations", "companies".to_string()),
                ];
                if let Some(after) = after {
                    query.push(("after", after));
                }
                let value = self
                    .client
                    .execute(Method::GET, "/crm/v3/objects/contacts", &query, None)
                    .await?;
                let page: ContactListResponse = serde_json::from_value(value)?;
                Ok(CursorPage {
                    items: page.results,
                    next: page.paging.and_then(|p| p.next).map(|n| n.after),
                })
            }
        })
        .await?;

        Ok(raw
            .into_iter()
            .map(|contact| {
                let company_ids = contact
                    .associations
                    .and_then(|a| a.companies)
                    .map(|c| c.results.into_iter().map(|r| r.id).collect())
                    .unwrap_or_default();
                CrmContact {
                    id: contact.id,
                    properties: contact.properties,
                    company_ids,
                }
            })
            .collect())
    }

    async fn batch_fetch_companies(
        &self,
        company_ids: &[String],
        properties: &[&str],
    ) -> Result<HashMap<String, CrmCompany>, ApiError> {
        let mut companies = HashMap::new();

        for chunk in company_ids.chunks(MAX_BATCH) {
            let body = serde_json::json!({
                "inputs": chunk.iter().map(|id| serde_json::json!({ "id": id })).collect::<Vec<_>>(),
                "properties": properties,
            });
            let value = self
                .client
                .execute(
                    Method::POST,
                    "/crm/v3/objects/companies/batch/read",
                    &[],
                    Some(&body),
                )
                .await?;
            let batch: CompanyBatchResponse = serde_json::from_value(value)?;
            for company in batch.results {
                companies.insert(company.id.clone(), company);
            }
        }

        Ok(companies)
    }

    async fn fetch_notes_for_contact(&self, contact_id: &str) -> Result<Vec<CrmNote>, ApiError> {
        let path = format!("/crm/v4/objects/contacts/{}/associations/notes", contact_id);

        let note_ids = match fetch_cursor_pages(self.config.batch_delay, |after| {
            let path = path.clone();
            async move {
                let mut query = vec![("limit", "100".to_string())];
                if let Some(after) = after {
                    query.push(("after", after));
                }
                let value = self.client.execute(Method::GET, &path, &query, None).await?;
                let page: NoteAssociationResponse = serde_json::from_value(value)?;
                Ok(CursorPage {
                    items: page
                        .results
                        .into_iter()
                        .map(|r| r.to_object_id.to_string())
                        .collect(),
                    next: page.paging.and_then(|p| p.next).map(|n| n.after),
                })
            }
        })
        .await
        {
            Ok(ids) => ids,
            // Unknown contact: no notes, not an error.
            Err(ApiError::NotFound) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut notes = Vec::with_capacity(note_ids.len());
        for note_id in &note_ids {
            if let Some(note) = self.fetch_note(note_id).await? {
                notes.push(note);
            }
        }
        Ok(notes)
    }

    async fn batch_archive_notes(&self, note_ids: &[String]) -> Result<(), ApiError> {
        if note_ids.is_empty() {
            return Ok(());
        }
        debug_assert!(note_ids.len() <= MAX_BATCH, "callers batch to MAX_BATCH");

        let body = serde_json::json!({
            "inputs": note_ids.iter().map(|id| serde_json::json!({ "id": id })).collect::<Vec<_>>(),
        });
        self.client
            .execute(
                Method::POST,
                "/crm/v3/objects/notes/batch/archive",
                &[],
                Some(&body),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_list_deserialization() {
        let json = serde_json::json!({
            "results": [
                {
                    "id": "101",
                    "properties": { "jobtitle": "VP Engineering", "email": "ada@example.com" },
                    "associations": {
                        "companies": { "results": [ { "id": "900", "type": "contact_to_company" } ] }
                    }
                },
                { "id": "102", "properties": {} }
            ],
            "paging": { "next": { "after": "cursor-2" } }
        });

        let page: ContactListResponse = serde_json::from_value(json).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].id, "101");
        assert_eq!(
            page.paging.and_then(|p| p.next).map(|n| n.after).as_deref(),
            Some("cursor-2")
        );
    }

    #[test]
    fn test_contact_prop_filters_empty_values() {
        let contact = CrmContact {
            id: "101".to_string(),
            properties: serde_json::from_value(serde_json::json!({
                "jobtitle": "VP Engineering",
                "company": "",
                "phone": null
            }))
            .unwrap(),
            company_ids: Vec::new(),
        };
        assert_eq!(contact.prop("jobtitle"), Some("VP Engineering"));
        assert_eq!(contact.prop("company"), None);
        assert_eq!(contact.prop("phone"), None);
        assert_eq!(contact.prop("missing"), None);
    }

    #[test]
    fn test_note_association_deserialization() {
        let json = serde_json::json!({
            "results": [ { "toObjectId": 5551, "associationTypes": [] } ]
        });
        let page: NoteAssociationResponse = serde_json::from_value(json).unwrap();
        assert_eq!(page.results[0].to_object_id, 5551);
        assert!(page.paging.is_none());
    }

    #[test]
    fn test_contact_update_serialization_omits_nothing_extra() {
        let mut properties = Map::new();
        properties.insert("lemlist_engagement_score".to_string(), Value::from(42));
        let update = ContactUpdate {
            id: "101".to_string(),
            properties,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["id"], "101");
        assert_eq!(json["properties"]["lemlist_engagement_score"], 42);
    }
}

use rusqlite::{params, OptionalExtension, Row};

use super::*;

impl Store {
    // =========================================================================
    // Activities
    // =========================================================================

    /// Insert or update a batch of activities for a campaign.
    ///
    /// The core fields (lead, campaign, type, timestamp) are immutable once
    /// written; only the display-derived columns are recomputed on conflict,
    /// which keeps the upsert idempotent.
    pub fn upsert_activities(
        &self,
        activities: &[ActivityRecord],
        campaign_id: &str,
    ) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO activities (
                id, lead_id, campaign_id, type, type_display,
                occurred_at, details, raw_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                type_display = excluded.type_display,
                details = excluded.details,
                raw_json = excluded.raw_json,
                synced_at = datetime('now')",
        )?;

        for activity in activities {
            stmt.execute(params![
                activity.id,
                activity.lead_id,
                campaign_id,
                activity.activity_type,
                activity.type_display,
                activity.occurred_at,
                activity.details,
                activity.raw_json,
            ])?;
        }
        Ok(())
    }

    /// The incremental-sync watermark: timestamp of the most recent activity
    /// persisted for this campaign, or None on an empty cache.
    pub fn latest_activity_timestamp(
        &self,
        campaign_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let latest: Option<String> = self
            .conn
            .query_row(
                "SELECT MAX(occurred_at) FROM activities WHERE campaign_id = ?1",
                params![campaign_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(latest)
    }

    fn map_activity_row(row: &Row) -> rusqlite::Result<Activity> {
        Ok(Activity {
            id: row.get(0)?,
            lead_id: row.get(1)?,
            campaign_id: row.get(2)?,
            activity_type: row.get(3)?,
            type_display: row.get(4)?,
            occurred_at: row.get(5)?,
            details: row.get(6)?,
            synced_at: row.get(7)?,
        })
    }

    /// All activities for a campaign, joined with the owning lead, oldest first.
    pub fn activities_for_campaign(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<ActivityWithLead>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.lead_id, a.campaign_id, a.type, a.type_display,
                    a.occurred_at, a.details,
                    l.email, l.first_name, l.last_name, l.hubspot_id, l.linkedin_url
             FROM activities a
             LEFT JOIN leads l ON a.lead_id = l.lead_id
             WHERE a.campaign_id = ?1
             ORDER BY a.occurred_at ASC",
        )?;
        let rows = stmt.query_map(params![campaign_id], |row| {
            Ok(ActivityWithLead {
                id: row.get(0)?,
                lead_id: row.get(1)?,
                campaign_id: row.get(2)?,
                activity_type: row.get(3)?,
                type_display: row.get(4)?,
                occurred_at: row.get(5)?,
                details: row.get(6)?,
                lead_email: row.get(7)?,
                lead_first_name: row.get(8)?,
                lead_last_name: row.get(9)?,
                hubspot_id: row.get(10)?,
                linkedin_url: row.get(11)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All activities for one lead, oldest first.
    pub fn activities_for_lead(&self, lead_id: &str) -> Result<Vec<Activity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lead_id, campaign_id, type, type_display,
                    occurred_at, details, synced_at
             FROM activities
             WHERE lead_id = ?1
             ORDER BY occurred_at ASC",
        )?;
        let rows = stmt.query_map(params![lead_id], Self::map_activity_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All activities for a person across every campaign, keyed by email.
    ///
    /// Engagement is a property of the person, not of one campaign, so this
    /// read path deliberately crosses the per-campaign boundary the sync
    /// engine otherwise respects.
    pub fn activities_for_email(&self, email: &str) -> Result<Vec<Activity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.lead_id, a.campaign_id, a.type, a.type_display,
                    a.occurred_at, a.details, a.synced_at
             FROM activities a
             JOIN leads l ON a.lead_id = l.lead_id
             WHERE l.email = LOWER(?1)
             ORDER BY a.occurred_at ASC",
        )?;
        let rows = stmt.query_map(params![email], Self::map_activity_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

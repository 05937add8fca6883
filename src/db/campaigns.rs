use rusqlite::{params, OptionalExtension};

use super::*;

impl Store {
    // =========================================================================
    // Campaigns
    // =========================================================================

    /// Insert or update a campaign. Name and status always reflect the latest
    /// sync; `last_synced_at` is stamped on every call.
    pub fn upsert_campaign(
        &self,
        campaign_id: &str,
        name: &str,
        status: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO campaigns (campaign_id, name, status, last_synced_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(campaign_id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                last_synced_at = excluded.last_synced_at",
            params![campaign_id, name, status, Self::now_iso()],
        )?;
        Ok(())
    }

    /// Get a campaign by ID.
    pub fn get_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT campaign_id, name, status, last_synced_at, created_at
                 FROM campaigns WHERE campaign_id = ?1",
                params![campaign_id],
                |row| {
                    Ok(Campaign {
                        campaign_id: row.get(0)?,
                        name: row.get(1)?,
                        status: row.get(2)?,
                        last_synced_at: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Cache statistics for a campaign: row counts and enrichment coverage.
    pub fn campaign_stats(&self, campaign_id: &str) -> Result<CampaignStats, StoreError> {
        let leads: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM leads WHERE campaign_id = ?1",
            params![campaign_id],
            |r| r.get(0),
        )?;
        let activities: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE campaign_id = ?1",
            params![campaign_id],
            |r| r.get(0),
        )?;
        let leads_with_hubspot: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM leads WHERE campaign_id = ?1 AND hubspot_id IS NOT NULL",
            params![campaign_id],
            |r| r.get(0),
        )?;
        let last_synced_at = self
            .get_campaign(campaign_id)?
            .and_then(|c| c.last_synced_at);

        Ok(CampaignStats {
            leads,
            activities,
            leads_with_hubspot,
            last_synced_at,
        })
    }
}

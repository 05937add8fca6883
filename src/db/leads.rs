use rusqlite::{params, OptionalExtension, Row};

use super::*;

impl Store {
    // =========================================================================
    // Leads
    // =========================================================================

    /// Insert or update a batch of leads for a campaign.
    ///
    /// Merge semantics are the contract that lets enrichment run out-of-band:
    /// display fields (email, first/last name) are overwritten by the latest
    /// write, while enrichment fields use `COALESCE(excluded.x, leads.x)` —
    /// first non-null wins, so a re-sync that carries no HubSpot ID can never
    /// clobber one fetched earlier.
    pub fn upsert_leads(&self, leads: &[LeadRecord], campaign_id: &str) -> Result<(), StoreError> {
        let now = Self::now_iso();
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO leads (
                lead_id, campaign_id, email, first_name, last_name,
                hubspot_id, linkedin_url, company, department, job_title,
                seniority, last_updated_at
             ) VALUES (?1, ?2, LOWER(?3), ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(lead_id) DO UPDATE SET
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                hubspot_id = COALESCE(excluded.hubspot_id, leads.hubspot_id),
                linkedin_url = COALESCE(excluded.linkedin_url, leads.linkedin_url),
                company = COALESCE(excluded.company, leads.company),
                department = COALESCE(excluded.department, leads.department),
                job_title = COALESCE(excluded.job_title, leads.job_title),
                seniority = COALESCE(excluded.seniority, leads.seniority),
                last_updated_at = excluded.last_updated_at",
        )?;

        for lead in leads {
            stmt.execute(params![
                lead.lead_id,
                campaign_id,
                lead.email,
                lead.first_name,
                lead.last_name,
                lead.hubspot_id,
                lead.linkedin_url,
                lead.company,
                lead.department,
                lead.job_title,
                lead.seniority,
                now,
            ])?;
        }
        Ok(())
    }

    /// Fill in enrichment fields for one lead. Only non-null arguments are
    /// written; existing values are preserved either way.
    #[allow(clippy::too_many_arguments)]
    pub fn update_lead_enrichment(
        &self,
        lead_id: &str,
        hubspot_id: Option<&str>,
        linkedin_url: Option<&str>,
        company: Option<&str>,
        department: Option<&str>,
        job_title: Option<&str>,
        seniority: Option<&str>,
    ) -> Result<(), StoreError> {
        if hubspot_id.is_none()
            && linkedin_url.is_none()
            && company.is_none()
            && department.is_none()
            && job_title.is_none()
            && seniority.is_none()
        {
            return Ok(());
        }

        self.conn.execute(
            "UPDATE leads
             SET hubspot_id = COALESCE(?1, hubspot_id),
                 linkedin_url = COALESCE(?2, linkedin_url),
                 company = COALESCE(?3, company),
                 department = COALESCE(?4, department),
                 job_title = COALESCE(?5, job_title),
                 seniority = COALESCE(?6, seniority),
                 last_updated_at = ?7
             WHERE lead_id = ?8",
            params![
                hubspot_id,
                linkedin_url,
                company,
                department,
                job_title,
                seniority,
                Self::now_iso(),
                lead_id,
            ],
        )?;
        Ok(())
    }

    fn map_lead_row(row: &Row) -> rusqlite::Result<Lead> {
        Ok(Lead {
            lead_id: row.get(0)?,
            campaign_id: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            hubspot_id: row.get(5)?,
            linkedin_url: row.get(6)?,
            company: row.get(7)?,
            department: row.get(8)?,
            job_title: row.get(9)?,
            seniority: row.get(10)?,
            last_updated_at: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    const LEAD_COLUMNS: &'static str = "lead_id, campaign_id, email, first_name, last_name, \
         hubspot_id, linkedin_url, company, department, job_title, seniority, \
         last_updated_at, created_at";

    /// Get a lead by its Lemlist identifier.
    pub fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>, StoreError> {
        let sql = format!("SELECT {} FROM leads WHERE lead_id = ?1", Self::LEAD_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![lead_id], Self::map_lead_row)
            .optional()?;
        Ok(row)
    }

    /// Look up a lead by email within one campaign (case-insensitive).
    pub fn get_lead_by_email(
        &self,
        email: &str,
        campaign_id: &str,
    ) -> Result<Option<Lead>, StoreError> {
        let sql = format!(
            "SELECT {} FROM leads WHERE email = LOWER(?1) AND campaign_id = ?2",
            Self::LEAD_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![email, campaign_id], Self::map_lead_row)
            .optional()?;
        Ok(row)
    }

    /// All leads for a campaign.
    pub fn leads_for_campaign(&self, campaign_id: &str) -> Result<Vec<Lead>, StoreError> {
        let sql = format!(
            "SELECT {} FROM leads WHERE campaign_id = ?1 ORDER BY lead_id",
            Self::LEAD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![campaign_id], Self::map_lead_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Leads still waiting on the detail look-up: no HubSpot ID yet, but an
    /// email to look up with. Feeds the out-of-band enrichment job.
    pub fn leads_missing_enrichment(
        &self,
        campaign_id: &str,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        let sql = format!(
            "SELECT {} FROM leads
             WHERE campaign_id = ?1 AND hubspot_id IS NULL AND email IS NOT NULL
             ORDER BY lead_id
             LIMIT ?2",
            Self::LEAD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![campaign_id, limit as i64], Self::map_lead_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Leads that can be written back to HubSpot.
    pub fn leads_with_hubspot_ids(&self, campaign_id: &str) -> Result<Vec<Lead>, StoreError> {
        let sql = format!(
            "SELECT {} FROM leads
             WHERE campaign_id = ?1 AND hubspot_id IS NOT NULL
             ORDER BY lead_id",
            Self::LEAD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![campaign_id], Self::map_lead_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

use rusqlite::params;

use super::*;

impl Store {
    // =========================================================================
    // Scoring weight tables
    // =========================================================================
    //
    // Both tables are owned by the external import job; the store only offers
    // replace-and-snapshot access. Derivation never reads them live — it takes
    // a `ScoreTables` snapshot up front so a mid-run import cannot split one
    // batch's scoring.

    /// Replace the industry → weight table wholesale.
    pub fn replace_industry_weights(&self, rows: &[(String, f64)]) -> Result<(), StoreError> {
        self.with_transaction(|db| {
            db.conn.execute("DELETE FROM industry_weights", [])?;
            let mut stmt = db
                .conn
                .prepare_cached("INSERT INTO industry_weights (industry, weight) VALUES (LOWER(?1), ?2)")?;
            for (industry, weight) in rows {
                stmt.execute(params![industry, weight])?;
            }
            Ok(())
        })
    }

    /// Replace the seniority-level → weight table wholesale.
    pub fn replace_seniority_weights(&self, rows: &[(String, f64)]) -> Result<(), StoreError> {
        self.with_transaction(|db| {
            db.conn.execute("DELETE FROM seniority_weights", [])?;
            let mut stmt = db
                .conn
                .prepare_cached("INSERT INTO seniority_weights (level, weight) VALUES (LOWER(?1), ?2)")?;
            for (level, weight) in rows {
                stmt.execute(params![level, weight])?;
            }
            Ok(())
        })
    }

    /// Load both weight tables into an immutable snapshot.
    pub fn load_score_tables(&self) -> Result<ScoreTables, StoreError> {
        let mut tables = ScoreTables::default();

        let mut stmt = self
            .conn
            .prepare("SELECT industry, weight FROM industry_weights")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (industry, weight) = row?;
            tables.industry.insert(industry, weight);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT level, weight FROM seniority_weights")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (level, weight) = row?;
            tables.seniority.insert(level, weight);
        }

        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;

    #[test]
    fn test_replace_and_snapshot_weights() {
        let db = test_db();
        db.replace_industry_weights(&[
            ("Software".to_string(), 10.0),
            ("Manufacturing".to_string(), 6.5),
        ])
        .unwrap();
        db.replace_seniority_weights(&[("owner".to_string(), 10.0), ("manager".to_string(), 6.0)])
            .unwrap();

        let tables = db.load_score_tables().unwrap();
        assert_eq!(tables.industry.get("software"), Some(&10.0));
        assert_eq!(tables.seniority.get("manager"), Some(&6.0));
    }

    #[test]
    fn test_replace_discards_previous_rows() {
        let db = test_db();
        db.replace_industry_weights(&[("Software".to_string(), 10.0)])
            .unwrap();
        db.replace_industry_weights(&[("Retail".to_string(), 3.0)])
            .unwrap();

        let tables = db.load_score_tables().unwrap();
        assert!(tables.industry.get("software").is_none());
        assert_eq!(tables.industry.get("retail"), Some(&3.0));
    }
}

//! Fit scoring from the imported weight tables.
//!
//! Two independent dimensions: an industry weight looked up through the
//! contact's associated company, and a seniority weight looked up through the
//! title cascade. A dimension that cannot be computed contributes zero rather
//! than failing the batch; the three distinct miss reasons are counted
//! separately so an import gap is distinguishable from sparse CRM data.

use serde::Serialize;

use crate::db::ScoreTables;

use super::seniority;

/// Counters for the three ways a fit dimension can be uncomputable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitMisses {
    /// Contact has no associated company.
    pub missing_company: usize,
    /// Company exists but its industry is absent or not in the weight table.
    pub unmapped_industry: usize,
    /// No title, or the classified level is not in the weight table.
    pub unset_seniority: usize,
}

/// Industry dimension.
///
/// `industry` is `None` when the contact has no associated company at all;
/// an empty string means the company exists but carries no industry — that
/// counts as unmapped, not missing.
pub fn industry_score(
    tables: &ScoreTables,
    industry: Option<&str>,
    misses: &mut FitMisses,
) -> f64 {
    let Some(industry) = industry else {
        misses.missing_company += 1;
        return 0.0;
    };
    let industry = industry.trim();
    if industry.is_empty() {
        misses.unmapped_industry += 1;
        return 0.0;
    }
    match tables.industry.get(&industry.to_lowercase()) {
        Some(weight) => *weight,
        None => {
            misses.unmapped_industry += 1;
            0.0
        }
    }
}

/// Seniority dimension via the title cascade.
pub fn seniority_score(tables: &ScoreTables, title: Option<&str>, misses: &mut FitMisses) -> f64 {
    let Some(title) = title.map(str::trim).filter(|s| !s.is_empty()) else {
        misses.unset_seniority += 1;
        return 0.0;
    };
    let level = seniority::classify(title);
    match tables.seniority.get(level.as_str()) {
        Some(weight) => *weight,
        None => {
            misses.unset_seniority += 1;
            0.0
        }
    }
}

/// Both fit dimensions for one contact.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitScores {
    pub industry_score: f64,
    pub seniority_score: f64,
}

pub fn fit_scores(
    tables: &ScoreTables,
    industry: Option<&str>,
    title: Option<&str>,
    misses: &mut FitMisses,
) -> FitScores {
    FitScores {
        industry_score: industry_score(tables, industry, misses),
        seniority_score: seniority_score(tables, title, misses),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> ScoreTables {
        let mut tables = ScoreTables::default();
        tables.industry.insert("software".to_string(), 10.0);
        tables.industry.insert("manufacturing".to_string(), 6.0);
        tables.seniority.insert("owner".to_string(), 10.0);
        tables.seniority.insert("manager".to_string(), 6.0);
        tables.seniority.insert("employee".to_string(), 1.0);
        tables
    }

    #[test]
    fn test_both_dimensions_computed() {
        let mut misses = FitMisses::default();
        let scores = fit_scores(
            &tables(),
            Some("SOFTWARE"),
            Some("Engineering Manager"),
            &mut misses,
        );
        assert_eq!(scores.industry_score, 10.0);
        assert_eq!(scores.seniority_score, 6.0);
        assert_eq!(misses, FitMisses::default());
    }

    #[test]
    fn test_missing_company_scores_zero_and_counts() {
        let mut misses = FitMisses::default();
        let scores = fit_scores(&tables(), None, Some("CEO"), &mut misses);
        assert_eq!(scores.industry_score, 0.0);
        assert_eq!(misses.missing_company, 1);
        assert_eq!(misses.unmapped_industry, 0);
    }

    #[test]
    fn test_unmapped_industry_counts_separately() {
        let mut misses = FitMisses::default();
        industry_score(&tables(), Some("Basket Weaving"), &mut misses);
        assert_eq!(misses.unmapped_industry, 1);
        assert_eq!(misses.missing_company, 0);
    }

    #[test]
    fn test_company_without_industry_is_unmapped_not_missing() {
        let mut misses = FitMisses::default();
        industry_score(&tables(), Some(""), &mut misses);
        assert_eq!(misses.unmapped_industry, 1);
        assert_eq!(misses.missing_company, 0);
    }

    #[test]
    fn test_unset_seniority_counts() {
        let mut misses = FitMisses::default();
        let score = seniority_score(&tables(), None, &mut misses);
        assert_eq!(score, 0.0);
        assert_eq!(misses.unset_seniority, 1);
    }

    #[test]
    fn test_unlisted_level_counts_as_unset() {
        // "VP Engineering" classifies as director, which the table lacks.
        let mut misses = FitMisses::default();
        let score = seniority_score(&tables(), Some("VP Engineering"), &mut misses);
        assert_eq!(score, 0.0);
        assert_eq!(misses.unset_seniority, 1);
    }

    #[test]
    fn test_one_contact_can_miss_on_both_dimensions() {
        let mut misses = FitMisses::default();
        let scores = fit_scores(&tables(), None, None, &mut misses);
        assert_eq!(scores.industry_score, 0.0);
        assert_eq!(scores.seniority_score, 0.0);
        assert_eq!(misses.missing_company, 1);
        assert_eq!(misses.unset_seniority, 1);
    }
}

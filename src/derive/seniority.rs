//! Seniority classification from free-text job titles.
//!
//! An ordered cascade of word-boundary pattern groups, most senior first.
//! The order is correctness-critical, not a tuning choice: "lead" appears in
//! plenty of senior-IC titles and "senior" in plenty of management titles, so
//! the first matching *group* must win. "Senior Team Lead" classifies as
//! manager because the manager group is checked before the senior-IC group.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seniority {
    Owner,
    Director,
    Manager,
    Senior,
    Employee,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Owner => "owner",
            Seniority::Director => "director",
            Seniority::Manager => "manager",
            Seniority::Senior => "senior",
            Seniority::Employee => "employee",
        }
    }
}

fn cascade() -> &'static [(Seniority, Regex)] {
    static CASCADE: OnceLock<Vec<(Seniority, Regex)>> = OnceLock::new();
    CASCADE.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("static seniority pattern");
        vec![
            (
                Seniority::Owner,
                compile(r"(?i)\b(owner|founder|co-?founder|ceo|cto|cfo|coo|cmo|chief|president|partner)\b"),
            ),
            (
                Seniority::Director,
                compile(r"(?i)\b(director|vp|vice\s+president|head)\b"),
            ),
            (
                Seniority::Manager,
                compile(r"(?i)\b(manager|lead|supervisor|teamlead)\b"),
            ),
            (
                Seniority::Senior,
                compile(r"(?i)\b(senior|sr|principal|staff)\b"),
            ),
        ]
    })
}

/// Classify a job title. Unmatched or empty titles default to `Employee`.
pub fn classify(title: &str) -> Seniority {
    let title = title.trim();
    if title.is_empty() {
        return Seniority::Employee;
    }
    for (level, pattern) in cascade() {
        if pattern.is_match(title) {
            return *level;
        }
    }
    Seniority::Employee
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_order_manager_beats_senior() {
        // The manager group must win even though "Senior" also matches —
        // a reversed cascade would misclassify this title.
        assert_eq!(classify("Senior Team Lead"), Seniority::Manager);
    }

    #[test]
    fn test_owner_group_beats_everything() {
        assert_eq!(classify("Founder & CEO"), Seniority::Owner);
        assert_eq!(classify("Co-Founder"), Seniority::Owner);
        assert_eq!(classify("Managing Partner"), Seniority::Owner);
    }

    #[test]
    fn test_director_group() {
        assert_eq!(classify("Director of Sales"), Seniority::Director);
        assert_eq!(classify("VP Engineering"), Seniority::Director);
        assert_eq!(classify("Head of Marketing"), Seniority::Director);
    }

    #[test]
    fn test_manager_group() {
        assert_eq!(classify("Engineering Manager"), Seniority::Manager);
        assert_eq!(classify("Tech Lead"), Seniority::Manager);
    }

    #[test]
    fn test_senior_ic_group() {
        assert_eq!(classify("Senior Software Engineer"), Seniority::Senior);
        assert_eq!(classify("Principal Consultant"), Seniority::Senior);
        assert_eq!(classify("Sr. Analyst"), Seniority::Senior);
    }

    #[test]
    fn test_default_is_employee() {
        assert_eq!(classify("Software Engineer"), Seniority::Employee);
        assert_eq!(classify(""), Seniority::Employee);
        assert_eq!(classify("   "), Seniority::Employee);
    }

    #[test]
    fn test_word_boundaries_prevent_substring_hits() {
        // "leader(ship)" contains "lead" only as a prefix of a longer word.
        assert_eq!(classify("Thought Leadership Fellow"), Seniority::Employee);
        // "vproduct" must not hit the vp pattern.
        assert_eq!(classify("Engineer, vproduct"), Seniority::Employee);
    }
}

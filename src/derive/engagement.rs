//! Engagement scoring over cached activities.
//!
//! The score is a clamped sum of fixed per-event-type weights across ALL of a
//! person's activities, cross-campaign — engagement belongs to the person,
//! not to one campaign. The status label layers recency on top, and a bounce
//! overrides everything: a bounced address is bounced no matter how much it
//! clicked before.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::Activity;

/// Score bounds. A raw sum outside the range reports the bound, never the sum.
pub const SCORE_MIN: i32 = 0;
pub const SCORE_MAX: i32 = 100;

/// Days within which activity still counts as recent for the "hot" label.
const RECENT_DAYS: i64 = 30;

/// Signed weight for one activity type. Unknown types are neutral.
pub fn event_weight(activity_type: &str) -> i32 {
    match activity_type {
        "emailsOpened" | "linkedinOpened" => 1,
        "emailsClicked" => 3,
        "emailsReplied" | "linkedinReplied" => 10,
        "linkedinInviteAccepted" => 8,
        "aircallAnswered" => 8,
        "interested" => 15,
        "emailsBounced" => -10,
        "emailsFailed" => -5,
        "emailsUnsubscribed" => -15,
        "notInterested" => -15,
        _ => 0,
    }
}

/// Derived engagement numbers for one person.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSummary {
    pub score: i32,
    pub status: &'static str,
    pub total_activities: usize,
    pub last_activity_at: Option<String>,
}

/// Compute the engagement summary for one person's full activity history.
pub fn summarize(activities: &[Activity], now: DateTime<Utc>) -> EngagementSummary {
    let raw: i32 = activities
        .iter()
        .map(|a| event_weight(&a.activity_type))
        .sum();
    let score = raw.clamp(SCORE_MIN, SCORE_MAX);

    let bounced = activities
        .iter()
        .any(|a| a.activity_type == "emailsBounced");

    let last_activity_at = activities
        .iter()
        .map(|a| a.occurred_at.as_str())
        .max()
        .map(str::to_string);

    let recent = last_activity_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|t| now - t <= Duration::days(RECENT_DAYS))
        .unwrap_or(false);

    let status = if bounced {
        "bounced"
    } else if score >= 40 && recent {
        "hot"
    } else if score >= 15 {
        "engaged"
    } else if score > 0 {
        "aware"
    } else {
        "cold"
    };

    EngagementSummary {
        score,
        status,
        total_activities: activities.len(),
        last_activity_at,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| {
            DateTime::parse_from_rfc3339(&format!("{}+00:00", value.trim_end_matches('Z')))
        })
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

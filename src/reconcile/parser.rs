//! Parsing of Lemlist-authored HubSpot notes.
//!
//! The Lemlist native integration writes notes in a fixed template:
//!
//! ```text
//! LinkedIn invite sent from campaign Q3_Outbound - (step 2)
//! Text: Hi Sebastian, ...
//! ```
//!
//! Parsing is a pure function behind the `NoteParser` trait; a note that does
//! not match is foreign (someone else's note), never an error. Additional
//! formats compose through `CompositeParser`, first match wins, without the
//! reconciler's dedup/compare logic knowing.

use std::sync::OnceLock;

use regex::Regex;

/// Structured contents of a recognized note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNote {
    /// The activity phrase as written, e.g. "LinkedIn invite sent".
    pub activity_phrase: String,
    /// The phrase mapped into the activity-type vocabulary; falls back to the
    /// raw phrase for unknown wordings.
    pub activity_type: String,
    pub campaign: String,
    pub step: u32,
    pub message: Option<String>,
}

pub trait NoteParser {
    fn parse(&self, body: &str) -> Option<ParsedNote>;
}

/// Note-phrase → activity-type vocabulary (matched case-insensitively).
const PHRASE_TYPE_MAP: &[(&str, &str)] = &[
    ("linkedin invite sent", "linkedinInviteDone"),
    ("linkedin profile visited", "linkedinVisitDone"),
    ("linkedin message sent", "linkedinSent"),
    ("linkedin message opened", "linkedinOpened"),
    ("linkedin invite accepted", "linkedinInviteAccepted"),
    ("linkedin replied", "linkedinReplied"),
    ("email sent", "emailsSent"),
    ("email opened", "emailsOpened"),
    ("email clicked", "emailsClicked"),
    ("email replied", "emailsReplied"),
    ("email bounced", "emailsBounced"),
    ("email failed", "emailsFailed"),
    ("call done", "aircallDone"),
    ("call answered", "aircallAnswered"),
    ("manual task done", "manualDone"),
    ("interested", "interested"),
    ("not interested", "notInterested"),
];

fn main_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)\s+from\s+campaign\s+(.+?)\s*-\s*\(step\s+(\d+)\)")
            .expect("static note pattern")
    })
}

fn text_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)Text:\s*(.+)").expect("static text pattern"))
}

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static tag pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Remove HTML tags and decode the entities the note editor emits.
fn strip_html(text: &str) -> String {
    let without_tags = tag_pattern().replace_all(text, "");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");
    whitespace_pattern()
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}

fn map_activity_type(phrase: &str) -> String {
    let lowered = phrase.to_lowercase();
    PHRASE_TYPE_MAP
        .iter()
        .find(|(p, _)| *p == lowered)
        .map(|(_, t)| t.to_string())
        .unwrap_or_else(|| phrase.to_string())
}

/// Parser for the standard Lemlist note template.
#[derive(Debug, Default)]
pub struct TemplateNoteParser;

impl NoteParser for TemplateNoteParser {
    fn parse(&self, body: &str) -> Option<ParsedNote> {
        if body.is_empty() {
            return None;
        }

        let clean = strip_html(body);
        let captures = main_pattern().captures(clean.trim())?;

        let activity_phrase = captures.get(1)?.as_str().trim().to_string();
        let campaign = captures.get(2)?.as_str().trim().to_string();
        let step: u32 = captures.get(3)?.as_str().parse().ok()?;

        let message = text_pattern()
            .captures(&clean)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty());

        Some(ParsedNote {
            activity_type: map_activity_type(&activity_phrase),
            activity_phrase,
            campaign,
            step,
            message,
        })
    }
}

/// Applies parsers in order; the first one that recognizes the note wins.
pub struct CompositeParser {
    parsers: Vec<Box<dyn NoteParser + Send + Sync>>,
}

impl CompositeParser {
    pub fn new(parsers: Vec<Box<dyn NoteParser + Send + Sync>>) -> Self {
        Self { parsers }
    }
}

impl Default for CompositeParser {
    fn default() -> Self {
        Self::new(vec![Box::new(TemplateNoteParser)])
    }
}

impl NoteParser for CompositeParser {
    fn parse(&self, body: &str) -> Option<ParsedNote> {
        self.parsers.iter().find_map(|p| p.parse(body))
    }
}

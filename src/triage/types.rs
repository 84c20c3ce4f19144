//! Shared types for the triage pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum length of a classification summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 60;

// ── Department ──────────────────────────────────────────────────────

/// Department an issue is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Web,
    Ai,
    Content,
    Commercial,
    Operations,
    General,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Ai => "ai",
            Self::Content => "content",
            Self::Commercial => "commercial",
            Self::Operations => "operations",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "ai" => Ok(Self::Ai),
            "content" => Ok(Self::Content),
            "commercial" => Ok(Self::Commercial),
            "operations" => Ok(Self::Operations),
            "general" => Ok(Self::General),
            other => Err(format!("unknown department: '{other}'")),
        }
    }
}

// ── Priority ────────────────────────────────────────────────────────

/// Issue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority: '{other}'")),
        }
    }
}

// ── Intent ──────────────────────────────────────────────────────────

/// Customer intent, as classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Support,
    Sales,
    Complaint,
    Inquiry,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Sales => "sales",
            Self::Complaint => "complaint",
            Self::Inquiry => "inquiry",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "support" => Ok(Self::Support),
            "sales" => Ok(Self::Sales),
            "complaint" => Ok(Self::Complaint),
            "inquiry" => Ok(Self::Inquiry),
            other => Err(format!("unknown intent: '{other}'")),
        }
    }
}

// ── Classification report ───────────────────────────────────────────

/// Structured classification of a customer message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// One-line summary, at most [`SUMMARY_MAX_CHARS`] characters.
    pub summary: String,
    pub department: Department,
    pub priority: Priority,
    pub intent: Intent,
    pub reasoning: String,
    /// Ordered extracted details, rendered into issue records and
    /// notification emails.
    pub technical_details: Vec<String>,
}

/// Truncate a summary to [`SUMMARY_MAX_CHARS`] characters (char-boundary safe).
pub fn truncate_summary(summary: &str) -> String {
    summary.chars().take(SUMMARY_MAX_CHARS).collect()
}

// ── Decision ────────────────────────────────────────────────────────

/// Per-turn decision outcome. Not persisted; the session history itself is
/// the only cross-turn state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Answer directly with the given text.
    Reply { text: String },
    /// Hand off to a human: classify, create an issue, assign.
    Escalate,
    /// The request is too vague; ask the given clarifying question.
    AskQuestion { text: String },
    /// An escalation is already open and this turn adds nothing new.
    Acknowledge { text: String },
}

impl Decision {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reply { .. } => "reply",
            Self::Escalate => "escalate",
            Self::AskQuestion { .. } => "ask_question",
            Self::Acknowledge { .. } => "acknowledge",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_roundtrip() {
        for dept in [
            Department::Web,
            Department::Ai,
            Department::Content,
            Department::Commercial,
            Department::Operations,
            Department::General,
        ] {
            assert_eq!(dept.as_str().parse::<Department>().unwrap(), dept);
        }
        assert!("finance".parse::<Department>().is_err());
    }

    #[test]
    fn priority_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" medium ".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn serde_uses_lowercase() {
        assert_eq!(
            serde_json::to_string(&Department::Commercial).unwrap(),
            "\"commercial\""
        );
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        assert_eq!(
            serde_json::from_str::<Intent>("\"complaint\"").unwrap(),
            Intent::Complaint
        );
    }

    #[test]
    fn summary_truncated_to_limit() {
        let long = "x".repeat(200);
        assert_eq!(truncate_summary(&long).chars().count(), SUMMARY_MAX_CHARS);
        assert_eq!(truncate_summary("short"), "short");
    }

    #[test]
    fn summary_truncation_respects_char_boundaries() {
        let long = "é".repeat(100);
        let truncated = truncate_summary(&long);
        assert_eq!(truncated.chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn decision_labels() {
        assert_eq!(Decision::Escalate.label(), "escalate");
        assert_eq!(Decision::Reply { text: "x".into() }.label(), "reply");
        assert_eq!(
            Decision::AskQuestion { text: "x".into() }.label(),
            "ask_question"
        );
        assert_eq!(
            Decision::Acknowledge { text: "x".into() }.label(),
            "acknowledge"
        );
    }
}

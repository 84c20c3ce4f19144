//! The triage pipeline: decision, classification, and orchestration.

pub mod classifier;
pub mod decision;
pub(crate) mod parse;
pub mod pipeline;
pub mod types;

pub use classifier::ClassificationEngine;
pub use decision::{DecisionEngine, HISTORY_WINDOW, REPLY_CONFIDENCE, RETRIEVAL_GATE};
pub use pipeline::{ChatAction, TriageOutcome, TriageService};
pub use types::{ClassificationReport, Decision, Department, Intent, Priority};

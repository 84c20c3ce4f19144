//! Per-turn triage orchestration.
//!
//! One turn: acquire the session lock, read history, append the user turn,
//! decide, and — on escalation — classify, assign, persist the issue, and
//! fire the best-effort notification. Exactly one assistant turn is appended
//! per incoming message, whatever the outcome.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::assignment::AssignmentEngine;
use crate::error::Error;
use crate::notify::Notifier;
use crate::sessions::SessionLocks;
use crate::store::traits::{Database, Employee, NewIssue, Role};
use crate::triage::classifier::ClassificationEngine;
use crate::triage::decision::DecisionEngine;
use crate::triage::types::{ClassificationReport, Decision};

/// Wire-level outcome of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Reply,
    Escalate,
}

impl ChatAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Escalate => "escalate",
        }
    }
}

/// Result of one triaged turn.
#[derive(Debug, Clone)]
pub struct TriageOutcome {
    pub action: ChatAction,
    pub text: String,
    pub report: Option<ClassificationReport>,
    pub issue_id: Option<i64>,
    pub assignee: Option<Employee>,
}

/// The triage pipeline, wired once at startup and shared across requests.
pub struct TriageService {
    db: Arc<dyn Database>,
    decision: DecisionEngine,
    classifier: ClassificationEngine,
    assignment: AssignmentEngine,
    notifier: Option<Arc<Notifier>>,
    locks: SessionLocks,
}

impl TriageService {
    pub fn new(
        db: Arc<dyn Database>,
        decision: DecisionEngine,
        classifier: ClassificationEngine,
        assignment: AssignmentEngine,
        notifier: Option<Arc<Notifier>>,
    ) -> Self {
        Self {
            db,
            decision,
            classifier,
            assignment,
            notifier,
            locks: SessionLocks::new(),
        }
    }

    /// Process one customer message.
    ///
    /// History errors are fatal for the request (ordering is a hard
    /// invariant); everything downstream of the decision degrades gracefully
    /// inside the engines instead.
    pub async fn handle_message(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<TriageOutcome, Error> {
        let _guard = self.locks.acquire(session_id).await;

        let history = self.db.list_chat_turns(session_id).await?;
        self.db
            .append_chat_turn(session_id, Role::User, message)
            .await?;

        let decision = self.decision.decide(message, &history).await;
        info!(
            session_id = session_id,
            decision = decision.label(),
            "Turn decided"
        );

        let outcome = match decision {
            Decision::Reply { text } => TriageOutcome {
                action: ChatAction::Reply,
                text,
                report: None,
                issue_id: None,
                assignee: None,
            },
            Decision::AskQuestion { text } | Decision::Acknowledge { text } => TriageOutcome {
                action: ChatAction::Reply,
                text,
                report: None,
                issue_id: None,
                assignee: None,
            },
            Decision::Escalate => self.escalate(message).await?,
        };

        self.db
            .append_chat_turn(session_id, Role::Assistant, &outcome.text)
            .await?;

        Ok(outcome)
    }

    /// Classification, assignment, issue creation, and notification for an
    /// escalated turn.
    async fn escalate(&self, message: &str) -> Result<TriageOutcome, Error> {
        let report = self.classifier.classify(message).await;

        let roster = self
            .db
            .active_employees_by_department(report.department)
            .await?;
        let assignee = self
            .assignment
            .assign(&roster, report.department, report.priority);

        let issue_id = self
            .db
            .insert_issue(&NewIssue {
                description: report.summary.clone(),
                department: report.department,
                priority: report.priority,
                assigned_to: assignee.as_ref().map(|e| e.id),
                ai_summary: report.technical_details.join("\n"),
            })
            .await?;

        info!(
            issue_id = issue_id,
            department = %report.department,
            priority = %report.priority,
            assignee = assignee.as_ref().map(|e| e.name.as_str()).unwrap_or("unassigned"),
            "Issue escalated"
        );

        if let (Some(notifier), Some(assignee)) = (self.notifier.clone(), assignee.clone()) {
            let report = report.clone();
            let email = assignee.email.clone();
            // Best-effort: the triage response never waits on SMTP.
            tokio::task::spawn_blocking(move || {
                if let Err(e) = notifier.send_escalation(&email, &report) {
                    warn!(error = %e, to = %email, "Notification delivery failed");
                }
            });
        } else if assignee.is_none() {
            warn!(
                department = %report.department,
                "No eligible employee; issue created unassigned"
            );
        }

        let text = format!(
            "I have collected the necessary details. I am forwarding this to our {} team.",
            report.department
        );

        Ok(TriageOutcome {
            action: ChatAction::Escalate,
            text,
            report: Some(report),
            issue_id: Some(issue_id),
            assignee,
        })
    }

    /// Read-only issue listing for the API layer.
    pub async fn list_issues(&self) -> Result<Vec<crate::store::traits::Issue>, Error> {
        Ok(self.db.list_issues().await?)
    }

    /// Read-only issue lookup for the API layer.
    pub async fn get_issue(
        &self,
        id: i64,
    ) -> Result<Option<crate::store::traits::Issue>, Error> {
        match self.db.get_issue(id).await {
            Ok(issue) => Ok(issue),
            Err(e) => {
                error!(error = %e, issue_id = id, "Issue lookup failed");
                Err(e.into())
            }
        }
    }
}

//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::triage::types::{Department, Priority};

// ── Chat turns ──────────────────────────────────────────────────────

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of a chat session. Append-only; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ── Employees ───────────────────────────────────────────────────────

/// Staff seniority level, used by assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Junior,
    Senior,
    Manager,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Senior => "senior",
            Self::Manager => "manager",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "senior" => Self::Senior,
            "manager" => Self::Manager,
            _ => Self::Junior,
        }
    }
}

/// An employee from the roster. Read-only from the pipeline's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub department: Department,
    pub role: StaffRole,
    pub is_active: bool,
}

// ── Issues ──────────────────────────────────────────────────────────

/// A persisted escalation issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub description: String,
    pub department: Department,
    pub priority: Priority,
    pub status: String,
    pub assigned_to: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub ai_summary: String,
}

/// Fields for creating an issue. Status is always "open" at creation.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub description: String,
    pub department: Department,
    pub priority: Priority,
    pub assigned_to: Option<i64>,
    pub ai_summary: String,
}

// ── Database trait ──────────────────────────────────────────────────

/// Backend-agnostic database trait covering chat turns, employees, and issues.
#[async_trait]
pub trait Database: Send + Sync {
    /// Append one turn to a session's history.
    async fn append_chat_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), DatabaseError>;

    /// Full history for a session, in append order.
    async fn list_chat_turns(&self, session_id: &str) -> Result<Vec<ChatTurn>, DatabaseError>;

    /// Active employees of a department.
    async fn active_employees_by_department(
        &self,
        department: Department,
    ) -> Result<Vec<Employee>, DatabaseError>;

    /// Insert an employee; returns the generated id.
    async fn insert_employee(
        &self,
        name: &str,
        email: &str,
        department: Department,
        role: StaffRole,
        is_active: bool,
    ) -> Result<i64, DatabaseError>;

    /// Total employee count (used by startup seeding).
    async fn count_employees(&self) -> Result<u64, DatabaseError>;

    /// Create an escalation issue; returns the generated id.
    async fn insert_issue(&self, issue: &NewIssue) -> Result<i64, DatabaseError>;

    /// All issues, most recent first.
    async fn list_issues(&self) -> Result<Vec<Issue>, DatabaseError>;

    /// Look up one issue.
    async fn get_issue(&self, id: i64) -> Result<Option<Issue>, DatabaseError>;
}

//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and safe
//! for concurrent async use.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::traits::{
    ChatTurn, Database, Employee, Issue, NewIssue, Role, StaffRole,
};
use crate::triage::types::{Department, Priority};

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        // Turn ordering rides on the monotonic rowid, not on timestamps.
        let statements = [
            "CREATE TABLE IF NOT EXISTS chat_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_chat_turns_session
                ON chat_turns (session_id, id)",
            "CREATE TABLE IF NOT EXISTS employees (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                department TEXT NOT NULL,
                role TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            )",
            "CREATE TABLE IF NOT EXISTS issues (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                department TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                assigned_to INTEGER REFERENCES employees(id),
                created_at TEXT NOT NULL,
                ai_summary TEXT NOT NULL
            )",
        ];

        for sql in statements {
            self.conn
                .execute(sql, ())
                .await
                .map_err(|e| DatabaseError::Query(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string written by this backend.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn str_to_role(s: &str) -> Role {
    match s {
        "assistant" => Role::Assistant,
        _ => Role::User,
    }
}

/// Departments and priorities are invariant-bearing; a bad value in the DB is
/// surfaced, never silently defaulted.
fn parse_department(s: &str) -> Result<Department, DatabaseError> {
    Department::from_str(s).map_err(DatabaseError::Serialization)
}

fn parse_priority(s: &str) -> Result<Priority, DatabaseError> {
    Priority::from_str(s).map_err(DatabaseError::Serialization)
}

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

fn row_to_employee(row: &libsql::Row) -> Result<Employee, DatabaseError> {
    let department: String = row.get(3).map_err(query_err)?;
    let role: String = row.get(4).map_err(query_err)?;
    let active: i64 = row.get(5).map_err(query_err)?;
    Ok(Employee {
        id: row.get(0).map_err(query_err)?,
        name: row.get(1).map_err(query_err)?,
        email: row.get(2).map_err(query_err)?,
        department: parse_department(&department)?,
        role: StaffRole::from_db(&role),
        is_active: active != 0,
    })
}

fn row_to_issue(row: &libsql::Row) -> Result<Issue, DatabaseError> {
    let department: String = row.get(2).map_err(query_err)?;
    let priority: String = row.get(3).map_err(query_err)?;
    let assigned_to: Option<i64> = row.get(5).map_err(query_err)?;
    let created_at: String = row.get(6).map_err(query_err)?;
    Ok(Issue {
        id: row.get(0).map_err(query_err)?,
        description: row.get(1).map_err(query_err)?,
        department: parse_department(&department)?,
        priority: parse_priority(&priority)?,
        status: row.get(4).map_err(query_err)?,
        assigned_to,
        created_at: parse_datetime(&created_at),
        ai_summary: row.get(7).map_err(query_err)?,
    })
}

// ── Database trait ──────────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn append_chat_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO chat_turns (session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, role.as_str(), content, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        debug!(session_id = session_id, role = role.as_str(), "Chat turn appended");
        Ok(())
    }

    async fn list_chat_turns(&self, session_id: &str) -> Result<Vec<ChatTurn>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT session_id, role, content, created_at
                 FROM chat_turns WHERE session_id = ?1 ORDER BY id ASC",
                params![session_id],
            )
            .await
            .map_err(query_err)?;

        let mut turns = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let role: String = row.get(1).map_err(query_err)?;
            let created_at: String = row.get(3).map_err(query_err)?;
            turns.push(ChatTurn {
                session_id: row.get(0).map_err(query_err)?,
                role: str_to_role(&role),
                content: row.get(2).map_err(query_err)?,
                created_at: parse_datetime(&created_at),
            });
        }
        Ok(turns)
    }

    async fn active_employees_by_department(
        &self,
        department: Department,
    ) -> Result<Vec<Employee>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, email, department, role, is_active
                 FROM employees WHERE department = ?1 AND is_active = 1
                 ORDER BY id ASC",
                params![department.as_str()],
            )
            .await
            .map_err(query_err)?;

        let mut employees = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            employees.push(row_to_employee(&row)?);
        }
        Ok(employees)
    }

    async fn insert_employee(
        &self,
        name: &str,
        email: &str,
        department: Department,
        role: StaffRole,
        is_active: bool,
    ) -> Result<i64, DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO employees (name, email, department, role, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    email,
                    department.as_str(),
                    role.as_str(),
                    is_active as i64
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn count_employees(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM employees", ())
            .await
            .map_err(query_err)?;
        let row = rows
            .next()
            .await
            .map_err(query_err)?
            .ok_or_else(|| DatabaseError::Query("count returned no rows".into()))?;
        let count: i64 = row.get(0).map_err(query_err)?;
        Ok(count.max(0) as u64)
    }

    async fn insert_issue(&self, issue: &NewIssue) -> Result<i64, DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO issues (description, department, priority, status,
                    assigned_to, created_at, ai_summary)
                 VALUES (?1, ?2, ?3, 'open', ?4, ?5, ?6)",
                params![
                    issue.description.as_str(),
                    issue.department.as_str(),
                    issue.priority.as_str(),
                    issue.assigned_to,
                    Utc::now().to_rfc3339(),
                    issue.ai_summary.as_str()
                ],
            )
            .await
            .map_err(query_err)?;
        let id = self.conn.last_insert_rowid();
        debug!(issue_id = id, department = %issue.department, "Issue created");
        Ok(id)
    }

    async fn list_issues(&self) -> Result<Vec<Issue>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, description, department, priority, status,
                        assigned_to, created_at, ai_summary
                 FROM issues ORDER BY id DESC",
                (),
            )
            .await
            .map_err(query_err)?;

        let mut issues = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            issues.push(row_to_issue(&row)?);
        }
        Ok(issues)
    }

    async fn get_issue(&self, id: i64) -> Result<Option<Issue>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, description, department, priority, status,
                        assigned_to, created_at, ai_summary
                 FROM issues WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_issue(&row)?)),
            None => Ok(None),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

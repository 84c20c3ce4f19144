//! Persistence layer — SQLite-backed storage for chat turns, employees, and issues.

pub mod libsql_backend;
pub mod seed;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use seed::seed_employees;
pub use traits::{ChatTurn, Database, Employee, Issue, NewIssue, Role, StaffRole};

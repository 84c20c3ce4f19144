//! Startup roster seeding.

use tracing::info;

use crate::error::DatabaseError;
use crate::store::traits::{Database, StaffRole};
use crate::triage::types::Department;

/// Default roster inserted when the employee table is empty.
///
/// Every department has at least one member so fresh deployments never route
/// all escalations to the unassigned state.
const DEFAULT_ROSTER: &[(&str, &str, Department, StaffRole)] = &[
    ("Amira Haddad", "amira@example.com", Department::Web, StaffRole::Senior),
    ("Omar Farouk", "omar@example.com", Department::Web, StaffRole::Junior),
    ("Lina Mansour", "lina@example.com", Department::Ai, StaffRole::Manager),
    ("Yousef Nader", "yousef@example.com", Department::Content, StaffRole::Junior),
    ("Salma Ibrahim", "salma@example.com", Department::Commercial, StaffRole::Senior),
    ("Karim Aziz", "karim@example.com", Department::Operations, StaffRole::Senior),
    ("Dina Samir", "dina@example.com", Department::General, StaffRole::Junior),
];

/// Seed the default roster if the employee table is empty.
/// Returns the number of employees inserted (0 if already seeded).
pub async fn seed_employees(db: &dyn Database) -> Result<usize, DatabaseError> {
    if db.count_employees().await? > 0 {
        return Ok(0);
    }

    for (name, email, department, role) in DEFAULT_ROSTER {
        db.insert_employee(name, email, *department, *role, true)
            .await?;
    }
    info!(count = DEFAULT_ROSTER.len(), "Seeded default employee roster");
    Ok(DEFAULT_ROSTER.len())
}

//! Assignee selection for escalated issues.
//!
//! Policy: filter to active employees of the target department; for high and
//! medium priority prefer senior staff (senior or manager), falling through
//! to the full pool when no senior staff exists. Selection within a pool is
//! uniform random to spread load.

use std::sync::Mutex;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::store::traits::{Employee, StaffRole};
use crate::triage::types::{Department, Priority};

/// Picks an assignee from a roster. The RNG is injectable so assignment is
/// deterministic and reproducible under test.
pub struct AssignmentEngine {
    rng: Mutex<StdRng>,
}

impl AssignmentEngine {
    /// Engine with an entropy-seeded RNG (production).
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Engine with a fixed seed (tests, reproduction).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Select an assignee for an issue in `department` at `priority`.
    ///
    /// `roster` may be pre-filtered or the full employee list; inactive and
    /// out-of-department entries are excluded here either way. Returns `None`
    /// when no candidate exists at any stage — a valid terminal state, the
    /// issue is then created unassigned.
    pub fn assign(
        &self,
        roster: &[Employee],
        department: Department,
        priority: Priority,
    ) -> Option<Employee> {
        let pool: Vec<&Employee> = roster
            .iter()
            .filter(|e| e.is_active && e.department == department)
            .collect();

        if pool.is_empty() {
            debug!(department = %department, "No eligible employee for assignment");
            return None;
        }

        let mut rng = self.rng.lock().expect("assignment rng poisoned");

        if matches!(priority, Priority::High | Priority::Medium) {
            let senior: Vec<&Employee> = pool
                .iter()
                .copied()
                .filter(|e| matches!(e.role, StaffRole::Senior | StaffRole::Manager))
                .collect();
            if let Some(chosen) = senior.choose(&mut *rng) {
                return Some((*chosen).clone());
            }
            // No senior staff in this department: fall through to the full pool.
        }

        pool.choose(&mut *rng).map(|e| (*e).clone())
    }
}

impl Default for AssignmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emp(id: i64, department: Department, role: StaffRole, is_active: bool) -> Employee {
        Employee {
            id,
            name: format!("emp-{id}"),
            email: format!("emp{id}@example.com"),
            department,
            role,
            is_active,
        }
    }

    #[test]
    fn empty_roster_returns_none() {
        let engine = AssignmentEngine::with_seed(1);
        assert!(engine.assign(&[], Department::Content, Priority::Medium).is_none());
    }

    #[test]
    fn wrong_department_is_never_selected() {
        let engine = AssignmentEngine::with_seed(1);
        let roster = vec![emp(1, Department::Ai, StaffRole::Senior, true)];
        assert!(engine.assign(&roster, Department::Web, Priority::High).is_none());
    }

    #[test]
    fn inactive_employees_are_excluded() {
        let engine = AssignmentEngine::with_seed(1);
        let roster = vec![
            emp(1, Department::Web, StaffRole::Senior, false),
            emp(2, Department::Web, StaffRole::Junior, true),
        ];
        for _ in 0..20 {
            let chosen = engine
                .assign(&roster, Department::Web, Priority::High)
                .unwrap();
            assert_eq!(chosen.id, 2);
        }
    }

    #[test]
    fn high_priority_prefers_senior_staff() {
        let engine = AssignmentEngine::with_seed(42);
        let roster = vec![
            emp(1, Department::Web, StaffRole::Junior, true),
            emp(2, Department::Web, StaffRole::Senior, true),
            emp(3, Department::Web, StaffRole::Manager, true),
        ];
        for _ in 0..50 {
            let chosen = engine
                .assign(&roster, Department::Web, Priority::High)
                .unwrap();
            assert_ne!(chosen.id, 1, "junior picked despite senior staff available");
        }
    }

    #[test]
    fn medium_priority_also_prefers_senior_staff() {
        let engine = AssignmentEngine::with_seed(7);
        let roster = vec![
            emp(1, Department::Ai, StaffRole::Junior, true),
            emp(2, Department::Ai, StaffRole::Manager, true),
        ];
        for _ in 0..50 {
            let chosen = engine
                .assign(&roster, Department::Ai, Priority::Medium)
                .unwrap();
            assert_eq!(chosen.id, 2);
        }
    }

    #[test]
    fn junior_only_pool_still_assigns_high_priority() {
        let engine = AssignmentEngine::with_seed(3);
        let roster = vec![
            emp(1, Department::Content, StaffRole::Junior, true),
            emp(2, Department::Content, StaffRole::Junior, true),
        ];
        let chosen = engine
            .assign(&roster, Department::Content, Priority::High)
            .unwrap();
        assert!(matches!(chosen.id, 1 | 2));
    }

    #[test]
    fn low_priority_uses_full_pool() {
        let engine = AssignmentEngine::with_seed(9);
        let roster = vec![
            emp(1, Department::Web, StaffRole::Junior, true),
            emp(2, Department::Web, StaffRole::Senior, true),
        ];
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let chosen = engine
                .assign(&roster, Department::Web, Priority::Low)
                .unwrap();
            seen.insert(chosen.id);
        }
        // With 100 uniform draws over two candidates, both must appear.
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn seeded_engines_are_deterministic() {
        let roster = vec![
            emp(1, Department::Web, StaffRole::Senior, true),
            emp(2, Department::Web, StaffRole::Senior, true),
            emp(3, Department::Web, StaffRole::Manager, true),
        ];

        let picks = |seed: u64| -> Vec<i64> {
            let engine = AssignmentEngine::with_seed(seed);
            (0..10)
                .map(|_| {
                    engine
                        .assign(&roster, Department::Web, Priority::High)
                        .unwrap()
                        .id
                })
                .collect()
        };

        assert_eq!(picks(123), picks(123));
    }
}

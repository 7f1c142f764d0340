//! Hard constraint checks over a complete assignment.
//!
//! The solver keeps these invariants incrementally while it searches; this
//! module re-checks a finished assignment from scratch so nothing unsound
//! ever reaches a caller.

use crate::config::CoveragePolicy;
use crate::model::{Assignment, ConstraintModel};

/// A broken hard constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Employee lacks an ability, is hard-unavailable, or the shift is pinned to someone else.
    Ineligible { shift: usize, employee: usize },
    /// Employee works two overlapping shifts.
    Overlap {
        employee: usize,
        first: usize,
        second: usize,
    },
    /// A hard-pinned shift is not worked by its employee.
    PinBroken { shift: usize, employee: usize },
    /// A hard period preference has no worked shift.
    PeriodUnmet { requirement: usize },
    /// Full coverage is required but the shift is unassigned.
    Uncovered { shift: usize },
}

impl Violation {
    pub fn describe(&self, model: &ConstraintModel) -> String {
        let shift_id = |s: usize| model.shifts[s].id.as_str();
        let employee_id = |e: usize| model.employees[e].id.as_str();
        match *self {
            Violation::Ineligible { shift, employee } => format!(
                "employee '{}' may not work shift '{}'",
                employee_id(employee),
                shift_id(shift)
            ),
            Violation::Overlap {
                employee,
                first,
                second,
            } => format!(
                "employee '{}' works overlapping shifts '{}' and '{}'",
                employee_id(employee),
                shift_id(first),
                shift_id(second)
            ),
            Violation::PinBroken { shift, employee } => format!(
                "shift '{}' is not worked by hard-pinned employee '{}'",
                shift_id(shift),
                employee_id(employee)
            ),
            Violation::PeriodUnmet { requirement } => format!(
                "employee '{}' works no shift in a required period",
                employee_id(model.requirements[requirement].employee)
            ),
            Violation::Uncovered { shift } => format!("shift '{}' is unassigned", shift_id(shift)),
        }
    }
}

/// Returns `true` if `employee` can take `shift` without breaking a hard
/// constraint against the rest of `assignment`.
///
/// Period requirements are not considered: adding a shift never unmeets one.
pub fn can_assign(model: &ConstraintModel, assignment: &Assignment, shift: usize, employee: usize) -> bool {
    model.is_eligible(shift, employee)
        && model.overlaps[shift]
            .iter()
            .all(|&other| assignment.get(other) != Some(employee))
}

/// Returns `true` if every hard period requirement of `employee` is met.
pub fn requirements_met(model: &ConstraintModel, assignment: &Assignment, employee: usize) -> bool {
    model.requirements_by_employee[employee].iter().all(|&r| {
        model.requirements[r]
            .shifts
            .iter()
            .any(|&s| assignment.get(s) == Some(employee))
    })
}

/// Lists every hard constraint `assignment` breaks.
pub fn check(model: &ConstraintModel, assignment: &Assignment) -> Vec<Violation> {
    let mut violations = Vec::new();

    // =========================================================================
    // HARD: Eligibility (abilities, hard unavailability, pins of others)
    // =========================================================================
    for (shift, slot) in assignment.slots().iter().enumerate() {
        if let Some(employee) = *slot {
            if !model.is_eligible(shift, employee) {
                violations.push(Violation::Ineligible { shift, employee });
            }
        }
    }

    // =========================================================================
    // HARD: No Overlapping Shifts
    // =========================================================================
    for (first, slot) in assignment.slots().iter().enumerate() {
        let Some(employee) = *slot else { continue };
        for &second in &model.overlaps[first] {
            if second > first && assignment.get(second) == Some(employee) {
                violations.push(Violation::Overlap {
                    employee,
                    first,
                    second,
                });
            }
        }
    }

    // =========================================================================
    // HARD: Pinned Shifts
    // =========================================================================
    for (shift, pin) in model.pins.iter().enumerate() {
        if let Some(employee) = *pin {
            if assignment.get(shift) != Some(employee) {
                violations.push(Violation::PinBroken { shift, employee });
            }
        }
    }

    // =========================================================================
    // HARD: Required Periods
    // =========================================================================
    for (requirement, req) in model.requirements.iter().enumerate() {
        if !req.shifts.iter().any(|&s| assignment.get(s) == Some(req.employee)) {
            violations.push(Violation::PeriodUnmet { requirement });
        }
    }

    // =========================================================================
    // HARD: Full Coverage
    // =========================================================================
    if model.coverage == CoveragePolicy::Full {
        for (shift, slot) in assignment.slots().iter().enumerate() {
            if slot.is_none() {
                violations.push(Violation::Uncovered { shift });
            }
        }
    }

    violations
}

/// Hours of rest between two shifts, if `earlier` ends before `later` starts.
#[inline]
pub fn rest_hours(model: &ConstraintModel, earlier: usize, later: usize) -> Option<f64> {
    let gap = model.shifts[later].window.start - model.shifts[earlier].window.end;
    let minutes = gap.num_minutes();
    (minutes >= 0).then(|| minutes as f64 / 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Preference, Problem};
    use crate::model::ModelBuilder;
    use crate::test_utils::{at, employee, shift};

    fn model(problem: &Problem, coverage: CoveragePolicy) -> ConstraintModel {
        ModelBuilder::new(coverage, 100).build(problem).unwrap()
    }

    fn restaurant() -> Problem {
        let alice = employee("alice", &["waiter"]).with_preference(Preference::prefer_shift("morning", true));
        let bob = employee("bob", &["waiter"])
            .with_preference(Preference::prefer_period(at(25, 12), at(25, 22), true));
        Problem::new(
            vec![alice, bob],
            vec![
                shift("afternoon", 25, 14, 20, &["waiter"]),
                shift("lunch", 25, 11, 15, &["waiter"]),
                shift("morning", 25, 8, 14, &["waiter"]),
            ],
        )
    }

    #[test]
    fn test_valid_assignment_has_no_violations() {
        let model = model(&restaurant(), CoveragePolicy::Partial);
        // afternoon=bob, morning=alice
        let assignment = Assignment::from_slots(vec![Some(1), None, Some(0)]);
        assert!(check(&model, &assignment).is_empty());
    }

    #[test]
    fn test_overlap_and_pin_violations() {
        let model = model(&restaurant(), CoveragePolicy::Partial);
        // bob takes lunch and afternoon (overlap 14-15), nobody takes pinned morning
        let assignment = Assignment::from_slots(vec![Some(1), Some(1), None]);
        let violations = check(&model, &assignment);

        assert!(violations.contains(&Violation::Overlap {
            employee: 1,
            first: 0,
            second: 1
        }));
        assert!(violations.contains(&Violation::PinBroken { shift: 2, employee: 0 }));
        assert_eq!(violations.len(), 2);
        assert!(violations[0].describe(&model).contains("overlapping"));
    }

    #[test]
    fn test_unmet_period_and_ineligible() {
        let model = model(&restaurant(), CoveragePolicy::Partial);
        // bob takes the morning pinned to alice and nothing in his required period
        let assignment = Assignment::from_slots(vec![None, None, Some(1)]);
        let violations = check(&model, &assignment);

        assert!(violations.contains(&Violation::Ineligible { shift: 2, employee: 1 }));
        assert!(violations.contains(&Violation::PinBroken { shift: 2, employee: 0 }));
        assert!(violations.contains(&Violation::PeriodUnmet { requirement: 0 }));
        assert!(!requirements_met(&model, &assignment, 1));
    }

    #[test]
    fn test_full_coverage_reports_uncovered() {
        let model = model(&restaurant(), CoveragePolicy::Full);
        let assignment = Assignment::from_slots(vec![Some(1), None, Some(0)]);
        assert_eq!(check(&model, &assignment), vec![Violation::Uncovered { shift: 1 }]);
    }

    #[test]
    fn test_can_assign_respects_overlaps() {
        let model = model(&restaurant(), CoveragePolicy::Partial);
        let assignment = Assignment::from_slots(vec![Some(1), None, Some(0)]);

        assert!(!can_assign(&model, &assignment, 1, 1));
        assert!(!can_assign(&model, &assignment, 1, 0));
        assert!(can_assign(&model, &Assignment::empty(3), 1, 0));
    }

    #[test]
    fn test_rest_hours() {
        let model = model(&restaurant(), CoveragePolicy::Partial);
        // morning ends 14:00, afternoon starts 14:00
        assert_eq!(rest_hours(&model, 2, 0), Some(0.0));
        assert_eq!(rest_hours(&model, 0, 2), None);
    }
}

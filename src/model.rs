//! Constraint model compiled from a problem snapshot.
//!
//! The builder validates the snapshot, re-indexes employees and shifts in
//! lexicographic id order (so index order doubles as the deterministic
//! tie-break order) and precomputes everything the solver needs:
//!
//! - **Eligibility**: employee abilities ⊇ shift requirements, minus pairs
//!   ruled out by hard unavailability or by another employee's hard pin.
//! - **Overlaps**: per shift, the shifts sharing an instant with it. One
//!   employee never works two of them.
//! - **Pins**: hard `PreferShift` preferences. Contradictory pins are kept as
//!   [`PinConflict`]s for the solver to report as infeasibility.
//! - **Period requirements**: hard `PreferPeriod` preferences.
//! - **Soft terms**: soft preferences, scored by the evaluator.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::config::CoveragePolicy;
use crate::domain::{Preference, Problem, TimeWindow, UnavailableTarget};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftNode {
    pub id: String,
    pub name: String,
    pub window: TimeWindow,
}

/// Kind of a soft preference term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoftKind {
    /// Satisfied when the employee works the shift.
    PreferShift,
    /// Satisfied when the employee works any listed shift.
    PreferPeriod,
    /// Violated when the employee works any listed shift.
    Unavailable,
}

/// A soft preference compiled to the eligible shifts it talks about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftTerm {
    pub employee: usize,
    pub kind: SoftKind,
    /// Sorted shift indices.
    pub shifts: Vec<usize>,
}

impl SoftTerm {
    pub fn covers(&self, shift: usize) -> bool {
        self.shifts.binary_search(&shift).is_ok()
    }
}

/// A hard `PreferPeriod`: the employee works at least one of `shifts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRequirement {
    pub employee: usize,
    /// Sorted shift indices.
    pub shifts: Vec<usize>,
}

impl PeriodRequirement {
    pub fn covers(&self, shift: usize) -> bool {
        self.shifts.binary_search(&shift).is_ok()
    }
}

/// Hard pins that cannot all hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinConflict {
    /// Several employees are hard-pinned to one shift.
    MultiplePins { shift: usize, employees: Vec<usize> },
    /// The pinned employee may not work the shift.
    Ineligible { shift: usize, employee: usize },
    /// One employee is hard-pinned to two overlapping shifts.
    OverlappingPins {
        employee: usize,
        first: usize,
        second: usize,
    },
}

impl PinConflict {
    pub fn describe(&self, model: &ConstraintModel) -> String {
        match self {
            PinConflict::MultiplePins { shift, employees } => {
                let names: Vec<String> = employees
                    .iter()
                    .map(|&e| format!("'{}'", model.employees[e].id))
                    .collect();
                format!(
                    "shift '{}' is hard-pinned to several employees: {}",
                    model.shifts[*shift].id,
                    names.join(", ")
                )
            }
            PinConflict::Ineligible { shift, employee } => format!(
                "employee '{}' is hard-pinned to shift '{}' but lacks the required abilities or is unavailable",
                model.employees[*employee].id, model.shifts[*shift].id
            ),
            PinConflict::OverlappingPins {
                employee,
                first,
                second,
            } => format!(
                "employee '{}' is hard-pinned to overlapping shifts '{}' and '{}'",
                model.employees[*employee].id, model.shifts[*first].id, model.shifts[*second].id
            ),
        }
    }
}

/// Compiled, index-based view of a problem.
#[derive(Debug, Clone)]
pub struct ConstraintModel {
    pub employees: Vec<EmployeeNode>,
    pub shifts: Vec<ShiftNode>,
    /// Shift-major eligibility bits.
    eligible: Vec<bool>,
    /// Eligible employees per shift, ascending.
    pub candidates: Vec<Vec<usize>>,
    /// Overlapping shifts per shift, ascending.
    pub overlaps: Vec<Vec<usize>>,
    pub pins: Vec<Option<usize>>,
    pub conflicts: Vec<PinConflict>,
    pub requirements: Vec<PeriodRequirement>,
    pub requirements_by_employee: Vec<Vec<usize>>,
    pub soft_terms: Vec<SoftTerm>,
    pub terms_by_employee: Vec<Vec<usize>>,
    /// Employees with at least one eligible shift.
    pub fairness_pool: Vec<usize>,
    /// Shift indices ordered by start time.
    pub by_start: Vec<usize>,
    pub coverage: CoveragePolicy,
    pub max_solutions: usize,
}

impl ConstraintModel {
    pub fn employee_count(&self) -> usize {
        self.employees.len()
    }

    pub fn shift_count(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_eligible(&self, shift: usize, employee: usize) -> bool {
        self.eligible[shift * self.employees.len() + employee]
    }

    pub fn shift_index(&self, id: &str) -> Option<usize> {
        self.shifts.binary_search_by(|s| s.id.as_str().cmp(id)).ok()
    }

    pub fn employee_index(&self, id: &str) -> Option<usize> {
        self.employees.binary_search_by(|e| e.id.as_str().cmp(id)).ok()
    }

    /// Returns `true` if the shift may be left without an employee.
    pub fn allows_unassigned(&self, shift: usize) -> bool {
        self.coverage == CoveragePolicy::Partial && self.pins[shift].is_none()
    }
}

/// Shift index to employee index, `None` for unassigned shifts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assignment {
    slots: Vec<Option<usize>>,
}

impl Assignment {
    pub fn empty(shift_count: usize) -> Self {
        Self {
            slots: vec![None; shift_count],
        }
    }

    pub fn from_slots(slots: Vec<Option<usize>>) -> Self {
        Self { slots }
    }

    pub fn get(&self, shift: usize) -> Option<usize> {
        self.slots[shift]
    }

    pub fn set(&mut self, shift: usize, employee: Option<usize>) {
        self.slots[shift] = employee;
    }

    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }

    pub fn assigned_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Maps back to shift id -> employee id.
    pub fn to_id_map(&self, model: &ConstraintModel) -> BTreeMap<String, String> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(s, slot)| {
                slot.map(|e| (model.shifts[s].id.clone(), model.employees[e].id.clone()))
            })
            .collect()
    }
}

/// Builds a [`ConstraintModel`] from a [`Problem`].
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    coverage: CoveragePolicy,
    max_solutions_limit: usize,
}

impl ModelBuilder {
    pub fn new(coverage: CoveragePolicy, max_solutions_limit: usize) -> Self {
        Self {
            coverage,
            max_solutions_limit,
        }
    }

    pub fn build(&self, problem: &Problem) -> Result<ConstraintModel, ValidationError> {
        let max_solutions = self.validate_max_solutions(problem.max_solutions)?;
        validate_unique_ids(problem)?;

        for shift in &problem.shifts {
            if !shift.window().is_well_formed() {
                return Err(ValidationError::InvalidShiftWindow {
                    shift_id: shift.id.clone(),
                });
            }
        }

        let mut employee_order: Vec<usize> = (0..problem.employees.len()).collect();
        employee_order.sort_by(|&a, &b| problem.employees[a].id.cmp(&problem.employees[b].id));
        let mut shift_order: Vec<usize> = (0..problem.shifts.len()).collect();
        shift_order.sort_by(|&a, &b| problem.shifts[a].id.cmp(&problem.shifts[b].id));

        let shift_idx: HashMap<&str, usize> = shift_order
            .iter()
            .enumerate()
            .map(|(idx, &orig)| (problem.shifts[orig].id.as_str(), idx))
            .collect();

        let employees: Vec<EmployeeNode> = employee_order
            .iter()
            .map(|&orig| EmployeeNode {
                id: problem.employees[orig].id.clone(),
                name: problem.employees[orig].name.clone(),
            })
            .collect();
        let shifts: Vec<ShiftNode> = shift_order
            .iter()
            .map(|&orig| {
                let s = &problem.shifts[orig];
                ShiftNode {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    window: s.window(),
                }
            })
            .collect();

        let n_emp = employees.len();
        let n_shifts = shifts.len();

        // Resolve every preference to (employee index, compiled form) up front so
        // validation errors surface before any model work.
        let mut resolved: Vec<(usize, ResolvedPreference)> = Vec::new();
        for (e, &orig) in employee_order.iter().enumerate() {
            let employee = &problem.employees[orig];
            for (index, pref) in employee.preferences.iter().enumerate() {
                let compiled = resolve_preference(pref, &employee.id, index, &shift_idx, &shifts)?;
                resolved.push((e, compiled));
            }
        }

        let mut eligible = vec![false; n_shifts * n_emp];
        for (s, &orig_s) in shift_order.iter().enumerate() {
            for (e, &orig_e) in employee_order.iter().enumerate() {
                eligible[s * n_emp + e] = problem.employees[orig_e].can_staff(&problem.shifts[orig_s]);
            }
        }

        // ability match alone, before other hard preferences narrow it
        let capable = eligible.clone();

        for (e, pref) in &resolved {
            if let ResolvedPreference::Unavailable { window, is_hard: true } = pref {
                for (s, shift) in shifts.iter().enumerate() {
                    if shift.window.overlaps(window) {
                        eligible[s * n_emp + e] = false;
                    }
                }
            }
        }

        let mut pinned: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for (e, pref) in &resolved {
            if let ResolvedPreference::PreferShift { shift, is_hard: true } = pref {
                pinned.entry(*shift).or_default().insert(*e);
            }
        }

        let mut pins = vec![None; n_shifts];
        let mut conflicts = Vec::new();
        for (&s, pinned_employees) in &pinned {
            if pinned_employees.len() > 1 {
                conflicts.push(PinConflict::MultiplePins {
                    shift: s,
                    employees: pinned_employees.iter().copied().collect(),
                });
                continue;
            }
            let Some(&e) = pinned_employees.iter().next() else {
                continue;
            };
            if !eligible[s * n_emp + e] {
                conflicts.push(PinConflict::Ineligible { shift: s, employee: e });
                continue;
            }
            pins[s] = Some(e);
            for other in (0..n_emp).filter(|&o| o != e) {
                eligible[s * n_emp + other] = false;
            }
        }

        let overlaps = compute_overlaps(&shifts);

        let mut pinned_by_employee: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (s, pin) in pins.iter().enumerate() {
            if let Some(e) = pin {
                pinned_by_employee.entry(*e).or_default().push(s);
            }
        }
        for (&e, pinned_shifts) in &pinned_by_employee {
            for (i, &first) in pinned_shifts.iter().enumerate() {
                for &second in &pinned_shifts[i + 1..] {
                    if overlaps[first].binary_search(&second).is_ok() {
                        conflicts.push(PinConflict::OverlappingPins {
                            employee: e,
                            first,
                            second,
                        });
                    }
                }
            }
        }

        let candidates: Vec<Vec<usize>> = (0..n_shifts)
            .map(|s| (0..n_emp).filter(|&e| eligible[s * n_emp + e]).collect())
            .collect();

        let eligible_in = |e: usize, window: &TimeWindow| -> Vec<usize> {
            (0..n_shifts)
                .filter(|&s| eligible[s * n_emp + e] && shifts[s].window.overlaps(window))
                .collect()
        };

        let mut requirements = Vec::new();
        let mut soft_terms = Vec::new();
        for (e, pref) in &resolved {
            let e = *e;
            match *pref {
                ResolvedPreference::PreferPeriod { window, is_hard: true } => {
                    let matching = (0..n_shifts)
                        .any(|s| capable[s * n_emp + e] && shifts[s].window.overlaps(&window));
                    if matching {
                        // may be empty when other hard preferences rule every shift out
                        requirements.push(PeriodRequirement {
                            employee: e,
                            shifts: eligible_in(e, &window),
                        });
                    } else {
                        debug!(
                            employee = %employees[e].id,
                            "Hard period preference has no ability-matching shift, ignoring"
                        );
                    }
                }
                ResolvedPreference::PreferPeriod { window, is_hard: false } => {
                    soft_terms.push(SoftTerm {
                        employee: e,
                        kind: SoftKind::PreferPeriod,
                        shifts: eligible_in(e, &window),
                    });
                }
                ResolvedPreference::PreferShift { shift, is_hard: false } => {
                    let shifts = if eligible[shift * n_emp + e] { vec![shift] } else { Vec::new() };
                    soft_terms.push(SoftTerm {
                        employee: e,
                        kind: SoftKind::PreferShift,
                        shifts,
                    });
                }
                ResolvedPreference::Unavailable { window, is_hard: false } => {
                    soft_terms.push(SoftTerm {
                        employee: e,
                        kind: SoftKind::Unavailable,
                        shifts: eligible_in(e, &window),
                    });
                }
                ResolvedPreference::PreferShift { is_hard: true, .. }
                | ResolvedPreference::Unavailable { is_hard: true, .. } => {}
            }
        }

        let mut requirements_by_employee = vec![Vec::new(); n_emp];
        for (r, req) in requirements.iter().enumerate() {
            requirements_by_employee[req.employee].push(r);
        }
        let mut terms_by_employee = vec![Vec::new(); n_emp];
        for (t, term) in soft_terms.iter().enumerate() {
            terms_by_employee[term.employee].push(t);
        }

        let fairness_pool: Vec<usize> = (0..n_emp)
            .filter(|&e| (0..n_shifts).any(|s| eligible[s * n_emp + e]))
            .collect();

        let mut by_start: Vec<usize> = (0..n_shifts).collect();
        by_start.sort_by_key(|&s| (shifts[s].window.start, s));

        debug!(
            employees = n_emp,
            shifts = n_shifts,
            pins = pins.iter().filter(|p| p.is_some()).count(),
            conflicts = conflicts.len(),
            requirements = requirements.len(),
            soft_terms = soft_terms.len(),
            "Constraint model built"
        );

        Ok(ConstraintModel {
            employees,
            shifts,
            eligible,
            candidates,
            overlaps,
            pins,
            conflicts,
            requirements,
            requirements_by_employee,
            soft_terms,
            terms_by_employee,
            fairness_pool,
            by_start,
            coverage: self.coverage,
            max_solutions,
        })
    }

    fn validate_max_solutions(&self, value: i64) -> Result<usize, ValidationError> {
        let invalid = || ValidationError::InvalidMaxSolutions {
            value,
            limit: self.max_solutions_limit,
        };
        let value = usize::try_from(value).map_err(|_| invalid())?;
        if value == 0 || value > self.max_solutions_limit {
            return Err(invalid());
        }
        Ok(value)
    }
}

/// A preference with its shift references resolved to indices.
#[derive(Debug, Clone, Copy)]
enum ResolvedPreference {
    PreferShift { shift: usize, is_hard: bool },
    PreferPeriod { window: TimeWindow, is_hard: bool },
    Unavailable { window: TimeWindow, is_hard: bool },
}

fn resolve_preference(
    pref: &Preference,
    employee_id: &str,
    index: usize,
    shift_idx: &HashMap<&str, usize>,
    shifts: &[ShiftNode],
) -> Result<ResolvedPreference, ValidationError> {
    let lookup = |shift_id: &str| {
        shift_idx
            .get(shift_id)
            .copied()
            .ok_or_else(|| ValidationError::UnknownShift {
                employee_id: employee_id.to_string(),
                kind: pref.kind(),
                shift_id: shift_id.to_string(),
            })
    };
    let checked = |window: &TimeWindow| {
        if window.is_well_formed() {
            Ok(*window)
        } else {
            Err(ValidationError::InvalidPreferenceWindow {
                employee_id: employee_id.to_string(),
                kind: pref.kind(),
                index,
            })
        }
    };

    Ok(match pref {
        Preference::PreferShift { shift_id, is_hard } => ResolvedPreference::PreferShift {
            shift: lookup(shift_id.as_str())?,
            is_hard: *is_hard,
        },
        Preference::PreferPeriod { window, is_hard } => ResolvedPreference::PreferPeriod {
            window: checked(window)?,
            is_hard: *is_hard,
        },
        Preference::Unavailable { target, is_hard } => {
            let window = match target {
                UnavailableTarget::Window(window) => checked(window)?,
                UnavailableTarget::Shift(shift_id) => shifts[lookup(shift_id.as_str())?].window,
            };
            ResolvedPreference::Unavailable {
                window,
                is_hard: *is_hard,
            }
        }
    })
}

fn validate_unique_ids(problem: &Problem) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for employee in &problem.employees {
        if !seen.insert(employee.id.as_str()) {
            return Err(ValidationError::DuplicateEmployee(employee.id.clone()));
        }
    }
    let mut seen = HashSet::new();
    for shift in &problem.shifts {
        if !seen.insert(shift.id.as_str()) {
            return Err(ValidationError::DuplicateShift(shift.id.clone()));
        }
    }
    Ok(())
}

/// Sweeps shifts in start order to collect overlapping pairs.
fn compute_overlaps(shifts: &[ShiftNode]) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..shifts.len()).collect();
    order.sort_by_key(|&s| (shifts[s].window.start, s));

    let mut overlaps = vec![Vec::new(); shifts.len()];
    for (i, &a) in order.iter().enumerate() {
        for &b in &order[i + 1..] {
            if shifts[b].window.start >= shifts[a].window.end {
                break;
            }
            overlaps[a].push(b);
            overlaps[b].push(a);
        }
    }
    for list in &mut overlaps {
        list.sort_unstable();
    }
    overlaps
}

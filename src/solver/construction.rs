//! Depth-first branch-and-bound construction.
//!
//! Shifts are decided most-constrained first. Blocking counters track, for
//! every (shift, employee) pair, how many decided overlapping shifts the
//! employee already works, so live domain sizes stay current on both apply
//! and undo without rescanning.

use std::cmp::Reverse;

use tracing::debug;

use crate::config::SolverConfig;
use crate::console::PhaseTimer;
use crate::model::{Assignment, ConstraintModel};
use crate::scoring::Evaluator;

use super::pool::CandidatePool;
use super::termination::{StopReason, Termination};

/// Nodes between two termination checks.
const CHECK_INTERVAL: u64 = 64;

/// Counters reported by the construction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructionStats {
    pub nodes: u64,
    pub leaves: u64,
    pub stop_reason: StopReason,
}

/// One open branching point.
struct Frame {
    shift: usize,
    values: Vec<Option<usize>>,
    next: usize,
    applied: Option<Option<usize>>,
}

struct SearchState<'a> {
    model: &'a ConstraintModel,
    evaluator: Evaluator<'a>,
    assignment: Assignment,
    decided: Vec<bool>,
    /// Decided overlapping shifts worked by the employee, shift-major.
    blocked: Vec<u32>,
    domain_size: Vec<usize>,
    load: Vec<usize>,
    term_hits: Vec<u32>,
    req_hits: Vec<u32>,
    max_soft: f64,
}

impl<'a> SearchState<'a> {
    fn new(evaluator: Evaluator<'a>) -> Self {
        let model = evaluator.model();
        Self {
            model,
            evaluator,
            assignment: Assignment::empty(model.shift_count()),
            decided: vec![false; model.shift_count()],
            blocked: vec![0; model.shift_count() * model.employee_count()],
            domain_size: model.candidates.iter().map(Vec::len).collect(),
            load: vec![0; model.employee_count()],
            term_hits: vec![0; model.soft_terms.len()],
            req_hits: vec![0; model.requirements.len()],
            max_soft: evaluator.max_soft_score() as f64 + evaluator.max_fairness_term(),
        }
    }

    fn is_blocked(&self, shift: usize, employee: usize) -> bool {
        self.blocked[shift * self.model.employee_count() + employee] > 0
    }

    fn apply(&mut self, shift: usize, value: Option<usize>) {
        self.decided[shift] = true;
        let Some(employee) = value else { return };
        self.assignment.set(shift, Some(employee));
        self.load[employee] += 1;
        self.shift_blocks(shift, employee, true);
        self.count_hits(shift, employee, true);
    }

    fn undo(&mut self, shift: usize, value: Option<usize>) {
        self.decided[shift] = false;
        let Some(employee) = value else { return };
        self.assignment.set(shift, None);
        self.load[employee] -= 1;
        self.shift_blocks(shift, employee, false);
        self.count_hits(shift, employee, false);
    }

    fn shift_blocks(&mut self, shift: usize, employee: usize, add: bool) {
        let n_emp = self.model.employee_count();
        for &other in &self.model.overlaps[shift] {
            let slot = &mut self.blocked[other * n_emp + employee];
            if add {
                *slot += 1;
                if *slot == 1 && self.model.is_eligible(other, employee) {
                    self.domain_size[other] -= 1;
                }
            } else {
                *slot -= 1;
                if *slot == 0 && self.model.is_eligible(other, employee) {
                    self.domain_size[other] += 1;
                }
            }
        }
    }

    fn count_hits(&mut self, shift: usize, employee: usize, add: bool) {
        for &t in &self.model.terms_by_employee[employee] {
            if self.model.soft_terms[t].covers(shift) {
                if add {
                    self.term_hits[t] += 1;
                } else {
                    self.term_hits[t] -= 1;
                }
            }
        }
        for &r in &self.model.requirements_by_employee[employee] {
            if self.model.requirements[r].covers(shift) {
                if add {
                    self.req_hits[r] += 1;
                } else {
                    self.req_hits[r] -= 1;
                }
            }
        }
    }

    /// Most constrained undecided shift, plus the number of undecided shifts
    /// that can still be staffed.
    fn scan(&self) -> (Option<usize>, usize) {
        let mut best: Option<usize> = None;
        let mut open = 0;
        for s in 0..self.model.shift_count() {
            if self.decided[s] {
                continue;
            }
            if self.domain_size[s] > 0 {
                open += 1;
            }
            if best.map_or(true, |b| self.domain_size[s] < self.domain_size[b]) {
                best = Some(s);
            }
        }
        (best, open)
    }

    /// Returns `true` if some unmet period requirement has no shift left to meet it.
    fn requirement_lost(&self) -> bool {
        self.model.requirements.iter().enumerate().any(|(r, req)| {
            self.req_hits[r] == 0
                && !req
                    .shifts
                    .iter()
                    .any(|&s| !self.decided[s] && !self.is_blocked(s, req.employee))
        })
    }

    /// Optimistic objective of any completion of the current partial assignment.
    fn bound(&self, open: usize) -> f64 {
        self.evaluator.weights().coverage * (self.assignment.assigned_count() + open) as f64 + self.max_soft
    }

    /// Soft score gained by giving `shift` to `employee` right now.
    fn gain(&self, shift: usize, employee: usize) -> i64 {
        self.model.terms_by_employee[employee]
            .iter()
            .filter(|&&t| self.term_hits[t] == 0 && self.model.soft_terms[t].covers(shift))
            .map(|&t| self.evaluator.term_score(&self.model.soft_terms[t], true))
            .sum()
    }

    fn meets_open_requirement(&self, shift: usize, employee: usize) -> bool {
        self.model.requirements_by_employee[employee]
            .iter()
            .any(|&r| self.req_hits[r] == 0 && self.model.requirements[r].covers(shift))
    }

    /// Values for `shift` in branching order.
    fn values(&self, shift: usize) -> Vec<Option<usize>> {
        let mut employees: Vec<usize> = self.model.candidates[shift]
            .iter()
            .copied()
            .filter(|&e| !self.is_blocked(shift, e))
            .collect();
        employees.sort_by_key(|&e| {
            (
                !self.meets_open_requirement(shift, e),
                Reverse(self.gain(shift, e)),
                self.load[e],
                e,
            )
        });

        let mut values: Vec<Option<usize>> = employees.into_iter().map(Some).collect();
        if self.model.allows_unassigned(shift) {
            values.push(None);
        }
        values
    }
}

/// Runs the construction phase, offering every complete assignment to `pool`.
pub fn construct(
    evaluator: Evaluator<'_>,
    config: &SolverConfig,
    termination: &Termination,
    pool: &mut CandidatePool,
    timer: &mut PhaseTimer,
) -> ConstructionStats {
    let mut state = SearchState::new(evaluator);
    let mut stack: Vec<Frame> = Vec::new();
    let mut nodes: u64 = 0;
    let mut leaves: u64 = 0;

    let stop_reason = 'search: {
        match state.scan() {
            (None, _) => {
                leaves += 1;
                offer_leaf(&state, pool, timer);
                break 'search StopReason::Exhausted;
            }
            (Some(shift), _) => stack.push(Frame {
                shift,
                values: state.values(shift),
                next: 0,
                applied: None,
            }),
        }

        loop {
            if nodes % CHECK_INTERVAL == 0 {
                if let Some(reason) = termination.check() {
                    break 'search reason;
                }
            }

            let Some(frame) = stack.last_mut() else {
                break 'search StopReason::Exhausted;
            };
            let shift = frame.shift;
            if let Some(previous) = frame.applied.take() {
                state.undo(shift, previous);
            }
            if frame.next >= frame.values.len() {
                stack.pop();
                continue;
            }
            let value = frame.values[frame.next];
            frame.next += 1;
            frame.applied = Some(value);

            state.apply(shift, value);
            nodes += 1;
            timer.record_move();

            if state.requirement_lost() {
                continue;
            }
            let (next, open) = state.scan();
            if let Some(threshold) = pool.threshold() {
                if state.bound(open) < threshold {
                    continue;
                }
            }

            match next {
                None => {
                    leaves += 1;
                    offer_leaf(&state, pool, timer);
                    if leaves >= config.leaf_limit as u64 {
                        break 'search StopReason::LeafLimit;
                    }
                }
                Some(next_shift) => {
                    let values = state.values(next_shift);
                    if !values.is_empty() {
                        stack.push(Frame {
                            shift: next_shift,
                            values,
                            next: 0,
                            applied: None,
                        });
                    }
                }
            }

            if nodes >= config.node_limit {
                break 'search StopReason::NodeLimit;
            }
        }
    };

    debug!(
        nodes,
        leaves,
        kept = pool.len(),
        stop_reason = %stop_reason,
        "Construction finished"
    );

    ConstructionStats {
        nodes,
        leaves,
        stop_reason,
    }
}

fn offer_leaf(state: &SearchState<'_>, pool: &mut CandidatePool, timer: &mut PhaseTimer) {
    let evaluation = state.evaluator.evaluate(&state.assignment);
    if pool.offer(&state.assignment, evaluation) {
        timer.record_accepted(evaluation.objective);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoveragePolicy, ObjectiveWeights};
    use crate::constraints::check;
    use crate::domain::{Preference, Problem};
    use crate::model::ModelBuilder;
    use crate::test_utils::{at, employee, shift};

    fn run(problem: &Problem, coverage: CoveragePolicy, capacity: usize) -> (ConstraintModel, CandidatePool, ConstructionStats) {
        let model = ModelBuilder::new(coverage, 100).build(problem).unwrap();
        let weights = ObjectiveWeights::default();
        let config = SolverConfig::default();
        let mut pool = CandidatePool::new(capacity);
        let mut timer = PhaseTimer::start("Construction", 0);
        let stats = construct(
            Evaluator::new(&model, &weights),
            &config,
            &Termination::unbounded(),
            &mut pool,
            &mut timer,
        );
        (model, pool, stats)
    }

    #[test]
    fn test_empty_problem_has_one_leaf() {
        let (_, pool, stats) = run(&Problem::new(vec![], vec![]), CoveragePolicy::Partial, 1);
        assert_eq!(stats.leaves, 1);
        assert_eq!(stats.stop_reason, StopReason::Exhausted);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_bartender_scenario() {
        let alice = employee("alice", &["bartender", "waiter"])
            .with_preference(Preference::prefer_shift("evening", false));
        let bob = employee("bob", &["waiter"]);
        let problem = Problem::new(
            vec![alice, bob],
            vec![
                shift("evening", 25, 18, 23, &["bartender"]),
                shift("morning", 25, 8, 14, &["waiter"]),
            ],
        );
        let (model, pool, stats) = run(&problem, CoveragePolicy::Partial, 1);

        assert_eq!(stats.stop_reason, StopReason::Exhausted);
        let best = pool.best().unwrap();
        assert_eq!(best.assignment.get(model.shift_index("evening").unwrap()), Some(0));
        assert_eq!(best.assignment.get(model.shift_index("morning").unwrap()), Some(1));
        assert_eq!(best.evaluation.soft_preference_score, 10);
        assert_eq!(best.evaluation.fairness_score, 1.0);
    }

    #[test]
    fn test_every_leaf_is_feasible() {
        let carol = employee("carol", &["waiter"])
            .with_preference(Preference::prefer_period(at(25, 0), at(26, 0), true))
            .with_preference(Preference::unavailable(at(25, 8), at(25, 12), true));
        let dave = employee("dave", &["waiter"]).with_preference(Preference::prefer_shift("afternoon", true));
        let problem = Problem::new(
            vec![employee("alice", &["waiter"]), carol, dave],
            vec![
                shift("afternoon", 25, 14, 20, &["waiter"]),
                shift("evening", 25, 18, 23, &["waiter"]),
                shift("morning", 25, 8, 14, &["waiter"]),
                shift("late", 26, 8, 14, &["waiter"]),
            ],
        );
        let (model, pool, _) = run(&problem, CoveragePolicy::Partial, 10);

        assert_eq!(pool.len(), 10);
        for candidate in pool.candidates() {
            assert!(check(&model, &candidate.assignment).is_empty());
        }
        let best = pool.best().unwrap();
        assert_eq!(best.evaluation.assigned, 4);
        assert_eq!(best.assignment.get(model.shift_index("evening").unwrap()), Some(1));
    }

    #[test]
    fn test_unsatisfiable_requirements_yield_nothing() {
        // each period only touches one shift, and the two shifts overlap
        let bob = employee("bob", &["waiter"])
            .with_preference(Preference::prefer_period(at(25, 8), at(25, 9), true))
            .with_preference(Preference::prefer_period(at(25, 15), at(25, 16), true));
        let problem = Problem::new(
            vec![bob],
            vec![shift("x", 25, 8, 14, &["waiter"]), shift("y", 25, 10, 16, &["waiter"])],
        );
        let (model, pool, stats) = run(&problem, CoveragePolicy::Partial, 3);

        assert_eq!(model.requirements.len(), 2);
        assert!(pool.is_empty());
        assert_eq!(stats.stop_reason, StopReason::Exhausted);
    }

    #[test]
    fn test_zero_eligible_shift_stays_unassigned() {
        let problem = Problem::new(
            vec![employee("alice", &["waiter"])],
            vec![
                shift("bar", 25, 18, 23, &["bartender"]),
                shift("floor", 25, 8, 14, &["waiter"]),
            ],
        );
        let (model, pool, _) = run(&problem, CoveragePolicy::Partial, 1);
        let best = pool.best().unwrap();
        assert_eq!(best.assignment.get(model.shift_index("bar").unwrap()), None);
        assert_eq!(best.assignment.get(model.shift_index("floor").unwrap()), Some(0));
    }
}

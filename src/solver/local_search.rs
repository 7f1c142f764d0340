//! Late acceptance local search over complete feasible assignments.
//!
//! Each chain starts from one construction candidate and walks with change
//! and swap moves that keep every hard constraint satisfied. A move is
//! accepted when it does not worsen the current objective or when it beats
//! the objective recorded `late_acceptance_size` steps ago. Every accepted
//! state is offered to the chain's own pool; pools are merged afterwards in
//! chain order so the result does not depend on thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::config::LocalSearchConfig;
use crate::constraints::{can_assign, requirements_met};
use crate::model::{Assignment, ConstraintModel};
use crate::scoring::{Evaluation, Evaluator};

use super::pool::{Candidate, CandidatePool};
use super::termination::{StopReason, Termination};

/// Counters reported by the local search phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSearchStats {
    pub steps: u64,
    pub moves_evaluated: u64,
    pub accepted: u64,
    /// External reason if any chain stopped on one, otherwise the first chain's reason.
    pub stop_reason: StopReason,
}

/// A move between two feasible assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    /// Give `shift` to `to` (or nobody).
    Change { shift: usize, to: Option<usize> },
    /// Exchange the employees of two shifts.
    Swap { first: usize, second: usize },
}

impl Move {
    fn apply(self, assignment: &mut Assignment) -> MoveUndo {
        match self {
            Move::Change { shift, to } => {
                let from = assignment.get(shift);
                assignment.set(shift, to);
                MoveUndo::Change { shift, from }
            }
            Move::Swap { first, second } => {
                let a = assignment.get(first);
                let b = assignment.get(second);
                assignment.set(first, b);
                assignment.set(second, a);
                MoveUndo::Swap { first, second }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MoveUndo {
    Change { shift: usize, from: Option<usize> },
    Swap { first: usize, second: usize },
}

impl MoveUndo {
    fn revert(self, assignment: &mut Assignment) {
        match self {
            MoveUndo::Change { shift, from } => assignment.set(shift, from),
            MoveUndo::Swap { first, second } => {
                Move::Swap { first, second }.apply(assignment);
            }
        }
    }
}

/// Late acceptance history of recent step objectives.
struct LateAcceptance {
    history: Vec<f64>,
}

impl LateAcceptance {
    fn new(size: usize, initial: f64) -> Self {
        Self {
            history: vec![initial; size.max(1)],
        }
    }

    fn is_accepted(&self, step: u64, current: f64, candidate: f64) -> bool {
        candidate >= current || candidate >= self.history[self.slot(step)]
    }

    fn step_ended(&mut self, step: u64, current: f64) {
        let slot = self.slot(step);
        self.history[slot] = current;
    }

    fn slot(&self, step: u64) -> usize {
        (step % self.history.len() as u64) as usize
    }
}

struct ChainOutcome {
    pool: CandidatePool,
    steps: u64,
    moves_evaluated: u64,
    accepted: u64,
    stop_reason: StopReason,
}

/// Improves the construction candidates; returns the merged pool.
pub fn improve(
    evaluator: Evaluator<'_>,
    config: &LocalSearchConfig,
    seed: u64,
    termination: &Termination,
    starts: &CandidatePool,
    capacity: usize,
) -> (CandidatePool, LocalSearchStats) {
    let start_candidates: Vec<&Candidate> = starts.candidates().collect();
    let chains = if start_candidates.is_empty() { 0 } else { config.chains };

    let outcomes: Vec<ChainOutcome> = (0..chains)
        .into_par_iter()
        .map(|chain| {
            let start = start_candidates[chain % start_candidates.len()];
            run_chain(
                evaluator,
                config,
                seed.wrapping_add(chain as u64),
                termination,
                start,
                capacity,
            )
        })
        .collect();

    let mut pool = CandidatePool::new(capacity);
    let mut stats = LocalSearchStats {
        steps: 0,
        moves_evaluated: 0,
        accepted: 0,
        stop_reason: outcomes
            .iter()
            .map(|o| o.stop_reason)
            .find(|r| r.is_external())
            .or_else(|| outcomes.first().map(|o| o.stop_reason))
            .unwrap_or(StopReason::Exhausted),
    };
    for outcome in outcomes {
        stats.steps += outcome.steps;
        stats.moves_evaluated += outcome.moves_evaluated;
        stats.accepted += outcome.accepted;
        pool.merge(outcome.pool);
    }
    (pool, stats)
}

fn run_chain(
    evaluator: Evaluator<'_>,
    config: &LocalSearchConfig,
    seed: u64,
    termination: &Termination,
    start: &Candidate,
    capacity: usize,
) -> ChainOutcome {
    let model = evaluator.model();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pool = CandidatePool::new(capacity);
    let mut assignment = start.assignment.clone();
    let mut current: Evaluation = start.evaluation;
    let mut best = current.objective;
    let mut acceptance = LateAcceptance::new(config.late_acceptance_size, current.objective);

    let mut steps = 0u64;
    let mut moves_evaluated = 0u64;
    let mut accepted = 0u64;
    let mut unimproved = 0u64;

    let movable: Vec<usize> = (0..model.shift_count())
        .filter(|&s| model.pins[s].is_none())
        .collect();

    let stop_reason = loop {
        if movable.is_empty() {
            break StopReason::Exhausted;
        }
        if let Some(reason) = termination.check() {
            break reason;
        }
        if steps >= config.step_limit {
            break StopReason::StepLimit;
        }
        if unimproved >= config.unimproved_step_limit {
            break StopReason::Unimproved;
        }

        let mut step_taken = false;
        for _ in 0..config.moves_per_step {
            let Some(mv) = pick_move(model, &assignment, &movable, &mut rng) else {
                continue;
            };
            let undo = mv.apply(&mut assignment);
            if !is_feasible_after(model, &assignment, mv, undo) {
                undo.revert(&mut assignment);
                continue;
            }

            moves_evaluated += 1;
            let evaluation = evaluator.evaluate(&assignment);
            if acceptance.is_accepted(steps, current.objective, evaluation.objective) {
                current = evaluation;
                pool.offer(&assignment, evaluation);
                step_taken = true;
                accepted += 1;
                break;
            }
            undo.revert(&mut assignment);
        }

        acceptance.step_ended(steps, current.objective);
        steps += 1;
        if step_taken && current.objective > best {
            best = current.objective;
            unimproved = 0;
        } else {
            unimproved += 1;
        }
    };

    debug!(seed, steps, moves_evaluated, best, stop_reason = %stop_reason, "Chain finished");

    ChainOutcome {
        pool,
        steps,
        moves_evaluated,
        accepted,
        stop_reason,
    }
}

fn pick_move(
    model: &ConstraintModel,
    assignment: &Assignment,
    movable: &[usize],
    rng: &mut StdRng,
) -> Option<Move> {
    let shift = movable[rng.gen_range(0..movable.len())];
    if rng.gen_bool(0.5) {
        let candidates = &model.candidates[shift];
        let options = candidates.len() + usize::from(model.allows_unassigned(shift));
        if options == 0 {
            return None;
        }
        let pick = rng.gen_range(0..options);
        let to = candidates.get(pick).copied();
        (to != assignment.get(shift)).then_some(Move::Change { shift, to })
    } else {
        let other = movable[rng.gen_range(0..movable.len())];
        let (a, b) = (assignment.get(shift)?, assignment.get(other)?);
        (a != b).then_some(Move::Swap {
            first: shift,
            second: other,
        })
    }
}

/// Checks the hard constraints a move can break, on the already-moved assignment.
fn is_feasible_after(model: &ConstraintModel, assignment: &Assignment, mv: Move, undo: MoveUndo) -> bool {
    let placed_ok = |shift: usize| match assignment.get(shift) {
        Some(employee) => can_assign(model, assignment, shift, employee),
        None => model.allows_unassigned(shift),
    };

    match (mv, undo) {
        (Move::Change { shift, .. }, MoveUndo::Change { from, .. }) => {
            placed_ok(shift) && from.map_or(true, |e| requirements_met(model, assignment, e))
        }
        (Move::Swap { first, second }, _) => {
            placed_ok(first)
                && placed_ok(second)
                && [first, second]
                    .iter()
                    .filter_map(|&s| assignment.get(s))
                    .all(|e| requirements_met(model, assignment, e))
        }
        _ => false,
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

    fn model() -> ConstraintModel {
        let alice = employee("alice", &["waiter"]).with_preference(Preference::prefer_shift("d", false));
        let bob = employee("bob", &["waiter"])
            .with_preference(Preference::prefer_period(at(26, 0), at(27, 0), true));
        let carol = employee("carol", &["waiter"]).with_preference(Preference::unavailable(at(27, 0), at(28, 0), false));
        let problem = Problem::new(
            vec![alice, bob, carol],
            vec![
                shift("a", 25, 8, 14, &["waiter"]),
                shift("b", 25, 12, 18, &["waiter"]),
                shift("c", 26, 8, 14, &["waiter"]),
                shift("d", 27, 8, 14, &["waiter"]),
                shift("e", 27, 16, 22, &["waiter"]),
            ],
        );
        ModelBuilder::new(CoveragePolicy::Partial, 100).build(&problem).unwrap()
    }

    fn start_pool(model: &ConstraintModel, weights: &ObjectiveWeights) -> CandidatePool {
        // everything on bob except nothing overlapping: a and c
        let start = Assignment::from_slots(vec![Some(1), None, Some(1), None, None]);
        assert!(check(model, &start).is_empty());
        let mut pool = CandidatePool::new(1);
        pool.offer(&start, Evaluator::new(model, weights).evaluate(&start));
        pool
    }

    fn config() -> LocalSearchConfig {
        LocalSearchConfig {
            chains: 3,
            step_limit: 300,
            unimproved_step_limit: 300,
            late_acceptance_size: 10,
            moves_per_step: 16,
        }
    }

    #[test]
    fn test_improves_and_stays_feasible() {
        let model = model();
        let weights = ObjectiveWeights::default();
        let evaluator = Evaluator::new(&model, &weights);
        let starts = start_pool(&model, &weights);
        let start_objective = starts.best().unwrap().evaluation.objective;

        let (pool, stats) = improve(evaluator, &config(), 7, &Termination::unbounded(), &starts, 5);

        assert!(stats.steps > 0);
        assert!(!stats.stop_reason.is_external());
        let best = pool.best().unwrap();
        assert!(best.evaluation.objective > start_objective);
        assert_eq!(best.evaluation.assigned, 5);
        for candidate in pool.candidates() {
            assert!(check(&model, &candidate.assignment).is_empty());
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let model = model();
        let weights = ObjectiveWeights::default();
        let starts = start_pool(&model, &weights);

        let run = || {
            let (pool, _) = improve(
                Evaluator::new(&model, &weights),
                &config(),
                42,
                &Termination::unbounded(),
                &starts,
                5,
            );
            pool.into_candidates()
                .into_iter()
                .map(|c| c.assignment)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_no_chains_without_starts() {
        let model = model();
        let weights = ObjectiveWeights::default();
        let (pool, stats) = improve(
            Evaluator::new(&model, &weights),
            &config(),
            0,
            &Termination::unbounded(),
            &CandidatePool::new(1),
            1,
        );
        assert!(pool.is_empty());
        assert_eq!(stats.steps, 0);
    }

    #[test]
    fn test_late_acceptance_window() {
        let mut acceptance = LateAcceptance::new(2, 10.0);
        assert!(acceptance.is_accepted(0, 10.0, 10.0));
        assert!(!acceptance.is_accepted(0, 12.0, 9.0));
        acceptance.step_ended(0, 12.0);
        acceptance.step_ended(1, 12.0);
        assert!(!acceptance.is_accepted(2, 12.0, 11.0));
    }
}

//! Solver engine: propagation, branch-and-bound construction and late
//! acceptance local search.
//!
//! [`optimize`] is the synchronous entry point used by the HTTP layer and
//! the benchmark binary: it builds the constraint model, searches, ranks the
//! candidates and re-verifies every returned solution.

pub mod construction;
pub mod local_search;
pub mod pool;
pub mod termination;

use std::time::Instant;

use tracing::{error, info};

use crate::config::{CoveragePolicy, ObjectiveWeights, OptimizerConfig, SolverConfig};
use crate::console::{self, PhaseTimer};
use crate::constraints;
use crate::domain::{Problem, Solution};
use crate::error::OptimizeError;
use crate::model::{ConstraintModel, ModelBuilder};
use crate::ranker;
use crate::scoring::Evaluator;

pub use pool::{Candidate, CandidatePool};
pub use termination::{CancelToken, StopReason, Termination};

/// Counters of one solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub leaves: u64,
    pub steps: u64,
    pub moves_evaluated: u64,
    /// Reason the last phase that ran stopped.
    pub stop_reason: StopReason,
    /// `true` if the deadline or a cancellation cut a phase short.
    pub wall_clock_bound: bool,
}

/// Candidates found by a search, in no particular order.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub candidates: Vec<Candidate>,
    pub stats: SearchStats,
}

/// Searches one compiled model.
pub struct Solver<'a> {
    model: &'a ConstraintModel,
    config: &'a SolverConfig,
    weights: &'a ObjectiveWeights,
}

impl<'a> Solver<'a> {
    pub fn new(model: &'a ConstraintModel, config: &'a SolverConfig, weights: &'a ObjectiveWeights) -> Self {
        Self {
            model,
            config,
            weights,
        }
    }

    pub fn solve(&self, max_solutions: usize, termination: &Termination) -> Result<SearchOutcome, OptimizeError> {
        self.propagate()?;

        let evaluator = Evaluator::new(self.model, self.weights);
        let mut pool = CandidatePool::new(max_solutions);

        let mut timer = PhaseTimer::start("Construction", 0);
        let construction = construction::construct(evaluator, self.config, termination, &mut pool, &mut timer);
        timer.finish();

        let mut stats = SearchStats {
            nodes: construction.nodes,
            leaves: construction.leaves,
            steps: 0,
            moves_evaluated: construction.nodes,
            stop_reason: construction.stop_reason,
            wall_clock_bound: construction.stop_reason.is_external(),
        };

        if pool.is_empty() {
            return Err(match construction.stop_reason {
                StopReason::Exhausted => OptimizeError::Infeasible(
                    "no assignment satisfies every hard constraint".to_string(),
                ),
                StopReason::TimeLimit => OptimizeError::Timeout {
                    elapsed_ms: termination.elapsed().as_millis() as u64,
                },
                StopReason::Cancelled => OptimizeError::Cancelled,
                _ => OptimizeError::BudgetExhausted {
                    nodes: construction.nodes,
                },
            });
        }

        let ls = &self.config.local_search;
        if ls.chains > 0 && !stats.wall_clock_bound {
            let mut timer = PhaseTimer::start("LateAcceptance", 1);
            let (improved, ls_stats) = local_search::improve(
                evaluator,
                ls,
                self.config.random_seed,
                termination,
                &pool,
                max_solutions,
            );
            pool.merge(improved);
            if let Some(best) = pool.best() {
                timer.record_totals(ls_stats.moves_evaluated, ls_stats.accepted, best.evaluation.objective);
            }
            timer.finish();

            stats.steps = ls_stats.steps;
            stats.moves_evaluated += ls_stats.moves_evaluated;
            stats.stop_reason = ls_stats.stop_reason;
            stats.wall_clock_bound |= ls_stats.stop_reason.is_external();
        }

        Ok(SearchOutcome {
            candidates: pool.into_candidates(),
            stats,
        })
    }

    /// Fails fast on contradictions the builder already found.
    fn propagate(&self) -> Result<(), OptimizeError> {
        if !self.model.conflicts.is_empty() {
            let reasons: Vec<String> = self
                .model
                .conflicts
                .iter()
                .map(|c| c.describe(self.model))
                .collect();
            return Err(OptimizeError::Infeasible(reasons.join("; ")));
        }
        let unreachable: Vec<String> = self
            .model
            .requirements
            .iter()
            .filter(|req| req.shifts.is_empty())
            .map(|req| format!("'{}'", self.model.employees[req.employee].id))
            .collect();
        if !unreachable.is_empty() {
            return Err(OptimizeError::Infeasible(format!(
                "hard period preference of {} cannot be met by any available shift",
                unreachable.join(", ")
            )));
        }
        if self.model.coverage == CoveragePolicy::Full {
            let uncoverable: Vec<String> = (0..self.model.shift_count())
                .filter(|&s| self.model.candidates[s].is_empty())
                .map(|s| format!("'{}'", self.model.shifts[s].id))
                .collect();
            if !uncoverable.is_empty() {
                return Err(OptimizeError::Infeasible(format!(
                    "no eligible employee for shift(s) {}",
                    uncoverable.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Ranked, verified solutions of one solve call.
#[derive(Debug, Clone)]
pub struct OptimizeOutput {
    pub solutions: Vec<Solution>,
    /// `true` if the same request is guaranteed to produce the same output.
    pub deterministic: bool,
    pub stats: SearchStats,
}

/// Validates, solves, ranks and verifies `problem`.
pub fn optimize(
    problem: &Problem,
    config: &OptimizerConfig,
    termination: &Termination,
) -> Result<OptimizeOutput, OptimizeError> {
    let solve_start = Instant::now();
    let model = ModelBuilder::new(config.solver.coverage, config.solver.max_solutions_limit).build(problem)?;

    console::print_problem(
        model.employee_count(),
        model.shift_count(),
        model.pins.iter().filter(|p| p.is_some()).count(),
        model.requirements.len(),
        model.soft_terms.len(),
    );
    info!(
        employees = model.employee_count(),
        shifts = model.shift_count(),
        max_solutions = model.max_solutions,
        coverage = ?model.coverage,
        "Starting shift optimizer"
    );

    let solver = Solver::new(&model, &config.solver, &config.weights);
    let outcome = match solver.solve(model.max_solutions, termination) {
        Ok(outcome) => outcome,
        Err(e) => {
            info!(error = %e, "No solution found");
            console::print_solving_ended(solve_start.elapsed(), 0, 0, None);
            return Err(e);
        }
    };

    let stats = outcome.stats;
    let ranked = ranker::rank(&model, &config.weights, outcome.candidates, model.max_solutions);

    for (i, solution) in ranked.iter().enumerate() {
        let violations = constraints::check(&model, &solution.assignment);
        if let Some(first) = violations.first() {
            let reason = first.describe(&model);
            error!(solution = i, violations = violations.len(), reason = %reason, "Unsound solution");
            return Err(OptimizeError::Internal(format!(
                "solution {i} breaks a hard constraint: {reason}"
            )));
        }
    }

    let best = ranked.first().map(|s| s.evaluation.objective);
    let duration = solve_start.elapsed();
    info!(
        duration_secs = duration.as_secs_f64(),
        nodes = stats.nodes,
        leaves = stats.leaves,
        steps = stats.steps,
        stop_reason = %stats.stop_reason,
        solutions = ranked.len(),
        best_objective = ?best,
        "Solving complete"
    );
    console::print_solving_ended(duration, stats.moves_evaluated, ranked.len(), best);

    Ok(OptimizeOutput {
        solutions: ranked.into_iter().map(|r| r.solution).collect(),
        deterministic: !stats.wall_clock_bound,
        stats,
    })
}

//! Ranks candidates best-first and packages solve results into the envelope.

use rayon::prelude::*;

use crate::config::ObjectiveWeights;
use crate::domain::Solution;
use crate::dto::{OptimizeResponse, SolutionDto};
use crate::error::OptimizeError;
use crate::model::{Assignment, ConstraintModel};
use crate::scoring::{Evaluation, Evaluator};
use crate::solver::Candidate;

/// A ranked solution with the data it was ranked on.
#[derive(Debug, Clone)]
pub struct RankedSolution {
    pub assignment: Assignment,
    pub evaluation: Evaluation,
    pub solution: Solution,
}

/// Sorts by objective desc, fairness desc, generation order asc and keeps
/// the first `max_solutions`.
pub fn rank(
    model: &ConstraintModel,
    weights: &ObjectiveWeights,
    mut candidates: Vec<Candidate>,
    max_solutions: usize,
) -> Vec<RankedSolution> {
    candidates.sort_by(|a, b| a.rank_cmp(b));
    candidates.dedup_by(|a, b| a.assignment == b.assignment);
    candidates.truncate(max_solutions);

    let evaluator = Evaluator::new(model, weights);
    candidates
        .into_par_iter()
        .map(|candidate| {
            let solution = Solution {
                assignments: candidate.assignment.to_id_map(model),
                metrics: evaluator.metrics(&candidate.assignment),
            };
            RankedSolution {
                assignment: candidate.assignment,
                evaluation: candidate.evaluation,
                solution,
            }
        })
        .collect()
}

/// Wraps a solve result in the response envelope.
///
/// An empty solution list is reported as a failure.
pub fn package(result: Result<Vec<Solution>, OptimizeError>) -> OptimizeResponse {
    match result {
        Ok(solutions) if solutions.is_empty() => {
            OptimizeResponse::failure(OptimizeError::Internal("solver returned no solutions".to_string()).to_string())
        }
        Ok(solutions) => OptimizeResponse {
            success: true,
            solutions: solutions.iter().map(SolutionDto::from).collect(),
            error: None,
        },
        Err(e) => OptimizeResponse::failure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoveragePolicy;
    use crate::domain::Problem;
    use crate::model::ModelBuilder;
    use crate::test_utils::{employee, shift};

    fn candidate(slots: Vec<Option<usize>>, evaluator: &Evaluator<'_>, order: u64) -> Candidate {
        let assignment = Assignment::from_slots(slots);
        Candidate {
            evaluation: evaluator.evaluate(&assignment),
            assignment,
            order,
        }
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let problem = Problem::new(
            vec![employee("alice", &[]), employee("bob", &[])],
            vec![shift("a", 25, 8, 12, &[]), shift("b", 26, 8, 12, &[])],
        );
        let model = ModelBuilder::new(CoveragePolicy::Partial, 100).build(&problem).unwrap();
        let weights = ObjectiveWeights::default();
        let evaluator = Evaluator::new(&model, &weights);

        let candidates = vec![
            candidate(vec![Some(0), None], &evaluator, 0),
            candidate(vec![Some(0), Some(0)], &evaluator, 1),
            candidate(vec![Some(0), Some(1)], &evaluator, 2),
            candidate(vec![Some(1), Some(0)], &evaluator, 3),
        ];
        let ranked = rank(&model, &weights, candidates, 3);

        assert_eq!(ranked.len(), 3);
        for pair in ranked.windows(2) {
            assert!(pair[0].evaluation.objective >= pair[1].evaluation.objective);
        }
        assert_eq!(ranked[0].solution.assignments["a"], "alice");
        assert_eq!(ranked[0].solution.assignments["b"], "bob");
        assert_eq!(ranked[1].solution.assignments["a"], "bob");
        assert_eq!(ranked[2].solution.metrics.fairness_score, 0.0);
    }

    #[test]
    fn test_package_never_succeeds_empty() {
        let response = package(Ok(Vec::new()));
        assert!(!response.success);
        assert!(response.error.is_some());

        let response = package(Err(OptimizeError::Infeasible("pins".to_string())));
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Infeasible: pins"));
        assert!(response.solutions.is_empty());
    }
}

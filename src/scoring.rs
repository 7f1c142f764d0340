//! Soft preference, fairness and rest scoring.

use std::collections::BTreeMap;

use crate::config::ObjectiveWeights;
use crate::constraints::rest_hours;
use crate::domain::Metrics;
use crate::model::{Assignment, ConstraintModel, SoftKind, SoftTerm};

/// Scale applied to the fairness score inside the objective.
pub const FAIRNESS_SCALE: f64 = 100.0;

/// Everything the ranking needs to know about one assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub assigned: usize,
    pub soft_preference_score: i64,
    pub fairness_score: f64,
    pub rest_penalty: f64,
    pub objective: f64,
}

/// Scores assignments of one model under fixed weights.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    model: &'a ConstraintModel,
    weights: &'a ObjectiveWeights,
}

impl<'a> Evaluator<'a> {
    pub fn new(model: &'a ConstraintModel, weights: &'a ObjectiveWeights) -> Self {
        Self { model, weights }
    }

    pub fn model(&self) -> &'a ConstraintModel {
        self.model
    }

    pub fn weights(&self) -> &'a ObjectiveWeights {
        self.weights
    }

    pub fn evaluate(&self, assignment: &Assignment) -> Evaluation {
        let assigned = assignment.assigned_count();
        let soft_preference_score = self
            .model
            .soft_terms
            .iter()
            .map(|term| self.term_score(term, term_hit(term, assignment)))
            .sum();
        let fairness_score = fairness(&self.pool_counts(assignment));
        let rest_penalty = self.rest_penalty(assignment);
        let objective = self.objective(assigned, soft_preference_score, fairness_score, rest_penalty);

        Evaluation {
            assigned,
            soft_preference_score,
            fairness_score,
            rest_penalty,
            objective,
        }
    }

    pub fn objective(&self, assigned: usize, soft: i64, fairness: f64, rest_penalty: f64) -> f64 {
        self.weights.coverage * assigned as f64 + soft as f64 + self.weights.fairness * fairness * FAIRNESS_SCALE
            - rest_penalty
    }

    /// Score contribution of a term, given whether its employee works one of its shifts.
    pub fn term_score(&self, term: &SoftTerm, hit: bool) -> i64 {
        match (term.kind, hit) {
            (SoftKind::PreferShift, true) => self.weights.prefer_shift,
            (SoftKind::PreferPeriod, true) => self.weights.prefer_period,
            (SoftKind::Unavailable, true) => -self.weights.unavailable,
            _ => 0,
        }
    }

    /// Upper bound on the soft preference score of any assignment.
    pub fn max_soft_score(&self) -> i64 {
        self.model
            .soft_terms
            .iter()
            .filter(|term| !term.shifts.is_empty())
            .map(|term| self.term_score(term, true).max(0))
            .sum()
    }

    /// Upper bound on the fairness and rest part of the objective.
    pub fn max_fairness_term(&self) -> f64 {
        self.weights.fairness * FAIRNESS_SCALE
    }

    pub fn metrics(&self, assignment: &Assignment) -> Metrics {
        let evaluation = self.evaluate(assignment);
        let mut preferences_satisfied = BTreeMap::new();
        for (e, terms) in self.model.terms_by_employee.iter().enumerate() {
            if terms.is_empty() {
                continue;
            }
            let satisfied = terms
                .iter()
                .filter(|&&t| {
                    let term = &self.model.soft_terms[t];
                    let hit = term_hit(term, assignment);
                    match term.kind {
                        SoftKind::Unavailable => !hit,
                        SoftKind::PreferShift | SoftKind::PreferPeriod => hit,
                    }
                })
                .count();
            preferences_satisfied.insert(self.model.employees[e].id.clone(), satisfied as i64);
        }

        Metrics {
            soft_preference_score: evaluation.soft_preference_score,
            fairness_score: evaluation.fairness_score,
            preferences_satisfied,
            total_shifts_assigned: evaluation.assigned,
        }
    }

    fn pool_counts(&self, assignment: &Assignment) -> Vec<u64> {
        let mut counts = vec![0u64; self.model.employee_count()];
        for e in assignment.slots().iter().flatten() {
            counts[*e] += 1;
        }
        self.model.fairness_pool.iter().map(|&e| counts[e]).collect()
    }

    fn rest_penalty(&self, assignment: &Assignment) -> f64 {
        let threshold = self.weights.rest_threshold_hours;
        if threshold <= 0.0 || self.weights.rest_penalty_per_hour == 0.0 {
            return 0.0;
        }

        let mut worked: Vec<Vec<usize>> = vec![Vec::new(); self.model.employee_count()];
        for &s in &self.model.by_start {
            if let Some(e) = assignment.get(s) {
                worked[e].push(s);
            }
        }

        let mut short_hours = 0.0;
        for shifts in &worked {
            for (i, &earlier) in shifts.iter().enumerate() {
                for &later in &shifts[i + 1..] {
                    match rest_hours(self.model, earlier, later) {
                        Some(rest) if rest >= threshold => break,
                        Some(rest) => short_hours += threshold - rest,
                        None => {}
                    }
                }
            }
        }
        short_hours * self.weights.rest_penalty_per_hour
    }
}

/// Scores `assignment` under `weights`.
pub fn score(model: &ConstraintModel, weights: &ObjectiveWeights, assignment: &Assignment) -> Metrics {
    Evaluator::new(model, weights).metrics(assignment)
}

fn term_hit(term: &SoftTerm, assignment: &Assignment) -> bool {
    term.shifts.iter().any(|&s| assignment.get(s) == Some(term.employee))
}

/// Normalized workload balance of per-employee shift counts.
///
/// 1.0 means counts differ by at most one; 0.0 means one employee works
/// every shift. With `n` employees, `T` shifts and `r = T mod n`, the
/// variance scaled by `n²` is `nΣc² − T²`, its minimum is `r(n − r)` and its
/// maximum `T²(n − 1)`.
///
/// ```
/// use shift_optimizer::scoring::fairness;
///
/// assert_eq!(fairness(&[2, 2, 2]), 1.0);
/// assert_eq!(fairness(&[3, 2, 2]), 1.0);
/// assert_eq!(fairness(&[6, 0, 0]), 0.0);
/// assert_eq!(fairness(&[]), 1.0);
/// ```
pub fn fairness(counts: &[u64]) -> f64 {
    let n = counts.len() as i128;
    let total: i128 = counts.iter().map(|&c| i128::from(c)).sum();
    if n <= 1 || total == 0 {
        return 1.0;
    }
    let sum_sq: i128 = counts.iter().map(|&c| i128::from(c) * i128::from(c)).sum();
    let r = total % n;
    let floor = r * (n - r);
    let spread = n * sum_sq - total * total - floor;
    let range = total * total * (n - 1) - floor;
    if range <= 0 {
        return 1.0;
    }
    (1.0 - spread as f64 / range as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoveragePolicy;
    use crate::domain::{Preference, Problem};
    use crate::model::ModelBuilder;
    use crate::test_utils::{at, employee, shift};

    fn build(problem: &Problem) -> ConstraintModel {
        ModelBuilder::new(CoveragePolicy::Partial, 100).build(problem).unwrap()
    }

    #[test]
    fn test_fairness_boundaries() {
        assert_eq!(fairness(&[1, 1, 1, 1]), 1.0);
        assert_eq!(fairness(&[4, 0, 0, 0]), 0.0);
        assert_eq!(fairness(&[1, 0, 0]), 1.0);
        assert_eq!(fairness(&[5]), 1.0);
        let mid = fairness(&[3, 1, 0, 0]);
        assert!(mid > 0.0 && mid < 1.0);
        assert!(fairness(&[2, 2, 0, 0]) > fairness(&[3, 1, 0, 0]));
    }

    #[test]
    fn test_soft_scores() {
        let alice = employee("alice", &["waiter"])
            .with_preference(Preference::prefer_shift("morning", false))
            .with_preference(Preference::unavailable(at(25, 18), at(25, 23), false));
        let bob = employee("bob", &["waiter"])
            .with_preference(Preference::prefer_period(at(29, 0), at(30, 0), false));
        let problem = Problem::new(
            vec![alice, bob, employee("carol", &["waiter"])],
            vec![
                shift("evening", 25, 18, 22, &["waiter"]),
                shift("morning", 25, 8, 14, &["waiter"]),
                shift("sunday", 29, 10, 15, &["waiter"]),
            ],
        );
        let model = build(&problem);
        let weights = ObjectiveWeights::default();
        // evening=alice (violates soft unavailable), morning=alice, sunday=carol
        let assignment = Assignment::from_slots(vec![Some(0), Some(0), Some(2)]);

        let metrics = score(&model, &weights, &assignment);
        assert_eq!(metrics.soft_preference_score, 10 - 10);
        assert_eq!(metrics.total_shifts_assigned, 3);
        assert_eq!(metrics.preferences_satisfied["alice"], 1);
        assert_eq!(metrics.preferences_satisfied["bob"], 0);
        assert!(!metrics.preferences_satisfied.contains_key("carol"));

        let evaluator = Evaluator::new(&model, &weights);
        assert_eq!(evaluator.max_soft_score(), 20);
    }

    #[test]
    fn test_rest_penalty_prefers_spread_shifts() {
        let problem = Problem::new(
            vec![employee("alice", &[])],
            vec![
                shift("close", 25, 16, 23, &[]),
                shift("open", 26, 6, 12, &[]),
                shift("late_open", 26, 14, 20, &[]),
            ],
        );
        let model = build(&problem);
        let weights = ObjectiveWeights::default();
        let evaluator = Evaluator::new(&model, &weights);

        // close ends 23:00, open starts 06:00: 7h rest -> 5h short
        let tight = evaluator.evaluate(&Assignment::from_slots(vec![Some(0), None, Some(0)]));
        assert_eq!(tight.rest_penalty, 5.0);
        // late_open starts 14:00: 15h rest
        let relaxed = evaluator.evaluate(&Assignment::from_slots(vec![Some(0), Some(0), None]));
        assert_eq!(relaxed.rest_penalty, 0.0);
        assert!(relaxed.objective > tight.objective);
    }

    #[test]
    fn test_objective_rewards_coverage_first() {
        let problem = Problem::new(
            vec![employee("alice", &[]), employee("bob", &[])],
            vec![shift("a", 25, 8, 12, &[]), shift("b", 26, 8, 12, &[])],
        );
        let model = build(&problem);
        let weights = ObjectiveWeights::default();
        let evaluator = Evaluator::new(&model, &weights);

        let both_alice = evaluator.evaluate(&Assignment::from_slots(vec![Some(0), Some(0)]));
        let balanced = evaluator.evaluate(&Assignment::from_slots(vec![Some(0), Some(1)]));
        let single = evaluator.evaluate(&Assignment::from_slots(vec![Some(0), None]));

        assert_eq!(both_alice.fairness_score, 0.0);
        assert_eq!(balanced.fairness_score, 1.0);
        assert!(balanced.objective > both_alice.objective);
        assert!(both_alice.objective > single.objective);
    }
}

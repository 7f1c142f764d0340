//! Bounded pool of the best distinct assignments seen so far.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::model::Assignment;
use crate::scoring::Evaluation;

/// A complete feasible assignment with its evaluation.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub assignment: Assignment,
    pub evaluation: Evaluation,
    /// Generation order, the last tie-breaker.
    pub order: u64,
}

impl Candidate {
    /// Best-first ordering: objective desc, fairness desc, order asc.
    pub fn rank_cmp(&self, other: &Candidate) -> Ordering {
        other
            .evaluation
            .objective
            .total_cmp(&self.evaluation.objective)
            .then_with(|| {
                other
                    .evaluation
                    .fairness_score
                    .total_cmp(&self.evaluation.fairness_score)
            })
            .then_with(|| self.order.cmp(&other.order))
    }
}

/// Keeps the `capacity` best distinct candidates, sorted best first.
#[derive(Debug, Clone)]
pub struct CandidatePool {
    capacity: usize,
    entries: Vec<(u64, Candidate)>,
    next_order: u64,
}

impl CandidatePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::with_capacity(capacity.max(1) + 1),
            next_order: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.entries.first().map(|(_, c)| c)
    }

    /// Objective a newcomer must exceed once the pool is full.
    pub fn threshold(&self) -> Option<f64> {
        if self.is_full() {
            self.entries.last().map(|(_, c)| c.evaluation.objective)
        } else {
            None
        }
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter().map(|(_, c)| c)
    }

    /// Offers an assignment; returns `true` if it was kept.
    pub fn offer(&mut self, assignment: &Assignment, evaluation: Evaluation) -> bool {
        let order = self.next_order;
        self.next_order += 1;
        self.insert(Candidate {
            assignment: assignment.clone(),
            evaluation,
            order,
        })
    }

    /// Moves every candidate of `other` into this pool, keeping their relative order.
    pub fn merge(&mut self, other: CandidatePool) {
        for (_, candidate) in other.entries {
            let order = self.next_order;
            self.next_order += 1;
            self.insert(Candidate { order, ..candidate });
        }
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.entries.into_iter().map(|(_, c)| c).collect()
    }

    fn insert(&mut self, candidate: Candidate) -> bool {
        let hash = fingerprint(&candidate.assignment);
        if self
            .entries
            .iter()
            .any(|(h, c)| *h == hash && c.assignment == candidate.assignment)
        {
            return false;
        }
        if self.is_full() {
            match self.entries.last() {
                Some((_, worst)) if candidate.rank_cmp(worst) == Ordering::Less => {}
                _ => return false,
            }
        }
        let pos = self
            .entries
            .partition_point(|(_, c)| c.rank_cmp(&candidate) != Ordering::Greater);
        self.entries.insert(pos, (hash, candidate));
        self.entries.truncate(self.capacity);
        true
    }
}

fn fingerprint(assignment: &Assignment) -> u64 {
    let mut hasher = DefaultHasher::new();
    assignment.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(objective: f64, fairness_score: f64) -> Evaluation {
        Evaluation {
            assigned: 0,
            soft_preference_score: 0,
            fairness_score,
            rest_penalty: 0.0,
            objective,
        }
    }

    fn slots(values: &[Option<usize>]) -> Assignment {
        Assignment::from_slots(values.to_vec())
    }

    #[test]
    fn test_keeps_best_sorted() {
        let mut pool = CandidatePool::new(2);
        assert!(pool.offer(&slots(&[Some(0)]), eval(10.0, 0.5)));
        assert!(pool.offer(&slots(&[Some(1)]), eval(30.0, 0.5)));
        assert!(pool.offer(&slots(&[Some(2)]), eval(20.0, 0.5)));
        assert!(!pool.offer(&slots(&[Some(3)]), eval(5.0, 0.5)));

        let objectives: Vec<f64> = pool.candidates().map(|c| c.evaluation.objective).collect();
        assert_eq!(objectives, vec![30.0, 20.0]);
        assert_eq!(pool.threshold(), Some(20.0));
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut pool = CandidatePool::new(3);
        assert!(pool.offer(&slots(&[Some(0), None]), eval(10.0, 1.0)));
        assert!(!pool.offer(&slots(&[Some(0), None]), eval(10.0, 1.0)));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.threshold(), None);
    }

    #[test]
    fn test_ties_break_on_fairness_then_order() {
        let mut pool = CandidatePool::new(3);
        pool.offer(&slots(&[Some(0)]), eval(10.0, 0.2));
        pool.offer(&slots(&[Some(1)]), eval(10.0, 0.9));
        pool.offer(&slots(&[Some(2)]), eval(10.0, 0.2));

        let firsts: Vec<Option<usize>> = pool.candidates().map(|c| c.assignment.get(0)).collect();
        assert_eq!(firsts, vec![Some(1), Some(0), Some(2)]);
    }

    #[test]
    fn test_equal_to_worst_is_rejected_when_full() {
        let mut pool = CandidatePool::new(1);
        pool.offer(&slots(&[Some(0)]), eval(10.0, 0.5));
        assert!(!pool.offer(&slots(&[Some(1)]), eval(10.0, 0.5)));
        assert_eq!(pool.best().map(|c| c.assignment.get(0)), Some(Some(0)));
    }

    #[test]
    fn test_merge_preserves_chain_order() {
        let mut global = CandidatePool::new(4);
        global.offer(&slots(&[Some(0)]), eval(10.0, 0.5));
        let mut chain = CandidatePool::new(4);
        chain.offer(&slots(&[Some(1)]), eval(10.0, 0.5));
        chain.offer(&slots(&[Some(0)]), eval(10.0, 0.5));
        global.merge(chain);

        let firsts: Vec<Option<usize>> = global.candidates().map(|c| c.assignment.get(0)).collect();
        assert_eq!(firsts, vec![Some(0), Some(1)]);
    }
}

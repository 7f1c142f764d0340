//! Benchmark for objective evaluation and full solves.
//!
//! Run with: cargo run --release --bin bench

use shift_optimizer::config::OptimizerConfig;
use shift_optimizer::model::{Assignment, ModelBuilder};
use shift_optimizer::scoring::Evaluator;
use shift_optimizer::solver::{self, Termination};
use shift_optimizer::demo_data;
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let problem = demo_data::generate(demo_data::DemoData::Large);
    let config = OptimizerConfig::default();

    println!("Benchmark: Objective Evaluation");
    println!("  Shifts: {}", problem.shifts.len());
    println!("  Employees: {}", problem.employees.len());
    println!();

    let model = ModelBuilder::new(config.solver.coverage, config.solver.max_solutions_limit).build(&problem)?;
    let evaluator = Evaluator::new(&model, &config.weights);
    let mut assignment = Assignment::empty(model.shift_count());

    let initial = evaluator.evaluate(&assignment);
    println!("Initial objective: {:.2}", initial.objective);

    // Set/restore every eligible shift x employee pair and re-evaluate each time
    let bench_start = Instant::now();
    let mut evaluations: u64 = 0;
    for shift in 0..model.shift_count() {
        let old = assignment.get(shift);
        for &employee in &model.candidates[shift] {
            assignment.set(shift, Some(employee));
            let _ = evaluator.evaluate(&assignment);
            assignment.set(shift, old);
            let _ = evaluator.evaluate(&assignment);
            evaluations += 2;
        }
    }
    let elapsed = bench_start.elapsed();

    println!("Results:");
    println!("  Evaluations: {}", evaluations);
    println!("  Time: {:.2?}", elapsed);
    println!("  Evaluations/sec: {:.0}", evaluations as f64 / elapsed.as_secs_f64());

    let final_objective = evaluator.evaluate(&assignment).objective;
    assert_eq!(initial.objective, final_objective, "Objective corrupted!");
    println!();

    println!("Benchmark: Full Solve");
    let solve_start = Instant::now();
    let output = solver::optimize(&problem, &config, &Termination::new(config.solver.time_limit(), Default::default()))?;
    println!("  Solutions: {}", output.solutions.len());
    println!("  Nodes: {}", output.stats.nodes);
    println!("  Local search steps: {}", output.stats.steps);
    println!("  Time: {:.2?}", solve_start.elapsed());
    if let Some(best) = output.solutions.first() {
        println!(
            "  Best: {} assigned, soft {}, fairness {:.3}",
            best.metrics.total_shifts_assigned, best.metrics.soft_preference_score, best.metrics.fairness_score
        );
    }
    Ok(())
}

//! Colorful console output for solver runs.
//!
//! Everything here prints only when the `console` feature is enabled;
//! [`PhaseTimer`] keeps counting either way.

use chrono::Local;
use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::time::{Duration, Instant};

const ENABLED: bool = cfg!(feature = "console");

/// Startup banner.
pub fn print_banner() {
    if !ENABLED {
        return;
    }
    let art = r#"
  ____  _     _  __ _      ___        _   _           _
 / ___|| |__ (_)/ _| |_   / _ \ _ __ | |_(_)_ __ ___ (_)_______ _ __
 \___ \| '_ \| | |_| __| | | | | '_ \| __| | '_ ` _ \| |_  / _ \ '__|
  ___) | | | | |  _| |_  | |_| | |_) | |_| | | | | | | |/ /  __/ |
 |____/|_| |_|_|_|  \__|  \___/| .__/ \__|_|_| |_| |_|_/___\___|_|
                               |_|
"#;
    println!("{}", art.bright_cyan().bold());
    println!(
        "  {}  {}\n",
        concat!("v", env!("CARGO_PKG_VERSION")).bright_black(),
        "stateless shift assignment".cyan()
    );
}

/// Prints the compiled problem size.
pub fn print_problem(employees: usize, shifts: usize, pins: usize, requirements: usize, soft_terms: usize) {
    if !ENABLED {
        return;
    }
    println!(
        "{} Problem: {} employees, {} shifts, {} pins, {} required periods, {} soft preferences (scale {})",
        header("Solver"),
        count(employees).bright_yellow(),
        count(shifts).bright_yellow(),
        count(pins).bright_yellow(),
        count(requirements).bright_yellow(),
        count(soft_terms).bright_yellow(),
        problem_scale(shifts, employees + 1).bright_magenta()
    );
}

/// Prints the final line of a solve call.
pub fn print_solving_ended(total_duration: Duration, total_moves: u64, solutions: usize, best_objective: Option<f64>) {
    if !ENABLED {
        return;
    }
    let outcome = match best_objective {
        Some(_) => "feasible".bright_green().bold().to_string(),
        None => "infeasible".bright_red().bold().to_string(),
    };
    println!(
        "{} Solving ended {}: {} solution(s), best objective {}, {} in {} ({} moves/sec)",
        header("Solver"),
        outcome,
        solutions.to_string().white().bold(),
        format_objective(best_objective),
        count(total_moves).white(),
        format_duration(total_duration).yellow(),
        count(per_second(total_moves, total_duration)).bright_magenta()
    );
}

/// `HH:MM:SS.mmm INFO [tag]`
fn header(tag: &str) -> String {
    format!(
        "{} {} {}",
        Local::now().format("%H:%M:%S%.3f").bright_black(),
        "INFO".bright_green(),
        format!("[{}]", tag).bright_cyan()
    )
}

fn count<T: ToFormattedString>(n: T) -> String {
    n.to_formatted_string(&Locale::en)
}

fn per_second(moves: u64, duration: Duration) -> u64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        (moves as f64 / secs) as u64
    } else {
        0
    }
}

/// Human readable duration: `ms` below a second, `s` below a minute.
pub fn format_duration(d: Duration) -> String {
    match d.as_millis() {
        ms @ 0..=999 => format!("{}ms", ms),
        1_000..=59_999 => format!("{:.2}s", d.as_secs_f64()),
        ms => format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000),
    }
}

fn format_objective(objective: Option<f64>) -> String {
    match objective {
        Some(value) if value < 0.0 => format!("{:.1}", value).bright_red().to_string(),
        Some(value) => format!("{:.1}", value).bright_green().to_string(),
        None => "-".white().to_string(),
    }
}

/// Search space size `values ^ variables` in scientific notation.
fn problem_scale(variables: usize, values: usize) -> String {
    if variables == 0 || values == 0 {
        return "0".to_string();
    }
    let log10 = variables as f64 * (values as f64).log10();
    let exponent = log10.floor();
    format!("{:.3} × 10^{}", 10f64.powf(log10 - exponent), exponent as i64)
}

/// Times one search phase and prints its start and end lines.
pub struct PhaseTimer {
    name: &'static str,
    index: usize,
    started: Instant,
    moves: u64,
    accepted: u64,
    best: Option<f64>,
}

impl PhaseTimer {
    pub fn start(name: &'static str, index: usize) -> Self {
        if ENABLED {
            println!("{} {} phase ({}) started", header(name), name.white().bold(), index.yellow());
        }
        Self {
            name,
            index,
            started: Instant::now(),
            moves: 0,
            accepted: 0,
            best: None,
        }
    }

    pub fn record_move(&mut self) {
        self.moves += 1;
    }

    /// Counts an accepted state with the given objective.
    pub fn record_accepted(&mut self, objective: f64) {
        self.accepted += 1;
        self.observe(objective);
    }

    /// Adds counters gathered outside the timer, e.g. by parallel chains.
    pub fn record_totals(&mut self, moves: u64, accepted: u64, best: f64) {
        self.moves += moves;
        self.accepted += accepted;
        self.observe(best);
    }

    pub fn moves_evaluated(&self) -> u64 {
        self.moves
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn finish(self) {
        if !ENABLED {
            return;
        }
        let elapsed = self.started.elapsed();
        let rate = if self.moves > 0 {
            self.accepted as f64 * 100.0 / self.moves as f64
        } else {
            0.0
        };
        println!(
            "{} {} phase ({}) ended in {}: best objective {}, {} moves/sec, {} accepted ({:.1}%)",
            header(self.name),
            self.name.white().bold(),
            self.index.yellow(),
            format_duration(elapsed).yellow(),
            format_objective(self.best),
            count(per_second(self.moves, elapsed)).bright_magenta().bold(),
            count(self.accepted).white(),
            rate
        );
    }

    fn observe(&mut self, objective: f64) {
        if self.best.map_or(true, |best| objective > best) {
            self.best = Some(objective);
        }
    }
}

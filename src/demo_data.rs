//! Demo problems for the shift optimizer.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::{Employee, Preference, Problem, Shift};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    /// Four bar employees over Christmas week.
    Bar,
    /// A seeded restaurant fortnight.
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BAR" => Ok(DemoData::Bar),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Bar => "BAR",
            DemoData::Large => "LARGE",
        }
    }
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    [DemoData::Bar, DemoData::Large].map(|d| d.as_str()).to_vec()
}

/// Generates the demo problem.
pub fn generate(demo: DemoData) -> Problem {
    match demo {
        DemoData::Bar => generate_bar(),
        DemoData::Large => generate_large(),
    }
}

fn generate_bar() -> Problem {
    let employees = vec![
        Employee::new("alice", "Alice")
            .with_abilities(["bartender", "waiter"])
            .with_preference(Preference::prefer_shift("evening", false)),
        // Prefers Sunday Dec 29
        Employee::new("bob", "Bob")
            .with_abilities(["waiter", "kitchen"])
            .with_preference(Preference::prefer_period(at(29, 0, 0), at(30, 0, 0), false)),
        Employee::new("carol", "Carol")
            .with_abilities(["bartender", "waiter"])
            .with_preference(Preference::unavailable(at(25, 0, 0), at(25, 23, 59), true)),
        Employee::new("dave", "Dave").with_abilities(["waiter"]),
    ];

    let shifts = vec![
        Shift::new("morning", "Morning Shift", at(25, 8, 0), at(25, 14, 0)).requiring(["waiter"]),
        Shift::new("afternoon", "Afternoon Shift", at(25, 14, 0), at(25, 20, 0)).requiring(["waiter"]),
        Shift::new("evening", "Evening Shift", at(25, 20, 0), at(26, 2, 0)).requiring(["bartender"]),
        Shift::new("sunday_brunch", "Sunday Brunch", at(29, 10, 0), at(29, 15, 0)).requiring(["waiter"]),
    ];

    Problem::new(employees, shifts).with_max_solutions(5)
}

/// December 2024 timestamp.
fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    let date = NaiveDate::from_ymd_opt(2024, 12, day).unwrap_or_default();
    NaiveDateTime::new(date, time(hour, minute))
}

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

const ROLES: &[&str] = &["waiter", "bartender", "kitchen", "host"];

/// (name, start hour, length in hours)
const SLOTS: &[(&str, u32, i64)] = &[("Morning", 8, 6), ("Afternoon", 14, 6), ("Evening", 20, 6)];

const DAYS: i64 = 14;
const EMPLOYEE_COUNT: usize = 24;

fn generate_large() -> Problem {
    let mut rng = StdRng::seed_from_u64(0);
    let start_date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap_or_default();

    let names = generate_name_permutations(&mut rng);
    let mut employees: Vec<Employee> = (0..EMPLOYEE_COUNT)
        .map(|i| {
            let ability_count = pick_count(&mut rng, &[(1, 3.0), (2, 2.0), (3, 1.0)]);
            let abilities: Vec<&str> = ROLES.choose_multiple(&mut rng, ability_count).copied().collect();
            Employee::new(format!("emp-{:02}", i), names[i % names.len()].clone()).with_abilities(abilities)
        })
        .collect();

    let mut shifts = Vec::new();
    for day in 0..DAYS {
        let date = start_date + Duration::days(day);
        for &(slot, hour, hours) in SLOTS {
            let start = NaiveDateTime::new(date, time(hour, 0));
            let end = start + Duration::hours(hours);
            for role in ROLES {
                let count = pick_count(&mut rng, &[(0, 1.0), (1, 3.0), (2, 1.0)]);
                for n in 0..count {
                    shifts.push(
                        Shift::new(
                            format!("d{:02}-{}-{}-{}", day, slot.to_lowercase(), role, n),
                            format!("{} {} {}", date.format("%a %d %b"), slot, role),
                            start,
                            end,
                        )
                        .requiring([*role]),
                    );
                }
            }
        }
    }

    for employee in &mut employees {
        let preference_count = pick_count(&mut rng, &[(0, 1.0), (1, 2.0), (2, 2.0), (3, 1.0)]);
        for _ in 0..preference_count {
            let day = start_date + Duration::days(rng.gen_range(0..DAYS));
            let day_start = NaiveDateTime::new(day, time(0, 0));
            let day_end = day_start + Duration::days(1);
            let preference = match rng.gen_range(0..4) {
                0 => match shifts.choose(&mut rng) {
                    Some(shift) => Preference::prefer_shift(shift.id.clone(), false),
                    None => continue,
                },
                1 => Preference::prefer_period(day_start, day_end, false),
                2 => Preference::unavailable(day_start, day_end, true),
                _ => Preference::unavailable(day_start, day_end, false),
            };
            employee.preferences.push(preference);
        }
    }

    Problem::new(employees, shifts).with_max_solutions(3)
}

/// Pick a count based on weighted distribution.
fn pick_count(rng: &mut StdRng, distribution: &[(usize, f64)]) -> usize {
    let total_weight: f64 = distribution.iter().map(|(_, w)| w).sum();
    let mut choice = rng.gen::<f64>() * total_weight;

    for (count, weight) in distribution {
        if choice < *weight {
            return *count;
        }
        choice -= weight;
    }
    distribution.last().map(|(c, _)| *c).unwrap_or(1)
}

const FIRST_NAMES: &[&str] = &["Amy", "Beth", "Carl", "Dan", "Elsa", "Flo", "Gus", "Hugo", "Ivy", "Jay"];
const LAST_NAMES: &[&str] = &["Cole", "Fox", "Green", "Jones", "King", "Li", "Poe", "Rye", "Smith", "Watt"];

fn generate_name_permutations(rng: &mut StdRng) -> Vec<String> {
    let mut names = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            names.push(format!("{} {}", first, last));
        }
    }
    names.shuffle(rng);
    names
}

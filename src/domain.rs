//! Domain model for the shift assignment problem.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashSet};

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Returns `true` when `end` is strictly after `start`.
    pub fn is_well_formed(&self) -> bool {
        self.end > self.start
    }

    /// Returns `true` if the two windows share any instant.
    ///
    /// Back-to-back windows (one ends exactly when the other starts) do not overlap.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use shift_optimizer::domain::TimeWindow;
    ///
    /// let day = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
    /// let morning = TimeWindow::new(day.and_hms_opt(8, 0, 0).unwrap(), day.and_hms_opt(14, 0, 0).unwrap());
    /// let afternoon = TimeWindow::new(day.and_hms_opt(14, 0, 0).unwrap(), day.and_hms_opt(20, 0, 0).unwrap());
    /// let lunch = TimeWindow::new(day.and_hms_opt(12, 0, 0).unwrap(), day.and_hms_opt(15, 0, 0).unwrap());
    ///
    /// assert!(!morning.overlaps(&afternoon));
    /// assert!(morning.overlaps(&lunch));
    /// assert!(lunch.overlaps(&afternoon));
    /// ```
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// What an `Unavailable` preference blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableTarget {
    /// An explicit time window.
    Window(TimeWindow),
    /// The time window of a specific shift.
    Shift(String),
}

/// A preference expressed by an employee.
///
/// `is_hard = true` turns the preference into a hard constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preference {
    /// The employee wants this specific shift.
    PreferShift { shift_id: String, is_hard: bool },
    /// The employee wants to work at least one shift overlapping the window.
    PreferPeriod { window: TimeWindow, is_hard: bool },
    /// The employee cannot work during the target.
    Unavailable {
        target: UnavailableTarget,
        is_hard: bool,
    },
}

impl Preference {
    pub fn prefer_shift(shift_id: impl Into<String>, is_hard: bool) -> Self {
        Preference::PreferShift {
            shift_id: shift_id.into(),
            is_hard,
        }
    }

    pub fn prefer_period(start: NaiveDateTime, end: NaiveDateTime, is_hard: bool) -> Self {
        Preference::PreferPeriod {
            window: TimeWindow::new(start, end),
            is_hard,
        }
    }

    pub fn unavailable(start: NaiveDateTime, end: NaiveDateTime, is_hard: bool) -> Self {
        Preference::Unavailable {
            target: UnavailableTarget::Window(TimeWindow::new(start, end)),
            is_hard,
        }
    }

    pub fn unavailable_for_shift(shift_id: impl Into<String>, is_hard: bool) -> Self {
        Preference::Unavailable {
            target: UnavailableTarget::Shift(shift_id.into()),
            is_hard,
        }
    }

    pub fn is_hard(&self) -> bool {
        match self {
            Preference::PreferShift { is_hard, .. }
            | Preference::PreferPeriod { is_hard, .. }
            | Preference::Unavailable { is_hard, .. } => *is_hard,
        }
    }

    /// Wire name of the preference kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Preference::PreferShift { .. } => "prefer_shift",
            Preference::PreferPeriod { .. } => "prefer_period",
            Preference::Unavailable { .. } => "unavailable_period",
        }
    }
}

/// An employee who can be assigned to shifts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub abilities: HashSet<String>,
    pub preferences: Vec<Preference>,
}

impl Employee {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            abilities: HashSet::new(),
            preferences: Vec::new(),
        }
    }

    pub fn with_abilities(mut self, abilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for ability in abilities {
            self.abilities.insert(ability.into());
        }
        self
    }

    pub fn with_preference(mut self, preference: Preference) -> Self {
        self.preferences.push(preference);
        self
    }

    /// Returns `true` if this employee holds every ability the shift requires.
    pub fn can_staff(&self, shift: &Shift) -> bool {
        shift.required_abilities.is_subset(&self.abilities)
    }
}

/// A shift that needs to be staffed by one employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub id: String,
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub required_abilities: HashSet<String>,
}

impl Shift {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start,
            end,
            required_abilities: HashSet::new(),
        }
    }

    pub fn requiring(mut self, abilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for ability in abilities {
            self.required_abilities.insert(ability.into());
        }
        self
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

/// A request-scoped snapshot handed to the optimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub employees: Vec<Employee>,
    pub shifts: Vec<Shift>,
    pub max_solutions: i64,
}

impl Problem {
    pub fn new(employees: Vec<Employee>, shifts: Vec<Shift>) -> Self {
        Self {
            employees,
            shifts,
            max_solutions: 1,
        }
    }

    pub fn with_max_solutions(mut self, max_solutions: i64) -> Self {
        self.max_solutions = max_solutions;
        self
    }
}

/// Per-solution quality figures reported to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub soft_preference_score: i64,
    pub fairness_score: f64,
    /// Satisfied soft preferences per employee id.
    pub preferences_satisfied: BTreeMap<String, i64>,
    pub total_shifts_assigned: usize,
}

/// A shift id to employee id mapping with its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub assignments: BTreeMap<String, String>,
    pub metrics: Metrics,
}

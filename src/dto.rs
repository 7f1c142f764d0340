//! DTOs for the optimize wire contract.
//!
//! Field names are snake_case. Preferences are a union tagged by `"type"`.
//! Timestamps are ISO-8601 with or without an offset and with up to nine
//! fractional digits; offset timestamps are normalized to UTC.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Employee, Preference, Problem, Shift, Solution, TimeWindow, UnavailableTarget};
use crate::error::ValidationError;

/// Format used when timestamps are written.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Offset-free layouts accepted on input, tried in order.
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parses an ISO-8601 timestamp.
///
/// ```
/// use shift_optimizer::dto::parse_timestamp;
///
/// let naive = parse_timestamp("2024-12-25T08:00:00").unwrap();
/// assert_eq!(parse_timestamp("2024-12-25T08:00:00.0000000").unwrap(), naive);
/// assert_eq!(parse_timestamp("2024-12-25T09:00:00+01:00").unwrap(), naive);
/// assert_eq!(parse_timestamp("2024-12-25T08:00:00.0000000Z").unwrap(), naive);
/// assert!(parse_timestamp("Christmas morning").is_err());
/// ```
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("invalid ISO-8601 timestamp '{raw}'"))
}

mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(super::TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(de::Error::custom)
    }
}

mod optional_timestamp {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::timestamp::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_timestamp(&raw).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

fn default_max_solutions() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

/// Body of `POST /api/optimize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub employees: Vec<EmployeeDto>,
    #[serde(default)]
    pub shifts: Vec<ShiftDto>,
    /// Upper bound on returned solutions.
    #[serde(default = "default_max_solutions")]
    pub max_solutions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub preferences: Vec<PreferenceDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShiftDto {
    pub id: String,
    pub name: String,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = DateTime)]
    pub start_time: NaiveDateTime,
    #[serde(with = "timestamp")]
    #[schema(value_type = String, format = DateTime)]
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub required_abilities: Vec<String>,
}

/// An employee preference, discriminated by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreferenceDto {
    /// Wants (or, if hard, must work) a specific shift.
    PreferShift {
        #[serde(default)]
        shift_id: Option<String>,
        #[serde(default)]
        is_hard: bool,
    },
    /// Wants (or, if hard, must work) a shift overlapping `[start, end)`.
    PreferPeriod {
        #[serde(default, with = "optional_timestamp")]
        #[schema(value_type = Option<String>, format = DateTime)]
        start: Option<NaiveDateTime>,
        #[serde(default, with = "optional_timestamp")]
        #[schema(value_type = Option<String>, format = DateTime)]
        end: Option<NaiveDateTime>,
        #[serde(default)]
        is_hard: bool,
    },
    /// Cannot work during `[start, end)`, or during the window of `shift_id`.
    UnavailablePeriod {
        #[serde(default, with = "optional_timestamp")]
        #[schema(value_type = Option<String>, format = DateTime)]
        start: Option<NaiveDateTime>,
        #[serde(default, with = "optional_timestamp")]
        #[schema(value_type = Option<String>, format = DateTime)]
        end: Option<NaiveDateTime>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shift_id: Option<String>,
        #[serde(default = "default_true")]
        is_hard: bool,
    },
}

impl PreferenceDto {
    fn kind(&self) -> &'static str {
        match self {
            PreferenceDto::PreferShift { .. } => "prefer_shift",
            PreferenceDto::PreferPeriod { .. } => "prefer_period",
            PreferenceDto::UnavailablePeriod { .. } => "unavailable_period",
        }
    }

    fn to_domain(&self, employee_id: &str, index: usize) -> Result<Preference, ValidationError> {
        let missing = || ValidationError::MissingPreferenceTarget {
            employee_id: employee_id.to_string(),
            kind: self.kind(),
            index,
        };
        match self {
            PreferenceDto::PreferShift { shift_id, is_hard } => {
                let shift_id = shift_id.as_ref().ok_or_else(missing)?;
                Ok(Preference::prefer_shift(shift_id.clone(), *is_hard))
            }
            PreferenceDto::PreferPeriod { start, end, is_hard } => match (start, end) {
                (Some(start), Some(end)) => Ok(Preference::prefer_period(*start, *end, *is_hard)),
                _ => Err(missing()),
            },
            PreferenceDto::UnavailablePeriod {
                start,
                end,
                shift_id,
                is_hard,
            } => match (start, end, shift_id) {
                (Some(start), Some(end), _) => Ok(Preference::unavailable(*start, *end, *is_hard)),
                (_, _, Some(shift_id)) => Ok(Preference::unavailable_for_shift(shift_id.clone(), *is_hard)),
                _ => Err(missing()),
            },
        }
    }

    fn from_domain(preference: &Preference) -> Self {
        match preference {
            Preference::PreferShift { shift_id, is_hard } => PreferenceDto::PreferShift {
                shift_id: Some(shift_id.clone()),
                is_hard: *is_hard,
            },
            Preference::PreferPeriod { window, is_hard } => PreferenceDto::PreferPeriod {
                start: Some(window.start),
                end: Some(window.end),
                is_hard: *is_hard,
            },
            Preference::Unavailable { target, is_hard } => {
                let (start, end, shift_id) = match target {
                    UnavailableTarget::Window(TimeWindow { start, end }) => (Some(*start), Some(*end), None),
                    UnavailableTarget::Shift(shift_id) => (None, None, Some(shift_id.clone())),
                };
                PreferenceDto::UnavailablePeriod {
                    start,
                    end,
                    shift_id,
                    is_hard: *is_hard,
                }
            }
        }
    }
}

impl OptimizeRequest {
    /// Converts to the domain problem; reference checks happen in the model builder.
    pub fn to_domain(&self) -> Result<Problem, ValidationError> {
        let employees = self
            .employees
            .iter()
            .map(|e| {
                let preferences = e
                    .preferences
                    .iter()
                    .enumerate()
                    .map(|(index, p)| p.to_domain(&e.id, index))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut employee = Employee::new(e.id.clone(), e.name.clone()).with_abilities(e.abilities.iter().cloned());
                employee.preferences = preferences;
                Ok(employee)
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let shifts = self
            .shifts
            .iter()
            .map(|s| {
                Shift::new(s.id.clone(), s.name.clone(), s.start_time, s.end_time)
                    .requiring(s.required_abilities.iter().cloned())
            })
            .collect();

        Ok(Problem::new(employees, shifts).with_max_solutions(self.max_solutions))
    }

    pub fn from_domain(problem: &Problem) -> Self {
        let sorted = |set: &std::collections::HashSet<String>| {
            let mut v: Vec<String> = set.iter().cloned().collect();
            v.sort();
            v
        };
        Self {
            employees: problem
                .employees
                .iter()
                .map(|e| EmployeeDto {
                    id: e.id.clone(),
                    name: e.name.clone(),
                    abilities: sorted(&e.abilities),
                    preferences: e.preferences.iter().map(PreferenceDto::from_domain).collect(),
                })
                .collect(),
            shifts: problem
                .shifts
                .iter()
                .map(|s| ShiftDto {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    start_time: s.start,
                    end_time: s.end,
                    required_abilities: sorted(&s.required_abilities),
                })
                .collect(),
            max_solutions: problem.max_solutions,
        }
    }
}

/// Response envelope of `POST /api/optimize`.
///
/// `success = true` always comes with at least one solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OptimizeResponse {
    pub success: bool,
    /// Best first.
    pub solutions: Vec<SolutionDto>,
    pub error: Option<String>,
}

impl OptimizeResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            solutions: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SolutionDto {
    /// Shift id to employee id.
    pub assignments: BTreeMap<String, String>,
    pub metrics: SolutionMetricsDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SolutionMetricsDto {
    pub soft_preference_score: i64,
    pub fairness_score: f64,
    /// Satisfied soft preferences per employee id.
    pub preferences_satisfied: BTreeMap<String, i64>,
    pub total_shifts_assigned: usize,
}

impl From<&Solution> for SolutionDto {
    fn from(solution: &Solution) -> Self {
        Self {
            assignments: solution.assignments.clone(),
            metrics: SolutionMetricsDto {
                soft_preference_score: solution.metrics.soft_preference_score,
                fairness_score: solution.metrics.fairness_score,
                preferences_satisfied: solution.metrics.preferences_satisfied.clone(),
                total_shifts_assigned: solution.metrics.total_shifts_assigned,
            },
        }
    }
}

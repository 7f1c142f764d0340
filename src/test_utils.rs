//! Fixtures shared by unit tests.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::{Employee, Shift};

/// December `day`, 2024 at `hour`:`00`. Hours past 23 roll into the next day.
pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    let date = NaiveDate::from_ymd_opt(2024, 12, day).unwrap();
    date.and_hms_opt(0, 0, 0).unwrap() + chrono::Duration::hours(i64::from(hour))
}

pub fn employee(id: &str, abilities: &[&str]) -> Employee {
    let mut name = id.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    Employee::new(id, name).with_abilities(abilities.iter().copied())
}

pub fn shift(id: &str, day: u32, start_hour: u32, end_hour: u32, abilities: &[&str]) -> Shift {
    Shift::new(id, id, at(day, start_hour), at(day, end_hour)).requiring(abilities.iter().copied())
}

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::clock::Clock;

/// Inclusive range of calendar days. Every dashboard window (week, month, year) is expressed
/// through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    /// Returns [None] if `end` comes before `start`.
    pub fn new_opt(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if end < start {
            None
        } else {
            Some(Self { start, end })
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn len_days(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    /// Iterates over every day of the interval, both ends included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(self.len_days() as usize)
    }
}

/// ISO-8601 week identifier. `year` is the ISO week-year, which differs from the calendar year
/// for a few days around new year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

/// Calendar month identifier, `month` is 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

/// Returns the 7 day window containing `date`, where weeks begin on `week_start`.
pub fn week_interval(date: NaiveDate, week_start: Weekday) -> DateInterval {
    let week = date.week(week_start);
    DateInterval {
        start: week.first_day(),
        end: week.last_day(),
    }
}

pub fn month_interval(date: NaiveDate) -> DateInterval {
    let start = date
        .with_day(1)
        .expect("First day of month always exists");
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.checked_sub_days(Days::new(1)))
        .expect("End of time should never happen");
    DateInterval { start, end }
}

/// January 1st to December 31st of `year`.
pub fn year_interval(year: i32) -> DateInterval {
    DateInterval {
        start: NaiveDate::from_ymd_opt(year, 1, 1).expect("Year should be in chrono's range"),
        end: NaiveDate::from_ymd_opt(year, 12, 31).expect("Year should be in chrono's range"),
    }
}

pub fn current_week_interval(clock: &impl Clock, week_start: Weekday) -> DateInterval {
    week_interval(clock.today(), week_start)
}

pub fn current_month_interval(clock: &impl Clock) -> DateInterval {
    month_interval(clock.today())
}

pub fn current_year_interval(clock: &impl Clock) -> DateInterval {
    year_interval(clock.today().year())
}

/// Strict ISO-8601 week numbering. Weeks start on Monday and week 1 is the week holding the
/// first Thursday of the year, so 2024-12-30 is week 1 of 2025.
pub fn week_of_year(date: NaiveDate) -> WeekKey {
    let iso = date.iso_week();
    WeekKey {
        year: iso.year(),
        week: iso.week(),
    }
}

/// Number of ISO weeks (52 or 53) in the ISO week-year.
pub fn iso_weeks_in_year(year: i32) -> u32 {
    // December 28th always falls into the last ISO week of its year.
    NaiveDate::from_ymd_opt(year, 12, 28)
        .map(|v| v.iso_week().week())
        .unwrap_or(52)
}

/// Every week of the ISO week-year, in order.
pub fn iso_weeks(year: i32) -> impl Iterator<Item = WeekKey> {
    (1..=iso_weeks_in_year(year)).map(move |week| WeekKey { year, week })
}

pub fn month_index(date: NaiveDate) -> u32 {
    date.month()
}

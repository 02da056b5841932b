use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

/// Represents an entity responsible for providing the current moment across the application.
/// Queries never read the wall clock directly, which keeps them pure and lets tests pin "today".
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    /// Local wall-clock time.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock frozen at a single moment. Used when the user asks for a dashboard "as of" some date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(NaiveDateTime);

impl FixedClock {
    pub fn new(moment: NaiveDateTime) -> Self {
        Self(moment)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for FixedClock {
    fn from(value: DateTime<Tz>) -> Self {
        Self(value.naive_local())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

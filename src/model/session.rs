use std::{fmt::Display, sync::Arc};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub Arc<str>);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityTypeId(pub Arc<str>);

impl Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for ActivityTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<&str> for ActivityTypeId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

/// How a session points at its project. Older records only carry the project name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRef {
    Id(ProjectId),
    Name(Arc<str>),
}

/// When a session happened. Duration is always derived from the span; only records whose
/// timestamps are unusable keep a stored duration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    Span {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    /// Legacy record without a parseable date. It takes part in all-time totals only.
    Undated {
        #[serde(with = "duration_ser")]
        duration: Duration,
    },
}

/// User rating of a session, 0 to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mood(u8);

impl Mood {
    pub const MAX: u8 = 10;

    pub fn new_opt(value: i64) -> Option<Mood> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Mood)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// One logged block of tracked time. Sessions are read-only inputs of the aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    pub id: Arc<str>,
    pub timing: Timing,
    pub project: ProjectRef,
    pub activity_type: Option<ActivityTypeId>,
    pub notes: Arc<str>,
    pub mood: Option<Mood>,
    pub action: Option<Arc<str>>,
    pub is_milestone: bool,
}

impl Session {
    /// Creates a session spanning `start..end`. `end` before `start` is rejected; callers that
    /// read a time of day without a date are expected to roll the end into the next day first.
    pub fn spanning(
        id: impl Into<Arc<str>>,
        project: ProjectRef,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self, SessionError> {
        let id = id.into();
        if end < start {
            return Err(SessionError::EndBeforeStart {
                id: id.to_string(),
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self::with_timing(id, project, Timing::Span { start, end }))
    }

    pub fn undated(
        id: impl Into<Arc<str>>,
        project: ProjectRef,
        duration: Duration,
    ) -> Result<Self, SessionError> {
        let id = id.into();
        if duration < Duration::zero() {
            return Err(SessionError::NegativeDuration {
                id: id.to_string(),
                minutes: duration.num_minutes(),
            });
        }
        Ok(Self::with_timing(id, project, Timing::Undated { duration }))
    }

    fn with_timing(id: Arc<str>, project: ProjectRef, timing: Timing) -> Self {
        Self {
            id,
            timing,
            project,
            activity_type: None,
            notes: "".into(),
            mood: None,
            action: None,
            is_milestone: false,
        }
    }

    pub fn duration(&self) -> Duration {
        match &self.timing {
            Timing::Span { start, end } => *end - *start,
            Timing::Undated { duration } => *duration,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.duration().num_seconds()
    }

    pub fn hours(&self) -> f64 {
        self.seconds() as f64 / 3600.
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        match &self.timing {
            Timing::Span { start, .. } => Some(*start),
            Timing::Undated { .. } => None,
        }
    }

    /// Day the session is bucketed under. Sessions crossing midnight belong to the day they
    /// started on.
    pub fn date(&self) -> Option<NaiveDate> {
        self.start().map(|v| v.date())
    }

    pub fn with_activity_type(self, activity_type: Option<ActivityTypeId>) -> Self {
        Self {
            activity_type,
            ..self
        }
    }

    pub fn with_notes(self, notes: impl Into<Arc<str>>) -> Self {
        Self {
            notes: notes.into(),
            ..self
        }
    }

    pub fn with_mood(self, mood: Option<Mood>) -> Self {
        Self { mood, ..self }
    }

    pub fn with_milestone(self, action: impl Into<Arc<str>>) -> Self {
        Self {
            action: Some(action.into()),
            is_milestone: true,
            ..self
        }
    }

    pub fn with_action(self, action: Option<Arc<str>>, is_milestone: bool) -> Self {
        Self {
            action,
            is_milestone,
            ..self
        }
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(s))
    }
}

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::{
    error::SessionError,
    model::{ActivityTypeId, Mood, ProjectRef, Session},
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// A session as it's stored on disk, one JSON object per line. Fields are kept as loose as the
/// files written by older app versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Project name. The only project reference in old records.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub activity_type_id: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub mood: Option<i64>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub is_milestone: Option<bool>,
    /// Replaced by `action` + `is_milestone`.
    #[serde(default)]
    pub milestone_text: Option<String>,
}

impl TryFrom<SessionRecord> for Session {
    type Error = SessionError;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        let project = project_ref(&record)?;

        let date = NaiveDate::parse_from_str(record.date.trim(), DATE_FORMAT).ok();
        let session = match parse_span(date, &record) {
            Some((start, end)) => {
                if let Some(stored) = record.duration_minutes {
                    let derived = (end - start).num_minutes();
                    if stored != derived {
                        trace!(
                            "Session {} stores {stored} minutes but spans {derived}, using the span",
                            record.id
                        );
                    }
                }
                Session::spanning(record.id.as_str(), project, start, end)?
            }
            None => match (date, record.duration_minutes) {
                (_, Some(minutes)) if minutes < 0 => {
                    return Err(SessionError::NegativeDuration {
                        id: record.id,
                        minutes,
                    })
                }
                (Some(date), Some(minutes)) => {
                    trace!("Session {} has no end time, using its stored duration", record.id);
                    let start = Moment::parse(Some(date), &record.start_time)
                        .map_or(date.and_time(NaiveTime::MIN), |v| v.value());
                    let end = start + Duration::minutes(minutes);
                    Session::spanning(record.id.as_str(), project, start, end)?
                }
                (None, Some(minutes)) => {
                    trace!("Session {} has no usable date, keeping it undated", record.id);
                    Session::undated(record.id.as_str(), project, Duration::minutes(minutes))?
                }
                (_, None) => return Err(SessionError::MissingTiming { id: record.id }),
            },
        };

        let mood = record.mood.and_then(|v| {
            let mood = Mood::new_opt(v);
            if mood.is_none() {
                warn!("Session {} has mood {v} outside of 0-10, ignoring it", record.id);
            }
            mood
        });

        let (action, is_milestone) = milestone(&record);

        Ok(session
            .with_activity_type(non_empty(&record.activity_type_id).map(ActivityTypeId::from))
            .with_notes(record.notes.as_str())
            .with_mood(mood)
            .with_action(action, is_milestone))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn project_ref(record: &SessionRecord) -> Result<ProjectRef, SessionError> {
    if let Some(id) = non_empty(&record.project_id) {
        Ok(ProjectRef::Id(id.into()))
    } else if let Some(name) = non_empty(&record.project) {
        Ok(ProjectRef::Name(name.into()))
    } else {
        Err(SessionError::MissingProject {
            id: record.id.clone(),
        })
    }
}

/// A moment given either as a full date time or as a time of day on `date`.
enum Moment {
    Full(NaiveDateTime),
    TimeOfDay(NaiveDateTime),
}

impl Moment {
    fn parse(date: Option<NaiveDate>, value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(v) = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT) {
            return Some(Self::Full(v));
        }
        let date = date?;
        TIME_FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
            .map(|time| Self::TimeOfDay(date.and_time(time)))
    }

    fn value(&self) -> NaiveDateTime {
        match self {
            Self::Full(v) | Self::TimeOfDay(v) => *v,
        }
    }
}

/// A time of day ending before the start means the session crossed midnight. Full date times
/// are taken as they are.
fn parse_span(
    date: Option<NaiveDate>,
    record: &SessionRecord,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = Moment::parse(date, &record.start_time)?.value();
    let end = match Moment::parse(date.or(Some(start.date())), &record.end_time)? {
        Moment::TimeOfDay(end) if end < start => end + Duration::days(1),
        end => end.value(),
    };
    Some((start, end))
}

fn milestone(record: &SessionRecord) -> (Option<Arc<str>>, bool) {
    if record.action.is_some() || record.is_milestone.is_some() {
        let action = non_empty(&record.action).map(Arc::from);
        return (action, record.is_milestone.unwrap_or(false));
    }
    match non_empty(&record.milestone_text) {
        Some(text) => (Some(text.into()), true),
        None => (None, false),
    }
}

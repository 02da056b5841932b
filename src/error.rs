use thiserror::Error;

/// Reasons a stored session record can't be turned into a [Session](crate::model::Session).
/// None of these are fatal for a dashboard: the source logs them and skips the record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {id} has neither parseable start/end times nor a stored duration")]
    MissingTiming { id: String },

    #[error("session {id} has a negative duration of {minutes} minutes")]
    NegativeDuration { id: String, minutes: i64 },

    #[error("session {id} ends at {end} before it starts at {start}")]
    EndBeforeStart { id: String, start: String, end: String },

    #[error("session {id} doesn't reference a project")]
    MissingProject { id: String },
}

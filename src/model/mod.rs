//! Read-only domain model: sessions, the project/activity type registry and the snapshot every
//! query works on.

pub mod registry;
pub mod session;

use serde::Serialize;

pub use registry::{ActivityType, Project, Registry};
pub use session::{ActivityTypeId, Mood, ProjectId, ProjectRef, Session, Timing};

/// Immutable input of the aggregation. Loaded in full by a
/// [SessionSource](crate::storage::data_dir::SessionSource); never partially updated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Snapshot {
    pub sessions: Vec<Session>,
    pub registry: Registry,
}

impl Snapshot {
    pub fn new(sessions: Vec<Session>, registry: Registry) -> Self {
        Self { sessions, registry }
    }
}

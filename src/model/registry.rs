use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::session::{ActivityTypeId, ProjectId, ProjectRef};

/// A user-defined category of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: Arc<str>,
    /// Hex color, e.g. `#FF6B6B`. Only consumers interpret it.
    #[serde(default)]
    pub color: Arc<str>,
    #[serde(default)]
    pub emoji: Option<Arc<str>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub order: i32,
}

/// What kind of work was done, independent of the project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityType {
    pub id: ActivityTypeId,
    pub name: Arc<str>,
    #[serde(default)]
    pub emoji: Option<Arc<str>>,
    #[serde(default)]
    pub archived: bool,
}

impl Project {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: "".into(),
            emoji: None,
            archived: false,
            order: 0,
        }
    }

    pub fn archived(self) -> Self {
        Self {
            archived: true,
            ..self
        }
    }

    pub fn with_color(self, color: &str) -> Self {
        Self {
            color: color.into(),
            ..self
        }
    }
}

impl ActivityType {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            emoji: None,
            archived: false,
        }
    }

    pub fn archived(self) -> Self {
        Self {
            archived: true,
            ..self
        }
    }
}

/// Lookup tables for projects and activity types. Archived entities stay in the registry so
/// that historical sessions still resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Registry {
    projects: BTreeMap<ProjectId, Project>,
    activity_types: BTreeMap<ActivityTypeId, ActivityType>,
}

impl Registry {
    /// Duplicate ids keep their first definition.
    pub fn new(
        projects: impl IntoIterator<Item = Project>,
        activity_types: impl IntoIterator<Item = ActivityType>,
    ) -> Self {
        let mut registry = Self::default();
        for project in projects {
            if registry.projects.contains_key(&project.id) {
                warn!("Duplicate project id {}, keeping the first definition", project.id);
                continue;
            }
            registry.projects.insert(project.id.clone(), project);
        }
        for activity_type in activity_types {
            if registry.activity_types.contains_key(&activity_type.id) {
                warn!(
                    "Duplicate activity type id {}, keeping the first definition",
                    activity_type.id
                );
                continue;
            }
            registry
                .activity_types
                .insert(activity_type.id.clone(), activity_type);
        }
        registry
    }

    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Resolves both id and legacy name references. Names match exactly; when several projects
    /// share a name the one with the smallest id wins.
    pub fn resolve_project(&self, reference: &ProjectRef) -> Option<&Project> {
        match reference {
            ProjectRef::Id(id) => self.project(id),
            ProjectRef::Name(name) => self.projects.values().find(|v| v.name == *name),
        }
    }

    pub fn activity_type(&self, id: &ActivityTypeId) -> Option<&ActivityType> {
        self.activity_types.get(id)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn activity_types(&self) -> impl Iterator<Item = &ActivityType> {
        self.activity_types.values()
    }
}

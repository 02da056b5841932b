use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;
use tracing::{instrument, trace};

use crate::{
    model::{ActivityTypeId, ProjectId, Registry, Session},
    utils::time::{week_of_year, DateInterval, MonthKey, WeekKey},
};

/// Dimension sessions are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Project,
    #[value(name = "activity")]
    ActivityType,
    Week,
    Month,
    Day,
}

impl Grouping {
    pub fn is_time(&self) -> bool {
        matches!(self, Grouping::Week | Grouping::Month | Grouping::Day)
    }
}

/// Value of a [Grouping] for one session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BucketKey {
    Project(ProjectId),
    ActivityType(ActivityTypeId),
    Week(WeekKey),
    Month(MonthKey),
    Day(NaiveDate),
}

/// Why a session accepted by the filter didn't land in any bucket. These hours are reported,
/// never redistributed to other buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    /// Project id (or legacy name) isn't in the registry.
    DanglingProject,
    ArchivedProject,
    NoActivityType,
    DanglingActivityType,
    ArchivedActivityType,
    /// Time grouping of a session without a usable date.
    Undated,
}

/// Accumulated duration of a group of sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub seconds: i64,
    pub sessions: usize,
}

impl Bucket {
    fn add(&mut self, session: &Session) {
        self.seconds += session.seconds();
        self.sessions += 1;
    }

    pub fn hours(&self) -> f64 {
        self.seconds as f64 / 3600.
    }
}

/// Result of [aggregate]. The sum of every bucket plus every exclusion is the duration of the
/// sessions accepted by the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub buckets: BTreeMap<BucketKey, Bucket>,
    pub excluded: BTreeMap<Exclusion, Bucket>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, key: &BucketKey) -> Bucket {
        self.buckets.get(key).copied().unwrap_or_default()
    }

    pub fn total_seconds(&self) -> i64 {
        self.buckets.values().map(|v| v.seconds).sum()
    }

    pub fn total_hours(&self) -> f64 {
        self.total_seconds() as f64 / 3600.
    }

    pub fn excluded_seconds(&self) -> i64 {
        self.excluded.values().map(|v| v.seconds).sum()
    }
}

/// Decides which sessions take part in an aggregation. Attribution rules (archived and
/// dangling references) are applied afterwards by [aggregate] and don't belong here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SessionFilter {
    /// Days a session has to start on. Undated sessions never pass a window.
    pub window: Option<DateInterval>,
    pub include_archived: bool,
    /// Restricts to these project ids when set. Legacy name references are resolved first.
    pub projects: Option<BTreeSet<ProjectId>>,
    pub activity_types: Option<BTreeSet<ActivityTypeId>>,
}

impl SessionFilter {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn within(window: DateInterval) -> Self {
        Self {
            window: Some(window),
            ..Default::default()
        }
    }

    pub fn include_archived(self, include_archived: bool) -> Self {
        Self {
            include_archived,
            ..self
        }
    }

    pub fn accepts(&self, session: &Session, registry: &Registry) -> bool {
        if let Some(window) = &self.window {
            match session.date() {
                Some(date) if window.contains(date) => {}
                _ => return false,
            }
        }
        if let Some(projects) = &self.projects {
            let project = registry.resolve_project(&session.project);
            if !project.is_some_and(|v| projects.contains(&v.id)) {
                return false;
            }
        }
        if let Some(activity_types) = &self.activity_types {
            if !session
                .activity_type
                .as_ref()
                .is_some_and(|v| activity_types.contains(v))
            {
                return false;
            }
        }
        true
    }
}

/// Finds the key of `session` for `grouping`, or the reason it can't have one. Every grouping
/// requires a resolvable project, so a session is either attributed everywhere or excluded for
/// the same reason everywhere.
pub fn attribute(
    session: &Session,
    registry: &Registry,
    grouping: Grouping,
    include_archived: bool,
) -> Result<BucketKey, Exclusion> {
    let project = registry
        .resolve_project(&session.project)
        .ok_or(Exclusion::DanglingProject)?;
    if project.archived && !include_archived {
        return Err(Exclusion::ArchivedProject);
    }

    match grouping {
        Grouping::Project => Ok(BucketKey::Project(project.id.clone())),
        Grouping::ActivityType => {
            let id = session
                .activity_type
                .as_ref()
                .ok_or(Exclusion::NoActivityType)?;
            let activity_type = registry
                .activity_type(id)
                .ok_or(Exclusion::DanglingActivityType)?;
            if activity_type.archived && !include_archived {
                return Err(Exclusion::ArchivedActivityType);
            }
            Ok(BucketKey::ActivityType(activity_type.id.clone()))
        }
        Grouping::Week => session
            .date()
            .map(|v| BucketKey::Week(week_of_year(v)))
            .ok_or(Exclusion::Undated),
        Grouping::Month => session
            .date()
            .map(|v| BucketKey::Month(MonthKey::of(v)))
            .ok_or(Exclusion::Undated),
        Grouping::Day => session.date().map(BucketKey::Day).ok_or(Exclusion::Undated),
    }
}

/// Sums session durations per key of `grouping`, over the sessions `filter` accepts.
#[instrument(level = "debug", skip(sessions, registry, filter), fields(sessions = sessions.len()))]
pub fn aggregate(
    sessions: &[Session],
    registry: &Registry,
    grouping: Grouping,
    filter: &SessionFilter,
) -> Aggregate {
    let mut aggregate = Aggregate::default();
    for session in sessions.iter().filter(|v| filter.accepts(v, registry)) {
        match attribute(session, registry, grouping, filter.include_archived) {
            Ok(key) => aggregate.buckets.entry(key).or_default().add(session),
            Err(reason) => {
                trace!("Session {} excluded: {reason:?}", session.id);
                aggregate.excluded.entry(reason).or_default().add(session)
            }
        }
    }
    aggregate
}

/// Two level grouping: one [Aggregate] per `slice` key (a time bucket), each grouped by
/// `entity`. A session excluded on either level counts as excluded in [Series::excluded].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    pub slices: BTreeMap<BucketKey, Aggregate>,
    pub excluded: BTreeMap<Exclusion, Bucket>,
}

impl Series {
    pub fn is_empty(&self) -> bool {
        self.slices.values().all(Aggregate::is_empty)
    }

    /// Collapses every slice into a single aggregate over the entity keys.
    pub fn totals(&self) -> Aggregate {
        let mut totals = Aggregate {
            excluded: self.excluded.clone(),
            ..Default::default()
        };
        for (key, bucket) in self.slices.values().flat_map(|v| v.buckets.iter()) {
            let total = totals.buckets.entry(key.clone()).or_default();
            total.seconds += bucket.seconds;
            total.sessions += bucket.sessions;
        }
        totals
    }
}

#[instrument(level = "debug", skip(sessions, registry, filter), fields(sessions = sessions.len()))]
pub fn aggregate_series(
    sessions: &[Session],
    registry: &Registry,
    slice: Grouping,
    entity: Grouping,
    filter: &SessionFilter,
) -> Series {
    let mut series = Series::default();
    for session in sessions.iter().filter(|v| filter.accepts(v, registry)) {
        let keyed = |grouping| attribute(session, registry, grouping, filter.include_archived);
        match keyed(slice).and_then(|slice| keyed(entity).map(|e| (slice, e))) {
            Ok((slice, entity)) => series
                .slices
                .entry(slice)
                .or_default()
                .buckets
                .entry(entity)
                .or_default()
                .add(session),
            Err(reason) => {
                trace!("Session {} excluded: {reason:?}", session.id);
                series.excluded.entry(reason).or_default().add(session)
            }
        }
    }
    series
}

impl From<WeekKey> for BucketKey {
    fn from(value: WeekKey) -> Self {
        BucketKey::Week(value)
    }
}

impl From<MonthKey> for BucketKey {
    fn from(value: MonthKey) -> Self {
        BucketKey::Month(value)
    }
}

impl From<NaiveDate> for BucketKey {
    fn from(value: NaiveDate) -> Self {
        BucketKey::Day(value)
    }
}


#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    use crate::{
        model::{ProjectRef, Session},
        utils::{logging::TEST_LOGGING, time::year_interval},
    };

    use super::{test_data::*, *};

    #[test]
    fn groups_by_project() {
        *TEST_LOGGING;
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60),
            session("2", "beta", at(2024, 4, 1, 11), 30),
            session("3", "alpha", at(2024, 4, 2, 9), 120),
        ];

        let result = aggregate(
            &sessions,
            &registry(),
            Grouping::Project,
            &SessionFilter::all_time(),
        );

        assert_eq!(result.buckets.len(), 2);
        assert_eq!(result.get(&BucketKey::Project("alpha".into())).hours(), 3.);
        assert_eq!(result.get(&BucketKey::Project("alpha".into())).sessions, 2);
        assert_eq!(result.get(&BucketKey::Project("beta".into())).hours(), 0.5);
        assert!(result.excluded.is_empty());
    }

    #[test]
    fn archived_and_dangling_projects_are_excluded_not_redistributed() {
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60),
            session("2", "old", at(2024, 4, 1, 11), 30),
            session("3", "deleted", at(2024, 4, 2, 9), 45),
        ];
        let registry = registry();

        let default = aggregate(
            &sessions,
            &registry,
            Grouping::Project,
            &SessionFilter::all_time(),
        );
        assert_eq!(default.total_seconds(), 3600);
        assert_eq!(default.excluded[&Exclusion::ArchivedProject].seconds, 30 * 60);
        assert_eq!(default.excluded[&Exclusion::DanglingProject].seconds, 45 * 60);

        let with_archived = aggregate(
            &sessions,
            &registry,
            Grouping::Project,
            &SessionFilter::all_time().include_archived(true),
        );
        assert_eq!(with_archived.get(&BucketKey::Project("old".into())).seconds, 30 * 60);
        assert_eq!(with_archived.excluded.len(), 1);
    }

    #[test]
    fn activity_type_attribution() {
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60).with_activity_type(Some("code".into())),
            session("2", "alpha", at(2024, 4, 1, 11), 30),
            session("3", "beta", at(2024, 4, 1, 12), 15).with_activity_type(Some("gone".into())),
            session("4", "beta", at(2024, 4, 1, 13), 10)
                .with_activity_type(Some("retired".into())),
        ];

        let result = aggregate(
            &sessions,
            &registry(),
            Grouping::ActivityType,
            &SessionFilter::all_time(),
        );

        assert_eq!(result.get(&BucketKey::ActivityType("code".into())).seconds, 3600);
        assert_eq!(result.excluded[&Exclusion::NoActivityType].seconds, 30 * 60);
        assert_eq!(result.excluded[&Exclusion::DanglingActivityType].seconds, 15 * 60);
        assert_eq!(result.excluded[&Exclusion::ArchivedActivityType].seconds, 10 * 60);
    }

    #[test]
    fn legacy_name_reference_groups_with_its_project() {
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60),
            Session::spanning(
                "2",
                ProjectRef::Name("Alpha".into()),
                at(2024, 4, 1, 12),
                at(2024, 4, 1, 13),
            )
            .unwrap(),
        ];

        let result = aggregate(
            &sessions,
            &registry(),
            Grouping::Project,
            &SessionFilter::all_time(),
        );
        assert_eq!(result.get(&BucketKey::Project("alpha".into())).seconds, 7200);
    }

    #[test]
    fn time_groupings_exclude_undated_sessions() {
        let sessions = vec![
            session("1", "alpha", at(2024, 12, 30, 9), 60),
            session("2", "alpha", at(2024, 12, 29, 9), 30),
            Session::undated("3", ProjectRef::Id("alpha".into()), Duration::minutes(20)).unwrap(),
        ];
        let registry = registry();

        let weeks = aggregate(&sessions, &registry, Grouping::Week, &SessionFilter::all_time());
        assert_eq!(weeks.get(&WeekKey { year: 2025, week: 1 }.into()).seconds, 3600);
        assert_eq!(weeks.get(&WeekKey { year: 2024, week: 52 }.into()).seconds, 1800);
        assert_eq!(weeks.excluded[&Exclusion::Undated].seconds, 1200);

        let months = aggregate(&sessions, &registry, Grouping::Month, &SessionFilter::all_time());
        assert_eq!(
            months.get(&MonthKey { year: 2024, month: 12 }.into()).seconds,
            5400
        );

        let all_time = aggregate(
            &sessions,
            &registry,
            Grouping::Project,
            &SessionFilter::all_time(),
        );
        assert_eq!(all_time.total_seconds(), 5400 + 1200);

        let year = aggregate(
            &sessions,
            &registry,
            Grouping::Project,
            &SessionFilter::within(year_interval(2024)),
        );
        assert_eq!(year.total_seconds(), 5400);
        assert!(year.excluded.is_empty());
    }

    #[test]
    fn zero_duration_sessions_are_counted() {
        let sessions = vec![session("1", "alpha", at(2024, 4, 1, 9), 0)];
        let result = aggregate(&sessions, &registry(), Grouping::Day, &SessionFilter::all_time());
        let day = result.get(&NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().into());
        assert_eq!(day.sessions, 1);
        assert_eq!(day.seconds, 0);
    }

    #[test]
    fn filter_selects_projects_and_activity_types() {
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60).with_activity_type(Some("code".into())),
            session("2", "beta", at(2024, 4, 1, 11), 30).with_activity_type(Some("code".into())),
            session("3", "beta", at(2024, 4, 1, 12), 30).with_activity_type(Some("write".into())),
        ];
        let filter = SessionFilter {
            projects: Some(BTreeSet::from([ProjectId::from("beta")])),
            activity_types: Some(BTreeSet::from([ActivityTypeId::from("code")])),
            ..Default::default()
        };

        let result = aggregate(&sessions, &registry(), Grouping::Project, &filter);
        assert_eq!(result.total_seconds(), 1800);
        assert_eq!(result.buckets.len(), 1);
    }

    #[test]
    fn series_totals_match_flat_aggregate() {
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60),
            session("2", "beta", at(2024, 4, 8, 11), 30),
            session("3", "alpha", at(2024, 4, 9, 9), 15),
            session("4", "old", at(2024, 4, 9, 9), 15),
        ];
        let registry = registry();

        let series = aggregate_series(
            &sessions,
            &registry,
            Grouping::Week,
            Grouping::Project,
            &SessionFilter::all_time(),
        );
        assert_eq!(series.slices.len(), 2);

        let flat = aggregate(&sessions, &registry, Grouping::Project, &SessionFilter::all_time());
        assert_eq!(series.totals(), flat);
    }

    fn arbitrary_sessions() -> impl Strategy<Value = Vec<Session>> {
        let projects = ["alpha", "beta", "gamma", "old", "deleted"];
        prop::collection::vec((0usize..5, 0u32..400, 0u32..24, 0i64..600), 0..60).prop_map(
            move |values| {
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, (project, day, hour, minutes))| {
                        let start = NaiveDate::from_ymd_opt(2023, 6, 1)
                            .unwrap()
                            .checked_add_days(chrono::Days::new(day as u64))
                            .unwrap()
                            .and_hms_opt(hour, 0, 0)
                            .unwrap();
                        session(&i.to_string(), projects[project], start, minutes)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn totals_are_conserved(
            sessions in arbitrary_sessions(),
            include_archived in any::<bool>(),
        ) {
            let registry = registry();
            let filter =
                SessionFilter::within(year_interval(2024)).include_archived(include_archived);
            let expected: i64 = sessions
                .iter()
                .filter(|v| filter.accepts(v, &registry))
                .map(Session::seconds)
                .sum();

            for grouping in [
                Grouping::Project,
                Grouping::ActivityType,
                Grouping::Week,
                Grouping::Month,
                Grouping::Day,
            ] {
                let result = aggregate(&sessions, &registry, grouping, &filter);
                prop_assert_eq!(result.total_seconds() + result.excluded_seconds(), expected);
                let hours: f64 = result.buckets.values().map(Bucket::hours).sum::<f64>()
                    + result.excluded.values().map(Bucket::hours).sum::<f64>();
                prop_assert!((hours - expected as f64 / 3600.).abs() < 1e-6);
            }
        }
    }
}

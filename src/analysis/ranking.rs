use std::cmp::Ordering;

use serde::Serialize;

use crate::{
    model::Registry,
    utils::percentage::{share_percentage, Percentage},
};

use super::grouping::{Aggregate, Bucket, BucketKey, Series};

/// One display-ready row: raw key, raw hours and share of the group total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub key: BucketKey,
    pub hours: f64,
    pub sessions: usize,
    pub percentage: Percentage,
}

impl RankedEntry {
    fn new(key: BucketKey, bucket: Bucket, total_seconds: i64) -> Self {
        Self {
            key,
            hours: bucket.hours(),
            sessions: bucket.sessions,
            percentage: share_percentage(bucket.seconds, total_seconds),
        }
    }
}

/// One time bucket of a series with its entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub key: BucketKey,
    pub total_hours: f64,
    pub entries: Vec<RankedEntry>,
}

/// Time slices sharing one entity order, so a stacked chart doesn't reshuffle its layers from
/// one slice to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StackedSeries {
    pub order: Vec<BucketKey>,
    pub slices: Vec<Slice>,
}

fn display_name<'a>(registry: &'a Registry, key: &BucketKey) -> Option<&'a str> {
    match key {
        BucketKey::Project(id) => registry.project(id).map(|v| v.name.as_ref()),
        BucketKey::ActivityType(id) => registry.activity_type(id).map(|v| v.name.as_ref()),
        BucketKey::Week(_) | BucketKey::Month(_) | BucketKey::Day(_) => None,
    }
}

/// Longest duration first. Equal durations fall back to the display name (case-insensitive,
/// then exact) and finally to the key itself, so the result never depends on input order.
fn compare_ranked(
    registry: &Registry,
    (a_key, a): (&BucketKey, &Bucket),
    (b_key, b): (&BucketKey, &Bucket),
) -> Ordering {
    b.seconds
        .cmp(&a.seconds)
        .then_with(|| {
            let a_name = display_name(registry, a_key);
            let b_name = display_name(registry, b_key);
            a_name
                .map(str::to_lowercase)
                .cmp(&b_name.map(str::to_lowercase))
                .then_with(|| a_name.cmp(&b_name))
        })
        .then_with(|| a_key.cmp(b_key))
}

fn ranked_keys<'a>(
    aggregate: &'a Aggregate,
    registry: &Registry,
) -> Vec<(&'a BucketKey, &'a Bucket)> {
    let mut entries = aggregate.buckets.iter().collect::<Vec<_>>();
    entries.sort_by(|a, b| compare_ranked(registry, *a, *b));
    entries
}

/// Ranks the buckets of `aggregate` and annotates each with its share of the total.
pub fn to_percentage_ranked(aggregate: &Aggregate, registry: &Registry) -> Vec<RankedEntry> {
    let total = aggregate.total_seconds();
    ranked_keys(aggregate, registry)
        .into_iter()
        .map(|(key, bucket)| RankedEntry::new(key.clone(), *bucket, total))
        .collect()
}

/// Entity order computed once from the totals over every slice of `series`.
pub fn global_order(series: &Series, registry: &Registry) -> Vec<BucketKey> {
    let totals = series.totals();
    ranked_keys(&totals, registry)
        .into_iter()
        .map(|(key, _)| key.clone())
        .collect()
}

/// Lays `aggregate` out in `order`. Keys missing from the aggregate appear with zero hours; keys
/// missing from the order are appended in their own ranking.
pub fn apply_order(
    order: &[BucketKey],
    aggregate: &Aggregate,
    registry: &Registry,
) -> Vec<RankedEntry> {
    let total = aggregate.total_seconds();
    let mut entries = order
        .iter()
        .map(|key| RankedEntry::new(key.clone(), aggregate.get(key), total))
        .collect::<Vec<_>>();

    let leftover = ranked_keys(aggregate, registry)
        .into_iter()
        .filter(|(key, _)| !order.contains(*key))
        .map(|(key, bucket)| RankedEntry::new(key.clone(), *bucket, total))
        .collect::<Vec<_>>();
    entries.extend(leftover);
    entries
}

/// Builds a stacked series over `slice_keys`, every slice following the global order. Slices
/// without sessions are zero-filled; a series without any attributed session is empty.
pub fn stack(
    series: &Series,
    slice_keys: impl IntoIterator<Item = BucketKey>,
    registry: &Registry,
) -> StackedSeries {
    if series.is_empty() {
        return StackedSeries::default();
    }
    let order = global_order(series, registry);
    let empty = Aggregate::default();
    let slices = slice_keys
        .into_iter()
        .map(|key| {
            let aggregate = series.slices.get(&key).unwrap_or(&empty);
            Slice {
                entries: apply_order(&order, aggregate, registry),
                total_hours: aggregate.total_hours(),
                key,
            }
        })
        .collect();
    StackedSeries { order, slices }
}

/// Ranks every slice on its own. Used where slices aren't stacked on top of each other.
pub fn rank_slices(
    series: &Series,
    slice_keys: impl IntoIterator<Item = BucketKey>,
    registry: &Registry,
) -> Vec<Slice> {
    if series.is_empty() {
        return vec![];
    }
    let empty = Aggregate::default();
    slice_keys
        .into_iter()
        .map(|key| {
            let aggregate = series.slices.get(&key).unwrap_or(&empty);
            Slice {
                entries: to_percentage_ranked(aggregate, registry),
                total_hours: aggregate.total_hours(),
                key,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::{
        analysis::grouping::{aggregate, aggregate_series, test_data::*, Grouping, SessionFilter},
        model::{Project, Registry, Session},
        utils::time::WeekKey,
    };

    use super::*;

    fn project(id: &str) -> BucketKey {
        BucketKey::Project(id.into())
    }

    fn week(week: u32) -> BucketKey {
        BucketKey::Week(WeekKey { year: 2024, week })
    }

    fn rows(entries: &[RankedEntry]) -> Vec<(BucketKey, f64, f64)> {
        entries
            .iter()
            .map(|v| (v.key.clone(), v.hours, *v.percentage))
            .collect()
    }

    #[test]
    fn ranks_by_hours_with_percentages() {
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 180),
            session("2", "beta", at(2024, 4, 1, 13), 60),
        ];
        let registry = registry();
        let ranked = to_percentage_ranked(
            &aggregate(&sessions, &registry, Grouping::Project, &SessionFilter::all_time()),
            &registry,
        );

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].key, project("alpha"));
        assert_eq!(ranked[0].hours, 3.);
        assert_eq!(*ranked[0].percentage, 75.);
        assert_eq!(ranked[1].key, project("beta"));
        assert_eq!(*ranked[1].percentage, 25.);
    }

    #[test]
    fn ties_are_broken_by_name() {
        // Id order differs from name order.
        let registry = Registry::new(
            [
                Project::new("b-id", "apple"),
                Project::new("a-id", "Banana"),
                Project::new("c-id", "cherry"),
            ],
            [],
        );
        let sessions = vec![
            session("1", "c-id", at(2024, 4, 1, 9), 60),
            session("2", "a-id", at(2024, 4, 1, 10), 60),
            session("3", "b-id", at(2024, 4, 1, 11), 60),
        ];
        let ranked = to_percentage_ranked(
            &aggregate(&sessions, &registry, Grouping::Project, &SessionFilter::all_time()),
            &registry,
        );
        let keys = ranked.into_iter().map(|v| v.key).collect::<Vec<_>>();
        assert_eq!(keys, vec![project("b-id"), project("a-id"), project("c-id")]);
    }

    #[test]
    fn empty_and_zero_totals_have_zero_percentages() {
        let registry = registry();
        assert!(to_percentage_ranked(&Aggregate::default(), &registry).is_empty());

        let sessions = vec![session("1", "alpha", at(2024, 4, 1, 9), 0)];
        let ranked = to_percentage_ranked(
            &aggregate(&sessions, &registry, Grouping::Project, &SessionFilter::all_time()),
            &registry,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].percentage, Percentage::ZERO);
        assert_eq!(ranked[0].sessions, 1);
    }

    #[test]
    fn stacked_weeks_share_global_order() {
        // Week 14: A=3h B=1h. Week 15: A=0h B=4h. Combined B=5h A=3h, so B stacks first.
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 180),
            session("2", "beta", at(2024, 4, 1, 13), 60),
            session("3", "alpha", at(2024, 4, 8, 9), 0),
            session("4", "beta", at(2024, 4, 8, 10), 240),
        ];
        let registry = registry();
        let series = aggregate_series(
            &sessions,
            &registry,
            Grouping::Week,
            Grouping::Project,
            &SessionFilter::all_time(),
        );

        let stacked = stack(&series, [week(14), week(15), week(16)], &registry);

        assert_eq!(stacked.order, vec![project("beta"), project("alpha")]);
        assert_eq!(
            rows(&stacked.slices[0].entries),
            vec![(project("beta"), 1., 25.), (project("alpha"), 3., 75.)]
        );
        assert_eq!(
            rows(&stacked.slices[1].entries),
            vec![(project("beta"), 4., 100.), (project("alpha"), 0., 0.)]
        );
        let third = &stacked.slices[2];
        assert_eq!(third.total_hours, 0.);
        assert!(third.entries.iter().all(|v| v.hours == 0. && *v.percentage == 0.));
    }

    #[test]
    fn stacking_is_stable_across_weeks_with_gaps() {
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60),
            session("2", "beta", at(2024, 4, 1, 13), 120),
            session("3", "gamma", at(2024, 4, 2, 9), 30),
            session("4", "gamma", at(2024, 4, 8, 9), 300),
            session("5", "alpha", at(2024, 4, 15, 9), 90),
            session("6", "beta", at(2024, 4, 16, 9), 10),
        ];
        let registry = registry();
        let series = aggregate_series(
            &sessions,
            &registry,
            Grouping::Week,
            Grouping::Project,
            &SessionFilter::all_time(),
        );

        let stacked = stack(&series, [week(14), week(15), week(16)], &registry);

        for slice in &stacked.slices {
            let keys = slice.entries.iter().map(|v| v.key.clone()).collect::<Vec<_>>();
            assert_eq!(keys, stacked.order);
        }
        assert_eq!(stacked.order, vec![project("gamma"), project("alpha"), project("beta")]);
    }

    #[test]
    fn empty_series_stacks_to_nothing() {
        let stacked = stack(&Series::default(), [week(1), week(2)], &registry());
        assert!(stacked.slices.is_empty());
        assert!(stacked.order.is_empty());
        assert!(rank_slices(&Series::default(), [week(1)], &registry()).is_empty());
    }

    #[test]
    fn slices_can_be_ranked_independently() {
        let sessions = vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60),
            session("2", "beta", at(2024, 4, 1, 13), 120),
            session("3", "alpha", at(2024, 4, 8, 9), 300),
        ];
        let registry = registry();
        let series = aggregate_series(
            &sessions,
            &registry,
            Grouping::Week,
            Grouping::Project,
            &SessionFilter::all_time(),
        );

        let slices = rank_slices(&series, [week(14), week(15)], &registry);
        assert_eq!(slices[0].entries[0].key, project("beta"));
        assert_eq!(slices[1].entries.len(), 1);
        assert_eq!(slices[1].entries[0].key, project("alpha"));
    }

    fn fixed_sessions() -> Vec<Session> {
        vec![
            session("1", "alpha", at(2024, 4, 1, 9), 60),
            session("2", "beta", at(2024, 4, 1, 13), 60),
            session("3", "gamma", at(2024, 4, 2, 9), 60),
            session("4", "alpha", at(2024, 4, 9, 9), 30),
            session("5", "beta", at(2024, 4, 9, 11), 30),
            session("6", "old", at(2024, 4, 9, 12), 30),
            session("7", "gamma", at(2024, 4, 17, 9), 0),
        ]
    }

    proptest! {
        #[test]
        fn ranking_ignores_input_order(sessions in Just(fixed_sessions()).prop_shuffle()) {
            let registry = registry();
            let filter = SessionFilter::all_time();
            let expected = to_percentage_ranked(
                &aggregate(&fixed_sessions(), &registry, Grouping::Project, &filter),
                &registry,
            );
            let ranked = to_percentage_ranked(
                &aggregate(&sessions, &registry, Grouping::Project, &filter),
                &registry,
            );
            prop_assert_eq!(ranked, expected);

            let weeks = [week(14), week(15), week(16)];
            let series = |sessions: &[Session]| {
                aggregate_series(sessions, &registry, Grouping::Week, Grouping::Project, &filter)
            };
            let expected = stack(&series(&fixed_sessions()), weeks.clone(), &registry);
            let stacked = stack(&series(&sessions), weeks, &registry);
            prop_assert_eq!(stacked, expected);
        }
    }
}

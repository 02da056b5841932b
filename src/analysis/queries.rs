use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    model::Snapshot,
    utils::{
        clock::Clock,
        time::{
            iso_weeks, iso_weeks_in_year, month_interval, week_interval, week_of_year,
            year_interval, DateInterval, MonthKey,
        },
    },
};

use super::{
    grouping::{
        aggregate, aggregate_series, attribute, Bucket, BucketKey, Exclusion, Grouping,
        SessionFilter,
    },
    ranking::{rank_slices, stack, to_percentage_ranked, RankedEntry, Slice, StackedSeries},
};

/// Knobs shared by every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub week_start: Weekday,
    /// Count sessions of archived projects and activity types instead of excluding them.
    pub include_archived: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            week_start: Weekday::Mon,
            include_archived: false,
        }
    }
}

/// Time window a dashboard looks at, always relative to "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Week,
    Month,
    Year,
    #[value(name = "all")]
    AllTime,
}

/// Headline numbers of a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub window: Window,
    pub interval: Option<DateInterval>,
    pub total_hours: f64,
    pub sessions: usize,
    pub active_days: usize,
    pub average_mood: Option<f64>,
    pub milestones: usize,
    pub excluded_hours: f64,
}

/// Every dashboard query at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub config: AggregatorConfig,
    pub weekly_by_project: Vec<RankedEntry>,
    pub weekly_by_activity_type: Vec<RankedEntry>,
    pub yearly_by_project: Vec<RankedEntry>,
    pub yearly_by_activity_type: Vec<RankedEntry>,
    pub monthly_by_activity_type: Vec<Slice>,
    pub stacked_weekly_by_project: StackedSeries,
    pub daily_by_project: StackedSeries,
    pub week_summary: PeriodSummary,
    pub year_summary: PeriodSummary,
}

/// Named dashboard queries over one snapshot. Every query is a pure function of the snapshot,
/// `today` and the config.
pub struct SessionAggregator<'a> {
    snapshot: &'a Snapshot,
    today: NaiveDate,
    config: AggregatorConfig,
}

impl<'a> SessionAggregator<'a> {
    pub fn new(snapshot: &'a Snapshot, today: NaiveDate, config: AggregatorConfig) -> Self {
        Self {
            snapshot,
            today,
            config,
        }
    }

    pub fn from_clock(
        snapshot: &'a Snapshot,
        clock: &impl Clock,
        config: AggregatorConfig,
    ) -> Self {
        Self::new(snapshot, clock.today(), config)
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Days covered by `window`; [None] for all time.
    pub fn interval(&self, window: Window) -> Option<DateInterval> {
        match window {
            Window::Week => Some(week_interval(self.today, self.config.week_start)),
            Window::Month => Some(month_interval(self.today)),
            Window::Year => Some(year_interval(self.today.year())),
            Window::AllTime => None,
        }
    }

    fn filter(&self, interval: Option<DateInterval>) -> SessionFilter {
        SessionFilter {
            window: interval,
            include_archived: self.config.include_archived,
            ..Default::default()
        }
    }

    /// Ranked totals of `window` grouped by `grouping`.
    #[instrument(level = "debug", skip(self))]
    pub fn totals(&self, window: Window, grouping: Grouping) -> Vec<RankedEntry> {
        let filter = self.filter(self.interval(window));
        let aggregate = aggregate(
            &self.snapshot.sessions,
            &self.snapshot.registry,
            grouping,
            &filter,
        );
        to_percentage_ranked(&aggregate, &self.snapshot.registry)
    }

    pub fn weekly_totals_by_project(&self) -> Vec<RankedEntry> {
        self.totals(Window::Week, Grouping::Project)
    }

    pub fn weekly_totals_by_activity_type(&self) -> Vec<RankedEntry> {
        self.totals(Window::Week, Grouping::ActivityType)
    }

    pub fn monthly_totals_by_project(&self) -> Vec<RankedEntry> {
        self.totals(Window::Month, Grouping::Project)
    }

    pub fn yearly_totals_by_project(&self) -> Vec<RankedEntry> {
        self.totals(Window::Year, Grouping::Project)
    }

    pub fn yearly_totals_by_activity_type(&self) -> Vec<RankedEntry> {
        self.totals(Window::Year, Grouping::ActivityType)
    }

    pub fn all_time_totals_by_project(&self) -> Vec<RankedEntry> {
        self.totals(Window::AllTime, Grouping::Project)
    }

    pub fn all_time_totals_by_activity_type(&self) -> Vec<RankedEntry> {
        self.totals(Window::AllTime, Grouping::ActivityType)
    }

    /// January to December of the current year, each month ranked on its own.
    #[instrument(level = "debug", skip(self))]
    pub fn monthly_breakdown_by_activity_type(&self) -> Vec<Slice> {
        let year = self.today.year();
        let series = aggregate_series(
            &self.snapshot.sessions,
            &self.snapshot.registry,
            Grouping::Month,
            Grouping::ActivityType,
            &self.filter(Some(year_interval(year))),
        );
        let months = (1..=12).map(|month| BucketKey::Month(MonthKey { year, month }));
        rank_slices(&series, months, &self.snapshot.registry)
    }

    pub fn stacked_weekly_series_by_project(&self) -> StackedSeries {
        self.stacked_weekly_series(Grouping::Project)
    }

    pub fn stacked_weekly_series_by_activity_type(&self) -> StackedSeries {
        self.stacked_weekly_series(Grouping::ActivityType)
    }

    /// One slice per ISO week of the ISO week-year containing today (52 or 53), all slices
    /// stacked in the same order.
    #[instrument(level = "debug", skip(self))]
    pub fn stacked_weekly_series(&self, entity: Grouping) -> StackedSeries {
        let year = week_of_year(self.today).year;
        let series = aggregate_series(
            &self.snapshot.sessions,
            &self.snapshot.registry,
            Grouping::Week,
            entity,
            &self.filter(iso_year_interval(year)),
        );
        stack(&series, iso_weeks(year).map(BucketKey::Week), &self.snapshot.registry)
    }

    pub fn daily_series_by_project(&self) -> StackedSeries {
        self.daily_series(Grouping::Project)
    }

    /// The days of the current week, stacked in the same order.
    #[instrument(level = "debug", skip(self))]
    pub fn daily_series(&self, entity: Grouping) -> StackedSeries {
        let week = week_interval(self.today, self.config.week_start);
        let series = aggregate_series(
            &self.snapshot.sessions,
            &self.snapshot.registry,
            Grouping::Day,
            entity,
            &self.filter(Some(week)),
        );
        stack(&series, week.days().map(BucketKey::Day), &self.snapshot.registry)
    }

    /// Counts only sessions attributable to a project, the same population as the project
    /// totals of the window.
    #[instrument(level = "debug", skip(self))]
    pub fn summary(&self, window: Window) -> PeriodSummary {
        let interval = self.interval(window);
        let filter = self.filter(interval);
        let registry = &self.snapshot.registry;

        let mut total = Bucket::default();
        let mut excluded = BTreeMap::<Exclusion, i64>::new();
        let mut days = BTreeSet::new();
        let mut moods = vec![];
        let mut milestones = 0;

        for session in self
            .snapshot
            .sessions
            .iter()
            .filter(|v| filter.accepts(v, registry))
        {
            let attributed =
                attribute(session, registry, Grouping::Project, filter.include_archived);
            if let Err(reason) = attributed {
                *excluded.entry(reason).or_default() += session.seconds();
                continue;
            }
            total.seconds += session.seconds();
            total.sessions += 1;
            days.extend(session.date());
            moods.extend(session.mood.map(|v| v.value() as f64));
            if session.is_milestone {
                milestones += 1;
            }
        }

        PeriodSummary {
            window,
            interval,
            total_hours: total.hours(),
            sessions: total.sessions,
            active_days: days.len(),
            average_mood: (!moods.is_empty())
                .then(|| moods.iter().sum::<f64>() / moods.len() as f64),
            milestones,
            excluded_hours: excluded.values().sum::<i64>() as f64 / 3600.,
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn dashboard(&self) -> Dashboard {
        Dashboard {
            today: self.today,
            config: self.config,
            weekly_by_project: self.weekly_totals_by_project(),
            weekly_by_activity_type: self.weekly_totals_by_activity_type(),
            yearly_by_project: self.yearly_totals_by_project(),
            yearly_by_activity_type: self.yearly_totals_by_activity_type(),
            monthly_by_activity_type: self.monthly_breakdown_by_activity_type(),
            stacked_weekly_by_project: self.stacked_weekly_series_by_project(),
            daily_by_project: self.daily_series_by_project(),
            week_summary: self.summary(Window::Week),
            year_summary: self.summary(Window::Year),
        }
    }
}

/// Monday of ISO week 1 to Sunday of the last ISO week of `year`.
fn iso_year_interval(year: i32) -> Option<DateInterval> {
    let start = NaiveDate::from_isoywd_opt(year, 1, Weekday::Mon)?;
    let end = NaiveDate::from_isoywd_opt(year, iso_weeks_in_year(year), Weekday::Sun)?;
    DateInterval::new_opt(start, end)
}

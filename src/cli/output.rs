use std::io::{IsTerminal, Write};

use ansi_term::Colour;
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use crate::{
    analysis::{
        grouping::BucketKey,
        queries::{Dashboard, PeriodSummary},
        ranking::{RankedEntry, Slice, StackedSeries},
    },
    model::Registry,
    utils::percentage::Percentage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Raw structures: ids, hours and 0-100 percentages.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Tab separated rendering for a terminal.
pub struct TextPrinter<'a> {
    registry: &'a Registry,
    min_percentage: Percentage,
    colored: bool,
}

impl<'a> TextPrinter<'a> {
    pub fn new(registry: &'a Registry, min_percentage: Percentage) -> Self {
        Self {
            registry,
            min_percentage,
            colored: std::io::stdout().is_terminal(),
        }
    }

    pub fn label(&self, key: &BucketKey) -> String {
        match key {
            BucketKey::Project(id) => match self.registry.project(id) {
                Some(project) => {
                    let name = with_emoji(project.emoji.as_deref(), &project.name);
                    match parse_hex_color(&project.color).filter(|_| self.colored) {
                        Some(colour) => colour.paint(name).to_string(),
                        None => name,
                    }
                }
                None => id.to_string(),
            },
            BucketKey::ActivityType(id) => match self.registry.activity_type(id) {
                Some(activity_type) => {
                    with_emoji(activity_type.emoji.as_deref(), &activity_type.name)
                }
                None => id.to_string(),
            },
            BucketKey::Week(week) => format!("{}-W{:02}", week.year, week.week),
            BucketKey::Month(month) => format!("{}-{:02}", month.year, month.month),
            BucketKey::Day(day) => day.format("%a %Y-%m-%d").to_string(),
        }
    }

    fn entry_line(&self, entry: &RankedEntry) -> String {
        format!(
            "{}\t{:.2}h\t{}%\t{}",
            self.label(&entry.key),
            entry.hours,
            *entry.percentage as i32,
            entry.sessions
        )
    }

    pub fn ranked_lines(&self, entries: &[RankedEntry]) -> Vec<String> {
        visible(entries, self.min_percentage).map(|v| self.entry_line(v)).collect()
    }

    /// Slices without hours are skipped.
    pub fn slice_lines(&self, slices: &[Slice]) -> Vec<String> {
        let mut lines = vec![];
        for slice in slices.iter().filter(|v| v.total_hours > 0.) {
            let header = self.label(&slice.key);
            lines.extend(
                visible(&slice.entries, self.min_percentage)
                    .filter(|v| v.hours > 0.)
                    .map(|v| format!("{header}\t{}", self.entry_line(v))),
            );
        }
        lines
    }

    pub fn stacked_lines(&self, stacked: &StackedSeries) -> Vec<String> {
        self.slice_lines(&stacked.slices)
    }

    pub fn summary_lines(&self, summary: &PeriodSummary) -> Vec<String> {
        let mut lines = vec![];
        if let Some(interval) = summary.interval {
            lines.push(format!("period\t{}\t{}", interval.start, interval.end));
        }
        lines.push(format!("hours\t{:.2}", summary.total_hours));
        lines.push(format!("sessions\t{}", summary.sessions));
        lines.push(format!("active days\t{}", summary.active_days));
        if let Some(mood) = summary.average_mood {
            lines.push(format!("average mood\t{mood:.1}"));
        }
        lines.push(format!("milestones\t{}", summary.milestones));
        if summary.excluded_hours > 0. {
            lines.push(format!("excluded hours\t{:.2}", summary.excluded_hours));
        }
        lines
    }

    pub fn dashboard_lines(&self, dashboard: &Dashboard) -> Vec<String> {
        let sections = [
            ("This week", self.summary_lines(&dashboard.week_summary)),
            ("This week by project", self.ranked_lines(&dashboard.weekly_by_project)),
            ("This week by activity", self.ranked_lines(&dashboard.weekly_by_activity_type)),
            ("Days of this week", self.stacked_lines(&dashboard.daily_by_project)),
            ("This year", self.summary_lines(&dashboard.year_summary)),
            ("This year by project", self.ranked_lines(&dashboard.yearly_by_project)),
            ("This year by activity", self.ranked_lines(&dashboard.yearly_by_activity_type)),
            ("Months by activity", self.slice_lines(&dashboard.monthly_by_activity_type)),
            ("Weeks by project", self.stacked_lines(&dashboard.stacked_weekly_by_project)),
        ];

        let mut lines = vec![];
        for (title, section) in sections {
            if section.is_empty() {
                continue;
            }
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("# {title}"));
            lines.extend(section);
        }
        lines
    }

    pub fn print(&self, lines: Vec<String>) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        for line in lines {
            writeln!(stdout, "{line}")?;
        }
        Ok(())
    }
}

fn visible(entries: &[RankedEntry], min: Percentage) -> impl Iterator<Item = &RankedEntry> {
    entries.iter().filter(move |v| v.percentage >= min)
}

fn with_emoji(emoji: Option<&str>, name: &str) -> String {
    match emoji.filter(|v| !v.is_empty()) {
        Some(emoji) => format!("{emoji} {name}"),
        None => name.to_string(),
    }
}

/// Accepts `#RRGGBB`, with or without the hash.
pub fn parse_hex_color(value: &str) -> Option<Colour> {
    let value = value.trim().trim_start_matches('#');
    if value.len() != 6 || !value.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&value[i..i + 2], 16).ok();
    Some(Colour::RGB(channel(0)?, channel(2)?, channel(4)?))
}

use std::{fmt::Display, path::PathBuf, time::Duration};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Subcommand, ValueEnum};
use tracing::{debug, info};

use crate::{
    analysis::{
        cache::DashboardCache,
        grouping::Grouping,
        queries::{AggregatorConfig, Dashboard, SessionAggregator, Window},
    },
    model::Registry,
    storage::data_dir::{load_snapshot, DataDir},
    utils::clock::{Clock, FixedClock, LocalClock},
};

use super::{
    output::{print_json, OutputFormat, TextPrinter},
    Args, QueryOptions,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum QueryCommand {
    #[command(about = "Ranked totals of a window")]
    Totals {
        #[arg(long, value_enum, default_value_t = Window::Week)]
        window: Window,
        #[arg(long, value_enum, default_value_t = Grouping::Project)]
        by: Grouping,
    },
    #[command(about = "Activity types of every month of the year")]
    Monthly,
    #[command(about = "Every ISO week of the year, stacked in one order")]
    Stacked {
        #[arg(long, value_enum, default_value_t = Grouping::Project)]
        by: Grouping,
    },
    #[command(about = "Days of the current week, stacked in one order")]
    Daily {
        #[arg(long, value_enum, default_value_t = Grouping::Project)]
        by: Grouping,
    },
    #[command(about = "Headline numbers of a window")]
    Summary {
        #[arg(long, value_enum, default_value_t = Window::Week)]
        window: Window,
    },
    #[command(about = "Every dashboard query at once")]
    Dashboard,
    #[command(about = "Reprint the dashboard whenever the stored sessions change")]
    Watch {
        #[arg(long, default_value_t = 30, help = "Seconds between checks")]
        interval: u64,
    },
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

/// Day every query is computed for. Without `--at` it's the local today.
fn resolve_today(at: Option<&str>, date_style: DateStyle) -> Result<NaiveDate> {
    let Some(at) = at else {
        return Ok(LocalClock.today());
    };
    match parse_date_string(at, Local::now(), date_style.into()) {
        Ok(v) => Ok(FixedClock::from(v).today()),
        Err(e) => Err(validation_error(format!("Failed to validate date {at}: {e}"))),
    }
}

/// Stacking only makes sense over projects or activity types.
fn entity_grouping(grouping: Grouping) -> Result<Grouping> {
    if grouping.is_time() {
        return Err(validation_error(format!(
            "Series can't be stacked by {grouping:?}, use project or activity"
        )));
    }
    Ok(grouping)
}

/// Command to process every query command. Loads the snapshot once and prints the requested
/// query in the requested format.
pub async fn process_query_command(
    command: QueryCommand,
    options: QueryOptions,
    dir: PathBuf,
) -> Result<()> {
    let config = AggregatorConfig {
        week_start: options.week_start,
        include_archived: options.include_archived,
    };
    let source = DataDir::new(dir);

    if let QueryCommand::Watch { interval } = command {
        return watch(&source, &options, config, Duration::from_secs(interval.max(1))).await;
    }

    let today = resolve_today(options.at.as_deref(), options.date_style)?;
    let snapshot = load_snapshot(&source).await?;
    debug!(
        "Loaded {} sessions from {:?}",
        snapshot.sessions.len(),
        source.path()
    );
    let aggregator = SessionAggregator::new(&snapshot, today, config);
    let printer = TextPrinter::new(&snapshot.registry, options.min_percentage);
    let json = options.format == OutputFormat::Json;

    match command {
        QueryCommand::Totals { window, by } => {
            let totals = aggregator.totals(window, by);
            if json {
                print_json(&totals)
            } else {
                printer.print(printer.ranked_lines(&totals))
            }
        }
        QueryCommand::Monthly => {
            let months = aggregator.monthly_breakdown_by_activity_type();
            if json {
                print_json(&months)
            } else {
                printer.print(printer.slice_lines(&months))
            }
        }
        QueryCommand::Stacked { by } => {
            let stacked = aggregator.stacked_weekly_series(entity_grouping(by)?);
            if json {
                print_json(&stacked)
            } else {
                printer.print(printer.stacked_lines(&stacked))
            }
        }
        QueryCommand::Daily { by } => {
            let daily = aggregator.daily_series(entity_grouping(by)?);
            if json {
                print_json(&daily)
            } else {
                printer.print(printer.stacked_lines(&daily))
            }
        }
        QueryCommand::Summary { window } => {
            let summary = aggregator.summary(window);
            if json {
                print_json(&summary)
            } else {
                printer.print(printer.summary_lines(&summary))
            }
        }
        QueryCommand::Dashboard | QueryCommand::Watch { .. } => {
            print_dashboard(&aggregator.dashboard(), &snapshot.registry, &options)
        }
    }
}

fn print_dashboard(
    dashboard: &Dashboard,
    registry: &Registry,
    options: &QueryOptions,
) -> Result<()> {
    if options.format == OutputFormat::Json {
        print_json(dashboard)
    } else {
        let printer = TextPrinter::new(registry, options.min_percentage);
        printer.print(printer.dashboard_lines(dashboard))
    }
}

/// Reloads the data directory every `interval` and prints the dashboard only when its inputs
/// changed, including the day rolling over.
async fn watch(
    source: &DataDir,
    options: &QueryOptions,
    config: AggregatorConfig,
    interval: Duration,
) -> Result<()> {
    let cache = DashboardCache::default();
    loop {
        let today = resolve_today(options.at.as_deref(), options.date_style)?;
        let snapshot = load_snapshot(source).await?;

        let misses = cache.misses();
        let dashboard = cache.get_or_compute(&snapshot, today, config)?;
        if cache.misses() > misses {
            if misses > 0 {
                println!();
            }
            print_dashboard(&dashboard, &snapshot.registry, options)?;
        } else {
            debug!("Sessions unchanged, {} cache hits so far", cache.hits());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

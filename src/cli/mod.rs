pub mod output;
pub mod query;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Weekday;
use clap::Parser;
use query::{process_query_command, DateStyle, QueryCommand};
use tracing::level_filters::LevelFilter;

use crate::utils::{
    dir::create_application_default_path,
    logging::{enable_logging, CLI_PREFIX},
    percentage::Percentage,
};

use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "Juju", version, long_about = None)]
#[command(about = "Dashboard queries over Juju time tracking sessions", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: QueryCommand,
    #[command(flatten)]
    options: QueryOptions,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

/// Options shared by every command.
#[derive(clap::Args, Debug, Clone)]
pub struct QueryOptions {
    #[arg(
        long,
        global = true,
        help = "Data directory. By default $JUJU_DATA_DIR, $XDG_DATA_HOME/juju or $HOME/.local/share/juju"
    )]
    pub dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Day the dashboard is computed for. Examples are \"yesterday\", \"15/03/2025\", \"last friday\""
    )]
    pub at: Option<String>,
    #[arg(
        long,
        global = true,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year"
    )]
    pub date_style: DateStyle,
    #[arg(long, global = true, default_value = "mon", help = "First day of the week")]
    pub week_start: Weekday,
    #[arg(long, global = true, help = "Count sessions of archived projects and activity types")]
    pub include_archived: bool,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(
        short = 'p',
        long = "min-percentage",
        global = true,
        help = "Hide text rows below this share of their total",
        default_value = "0"
    )]
    pub min_percentage: Percentage,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match &args.options.dir {
        Some(dir) => dir.clone(),
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    process_query_command(args.command, args.options, dir).await
}

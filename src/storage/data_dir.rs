use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use futures::{stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, instrument, warn};

use crate::model::{ActivityType, Project, Registry, Session, Snapshot};

use super::records::SessionRecord;

pub const PROJECTS_FILE: &str = "projects.json";
pub const ACTIVITY_TYPES_FILE: &str = "activity_types.json";
const DATA_FILE_SUFFIX: &str = "-data.jsonl";

/// Years read concurrently by [load_snapshot].
const LOAD_CONCURRENCY: usize = 4;

pub fn year_file_name(year: i32) -> String {
    format!("{year}{DATA_FILE_SUFFIX}")
}

fn year_of_file_name(name: &str) -> Option<i32> {
    name.strip_suffix(DATA_FILE_SUFFIX)
        .filter(|v| v.len() == 4 && v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse().ok())
}

/// Interface for abstracting where sessions come from.
pub trait SessionSource {
    /// Years that have stored sessions, ascending.
    fn available_years(&self) -> impl Future<Output = Result<Vec<i32>>> + Send;

    /// Sessions recorded in `year`. Records that can't be converted are skipped.
    fn get_sessions_for(&self, year: i32) -> impl Future<Output = Result<Vec<Session>>> + Send;

    fn get_registry(&self) -> impl Future<Output = Result<Registry>> + Send;
}

impl<T: Deref> SessionSource for T
where
    T::Target: SessionSource,
{
    fn available_years(&self) -> impl Future<Output = Result<Vec<i32>>> + Send {
        self.deref().available_years()
    }

    fn get_sessions_for(&self, year: i32) -> impl Future<Output = Result<Vec<Session>>> + Send {
        self.deref().get_sessions_for(year)
    }

    fn get_registry(&self) -> impl Future<Output = Result<Registry>> + Send {
        self.deref().get_registry()
    }
}

/// Reads every available year and the registry into one [Snapshot].
#[instrument(level = "debug", skip(source))]
pub async fn load_snapshot(source: &impl SessionSource) -> Result<Snapshot> {
    let years = source.available_years().await?;
    debug!("Loading sessions of {years:?}");

    let sessions = stream::iter(years)
        .map(|year| source.get_sessions_for(year))
        .buffered(LOAD_CONCURRENCY)
        .try_concat()
        .await?;
    let registry = source.get_registry().await?;

    Ok(Snapshot::new(sessions, registry))
}

/// The main realization of [SessionSource]: a directory of JSON files.
pub struct DataDir {
    dir: PathBuf,
}

impl DataDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Lines of `path` under a shared lock, or [None] when the file doesn't exist.
    async fn read_lines(path: &Path) -> Result<Option<Vec<String>>, std::io::Error> {
        debug!("Reading {path:?}");
        let file = match File::open(path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        file.lock_shared()?;

        let mut lines = LinesStream::new(BufReader::new(file).lines());
        let mut values = vec![];
        while let Some(line) = lines.next().await {
            match line {
                Ok(v) => values.push(v),
                Err(e) => {
                    // Usually a file cut off in the middle of a write.
                    warn!("Stopped reading {path:?} early: {e}");
                    break;
                }
            }
        }

        lines.into_inner().into_inner().into_inner().unlock_async().await?;
        Ok(Some(values))
    }

    async fn read_registry_file<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.dir.join(name);
        let Some(lines) = Self::read_lines(&path).await? else {
            debug!("{path:?} is missing, assuming no entries");
            return Ok(vec![]);
        };
        let content = lines.join("\n");
        if content.trim().is_empty() {
            return Ok(vec![]);
        }
        serde_json::from_str(&content).with_context(|| format!("Couldn't parse {path:?}"))
    }
}

fn parse_sessions(path: &Path, lines: Vec<String>) -> Vec<Session> {
    lines
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<SessionRecord>(&line) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("During parsing in path {path:?} found illegal json string {line}: {e}");
                None
            }
        })
        .filter_map(|record| match Session::try_from(record) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Skipping record in {path:?}: {e}");
                None
            }
        })
        .collect()
}

impl SessionSource for DataDir {
    async fn available_years(&self) -> Result<Vec<i32>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(e).with_context(|| format!("Couldn't list {:?}", self.dir));
            }
        };

        let mut years = vec![];
        while let Some(entry) = entries.next_entry().await? {
            if let Some(year) = entry.file_name().to_str().and_then(year_of_file_name) {
                years.push(year);
            }
        }
        years.sort_unstable();
        Ok(years)
    }

    async fn get_sessions_for(&self, year: i32) -> Result<Vec<Session>> {
        let path = self.dir.join(year_file_name(year));
        let lines = Self::read_lines(&path)
            .await
            .with_context(|| format!("Couldn't read {path:?}"))?;
        Ok(lines.map(|v| parse_sessions(&path, v)).unwrap_or_default())
    }

    async fn get_registry(&self) -> Result<Registry> {
        let projects = self.read_registry_file::<Project>(PROJECTS_FILE).await?;
        let activity_types = self
            .read_registry_file::<ActivityType>(ACTIVITY_TYPES_FILE)
            .await?;
        Ok(Registry::new(projects, activity_types))
    }
}

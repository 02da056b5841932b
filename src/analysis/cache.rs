use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::model::Snapshot;

use super::queries::{AggregatorConfig, Dashboard, SessionAggregator};

const DEFAULT_CAPACITY: usize = 16;

/// Content hash of everything a dashboard depends on. Equal inputs always give equal
/// fingerprints, no matter where the snapshot came from.
pub fn fingerprint(
    snapshot: &Snapshot,
    today: NaiveDate,
    config: &AggregatorConfig,
) -> Result<blake3::Hash> {
    #[derive(Serialize)]
    struct Key<'a> {
        snapshot: &'a Snapshot,
        today: NaiveDate,
        config: &'a AggregatorConfig,
    }

    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(
        &mut hasher,
        &Key {
            snapshot,
            today,
            config,
        },
    )?;
    Ok(hasher.finalize())
}

/// Memoizes [SessionAggregator::dashboard]. Queries are pure, so a dashboard computed for the
/// same snapshot, day and config can be handed out again.
pub struct DashboardCache {
    capacity: usize,
    entries: Mutex<HashMap<blake3::Hash, Arc<Dashboard>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Default for DashboardCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DashboardCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Default::default(),
            hits: Default::default(),
            misses: Default::default(),
        }
    }

    pub fn get_or_compute(
        &self,
        snapshot: &Snapshot,
        today: NaiveDate,
        config: AggregatorConfig,
    ) -> Result<Arc<Dashboard>> {
        let key = fingerprint(snapshot, today, &config)?;

        if let Some(dashboard) = self.lock()?.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Dashboard cache hit for {}", key.to_hex());
            return Ok(dashboard.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Dashboard cache miss for {}", key.to_hex());
        let dashboard = Arc::new(SessionAggregator::new(snapshot, today, config).dashboard());

        let mut entries = self.lock()?;
        if entries.len() >= self.capacity {
            entries.clear();
        }
        entries.insert(key, dashboard.clone());
        Ok(dashboard)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<blake3::Hash, Arc<Dashboard>>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("Dashboard cache lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Weekday};

    use crate::{
        analysis::grouping::test_data::*,
        model::Snapshot,
        utils::logging::TEST_LOGGING,
    };

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap()
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(
            vec![
                session("1", "alpha", at(2024, 4, 8, 9), 120),
                session("2", "beta", at(2024, 4, 9, 9), 30),
            ],
            registry(),
        )
    }

    #[test]
    fn equal_inputs_share_a_fingerprint() -> Result<()> {
        let config = AggregatorConfig::default();
        assert_eq!(
            fingerprint(&snapshot(), today(), &config)?,
            fingerprint(&snapshot().clone(), today(), &config)?
        );

        let mut changed = snapshot();
        changed.sessions.pop();
        assert_ne!(
            fingerprint(&snapshot(), today(), &config)?,
            fingerprint(&changed, today(), &config)?
        );
        assert_ne!(
            fingerprint(&snapshot(), today(), &config)?,
            fingerprint(&snapshot(), today().succ_opt().unwrap(), &config)?
        );
        Ok(())
    }

    #[test]
    fn repeated_requests_hit_the_cache() -> Result<()> {
        *TEST_LOGGING;
        let cache = DashboardCache::default();
        let snapshot = snapshot();

        let first = cache.get_or_compute(&snapshot, today(), AggregatorConfig::default())?;
        let second = cache.get_or_compute(&snapshot, today(), AggregatorConfig::default())?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        let sunday_weeks = AggregatorConfig {
            week_start: Weekday::Sun,
            ..Default::default()
        };
        let third = cache.get_or_compute(&snapshot, today(), sunday_weeks)?;
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 2);
        Ok(())
    }

    #[test]
    fn cached_dashboard_matches_fresh_computation() -> Result<()> {
        let cache = DashboardCache::new(1);
        let snapshot = snapshot();
        let config = AggregatorConfig::default();

        let cached = cache.get_or_compute(&snapshot, today(), config)?;
        let fresh = SessionAggregator::new(&snapshot, today(), config).dashboard();
        assert_eq!(*cached, fresh);

        cache.get_or_compute(&Snapshot::default(), today(), config)?;
        assert_eq!(cache.len(), 1);
        Ok(())
    }
}

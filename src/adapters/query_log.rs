//! Query Log Adapter
//!
//! Per-category log of recent operations and their durations, used to show
//! what a request did (how many cache round trips, how slow) after the fact.
//! Categories must be enabled before anything is recorded for them.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::domain::ports::InstrumentationSink;
use crate::error::{Error, Result};

/// Recognised categories
pub const QUERY_CATEGORIES: [&str; 5] = ["network", "nal", "database", "cache", "aws"];

/// Records kept per category before the oldest are dropped
pub const DEFAULT_QUERY_LOG_CAPACITY: usize = 1000;

/// One logged operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    pub category: String,
    pub description: String,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CategoryLog {
    enabled: bool,
    /// Every record ever added, including ones since dropped
    count: u64,
    recent: VecDeque<QueryRecord>,
}

/// In-memory query log
#[derive(Debug)]
pub struct QueryLog {
    capacity: usize,
    categories: RwLock<BTreeMap<&'static str, CategoryLog>>,
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUERY_LOG_CAPACITY)
    }
}

impl QueryLog {
    /// Create a log with every category disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log keeping at most `capacity` records per category
    pub fn with_capacity(capacity: usize) -> Self {
        let categories = QUERY_CATEGORIES
            .iter()
            .map(|&c| (c, CategoryLog::default()))
            .collect();
        Self {
            capacity,
            categories: RwLock::new(categories),
        }
    }

    fn validate(category: &str) -> Result<&'static str> {
        QUERY_CATEGORIES
            .iter()
            .copied()
            .find(|&c| c == category)
            .ok_or_else(|| Error::UnknownCategory {
                category: category.to_string(),
                valid: QUERY_CATEGORIES.join(", "),
            })
    }

    /// Add a record. Ignored if the category is disabled.
    pub fn add(&self, category: &str, description: &str, duration: Duration) -> Result<()> {
        let category = Self::validate(category)?;
        let mut categories = self.categories.write();
        let log = categories.entry(category).or_default();
        if !log.enabled {
            return Ok(());
        }

        log.count += 1;
        if self.capacity == 0 {
            return Ok(());
        }
        if log.recent.len() == self.capacity {
            log.recent.pop_front();
        }
        log.recent.push_back(QueryRecord {
            category: category.to_string(),
            description: description.to_string(),
            duration,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Number of records added for a category
    pub fn count(&self, category: &str) -> Result<u64> {
        let category = Self::validate(category)?;
        Ok(self
            .categories
            .read()
            .get(category)
            .map_or(0, |log| log.count))
    }

    /// Record counts for every category
    pub fn all_counts(&self) -> BTreeMap<&'static str, u64> {
        self.categories
            .read()
            .iter()
            .map(|(&category, log)| (category, log.count))
            .collect()
    }

    /// The most recent `limit` records, oldest first. `None` returns everything kept.
    pub fn last_queries(&self, category: &str, limit: Option<usize>) -> Result<Vec<QueryRecord>> {
        let category = Self::validate(category)?;
        let categories = self.categories.read();
        let Some(log) = categories.get(category) else {
            return Ok(Vec::new());
        };

        let skip = limit.map_or(0, |n| log.recent.len().saturating_sub(n));
        Ok(log.recent.iter().skip(skip).cloned().collect())
    }

    /// Whether a category is recording
    pub fn is_enabled(&self, category: &str) -> Result<bool> {
        let category = Self::validate(category)?;
        Ok(self
            .categories
            .read()
            .get(category)
            .is_some_and(|log| log.enabled))
    }

    /// Start recording a category
    pub fn enable(&self, category: &str) -> Result<()> {
        self.set_enabled(category, true)
    }

    /// Stop recording a category. Existing records are kept.
    pub fn disable(&self, category: &str) -> Result<()> {
        self.set_enabled(category, false)
    }

    fn set_enabled(&self, category: &str, enabled: bool) -> Result<()> {
        let category = Self::validate(category)?;
        self.categories.write().entry(category).or_default().enabled = enabled;
        Ok(())
    }

    /// Start recording every category
    pub fn enable_all(&self) {
        for log in self.categories.write().values_mut() {
            log.enabled = true;
        }
    }

    /// Stop recording every category
    pub fn disable_all(&self) {
        for log in self.categories.write().values_mut() {
            log.enabled = false;
        }
    }

    /// Drop all records and counts, keeping the enabled flags
    pub fn clear(&self) {
        for log in self.categories.write().values_mut() {
            log.count = 0;
            log.recent.clear();
        }
    }
}

impl InstrumentationSink for QueryLog {
    fn record(&self, category: &str, description: &str, duration: Duration) {
        if let Err(e) = self.add(category, description, duration) {
            debug!("Dropping query record: {}", e);
        }
    }
}

//! Rate cache snapshot
//!
//! Holds the rows of the last completed pass, in registry order. The whole
//! snapshot is swapped on each pass; rows are never patched individually.

use crate::{
    constants::STALE_THRESHOLD_SECS,
    error::RateLookupError,
    types::{RateReading, RateResult},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Immutable snapshot of the last pass
#[derive(Debug, Clone)]
pub struct RateCache {
    rows: Arc<[RateResult]>,
    updated_at: Option<DateTime<Utc>>,
    stale_threshold_secs: u64,
}

impl RateCache {
    /// An empty cache, before any pass has completed
    pub fn empty(stale_threshold_secs: u64) -> Self {
        Self {
            rows: Vec::<RateResult>::new().into(),
            updated_at: None,
            stale_threshold_secs,
        }
    }

    /// A snapshot holding one pass worth of rows
    pub fn from_pass(
        rows: Vec<RateResult>,
        updated_at: DateTime<Utc>,
        stale_threshold_secs: u64,
    ) -> Self {
        Self {
            rows: rows.into(),
            updated_at: Some(updated_at),
            stale_threshold_secs,
        }
    }

    /// Rows in registry order, errors included
    pub fn rows(&self) -> &[RateResult] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Finds the row for an asset id (case-insensitive)
    pub fn row(&self, asset_id: &str) -> Option<&RateResult> {
        let key = asset_id.to_ascii_lowercase();
        self.rows.iter().find(|row| row.asset.key() == key)
    }

    /// Gets a fresh rate for an asset
    ///
    /// # Returns
    /// The reading, or why it cannot be used
    pub fn get_rate(&self, asset_id: &str) -> Result<RateReading, RateLookupError> {
        let row = self
            .row(asset_id)
            .ok_or_else(|| RateLookupError::not_available(asset_id))?;

        let reading = match &row.outcome {
            Ok(reading) => reading,
            Err(failure) => {
                return Err(RateLookupError::fetch_failed(&row.asset.symbol, failure.kind))
            }
        };

        if reading.is_stale(self.stale_threshold_secs) {
            return Err(RateLookupError::stale(&row.asset.symbol, reading.age()));
        }

        Ok(reading.clone())
    }

    /// Rows whose last fetch succeeded
    pub fn successes(&self) -> impl Iterator<Item = &RateResult> {
        self.rows.iter().filter(|row| row.is_ok())
    }

    /// Rows whose last fetch failed
    pub fn failures(&self) -> impl Iterator<Item = &RateResult> {
        self.rows.iter().filter(|row| !row.is_ok())
    }

    /// Number of successful rows that are older than the stale threshold
    pub fn stale_count(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|row| row.outcome.as_ref().ok())
            .filter(|reading| reading.is_stale(self.stale_threshold_secs))
            .count()
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::empty(STALE_THRESHOLD_SECS)
    }
}

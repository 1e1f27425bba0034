//! Percentile aggregation of raw wait telemetry into hourly buckets.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::model::{AttractionId, HourlyStat, HourlyStatKey, WaitObservation};
use crate::traits::{HourlyStatStore, ObservationStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    /// Rolling window of observations feeding each bucket.
    pub lookback_weeks: u32,
    /// Upper bound on concurrently processed units (match the backend's connection limit).
    pub max_workers: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            lookback_weeks: 12,
            max_workers: 4,
        }
    }
}

/// Outcome of a batch run. Failed units are counted, never fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Units that completed.
    pub processed: usize,
    /// Units that failed and were skipped.
    pub errors: usize,
    pub records_written: usize,
}

impl BatchReport {
    pub fn merge(self, other: BatchReport) -> BatchReport {
        BatchReport {
            processed: self.processed + other.processed,
            errors: self.errors + other.errors,
            records_written: self.records_written + other.records_written,
        }
    }
}

/// Nearest-rank percentile over ascending data.
pub fn nearest_rank(sorted: &[u32], percentile: f64) -> Option<u32> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len() as i64;
    let rank = (percentile / 100.0 * n as f64).ceil() as i64 - 1;
    Some(sorted[rank.clamp(0, n - 1) as usize])
}

/// Statistics for one bucket, filtering `observations` down to the bucket first.
pub fn compute_hourly_stat(key: &HourlyStatKey, observations: &[WaitObservation]) -> HourlyStat {
    stat_from_samples(
        key.clone(),
        observations
            .iter()
            .filter(|obs| obs.attraction_id == key.attraction_id && key.matches(obs.timestamp)),
    )
}

fn stat_from_samples<'a>(key: HourlyStatKey, samples: impl IntoIterator<Item = &'a WaitObservation>) -> HourlyStat {
    let mut sample_count = 0u32;
    let mut open_waits = Vec::new();
    for sample in samples {
        sample_count += 1;
        if sample.is_open {
            open_waits.push(sample.wait_minutes);
        }
    }

    if sample_count == 0 {
        return HourlyStat {
            key,
            p50: None,
            p80: None,
            p95: None,
            open_rate: None,
            sample_count,
        };
    }

    open_waits.sort_unstable();
    HourlyStat {
        key,
        p50: nearest_rank(&open_waits, 50.0),
        p80: nearest_rank(&open_waits, 80.0),
        p95: nearest_rank(&open_waits, 95.0),
        open_rate: Some(open_waits.len() as f64 / sample_count as f64),
        sample_count,
    }
}

/// Groups observations by bucket in a single pass.
pub fn bucket_observations(observations: &[WaitObservation]) -> BTreeMap<HourlyStatKey, Vec<&WaitObservation>> {
    let mut buckets: BTreeMap<HourlyStatKey, Vec<&WaitObservation>> = BTreeMap::new();
    for obs in observations {
        buckets
            .entry(HourlyStatKey::for_timestamp(obs.attraction_id.clone(), obs.timestamp))
            .or_default()
            .push(obs);
    }
    buckets
}

/// Every non-empty bucket for the given observations.
///
/// Equivalent to scanning all 12 x 7 x 24 buckets per attraction and dropping
/// the empty ones, without rescanning the observations per bucket.
pub fn compute_bucket_stats(observations: &[WaitObservation]) -> Vec<HourlyStat> {
    bucket_observations(observations)
        .into_iter()
        .map(|(key, samples)| stat_from_samples(key, samples))
        .filter(|stat| !stat.is_empty())
        .collect()
}

/// Recomputes and upserts all buckets for one attraction. Returns records written.
pub fn aggregate_attraction<S>(
    store: &S,
    attraction_id: &AttractionId,
    now: NaiveDateTime,
    options: &AggregateOptions,
) -> Result<usize, StorageError>
where
    S: ObservationStore + HourlyStatStore + ?Sized,
{
    let since = now - TimeDelta::weeks(options.lookback_weeks as i64);
    let observations: Vec<WaitObservation> = store
        .load_observations(attraction_id, since)?
        .into_iter()
        .filter(|obs| obs.attraction_id == *attraction_id && obs.timestamp <= now)
        .collect();

    let stats = compute_bucket_stats(&observations);
    for stat in &stats {
        store.write_hourly_stat(stat)?;
    }

    tracing::debug!(
        attraction_id = %attraction_id,
        observations = observations.len(),
        buckets = stats.len(),
        "Aggregated attraction"
    );
    Ok(stats.len())
}

/// Aggregates many attractions on a bounded worker pool.
pub fn aggregate_batch<S>(
    store: &S,
    attractions: &[AttractionId],
    now: NaiveDateTime,
    options: &AggregateOptions,
) -> BatchReport
where
    S: ObservationStore + HourlyStatStore + Sync + ?Sized,
{
    run_units("aggregation", options.max_workers, attractions, |attraction_id| {
        aggregate_attraction(store, attraction_id, now, options)
    })
}

/// Runs independent units in parallel, isolating and counting failures.
pub(crate) fn run_units<T, F>(label: &str, max_workers: usize, units: &[T], work: F) -> BatchReport
where
    T: fmt::Display + Sync,
    F: Fn(&T) -> Result<usize, StorageError> + Sync,
{
    let run = || {
        units
            .par_iter()
            .map(|unit| match work(unit) {
                Ok(records_written) => BatchReport {
                    processed: 1,
                    errors: 0,
                    records_written,
                },
                Err(err) => {
                    tracing::warn!(unit = %unit, error = %err, "{} unit failed", label);
                    BatchReport {
                        processed: 0,
                        errors: 1,
                        records_written: 0,
                    }
                }
            })
            .reduce(BatchReport::default, BatchReport::merge)
    };

    let report = match rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(err) => {
            tracing::warn!(error = %err, "Falling back to the global worker pool");
            run()
        }
    };

    tracing::info!(
        processed = report.processed,
        errors = report.errors,
        records_written = report.records_written,
        "{} batch finished",
        label
    );
    report
}

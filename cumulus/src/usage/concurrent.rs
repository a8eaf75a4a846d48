//! Daily concurrent usage aggregation.
//!
//! For each calendar day in a requested range, computes the peak number of
//! simultaneously running instances per dimension tuple with a sweep over
//! clipped interval endpoints. Days are independent aggregation units (the
//! report contract is one record per day), so a long-lived run is
//! considered once per day it overlaps; the run list is sorted by start
//! once up front and each day's scan stops at the first run starting after
//! the day ends.
//!
//! Boundary policy, fixed and relied on by tests: intervals are half-open
//! (`[start, end)`), so at identical timestamps end events are processed
//! before start events. A run ending at 11:00 has already released its
//! slot when another starts at 11:00, and back-to-back runs on the same
//! instance peak at 1, not 2. Any run with a nonempty overlap against the
//! day still registers at least 1; a degenerate zero-length run occupies
//! nothing and is skipped.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

use super::runs::{Run, RunDimensions};

/// Peak simultaneous instance count for one dimension tuple on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrentCount {
    pub dimensions: RunDimensions,
    pub instance_count: u32,
}

/// One day's concurrent usage report.
///
/// `maximum_counts` holds every dimension combination whose peak was
/// positive that day, ordered by dimension tuple; a day with no usage has
/// an empty list but is still reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyConcurrentUsage {
    pub date: NaiveDate,
    pub maximum_counts: Vec<ConcurrentCount>,
}

/// Optional dimension filters: a `Some` field restricts runs to that exact
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilters {
    pub architecture: Option<String>,
    pub sla: Option<String>,
    pub role: Option<String>,
    pub usage: Option<String>,
    pub service_type: Option<String>,
}

impl DimensionFilters {
    fn matches(&self, dims: &RunDimensions) -> bool {
        fn ok(filter: &Option<String>, value: &Option<String>) -> bool {
            filter.is_none() || filter == value
        }
        ok(&self.architecture, &dims.architecture)
            && ok(&self.sla, &dims.sla)
            && ok(&self.role, &dims.role)
            && ok(&self.usage, &dims.usage)
            && ok(&self.service_type, &dims.service_type)
    }
}

/// Knobs for a single aggregation call.
#[derive(Debug, Clone, Default)]
pub struct AggregationOptions {
    pub filters: Option<DimensionFilters>,
    /// Abort with a retryable `Timeout` once this instant passes. Checked
    /// between days, so completed days are carried in the error for
    /// resumption.
    pub deadline: Option<Instant>,
    /// Reject ranges spanning more than this many days.
    pub max_days: Option<u32>,
}

/// Compute per-day peak concurrent usage for every day in
/// `[start_date, end_date)`.
///
/// Pure function over the supplied snapshot of runs; safe to call in
/// parallel over disjoint ranges. Returns one record per day in ascending
/// date order, including days with no usage.
///
/// # Errors
/// - `InvalidRange` if `start_date >= end_date` or the span exceeds
///   `options.max_days`
/// - `Timeout` if the deadline passes mid-range, carrying the completed
///   days and the date to resume from
pub fn compute_daily_usage(
    runs: &[Run],
    start_date: NaiveDate,
    end_date: NaiveDate,
    options: &AggregationOptions,
) -> Result<Vec<DailyConcurrentUsage>> {
    if start_date >= end_date {
        return Err(Error::InvalidRange {
            start: start_date,
            end: end_date,
            reason: "start_date must be before end_date".to_string(),
        });
    }
    let span_days = (end_date - start_date).num_days() as u64;
    if let Some(max_days) = options.max_days {
        if span_days > u64::from(max_days) {
            return Err(Error::InvalidRange {
                start: start_date,
                end: end_date,
                reason: format!("range spans {span_days} days, limit is {max_days}"),
            });
        }
    }

    // Sort once; each day's scan below stops at the first run starting at
    // or after the day's end instead of rescanning the whole snapshot.
    let mut sorted: Vec<&Run> = runs
        .iter()
        .filter(|run| match &options.filters {
            Some(filters) => filters.matches(&run.dimensions),
            None => true,
        })
        .collect();
    sorted.sort_by_key(|run| run.start_time);

    let mut report = Vec::with_capacity(span_days as usize);
    for day in start_date.iter_days().take_while(|d| *d < end_date) {
        if let Some(deadline) = options.deadline {
            if Instant::now() >= deadline {
                tracing::warn!(
                    %start_date,
                    %end_date,
                    completed = report.len(),
                    resume_from = %day,
                    "usage aggregation deadline exceeded"
                );
                return Err(Error::Timeout {
                    completed: report,
                    resume_from: day,
                });
            }
        }
        report.push(DailyConcurrentUsage {
            date: day,
            maximum_counts: max_concurrent_usage(&sorted, day),
        });
    }

    tracing::debug!(%start_date, %end_date, days = report.len(), "usage report computed");
    Ok(report)
}

/// [`compute_daily_usage`] offloaded to the blocking thread pool, for
/// callers inside an async request handler. The sweep is CPU-bound and a
/// long range would otherwise stall the executor.
pub async fn compute_daily_usage_blocking(
    runs: Vec<Run>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    options: AggregationOptions,
) -> Result<Vec<DailyConcurrentUsage>> {
    tokio::task::spawn_blocking(move || {
        compute_daily_usage(&runs, start_date, end_date, &options)
    })
    .await
    .map_err(|e| Error::Other(anyhow::Error::from(e)))?
}

/// Peak concurrent usage per dimension tuple for a single day.
///
/// Expects `sorted` ordered by start time.
fn max_concurrent_usage(sorted: &[&Run], day: NaiveDate) -> Vec<ConcurrentCount> {
    let day_start = day.and_time(NaiveTime::MIN).and_utc();
    let day_end = (day + Days::new(1)).and_time(NaiveTime::MIN).and_utc();

    // +1 at each clipped start, -1 at each clipped end, grouped by
    // dimension tuple. BTreeMap keeps the output ordered by tuple.
    let mut events: BTreeMap<&RunDimensions, Vec<(DateTime<Utc>, i32)>> = BTreeMap::new();
    let overlapping = sorted.partition_point(|run| run.start_time < day_end);
    for run in &sorted[..overlapping] {
        let ends_after_day_start = match run.end_time {
            Some(end) => end > day_start,
            None => true,
        };
        if !ends_after_day_start {
            continue;
        }
        let clipped_start = run.start_time.max(day_start);
        let clipped_end = run.end_time.map_or(day_end, |end| end.min(day_end));
        if clipped_start >= clipped_end {
            // Zero-length run; occupies nothing.
            continue;
        }
        let group = events.entry(&run.dimensions).or_default();
        group.push((clipped_start, 1));
        group.push((clipped_end, -1));
    }

    let mut counts = Vec::with_capacity(events.len());
    for (dimensions, mut group) in events {
        // Ends (-1) before starts (+1) at identical timestamps: intervals
        // are half-open, so a run ending at an instant has already released
        // its slot for a run starting there.
        group.sort_by_key(|(at, delta)| (*at, *delta));
        let mut running = 0i32;
        let mut peak = 0i32;
        for (_, delta) in group {
            running += delta;
            peak = peak.max(running);
        }
        if peak > 0 {
            counts.push(ConcurrentCount {
                dimensions: dimensions.clone(),
                instance_count: peak as u32,
            });
        }
    }
    counts
}

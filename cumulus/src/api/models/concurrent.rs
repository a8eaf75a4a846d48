//! API request/response models for the daily concurrent usage report.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::usage::{ConcurrentCount, DailyConcurrentUsage};

/// Query parameters for the concurrent usage endpoint.
///
/// Both dates are calendar days (YYYY-MM-DD); `start_date` is inclusive and
/// `end_date` exclusive. Defaults produce a one-day report for today.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConcurrentUsageParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ConcurrentUsageParams {
    /// Resolve defaults against the current date and validate the range.
    ///
    /// # Errors
    /// - `InvalidRange` if the resolved start is not strictly before the
    ///   resolved end
    pub fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        let start = self.start_date.unwrap_or(today);
        let end = self.end_date.unwrap_or(today + Days::new(1));
        if start >= end {
            return Err(Error::InvalidRange {
                start,
                end,
                reason: "start_date must be before end_date".to_string(),
            });
        }
        Ok((start, end))
    }
}

/// Peak concurrent count for one dimension combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCountResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    pub instance_count: u32,
}

impl From<ConcurrentCount> for UsageCountResponse {
    fn from(count: ConcurrentCount) -> Self {
        Self {
            arch: count.dimensions.architecture,
            sla: count.dimensions.sla,
            role: count.dimensions.role,
            usage: count.dimensions.usage,
            service_type: count.dimensions.service_type,
            instance_count: count.instance_count,
        }
    }
}

/// One day of the usage report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyConcurrentUsageResponse {
    pub date: NaiveDate,
    pub maximum_counts: Vec<UsageCountResponse>,
}

impl From<DailyConcurrentUsage> for DailyConcurrentUsageResponse {
    fn from(day: DailyConcurrentUsage) -> Self {
        Self {
            date: day.date,
            maximum_counts: day
                .maximum_counts
                .into_iter()
                .map(UsageCountResponse::from)
                .collect(),
        }
    }
}

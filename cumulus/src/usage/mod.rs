//! Usage reporting: run normalization and concurrent usage aggregation.

pub mod concurrent;
pub mod runs;

pub use concurrent::{
    compute_daily_usage, compute_daily_usage_blocking, AggregationOptions, ConcurrentCount,
    DailyConcurrentUsage, DimensionFilters,
};
pub use runs::{normalize_runs, InstanceEvent, InstanceEventType, Run, RunDimensions};

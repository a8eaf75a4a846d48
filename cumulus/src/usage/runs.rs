//! Instance run intervals and their derivation from power events.
//!
//! The ingestion feed reports raw power events per instance; reporting
//! works on normalized "runs" so the aggregator never has to walk the
//! event stream again. A run's end is open (`None`) while the instance is
//! still up.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::InstanceId;

/// The classification dimensions usage is broken out by.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RunDimensions {
    pub architecture: Option<String>,
    pub sla: Option<String>,
    pub role: Option<String>,
    pub usage: Option<String>,
    pub service_type: Option<String>,
}

/// A normalized period during which one instance was running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub instance_id: InstanceId,
    pub dimensions: RunDimensions,
    pub start_time: DateTime<Utc>,
    /// `None` while the instance is still running.
    pub end_time: Option<DateTime<Utc>>,
}

/// Raw event kinds reported by the ingestion feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceEventType {
    PowerOn,
    PowerOff,
    /// Type or metadata change; irrelevant to run boundaries.
    AttributeChange,
}

impl fmt::Display for InstanceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceEventType::PowerOn => write!(f, "power_on"),
            InstanceEventType::PowerOff => write!(f, "power_off"),
            InstanceEventType::AttributeChange => write!(f, "attribute_change"),
        }
    }
}

/// A single power event for an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceEvent {
    pub instance_id: InstanceId,
    pub event_type: InstanceEventType,
    pub occurred_at: DateTime<Utc>,
}

/// Fold a power event stream into normalized runs.
///
/// Events are grouped per instance and walked in time order. Only the first
/// of consecutive `power_on` events opens a run, so spurious sequences like
/// "start start stop" produce a single run. A `power_off` with no open run
/// is dropped. An instance that was started but never stopped yields an
/// open-ended run.
///
/// `dimensions` supplies each instance's classification tuple; instances
/// missing from the map get empty dimensions.
pub fn normalize_runs(
    events: &[InstanceEvent],
    dimensions: &HashMap<InstanceId, RunDimensions>,
) -> Vec<Run> {
    let mut by_instance: HashMap<InstanceId, Vec<&InstanceEvent>> = HashMap::new();
    for event in events {
        by_instance.entry(event.instance_id).or_default().push(event);
    }

    let mut instance_ids: Vec<InstanceId> = by_instance.keys().copied().collect();
    instance_ids.sort();

    let mut runs = Vec::new();
    for instance_id in instance_ids {
        let mut events = by_instance.remove(&instance_id).unwrap_or_default();
        events.sort_by_key(|e| e.occurred_at);

        let dims = match dimensions.get(&instance_id) {
            Some(dims) => dims.clone(),
            None => {
                tracing::warn!(%instance_id, "instance has no dimension data");
                RunDimensions::default()
            }
        };

        let mut start_run: Option<DateTime<Utc>> = None;
        for event in events {
            match event.event_type {
                InstanceEventType::PowerOn => {
                    // Only the first power_on opens the run; repeats are
                    // spurious.
                    if start_run.is_none() {
                        start_run = Some(event.occurred_at);
                    }
                }
                InstanceEventType::PowerOff => {
                    if let Some(start) = start_run.take() {
                        runs.push(Run {
                            instance_id,
                            dimensions: dims.clone(),
                            start_time: start,
                            end_time: Some(event.occurred_at),
                        });
                    }
                }
                InstanceEventType::AttributeChange => {}
            }
        }

        if let Some(start) = start_run {
            // Started but never stopped: the run is still open.
            runs.push(Run {
                instance_id,
                dimensions: dims,
                start_time: start,
                end_time: None,
            });
        }
    }

    runs
}

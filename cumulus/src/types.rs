//! Shared type definitions.
//!
//! Entity IDs are UUIDs wrapped in type aliases; the cloud-assigned image
//! identifier is deliberately an opaque string (an AMI id for AWS, a
//! resource id for Azure) and lives in [`crate::image::ImageKey`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a compute instance tracked by the ingestion feed.
pub type InstanceId = Uuid;

/// The public cloud a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Azure,
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudProvider::Aws => write!(f, "aws"),
            CloudProvider::Azure => write!(f, "azure"),
        }
    }
}

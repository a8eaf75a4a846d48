//! API request/response models for machine images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::image::{AnyImage, ChallengeField, ImageFilters, ImageStatus};
use crate::types::CloudProvider;

use super::pagination::Pagination;

/// Machine image resource as served by the images endpoints.
///
/// The `rhel`/`openshift` flags are the effective values (detection flipped
/// by any challenge); the `*_detected` and `*_challenged` fields expose the
/// underlying pieces so callers can see why a flag is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineImageResponse {
    pub image_id: String,
    pub cloud_type: CloudProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: ImageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    pub is_encrypted: bool,
    pub rhel: bool,
    pub rhel_detected: bool,
    pub rhel_challenged: bool,
    pub rhel_detected_by_tag: bool,
    pub rhel_enabled_repos_found: bool,
    pub rhel_product_certs_found: bool,
    pub rhel_release_files_found: bool,
    pub rhel_signed_packages_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rhel_version: Option<String>,
    pub openshift: bool,
    pub openshift_detected: bool,
    pub openshift_challenged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syspurpose: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AnyImage> for MachineImageResponse {
    fn from(image: &AnyImage) -> Self {
        let data = image.data();
        let results = image.inspection_results();
        Self {
            image_id: data.key.image_id.clone(),
            cloud_type: data.key.provider,
            name: data.name.clone(),
            status: image.status(),
            architecture: image.architecture().map(str::to_string),
            is_encrypted: image.is_encrypted(),
            rhel: image.rhel(),
            rhel_detected: image.rhel_detected(),
            rhel_challenged: data.rhel_challenged,
            rhel_detected_by_tag: results.map(|r| r.rhel_detected_by_tag).unwrap_or(false),
            rhel_enabled_repos_found: results.map(|r| r.rhel_enabled_repos_found).unwrap_or(false),
            rhel_product_certs_found: results.map(|r| r.rhel_product_certs_found).unwrap_or(false),
            rhel_release_files_found: results.map(|r| r.rhel_release_files_found).unwrap_or(false),
            rhel_signed_packages_found: results
                .map(|r| r.rhel_signed_packages_found)
                .unwrap_or(false),
            rhel_version: results.and_then(|r| r.rhel_version.clone()),
            openshift: image.openshift(),
            openshift_detected: image.openshift_detected(),
            openshift_challenged: data.openshift_challenged,
            syspurpose: results.and_then(|r| r.syspurpose.clone()),
            inspection_json: results.and_then(|r| r.inspection_json.clone()),
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }
}

/// Query parameters for the image list endpoint.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ImageListParams {
    pub architecture: Option<String>,
    pub status: Option<ImageStatus>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

impl ImageListParams {
    pub fn filters(&self) -> ImageFilters {
        ImageFilters {
            architecture: self.architecture.clone(),
            status: self.status,
        }
    }
}

/// PATCH body for an image resource. Only the two challenge flags are
/// writable through the API; everything else belongs to the inspection
/// pipeline.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ImageChallengePatch {
    pub rhel_challenged: Option<bool>,
    pub openshift_challenged: Option<bool>,
}

impl ImageChallengePatch {
    /// The challenge updates this patch requests, in application order.
    pub fn changes(&self) -> Vec<(ChallengeField, bool)> {
        let mut changes = Vec::new();
        if let Some(value) = self.rhel_challenged {
            changes.push((ChallengeField::Rhel, value));
        }
        if let Some(value) = self.openshift_challenged {
            changes.push((ChallengeField::Openshift, value));
        }
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.rhel_challenged.is_none() && self.openshift_challenged.is_none()
    }
}

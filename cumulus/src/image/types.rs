//! Core types for the machine image inspection lifecycle.
//!
//! This module defines the type-safe image lifecycle using the typestate
//! pattern. An image progresses pending -> preparing -> inspecting ->
//! inspected, with `error` and `unavailable` as absorbing failure terminals
//! reachable from any non-terminal state.
//!
//! Detection results are written by the inspection collaborator; challenge
//! flags are written by API callers. The two writers never touch each
//! other's fields, and the effective `rhel`/`openshift` flags are derived on
//! read rather than stored, so there is no cached value for the writers to
//! race on.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CloudProvider;

/// Identity of a machine image: the owning cloud plus that cloud's opaque
/// image id (e.g. an EC2 AMI id). Unique per provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageKey {
    pub provider: CloudProvider,
    pub image_id: String,
}

impl ImageKey {
    pub fn new(provider: CloudProvider, image_id: impl Into<String>) -> Self {
        Self {
            provider,
            image_id: image_id.into(),
        }
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.image_id)
    }
}

/// Lifecycle status of an image, as exposed to API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Preparing,
    Inspecting,
    Inspected,
    Error,
    Unavailable,
}

impl ImageStatus {
    /// The next status on the happy path, if any. Terminals and `inspected`
    /// have no successor.
    pub fn successor(self) -> Option<ImageStatus> {
        match self {
            ImageStatus::Pending => Some(ImageStatus::Preparing),
            ImageStatus::Preparing => Some(ImageStatus::Inspecting),
            ImageStatus::Inspecting => Some(ImageStatus::Inspected),
            ImageStatus::Inspected | ImageStatus::Error | ImageStatus::Unavailable => None,
        }
    }

    /// Whether this status is absorbing: `inspected`, `error`, and
    /// `unavailable` are never left again (challenge flags excepted).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ImageStatus::Inspected | ImageStatus::Error | ImageStatus::Unavailable
        )
    }

    /// Forward-only transition check: the immediate successor, or a jump
    /// from any non-terminal state to a failure terminal. Re-asserting a
    /// terminal's own status is accepted so duplicate completion events are
    /// idempotent.
    pub fn can_advance_to(self, new: ImageStatus) -> bool {
        if self.is_terminal() {
            return new == self;
        }
        if self.successor() == Some(new) {
            return true;
        }
        matches!(new, ImageStatus::Error | ImageStatus::Unavailable)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageStatus::Pending => write!(f, "pending"),
            ImageStatus::Preparing => write!(f, "preparing"),
            ImageStatus::Inspecting => write!(f, "inspecting"),
            ImageStatus::Inspected => write!(f, "inspected"),
            ImageStatus::Error => write!(f, "error"),
            ImageStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// The two challengeable detection flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeField {
    Rhel,
    Openshift,
}

impl fmt::Display for ChallengeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeField::Rhel => write!(f, "rhel"),
            ChallengeField::Openshift => write!(f, "openshift"),
        }
    }
}

/// System-computed detection fields, populated by the inspection
/// collaborator while the image is `inspecting` and read-only for everyone
/// else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionResults {
    pub rhel_detected_by_tag: bool,
    pub rhel_enabled_repos_found: bool,
    pub rhel_product_certs_found: bool,
    pub rhel_release_files_found: bool,
    pub rhel_signed_packages_found: bool,
    pub rhel_version: Option<String>,
    pub openshift_detected: bool,
    pub architecture: Option<String>,
    pub is_encrypted: bool,
    /// Parsed syspurpose facts (role, SLA, usage, service type).
    pub syspurpose: Option<serde_json::Value>,
    /// Raw inspection payload as produced by the pipeline.
    pub inspection_json: Option<serde_json::Value>,
}

impl InspectionResults {
    /// Canonical RHEL detection: any facet the inspection found is enough.
    pub fn rhel_detected(&self) -> bool {
        self.rhel_detected_by_tag
            || self.rhel_enabled_repos_found
            || self.rhel_product_certs_found
            || self.rhel_release_files_found
            || self.rhel_signed_packages_found
    }
}

/// Fields shared by an image in every lifecycle state.
///
/// Challenge flags live here, not in the per-state payloads: a human may
/// challenge before, during, or after inspection, including on terminal
/// images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub key: ImageKey,
    /// Human-readable name reported by the cloud, if any.
    pub name: Option<String>,
    pub rhel_challenged: bool,
    pub openshift_challenged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageData {
    /// New image data for a first-seen image.
    pub fn new(key: ImageKey, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            key,
            name,
            rhel_challenged: false,
            openshift_challenged: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Marker trait for valid image lifecycle states.
pub trait ImageState: Send + Sync {}

/// A machine image record in a specific lifecycle state.
///
/// The generic parameter `S` is the current state, so the inspection
/// pipeline's transitions are checked at compile time; the API-facing
/// dynamic path goes through [`AnyImage::advance`].
#[derive(Debug, Clone)]
pub struct MachineImage<S: ImageState> {
    /// The current lifecycle state and its payload.
    pub state: S,
    /// Identity, challenge flags, and timestamps.
    pub data: ImageData,
}

impl MachineImage<Pending> {
    /// A freshly observed image, in `pending` and awaiting inspection.
    pub fn observed(key: ImageKey, name: Option<String>) -> Self {
        Self {
            state: Pending {},
            data: ImageData::new(key, name),
        }
    }
}

// ============================================================================
// Image States
// ============================================================================

/// First observed, waiting for the inspection pipeline to pick it up.
#[derive(Debug, Clone)]
pub struct Pending {}

impl ImageState for Pending {}

/// The pipeline is preparing the image content for inspection (e.g. copying
/// a snapshot into the inspection account).
#[derive(Debug, Clone)]
pub struct Preparing {
    pub started_at: DateTime<Utc>,
}

impl ImageState for Preparing {}

/// The image content is being inspected. Detection results land here as the
/// pipeline reports them and are carried into `Inspected` on completion.
#[derive(Debug, Clone)]
pub struct Inspecting {
    pub started_at: DateTime<Utc>,
    pub results: Option<InspectionResults>,
}

impl ImageState for Inspecting {}

/// Inspection finished.
#[derive(Debug, Clone)]
pub struct Inspected {
    pub results: Option<InspectionResults>,
    pub inspected_at: DateTime<Utc>,
}

impl ImageState for Inspected {}

/// Inspection failed. Absorbing.
#[derive(Debug, Clone)]
pub struct InspectionFailed {
    /// Failure detail, when the collaborator reported one.
    pub detail: Option<String>,
    pub failed_at: DateTime<Utc>,
}

impl ImageState for InspectionFailed {}

/// The image exists but its content cannot be accessed for inspection.
/// Absorbing.
#[derive(Debug, Clone)]
pub struct Unavailable {
    pub since: DateTime<Utc>,
}

impl ImageState for Unavailable {}

// ============================================================================
// State-erased representation
// ============================================================================

/// An image in any lifecycle state.
///
/// This is what the store holds and what API responses are built from.
#[derive(Debug, Clone)]
pub enum AnyImage {
    Pending(MachineImage<Pending>),
    Preparing(MachineImage<Preparing>),
    Inspecting(MachineImage<Inspecting>),
    Inspected(MachineImage<Inspected>),
    Error(MachineImage<InspectionFailed>),
    Unavailable(MachineImage<Unavailable>),
}

impl AnyImage {
    pub fn data(&self) -> &ImageData {
        match self {
            AnyImage::Pending(i) => &i.data,
            AnyImage::Preparing(i) => &i.data,
            AnyImage::Inspecting(i) => &i.data,
            AnyImage::Inspected(i) => &i.data,
            AnyImage::Error(i) => &i.data,
            AnyImage::Unavailable(i) => &i.data,
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut ImageData {
        match self {
            AnyImage::Pending(i) => &mut i.data,
            AnyImage::Preparing(i) => &mut i.data,
            AnyImage::Inspecting(i) => &mut i.data,
            AnyImage::Inspected(i) => &mut i.data,
            AnyImage::Error(i) => &mut i.data,
            AnyImage::Unavailable(i) => &mut i.data,
        }
    }

    pub fn key(&self) -> &ImageKey {
        &self.data().key
    }

    pub fn status(&self) -> ImageStatus {
        match self {
            AnyImage::Pending(_) => ImageStatus::Pending,
            AnyImage::Preparing(_) => ImageStatus::Preparing,
            AnyImage::Inspecting(_) => ImageStatus::Inspecting,
            AnyImage::Inspected(_) => ImageStatus::Inspected,
            AnyImage::Error(_) => ImageStatus::Error,
            AnyImage::Unavailable(_) => ImageStatus::Unavailable,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Detection results, wherever the lifecycle currently holds them.
    pub fn inspection_results(&self) -> Option<&InspectionResults> {
        match self {
            AnyImage::Inspecting(i) => i.state.results.as_ref(),
            AnyImage::Inspected(i) => i.state.results.as_ref(),
            _ => None,
        }
    }

    /// Whether the inspection detected RHEL content. False until results
    /// exist.
    pub fn rhel_detected(&self) -> bool {
        self.inspection_results()
            .map(InspectionResults::rhel_detected)
            .unwrap_or(false)
    }

    /// Whether the inspection detected OpenShift content.
    pub fn openshift_detected(&self) -> bool {
        self.inspection_results()
            .map(|r| r.openshift_detected)
            .unwrap_or(false)
    }

    /// Effective RHEL flag: the detected value, flipped if challenged.
    /// Computed on read; never stored.
    pub fn rhel(&self) -> bool {
        self.rhel_detected() ^ self.data().rhel_challenged
    }

    /// Effective OpenShift flag, same XOR rule as [`AnyImage::rhel`].
    pub fn openshift(&self) -> bool {
        self.openshift_detected() ^ self.data().openshift_challenged
    }

    pub fn architecture(&self) -> Option<&str> {
        self.inspection_results()
            .and_then(|r| r.architecture.as_deref())
    }

    pub fn is_encrypted(&self) -> bool {
        self.inspection_results()
            .map(|r| r.is_encrypted)
            .unwrap_or(false)
    }

    /// Try to view as a pending image.
    pub fn as_pending(&self) -> Option<&MachineImage<Pending>> {
        match self {
            AnyImage::Pending(i) => Some(i),
            _ => None,
        }
    }

    /// Try to take as an inspecting image, consuming self.
    pub fn into_inspecting(self) -> Option<MachineImage<Inspecting>> {
        match self {
            AnyImage::Inspecting(i) => Some(i),
            _ => None,
        }
    }
}

impl From<MachineImage<Pending>> for AnyImage {
    fn from(i: MachineImage<Pending>) -> Self {
        AnyImage::Pending(i)
    }
}

impl From<MachineImage<Preparing>> for AnyImage {
    fn from(i: MachineImage<Preparing>) -> Self {
        AnyImage::Preparing(i)
    }
}

impl From<MachineImage<Inspecting>> for AnyImage {
    fn from(i: MachineImage<Inspecting>) -> Self {
        AnyImage::Inspecting(i)
    }
}

impl From<MachineImage<Inspected>> for AnyImage {
    fn from(i: MachineImage<Inspected>) -> Self {
        AnyImage::Inspected(i)
    }
}

impl From<MachineImage<InspectionFailed>> for AnyImage {
    fn from(i: MachineImage<InspectionFailed>) -> Self {
        AnyImage::Error(i)
    }
}

impl From<MachineImage<Unavailable>> for AnyImage {
    fn from(i: MachineImage<Unavailable>) -> Self {
        AnyImage::Unavailable(i)
    }
}

/// Filters for listing images.
#[derive(Debug, Clone, Default)]
pub struct ImageFilters {
    /// Match the architecture reported by inspection. Uninspected images
    /// never match an architecture filter.
    pub architecture: Option<String>,
    pub status: Option<ImageStatus>,
}

impl ImageFilters {
    pub fn matches(&self, image: &AnyImage) -> bool {
        if let Some(arch) = &self.architecture {
            if image.architecture() != Some(arch.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if image.status() != status {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results(rhel: bool, openshift: bool) -> InspectionResults {
        InspectionResults {
            rhel_release_files_found: rhel,
            openshift_detected: openshift,
            architecture: Some("x86_64".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn effective_flags_follow_xor_rule() {
        let key = ImageKey::new(CloudProvider::Aws, "ami-effective");
        let mut image = AnyImage::Inspected(MachineImage {
            state: Inspected {
                results: Some(sample_results(true, false)),
                inspected_at: Utc::now(),
            },
            data: ImageData::new(key, None),
        });

        // Detected and unchallenged: effective value is the detection.
        assert!(image.rhel());
        assert!(!image.openshift());

        // Challenging flips the detected value in both directions.
        image.data_mut().rhel_challenged = true;
        image.data_mut().openshift_challenged = true;
        assert!(!image.rhel());
        assert!(image.openshift());

        // Un-challenging restores the originally detected value.
        image.data_mut().rhel_challenged = false;
        assert!(image.rhel());
    }

    #[test]
    fn detection_facets_or_into_rhel_detected() {
        let mut results = InspectionResults::default();
        assert!(!results.rhel_detected());
        results.rhel_signed_packages_found = true;
        assert!(results.rhel_detected());
    }

    #[test]
    fn uninspected_image_detects_nothing() {
        let image = AnyImage::Pending(MachineImage::observed(
            ImageKey::new(CloudProvider::Azure, "img-1"),
            None,
        ));
        assert!(!image.rhel_detected());
        assert!(!image.rhel());
        assert_eq!(image.architecture(), None);
        assert!(!image.is_encrypted());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ImageStatus::Pending.is_terminal());
        assert!(!ImageStatus::Inspecting.is_terminal());
        assert!(ImageStatus::Inspected.is_terminal());
        assert!(ImageStatus::Error.is_terminal());
        assert!(ImageStatus::Unavailable.is_terminal());
    }

    #[test]
    fn filters_match_architecture_and_status() {
        let image = AnyImage::Inspected(MachineImage {
            state: Inspected {
                results: Some(sample_results(false, false)),
                inspected_at: Utc::now(),
            },
            data: ImageData::new(ImageKey::new(CloudProvider::Aws, "ami-filter"), None),
        });

        let all = ImageFilters::default();
        assert!(all.matches(&image));

        let arch = ImageFilters {
            architecture: Some("x86_64".to_string()),
            status: None,
        };
        assert!(arch.matches(&image));

        let wrong_arch = ImageFilters {
            architecture: Some("arm64".to_string()),
            status: None,
        };
        assert!(!wrong_arch.matches(&image));

        let status = ImageFilters {
            architecture: None,
            status: Some(ImageStatus::Pending),
        };
        assert!(!status.matches(&image));
    }
}

//! Persistence seam for machine image records.
//!
//! The store owns atomicity: every record-mutating operation validates and
//! applies under a single writer per image, so two concurrent
//! inspection-completion events cannot race past the forward-only status
//! check. Challenge updates for the two independent flags may interleave
//! freely.

use async_trait::async_trait;

use crate::errors::Result;
use crate::image::{
    AnyImage, ChallengeField, ImageFilters, ImageKey, ImageState, ImageStatus, InspectionResults,
    MachineImage, Pending,
};

pub mod in_memory;

pub use in_memory::InMemoryImageStore;

/// Storage trait for image lifecycle records.
///
/// Typed transitions persist through [`ImageStore::persist`]; the
/// API-facing dynamic operations (`advance_status`, `set_detection_result`,
/// `set_challenge`, `reinspect`) are atomic read-validate-replace steps.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Register a first-seen image in `pending`.
    ///
    /// # Errors
    /// - `AlreadyExists` if an image with the same key is registered
    async fn observe(&self, image: MachineImage<Pending>) -> Result<()>;

    /// Fetch the current record for a key.
    ///
    /// # Errors
    /// - `NotFound` if the image was never observed
    async fn get(&self, key: &ImageKey) -> Result<AnyImage>;

    /// Persist a typed image whose transition was already checked by the
    /// type system.
    ///
    /// # Errors
    /// - `NotFound` if the image was never observed
    /// - `InvalidTransition` if the stored record is already terminal with a
    ///   different status (stale writer protection)
    async fn persist<T>(&self, image: &MachineImage<T>) -> Result<()>
    where
        T: ImageState + Clone + 'static,
        AnyImage: From<MachineImage<T>>;

    /// Atomically advance the image's status along the forward-only order.
    ///
    /// # Errors
    /// - `NotFound` if the image was never observed
    /// - `InvalidTransition` per [`AnyImage::advance`]
    async fn advance_status(&self, key: &ImageKey, new_status: ImageStatus) -> Result<AnyImage>;

    /// Record detection results for an image currently being inspected.
    ///
    /// # Errors
    /// - `NotFound` if the image was never observed
    /// - `InvalidState` if the image is not `inspecting`
    async fn set_detection_result(
        &self,
        key: &ImageKey,
        results: InspectionResults,
    ) -> Result<AnyImage>;

    /// Set a challenge flag. Legal in every lifecycle state, terminals
    /// included; touches nothing but the named flag and `updated_at`.
    async fn set_challenge(
        &self,
        key: &ImageKey,
        field: ChallengeField,
        value: bool,
    ) -> Result<AnyImage>;

    /// Administrative reset to `pending` for reinspection, preserving
    /// challenge flags.
    async fn reinspect(&self, key: &ImageKey) -> Result<AnyImage>;

    /// List images matching the filters, ordered by key for stable pages.
    ///
    /// Returns the requested page and the total match count before
    /// pagination.
    async fn list(
        &self,
        filters: &ImageFilters,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<AnyImage>, usize)>;
}

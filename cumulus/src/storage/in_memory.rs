//! In-memory image store.
//!
//! Keeps every record in a concurrent map. Suitable for tests and
//! single-process deployments; records are lost on restart. All mutating
//! operations validate and apply while holding the write lock, which gives
//! the at-most-one-writer-per-image semantics the lifecycle requires.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::errors::{Error, Result};
use crate::image::{
    AnyImage, ChallengeField, ImageFilters, ImageKey, ImageState, ImageStatus, InspectionResults,
    MachineImage, Pending,
};

use super::ImageStore;

/// In-memory implementation of the [`ImageStore`] trait.
#[derive(Clone, Default)]
pub struct InMemoryImageStore {
    images: Arc<RwLock<HashMap<ImageKey, AnyImage>>>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn observe(&self, image: MachineImage<Pending>) -> Result<()> {
        let key = image.data.key.clone();
        let mut images = self.images.write();
        if images.contains_key(&key) {
            return Err(Error::AlreadyExists(key));
        }
        images.insert(key.clone(), image.into());
        tracing::debug!(image = %key, "image observed");
        Ok(())
    }

    async fn get(&self, key: &ImageKey) -> Result<AnyImage> {
        self.images
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.clone()))
    }

    async fn persist<T>(&self, image: &MachineImage<T>) -> Result<()>
    where
        T: ImageState + Clone + 'static,
        AnyImage: From<MachineImage<T>>,
    {
        let incoming: AnyImage = image.clone().into();
        let key = incoming.key().clone();
        let mut images = self.images.write();
        let existing = images
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(key.clone()))?;

        // A stale writer must not overwrite a terminal record.
        if existing.is_terminal() && existing.status() != incoming.status() {
            return Err(Error::InvalidTransition {
                key,
                from: existing.status(),
                to: incoming.status(),
            });
        }

        *existing = incoming;
        Ok(())
    }

    async fn advance_status(&self, key: &ImageKey, new_status: ImageStatus) -> Result<AnyImage> {
        let mut images = self.images.write();
        let existing = images
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        let advanced = existing.clone().advance(new_status)?;
        *existing = advanced.clone();
        Ok(advanced)
    }

    async fn set_detection_result(
        &self,
        key: &ImageKey,
        results: InspectionResults,
    ) -> Result<AnyImage> {
        let mut images = self.images.write();
        let existing = images
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        match existing {
            AnyImage::Inspecting(image) => {
                image.state.results = Some(results);
                image.data.updated_at = Utc::now();
                tracing::debug!(image = %key, "detection results recorded");
                Ok(existing.clone())
            }
            other => Err(Error::InvalidState {
                key: key.clone(),
                status: other.status(),
                operation: "record detection results",
            }),
        }
    }

    async fn set_challenge(
        &self,
        key: &ImageKey,
        field: ChallengeField,
        value: bool,
    ) -> Result<AnyImage> {
        let mut images = self.images.write();
        let existing = images
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        let data = existing.data_mut();
        match field {
            ChallengeField::Rhel => data.rhel_challenged = value,
            ChallengeField::Openshift => data.openshift_challenged = value,
        }
        data.updated_at = Utc::now();
        tracing::info!(image = %key, %field, value, "challenge flag set");
        Ok(existing.clone())
    }

    async fn reinspect(&self, key: &ImageKey) -> Result<AnyImage> {
        let mut images = self.images.write();
        let existing = images
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        let reset = existing.clone().reinspect();
        *existing = reset.clone();
        Ok(reset)
    }

    async fn list(
        &self,
        filters: &ImageFilters,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<AnyImage>, usize)> {
        let images = self.images.read();
        let mut matching: Vec<AnyImage> = images
            .values()
            .filter(|image| filters.matches(image))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.key().cmp(b.key()));

        let total = matching.len();
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}

//! Lifecycle transitions for machine images.
//!
//! Two paths exist. The inspection pipeline uses the typed transitions on
//! `MachineImage<S>` (compile-time checked, persisted through the store as
//! they happen). External callers that only hold a target status string go
//! through [`AnyImage::advance`], which enforces the same forward-only rule
//! at runtime: exactly the successor on the happy path, or any non-terminal
//! state into a failure terminal.

use chrono::Utc;

use crate::errors::{Error, Result};
use crate::storage::ImageStore;

use super::types::{
    AnyImage, ImageData, ImageStatus, Inspected, Inspecting, InspectionFailed, InspectionResults,
    MachineImage, Pending, Preparing, Unavailable,
};

impl MachineImage<Pending> {
    /// The pipeline has picked the image up and is preparing its content.
    pub async fn prepare<S: ImageStore + ?Sized>(
        mut self,
        store: &S,
    ) -> Result<MachineImage<Preparing>> {
        let now = Utc::now();
        self.data.updated_at = now;
        let image = MachineImage {
            state: Preparing { started_at: now },
            data: self.data,
        };
        store.persist(&image).await?;
        tracing::info!(image = %image.data.key, "image preparing for inspection");
        Ok(image)
    }

    pub async fn fail<S: ImageStore + ?Sized>(
        self,
        detail: impl Into<String>,
        store: &S,
    ) -> Result<MachineImage<InspectionFailed>> {
        fail(self.data, Some(detail.into()), store).await
    }

    pub async fn mark_unavailable<S: ImageStore + ?Sized>(
        self,
        store: &S,
    ) -> Result<MachineImage<Unavailable>> {
        mark_unavailable(self.data, store).await
    }
}

impl MachineImage<Preparing> {
    /// Preparation finished; binary inspection of the image content begins.
    pub async fn inspect<S: ImageStore + ?Sized>(
        mut self,
        store: &S,
    ) -> Result<MachineImage<Inspecting>> {
        let now = Utc::now();
        self.data.updated_at = now;
        let image = MachineImage {
            state: Inspecting {
                started_at: now,
                results: None,
            },
            data: self.data,
        };
        store.persist(&image).await?;
        tracing::info!(image = %image.data.key, "image inspection started");
        Ok(image)
    }

    pub async fn fail<S: ImageStore + ?Sized>(
        self,
        detail: impl Into<String>,
        store: &S,
    ) -> Result<MachineImage<InspectionFailed>> {
        fail(self.data, Some(detail.into()), store).await
    }

    pub async fn mark_unavailable<S: ImageStore + ?Sized>(
        self,
        store: &S,
    ) -> Result<MachineImage<Unavailable>> {
        mark_unavailable(self.data, store).await
    }
}

impl MachineImage<Inspecting> {
    /// Record detection results while inspection is still running. May be
    /// called more than once; the last payload wins and is carried into
    /// `inspected` on completion.
    pub async fn record_results<S: ImageStore + ?Sized>(
        mut self,
        results: InspectionResults,
        store: &S,
    ) -> Result<MachineImage<Inspecting>> {
        self.data.updated_at = Utc::now();
        self.state.results = Some(results);
        store.persist(&self).await?;
        tracing::debug!(image = %self.data.key, "detection results recorded");
        Ok(self)
    }

    /// Inspection finished; the image reaches its success terminal.
    pub async fn complete<S: ImageStore + ?Sized>(
        mut self,
        store: &S,
    ) -> Result<MachineImage<Inspected>> {
        let now = Utc::now();
        self.data.updated_at = now;
        let image = MachineImage {
            state: Inspected {
                results: self.state.results,
                inspected_at: now,
            },
            data: self.data,
        };
        store.persist(&image).await?;
        tracing::info!(
            image = %image.data.key,
            rhel_detected = image.state.results.as_ref().map(|r| r.rhel_detected()).unwrap_or(false),
            "image inspected"
        );
        Ok(image)
    }

    pub async fn fail<S: ImageStore + ?Sized>(
        self,
        detail: impl Into<String>,
        store: &S,
    ) -> Result<MachineImage<InspectionFailed>> {
        fail(self.data, Some(detail.into()), store).await
    }

    pub async fn mark_unavailable<S: ImageStore + ?Sized>(
        self,
        store: &S,
    ) -> Result<MachineImage<Unavailable>> {
        mark_unavailable(self.data, store).await
    }
}

async fn fail<S: ImageStore + ?Sized>(
    mut data: ImageData,
    detail: Option<String>,
    store: &S,
) -> Result<MachineImage<InspectionFailed>> {
    let now = Utc::now();
    data.updated_at = now;
    let image = MachineImage {
        state: InspectionFailed {
            detail: detail.clone(),
            failed_at: now,
        },
        data,
    };
    store.persist(&image).await?;
    tracing::warn!(
        image = %image.data.key,
        detail = detail.as_deref().unwrap_or("unspecified"),
        "image inspection failed"
    );
    Ok(image)
}

async fn mark_unavailable<S: ImageStore + ?Sized>(
    mut data: ImageData,
    store: &S,
) -> Result<MachineImage<Unavailable>> {
    let now = Utc::now();
    data.updated_at = now;
    let image = MachineImage {
        state: Unavailable { since: now },
        data,
    };
    store.persist(&image).await?;
    tracing::warn!(image = %image.data.key, "image unavailable for inspection");
    Ok(image)
}

impl AnyImage {
    /// Dynamic forward-only transition, for callers that hold a target
    /// status rather than a typed image.
    ///
    /// Accepts exactly the successor in pending -> preparing -> inspecting
    /// -> inspected, or a move from any non-terminal state into `error` or
    /// `unavailable`. Re-asserting a terminal's current status is a no-op;
    /// everything else fails with `InvalidTransition`. Detection results
    /// held by an `inspecting` image are carried into `inspected`.
    pub fn advance(self, new_status: ImageStatus) -> Result<AnyImage> {
        let current = self.status();
        if !current.can_advance_to(new_status) {
            return Err(Error::InvalidTransition {
                key: self.key().clone(),
                from: current,
                to: new_status,
            });
        }
        if current == new_status {
            // Terminal re-assertion; nothing to do.
            return Ok(self);
        }

        let now = Utc::now();
        let results = match &self {
            AnyImage::Inspecting(i) => i.state.results.clone(),
            _ => None,
        };
        let mut data = self.data().clone();
        data.updated_at = now;

        let advanced = match new_status {
            ImageStatus::Pending => unreachable!("pending is never a transition target"),
            ImageStatus::Preparing => AnyImage::Preparing(MachineImage {
                state: Preparing { started_at: now },
                data,
            }),
            ImageStatus::Inspecting => AnyImage::Inspecting(MachineImage {
                state: Inspecting {
                    started_at: now,
                    results: None,
                },
                data,
            }),
            ImageStatus::Inspected => AnyImage::Inspected(MachineImage {
                state: Inspected {
                    results,
                    inspected_at: now,
                },
                data,
            }),
            ImageStatus::Error => AnyImage::Error(MachineImage {
                state: InspectionFailed {
                    detail: None,
                    failed_at: now,
                },
                data,
            }),
            ImageStatus::Unavailable => AnyImage::Unavailable(MachineImage {
                state: Unavailable { since: now },
                data,
            }),
        };
        tracing::info!(image = %advanced.key(), from = %current, to = %new_status, "image status advanced");
        Ok(advanced)
    }

    /// Administrative reset to `pending` so the image gets inspected again.
    ///
    /// The one sanctioned exception to forward-only progression, kept
    /// separate from [`AnyImage::advance`] so that invariant stays
    /// checkable. Detection results are discarded; challenge flags and
    /// identity survive.
    pub fn reinspect(self) -> AnyImage {
        let mut data = self.data().clone();
        data.updated_at = Utc::now();
        tracing::info!(image = %data.key, from = %self.status(), "image queued for reinspection");
        AnyImage::Pending(MachineImage {
            state: Pending {},
            data,
        })
    }
}

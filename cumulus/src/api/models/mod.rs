//! Request/response models consumed by the HTTP layer.

pub mod concurrent;
pub mod images;
pub mod pagination;

pub use concurrent::{ConcurrentUsageParams, DailyConcurrentUsageResponse, UsageCountResponse};
pub use images::{ImageChallengePatch, ImageListParams, MachineImageResponse};
pub use pagination::{Links, Meta, PaginatedResponse, Pagination};

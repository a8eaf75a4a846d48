//! Machine image inspection lifecycle.
//!
//! An image is created `pending` when first observed and is advanced by the
//! inspection pipeline through `preparing` and `inspecting` to `inspected`,
//! or into the `error`/`unavailable` terminals. Challenge flags are the only
//! thing that can change on a terminal image.

mod transitions;
mod types;

pub use types::{
    AnyImage, ChallengeField, ImageData, ImageFilters, ImageKey, ImageState, ImageStatus,
    Inspected, Inspecting, InspectionFailed, InspectionResults, MachineImage, Pending, Preparing,
    Unavailable,
};

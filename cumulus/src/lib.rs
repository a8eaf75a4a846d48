//! # cumulus: cloud compute metering core
//!
//! `cumulus` tracks customer machine images through an automated inspection
//! lifecycle and reports peak concurrent instance usage per calendar day.
//! It is the business-logic core behind a cloud usage metering service: the
//! HTTP layer, authentication, and the cloud-polling collaborators that
//! feed it live outside this crate.
//!
//! ## Overview
//!
//! Two cooperating components make up the core.
//!
//! The **image lifecycle** ([`image`]) owns the state of a machine image
//! record as it moves from first-seen to fully inspected: pending ->
//! preparing -> inspecting -> inspected, with `error` and `unavailable` as
//! absorbing failure terminals. Transitions are forward-only and checked
//! twice over: the inspection pipeline drives typed transitions that the
//! compiler verifies (the typestate pattern on [`image::MachineImage`]),
//! while status changes arriving as plain values go through
//! [`image::AnyImage::advance`] and the same rules at runtime. Automated
//! detection results (RHEL facets, OpenShift, architecture, syspurpose) are
//! recorded only while inspecting; humans may challenge the RHEL and
//! OpenShift findings at any time, and the effective flags are derived on
//! read by XOR-ing detection with the challenge so the two writers never
//! contend on a stored value.
//!
//! The **usage aggregator** ([`usage`]) turns instance power events into
//! normalized run intervals ([`usage::normalize_runs`]) and computes, for
//! every day in a requested range, the peak number of simultaneously
//! running instances per {architecture, SLA, role, usage, service type}
//! combination ([`usage::compute_daily_usage`]). It is a pure function over
//! a snapshot of runs: days are swept independently with a sorted
//! event-endpoint scan, long ranges honor a deadline, and an expired
//! deadline fails with a retryable timeout that carries the completed days
//! so callers can resume.
//!
//! ## Architecture
//!
//! The **storage layer** ([`storage`]) puts persistence behind the
//! [`storage::ImageStore`] trait; the bundled in-memory implementation
//! applies every record mutation under a single writer per image, which is
//! what keeps concurrent inspection-completion events from racing past the
//! forward-only check. The **API model layer** ([`api`]) defines the typed
//! query parameters and response bodies the HTTP layer exchanges with the
//! core, including the `{meta, links, data}` pagination envelope.
//! [`config`] loads tunables (aggregation deadline, report span cap) from
//! YAML plus `CUMULUS_`-prefixed environment variables, and [`telemetry`]
//! initializes tracing output.

pub mod api;
pub mod config;
pub mod errors;
pub mod image;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod usage;

pub use errors::{Error, Result};

//! Snapshot model shared by every stage of a detection run.
//!
//! Snapshots come from two sources (the Terraform baseline and the live EC2
//! API) and reports are built from pairs of them. Everything here is
//! request-scoped plain data.

mod report;
mod snapshot;

pub use report::{AttributeDrift, DriftKind, DriftReport};
pub use snapshot::{AttributeValue, InstanceSnapshot};

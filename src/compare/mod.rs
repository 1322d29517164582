//! Attribute comparison between baseline and live snapshots.
//!
//! [`Attribute`] is the compile-time registry of checkable attributes and
//! [`AttributeComparator`] turns a snapshot pair into a [`DriftReport`].
//!
//! [`DriftReport`]: crate::model::DriftReport

mod attributes;
mod comparator;

pub use attributes::Attribute;
pub use comparator::{AttributeComparator, Compare};

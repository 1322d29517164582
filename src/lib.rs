// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # ec2drift
//!
//! Detects configuration drift between a Terraform state baseline and the
//! live state of EC2 instances.
//!
//! ## Overview
//!
//! A detection run:
//!
//! - Loads declared instances from Terraform JSON state or HCL configuration
//! - Fetches live state through `DescribeInstances`, with retry, backoff and
//!   client-side rate limiting
//! - Compares the requested attributes with type-aware equality
//! - Reports per-attribute drift, keeping partial results when some instances
//!   cannot be checked
//!
//! ## Architecture
//!
//! 1. **Baseline**: Parsed from `.tfstate` or `.tf` files
//! 2. **Live State**: Queried from EC2 per instance or in chunks
//! 3. **Detector**: Pairs the two and collects drift reports
//!
//! ## Modules
//!
//! - [`model`]: Snapshot, drift and report types
//! - [`compare`]: Attribute registry and comparator
//! - [`aws`]: EC2 client, classification, rate limiting and fetcher
//! - [`baseline`]: Terraform state parser
//! - [`detector`]: Drift orchestration
//! - [`cancel`]: Cancellation signal
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! aws:
//!   region: eu-west-1
//!
//! fetch:
//!   rate_limit_per_second: 10
//!
//! detection:
//!   batch_threshold: 10
//!   attributes: [InstanceType, SecurityGroups, Tags]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod aws;
pub mod baseline;
pub mod cancel;
pub mod cli;
pub mod compare;
pub mod config;
pub mod detector;
pub mod error;
pub mod model;

// ============================================================================
// Re-exports
// ============================================================================

pub use aws::{Ec2DescribeClient, StateFetcher, StateProvider, TokenBucket};
pub use baseline::{Baseline, BaselineParser, TerraformStateParser};
pub use cancel::CancellationToken;
pub use cli::{Cli, Commands, OutputFormatter};
pub use compare::{Attribute, AttributeComparator, Compare};
pub use config::{ConfigParser, ConfigValidator, DetectorConfig};
pub use detector::{DetectionOutcome, DriftDetector, FetchMode, InstanceFailure};
pub use error::{DriftError, Result};
pub use model::{AttributeDrift, DriftKind, DriftReport, InstanceSnapshot};

//! Baseline loading module.
//!
//! The baseline is the declared state instances are expected to match. It is
//! read from Terraform JSON state or from HCL configuration.

mod hcl_config;
mod parser;

pub use hcl_config::HCL_ID_PREFIX;
pub use parser::{Baseline, BaselineParser, TerraformStateParser};

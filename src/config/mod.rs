//! Configuration module for the drift detector.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `ec2drift.yaml`
//! - Environment and `.env` overrides
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use self::parser::{
    CONFIG_ENV_VAR, ConfigParser, DEFAULT_CONFIG_FILES, find_config_file, user_config_file,
};
pub use self::spec::{
    AwsConfig, DEFAULT_ATTRIBUTE, DEFAULT_REGION, DetectionConfig, DetectorConfig, FetchConfig,
};
pub use self::validator::{ConfigValidator, ValidationError, ValidationResult};

//! Configuration parser for loading and merging configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, DriftError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::spec::DetectorConfig;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "EC2DRIFT_CONFIG";

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["ec2drift.yaml", "ec2drift.yml"];

/// Configuration parser for loading detector configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Resolves and loads the effective configuration.
    ///
    /// An explicit path must exist. Without one, the file is searched for
    /// and defaults are used when none is found. Environment overrides are
    /// applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or an override
    /// holds an invalid value.
    pub fn load(&self, explicit: Option<&Path>) -> Result<DetectorConfig> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::current_dir()
                .ok()
                .and_then(|cwd| find_config_file(cwd).ok())
                .or_else(user_config_file),
        };

        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => {
                debug!("No configuration file found, using defaults");
                DetectorConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DetectorConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DetectorConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(DetectorConfig::default());
        }

        let config: DetectorConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            }
        })?;

        debug!("Successfully parsed configuration for region: {}", config.aws.region);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    ///
    /// Variables use the format `EC2DRIFT_<SECTION>_<KEY>`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override cannot be parsed.
    pub fn apply_env_overrides(config: &mut DetectorConfig) -> Result<()> {
        Self::apply_overrides_with(config, |name| std::env::var(name).ok())
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override cannot be parsed.
    pub fn apply_overrides_with(
        config: &mut DetectorConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(region) = lookup("EC2DRIFT_AWS_REGION") {
            debug!("Overriding aws.region from environment");
            config.aws.region = region;
        }

        if let Some(profile) = lookup("EC2DRIFT_AWS_PROFILE") {
            debug!("Overriding aws.profile from environment");
            config.aws.profile = Some(profile);
        }

        if let Some(rate) = lookup("EC2DRIFT_FETCH_RATE_LIMIT") {
            debug!("Overriding fetch.rate_limit_per_second from environment");
            config.fetch.rate_limit_per_second = parse_env("EC2DRIFT_FETCH_RATE_LIMIT", &rate)?;
        }

        if let Some(threshold) = lookup("EC2DRIFT_DETECTION_BATCH_THRESHOLD") {
            debug!("Overriding detection.batch_threshold from environment");
            config.detection.batch_threshold =
                parse_env("EC2DRIFT_DETECTION_BATCH_THRESHOLD", &threshold)?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        DriftError::Config(ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: value.to_string(),
        })
    })
}

/// Per-user configuration file, if it exists.
#[must_use]
pub fn user_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("ec2drift").join("config.yaml");
    path.exists().then_some(path)
}

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_partial_config() {
        let yaml = r"
aws:
  region: eu-west-1
detection:
  attributes: [InstanceType, SecurityGroups, Tags]
";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.aws.profile, None);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.detection.batch_threshold, 10);
        assert_eq!(config.detection.attributes.len(), 3);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
aws:
  region: ap-southeast-2
  profile: audit
fetch:
  max_retries: 3
  initial_backoff_ms: 500
  max_backoff_ms: 8000
  rate_limit_per_second: 5
  batch_size: 200
detection:
  batch_threshold: 25
  max_concurrency: 8
  attributes: [InstanceType]
";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(config.aws.profile.as_deref(), Some("audit"));
        assert_eq!(config.fetch.batch_size, 200);
        assert_eq!(config.detection.max_concurrency, Some(8));
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = ConfigParser::new().parse_yaml("  \n", None).unwrap();
        assert_eq!(config, DetectorConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ConfigParser::new()
            .parse_yaml("aws: [unclosed", Some(Path::new("ec2drift.yaml")))
            .unwrap_err();
        assert!(matches!(
            err,
            DriftError::Config(ConfigError::ParseError { location: Some(_), .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EC2DRIFT_AWS_REGION", "us-west-2"),
            ("EC2DRIFT_AWS_PROFILE", "prod"),
            ("EC2DRIFT_FETCH_RATE_LIMIT", "20"),
            ("EC2DRIFT_DETECTION_BATCH_THRESHOLD", " 50 "),
        ]);

        let mut config = DetectorConfig::default();
        ConfigParser::apply_overrides_with(&mut config, |k| vars.get(k).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.aws.region, "us-west-2");
        assert_eq!(config.aws.profile.as_deref(), Some("prod"));
        assert_eq!(config.fetch.rate_limit_per_second, 20);
        assert_eq!(config.detection.batch_threshold, 50);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = DetectorConfig::default();
        let err = ConfigParser::apply_overrides_with(&mut config, |k| {
            (k == "EC2DRIFT_FETCH_RATE_LIMIT").then(|| String::from("fast"))
        })
        .unwrap_err();

        assert!(matches!(
            err,
            DriftError::Config(ConfigError::InvalidEnvVar { .. })
        ));
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ec2drift.yaml"), "aws:\n  region: eu-north-1\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("ec2drift.yaml"));

        let config = ConfigParser::new().load_file(&found).unwrap();
        assert_eq!(config.aws.region, "eu-north-1");
    }

    #[test]
    fn test_explicit_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ConfigParser::new()
            .load_file(dir.path().join("missing.yaml"))
            .unwrap_err();
        assert!(matches!(
            err,
            DriftError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_dotenv_without_file() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigParser::new()
            .with_base_path(dir.path())
            .load_dotenv()
            .is_ok());
    }
}

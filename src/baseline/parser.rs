//! Terraform baseline parser.
//!
//! Reads declared instance state from Terraform JSON state documents and HCL
//! configuration. A single file is parsed directly, as HCL when it ends in
//! `.tf` and as JSON state otherwise. A directory is walked recursively for
//! `*.tfstate` and `*.tf` files; symlinks are not followed.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::BaselineError;
use crate::model::InstanceSnapshot;

use super::hcl_config;

/// Resource type carrying EC2 instances.
pub(super) const INSTANCE_RESOURCE_TYPE: &str = "aws_instance";

/// State file extension picked up when walking directories.
const STATE_EXTENSION: &str = "tfstate";

/// HCL configuration extension.
const HCL_EXTENSION: &str = "tf";

/// Kind of baseline document, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    /// Terraform JSON state.
    State,
    /// Terraform HCL configuration.
    Config,
}

impl SourceKind {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        if ext.eq_ignore_ascii_case(STATE_EXTENSION) {
            Some(Self::State)
        } else if ext.eq_ignore_ascii_case(HCL_EXTENSION) {
            Some(Self::Config)
        } else {
            None
        }
    }
}

/// Declared instances loaded from a baseline source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    /// Snapshots keyed by instance id.
    pub instances: BTreeMap<String, InstanceSnapshot>,
    /// Path the baseline was loaded from.
    pub source: PathBuf,
    /// SHA-256 over the parsed source bytes, hex encoded.
    pub digest: String,
}

impl Baseline {
    /// Builds a baseline from snapshots, keyed by their instance ids.
    #[must_use]
    pub fn from_snapshots(
        snapshots: impl IntoIterator<Item = InstanceSnapshot>,
        source: impl Into<PathBuf>,
    ) -> Self {
        let instances = snapshots
            .into_iter()
            .map(|s| (s.instance_id.clone(), s))
            .collect();

        Self {
            instances,
            source: source.into(),
            digest: String::new(),
        }
    }

    /// Looks up a declared instance.
    #[must_use]
    pub fn get(&self, instance_id: &str) -> Option<&InstanceSnapshot> {
        self.instances.get(instance_id)
    }

    /// Declared instance ids in ascending order.
    #[must_use]
    pub fn instance_ids(&self) -> Vec<String> {
        self.instances.keys().cloned().collect()
    }

    /// Number of declared instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if no instance is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Loads a [`Baseline`] from a path.
pub trait BaselineParser: Send + Sync {
    /// Parses the baseline at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be read or is not a supported
    /// baseline document.
    fn parse(&self, path: &Path) -> Result<Baseline, BaselineError>;
}

/// Parser for Terraform JSON state and HCL configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerraformStateParser;

impl TerraformStateParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses one document of the given kind, returning its snapshots.
    fn parse_document(
        kind: SourceKind,
        path: &Path,
        bytes: &[u8],
    ) -> Result<Vec<InstanceSnapshot>, BaselineError> {
        match kind {
            SourceKind::State => Self::parse_state(path, bytes),
            SourceKind::Config => hcl_config::parse_config(path, bytes),
        }
    }

    /// Parses one JSON state document.
    fn parse_state(path: &Path, bytes: &[u8]) -> Result<Vec<InstanceSnapshot>, BaselineError> {
        let state: StateFile =
            serde_json::from_slice(bytes).map_err(|e| BaselineError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        debug!(
            "Terraform state {} has version {} and {} resource(s)",
            path.display(),
            state.version,
            state.resources.len()
        );

        let mut snapshots = Vec::new();
        for resource in state
            .resources
            .into_iter()
            .filter(|r| r.resource_type == INSTANCE_RESOURCE_TYPE)
        {
            for instance in resource.instances {
                let snapshot = InstanceSnapshot::from(instance.attributes);
                if snapshot.instance_id.is_empty() {
                    warn!(
                        "Skipping {}.{} in {}: no instance id",
                        resource.resource_type,
                        resource.name,
                        path.display()
                    );
                    continue;
                }
                debug!(
                    instance_id = %snapshot.instance_id,
                    "Parsed {}.{}",
                    resource.resource_type,
                    resource.name
                );
                snapshots.push(snapshot);
            }
        }

        Ok(snapshots)
    }

    fn parse_file(path: &Path) -> Result<Baseline, BaselineError> {
        let kind = SourceKind::of(path).unwrap_or(SourceKind::State);
        let bytes = read(path)?;
        let snapshots = Self::parse_document(kind, path, &bytes)?;

        let mut baseline = Baseline::from_snapshots(snapshots, path);
        baseline.digest = hex::encode(Sha256::digest(&bytes));

        info!(
            "Loaded {} instance(s) from {}",
            baseline.len(),
            path.display()
        );
        Ok(baseline)
    }

    fn parse_directory(dir: &Path) -> Result<Baseline, BaselineError> {
        let files = collect_baseline_files(dir);

        info!(
            "Found {} Terraform file(s) under {}",
            files.len(),
            dir.display()
        );

        let mut hasher = Sha256::new();
        let mut baseline = Baseline {
            source: dir.to_path_buf(),
            ..Baseline::default()
        };

        for (kind, file) in &files {
            let parsed = read(file).and_then(|bytes| {
                Self::parse_document(*kind, file, &bytes).map(|snapshots| (bytes, snapshots))
            });

            match parsed {
                Ok((bytes, snapshots)) => {
                    hasher.update(&bytes);
                    for snapshot in snapshots {
                        if baseline.instances.contains_key(&snapshot.instance_id) {
                            warn!(
                                instance_id = %snapshot.instance_id,
                                "Instance declared more than once, {} wins",
                                file.display()
                            );
                        }
                        baseline
                            .instances
                            .insert(snapshot.instance_id.clone(), snapshot);
                    }
                }
                Err(e) => warn!("Skipping {}: {e}", file.display()),
            }
        }

        baseline.digest = hex::encode(hasher.finalize());
        info!(
            "Loaded {} instance(s) from {}",
            baseline.len(),
            dir.display()
        );
        Ok(baseline)
    }
}

impl BaselineParser for TerraformStateParser {
    fn parse(&self, path: &Path) -> Result<Baseline, BaselineError> {
        let metadata = fs::metadata(path).map_err(|e| unreadable(path, &e))?;

        if metadata.is_dir() {
            Self::parse_directory(path)
        } else {
            Self::parse_file(path)
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, BaselineError> {
    fs::read(path).map_err(|e| unreadable(path, &e))
}

fn unreadable(path: &Path, err: &std::io::Error) -> BaselineError {
    BaselineError::Unreadable {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Baseline files under `dir` in walk order. Unreadable entries are skipped.
fn collect_baseline_files(dir: &Path) -> Vec<(SourceKind, PathBuf)> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping entry under {}: {e}", dir.display());
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = SourceKind::of(entry.path()) {
            files.push((kind, entry.into_path()));
        }
    }

    files
}

/// Terraform JSON state document.
#[derive(Debug, Deserialize)]
struct StateFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    instances: Vec<ResourceInstance>,
}

#[derive(Debug, Deserialize)]
struct ResourceInstance {
    #[serde(default)]
    attributes: InstanceAttributes,
}

/// `aws_instance` attributes. Terraform writes `null` for unset values.
#[derive(Debug, Default, Deserialize)]
struct InstanceAttributes {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    instance_type: Option<String>,
    #[serde(default)]
    availability_zone: Option<String>,
    #[serde(default)]
    vpc_security_group_ids: Option<Vec<String>>,
    #[serde(default)]
    security_groups: Option<Vec<String>>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    subnet_id: Option<String>,
    #[serde(default)]
    ami: Option<String>,
    #[serde(default)]
    key_name: Option<String>,
    #[serde(default)]
    monitoring: Option<bool>,
}

impl From<InstanceAttributes> for InstanceSnapshot {
    fn from(attrs: InstanceAttributes) -> Self {
        let security_groups = attrs
            .vpc_security_group_ids
            .filter(|ids| !ids.is_empty())
            .or(attrs.security_groups)
            .unwrap_or_default();

        Self {
            instance_id: attrs.id.unwrap_or_default(),
            instance_type: attrs.instance_type.unwrap_or_default(),
            availability_zone: attrs.availability_zone.unwrap_or_default(),
            security_groups,
            tags: attrs.tags.unwrap_or_default(),
            subnet_id: attrs.subnet_id.unwrap_or_default(),
            image_id: attrs.ami.unwrap_or_default(),
            key_name: attrs.key_name.unwrap_or_default(),
            monitoring: attrs.monitoring.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STATE: &str = r#"{
        "version": 4,
        "terraform_version": "1.6.0",
        "resources": [
            {
                "mode": "managed",
                "type": "aws_instance",
                "name": "web",
                "instances": [
                    {
                        "attributes": {
                            "id": "i-0abc",
                            "instance_type": "t3.micro",
                            "availability_zone": "us-east-1a",
                            "vpc_security_group_ids": ["sg-1", "sg-2"],
                            "tags": {"Name": "web", "Env": "prod"},
                            "subnet_id": "subnet-1",
                            "ami": "ami-123",
                            "key_name": null,
                            "monitoring": true
                        }
                    }
                ]
            },
            {
                "mode": "managed",
                "type": "aws_s3_bucket",
                "name": "logs",
                "instances": [{"attributes": {"id": "my-bucket"}}]
            }
        ]
    }"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_state_file() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "terraform.tfstate", STATE);

        let baseline = TerraformStateParser::new().parse(&path).unwrap();

        assert_eq!(baseline.len(), 1);
        assert_eq!(baseline.source, path);
        assert_eq!(baseline.digest.len(), 64);

        let web = baseline.get("i-0abc").unwrap();
        assert_eq!(web.instance_type, "t3.micro");
        assert_eq!(web.security_groups, vec!["sg-1", "sg-2"]);
        assert_eq!(web.tag("Env"), Some("prod"));
        assert_eq!(web.image_id, "ami-123");
        assert_eq!(web.key_name, "");
        assert!(web.monitoring);
    }

    #[test]
    fn test_digest_is_stable() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "a.tfstate", STATE);
        let b = write(dir.path(), "b.json", STATE);

        let parser = TerraformStateParser::new();
        assert_eq!(
            parser.parse(&a).unwrap().digest,
            parser.parse(&b).unwrap().digest
        );
    }

    #[test]
    fn test_security_groups_fallback() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "legacy.tfstate",
            r#"{"version": 4, "resources": [{"type": "aws_instance", "name": "old",
                "instances": [{"attributes": {"id": "i-old", "vpc_security_group_ids": [],
                "security_groups": ["default"], "tags": null}}]}]}"#,
        );

        let baseline = TerraformStateParser::new().parse(&path).unwrap();
        let old = baseline.get("i-old").unwrap();

        assert_eq!(old.security_groups, vec!["default"]);
        assert!(old.tags.is_empty());
        assert!(!old.monitoring);
    }

    #[test]
    fn test_parse_directory_skips_bad_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "one.tfstate", STATE);
        write(dir.path(), "broken.tfstate", "{ not json");
        write(dir.path(), "notes.txt", "ignored");

        let nested = dir.path().join("modules");
        fs::create_dir(&nested).unwrap();
        write(
            &nested,
            "two.tfstate",
            r#"{"resources": [{"type": "aws_instance", "name": "db",
                "instances": [{"attributes": {"id": "i-0db", "instance_type": "r5.large"}}]}]}"#,
        );

        let baseline = TerraformStateParser::new().parse(dir.path()).unwrap();

        assert_eq!(baseline.instance_ids(), vec!["i-0abc", "i-0db"]);
        assert_eq!(baseline.source, dir.path());
        assert!(!baseline.digest.is_empty());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "bad.tfstate", "{");

        let err = TerraformStateParser::new().parse(&path).unwrap_err();
        assert!(matches!(err, BaselineError::ParseError { .. }));
    }

    #[test]
    fn test_missing_path_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let err = TerraformStateParser::new()
            .parse(&dir.path().join("nope.tfstate"))
            .unwrap_err();
        assert!(matches!(err, BaselineError::Unreadable { .. }));
    }

    #[test]
    fn test_parse_hcl_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "main.tf",
            r#"
resource "aws_instance" "web" {
  instance_type = "t3.micro"
  ami           = "ami-123"
  tags = {
    Name = "web"
  }
}
"#,
        );

        let baseline = TerraformStateParser::new().parse(&path).unwrap();

        assert_eq!(baseline.instance_ids(), vec!["hcl:web"]);
        assert_eq!(baseline.digest.len(), 64);
        let web = baseline.get("hcl:web").unwrap();
        assert_eq!(web.instance_type, "t3.micro");
        assert_eq!(web.image_id, "ami-123");
        assert_eq!(web.name(), Some("web"));
    }

    #[test]
    fn test_parse_directory_reads_state_and_hcl() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "terraform.tfstate", STATE);
        write(
            dir.path(),
            "main.tf",
            "resource \"aws_instance\" \"api\" {\n  instance_type = \"m5.large\"\n}\n",
        );
        write(dir.path(), "broken.tf", "resource \"aws_instance\" {");

        let baseline = TerraformStateParser::new().parse(dir.path()).unwrap();

        assert_eq!(baseline.instance_ids(), vec!["hcl:api", "i-0abc"]);
        assert_eq!(baseline.get("hcl:api").unwrap().instance_type, "m5.large");
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_directory_ignores_symlink_loops() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.tfstate", STATE);
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let files = collect_baseline_files(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0], (SourceKind::State, dir.path().join("a.tfstate")));

        let looped = TerraformStateParser::new().parse(dir.path()).unwrap();
        let single = TerraformStateParser::new()
            .parse(&dir.path().join("a.tfstate"))
            .unwrap();
        assert_eq!(looped.len(), 1);
        assert_eq!(looped.digest, single.digest);
    }

    #[test]
    fn test_from_snapshots() {
        let baseline = Baseline::from_snapshots(
            vec![InstanceSnapshot::new("i-2"), InstanceSnapshot::new("i-1")],
            "inline",
        );
        assert_eq!(baseline.instance_ids(), vec!["i-1", "i-2"]);
        assert!(!baseline.is_empty());
    }
}

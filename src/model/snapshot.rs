//! Instance snapshots and typed attribute values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A flat record of the attributes subject to drift checking.
///
/// Absent provider or baseline fields are represented by the zero value of
/// their type (empty string, empty list, empty map, `false`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    /// Instance identifier, e.g. `i-1234567890abcdef0`.
    pub instance_id: String,
    /// Instance type, e.g. `t3.medium`.
    pub instance_type: String,
    /// Availability zone, e.g. `us-east-1a`.
    pub availability_zone: String,
    /// Security group ids, in provider order.
    pub security_groups: Vec<String>,
    /// Tags, unique by key.
    pub tags: BTreeMap<String, String>,
    /// Subnet id.
    pub subnet_id: String,
    /// AMI id.
    pub image_id: String,
    /// Key pair name.
    pub key_name: String,
    /// Whether detailed monitoring is enabled.
    pub monitoring: bool,
}

impl InstanceSnapshot {
    /// Creates an empty snapshot for the given instance id.
    #[must_use]
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    /// Returns a tag value by key.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns the `Name` tag, if set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.tag("Name")
    }
}

/// A typed attribute value read off a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Scalar string.
    Text(String),
    /// Scalar boolean.
    Flag(bool),
    /// Security-group style list; order is not significant.
    List(Vec<String>),
    /// Tag style map.
    Map(BTreeMap<String, String>),
}

impl AttributeValue {
    /// Short type name, used in log fields.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::Flag(_) => "bool",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_is_zero_valued() {
        let snapshot = InstanceSnapshot::new("i-1");
        assert_eq!(snapshot.instance_id, "i-1");
        assert!(snapshot.instance_type.is_empty());
        assert!(snapshot.security_groups.is_empty());
        assert!(snapshot.tags.is_empty());
        assert!(!snapshot.monitoring);
        assert_eq!(snapshot.name(), None);
    }

    #[test]
    fn test_value_display() {
        let list = AttributeValue::List(vec![String::from("sg-1"), String::from("sg-2")]);
        assert_eq!(list.to_string(), "[sg-1, sg-2]");

        let mut tags = BTreeMap::new();
        tags.insert(String::from("Name"), String::from("web"));
        tags.insert(String::from("Env"), String::from("prod"));
        assert_eq!(AttributeValue::Map(tags).to_string(), "{Env=prod, Name=web}");

        assert_eq!(AttributeValue::Flag(true).to_string(), "true");
    }

    #[test]
    fn test_value_serializes_untagged() {
        let value = AttributeValue::Text(String::from("t3.micro"));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"t3.micro\"");
    }
}

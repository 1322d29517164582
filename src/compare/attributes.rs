//! Registry of attributes that can be checked for drift.
//!
//! Every supported attribute name maps to a typed getter on
//! [`InstanceSnapshot`]. Lookup is case-insensitive and ignores `_` and `-`,
//! so `InstanceType`, `instance_type` and `instance-type` all resolve.

use serde::Serialize;
use std::fmt;

use crate::model::{AttributeValue, InstanceSnapshot};

/// A drift-checkable snapshot attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Attribute {
    /// Instance id.
    InstanceId,
    /// Instance type.
    InstanceType,
    /// Availability zone.
    AvailabilityZone,
    /// Security group ids.
    SecurityGroups,
    /// Tag map.
    Tags,
    /// Subnet id.
    SubnetId,
    /// AMI id.
    ImageId,
    /// Key pair name.
    KeyName,
    /// Detailed monitoring flag.
    Monitoring,
}

/// All attributes in registry order.
const ALL: [Attribute; 9] = [
    Attribute::InstanceId,
    Attribute::InstanceType,
    Attribute::AvailabilityZone,
    Attribute::SecurityGroups,
    Attribute::Tags,
    Attribute::SubnetId,
    Attribute::ImageId,
    Attribute::KeyName,
    Attribute::Monitoring,
];

impl Attribute {
    /// Returns every registered attribute.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &ALL
    }

    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InstanceId => "InstanceId",
            Self::InstanceType => "InstanceType",
            Self::AvailabilityZone => "AvailabilityZone",
            Self::SecurityGroups => "SecurityGroups",
            Self::Tags => "Tags",
            Self::SubnetId => "SubnetId",
            Self::ImageId => "ImageId",
            Self::KeyName => "KeyName",
            Self::Monitoring => "Monitoring",
        }
    }

    /// Terraform attribute names that also resolve to this attribute.
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::InstanceId => &["id"],
            Self::SecurityGroups => &["vpc_security_group_ids"],
            Self::ImageId => &["ami"],
            _ => &[],
        }
    }

    /// Resolves a caller-supplied name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }

        ALL.iter().copied().find(|attr| {
            normalize(attr.name()) == wanted || attr.aliases().iter().any(|a| normalize(a) == wanted)
        })
    }

    /// Reads this attribute off a snapshot.
    #[must_use]
    pub fn value(self, snapshot: &InstanceSnapshot) -> AttributeValue {
        match self {
            Self::InstanceId => AttributeValue::Text(snapshot.instance_id.clone()),
            Self::InstanceType => AttributeValue::Text(snapshot.instance_type.clone()),
            Self::AvailabilityZone => AttributeValue::Text(snapshot.availability_zone.clone()),
            Self::SecurityGroups => AttributeValue::List(snapshot.security_groups.clone()),
            Self::Tags => AttributeValue::Map(snapshot.tags.clone()),
            Self::SubnetId => AttributeValue::Text(snapshot.subnet_id.clone()),
            Self::ImageId => AttributeValue::Text(snapshot.image_id.clone()),
            Self::KeyName => AttributeValue::Text(snapshot.key_name.clone()),
            Self::Monitoring => AttributeValue::Flag(snapshot.monitoring),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_variants() {
        assert_eq!(Attribute::from_name("InstanceType"), Some(Attribute::InstanceType));
        assert_eq!(Attribute::from_name("instance_type"), Some(Attribute::InstanceType));
        assert_eq!(Attribute::from_name("instance-type"), Some(Attribute::InstanceType));
        assert_eq!(Attribute::from_name("SubnetID"), Some(Attribute::SubnetId));
        assert_eq!(Attribute::from_name("ami"), Some(Attribute::ImageId));
        assert_eq!(
            Attribute::from_name("vpc_security_group_ids"),
            Some(Attribute::SecurityGroups)
        );
    }

    #[test]
    fn test_from_name_unknown() {
        assert_eq!(Attribute::from_name("InstanceTyp"), None);
        assert_eq!(Attribute::from_name(""), None);
        assert_eq!(Attribute::from_name("__"), None);
    }

    #[test]
    fn test_every_attribute_round_trips_by_name() {
        for attr in Attribute::all() {
            assert_eq!(Attribute::from_name(attr.name()), Some(*attr));
        }
    }

    #[test]
    fn test_value_types() {
        let mut snapshot = InstanceSnapshot::new("i-1");
        snapshot.monitoring = true;
        snapshot.security_groups = vec![String::from("sg-1")];

        assert_eq!(Attribute::Monitoring.value(&snapshot), AttributeValue::Flag(true));
        assert_eq!(
            Attribute::SecurityGroups.value(&snapshot),
            AttributeValue::List(vec![String::from("sg-1")])
        );
        assert_eq!(Attribute::Tags.value(&snapshot).kind_name(), "map");
    }
}

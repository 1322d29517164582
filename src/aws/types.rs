//! EC2 record types.
//!
//! [`Ec2Instance`] mirrors the subset of the `DescribeInstances` response the
//! detector needs. Every field is optional on the wire; conversion into an
//! [`InstanceSnapshot`] turns absent values into zero values.

use crate::model::InstanceSnapshot;

/// A provider-native EC2 instance record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ec2Instance {
    /// Instance id.
    pub instance_id: Option<String>,
    /// Instance type.
    pub instance_type: Option<String>,
    /// Placement information.
    pub placement: Option<Placement>,
    /// Attached security groups.
    pub security_groups: Vec<GroupIdentifier>,
    /// Tags.
    pub tags: Vec<Tag>,
    /// Subnet id.
    pub subnet_id: Option<String>,
    /// AMI id.
    pub image_id: Option<String>,
    /// Key pair name.
    pub key_name: Option<String>,
    /// Monitoring information.
    pub monitoring: Option<Monitoring>,
}

/// Instance placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    /// Availability zone.
    pub availability_zone: Option<String>,
}

/// Security group reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIdentifier {
    /// Group id.
    pub group_id: Option<String>,
    /// Group name.
    pub group_name: Option<String>,
}

/// Resource tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    /// Tag key.
    pub key: Option<String>,
    /// Tag value.
    pub value: Option<String>,
}

/// Detailed monitoring state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonitoringState {
    /// Monitoring is off.
    #[default]
    Disabled,
    /// Monitoring is being turned off.
    Disabling,
    /// Monitoring is on.
    Enabled,
    /// Monitoring is being turned on.
    Pending,
}

/// Monitoring information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Monitoring {
    /// Current state.
    pub state: Option<MonitoringState>,
}

impl Ec2Instance {
    /// Instance id, or an empty string.
    #[must_use]
    pub fn id(&self) -> &str {
        self.instance_id.as_deref().unwrap_or_default()
    }
}

impl From<&Ec2Instance> for InstanceSnapshot {
    fn from(instance: &Ec2Instance) -> Self {
        let availability_zone = instance
            .placement
            .as_ref()
            .and_then(|p| p.availability_zone.clone())
            .unwrap_or_default();

        let security_groups = instance
            .security_groups
            .iter()
            .map(|g| g.group_id.clone().unwrap_or_default())
            .collect();

        let tags = instance
            .tags
            .iter()
            .map(|t| {
                (
                    t.key.clone().unwrap_or_default(),
                    t.value.clone().unwrap_or_default(),
                )
            })
            .collect();

        let monitoring = instance
            .monitoring
            .and_then(|m| m.state)
            .is_some_and(|s| s == MonitoringState::Enabled);

        Self {
            instance_id: instance.id().to_string(),
            instance_type: instance.instance_type.clone().unwrap_or_default(),
            availability_zone,
            security_groups,
            tags,
            subnet_id: instance.subnet_id.clone().unwrap_or_default(),
            image_id: instance.image_id.clone().unwrap_or_default(),
            key_name: instance.key_name.clone().unwrap_or_default(),
            monitoring,
        }
    }
}

impl From<Ec2Instance> for InstanceSnapshot {
    fn from(instance: Ec2Instance) -> Self {
        Self::from(&instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mapping() {
        let instance = Ec2Instance {
            instance_id: Some(String::from("i-123")),
            instance_type: Some(String::from("t3.micro")),
            placement: Some(Placement {
                availability_zone: Some(String::from("us-east-1a")),
            }),
            security_groups: vec![
                GroupIdentifier {
                    group_id: Some(String::from("sg-1")),
                    group_name: Some(String::from("web")),
                },
                GroupIdentifier {
                    group_id: Some(String::from("sg-2")),
                    group_name: None,
                },
            ],
            tags: vec![Tag {
                key: Some(String::from("Name")),
                value: Some(String::from("web")),
            }],
            subnet_id: Some(String::from("subnet-1")),
            image_id: Some(String::from("ami-123")),
            key_name: Some(String::from("my-key")),
            monitoring: Some(Monitoring {
                state: Some(MonitoringState::Enabled),
            }),
        };

        let snapshot = InstanceSnapshot::from(&instance);

        assert_eq!(snapshot.instance_id, "i-123");
        assert_eq!(snapshot.instance_type, "t3.micro");
        assert_eq!(snapshot.availability_zone, "us-east-1a");
        assert_eq!(snapshot.security_groups, vec!["sg-1", "sg-2"]);
        assert_eq!(snapshot.name(), Some("web"));
        assert_eq!(snapshot.subnet_id, "subnet-1");
        assert_eq!(snapshot.image_id, "ami-123");
        assert_eq!(snapshot.key_name, "my-key");
        assert!(snapshot.monitoring);
    }

    #[test]
    fn test_absent_fields_map_to_zero_values() {
        let instance = Ec2Instance {
            instance_id: Some(String::from("i-empty")),
            ..Ec2Instance::default()
        };

        let snapshot = InstanceSnapshot::from(instance);

        assert_eq!(snapshot, InstanceSnapshot::new("i-empty"));
    }

    #[test]
    fn test_pending_monitoring_is_not_enabled() {
        let instance = Ec2Instance {
            monitoring: Some(Monitoring {
                state: Some(MonitoringState::Pending),
            }),
            ..Ec2Instance::default()
        };

        assert!(!InstanceSnapshot::from(instance).monitoring);
    }
}

//! Type-aware attribute comparison.
//!
//! Lists compare as multisets (order never matters, duplicate counts do) and
//! maps compare by key and value. The same multiset view is used when
//! classifying a list drift, so a lost duplicate is reported as missing.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::model::{AttributeValue, DriftKind, DriftReport, InstanceSnapshot};

use super::attributes::Attribute;

/// Anything that can turn an (expected, actual) pair into a report.
pub trait Compare: Send + Sync {
    /// Compares the requested attributes of two snapshots.
    fn compare(
        &self,
        expected: &InstanceSnapshot,
        actual: &InstanceSnapshot,
        attributes: &[String],
    ) -> DriftReport;
}

/// Registry-driven comparator.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeComparator;

impl AttributeComparator {
    /// Creates a new comparator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compares one attribute and appends a drift to `report` when needed.
    fn compare_attribute(
        name: &str,
        expected: &InstanceSnapshot,
        actual: &InstanceSnapshot,
        report: &mut DriftReport,
    ) {
        let Some(attribute) = Attribute::from_name(name) else {
            warn!("Invalid attribute name: {name}");
            return;
        };

        let expected_value = Some(attribute.value(expected));
        let actual_value = Some(attribute.value(actual));

        if values_equal(expected_value.as_ref(), actual_value.as_ref()) {
            return;
        }

        let (kind, details) = classify(expected_value.as_ref(), actual_value.as_ref());

        debug!(
            attribute = name,
            drift_type = %kind,
            "Drift found in {} ({})",
            attribute,
            expected_value.as_ref().map_or("none", AttributeValue::kind_name)
        );

        match details {
            Some(details) => {
                report.add_drift_with_details(name, expected_value, actual_value, kind, details);
            }
            None => report.add_drift(name, expected_value, actual_value, kind),
        }
    }
}

impl Compare for AttributeComparator {
    fn compare(
        &self,
        expected: &InstanceSnapshot,
        actual: &InstanceSnapshot,
        attributes: &[String],
    ) -> DriftReport {
        debug!(
            "Comparing {} attribute(s) for instance {}",
            attributes.len(),
            actual.instance_id
        );

        let mut report = DriftReport::new(actual.instance_id.clone(), attributes.to_vec());

        for name in attributes {
            Self::compare_attribute(name, expected, actual, &mut report);
        }

        if report.has_drift {
            info!(
                "Drift detected on instance {}: {} attribute(s)",
                report.instance_id,
                report.drifts.len()
            );
        } else {
            debug!("No drift detected on instance {}", report.instance_id);
        }

        report
    }
}

/// Type-correct equality.
fn values_equal(expected: Option<&AttributeValue>, actual: Option<&AttributeValue>) -> bool {
    match (expected, actual) {
        (None, None) => true,
        (Some(AttributeValue::List(exp)), Some(AttributeValue::List(act))) => {
            lists_equal(exp, act)
        }
        (Some(exp), Some(act)) => exp == act,
        _ => false,
    }
}

fn lists_equal(expected: &[String], actual: &[String]) -> bool {
    if expected.len() != actual.len() {
        return false;
    }

    let mut exp_sorted = expected.to_vec();
    let mut act_sorted = actual.to_vec();
    exp_sorted.sort_unstable();
    act_sorted.sort_unstable();

    exp_sorted == act_sorted
}

/// Picks the drift kind for two unequal values.
fn classify(
    expected: Option<&AttributeValue>,
    actual: Option<&AttributeValue>,
) -> (DriftKind, Option<String>) {
    match (expected, actual) {
        (None, Some(_)) => (
            DriftKind::ExtraInActual,
            Some(String::from("attribute present in instance but not in baseline")),
        ),
        (Some(_), None) => (
            DriftKind::MissingInActual,
            Some(String::from("attribute present in baseline but not in instance")),
        ),
        (Some(AttributeValue::List(exp)), Some(AttributeValue::List(act))) => {
            classify_list(exp, act)
        }
        (Some(AttributeValue::Map(exp)), Some(AttributeValue::Map(act))) => classify_map(exp, act),
        (Some(exp), Some(act)) if std::mem::discriminant(exp) != std::mem::discriminant(act) => {
            (DriftKind::ValueMismatch, Some(String::from("type mismatch")))
        }
        _ => (DriftKind::ValueMismatch, None),
    }
}

fn classify_list(expected: &[String], actual: &[String]) -> (DriftKind, Option<String>) {
    let missing = multiset_difference(expected, actual);
    let extra = multiset_difference(actual, expected);

    match (missing.is_empty(), extra.is_empty()) {
        (false, true) => (
            DriftKind::MissingInActual,
            Some(format!("missing values: {}", bracketed(&missing))),
        ),
        (true, false) => (
            DriftKind::ExtraInActual,
            Some(format!("extra values: {}", bracketed(&extra))),
        ),
        (false, false) => (
            DriftKind::ValueMismatch,
            Some(format!(
                "missing: {}, extra: {}",
                bracketed(&missing),
                bracketed(&extra)
            )),
        ),
        (true, true) => (DriftKind::ValueMismatch, None),
    }
}

fn classify_map(
    expected: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> (DriftKind, Option<String>) {
    let mut missing_keys = Vec::new();
    let mut different_values = Vec::new();

    for (key, value) in expected {
        match actual.get(key) {
            None => missing_keys.push(key.as_str()),
            Some(other) if other != value => different_values.push(key.as_str()),
            Some(_) => {}
        }
    }

    let extra_keys: Vec<&str> = actual
        .keys()
        .filter(|k| !expected.contains_key(*k))
        .map(String::as_str)
        .collect();

    if different_values.is_empty() {
        if !missing_keys.is_empty() && extra_keys.is_empty() {
            return (
                DriftKind::MissingInActual,
                Some(format!("missing keys: {}", bracketed(&missing_keys))),
            );
        }
        if !extra_keys.is_empty() && missing_keys.is_empty() {
            return (
                DriftKind::ExtraInActual,
                Some(format!("extra keys: {}", bracketed(&extra_keys))),
            );
        }
    }

    let mut parts = Vec::new();
    if !missing_keys.is_empty() {
        parts.push(format!("missing keys: {}", bracketed(&missing_keys)));
    }
    if !extra_keys.is_empty() {
        parts.push(format!("extra keys: {}", bracketed(&extra_keys)));
    }
    if !different_values.is_empty() {
        parts.push(format!("different values: {}", bracketed(&different_values)));
    }

    let details = if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    };

    (DriftKind::ValueMismatch, details)
}

/// Members of `left` not matched one-for-one in `right`, sorted.
fn multiset_difference<'a>(left: &'a [String], right: &[String]) -> Vec<&'a str> {
    let mut remaining: BTreeMap<&str, usize> = BTreeMap::new();
    for item in right {
        *remaining.entry(item.as_str()).or_default() += 1;
    }

    let mut sorted: Vec<&str> = left.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    sorted
        .into_iter()
        .filter(|item| match remaining.get_mut(item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .collect()
}

fn bracketed<S: AsRef<str>>(items: &[S]) -> String {
    let joined: Vec<&str> = items.iter().map(<S as AsRef<str>>::as_ref).collect();
    format!("[{}]", joined.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn groups(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_no_drift() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.instance_type = String::from("t3.micro");
        let actual = expected.clone();

        let report = AttributeComparator::new().compare(
            &expected,
            &actual,
            &attrs(&["InstanceType", "Tags", "Monitoring"]),
        );

        assert!(!report.has_drift);
        assert!(report.drifts.is_empty());
        assert_eq!(report.checked_attributes.len(), 3);
    }

    #[test]
    fn test_scalar_mismatch() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.instance_type = String::from("t3.micro");
        let mut actual = InstanceSnapshot::new("i-1");
        actual.instance_type = String::from("t3.large");

        let report =
            AttributeComparator::new().compare(&expected, &actual, &attrs(&["InstanceType"]));

        assert!(report.has_drift);
        assert_eq!(report.drifts.len(), 1);
        let drift = &report.drifts[0];
        assert_eq!(drift.kind, DriftKind::ValueMismatch);
        assert_eq!(drift.details, None);
        assert_eq!(
            drift.expected,
            Some(AttributeValue::Text(String::from("t3.micro")))
        );
        assert_eq!(drift.actual, Some(AttributeValue::Text(String::from("t3.large"))));
    }

    #[test]
    fn test_monitoring_flag_mismatch() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.monitoring = true;
        let actual = InstanceSnapshot::new("i-1");

        let report =
            AttributeComparator::new().compare(&expected, &actual, &attrs(&["monitoring"]));

        assert_eq!(report.drifts[0].kind, DriftKind::ValueMismatch);
        assert_eq!(report.drifts[0].attribute, "monitoring");
    }

    #[test]
    fn test_security_groups_order_independent() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.security_groups = groups(&["sg-1", "sg-2", "sg-3"]);

        let permutations = [
            groups(&["sg-2", "sg-1", "sg-3"]),
            groups(&["sg-3", "sg-2", "sg-1"]),
            groups(&["sg-1", "sg-3", "sg-2"]),
        ];

        for permutation in permutations {
            let mut actual = InstanceSnapshot::new("i-1");
            actual.security_groups = permutation;
            let report = AttributeComparator::new().compare(
                &expected,
                &actual,
                &attrs(&["SecurityGroups"]),
            );
            assert!(!report.has_drift);
        }
    }

    #[test]
    fn test_security_groups_missing_and_extra() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.security_groups = groups(&["sg-1", "sg-2"]);

        let mut actual = InstanceSnapshot::new("i-1");
        actual.security_groups = groups(&["sg-1"]);
        let report =
            AttributeComparator::new().compare(&expected, &actual, &attrs(&["SecurityGroups"]));
        assert_eq!(report.drifts[0].kind, DriftKind::MissingInActual);
        assert_eq!(report.drifts[0].details.as_deref(), Some("missing values: [sg-2]"));

        actual.security_groups = groups(&["sg-1", "sg-2", "sg-9"]);
        let report =
            AttributeComparator::new().compare(&expected, &actual, &attrs(&["SecurityGroups"]));
        assert_eq!(report.drifts[0].kind, DriftKind::ExtraInActual);
        assert_eq!(report.drifts[0].details.as_deref(), Some("extra values: [sg-9]"));

        actual.security_groups = groups(&["sg-1", "sg-9"]);
        let report =
            AttributeComparator::new().compare(&expected, &actual, &attrs(&["SecurityGroups"]));
        assert_eq!(report.drifts[0].kind, DriftKind::ValueMismatch);
        assert_eq!(
            report.drifts[0].details.as_deref(),
            Some("missing: [sg-2], extra: [sg-9]")
        );
    }

    #[test]
    fn test_security_groups_duplicate_counts_matter() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.security_groups = groups(&["sg-1", "sg-1"]);
        let mut actual = InstanceSnapshot::new("i-1");
        actual.security_groups = groups(&["sg-1"]);

        let report =
            AttributeComparator::new().compare(&expected, &actual, &attrs(&["SecurityGroups"]));

        assert!(report.has_drift);
        assert_eq!(report.drifts[0].kind, DriftKind::MissingInActual);
        assert_eq!(report.drifts[0].details.as_deref(), Some("missing values: [sg-1]"));
    }

    #[test]
    fn test_tags_value_changed() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.tags = tags(&[("Env", "prod")]);
        let mut actual = InstanceSnapshot::new("i-1");
        actual.tags = tags(&[("Env", "staging")]);

        let report = AttributeComparator::new().compare(&expected, &actual, &attrs(&["Tags"]));

        assert_eq!(report.drifts.len(), 1);
        assert_eq!(report.drifts[0].attribute, "Tags");
        assert_eq!(report.drifts[0].kind, DriftKind::ValueMismatch);
        assert_eq!(
            report.drifts[0].details.as_deref(),
            Some("different values: [Env]")
        );
    }

    #[test]
    fn test_tags_missing_and_extra_keys() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.tags = tags(&[("Env", "prod"), ("Owner", "ops")]);

        let mut actual = InstanceSnapshot::new("i-1");
        actual.tags = tags(&[("Env", "prod")]);
        let report = AttributeComparator::new().compare(&expected, &actual, &attrs(&["Tags"]));
        assert_eq!(report.drifts[0].kind, DriftKind::MissingInActual);
        assert_eq!(report.drifts[0].details.as_deref(), Some("missing keys: [Owner]"));

        actual.tags = tags(&[("Env", "prod"), ("Owner", "ops"), ("Team", "web")]);
        let report = AttributeComparator::new().compare(&expected, &actual, &attrs(&["Tags"]));
        assert_eq!(report.drifts[0].kind, DriftKind::ExtraInActual);
        assert_eq!(report.drifts[0].details.as_deref(), Some("extra keys: [Team]"));

        actual.tags = tags(&[("Env", "dev"), ("Team", "web")]);
        let report = AttributeComparator::new().compare(&expected, &actual, &attrs(&["Tags"]));
        assert_eq!(report.drifts[0].kind, DriftKind::ValueMismatch);
        assert_eq!(
            report.drifts[0].details.as_deref(),
            Some("missing keys: [Owner], extra keys: [Team], different values: [Env]")
        );
    }

    #[test]
    fn test_tags_insertion_order_irrelevant() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.tags = tags(&[("A", "1"), ("B", "2")]);
        let mut actual = InstanceSnapshot::new("i-1");
        actual.tags = tags(&[("B", "2"), ("A", "1")]);

        let report = AttributeComparator::new().compare(&expected, &actual, &attrs(&["Tags"]));
        assert!(!report.has_drift);
    }

    #[test]
    fn test_unknown_attribute_is_skipped() {
        let expected = InstanceSnapshot::new("i-1");
        let mut actual = InstanceSnapshot::new("i-1");
        actual.instance_type = String::from("t3.large");

        let report = AttributeComparator::new().compare(
            &expected,
            &actual,
            &attrs(&["NotAnAttribute", "InstanceType"]),
        );

        assert_eq!(report.drifts.len(), 1);
        assert_eq!(report.drifts[0].attribute, "InstanceType");
        assert_eq!(
            report.checked_attributes,
            attrs(&["NotAnAttribute", "InstanceType"])
        );
    }

    #[test]
    fn test_compare_is_idempotent() {
        let mut expected = InstanceSnapshot::new("i-1");
        expected.tags = tags(&[("Env", "prod"), ("Owner", "ops")]);
        expected.security_groups = groups(&["sg-1", "sg-2"]);
        let mut actual = InstanceSnapshot::new("i-1");
        actual.tags = tags(&[("Env", "dev"), ("Team", "web")]);
        actual.security_groups = groups(&["sg-3", "sg-1"]);

        let names = attrs(&["Tags", "SecurityGroups", "InstanceType"]);
        let comparator = AttributeComparator::new();
        let first = comparator.compare(&expected, &actual, &names);
        let second = comparator.compare(&expected, &actual, &names);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_absent_values() {
        let value = AttributeValue::Text(String::from("x"));
        assert!(values_equal(None, None));
        assert!(!values_equal(Some(&value), None));

        assert_eq!(classify(None, Some(&value)).0, DriftKind::ExtraInActual);
        assert_eq!(classify(Some(&value), None).0, DriftKind::MissingInActual);
        assert_eq!(
            classify(Some(&value), Some(&AttributeValue::Flag(true))),
            (DriftKind::ValueMismatch, Some(String::from("type mismatch")))
        );
    }
}

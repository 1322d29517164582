//! Terraform HCL configuration reader.
//!
//! Declared instances are read from `resource "aws_instance"` blocks. Only
//! literal values are taken; references, function calls and interpolated
//! strings leave the attribute unset. Configuration carries no instance ids,
//! so each snapshot is keyed as `hcl:<resource name>`.

use hcl::expr::{Expression, ObjectKey};
use hcl::{Block, Body};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

use crate::error::BaselineError;
use crate::model::InstanceSnapshot;

use super::parser::INSTANCE_RESOURCE_TYPE;

/// Prefix of snapshot ids built from configuration.
pub const HCL_ID_PREFIX: &str = "hcl:";

/// Parses one `.tf` document, returning its snapshots.
pub(super) fn parse_config(
    path: &Path,
    bytes: &[u8],
) -> Result<Vec<InstanceSnapshot>, BaselineError> {
    let parse_error = |message: String| BaselineError::ParseError {
        path: path.to_path_buf(),
        message,
    };

    let text = std::str::from_utf8(bytes).map_err(|e| parse_error(e.to_string()))?;
    let body: Body = hcl::parse(text).map_err(|e| parse_error(e.to_string()))?;

    let snapshots: Vec<InstanceSnapshot> = body
        .blocks()
        .filter_map(instance_block)
        .map(|(name, block)| {
            debug!(
                "Parsed {INSTANCE_RESOURCE_TYPE}.{name} from {}",
                path.display()
            );
            snapshot_from_body(name, block.body())
        })
        .collect();

    debug!(
        "HCL document {} declares {} instance(s)",
        path.display(),
        snapshots.len()
    );
    Ok(snapshots)
}

/// Resource name of an `aws_instance` block.
fn instance_block(block: &Block) -> Option<(&str, &Block)> {
    if block.identifier() != "resource" {
        return None;
    }
    match block.labels() {
        [kind, name, ..] if kind.as_str() == INSTANCE_RESOURCE_TYPE => {
            Some((name.as_str(), block))
        }
        _ => None,
    }
}

fn snapshot_from_body(name: &str, body: &Body) -> InstanceSnapshot {
    let mut snapshot = InstanceSnapshot::new(format!("{HCL_ID_PREFIX}{name}"));
    let mut legacy_groups = Vec::new();

    for attr in body.attributes() {
        let expr = attr.expr();
        match attr.key() {
            "instance_type" => set_text(&mut snapshot.instance_type, expr),
            "availability_zone" => set_text(&mut snapshot.availability_zone, expr),
            "ami" => set_text(&mut snapshot.image_id, expr),
            "key_name" => set_text(&mut snapshot.key_name, expr),
            "subnet_id" => set_text(&mut snapshot.subnet_id, expr),
            "vpc_security_group_ids" => snapshot.security_groups = string_list(expr),
            "security_groups" => legacy_groups = string_list(expr),
            "monitoring" => {
                if let Expression::Bool(enabled) = expr {
                    snapshot.monitoring = *enabled;
                }
            }
            "tags" => snapshot.tags = string_map(expr),
            _ => {}
        }
    }

    if snapshot.security_groups.is_empty() {
        snapshot.security_groups = legacy_groups;
    }

    // Block form: `tags { Name = "web" }`
    for tags in body.blocks().filter(|b| b.identifier() == "tags") {
        snapshot.tags = tags
            .body()
            .attributes()
            .filter_map(|a| literal(a.expr()).map(|v| (a.key().to_string(), v.to_string())))
            .collect();
    }

    snapshot
}

fn literal(expr: &Expression) -> Option<&str> {
    match expr {
        Expression::String(value) => Some(value.as_str()),
        _ => None,
    }
}

fn set_text(field: &mut String, expr: &Expression) {
    match literal(expr) {
        Some(value) => value.clone_into(field),
        None => trace!("Ignoring non-literal value: {expr:?}"),
    }
}

fn string_list(expr: &Expression) -> Vec<String> {
    match expr {
        Expression::Array(items) => items
            .iter()
            .filter_map(literal)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn string_map(expr: &Expression) -> BTreeMap<String, String> {
    let Expression::Object(object) = expr else {
        return BTreeMap::new();
    };

    object
        .iter()
        .filter_map(|(key, value)| {
            let key = match key {
                ObjectKey::Identifier(ident) => ident.as_str(),
                ObjectKey::Expression(Expression::String(key)) => key.as_str(),
                _ => return None,
            };
            literal(value).map(|v| (key.to_string(), v.to_string()))
        })
        .collect()
}

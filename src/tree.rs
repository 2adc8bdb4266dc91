use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Unit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamNode {
    pub pn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pch: Vec<ParamNode>,
}

impl ParamNode {
    pub fn leaf(pn: impl Into<String>, pv: impl Into<String>) -> Self {
        Self {
            pn: pn.into(),
            pv: Some(pv.into()),
            pch: Vec::new(),
        }
    }

    pub fn group(pn: impl Into<String>, pch: Vec<ParamNode>) -> Self {
        Self {
            pn: pn.into(),
            pv: None,
            pch,
        }
    }
}

fn children(node: &Value) -> &[Value] {
    match node.get("pch") {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn node_name(node: &Value) -> Option<String> {
    node.get("pn")
        .and_then(scalar_to_string)
        .filter(|name| !name.is_empty())
}

pub fn find_child_by_name<'a>(node: &'a Value, name: &str) -> Option<&'a Value> {
    children(node)
        .iter()
        .filter(|child| child.is_object())
        .find(|child| child.get("pn").and_then(Value::as_str) == Some(name))
}

/// `pn -> pv` for every direct child carrying both. Duplicate names: last wins.
pub fn flatten_children_to_map(node: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for child in children(node).iter().filter(|c| c.is_object()) {
        let Some(key) = node_name(child) else {
            continue;
        };
        if let Some(value) = child.get("pv").and_then(scalar_to_string) {
            out.insert(key, value);
        }
    }
    out
}

fn grandchild_value(fragment: &Value, group: &str, leaf: &str) -> String {
    find_child_by_name(fragment, group)
        .and_then(|g| find_child_by_name(g, leaf))
        .and_then(|n| n.get("pv"))
        .and_then(scalar_to_string)
        .unwrap_or_default()
}

/// Fold one discovery fragment into `units`.
///
/// Name comes from `adp_d/name`, MAC from `adp_i/mac`. An existing unit only
/// takes non-empty values, so a sparse fragment never blanks a field.
pub fn merge_edge_fragment(units: &mut BTreeMap<String, Unit>, fragment: &Value, edge_id: &str) {
    let name = grandchild_value(fragment, "adp_d", "name");
    let mac = grandchild_value(fragment, "adp_i", "mac");

    if let Some(existing) = units.get_mut(edge_id) {
        if !name.is_empty() {
            existing.name = name;
        }
        if !mac.is_empty() {
            existing.mac = mac;
        }
        return;
    }

    let name = if name.is_empty() {
        format!("Daikin {edge_id}")
    } else {
        name
    };
    units.insert(edge_id.to_string(), Unit::new(edge_id, name, mac));
}

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::codec::{
    decode_hex_half_degree, decode_hex_le_i16_half_degree, decode_hex_signed_byte, decode_hex_uint,
};
use crate::tree::{
    find_child_by_name, flatten_children_to_map, merge_edge_fragment, node_name, scalar_to_string,
    ParamNode,
};
use crate::types::*;

pub const API_BASE_URL: &str = "https://proddit.ditdeneb.com";
pub const API_CREDENTIAL_DISCOVERY_URLS: [&str; 2] = [
    "https://scr.dspsph.com/common/login",
    "https://proddit.ditdeneb.com/common/login",
];

pub const LOGIN_PATH: &str = "/premise/dsiot/login";
pub const MULTIREQ_PATH: &str = "/dsiot/multireq";

pub const USER_AGENT: &str = "DaikinMobileController/2.0.0 CFNetwork/3860.100.1 Darwin/25.0.0";

/// Suggested interval between `refresh` calls.
pub const UPDATE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

pub const OP_READ: u8 = 2;
pub const OP_WRITE: u8 = 3;

pub const RSC_OK: i64 = 2000;
/// Also returned for accepted writes; meaning undocumented.
pub const RSC_ACCEPTED: i64 = 2004;

const EDGES_PATH: &str = "/dsiot/edges";
const STATUS_SUFFIX: &str = "/adr_0100.dgc_status";
const STATUS_ROOT: &str = "e_1002";

/// Fan code written to e_3003.p_2D when the unit never reported one.
pub const DEFAULT_FAN_CODE: &str = "02";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestItem {
    pub op: u8,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pc: Option<ParamNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiRequest {
    pub requests: Vec<RequestItem>,
}

impl MultiRequest {
    pub fn targets(&self) -> String {
        self.requests
            .iter()
            .map(|r| r.to.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub fn status_path(edge_id: &str) -> String {
    format!("{EDGES_PATH}/{edge_id}{STATUS_SUFFIX}")
}

pub fn discovery_request() -> MultiRequest {
    MultiRequest {
        requests: vec![
            RequestItem { op: OP_READ, to: format!("{EDGES_PATH}?expand"), pc: None },
            RequestItem { op: OP_READ, to: EDGES_PATH.to_string(), pc: None },
        ],
    }
}

pub fn status_request<S: AsRef<str>>(edge_ids: &[S]) -> MultiRequest {
    MultiRequest {
        requests: edge_ids
            .iter()
            .map(|id| RequestItem {
                op: OP_READ,
                to: format!("{}?filter=pv", status_path(id.as_ref())),
                pc: None,
            })
            .collect(),
    }
}

pub fn write_request(
    edge_id: &str,
    mode_patch: Vec<ParamNode>,
    fan_code: &str,
    power_on: bool,
) -> MultiRequest {
    let power = if power_on { POWER_ON } else { POWER_OFF };
    let status = ParamNode::group(
        "dgc_status",
        vec![ParamNode::group(
            STATUS_ROOT,
            vec![
                ParamNode::group("e_3001", mode_patch),
                ParamNode::group("e_3003", vec![ParamNode::leaf("p_2D", fan_code)]),
                ParamNode::group("e_A002", vec![ParamNode::leaf("p_01", power)]),
            ],
        )],
    );
    MultiRequest {
        requests: vec![RequestItem {
            op: OP_WRITE,
            to: status_path(edge_id),
            pc: Some(status),
        }],
    }
}

fn responses(data: &Value) -> impl Iterator<Item = &Value> {
    data.get("responses")
        .and_then(Value::as_array)
        .map(|items| items.as_slice())
        .unwrap_or_default()
        .iter()
        .filter(|r| r.is_object())
}

fn source_path(resp: &Value) -> String {
    resp.get("fr").and_then(scalar_to_string).unwrap_or_default()
}

fn merge_edge_node(units: &mut BTreeMap<String, Unit>, edge: &Value) {
    if !edge.is_object() {
        return;
    }
    let edge_id = edge
        .get("ri")
        .and_then(scalar_to_string)
        .unwrap_or_default();
    let edge_id = edge_id.trim();
    if !edge_id.is_empty() {
        merge_edge_fragment(units, edge, edge_id);
    }
}

/// Units named in a discovery response.
///
/// `/dsiot/edges` answers carry either a list of edges or a single edge;
/// anything addressed as `/dsiot/edges/<n>/...` is a fragment of edge `n`.
pub fn parse_discovery(data: &Value) -> BTreeMap<String, Unit> {
    let mut units = BTreeMap::new();
    for resp in responses(data) {
        let fr = source_path(resp);
        let pc = resp.get("pc");
        if fr == EDGES_PATH {
            match pc {
                Some(Value::Array(edges)) => {
                    for edge in edges {
                        merge_edge_node(&mut units, edge);
                    }
                }
                Some(edge @ Value::Object(_)) => merge_edge_node(&mut units, edge),
                _ => {}
            }
            continue;
        }

        if fr.starts_with(&format!("{EDGES_PATH}/"))
            && let Some(edge_id) = fr.split('/').nth(3)
            && !edge_id.is_empty()
            && edge_id.chars().all(|c| c.is_ascii_digit())
            && let Some(fragment @ Value::Object(_)) = pc
        {
            let wrapped = serde_json::json!({ "pch": [fragment] });
            merge_edge_fragment(&mut units, &wrapped, edge_id);
        }
    }
    units
}

pub fn parse_status(data: &Value) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for resp in responses(data) {
        let fr = source_path(resp);
        if !fr.contains(STATUS_SUFFIX) {
            continue;
        }
        let Some(edge_id) = fr.split('/').nth(3) else {
            continue;
        };
        let Some(pc @ Value::Object(_)) = resp.get("pc") else {
            continue;
        };
        let Some(root) = find_child_by_name(pc, STATUS_ROOT) else {
            continue;
        };

        let mut merged = BTreeMap::new();
        for group in root
            .get("pch")
            .and_then(Value::as_array)
            .map(|g| g.as_slice())
            .unwrap_or_default()
        {
            if !group.is_object() {
                continue;
            }
            let Some(group_name) = node_name(group) else {
                continue;
            };
            for (key, value) in flatten_children_to_map(group) {
                merged.insert(format!("{group_name}.{key}"), value);
            }
        }
        out.insert(edge_id.to_string(), merged);
    }
    out
}

pub fn apply_status(unit: &mut Unit, raw: BTreeMap<String, String>) {
    let get = |key: &str| raw.get(key).map(String::as_str);

    unit.mode_code = get("e_3001.p_01").map(str::to_string);
    unit.fan_code = get("e_3003.p_2D").map(str::to_string);
    unit.power_code = get("e_A002.p_01").map(str::to_string);
    unit.target_temp_c = get("e_3001.p_02").and_then(decode_hex_half_degree);
    unit.room_temp_c = get("e_A00B.p_01")
        .and_then(decode_hex_signed_byte)
        .map(|t| t as f64);
    unit.room_humidity_percent = get("e_A00B.p_02").and_then(decode_hex_uint);
    unit.sensor_temp_1_c = get("e_A00B.p_05").and_then(decode_hex_le_i16_half_degree);
    unit.sensor_temp_2_c = get("e_A00B.p_06").and_then(decode_hex_le_i16_half_degree);
    unit.raw_status = raw;
}

/// e_3001 keys each mode must carry, with the values captured from the app.
/// They cover swing position, reserved fields and the mode's fan speed.
pub fn mode_template(mode_code: &str) -> &'static [(&'static str, &'static str)] {
    match mode_code {
        MODE_CODE_COOL => &[
            ("p_02", "32"),
            ("p_05", "0F0000"),
            ("p_06", "0F0000"),
            ("p_09", "0700"),
            ("p_0C", "00"),
        ],
        MODE_CODE_DRY => &[
            ("p_22", "020000"),
            ("p_23", "0F0000"),
            ("p_27", "0A00"),
            ("p_31", "00"),
        ],
        MODE_CODE_FAN => &[("p_24", "020000"), ("p_25", "050000"), ("p_28", "0A00")],
        _ => &[],
    }
}

/// e_3001 writes for switching `current` into `mode_code`.
///
/// Each templated key takes the caller override, else the unit's current
/// value, else the template default; a value whose width differs from the
/// default is replaced by the default. Overrides outside the template are
/// appended afterwards (`p_01` is always the mode itself).
pub fn build_mode_patch(
    current: &Unit,
    mode_code: &str,
    overrides: &BTreeMap<String, String>,
) -> Vec<ParamNode> {
    let mut patch = vec![ParamNode::leaf("p_01", mode_code)];
    let template = mode_template(mode_code);

    for (key, default) in template {
        let value = overrides
            .get(*key)
            .filter(|v| !v.is_empty())
            .or_else(|| {
                current
                    .raw_status
                    .get(&format!("e_3001.{key}"))
                    .filter(|v| !v.is_empty())
            })
            .map_or(*default, String::as_str);
        let value = if value.len() == default.len() { value } else { *default };
        patch.push(ParamNode::leaf(*key, value));
    }

    for (key, value) in overrides {
        if key == "p_01" || template.iter().any(|(k, _)| *k == key.as_str()) {
            continue;
        }
        patch.push(ParamNode::leaf(key.as_str(), value.as_str()));
    }
    patch
}

use std::collections::BTreeSet;

use serde_json::Value;

use crate::types::*;

fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Leaf-level differences between two JSON documents, as
/// `(dotted path, old, new)`. Arrays compare by index. Keys and items only
/// present in `previous` are ignored.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                diff_entry(prev_map.get(key), curr_val, child_path(path_prefix, key), changes);
            }
        }
        (Value::Array(prev_items), Value::Array(curr_items)) => {
            for (i, curr_val) in curr_items.iter().enumerate() {
                diff_entry(prev_items.get(i), curr_val, child_path(path_prefix, &i.to_string()), changes);
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

fn diff_entry(
    previous: Option<&Value>,
    current: &Value,
    path: String,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Some(prev), curr) => diff_json(prev, curr, &path, changes),
        (None, Value::Object(_)) => diff_json(&Value::Object(serde_json::Map::new()), current, &path, changes),
        (None, Value::Array(_)) => diff_json(&Value::Array(Vec::new()), current, &path, changes),
        (None, curr) => changes.push((path, Value::Null, curr.clone())),
    }
}

/// Events describing how `current` differs from the previous snapshot of
/// the same unit. A unit seen for the first time yields `UnitDiscovered`
/// followed by its initial typed values.
pub(crate) fn unit_events(previous: Option<&Unit>, current: &Unit) -> Vec<Event> {
    let edge_id = current.edge_id.clone();
    let mut events = Vec::new();

    if previous.is_none() {
        events.push(Event::UnitDiscovered {
            edge_id: edge_id.clone(),
            name: current.name.clone(),
        });
    }

    if current.power_code.is_some() && previous.map(|p| &p.power_code) != Some(&current.power_code) {
        events.push(Event::PowerChanged {
            edge_id: edge_id.clone(),
            on: current.is_on(),
        });
    }
    if let Some(code) = &current.mode_code
        && previous.and_then(|p| p.mode_code.as_ref()) != Some(code)
    {
        events.push(Event::ModeChanged {
            edge_id: edge_id.clone(),
            mode_code: code.clone(),
            mode: current.hvac_mode(),
        });
    }
    if let Some(temp_c) = current.target_temp_c
        && previous.and_then(|p| p.target_temp_c) != Some(temp_c)
    {
        events.push(Event::TargetTemperatureChanged { edge_id: edge_id.clone(), temp_c });
    }
    if let Some(temp_c) = current.room_temp_c
        && previous.and_then(|p| p.room_temp_c) != Some(temp_c)
    {
        events.push(Event::RoomTemperatureChanged { edge_id: edge_id.clone(), temp_c });
    }
    if let Some(percent) = current.room_humidity_percent
        && previous.and_then(|p| p.room_humidity_percent) != Some(percent)
    {
        events.push(Event::HumidityChanged { edge_id: edge_id.clone(), percent });
    }
    if let Some(speed) = current.fan_speed()
        && previous.and_then(Unit::fan_speed) != Some(speed)
    {
        events.push(Event::FanSpeedChanged { edge_id: edge_id.clone(), speed });
    }

    if let Some(prev) = previous {
        let keys: BTreeSet<&String> = prev.raw_status.keys().chain(current.raw_status.keys()).collect();
        for key in keys {
            let old = prev.raw_status.get(key);
            let new = current.raw_status.get(key);
            if old != new {
                events.push(Event::ParameterChanged {
                    edge_id: edge_id.clone(),
                    key: key.clone(),
                    old: old.cloned(),
                    new: new.cloned(),
                });
            }
        }
    }

    events
}

// src/workflow/normalize.rs
//! Event normalizer: folds the two producer shapes (flat dot-notation CSV rows
//! and nested `{automation, raw, data}` live-feed objects) into `WorkflowEvent`.
//! Never fails; every missing or malformed field degrades to a default.

use serde_json::{Map, Value};

use super::event::WorkflowEvent;

/// Untyped producer record.
pub type RawEvent = Map<String, Value>;

const DATA_PREFIX: &str = "data.";
const VIEWPORT_PREFIX: &str = "viewport.";

/// Fold `data.*` and `viewport.*` keys back into nested mappings.
///
/// Only one extra level is supported below `data`: `data.a.b.c` lands as
/// `{"data": {"a": {"b.c": ...}}}`.
pub fn unflatten(row: &RawEvent) -> RawEvent {
    let mut out = Map::new();
    let mut data = Map::new();
    let mut viewport = Map::new();

    for (key, value) in row {
        if key.is_empty() {
            continue;
        }
        if let Some(nested) = key.strip_prefix(DATA_PREFIX) {
            match nested.split_once('.') {
                Some((head, rest)) => {
                    let slot = data
                        .entry(head.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(inner) = slot {
                        inner.insert(rest.to_string(), value.clone());
                    }
                }
                None => {
                    data.insert(nested.to_string(), value.clone());
                }
            }
        } else if let Some(field) = key.strip_prefix(VIEWPORT_PREFIX) {
            viewport.insert(field.to_string(), value.clone());
        } else {
            out.insert(key.clone(), value.clone());
        }
    }

    if !viewport.is_empty() {
        out.insert("viewport".to_string(), Value::Object(viewport));
    }
    if !data.is_empty() {
        out.insert("data".to_string(), Value::Object(data));
    }
    out
}

/// Coerce numbers, numeric strings and floats to an integer epoch; anything else is 0.
pub fn coerce_timestamp(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let t = s.trim();
            t.parse::<i64>()
                .ok()
                .or_else(|| {
                    t.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f as i64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Normalize one record from either producer.
pub fn normalize_event(raw: &RawEvent) -> WorkflowEvent {
    let row = if raw.keys().any(|k| k.contains('.')) {
        unflatten(raw)
    } else {
        raw.clone()
    };

    let event_type = ["event", "event_type", "type"]
        .iter()
        .find_map(|k| non_empty_str(&row, k))
        .unwrap_or_else(|| "unknown".to_string());

    let mut data = match row.get("data") {
        Some(Value::Object(m)) => m.clone(),
        Some(Value::String(s)) if !s.trim().is_empty() => match serde_json::from_str(s) {
            Ok(Value::Object(m)) => m,
            _ => Map::new(),
        },
        _ => Map::new(),
    };
    merge_live_feed(&row, &mut data);

    // page_visit/navigation from the live feed carry url/title inside `data`
    let url = non_empty_str(&row, "url")
        .or_else(|| non_empty_str(&data, "url"))
        .unwrap_or_default();
    let title = non_empty_str(&row, "title")
        .or_else(|| non_empty_str(&data, "title"))
        .unwrap_or_default();

    WorkflowEvent {
        event_type,
        timestamp: coerce_timestamp(row.get("timestamp")),
        url,
        title,
        data,
    }
}

/// Normalize an arbitrary JSON value; non-objects become an empty record.
pub fn normalize_value(value: &Value) -> WorkflowEvent {
    match value {
        Value::Object(m) => normalize_event(m),
        _ => normalize_event(&Map::new()),
    }
}

fn merge_live_feed(row: &RawEvent, data: &mut Map<String, Value>) {
    let automation = row.get("automation").and_then(Value::as_object);
    let raw = row.get("raw").and_then(Value::as_object);
    if automation.is_none() && raw.is_none() {
        return;
    }

    let pick = |obj: Option<&Map<String, Value>>, key: &str| -> Option<Value> {
        obj.and_then(|o| o.get(key)).filter(|v| !is_blank(v)).cloned()
    };

    let mapped = [
        ("element_type", pick(automation, "tag")),
        ("text", pick(raw, "text")),
        ("value", pick(raw, "value")),
        ("selector", pick(automation, "selector")),
        ("xpath", pick(automation, "xpath")),
        (
            "field_name",
            pick(raw, "fieldName")
                .or_else(|| pick(automation, "selector"))
                .or_else(|| pick(automation, "tag")),
        ),
    ];
    for (key, value) in mapped {
        if let Some(v) = value {
            data.insert(key.to_string(), v);
        }
    }
    if let Some(key) = pick(raw, "key") {
        data.insert("key".to_string(), key);
    }
}

fn non_empty_str(m: &Map<String, Value>, key: &str) -> Option<String> {
    match m.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// src/workflow/event.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event kinds that carry task-relevant signal for summaries.
pub const SIGNIFICANT_EVENT_TYPES: [&str; 4] = ["click", "input", "navigation", "page_visit"];

/// Canonical event shape shared by the CSV export and the live extension feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_type: String,
    pub timestamp: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl WorkflowEvent {
    pub fn new(event_type: impl Into<String>, timestamp: i64) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp,
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn is_significant(&self) -> bool {
        SIGNIFICANT_EVENT_TYPES.contains(&self.event_type.as_str())
    }

    /// Data field rendered as text; `""` when absent or null.
    pub fn data_str(&self, key: &str) -> String {
        self.data.get(key).map(value_text).unwrap_or_default()
    }

    /// Human-readable one-liner used by workflow summaries.
    pub fn description(&self) -> String {
        match self.event_type.as_str() {
            "click" => {
                let element = non_empty_or(self.data_str("element_type"), "element");
                let text: String = self.data_str("text").chars().take(50).collect();
                if text.is_empty() {
                    format!("Clicked on {element}")
                } else {
                    format!("Clicked on {element} with text '{text}'")
                }
            }
            "input" => {
                let field = non_empty_or(self.data_str("field_name"), "field");
                format!("Typed in {field}")
            }
            "navigation" | "page_visit" => format!("Navigated to {}", self.url),
            "scroll" => "Scrolled on page".to_string(),
            "focus" => {
                let element = non_empty_or(self.data_str("element_type"), "element");
                format!("Focused on {element}")
            }
            other => format!("Performed {other}"),
        }
    }
}

/// Scalar JSON rendered without quotes; objects/arrays as compact JSON.
pub(crate) fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn non_empty_or(s: String, fallback: &str) -> String {
    if s.is_empty() {
        fallback.to_string()
    } else {
        s
    }
}

// src/synth/plan.rs
//! Structured plan type plus the parse-with-fallback boundary for model output.

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::GenerationError;
use crate::workflow::event::value_text;

pub const FALLBACK_TITLE: &str = "Workflow";
pub const FALLBACK_DESCRIPTION: &str =
    "Automatic analysis failed; steps were taken directly from the recorded events.";
/// Raw event lines used when the model output is unusable.
pub const FALLBACK_STEP_CAP: usize = 10;
pub const TITLE_MAX_WORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: u32,
    pub label: String,
}

/// Titled, described, step-enumerated plan for review before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub title: String,
    pub description: String,
    pub steps: Vec<PlanStep>,
}

impl TaskPlan {
    /// Steps rendered as a numbered task text for the agent.
    pub fn to_task_text(&self) -> String {
        let mut out = self.description.clone();
        for s in &self.steps {
            out.push_str(&format!("\n{}. {}", s.id, s.label));
        }
        out.trim().to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object at the top level")]
    NotAnObject,
}

/// Remove a Markdown code fence (optionally tagged `json`) around the payload.
pub fn strip_code_fence(text: &str) -> &str {
    static RE_OPEN: OnceCell<Regex> = OnceCell::new();
    static RE_CLOSE: OnceCell<Regex> = OnceCell::new();
    let re_open = RE_OPEN.get_or_init(|| Regex::new(r"(?i)^```(?:json)?[ \t]*\r?\n?").unwrap());
    let re_close = RE_CLOSE.get_or_init(|| Regex::new(r"\r?\n?```$").unwrap());

    let mut s = text.trim();
    if let Some(m) = re_open.find(s) {
        s = &s[m.end()..];
    }
    if let Some(m) = re_close.find(s) {
        s = &s[..m.start()];
    }
    s.trim()
}

/// Strict parse after fence stripping; fills absent keys and renumbers steps.
pub fn parse_task_plan(text: &str) -> Result<TaskPlan, PlanParseError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))?;
    let obj = value.as_object().ok_or(PlanParseError::NotAnObject)?;

    let title = obj
        .get("title")
        .map(value_text)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());
    let description = obj.get("description").map(value_text).unwrap_or_default();
    let labels = obj
        .get("steps")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(step_label).collect::<Vec<_>>())
        .unwrap_or_default();

    Ok(TaskPlan {
        title: clamp_words(title.trim(), TITLE_MAX_WORDS),
        description: description.trim().to_string(),
        steps: number_steps(labels),
    })
}

/// Deterministic plan built from raw event lines.
pub fn fallback_plan(raw_lines: &[String]) -> TaskPlan {
    TaskPlan {
        title: FALLBACK_TITLE.to_string(),
        description: FALLBACK_DESCRIPTION.to_string(),
        steps: number_steps(raw_lines.iter().take(FALLBACK_STEP_CAP).cloned().collect()),
    }
}

/// Terminal error boundary: any upstream or parse failure becomes the fallback plan.
pub fn plan_or_fallback(response: Result<String, GenerationError>, raw_lines: &[String]) -> TaskPlan {
    let text = match response {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "plan generation failed; using fallback plan");
            counter!("synth_fallback_total", "mode" => "plan").increment(1);
            return fallback_plan(raw_lines);
        }
    };
    match parse_task_plan(&text) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "model returned an unusable plan; using fallback plan");
            counter!("synth_fallback_total", "mode" => "plan").increment(1);
            fallback_plan(raw_lines)
        }
    }
}

fn step_label(item: &Value) -> Option<String> {
    let label = match item {
        Value::Object(m) => ["label", "description", "action"]
            .iter()
            .find_map(|k| m.get(*k).map(value_text).filter(|s| !s.trim().is_empty()))?,
        Value::String(s) => s.clone(),
        _ => return None,
    };
    let label = label.trim().to_string();
    (!label.is_empty()).then_some(label)
}

fn number_steps(labels: Vec<String>) -> Vec<PlanStep> {
    labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| PlanStep {
            id: (i + 1) as u32,
            label,
        })
        .collect()
}

fn clamp_words(s: &str, max: usize) -> String {
    s.split_whitespace().take(max).collect::<Vec<_>>().join(" ")
}

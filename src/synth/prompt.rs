// src/synth/prompt.rs
//! Prompt templates and the detailed per-event rendering used for plan generation.

use crate::workflow::event::value_text;
use crate::workflow::{Workflow, WorkflowEvent};

pub const TASK_SYSTEM_PROMPT: &str = "You are a task description generator. Given a sequence of user actions recorded from a browser session, generate a clear, concise natural language description of what the user was trying to accomplish.

The description should be actionable and suitable for instructing an AI browser automation agent to perform the same task.

Guidelines:
- Focus on the high-level goal, not individual clicks
- Include specific details like URLs, form field values (if available), and button names
- Use imperative mood (e.g., \"Go to...\", \"Fill in...\", \"Click...\")
- Keep it concise but complete
- If the workflow seems incomplete, describe what was done so far

Output format:
Just the task description, nothing else. No explanations or preamble.";

pub const PLAN_SYSTEM_PROMPT: &str = "You analyze recorded browser workflows and turn them into an editable automation plan.

Respond with a single JSON object and nothing else, using exactly these keys:
{
  \"title\": \"short title, at most 5 words\",
  \"description\": \"one or two sentences describing the overall goal\",
  \"steps\": [{\"id\": 1, \"label\": \"imperative description of one step\"}]
}

Rules:
- Merge low-level events into meaningful steps (e.g. typing into several fields of one form may be one step)
- Keep concrete values such as URLs, search terms and button labels
- Number steps sequentially starting at 1
- Do not wrap the JSON in Markdown";

/// Maximum number of detailed event lines sent in a plan prompt.
pub const PLAN_EVENT_CAP: usize = 50;

/// User message for free-text generation.
pub fn task_user_prompt(start_url: &str, summary: &str) -> String {
    format!(
        "Here is a recorded browser workflow:\n\nStarting URL: {start_url}\n\nActions performed:\n{summary}\n\nGenerate a task description for an AI browser agent to replicate this workflow."
    )
}

/// User message for structured-plan generation.
pub fn plan_user_prompt(workflow: &Workflow, lines: &[String]) -> String {
    let numbered = lines
        .iter()
        .enumerate()
        .map(|(i, l)| format!("{}. {}", i + 1, l))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Recorded workflow '{}'\nStarting URL: {}\n\nEvents:\n{}\n\nReturn the JSON plan.",
        workflow.workflow_id(),
        workflow.start_url(),
        numbered
    )
}

/// Detailed rendering of every event, in order, capped for prompt size.
pub fn detailed_event_lines(workflow: &Workflow) -> Vec<String> {
    workflow
        .events()
        .iter()
        .take(PLAN_EVENT_CAP)
        .map(describe_event_detailed)
        .collect()
}

/// One line per event with as much concrete detail as the record holds.
pub fn describe_event_detailed(ev: &WorkflowEvent) -> String {
    match ev.event_type.as_str() {
        "navigation" | "page_visit" => {
            if ev.title.is_empty() {
                format!("Navigated to {}", ev.url)
            } else {
                format!("Navigated to {} ({})", ev.url, ev.title)
            }
        }
        "click" => {
            let element = first_non_empty(&[ev.data_str("element_type")]).unwrap_or("element".into());
            let target = first_non_empty(&[
                ev.data_str("text"),
                ev.data_str("aria_label"),
                ev.data_str("value"),
                ev.data_str("field_name"),
                ev.data_str("selector"),
            ]);
            match target {
                Some(t) => format!("Clicked {element} '{}'", truncate(&t, 80)),
                None => format!("Clicked {element}"),
            }
        }
        "input" => {
            let field = first_non_empty(&[ev.data_str("field_name"), ev.data_str("selector")])
                .unwrap_or("field".into());
            match first_non_empty(&[ev.data_str("value")]) {
                Some(v) => format!("Entered '{}' into {field}", truncate(&v, 80)),
                None => format!("Typed into {field}"),
            }
        }
        "scroll" => match first_non_empty(&[ev.data_str("scrollY"), ev.data_str("scroll_y")]) {
            Some(y) => format!("Scrolled to position {y}"),
            None => "Scrolled on page".to_string(),
        },
        "keypress" => {
            let key = first_non_empty(&[ev.data_str("key")]).unwrap_or("a key".into());
            format!("Pressed {key}")
        }
        other => {
            let mut parts = Vec::new();
            if !ev.url.is_empty() {
                parts.push(format!("url={}", ev.url));
            }
            if !ev.title.is_empty() {
                parts.push(format!("title={}", ev.title));
            }
            for (k, v) in &ev.data {
                let text = value_text(v);
                if !text.is_empty() {
                    parts.push(format!("{k}={}", truncate(&text, 80)));
                }
            }
            if parts.is_empty() {
                other.to_string()
            } else {
                format!("{other}: {}", parts.join(", "))
            }
        }
    }
}

fn first_non_empty(candidates: &[String]) -> Option<String> {
    candidates.iter().find(|s| !s.trim().is_empty()).cloned()
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

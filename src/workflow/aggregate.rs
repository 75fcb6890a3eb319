// src/workflow/aggregate.rs
//! Workflow aggregation: grouping by workflow id, timestamp ordering and the
//! derived `start_url` / `summary` fields.

use serde::Serialize;

use super::event::WorkflowEvent;
use super::WorkflowError;

/// Maximum number of significant actions rendered into a summary.
pub const SUMMARY_ACTION_CAP: usize = 20;

/// One recorded session. Events are sorted once at construction and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
    workflow_id: String,
    events: Vec<WorkflowEvent>,
}

impl Workflow {
    pub fn new(workflow_id: impl Into<String>, mut events: Vec<WorkflowEvent>) -> Self {
        // stable: equal timestamps keep input order
        events.sort_by_key(|e| e.timestamp);
        Self {
            workflow_id: workflow_id.into(),
            events,
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    /// URL of the first event carrying one; `""` if none does.
    pub fn start_url(&self) -> &str {
        self.events
            .iter()
            .map(|e| e.url.as_str())
            .find(|u| !u.is_empty())
            .unwrap_or("")
    }

    /// Numbered list of the first 20 significant actions.
    pub fn summary(&self) -> String {
        self.events
            .iter()
            .filter(|e| e.is_significant())
            .take(SUMMARY_ACTION_CAP)
            .enumerate()
            .map(|(i, e)| format!("{}. {}", i + 1, e.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Group `(workflow_id, event)` pairs into workflows, keeping the order in
/// which each id first appears.
pub fn group_workflows<I>(rows: I) -> Vec<Workflow>
where
    I: IntoIterator<Item = (String, WorkflowEvent)>,
{
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<WorkflowEvent>> =
        std::collections::HashMap::new();

    for (id, event) in rows {
        groups
            .entry(id.clone())
            .or_insert_with(|| {
                order.push(id);
                Vec::new()
            })
            .push(event);
    }

    order
        .into_iter()
        .filter_map(|id| groups.remove(&id).map(|events| Workflow::new(id, events)))
        .collect()
}

/// Pick a workflow by id, or the first group when no id is given.
pub fn select_workflow(
    workflows: Vec<Workflow>,
    workflow_id: Option<&str>,
) -> Result<Workflow, WorkflowError> {
    if workflows.is_empty() {
        return Err(WorkflowError::NoWorkflows);
    }
    match workflow_id.filter(|id| !id.is_empty()) {
        Some(id) => workflows
            .into_iter()
            .find(|w| w.workflow_id == id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string())),
        None => workflows
            .into_iter()
            .next()
            .ok_or(WorkflowError::NoWorkflows),
    }
}

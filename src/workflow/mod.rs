// src/workflow/mod.rs
pub mod aggregate;
pub mod event;
pub mod loader;
pub mod normalize;

use std::path::PathBuf;

pub use aggregate::{group_workflows, select_workflow, Workflow, SUMMARY_ACTION_CAP};
pub use event::{WorkflowEvent, SIGNIFICANT_EVENT_TYPES};
pub use loader::WorkflowLoader;
pub use normalize::{coerce_timestamp, normalize_event, normalize_value, unflatten, RawEvent};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("CSV file not found: {}", .0.display())]
    CsvNotFound(PathBuf),
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("no workflows found")]
    NoWorkflows,
    #[error("workflow with id '{0}' not found")]
    NotFound(String),
}

// src/workflow/loader.rs
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::aggregate::{group_workflows, select_workflow, Workflow};
use super::normalize::normalize_event;
use super::WorkflowError;

const DEFAULT_WORKFLOW_ID: &str = "default";

/// Reads CSV exports produced by the recording extension.
#[derive(Debug, Clone)]
pub struct WorkflowLoader {
    csv_path: PathBuf,
}

impl WorkflowLoader {
    pub fn new<P: AsRef<Path>>(csv_path: P) -> Result<Self, WorkflowError> {
        let csv_path = csv_path.as_ref().to_path_buf();
        if !csv_path.exists() {
            return Err(WorkflowError::CsvNotFound(csv_path));
        }
        Ok(Self { csv_path })
    }

    pub fn path(&self) -> &Path {
        &self.csv_path
    }

    /// Load every workflow in the file, in order of first appearance.
    pub fn load(&self) -> Result<Vec<Workflow>, WorkflowError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.csv_path)?;
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    skipped += 1;
                    warn!(line = line + 2, error = %e, "skipping malformed CSV row");
                    continue;
                }
            };

            let mut raw = Map::new();
            for (key, value) in headers.iter().zip(record.iter()) {
                raw.insert(key.to_string(), Value::String(value.to_string()));
            }

            let workflow_id = raw
                .get("workflow_id")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_WORKFLOW_ID)
                .to_string();
            rows.push((workflow_id, normalize_event(&raw)));
        }

        let workflows = group_workflows(rows);
        info!(
            path = %self.csv_path.display(),
            workflows = workflows.len(),
            skipped,
            "loaded workflow CSV"
        );
        Ok(workflows)
    }

    /// Load one workflow by id, or the first one in the file.
    pub fn load_single(&self, workflow_id: Option<&str>) -> Result<Workflow, WorkflowError> {
        let wf = select_workflow(self.load()?, workflow_id)?;
        debug!(workflow_id = wf.workflow_id(), events = wf.events().len(), "selected workflow");
        Ok(wf)
    }
}

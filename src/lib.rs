// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod hitl;
pub mod telemetry;
pub mod synth;
pub mod workflow;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::dispatch::{AutomationResult, AutomationRunner};
pub use crate::synth::{Synthesizer, TaskPlan};
pub use crate::workflow::{Workflow, WorkflowEvent, WorkflowLoader};

/// Short anonymized id for task/prompt text in logs (first 6 bytes of SHA-256, hex).
pub fn fingerprint(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

// src/hitl.rs
//! Human-in-the-loop broker: routes an agent's mid-task question to connected
//! operators and waits a bounded time for the reply. On timeout, or with no
//! operator connected, the default answer is returned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_ANSWER: &str =
    "No operator answered in time. Continue with your best judgment.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanQuestion {
    pub question_id: String,
    pub question: String,
    /// Unix millis.
    pub timestamp: i64,
}

#[derive(Clone)]
pub struct HumanLoop {
    pending: Arc<Mutex<PendingMap>>,
    outbound: broadcast::Sender<HumanQuestion>,
    timeout: Duration,
    default_answer: String,
}

impl HumanLoop {
    pub fn new(timeout: Duration) -> Self {
        let (outbound, _) = broadcast::channel(32);
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            outbound,
            timeout,
            default_answer: DEFAULT_ANSWER.to_string(),
        }
    }

    pub fn with_default_answer(mut self, answer: impl Into<String>) -> Self {
        self.default_answer = answer.into();
        self
    }

    /// Operator-side stream of questions.
    pub fn subscribe(&self) -> broadcast::Receiver<HumanQuestion> {
        self.outbound.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Ask the operators; always resolves to some answer.
    ///
    /// The pending entry is released when this future completes or is dropped.
    pub async fn ask(&self, question: &str) -> String {
        counter!("human_loop_questions_total").increment(1);
        let question_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(question_id.clone(), tx);
        let _pending = PendingGuard {
            pending: &self.pending,
            question_id: &question_id,
        };

        let msg = HumanQuestion {
            question_id: question_id.clone(),
            question: question.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };
        if self.outbound.send(msg).is_err() {
            warn!(%question_id, "no operator connected; using default answer");
            return self.default_answer.clone();
        }
        info!(%question_id, "waiting for operator answer");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(_)) => self.default_answer.clone(),
            Err(_) => {
                counter!("human_loop_timeouts_total").increment(1);
                warn!(%question_id, timeout_secs = self.timeout.as_secs(), "operator answer timed out");
                self.default_answer.clone()
            }
        }
    }

    /// Resolve a pending question. Returns false for unknown or expired ids.
    pub fn answer(&self, question_id: &str, answer: impl Into<String>) -> bool {
        match self.lock_pending().remove(question_id) {
            Some(tx) => tx.send(answer.into()).is_ok(),
            None => false,
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingMap> {
        lock(&self.pending)
    }
}

type PendingMap = HashMap<String, oneshot::Sender<String>>;

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes a question from the pending map on every exit path of `ask`,
/// including cancellation of the asking future.
struct PendingGuard<'a> {
    pending: &'a Mutex<PendingMap>,
    question_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(self.question_id);
    }
}

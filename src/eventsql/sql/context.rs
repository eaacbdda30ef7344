//! Per-evaluation context.
//!
//! Every evaluation call takes an explicit context instead of relying on
//! ambient state: it names the owning rule for log lines, selects the
//! projection failure policy, and carries the cancellation handle the
//! runtime can trip from another thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::eventsql::sql::error::{SqlError, SqlResult};

/// What happens when a scalar call fails during projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionPolicy {
    /// The tuple fails with the call error
    #[default]
    Strict,
    /// The failing column becomes null and the error is logged
    Lenient,
}

#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Rule identifier, used as the log target
    pub rule_id: String,
    pub policy: ProjectionPolicy,
    cancelled: Arc<AtomicBool>,
}

impl EvalContext {
    pub fn new(rule_id: impl Into<String>) -> Self {
        EvalContext {
            rule_id: rule_id.into(),
            policy: ProjectionPolicy::Strict,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_policy(mut self, policy: ProjectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Handle the runtime holds to cancel in-flight evaluation.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Polled between expression nodes and between grouped-tuple
    /// iterations.
    pub fn check_cancelled(&self) -> SqlResult<()> {
        if self.is_cancelled() {
            Err(SqlError::execution_error(format!(
                "evaluation cancelled for rule {}",
                self.rule_id
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new("default")
    }
}

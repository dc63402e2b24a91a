//! Command outcome accounting.
//!
//! Every outcome is logged through `tracing`. With the `metrics` feature the
//! same events also increment counters in the globally installed `metrics`
//! recorder:
//!
//! | Counter | Labels |
//! |---|---|
//! | `prevalence_commands_total` | `kernel`, `outcome` |
//! | `prevalence_rollback_markers_total` | `kernel` |
//! | `prevalence_restores_total` | |

use super::config::KernelKind;
use super::error::EngineError;
use tracing::trace;

/// How a command ended, as reported in logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Executed and journaled.
    Committed,
    /// Refused by `prepare`.
    Rejected,
    /// `execute` failed and the model was reconciled.
    Failed,
    /// A lock was not granted in time.
    Timeout,
    /// The engine had to close.
    Fatal,
    /// Any other error, e.g. a result that could not be cloned.
    Error,
}

impl CommandOutcome {
    /// Classifies a command result.
    #[must_use]
    pub fn of<T>(result: &Result<T, EngineError>) -> Self {
        match result {
            Ok(_) => CommandOutcome::Committed,
            Err(EngineError::CommandRejected { .. }) => CommandOutcome::Rejected,
            Err(EngineError::CommandFailed { .. }) => CommandOutcome::Failed,
            Err(EngineError::Timeout(_)) => CommandOutcome::Timeout,
            Err(EngineError::Fatal { .. }) => CommandOutcome::Fatal,
            Err(_) => CommandOutcome::Error,
        }
    }

    /// Lower-case label value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommandOutcome::Committed => "committed",
            CommandOutcome::Rejected => "rejected",
            CommandOutcome::Failed => "failed",
            CommandOutcome::Timeout => "timeout",
            CommandOutcome::Fatal => "fatal",
            CommandOutcome::Error => "error",
        }
    }
}

pub(crate) fn record_command(kernel: KernelKind, outcome: CommandOutcome) {
    trace!(kernel = kernel.as_str(), outcome = outcome.as_str(), "command finished");
    #[cfg(feature = "metrics")]
    metrics::counter!(
        "prevalence_commands_total",
        "kernel" => kernel.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub(crate) fn record_rollback_marker(kernel: KernelKind) {
    #[cfg(feature = "metrics")]
    metrics::counter!("prevalence_rollback_markers_total", "kernel" => kernel.as_str())
        .increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kernel;
}

pub(crate) fn record_restore() {
    #[cfg(feature = "metrics")]
    metrics::counter!("prevalence_restores_total").increment(1);
}

//! Terminal diagnostics for runs that end in FAIL.
//!
//! The lane never edits code. It turns the unresolved gate state into
//! user-visible errors and settles the fallback count.

use figpipe_types::{GateResult, PipelineStatus};

use crate::status::failing_gates;

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionLaneOutcome {
    pub status: PipelineStatus,
    pub iterations: u32,
    pub fallback_count: u32,
    pub errors: Vec<String>,
    pub resolved: bool,
}

/// Diagnose a run's final gate state.
///
/// `attempted_iterations` is the number of accepted patch iterations; when
/// zero the count falls back to the patch budget `min(max_iterations, 2)`.
pub fn run_exception_lane(
    current_status: PipelineStatus,
    gates: &[GateResult],
    max_iterations: u32,
    attempted_iterations: u32,
) -> ExceptionLaneOutcome {
    if current_status != PipelineStatus::Fail {
        return ExceptionLaneOutcome {
            status: current_status,
            iterations: 0,
            fallback_count: 0,
            errors: Vec::new(),
            resolved: true,
        };
    }

    let failing: Vec<&GateResult> = failing_gates(gates).collect();
    if failing.is_empty() {
        tracing::error!("Exception lane entered without failing gates");
        return ExceptionLaneOutcome {
            status: PipelineStatus::Fail,
            iterations: 0,
            fallback_count: 0,
            errors: vec!["Pipeline entered exception lane without failing gates.".to_string()],
            resolved: false,
        };
    }

    let iterations = if attempted_iterations > 0 {
        attempted_iterations
    } else {
        max_iterations.min(2)
    };

    let mut errors = vec!["Exception lane exhausted before reaching a passing gate state.".to_string()];
    errors.extend(failing.iter().map(|g| format!("Unresolved gate: {}", g.gate_name)));
    tracing::warn!(unresolved = failing.len(), iterations, "Run finished in exception lane");

    ExceptionLaneOutcome {
        status: PipelineStatus::Fail,
        iterations,
        fallback_count: iterations,
        errors,
        resolved: false,
    }
}

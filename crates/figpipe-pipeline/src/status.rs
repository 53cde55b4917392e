use figpipe_types::{GateResult, GateStatus, PipelineStatus};

/// Overall status from gate outcomes.
///
/// Any FAIL fails the run; otherwise any WARN or SKIPPED warns; only an
/// all-PASS gate list passes.
pub fn derive_pipeline_status(gates: &[GateResult]) -> PipelineStatus {
    let mut status = PipelineStatus::Pass;
    for gate in gates {
        match gate.status {
            GateStatus::Fail => return PipelineStatus::Fail,
            GateStatus::Warn | GateStatus::Skipped => status = PipelineStatus::Warn,
            GateStatus::Pass => {}
        }
    }
    status
}

/// Gates currently failing, in gate order.
pub fn failing_gates(gates: &[GateResult]) -> impl Iterator<Item = &GateResult> {
    gates.iter().filter(|g| g.status == GateStatus::Fail)
}

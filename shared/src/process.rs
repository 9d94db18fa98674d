//! Production process lifecycle rules
//!
//! PLANNED -> IN_PROGRESS -> COMPLETED, with CANCELLED reachable from either
//! active state. Inputs may be recorded while a process is active, outputs
//! only while it runs.

use rust_decimal::Decimal;

use crate::error::{BomError, BomResult};
use crate::models::{ProcessAction, ProcessOutput, ProcessStatus};

/// Next status for `action`, or the reason the step is refused
pub fn transition(status: ProcessStatus, action: ProcessAction, has_outputs: bool) -> BomResult<ProcessStatus> {
    let refused = || BomError::InvalidTransition {
        status: status.as_str().to_string(),
        action: action.as_str().to_string(),
    };

    match (action, status) {
        (ProcessAction::Start, ProcessStatus::Planned) => Ok(ProcessStatus::InProgress),
        (ProcessAction::Complete, ProcessStatus::InProgress) if has_outputs => Ok(ProcessStatus::Completed),
        (ProcessAction::Complete, ProcessStatus::InProgress) => Err(BomError::validation(
            "outputs",
            "Cannot complete a process with no recorded outputs",
        )),
        (ProcessAction::Cancel, s) if s.is_active() => Ok(ProcessStatus::Cancelled),
        _ => Err(refused()),
    }
}

pub fn ensure_accepts_inputs(status: ProcessStatus) -> BomResult<()> {
    if status.is_active() {
        return Ok(());
    }
    Err(BomError::InvalidTransition {
        status: status.as_str().to_string(),
        action: "add input".to_string(),
    })
}

pub fn ensure_accepts_outputs(status: ProcessStatus) -> BomResult<()> {
    if status == ProcessStatus::InProgress {
        return Ok(());
    }
    Err(BomError::InvalidTransition {
        status: status.as_str().to_string(),
        action: "add output".to_string(),
    })
}

/// Total produced over target, as a percentage. Only completed processes
/// with a positive target have one.
pub fn efficiency(status: ProcessStatus, target: Decimal, outputs: &[ProcessOutput]) -> Option<Decimal> {
    if status != ProcessStatus::Completed || target <= Decimal::ZERO {
        return None;
    }
    let produced: Decimal = outputs.iter().map(|o| o.quantity_produced).sum();
    produced
        .checked_div(target)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
}

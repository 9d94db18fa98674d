//! Production process lifecycle tests
//!
//! - Legal steps: PLANNED -> IN_PROGRESS -> COMPLETED, cancel while active
//! - Every other step is refused with the current status named
//! - Efficiency only for completed processes

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::process::{efficiency, ensure_accepts_inputs, ensure_accepts_outputs, transition};
use shared::{BomError, ProcessAction, ProcessOutput, ProcessStatus};
use uuid::Uuid;

use ProcessAction::*;
use ProcessStatus::*;

const STATUSES: [ProcessStatus; 4] = [Planned, InProgress, Completed, Cancelled];
const ACTIONS: [ProcessAction; 3] = [Start, Complete, Cancel];

fn output(quantity: Decimal) -> ProcessOutput {
    ProcessOutput {
        id: Uuid::new_v4(),
        process_id: Uuid::new_v4(),
        item_id: Uuid::new_v4(),
        quantity_produced: quantity,
        created_at: Utc::now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_cancel_from_either_active_status() {
        assert_eq!(transition(Planned, Cancel, false).unwrap(), Cancelled);
        assert_eq!(transition(InProgress, Cancel, true).unwrap(), Cancelled);
    }

    #[test]
    fn test_start_twice_refused() {
        let err = transition(InProgress, Start, false).unwrap_err();
        assert_eq!(
            err,
            BomError::InvalidTransition {
                status: "IN_PROGRESS".into(),
                action: "start".into(),
            }
        );
    }

    #[test]
    fn test_complete_before_start_refused() {
        assert!(matches!(
            transition(Planned, Complete, true),
            Err(BomError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_complete_without_outputs_refused() {
        let err = transition(InProgress, Complete, false).unwrap_err();
        assert!(matches!(err, BomError::Validation { ref field, .. } if field == "outputs"));
    }

    #[test]
    fn test_finished_processes_are_frozen() {
        for status in [Completed, Cancelled] {
            for action in ACTIONS {
                assert!(
                    matches!(transition(status, action, true), Err(BomError::InvalidTransition { .. })),
                    "{} {} should be refused",
                    action.as_str(),
                    status
                );
            }
        }
    }

    #[test]
    fn test_refusal_message_names_status() {
        let err = transition(Cancelled, Cancel, false).unwrap_err();
        assert_eq!(err.to_string(), "Cannot cancel a process with status CANCELLED");
    }

    #[test]
    fn test_inputs_only_while_active() {
        assert!(ensure_accepts_inputs(Planned).is_ok());
        assert!(ensure_accepts_inputs(InProgress).is_ok());
        assert!(ensure_accepts_inputs(Completed).is_err());
        assert!(ensure_accepts_inputs(Cancelled).is_err());
    }

    #[test]
    fn test_outputs_only_while_running() {
        assert!(ensure_accepts_outputs(Planned).is_err());
        assert!(ensure_accepts_outputs(InProgress).is_ok());
        assert!(ensure_accepts_outputs(Completed).is_err());
    }

    #[test]
    fn test_efficiency_sums_every_output() {
        let outputs = [output(Decimal::new(125, 1)), output(Decimal::new(375, 1))];
        assert_eq!(
            efficiency(Completed, Decimal::from(40), &outputs),
            Some(Decimal::from(125))
        );
    }

    #[test]
    fn test_no_efficiency_for_cancelled() {
        let outputs = [output(Decimal::from(10))];
        assert_eq!(efficiency(Cancelled, Decimal::from(10), &outputs), None);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&InProgress).unwrap(), "\"IN_PROGRESS\"");
        for status in STATUSES {
            assert_eq!(status.as_str().parse::<ProcessStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<ProcessStatus>().is_err());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn status_strategy() -> impl Strategy<Value = ProcessStatus> {
        prop::sample::select(STATUSES.to_vec())
    }

    fn action_strategy() -> impl Strategy<Value = ProcessAction> {
        prop::sample::select(ACTIONS.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any accepted step moves forward and lands in a state that follows the action
        #[test]
        fn prop_accepted_steps_move_forward(
            status in status_strategy(),
            action in action_strategy(),
            has_outputs in any::<bool>(),
        ) {
            match transition(status, action, has_outputs) {
                Ok(next) => {
                    prop_assert!(status.is_active());
                    prop_assert_ne!(next, status);
                    let expected = match action {
                        Start => InProgress,
                        Complete => Completed,
                        Cancel => Cancelled,
                    };
                    prop_assert_eq!(next, expected);
                }
                Err(BomError::InvalidTransition { status: named, .. }) => {
                    prop_assert_eq!(named, status.as_str());
                }
                Err(BomError::Validation { .. }) => {
                    prop_assert_eq!((status, action, has_outputs), (InProgress, Complete, false));
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}

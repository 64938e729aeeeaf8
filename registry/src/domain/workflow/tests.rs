//! Transition table coverage.

use super::*;
use rstest::rstest;

#[rstest]
fn both_tables_pass_verification() {
    assert_eq!(verify_workflow_tables(), Ok(()));
}

#[rstest]
#[case(IntakeStatus::Draft, IntakeStatus::PendingReview)]
#[case(IntakeStatus::PendingReview, IntakeStatus::Classification)]
#[case(IntakeStatus::PendingReview, IntakeStatus::Draft)]
#[case(IntakeStatus::Classification, IntakeStatus::NumberReserved)]
#[case(IntakeStatus::Classification, IntakeStatus::PendingReview)]
#[case(IntakeStatus::NumberReserved, IntakeStatus::Registered)]
#[case(IntakeStatus::Registered, IntakeStatus::Assigned)]
#[case(IntakeStatus::InReview, IntakeStatus::Assigned)]
#[case(IntakeStatus::NeedsClarification, IntakeStatus::InReview)]
#[case(IntakeStatus::ActionTaken, IntakeStatus::Closed)]
#[case(IntakeStatus::AckReceived, IntakeStatus::Closed)]
fn intake_edges_are_permitted(#[case] from: IntakeStatus, #[case] to: IntakeStatus) {
    let result = Status::Intake(from).transition_to(Status::Intake(to));
    assert_eq!(result, Ok(Status::Intake(to)));
}

#[rstest]
#[case(DispatchStatus::PendingReview, DispatchStatus::PendingApproval)]
#[case(DispatchStatus::PendingApproval, DispatchStatus::Draft)]
#[case(DispatchStatus::Approved, DispatchStatus::NumberReserved)]
#[case(DispatchStatus::Registered, DispatchStatus::Dispatched)]
#[case(DispatchStatus::Signed, DispatchStatus::Sealed)]
#[case(DispatchStatus::Dispatched, DispatchStatus::Recalled)]
#[case(DispatchStatus::ReturnedUndelivered, DispatchStatus::Dispatched)]
#[case(DispatchStatus::Recalled, DispatchStatus::Superseded)]
#[case(DispatchStatus::Delivered, DispatchStatus::Closed)]
fn dispatch_edges_are_permitted(#[case] from: DispatchStatus, #[case] to: DispatchStatus) {
    let result = Status::Dispatch(from).transition_to(Status::Dispatch(to));
    assert_eq!(result, Ok(Status::Dispatch(to)));
}

#[rstest]
fn every_missing_intake_edge_is_rejected() {
    for &from in IntakeStatus::ALL {
        for &to in IntakeStatus::ALL {
            if from.successors().contains(&to) {
                continue;
            }
            let err = Status::Intake(from)
                .transition_to(Status::Intake(to))
                .expect_err("edge is not in the table");
            assert_eq!(err.from, Status::Intake(from));
            assert_eq!(err.to, Status::Intake(to));
        }
    }
}

#[rstest]
fn every_missing_dispatch_edge_is_rejected() {
    for &from in DispatchStatus::ALL {
        for &to in DispatchStatus::ALL {
            if !from.successors().contains(&to) {
                assert!(
                    Status::Dispatch(from)
                        .transition_to(Status::Dispatch(to))
                        .is_err()
                );
            }
        }
    }
}

#[rstest]
#[case(Status::Intake(IntakeStatus::Closed))]
#[case(Status::Intake(IntakeStatus::Voided))]
#[case(Status::Dispatch(DispatchStatus::Closed))]
#[case(Status::Dispatch(DispatchStatus::Voided))]
#[case(Status::Dispatch(DispatchStatus::Superseded))]
fn terminal_statuses_have_no_edges(#[case] status: Status) {
    assert!(status.is_terminal());
    assert!(status.successors().is_empty());
}

#[rstest]
fn cross_kind_transitions_are_rejected() {
    let err = Status::Intake(IntakeStatus::Draft)
        .transition_to(Status::Dispatch(DispatchStatus::PendingReview))
        .expect_err("kinds differ");
    assert!(err.to_string().contains("belongs to DISPATCH records"));
}

#[rstest]
#[case(RecordKind::Intake, "NEEDS_CLARIFICATION", Status::Intake(IntakeStatus::NeedsClarification))]
#[case(RecordKind::Dispatch, "RETURNED_UNDELIVERED", Status::Dispatch(DispatchStatus::ReturnedUndelivered))]
fn status_codes_parse_per_kind(#[case] kind: RecordKind, #[case] raw: &str, #[case] expected: Status) {
    assert_eq!(Status::parse(kind, raw), Ok(expected));
    assert_eq!(expected.as_str(), raw);
}

#[rstest]
fn dispatch_only_codes_do_not_parse_as_intake() {
    assert!(Status::parse(RecordKind::Intake, "SEALED").is_err());
}

#[rstest]
fn shared_statuses_resolve_per_kind() {
    assert_eq!(
        Status::shared(RecordKind::Dispatch, SharedStatus::NumberReserved),
        Status::Dispatch(DispatchStatus::NumberReserved)
    );
    assert_eq!(
        Status::shared(RecordKind::Intake, SharedStatus::Voided),
        Status::Intake(IntakeStatus::Voided)
    );
}

#[rstest]
fn transition_error_names_both_statuses() {
    let err = Status::Intake(IntakeStatus::Draft)
        .transition_to(Status::Intake(IntakeStatus::NumberReserved))
        .expect_err("draft cannot reserve");
    assert_eq!(
        err.to_string(),
        "intake record cannot move from DRAFT to NUMBER_RESERVED"
    );
}

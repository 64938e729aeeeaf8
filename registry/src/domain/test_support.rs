//! Shared builders for domain unit tests.

use chrono::{DateTime, TimeZone, Utc};
use mockable::Clock;

use super::actor::Actor;
use super::identifier::{DocumentId, PartyId, RecordId};
use super::record::{CorrespondenceRecord, CreateRecordRequest, ScopeKind};
use super::workflow::{DispatchStatus, IntakeStatus, RecordKind, Status};

/// Fixed clock for deterministic timestamps.
pub(crate) struct FixtureClock(pub DateTime<Utc>);

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<chrono::Local> {
        self.0.with_timezone(&chrono::Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0)
        .single()
        .expect("fixture timestamp is valid")
}

pub(crate) fn actor() -> Actor {
    Actor::try_new("clerk-1", "T1").expect("fixture actor is valid")
}

pub(crate) fn create_request(kind: RecordKind) -> CreateRecordRequest {
    CreateRecordRequest::new(kind, "2081-82", ScopeKind::Municipality, "Request for land survey")
        .with_references(PartyId::random(), DocumentId::random())
}

fn new_record(kind: RecordKind) -> CorrespondenceRecord {
    let validated = create_request(kind).validate().expect("fixture request is valid");
    let actor = actor();
    CorrespondenceRecord::create(
        RecordId::random(),
        actor.tenant_id().clone(),
        actor.user_id().clone(),
        validated,
        now(),
    )
}

/// Walk `record` through `path`, stamping each step.
pub(crate) fn advance(mut record: CorrespondenceRecord, path: &[Status]) -> CorrespondenceRecord {
    for &status in path {
        record.transition_to(status).expect("fixture path is legal");
        record.stamp(now());
    }
    record
}

pub(crate) fn draft_intake() -> CorrespondenceRecord {
    new_record(RecordKind::Intake)
}

pub(crate) fn classified_intake() -> CorrespondenceRecord {
    advance(
        draft_intake(),
        &[
            Status::Intake(IntakeStatus::PendingReview),
            Status::Intake(IntakeStatus::Classification),
        ],
    )
}

pub(crate) fn draft_dispatch() -> CorrespondenceRecord {
    new_record(RecordKind::Dispatch)
}

pub(crate) fn registered_dispatch() -> CorrespondenceRecord {
    let approved = advance(
        draft_dispatch(),
        &[
            Status::Dispatch(DispatchStatus::PendingReview),
            Status::Dispatch(DispatchStatus::PendingApproval),
            Status::Dispatch(DispatchStatus::Approved),
            Status::Dispatch(DispatchStatus::NumberReserved),
        ],
    );
    let mut numbered = approved;
    let number = crate::domain::sequence::RegistrationNumber::issue(&numbered.sequence_key(), 1)
        .expect("positive sequence");
    numbered.assign_number(number).expect("no number yet");
    advance(numbered, &[Status::Dispatch(DispatchStatus::Registered)])
}

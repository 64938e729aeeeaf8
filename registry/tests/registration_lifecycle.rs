//! End-to-end lifecycle coverage over the in-memory adapters.
//!
//! Each test drives the public registration ports the way a boundary layer
//! would and checks the record, its number and its audit trail.

mod support;

use correspondence_registry::domain::ports::{
    MetadataChange, RegistrationCommand, RegistrationQuery, ScanDetails,
    SequenceCounterRepository, SupersedeRequest,
};
use correspondence_registry::domain::{
    Actor, ApprovalDecision, AuditAction, CreateRecordRequest, DispatchChannel,
    DispatchInstruction, DispatchStatus, DocumentId, ErrorCode, IntakeStatus, LifecycleAction,
    RecordKind, ReviewDecision, RoutingInstruction, ScopeKind, SequenceKey, Status,
};
use rstest::{fixture, rstest};
use serde_json::json;
use support::Harness;

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[rstest]
#[tokio::test]
async fn ward_scope_without_a_ward_is_rejected(harness: Harness) {
    let request = CreateRecordRequest::new(
        RecordKind::Intake,
        "2081-82",
        ScopeKind::Ward,
        "Ward boundary dispute",
    )
    .with_references(harness.party_id, harness.document_id);

    let error = harness
        .service
        .create(&harness.actor, request)
        .await
        .expect_err("ward id required");

    assert_eq!(error.code(), ErrorCode::InvalidInput);
    assert_eq!(harness.store.record_count(), 0);
}

#[rstest]
#[tokio::test]
async fn numbering_waits_for_the_eligible_status(harness: Harness) {
    let actor = &harness.actor;
    let created = harness
        .service
        .create(actor, harness.request(RecordKind::Intake))
        .await
        .expect("created");
    let id = created.record.id();
    assert_eq!(created.record.status(), Status::Intake(IntakeStatus::Draft));

    let error = harness
        .service
        .reserve_number(actor, id)
        .await
        .expect_err("draft cannot be numbered");
    assert_eq!(error.code(), ErrorCode::InvalidTransition);

    for action in [
        LifecycleAction::SubmitForReview,
        LifecycleAction::Review(ReviewDecision::Approve),
    ] {
        harness
            .service
            .apply(actor, id, action)
            .await
            .expect("legal step");
    }

    let numbered = harness
        .service
        .reserve_number(actor, id)
        .await
        .expect("numbered");
    assert_eq!(numbered.sequence_number(), Some(1));
    assert_eq!(numbered.formatted_number(), Some("2081-82/MUN/D-00001"));
    assert_eq!(
        numbered.status(),
        Status::Intake(IntakeStatus::NumberReserved)
    );

    let found = harness
        .service
        .get_by_number(actor, "2081-82/MUN/D-00001")
        .await
        .expect("found by number");
    assert_eq!(found.id(), id);
}

#[rstest]
#[tokio::test]
async fn intake_runs_from_draft_to_closed(harness: Harness) {
    let actor = &harness.actor;
    let id = harness
        .service
        .create(actor, harness.request(RecordKind::Intake))
        .await
        .expect("created")
        .record
        .id();

    harness
        .service
        .apply(actor, id, LifecycleAction::SubmitForReview)
        .await
        .expect("submitted");
    harness
        .service
        .apply(actor, id, LifecycleAction::Review(ReviewDecision::Approve))
        .await
        .expect("approved");
    harness
        .service
        .apply(
            actor,
            id,
            LifecycleAction::Classify {
                classification_code: "LAND-SURVEY".to_owned(),
            },
        )
        .await
        .expect("classified");
    harness
        .service
        .direct_register(actor, id)
        .await
        .expect("registered");

    let steps = [
        LifecycleAction::Route(RoutingInstruction {
            unit_id: "SURVEY".to_owned(),
            assignee_id: Some("officer-7".to_owned()),
            priority: None,
            sla_hours: Some(72),
        }),
        LifecycleAction::StartSectionReview,
        LifecycleAction::RequestClarification {
            note: "Plot number missing".to_owned(),
        },
        LifecycleAction::ProvideClarification {
            note: "Plot 114".to_owned(),
        },
        LifecycleAction::Accept,
        LifecycleAction::RecordAction {
            summary: "Survey scheduled".to_owned(),
        },
        LifecycleAction::Close {
            remarks: Some("Done".to_owned()),
        },
    ];
    let mut record = None;
    for action in steps {
        record = Some(
            harness
                .service
                .apply(actor, id, action)
                .await
                .expect("legal step"),
        );
    }
    let closed = record.expect("steps ran");
    assert_eq!(closed.status(), Status::Intake(IntakeStatus::Closed));
    assert_eq!(closed.sequence_number(), Some(1));

    let trail = harness
        .service
        .audit_trail(actor, id)
        .await
        .expect("trail");
    let actions: Vec<_> = trail.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Created,
            AuditAction::SubmittedForReview,
            AuditAction::ReviewApproved,
            AuditAction::Classified,
            AuditAction::DirectlyRegistered,
            AuditAction::Routed,
            AuditAction::SectionReviewStarted,
            AuditAction::ClarificationRequested,
            AuditAction::ClarificationProvided,
            AuditAction::Accepted,
            AuditAction::ActionRecorded,
            AuditAction::Closed,
        ]
    );
    assert_eq!(
        i64::try_from(trail.len()).expect("small trail"),
        closed.version()
    );
    assert!(trail.iter().all(|entry| entry.entity_id == id));

    let error = harness
        .service
        .apply(actor, id, LifecycleAction::SubmitForReview)
        .await
        .expect_err("closed is terminal");
    assert_eq!(error.code(), ErrorCode::InvalidTransition);
}

#[rstest]
#[case(LifecycleAction::SubmitForReview)]
#[case(LifecycleAction::Void { reason: "duplicate".to_owned() })]
#[case(LifecycleAction::Close { remarks: None })]
#[tokio::test]
async fn voided_records_refuse_every_transition(
    harness: Harness,
    #[case] action: LifecycleAction,
) {
    let actor = &harness.actor;
    let id = harness
        .service
        .create(actor, harness.request(RecordKind::Intake))
        .await
        .expect("created")
        .record
        .id();
    harness
        .service
        .apply(
            actor,
            id,
            LifecycleAction::Void {
                reason: "entered twice".to_owned(),
            },
        )
        .await
        .expect("voided");
    let before = harness.store.audit_count();

    let error = harness
        .service
        .apply(actor, id, action)
        .await
        .expect_err("terminal");

    assert_eq!(error.code(), ErrorCode::InvalidTransition);
    assert_eq!(harness.store.audit_count(), before);
}

#[rstest]
#[tokio::test]
async fn returned_dispatch_is_resent_recalled_and_superseded(harness: Harness) {
    let actor = &harness.actor;
    let id = harness
        .service
        .create(actor, harness.request(RecordKind::Dispatch))
        .await
        .expect("created")
        .record
        .id();

    for action in [
        LifecycleAction::SubmitForReview,
        LifecycleAction::Review(ReviewDecision::Approve),
        LifecycleAction::ApprovalDecision(ApprovalDecision::Approve),
    ] {
        harness
            .service
            .apply(actor, id, action)
            .await
            .expect("legal step");
    }
    let registered = harness
        .service
        .direct_register(actor, id)
        .await
        .expect("registered");
    assert_eq!(registered.formatted_number(), Some("2081-82/MUN/C-00001"));

    let post = || {
        LifecycleAction::Dispatch(DispatchInstruction {
            channel: DispatchChannel::Post,
            tracking_reference: Some("RR123".to_owned()),
        })
    };
    harness
        .service
        .apply(actor, id, post())
        .await
        .expect("dispatched");
    harness
        .service
        .apply(
            actor,
            id,
            LifecycleAction::MarkReturned {
                reason: "addressee moved".to_owned(),
            },
        )
        .await
        .expect("returned");
    let resent = harness
        .service
        .apply(actor, id, post())
        .await
        .expect("resent");
    assert_eq!(resent.dispatch().map(|details| details.attempts), Some(2));

    harness
        .service
        .apply(
            actor,
            id,
            LifecycleAction::Recall {
                reason: "wrong enclosure".to_owned(),
            },
        )
        .await
        .expect("recalled");

    let superseded = harness
        .service
        .supersede(
            actor,
            id,
            SupersedeRequest {
                reason: "corrected enclosure".to_owned(),
                subject: None,
                successor_id: None,
            },
        )
        .await
        .expect("superseded");

    assert_eq!(
        superseded.retired.status(),
        Status::Dispatch(DispatchStatus::Superseded)
    );
    assert_eq!(
        superseded.successor.status(),
        Status::Dispatch(DispatchStatus::Draft)
    );
    assert_eq!(superseded.successor.supersedes_id(), Some(id));
    assert_eq!(superseded.successor.registration_number(), None);
    assert_eq!(superseded.retired.formatted_number(), Some("2081-82/MUN/C-00001"));

    let trail = harness
        .service
        .audit_trail(actor, superseded.successor.id())
        .await
        .expect("successor trail");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::CreatedAsSuccessor);
}

#[rstest]
#[tokio::test]
async fn metadata_and_scans_are_audited(harness: Harness) {
    let actor = &harness.actor;
    let id = harness
        .service
        .create(actor, harness.request(RecordKind::Intake))
        .await
        .expect("created")
        .record
        .id();

    let mut set = serde_json::Map::new();
    set.insert("language".to_owned(), json!("ne"));
    harness
        .service
        .annotate_metadata(
            actor,
            id,
            MetadataChange {
                set,
                remove: Vec::new(),
            },
        )
        .await
        .expect("annotated");

    let scanned = harness
        .service
        .record_scan(
            actor,
            id,
            ScanDetails {
                document_id: DocumentId::random(),
                page_count: Some(3),
                checksum: Some("sha256:abc".to_owned()),
            },
        )
        .await
        .expect("scan recorded");

    assert_eq!(scanned.metadata()["language"], "ne");
    assert_eq!(scanned.metadata()["scans"][0]["pageCount"], 3);

    let trail = harness
        .service
        .audit_trail(actor, id)
        .await
        .expect("trail");
    let actions: Vec<_> = trail.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Created,
            AuditAction::MetadataUpdated,
            AuditAction::ScanRecorded,
        ]
    );
}

#[rstest]
#[tokio::test]
async fn failed_writes_leave_no_trace(harness: Harness) {
    let actor = &harness.actor;
    let id = harness
        .service
        .create(actor, harness.request(RecordKind::Intake))
        .await
        .expect("created")
        .record
        .id();
    for action in [
        LifecycleAction::SubmitForReview,
        LifecycleAction::Review(ReviewDecision::Approve),
    ] {
        harness
            .service
            .apply(actor, id, action)
            .await
            .expect("legal step");
    }
    let record = harness.service.get(actor, id).await.expect("found");
    let key: SequenceKey = record.sequence_key();
    let audit_before = harness.store.audit_count();

    harness.store.reject_writes(true);
    let error = harness
        .service
        .reserve_number(actor, id)
        .await
        .expect_err("storage refuses");
    assert_eq!(error.code(), ErrorCode::Internal);
    assert_eq!(harness.store.audit_count(), audit_before);
    assert_eq!(
        harness.store.current(&key).await.expect("counter readable"),
        None
    );
    let unchanged = harness.service.get(actor, id).await.expect("found");
    assert_eq!(unchanged, record);

    harness.store.reject_writes(false);
    let numbered = harness
        .service
        .reserve_number(actor, id)
        .await
        .expect("numbered after recovery");
    assert_eq!(numbered.sequence_number(), Some(1));
}

#[rstest]
#[tokio::test]
async fn records_are_invisible_to_other_tenants(harness: Harness) {
    let id = harness
        .service
        .create(&harness.actor, harness.request(RecordKind::Intake))
        .await
        .expect("created")
        .record
        .id();
    let outsider = Actor::try_new("clerk-9", "T2").expect("valid actor");

    let error = harness
        .service
        .get(&outsider, id)
        .await
        .expect_err("hidden");
    assert_eq!(error.code(), ErrorCode::NotFound);

    let error = harness
        .service
        .apply(&outsider, id, LifecycleAction::SubmitForReview)
        .await
        .expect_err("hidden");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn intake_records_are_superseded_through_metadata(harness: Harness) {
    let actor = &harness.actor;
    let original = harness
        .service
        .create(actor, harness.request(RecordKind::Intake))
        .await
        .expect("created")
        .record;
    let replacement = harness
        .service
        .create(actor, harness.request(RecordKind::Intake))
        .await
        .expect("created")
        .record;
    let request = SupersedeRequest {
        reason: "entered twice".to_owned(),
        subject: None,
        successor_id: Some(replacement.id()),
    };

    let superseded = harness
        .service
        .supersede(actor, original.id(), request.clone())
        .await
        .expect("superseded");

    assert_eq!(superseded.retired.status(), original.status());
    assert_eq!(superseded.retired.version(), original.version() + 1);
    assert_eq!(superseded.successor.id(), replacement.id());
    let metadata = superseded.retired.metadata();
    assert_eq!(metadata["superseded"], json!(true));
    assert_eq!(metadata["superseded_by"], json!(replacement.id()));
    assert_eq!(metadata["superseded_reason"], json!("entered twice"));

    let trail = harness
        .service
        .audit_trail(actor, original.id())
        .await
        .expect("trail");
    let actions: Vec<AuditAction> = trail.iter().map(|entry| entry.action).collect();
    assert_eq!(actions, [AuditAction::Created, AuditAction::Superseded]);

    let error = harness
        .service
        .supersede(actor, original.id(), request)
        .await
        .expect_err("already superseded");
    assert_eq!(error.code(), ErrorCode::InvalidTransition);
    assert_eq!(harness.store.audit_count(), 3);
}

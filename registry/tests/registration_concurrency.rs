//! Concurrency guarantees of creation, numbering and lifecycle writes.
//!
//! Tasks are spawned on a multi-threaded runtime so that calls genuinely
//! overlap inside the adapters.

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use correspondence_registry::domain::ports::{
    RecordRepository, RegistrationCommand, SequenceCounterRepository,
};
use correspondence_registry::domain::{
    ApprovalDecision, AuditAction, ErrorCode, FiscalYearId, LifecycleAction, RecordKind,
    ReviewDecision, Scope, ScopeKind, SequenceAllocator, SequenceKey, TenantId,
};
use correspondence_registry::outbound::memory::InMemoryRegistry;
use futures::future::join_all;
use rstest::rstest;
use support::Harness;

fn ward_key() -> SequenceKey {
    SequenceKey::new(
        TenantId::new("T1").expect("tenant"),
        RecordKind::Intake,
        FiscalYearId::new("2081-82").expect("fiscal year"),
        Scope::resolve(ScopeKind::Ward, Some("5")).expect("ward scope"),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_share_out_a_contiguous_block() {
    let key = ward_key();
    let store = Arc::new(InMemoryRegistry::default().with_counter(key.clone(), 10));
    let allocator = SequenceAllocator::new(store);

    let tasks = (0..50).map(|_| {
        let allocator = allocator.clone();
        let key = key.clone();
        tokio::spawn(async move { allocator.reserve_next(&key).await })
    });
    let issued: Vec<i64> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| {
            joined
                .expect("task completed")
                .expect("number issued")
                .sequence_number()
        })
        .collect();

    let unique: BTreeSet<i64> = issued.iter().copied().collect();
    assert_eq!(issued.len(), 50);
    assert_eq!(unique, (11..=60).collect::<BTreeSet<i64>>());
    assert_eq!(
        allocator.last_issued(&key).await.expect("readable"),
        Some(60)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_with_one_key_yield_one_record() {
    let harness = Harness::new();

    let tasks = (0..8).map(|_| {
        let service = harness.service.clone();
        let actor = harness.actor.clone();
        let request = harness
            .request(RecordKind::Intake)
            .with_idempotency_key("K1");
        tokio::spawn(async move { service.create(&actor, request).await })
    });
    let created: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completed").expect("created"))
        .collect();

    let ids: BTreeSet<_> = created.iter().map(|outcome| outcome.record.id()).collect();
    assert_eq!(ids.len(), 1, "every caller sees the same record");
    assert_eq!(
        created.iter().filter(|outcome| !outcome.replayed).count(),
        1,
        "exactly one caller inserted"
    );
    assert_eq!(harness.store.record_count(), 1);
    assert_eq!(harness.store.audit_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_numbering_of_many_records_never_repeats() {
    let harness = Harness::new();
    let mut ids = Vec::new();
    for _ in 0..20 {
        let id = harness
            .service
            .create(&harness.actor, harness.request(RecordKind::Dispatch))
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
                .apply(&harness.actor, id, action)
                .await
                .expect("legal step");
        }
        ids.push(id);
    }

    let tasks = ids.iter().map(|&id| {
        let service = harness.service.clone();
        let actor = harness.actor.clone();
        tokio::spawn(async move { service.reserve_number(&actor, id).await })
    });
    let numbered: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completed").expect("numbered"))
        .collect();

    let sequences: BTreeSet<i64> = numbered
        .iter()
        .filter_map(|record| record.sequence_number())
        .collect();
    let formatted: BTreeSet<String> = numbered
        .iter()
        .filter_map(|record| record.formatted_number().map(str::to_owned))
        .collect();
    assert_eq!(sequences, (1..=20).collect::<BTreeSet<i64>>());
    assert_eq!(formatted.len(), 20);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_writers_on_one_record_commit_once() {
    let harness = Harness::new();
    let id = harness
        .service
        .create(&harness.actor, harness.request(RecordKind::Intake))
        .await
        .expect("created")
        .record
        .id();

    let tasks = (0..10).map(|_| {
        let service = harness.service.clone();
        let actor = harness.actor.clone();
        tokio::spawn(async move {
            service
                .apply(&actor, id, LifecycleAction::SubmitForReview)
                .await
        })
    });
    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completed"))
        .collect();

    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1);
    for outcome in &outcomes {
        if let Err(error) = outcome {
            assert!(
                matches!(
                    error.code(),
                    ErrorCode::Conflict | ErrorCode::InvalidTransition
                ),
                "losers see a conflict or the moved status, got {error:?}"
            );
        }
    }

    let trail = harness
        .store
        .audit_trail(harness.actor.tenant_id(), id)
        .await
        .expect("trail");
    let submissions = trail
        .iter()
        .filter(|entry| entry.action == AuditAction::SubmittedForReview)
        .count();
    assert_eq!(submissions, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_reservations_on_one_record_allocate_once() {
    let harness = Harness::new();
    let id = harness
        .service
        .create(&harness.actor, harness.request(RecordKind::Intake))
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
            .apply(&harness.actor, id, action)
            .await
            .expect("legal step");
    }

    let tasks = (0..16).map(|_| {
        let service = harness.service.clone();
        let actor = harness.actor.clone();
        tokio::spawn(async move { service.reserve_number(&actor, id).await })
    });
    let numbered: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completed").expect("numbered"))
        .collect();

    assert!(
        numbered
            .iter()
            .all(|record| record.formatted_number() == Some("2081-82/MUN/D-00001"))
    );
    let key = numbered
        .first()
        .map(|record| record.sequence_key())
        .expect("at least one reservation");
    assert_eq!(
        SequenceCounterRepository::current(harness.store.as_ref(), &key)
            .await
            .expect("readable"),
        Some(1)
    );

    let trail = harness
        .store
        .audit_trail(harness.actor.tenant_id(), id)
        .await
        .expect("trail");
    let reservations = trail
        .iter()
        .filter(|entry| entry.action == AuditAction::NumberReserved)
        .count();
    assert_eq!(reservations, 1);
}

//! In-process adapters for tests and single-node embedding.
//!
//! [`InMemoryRegistry`] keeps records, counters and audit entries behind one
//! mutex, so every port call is a single critical section: a write either
//! applies completely or leaves the tables untouched, which mirrors the
//! transactional guarantees of the PostgreSQL adapter.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{
    InsertOutcome, NumberReservation, RecordInsert, RecordRepository, RecordRepositoryError,
    RecordUpdate, ReferenceDirectory, ReferenceDirectoryError, SequenceCounterRepository,
    SequenceCounterRepositoryError, SupersessionWrite,
};
use crate::domain::sequence::next_value;
use crate::domain::{
    AuditEntry, CorrespondenceRecord, DocumentId, IdempotencyKey, PartyId, RecordId, SequenceKey,
    TenantId,
};

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<RecordId, CorrespondenceRecord>,
    idempotency: HashMap<(TenantId, IdempotencyKey), RecordId>,
    numbers: HashMap<(TenantId, String), RecordId>,
    counters: HashMap<SequenceKey, i64>,
    audit: Vec<AuditEntry>,
}

impl Tables {
    fn tenant_record(&self, tenant_id: &TenantId, id: RecordId) -> Option<&CorrespondenceRecord> {
        self.records
            .get(&id)
            .filter(|record| record.tenant_id() == tenant_id)
    }

    /// Check that `update` may replace the stored record.
    fn check_update(&self, update: &RecordUpdate) -> Result<(), RecordRepositoryError> {
        let record = &update.record;
        let stored = self
            .tenant_record(record.tenant_id(), record.id())
            .ok_or_else(|| RecordRepositoryError::missing(record.id().to_string()))?;
        if stored.version() != update.expected_version {
            return Err(RecordRepositoryError::version_conflict(
                record.id().to_string(),
                update.expected_version,
            ));
        }
        self.check_number(stored, record)
    }

    fn check_number(
        &self,
        stored: &CorrespondenceRecord,
        record: &CorrespondenceRecord,
    ) -> Result<(), RecordRepositoryError> {
        match (stored.registration_number(), record.registration_number()) {
            (Some(held), Some(next)) if held == next => Ok(()),
            (Some(held), _) => Err(RecordRepositoryError::query(format!(
                "registration number {held} of record {} cannot change",
                record.id()
            ))),
            (None, Some(next)) => {
                let slot = (record.tenant_id().clone(), next.formatted_number().to_owned());
                match self.numbers.get(&slot) {
                    Some(holder) if *holder != record.id() => {
                        Err(RecordRepositoryError::duplicate_number(next.to_string()))
                    }
                    _ => Ok(()),
                }
            }
            (None, None) => Ok(()),
        }
    }

    fn store(&mut self, record: CorrespondenceRecord, audit: AuditEntry) -> CorrespondenceRecord {
        if let Some(key) = record.idempotency_key() {
            self.idempotency
                .insert((record.tenant_id().clone(), key.clone()), record.id());
        }
        if let Some(number) = record.formatted_number() {
            self.numbers
                .insert((record.tenant_id().clone(), number.to_owned()), record.id());
        }
        self.audit.push(audit);
        self.records.insert(record.id(), record.clone());
        record
    }
}

/// Record store and sequence counters held in process memory.
///
/// # Examples
/// ```
/// use correspondence_registry::outbound::memory::InMemoryRegistry;
///
/// let registry = InMemoryRegistry::default();
/// assert_eq!(registry.record_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    tables: Mutex<Tables>,
    reject_writes: AtomicBool,
}

impl InMemoryRegistry {
    /// Seed the counter for `key` with its last issued value.
    #[must_use]
    pub fn with_counter(self, key: SequenceKey, last_issued: i64) -> Self {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .counters
            .insert(key, last_issued);
        self
    }

    /// Make every subsequent write fail before anything is applied.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Number of stored records across tenants.
    pub fn record_count(&self) -> usize {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    /// Number of audit entries across tenants.
    pub fn audit_count(&self) -> usize {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .audit
            .len()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, String> {
        self.tables
            .lock()
            .map_err(|_| "in-memory registry lock poisoned".to_owned())
    }

    fn check_writable(&self) -> Result<(), RecordRepositoryError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(RecordRepositoryError::query("audit entry could not be written"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordRepository for InMemoryRegistry {
    async fn find(
        &self,
        tenant_id: &TenantId,
        id: RecordId,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        let tables = self.tables().map_err(RecordRepositoryError::query)?;
        Ok(tables.tenant_record(tenant_id, id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &IdempotencyKey,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        let tables = self.tables().map_err(RecordRepositoryError::query)?;
        Ok(tables
            .idempotency
            .get(&(tenant_id.clone(), key.clone()))
            .and_then(|id| tables.tenant_record(tenant_id, *id))
            .cloned())
    }

    async fn find_by_number(
        &self,
        tenant_id: &TenantId,
        formatted_number: &str,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        let tables = self.tables().map_err(RecordRepositoryError::query)?;
        Ok(tables
            .numbers
            .get(&(tenant_id.clone(), formatted_number.to_owned()))
            .and_then(|id| tables.tenant_record(tenant_id, *id))
            .cloned())
    }

    async fn insert(&self, write: RecordInsert) -> Result<InsertOutcome, RecordRepositoryError> {
        let mut tables = self.tables().map_err(RecordRepositoryError::query)?;
        let RecordInsert { record, audit } = write;

        if let Some(key) = record.idempotency_key() {
            let slot = (record.tenant_id().clone(), key.clone());
            if let Some(existing) = tables
                .idempotency
                .get(&slot)
                .and_then(|id| tables.records.get(id))
            {
                return Ok(InsertOutcome::Existing(existing.clone()));
            }
        }
        if tables.records.contains_key(&record.id()) {
            return Err(RecordRepositoryError::query(format!(
                "record {} already exists",
                record.id()
            )));
        }
        self.check_writable()?;
        Ok(InsertOutcome::Inserted(tables.store(record, audit)))
    }

    async fn update(
        &self,
        write: RecordUpdate,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError> {
        let mut tables = self.tables().map_err(RecordRepositoryError::query)?;
        tables.check_update(&write)?;
        self.check_writable()?;
        Ok(tables.store(write.record, write.audit))
    }

    async fn reserve_number(
        &self,
        write: NumberReservation,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError> {
        let mut tables = self.tables().map_err(RecordRepositoryError::query)?;
        let record_id = write.record_id();
        let stored = tables
            .tenant_record(write.tenant_id(), record_id)
            .ok_or_else(|| RecordRepositoryError::missing(record_id.to_string()))?;
        if stored.version() != write.expected_version() {
            return Err(RecordRepositoryError::version_conflict(
                record_id.to_string(),
                write.expected_version(),
            ));
        }
        let stored = stored.clone();

        let key = write.key();
        let last = tables.counters.get(&key).copied().unwrap_or(0);
        let value = next_value(last)
            .map_err(|_| RecordRepositoryError::query(format!("sequence exhausted for {key}")))?;
        let (record, audit) = write
            .complete(value)
            .map_err(|err| RecordRepositoryError::corrupt(err.to_string()))?;
        tables.check_number(&stored, &record)?;
        self.check_writable()?;

        tables.counters.insert(key, value);
        Ok(tables.store(record, audit))
    }

    async fn supersede(
        &self,
        write: SupersessionWrite,
    ) -> Result<(CorrespondenceRecord, CorrespondenceRecord), RecordRepositoryError> {
        let mut tables = self.tables().map_err(RecordRepositoryError::query)?;
        let SupersessionWrite { retired, successor } = write;
        tables.check_update(&retired)?;
        if tables.records.contains_key(&successor.record.id()) {
            return Err(RecordRepositoryError::query(format!(
                "record {} already exists",
                successor.record.id()
            )));
        }
        self.check_writable()?;

        let retired = tables.store(retired.record, retired.audit);
        let successor = tables.store(successor.record, successor.audit);
        Ok((retired, successor))
    }

    async fn audit_trail(
        &self,
        tenant_id: &TenantId,
        id: RecordId,
    ) -> Result<Vec<AuditEntry>, RecordRepositoryError> {
        let tables = self.tables().map_err(RecordRepositoryError::query)?;
        let mut entries: Vec<AuditEntry> = tables
            .audit
            .iter()
            .filter(|entry| entry.entity_id == id && &entry.tenant_id == tenant_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.recorded_at);
        Ok(entries)
    }
}

#[async_trait]
impl SequenceCounterRepository for InMemoryRegistry {
    async fn advance(&self, key: &SequenceKey) -> Result<i64, SequenceCounterRepositoryError> {
        let mut tables = self
            .tables()
            .map_err(SequenceCounterRepositoryError::query)?;
        let last = tables.counters.get(key).copied().unwrap_or(0);
        let value = next_value(last)
            .map_err(|_| SequenceCounterRepositoryError::exhausted(key.to_string()))?;
        tables.counters.insert(key.clone(), value);
        Ok(value)
    }

    async fn current(
        &self,
        key: &SequenceKey,
    ) -> Result<Option<i64>, SequenceCounterRepositoryError> {
        let tables = self
            .tables()
            .map_err(SequenceCounterRepositoryError::query)?;
        Ok(tables.counters.get(key).copied())
    }
}

/// Reference directory backed by explicit registrations.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReferenceDirectory {
    parties: HashSet<(TenantId, PartyId)>,
    documents: HashSet<(TenantId, DocumentId)>,
}

impl InMemoryReferenceDirectory {
    /// Register a party for `tenant_id`.
    #[must_use]
    pub fn with_party(mut self, tenant_id: TenantId, party_id: PartyId) -> Self {
        self.parties.insert((tenant_id, party_id));
        self
    }

    /// Register a document for `tenant_id`.
    #[must_use]
    pub fn with_document(mut self, tenant_id: TenantId, document_id: DocumentId) -> Self {
        self.documents.insert((tenant_id, document_id));
        self
    }
}

#[async_trait]
impl ReferenceDirectory for InMemoryReferenceDirectory {
    async fn party_exists(
        &self,
        tenant_id: &TenantId,
        party_id: PartyId,
    ) -> Result<bool, ReferenceDirectoryError> {
        Ok(self.parties.contains(&(tenant_id.clone(), party_id)))
    }

    async fn document_exists(
        &self,
        tenant_id: &TenantId,
        document_id: DocumentId,
    ) -> Result<bool, ReferenceDirectoryError> {
        Ok(self.documents.contains(&(tenant_id.clone(), document_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::{draft_intake, now};
    use crate::domain::{AuditAction, FiscalYearId, RecordKind, Scope};
    use rstest::{fixture, rstest};
    use uuid::Uuid;

    #[fixture]
    fn key() -> SequenceKey {
        SequenceKey::new(
            TenantId::new("T1").expect("tenant"),
            RecordKind::Intake,
            FiscalYearId::new("2081-82").expect("fiscal year"),
            Scope::Municipality,
        )
    }

    fn created_entry(record: &CorrespondenceRecord) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            entity_type: record.kind(),
            entity_id: record.id(),
            action: AuditAction::Created,
            performed_by: record.created_by().clone(),
            changes: serde_json::json!({ "delta": {} }),
            tenant_id: record.tenant_id().clone(),
            recorded_at: now(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn counters_start_at_one_and_resume_from_seed(key: SequenceKey) {
        let fresh = InMemoryRegistry::default();
        assert_eq!(fresh.advance(&key).await.expect("advances"), 1);

        let seeded = InMemoryRegistry::default().with_counter(key.clone(), 10);
        assert_eq!(seeded.advance(&key).await.expect("advances"), 11);
        assert_eq!(seeded.current(&key).await.expect("reads"), Some(11));
    }

    #[rstest]
    #[tokio::test]
    async fn exhausted_counters_fail(key: SequenceKey) {
        let registry = InMemoryRegistry::default().with_counter(key.clone(), i64::MAX);
        let err = registry.advance(&key).await.expect_err("overflow");
        assert!(matches!(err, SequenceCounterRepositoryError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn records_are_invisible_to_other_tenants() {
        let registry = InMemoryRegistry::default();
        let record = draft_intake();
        let audit = created_entry(&record);
        registry
            .insert(RecordInsert {
                record: record.clone(),
                audit,
            })
            .await
            .expect("inserts");

        let other = TenantId::new("T2").expect("tenant");
        assert!(registry.find(&other, record.id()).await.expect("reads").is_none());
        assert!(
            registry
                .find(record.tenant_id(), record.id())
                .await
                .expect("reads")
                .is_some()
        );
    }

    #[tokio::test]
    async fn rejected_writes_leave_no_trace() {
        let registry = InMemoryRegistry::default();
        registry.reject_writes(true);
        let record = draft_intake();
        let audit = created_entry(&record);

        let result = registry.insert(RecordInsert { record, audit }).await;
        assert!(result.is_err());
        assert_eq!(registry.record_count(), 0);
        assert_eq!(registry.audit_count(), 0);
    }

    #[tokio::test]
    async fn stale_versions_are_rejected() {
        let registry = InMemoryRegistry::default();
        let record = draft_intake();
        let audit = created_entry(&record);
        registry
            .insert(RecordInsert {
                record: record.clone(),
                audit: audit.clone(),
            })
            .await
            .expect("inserts");

        let err = registry
            .update(RecordUpdate {
                record,
                expected_version: 5,
                audit,
            })
            .await
            .expect_err("version 5 is stale");
        assert!(matches!(err, RecordRepositoryError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn references_resolve_per_tenant() {
        let tenant = TenantId::new("T1").expect("tenant");
        let party = PartyId::random();
        let directory = InMemoryReferenceDirectory::default().with_party(tenant.clone(), party);

        assert!(directory.party_exists(&tenant, party).await.expect("checks"));
        let other = TenantId::new("T2").expect("tenant");
        assert!(!directory.party_exists(&other, party).await.expect("checks"));
    }
}

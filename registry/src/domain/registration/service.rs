//! Registration service implementing the driving ports.
//!
//! Every mutation follows the same shape: load the tenant-scoped record,
//! apply the change to a copy, stamp the next version, complete the audit
//! entry against the copy, and hand both to the store in one write guarded
//! by the version that was read.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::domain::actor::Actor;
use crate::domain::audit::{AuditAction, AuditDraft, AuditEntry};
use crate::domain::error::{DomainError, ErrorCode};
use crate::domain::idempotency::IdempotencyGuard;
use crate::domain::identifier::{RecordId, TenantId};
use crate::domain::ports::{
    CreatedRecord, InsertOutcome, MetadataChange, NumberReservation, RecordInsert,
    RecordRepository, RecordRepositoryError, RecordUpdate, ReferenceDirectory,
    ReferenceDirectoryError, RegistrationCommand, RegistrationQuery, ScanDetails,
    SupersedeRequest, SupersededRecord, SupersessionWrite,
};
use crate::domain::record::{
    CorrespondenceRecord, CreateRecordRequest, SUBJECT_MAX, ValidatedCreate,
};
use crate::domain::workflow::{DispatchStatus, RecordKind, SharedStatus, Status};

use super::action::LifecycleAction;

/// Metadata key under which scanned copies are listed.
const SCANS_KEY: &str = "scans";

const SUPERSEDED_KEY: &str = "superseded";
const SUPERSEDED_BY_KEY: &str = "superseded_by";
const SUPERSEDED_AT_KEY: &str = "superseded_at";
const SUPERSEDED_REASON_KEY: &str = "superseded_reason";

/// Correspondence registration service.
pub struct RegistrationService<R, D> {
    records: Arc<R>,
    references: Arc<D>,
    idempotency: IdempotencyGuard<R>,
    clock: Arc<dyn Clock>,
}

impl<R, D> Clone for RegistrationService<R, D> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            references: Arc::clone(&self.references),
            idempotency: self.idempotency.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R, D> RegistrationService<R, D>
where
    R: RecordRepository,
    D: ReferenceDirectory,
{
    /// Create a service over the given stores.
    pub fn new(records: Arc<R>, references: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            idempotency: IdempotencyGuard::new(Arc::clone(&records)),
            records,
            references,
            clock,
        }
    }

    async fn load(&self, tenant_id: &TenantId, id: RecordId) -> Result<CorrespondenceRecord, DomainError> {
        self.records
            .find(tenant_id, id)
            .await
            .map_err(map_record_error)?
            .ok_or_else(|| record_not_found(id))
    }

    async fn ensure_references(
        &self,
        tenant_id: &TenantId,
        request: &ValidatedCreate,
    ) -> Result<(), DomainError> {
        let party_exists = self
            .references
            .party_exists(tenant_id, request.party_id)
            .await
            .map_err(map_reference_error)?;
        if !party_exists {
            return Err(DomainError::not_found(format!("party {} not found", request.party_id))
                .with_details(json!({ "field": "partyId" })));
        }
        let document_exists = self
            .references
            .document_exists(tenant_id, request.primary_document_id)
            .await
            .map_err(map_reference_error)?;
        if !document_exists {
            return Err(DomainError::not_found(format!(
                "document {} not found",
                request.primary_document_id
            ))
            .with_details(json!({ "field": "primaryDocumentId" })));
        }
        Ok(())
    }

    /// Stamp `record`, audit it against `before`, and write it.
    async fn commit(
        &self,
        actor: &Actor,
        before: &CorrespondenceRecord,
        mut record: CorrespondenceRecord,
        action: AuditAction,
        context: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<CorrespondenceRecord, DomainError> {
        record.stamp(now);
        let audit = AuditDraft::new(action, actor, Some(before), now)?
            .with_context(context)
            .complete(&record)?;
        let stored = self
            .records
            .update(RecordUpdate {
                record,
                expected_version: before.version(),
                audit,
            })
            .await
            .map_err(map_record_error)?;
        info!(
            record_id = %stored.id(),
            tenant_id = %stored.tenant_id(),
            action = %action,
            status = %stored.status(),
            version = stored.version(),
            "record updated"
        );
        Ok(stored)
    }

    /// Point an intake record at the intake record that replaces it.
    ///
    /// The status is left alone; the link lives in the metadata object.
    async fn link_intake_successor(
        &self,
        actor: &Actor,
        before: CorrespondenceRecord,
        successor_id: RecordId,
        reason: String,
    ) -> Result<SupersededRecord, DomainError> {
        let id = before.id();
        if successor_id == id {
            return Err(DomainError::invalid_input("a record cannot supersede itself")
                .with_details(json!({ "field": "successorId" })));
        }
        if before.status().is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "{} record in status {} can no longer change",
                before.kind(),
                before.status()
            ))
            .with_details(json!({ "status": before.status().as_str() })));
        }
        if before.metadata().get(SUPERSEDED_KEY) == Some(&Value::Bool(true)) {
            return Err(DomainError::invalid_transition(format!(
                "record {id} is already superseded"
            ))
            .with_details(json!({ "supersededBy": before.metadata().get(SUPERSEDED_BY_KEY) })));
        }

        let successor = self.load(actor.tenant_id(), successor_id).await?;
        if successor.kind() != RecordKind::Intake {
            return Err(DomainError::invalid_input(
                "an intake record can only be superseded by another intake record",
            )
            .with_details(json!({ "field": "successorId", "kind": successor.kind().as_str() })));
        }

        let now = self.clock.utc();
        let mut metadata = before.metadata().clone();
        metadata.insert(SUPERSEDED_KEY.to_owned(), Value::Bool(true));
        metadata.insert(SUPERSEDED_BY_KEY.to_owned(), json!(successor_id));
        metadata.insert(SUPERSEDED_AT_KEY.to_owned(), json!(now));
        metadata.insert(SUPERSEDED_REASON_KEY.to_owned(), json!(reason));
        let mut record = before.clone();
        record.replace_metadata(metadata);

        let mut context = Map::new();
        context.insert("reason".to_owned(), json!(reason));
        context.insert("successorId".to_owned(), json!(successor_id));
        let retired = self
            .commit(actor, &before, record, AuditAction::Superseded, context, now)
            .await?;
        info!(
            record_id = %id,
            successor_id = %successor_id,
            tenant_id = %retired.tenant_id(),
            "intake record superseded"
        );
        Ok(SupersededRecord { retired, successor })
    }

    /// Move `record` through `path`, then allocate its number in one write.
    async fn reserve_into(
        &self,
        actor: &Actor,
        before: &CorrespondenceRecord,
        path: &[SharedStatus],
        action: AuditAction,
    ) -> Result<CorrespondenceRecord, DomainError> {
        let now = self.clock.utc();
        let kind = before.kind();
        let mut record = before.clone();
        for &status in path {
            record.transition_to(Status::shared(kind, status))?;
        }
        record.stamp(now);
        let audit = AuditDraft::new(action, actor, Some(before), now)?;
        let stored = self
            .records
            .reserve_number(NumberReservation::new(record, before.version(), audit))
            .await
            .map_err(map_record_error)?;
        info!(
            record_id = %stored.id(),
            tenant_id = %stored.tenant_id(),
            registration_number = stored.formatted_number().unwrap_or_default(),
            status = %stored.status(),
            "registration number reserved"
        );
        Ok(stored)
    }

    async fn load_mutable(
        &self,
        actor: &Actor,
        id: RecordId,
    ) -> Result<CorrespondenceRecord, DomainError> {
        let record = self.load(actor.tenant_id(), id).await?;
        if record.status().is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "{} record in status {} can no longer change",
                record.kind(),
                record.status()
            ))
            .with_details(json!({ "status": record.status().as_str() })));
        }
        Ok(record)
    }
}

#[async_trait]
impl<R, D> RegistrationCommand for RegistrationService<R, D>
where
    R: RecordRepository,
    D: ReferenceDirectory,
{
    async fn create(
        &self,
        actor: &Actor,
        request: CreateRecordRequest,
    ) -> Result<CreatedRecord, DomainError> {
        let validated = request.validate()?;
        let tenant_id = actor.tenant_id();

        if let Some(record) = self
            .idempotency
            .resolve(tenant_id, validated.idempotency_key.as_ref())
            .await?
        {
            return Ok(CreatedRecord {
                record,
                replayed: true,
            });
        }

        self.ensure_references(tenant_id, &validated).await?;

        let now = self.clock.utc();
        let record = CorrespondenceRecord::create(
            RecordId::random(),
            tenant_id.clone(),
            actor.user_id().clone(),
            validated,
            now,
        );
        let audit = AuditDraft::new(AuditAction::Created, actor, None, now)?.complete(&record)?;

        match self
            .records
            .insert(RecordInsert { record, audit })
            .await
            .map_err(map_record_error)?
        {
            InsertOutcome::Inserted(record) => {
                info!(
                    record_id = %record.id(),
                    tenant_id = %tenant_id,
                    kind = %record.kind(),
                    "record created"
                );
                Ok(CreatedRecord {
                    record,
                    replayed: false,
                })
            }
            InsertOutcome::Existing(record) => {
                debug!(
                    record_id = %record.id(),
                    tenant_id = %tenant_id,
                    "lost idempotent insert race; replaying winner"
                );
                Ok(CreatedRecord {
                    record,
                    replayed: true,
                })
            }
        }
    }

    async fn apply(
        &self,
        actor: &Actor,
        id: RecordId,
        action: LifecycleAction,
    ) -> Result<CorrespondenceRecord, DomainError> {
        let before = self.load(actor.tenant_id(), id).await?;
        let now = self.clock.utc();
        let mut record = before.clone();
        debug!(record_id = %id, action = action.name(), "applying lifecycle action");
        let applied = action.apply(&mut record, now)?;
        self.commit(actor, &before, record, applied.audit, applied.context, now)
            .await
    }

    async fn reserve_number(
        &self,
        actor: &Actor,
        id: RecordId,
    ) -> Result<CorrespondenceRecord, DomainError> {
        let before = self.load(actor.tenant_id(), id).await?;
        if before.registration_number().is_some() {
            debug!(record_id = %id, "record already numbered; returning unchanged");
            return Ok(before);
        }
        let reserved = self
            .reserve_into(
                actor,
                &before,
                &[SharedStatus::NumberReserved],
                AuditAction::NumberReserved,
            )
            .await;
        match reserved {
            Err(err) if err.code() == ErrorCode::Conflict => {
                let current = self.load(actor.tenant_id(), id).await?;
                if current.registration_number().is_none() {
                    return Err(err);
                }
                debug!(record_id = %id, "record numbered by a concurrent caller");
                Ok(current)
            }
            other => other,
        }
    }

    async fn direct_register(
        &self,
        actor: &Actor,
        id: RecordId,
    ) -> Result<CorrespondenceRecord, DomainError> {
        let before = self.load(actor.tenant_id(), id).await?;
        if before.registration_number().is_none() {
            return self
                .reserve_into(
                    actor,
                    &before,
                    &[SharedStatus::NumberReserved, SharedStatus::Registered],
                    AuditAction::DirectlyRegistered,
                )
                .await;
        }

        let reserved = Status::shared(before.kind(), SharedStatus::NumberReserved);
        if before.status() != reserved {
            debug!(record_id = %id, "record already registered; returning unchanged");
            return Ok(before);
        }
        let now = self.clock.utc();
        let mut record = before.clone();
        let applied = LifecycleAction::FinalizeRegistration.apply(&mut record, now)?;
        self.commit(actor, &before, record, applied.audit, applied.context, now)
            .await
    }

    async fn supersede(
        &self,
        actor: &Actor,
        id: RecordId,
        request: SupersedeRequest,
    ) -> Result<SupersededRecord, DomainError> {
        let reason = request.reason.trim().to_owned();
        if reason.is_empty() {
            return Err(DomainError::invalid_input("reason is required")
                .with_details(json!({ "field": "reason" })));
        }
        let SupersedeRequest {
            subject,
            successor_id,
            ..
        } = request;

        let before = self.load(actor.tenant_id(), id).await?;
        if before.kind() == RecordKind::Intake {
            if subject.is_some() {
                return Err(DomainError::invalid_input(
                    "subject only applies to dispatch successors",
                )
                .with_details(json!({ "field": "subject" })));
            }
            let successor_id = successor_id.ok_or_else(|| {
                DomainError::invalid_input("successorId is required for intake records")
                    .with_details(json!({ "field": "successorId" }))
            })?;
            return self
                .link_intake_successor(actor, before, successor_id, reason)
                .await;
        }
        if successor_id.is_some() {
            return Err(DomainError::invalid_input(
                "dispatch successors are created by supersession",
            )
            .with_details(json!({ "field": "successorId" })));
        }
        let subject = subject
            .map(|subject| validate_subject(&subject))
            .transpose()?;

        let now = self.clock.utc();
        let mut retired = before.clone();
        retired.transition_to(Status::Dispatch(DispatchStatus::Superseded))?;
        retired.stamp(now);
        let successor = before.successor(RecordId::random(), actor.user_id().clone(), subject, now);

        let mut retired_context = Map::new();
        retired_context.insert("reason".to_owned(), json!(reason));
        retired_context.insert("successorId".to_owned(), json!(successor.id()));
        let retired_audit = AuditDraft::new(AuditAction::Superseded, actor, Some(&before), now)?
            .with_context(retired_context)
            .complete(&retired)?;

        let mut successor_context = Map::new();
        successor_context.insert("supersedesId".to_owned(), json!(before.id()));
        let successor_audit = AuditDraft::new(AuditAction::CreatedAsSuccessor, actor, None, now)?
            .with_context(successor_context)
            .complete(&successor)?;

        let (retired, successor) = self
            .records
            .supersede(SupersessionWrite {
                retired: RecordUpdate {
                    record: retired,
                    expected_version: before.version(),
                    audit: retired_audit,
                },
                successor: RecordInsert {
                    record: successor,
                    audit: successor_audit,
                },
            })
            .await
            .map_err(map_record_error)?;
        info!(
            record_id = %retired.id(),
            successor_id = %successor.id(),
            tenant_id = %retired.tenant_id(),
            "dispatch record superseded"
        );
        Ok(SupersededRecord { retired, successor })
    }

    async fn annotate_metadata(
        &self,
        actor: &Actor,
        id: RecordId,
        change: MetadataChange,
    ) -> Result<CorrespondenceRecord, DomainError> {
        if let Some(key) = change
            .set
            .keys()
            .chain(change.remove.iter())
            .find(|key| key.trim().is_empty())
        {
            return Err(DomainError::invalid_input("metadata keys must not be blank")
                .with_details(json!({ "field": "metadata", "key": key })));
        }

        let before = self.load_mutable(actor, id).await?;
        let MetadataChange { set, remove } = change;
        let mut metadata = before.metadata().clone();
        for key in &remove {
            metadata.remove(key);
        }
        let set_keys: Vec<String> = set.keys().cloned().collect();
        metadata.extend(set);
        if &metadata == before.metadata() {
            debug!(record_id = %id, "metadata unchanged; skipping write");
            return Ok(before);
        }

        let now = self.clock.utc();
        let mut record = before.clone();
        record.replace_metadata(metadata);
        let mut context = Map::new();
        context.insert("set".to_owned(), json!(set_keys));
        context.insert("removed".to_owned(), json!(remove));
        self.commit(actor, &before, record, AuditAction::MetadataUpdated, context, now)
            .await
    }

    async fn record_scan(
        &self,
        actor: &Actor,
        id: RecordId,
        scan: ScanDetails,
    ) -> Result<CorrespondenceRecord, DomainError> {
        if scan.page_count == Some(0) {
            return Err(DomainError::invalid_input("page count must be positive")
                .with_details(json!({ "field": "pageCount" })));
        }
        let checksum = match scan.checksum.map(|value| value.trim().to_owned()) {
            Some(value) if value.is_empty() => {
                return Err(DomainError::invalid_input("checksum must not be blank")
                    .with_details(json!({ "field": "checksum" })));
            }
            other => other,
        };

        let before = self.load_mutable(actor, id).await?;
        let now = self.clock.utc();
        let mut metadata = before.metadata().clone();
        let scans = metadata
            .entry(SCANS_KEY)
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(entries) = scans else {
            return Err(DomainError::invalid_input(format!(
                "metadata key {SCANS_KEY} is reserved for scan entries"
            ))
            .with_details(json!({ "field": "metadata.scans" })));
        };
        entries.push(json!({
            "documentId": scan.document_id,
            "pageCount": scan.page_count,
            "checksum": checksum,
            "scannedBy": actor.user_id(),
            "scannedAt": now,
        }));

        let mut record = before.clone();
        record.replace_metadata(metadata);
        let mut context = Map::new();
        context.insert("documentId".to_owned(), json!(scan.document_id));
        self.commit(actor, &before, record, AuditAction::ScanRecorded, context, now)
            .await
    }
}

#[async_trait]
impl<R, D> RegistrationQuery for RegistrationService<R, D>
where
    R: RecordRepository,
    D: ReferenceDirectory,
{
    async fn get(&self, actor: &Actor, id: RecordId) -> Result<CorrespondenceRecord, DomainError> {
        self.load(actor.tenant_id(), id).await
    }

    async fn get_by_number(
        &self,
        actor: &Actor,
        formatted_number: &str,
    ) -> Result<CorrespondenceRecord, DomainError> {
        let formatted_number = formatted_number.trim();
        if formatted_number.is_empty() {
            return Err(DomainError::invalid_input("registration number is required")
                .with_details(json!({ "field": "registrationNumber" })));
        }
        self.records
            .find_by_number(actor.tenant_id(), formatted_number)
            .await
            .map_err(map_record_error)?
            .ok_or_else(|| {
                DomainError::not_found(format!("no record holds number {formatted_number}"))
            })
    }

    async fn audit_trail(&self, actor: &Actor, id: RecordId) -> Result<Vec<AuditEntry>, DomainError> {
        let record = self.load(actor.tenant_id(), id).await?;
        self.records
            .audit_trail(record.tenant_id(), record.id())
            .await
            .map_err(map_record_error)
    }
}

fn validate_subject(subject: &str) -> Result<String, DomainError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(DomainError::invalid_input("subject must not be empty")
            .with_details(json!({ "field": "subject" })));
    }
    if subject.chars().count() > SUBJECT_MAX {
        return Err(
            DomainError::invalid_input(format!("subject must be at most {SUBJECT_MAX} characters"))
                .with_details(json!({ "field": "subject" })),
        );
    }
    Ok(subject.to_owned())
}

fn record_not_found(id: RecordId) -> DomainError {
    DomainError::not_found(format!("record {id} not found")).with_details(json!({ "recordId": id }))
}

fn map_record_error(error: RecordRepositoryError) -> DomainError {
    match error {
        RecordRepositoryError::Connection { message } => {
            DomainError::internal(format!("record store unavailable: {message}"))
        }
        RecordRepositoryError::Contention { message } => {
            DomainError::conflict(format!("concurrent write to the record store: {message}"))
                .with_details(json!({ "code": "contention" }))
        }
        RecordRepositoryError::Query { message } => {
            DomainError::internal(format!("record store error: {message}"))
        }
        RecordRepositoryError::VersionConflict {
            record_id,
            expected,
        } => DomainError::conflict(format!("record {record_id} was modified concurrently"))
            .with_details(json!({
                "recordId": record_id,
                "expectedVersion": expected,
                "code": "version_mismatch",
            })),
        RecordRepositoryError::Missing { record_id } => {
            DomainError::not_found(format!("record {record_id} not found"))
                .with_details(json!({ "recordId": record_id }))
        }
        RecordRepositoryError::DuplicateNumber { message } => {
            DomainError::internal(format!("registration number collision: {message}"))
        }
        RecordRepositoryError::Corrupt { message } => {
            DomainError::internal(format!("stored record is invalid: {message}"))
        }
    }
}

fn map_reference_error(error: ReferenceDirectoryError) -> DomainError {
    match error {
        ReferenceDirectoryError::Connection { message } => {
            DomainError::internal(format!("reference directory unavailable: {message}"))
        }
        ReferenceDirectoryError::Query { message } => {
            DomainError::internal(format!("reference directory error: {message}"))
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;

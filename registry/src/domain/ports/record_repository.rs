//! Port abstraction for correspondence record persistence.
//!
//! Every write carries the audit entry describing it, and adapters must
//! commit both in one transaction: either the record change and its entry
//! are visible together or neither is. Updates are guarded by the version
//! the caller read, so a concurrent writer surfaces as
//! [`RecordRepositoryError::VersionConflict`] instead of a lost update.

use async_trait::async_trait;

use crate::domain::audit::{AuditDraft, AuditEntry};
use crate::domain::error::DomainError;
use crate::domain::idempotency::IdempotencyKey;
use crate::domain::identifier::{RecordId, TenantId};
use crate::domain::record::CorrespondenceRecord;
use crate::domain::sequence::{RegistrationNumber, SequenceKey};

use super::define_port_error;

define_port_error! {
    /// Errors raised by record store adapters.
    pub enum RecordRepositoryError {
        /// Connection could not be established or was lost.
        Connection { message: String } => "record store connection failed: {message}",
        /// The transaction lost a serialisation race and may be retried.
        Contention { message: String } => "record store write contended: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "record store query failed: {message}",
        /// The record changed since the caller read it.
        VersionConflict { record_id: String, expected: i64 } =>
            "record {record_id} is no longer at version {expected}",
        /// The record to update does not exist.
        Missing { record_id: String } => "record {record_id} not found",
        /// A registration number was issued twice.
        DuplicateNumber { message: String } => "registration number already issued: {message}",
        /// Stored data violates a domain invariant.
        Corrupt { message: String } => "stored record is invalid: {message}",
    }
}

impl RecordRepositoryError {
    /// Whether re-running the whole transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Contention { .. })
    }
}

/// Insert of a freshly created record.
#[derive(Debug, Clone)]
pub struct RecordInsert {
    /// Record to insert.
    pub record: CorrespondenceRecord,
    /// `CREATED` entry for the record.
    pub audit: AuditEntry,
}

/// Outcome of [`RecordRepository::insert`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The record was written.
    Inserted(CorrespondenceRecord),
    /// Another record already holds the idempotency key; nothing was written.
    Existing(CorrespondenceRecord),
}

/// Version-checked replacement of a record.
#[derive(Debug, Clone)]
pub struct RecordUpdate {
    /// New state, already stamped with the next version.
    pub record: CorrespondenceRecord,
    /// Version the caller read.
    pub expected_version: i64,
    /// Entry describing the change.
    pub audit: AuditEntry,
}

/// Number reservation to run inside one storage transaction.
///
/// The adapter advances the counter for [`NumberReservation::key`], calls
/// [`NumberReservation::complete`] with the new value, then writes the
/// record (version-checked) and the audit entry.
#[derive(Debug, Clone)]
pub struct NumberReservation {
    record: CorrespondenceRecord,
    expected_version: i64,
    audit: AuditDraft,
}

impl NumberReservation {
    /// Plan a reservation for `record`, whose status has already moved.
    pub fn new(record: CorrespondenceRecord, expected_version: i64, audit: AuditDraft) -> Self {
        Self {
            record,
            expected_version,
            audit,
        }
    }

    /// Counter the number is drawn from.
    pub fn key(&self) -> SequenceKey {
        self.record.sequence_key()
    }

    /// Record being numbered.
    pub const fn record_id(&self) -> RecordId {
        self.record.id()
    }

    /// Tenant owning the record.
    pub fn tenant_id(&self) -> &TenantId {
        self.record.tenant_id()
    }

    /// Version the caller read.
    pub const fn expected_version(&self) -> i64 {
        self.expected_version
    }

    /// Stamp the record with the allocated value and finish the audit entry.
    ///
    /// # Errors
    ///
    /// Fails when the value is not positive or the record already holds a
    /// number.
    pub fn complete(self, sequence: i64) -> Result<(CorrespondenceRecord, AuditEntry), DomainError> {
        let key = self.key();
        let Self {
            mut record, audit, ..
        } = self;
        let number = RegistrationNumber::issue(&key, sequence)
            .map_err(|err| DomainError::internal(format!("invalid sequence value: {err}")))?;
        record
            .assign_number(number)
            .map_err(|err| DomainError::internal(err.to_string()))?;
        let entry = audit.complete(&record)?;
        Ok((record, entry))
    }
}

/// Retirement of a dispatch record together with its successor draft.
#[derive(Debug, Clone)]
pub struct SupersessionWrite {
    /// Version-checked move of the old record to `SUPERSEDED`.
    pub retired: RecordUpdate,
    /// Insert of the linked successor.
    pub successor: RecordInsert,
}

/// Port for record storage and retrieval.
///
/// All lookups are tenant scoped; a record of another tenant is reported as
/// absent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Fetch a record by id.
    async fn find(
        &self,
        tenant_id: &TenantId,
        id: RecordId,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError>;

    /// Fetch the record created with an idempotency key.
    async fn find_by_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &IdempotencyKey,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError>;

    /// Fetch a record by its formatted registration number.
    async fn find_by_number(
        &self,
        tenant_id: &TenantId,
        formatted_number: &str,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError>;

    /// Insert a new record with its creation entry.
    ///
    /// When the record's idempotency key is already taken within the tenant,
    /// nothing is written and the holder is returned as
    /// [`InsertOutcome::Existing`].
    async fn insert(&self, write: RecordInsert) -> Result<InsertOutcome, RecordRepositoryError>;

    /// Replace a record if it is still at `expected_version`.
    async fn update(
        &self,
        write: RecordUpdate,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError>;

    /// Allocate the next number and stamp the record, atomically.
    async fn reserve_number(
        &self,
        write: NumberReservation,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError>;

    /// Retire a record and insert its successor, atomically.
    ///
    /// Returns `(retired, successor)`.
    async fn supersede(
        &self,
        write: SupersessionWrite,
    ) -> Result<(CorrespondenceRecord, CorrespondenceRecord), RecordRepositoryError>;

    /// Audit entries of a record in recording order.
    async fn audit_trail(
        &self,
        tenant_id: &TenantId,
        id: RecordId,
    ) -> Result<Vec<AuditEntry>, RecordRepositoryError>;
}

/// Fixture implementation for testing without storage.
///
/// Lookups find nothing, writes echo their input, and reservations always
/// issue sequence 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureRecordRepository;

#[async_trait]
impl RecordRepository for FixtureRecordRepository {
    async fn find(
        &self,
        _tenant_id: &TenantId,
        _id: RecordId,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        Ok(None)
    }

    async fn find_by_idempotency_key(
        &self,
        _tenant_id: &TenantId,
        _key: &IdempotencyKey,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        Ok(None)
    }

    async fn find_by_number(
        &self,
        _tenant_id: &TenantId,
        _formatted_number: &str,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        Ok(None)
    }

    async fn insert(&self, write: RecordInsert) -> Result<InsertOutcome, RecordRepositoryError> {
        Ok(InsertOutcome::Inserted(write.record))
    }

    async fn update(
        &self,
        write: RecordUpdate,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError> {
        Ok(write.record)
    }

    async fn reserve_number(
        &self,
        write: NumberReservation,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError> {
        write
            .complete(1)
            .map(|(record, _)| record)
            .map_err(|err| RecordRepositoryError::query(err.to_string()))
    }

    async fn supersede(
        &self,
        write: SupersessionWrite,
    ) -> Result<(CorrespondenceRecord, CorrespondenceRecord), RecordRepositoryError> {
        Ok((write.retired.record, write.successor.record))
    }

    async fn audit_trail(
        &self,
        _tenant_id: &TenantId,
        _id: RecordId,
    ) -> Result<Vec<AuditEntry>, RecordRepositoryError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::AuditAction;
    use crate::domain::test_support::{actor, classified_intake, now};
    use crate::domain::workflow::{IntakeStatus, Status};
    use rstest::rstest;

    fn reservation() -> NumberReservation {
        let before = classified_intake();
        let mut record = before.clone();
        record
            .transition_to(Status::Intake(IntakeStatus::NumberReserved))
            .expect("legal edge");
        record.stamp(now());
        let audit = AuditDraft::new(AuditAction::NumberReserved, &actor(), Some(&before), now())
            .expect("draft");
        NumberReservation::new(record, before.version(), audit)
    }

    #[rstest]
    fn reservation_completion_formats_number_and_delta() {
        let (record, entry) = reservation().complete(1).expect("completes");

        assert_eq!(record.formatted_number(), Some("2081-82/MUN/D-00001"));
        assert_eq!(
            entry.changes["delta"]["registrationNumber"]["to"]["formattedNumber"],
            "2081-82/MUN/D-00001"
        );
        assert_eq!(entry.changes["delta"]["status"]["to"], "NUMBER_RESERVED");
    }

    #[rstest]
    fn reservation_rejects_non_positive_values() {
        assert!(reservation().complete(0).is_err());
    }

    #[rstest]
    #[case(RecordRepositoryError::connection("down"), true)]
    #[case(RecordRepositoryError::contention("serialization failure"), true)]
    #[case(RecordRepositoryError::query("syntax"), false)]
    #[case(RecordRepositoryError::version_conflict("r", 2_i64), false)]
    fn transient_classification(#[case] error: RecordRepositoryError, #[case] expected: bool) {
        assert_eq!(error.is_transient(), expected);
    }

    #[tokio::test]
    async fn fixture_reservation_issues_first_number() {
        let record = FixtureRecordRepository
            .reserve_number(reservation())
            .await
            .expect("fixture reserves");
        assert_eq!(record.sequence_number(), Some(1));
    }
}

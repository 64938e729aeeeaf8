//! Driving port for correspondence registration.
//!
//! The boundary layer calls [`RegistrationCommand`] after resolving the
//! caller into an [`Actor`]. Every operation is tenant scoped by the actor
//! and writes exactly one audit entry per record it changes.

use async_trait::async_trait;

use crate::domain::{
    Actor, CorrespondenceRecord, CreateRecordRequest, DocumentId, DomainError, LifecycleAction,
    Metadata, RecordId,
};

/// Response from creating a record.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedRecord {
    /// The created record, or the one previously created with the same key.
    pub record: CorrespondenceRecord,
    /// Whether this response was replayed from an earlier request with the
    /// same idempotency key.
    pub replayed: bool,
}

/// Request to supersede a record.
///
/// Dispatch records get a fresh `DRAFT` successor, so `successor_id` must be
/// absent. Intake records are linked to an existing intake record named by
/// `successor_id`, and `subject` must be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupersedeRequest {
    /// Why the record is replaced; required.
    pub reason: String,
    /// Subject of a dispatch successor; defaults to the retired subject.
    pub subject: Option<String>,
    /// Existing intake record that replaces an intake record.
    pub successor_id: Option<RecordId>,
}

/// Response from superseding a record.
#[derive(Debug, Clone, PartialEq)]
pub struct SupersededRecord {
    /// The old record. Dispatch records are now `SUPERSEDED`; intake records
    /// keep their status and carry the link in the `superseded`,
    /// `superseded_by`, `superseded_at` and `superseded_reason` metadata keys.
    pub retired: CorrespondenceRecord,
    /// The dispatch `DRAFT` created as successor, or the intake record the
    /// old one now points at.
    pub successor: CorrespondenceRecord,
}

/// Change to a record's metadata object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataChange {
    /// Keys to insert or overwrite.
    pub set: Metadata,
    /// Keys to remove.
    pub remove: Vec<String>,
}

impl MetadataChange {
    /// Whether the change would touch nothing.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// A scanned copy of the physical item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDetails {
    /// Stored scan document.
    pub document_id: DocumentId,
    /// Number of scanned pages.
    pub page_count: Option<u32>,
    /// Content checksum reported by the scanner.
    pub checksum: Option<String>,
}

/// Driving port for registration operations.
///
/// # Errors
///
/// Every operation reports:
/// - `InvalidInput` for malformed requests;
/// - `NotFound` when the record is absent for the actor's tenant;
/// - `InvalidTransition` when the record's status does not permit the action;
/// - `Conflict` when the record changed concurrently;
/// - `Internal` for storage failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrationCommand: Send + Sync {
    /// Create a record in `DRAFT`, deduplicated by idempotency key.
    async fn create(
        &self,
        actor: &Actor,
        request: CreateRecordRequest,
    ) -> Result<CreatedRecord, DomainError>;

    /// Apply a lifecycle action.
    async fn apply(
        &self,
        actor: &Actor,
        id: RecordId,
        action: LifecycleAction,
    ) -> Result<CorrespondenceRecord, DomainError>;

    /// Move to `NUMBER_RESERVED` and allocate a registration number.
    ///
    /// A record that already holds a number is returned unchanged.
    async fn reserve_number(
        &self,
        actor: &Actor,
        id: RecordId,
    ) -> Result<CorrespondenceRecord, DomainError>;

    /// Reserve a number and finalise registration as one action.
    async fn direct_register(
        &self,
        actor: &Actor,
        id: RecordId,
    ) -> Result<CorrespondenceRecord, DomainError>;

    /// Retire a record in favour of its successor.
    ///
    /// A dispatch record moves to `SUPERSEDED` and gains a new linked draft.
    /// An intake record keeps its status and records the link to an existing
    /// intake successor in its metadata.
    async fn supersede(
        &self,
        actor: &Actor,
        id: RecordId,
        request: SupersedeRequest,
    ) -> Result<SupersededRecord, DomainError>;

    /// Merge keys into, or remove keys from, the record's metadata.
    async fn annotate_metadata(
        &self,
        actor: &Actor,
        id: RecordId,
        change: MetadataChange,
    ) -> Result<CorrespondenceRecord, DomainError>;

    /// Attach a scanned copy to the record's metadata.
    async fn record_scan(
        &self,
        actor: &Actor,
        id: RecordId,
        scan: ScanDetails,
    ) -> Result<CorrespondenceRecord, DomainError>;
}

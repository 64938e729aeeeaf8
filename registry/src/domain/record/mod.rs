//! Correspondence record entity.
//!
//! A single shape serves both intake and dispatch records; the kind is
//! derived from the status. Fields are private so that status changes go
//! through the workflow and the registration number is written at most once.

mod scope;
mod validation;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::identifier::{
    ClassificationCode, DocumentId, FiscalYearId, IdentifierError, PartyId, RecordId, TenantId,
    UnitId, UserId,
};
use super::idempotency::IdempotencyKey;
use super::sequence::{RegistrationNumber, SequenceKey};
use super::workflow::{RecordKind, Status, TransitionError, UnknownCode};

pub use scope::{Scope, ScopeKind};
pub use validation::{BackdateRequest, CreateRecordRequest, ValidatedCreate};

/// Opaque key-value payload carried by a record.
pub type Metadata = Map<String, Value>;

/// Maximum subject length in characters.
pub const SUBJECT_MAX: usize = 500;

/// Validation errors for record construction and rehydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    /// Ward scope without a sub-unit id.
    MissingSubUnit,
    /// Municipality scope with a sub-unit id.
    UnexpectedSubUnit,
    /// Blank subject.
    EmptySubject,
    /// Subject longer than [`SUBJECT_MAX`].
    SubjectTooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// A required reference was not supplied.
    MissingField {
        /// Field name as seen by callers.
        field: &'static str,
    },
    /// Backdated entries must state a reason.
    MissingBackdateReason,
    /// Malformed identifier.
    Identifier(IdentifierError),
    /// The record already holds a registration number.
    NumberAlreadyAssigned,
    /// A stored registration number does not match its key.
    NumberMismatch {
        /// Stored display string.
        stored: String,
        /// Display string derived from the key.
        expected: String,
    },
    /// Stored versions start at 1.
    InvalidVersion {
        /// Rejected version.
        version: i64,
    },
}

impl RecordValidationError {
    /// Caller-facing field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingSubUnit | Self::UnexpectedSubUnit => "subUnitId",
            Self::EmptySubject | Self::SubjectTooLong { .. } => "subject",
            Self::MissingField { field } => field,
            Self::MissingBackdateReason => "backdate.reason",
            Self::Identifier(err) => err.kind(),
            Self::NumberAlreadyAssigned | Self::NumberMismatch { .. } => "registrationNumber",
            Self::InvalidVersion { .. } => "version",
        }
    }
}

impl fmt::Display for RecordValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSubUnit => write!(f, "ward scope requires a sub-unit id"),
            Self::UnexpectedSubUnit => {
                write!(f, "municipality scope must not carry a sub-unit id")
            }
            Self::EmptySubject => write!(f, "subject must not be empty"),
            Self::SubjectTooLong { max } => write!(f, "subject must be at most {max} characters"),
            Self::MissingField { field } => write!(f, "{field} is required"),
            Self::MissingBackdateReason => write!(f, "backdated entries require a reason"),
            Self::Identifier(err) => err.fmt(f),
            Self::NumberAlreadyAssigned => {
                write!(f, "record already holds a registration number")
            }
            Self::NumberMismatch { stored, expected } => write!(
                f,
                "stored registration number {stored} does not match expected {expected}"
            ),
            Self::InvalidVersion { version } => write!(f, "invalid record version {version}"),
        }
    }
}

impl std::error::Error for RecordValidationError {}

impl From<IdentifierError> for RecordValidationError {
    fn from(value: IdentifierError) -> Self {
        Self::Identifier(value)
    }
}

/// Handling priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Routine.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Expedited.
    High,
    /// Same-day handling.
    Urgent,
}

impl Priority {
    /// Stable storage code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl FromStr for Priority {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Self::Low),
            "NORMAL" => Ok(Self::Normal),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            other => Err(UnknownCode {
                what: "priority",
                value: other.to_owned(),
            }),
        }
    }
}

/// Backdating approval attached to an intake entry received earlier than
/// it was registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backdate {
    /// Why the entry is backdated.
    pub reason: String,
    /// Officer who approved the backdate.
    pub approver_id: Option<UserId>,
}

/// Routing of an intake record to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Section the record is routed to.
    pub unit_id: UnitId,
    /// Officer responsible, when named.
    pub assignee_id: Option<UserId>,
    /// Resolution deadline derived from the SLA hours.
    pub sla_deadline: Option<DateTime<Utc>>,
    /// When the routing happened.
    pub assigned_at: DateTime<Utc>,
}

/// Delivery channel of a dispatch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchChannel {
    /// Postal service.
    Post,
    /// Private courier.
    Courier,
    /// Electronic mail.
    Email,
    /// Hand delivered by office staff.
    HandDelivery,
    /// Published to the citizen portal.
    Portal,
}

/// Delivery tracking for a dispatch record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchDetails {
    /// Delivery channel.
    pub channel: DispatchChannel,
    /// Channel tracking reference.
    pub tracking_reference: Option<String>,
    /// Latest hand-over to the channel.
    pub dispatched_at: DateTime<Utc>,
    /// Number of hand-overs, including resends after a return.
    pub attempts: u32,
    /// Confirmed delivery time.
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Unvalidated field set used by storage adapters to rehydrate a record.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    /// Record id.
    pub id: RecordId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Fiscal-year partition.
    pub fiscal_year_id: FiscalYearId,
    /// Organisational scope.
    pub scope: Scope,
    /// Workflow status; determines the kind.
    pub status: Status,
    /// Subject line.
    pub subject: String,
    /// Applicant or recipient.
    pub party_id: PartyId,
    /// Primary document.
    pub primary_document_id: DocumentId,
    /// Handling priority.
    pub priority: Priority,
    /// Classification code (intake).
    pub classification_code: Option<ClassificationCode>,
    /// Registration number, when allocated.
    pub registration_number: Option<(i64, String)>,
    /// Creation idempotency key.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Predecessor replaced by this record.
    pub supersedes_id: Option<RecordId>,
    /// Backdating approval.
    pub backdate: Option<Backdate>,
    /// Routing.
    pub assignment: Option<Assignment>,
    /// Delivery tracking.
    pub dispatch: Option<DispatchDetails>,
    /// Opaque payload.
    pub metadata: Metadata,
    /// Optimistic concurrency version.
    pub version: i64,
    /// Creator.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// An intake or dispatch record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrespondenceRecord {
    id: RecordId,
    tenant_id: TenantId,
    fiscal_year_id: FiscalYearId,
    scope: Scope,
    status: Status,
    subject: String,
    party_id: PartyId,
    primary_document_id: DocumentId,
    priority: Priority,
    classification_code: Option<ClassificationCode>,
    registration_number: Option<RegistrationNumber>,
    idempotency_key: Option<IdempotencyKey>,
    supersedes_id: Option<RecordId>,
    backdate: Option<Backdate>,
    assignment: Option<Assignment>,
    dispatch: Option<DispatchDetails>,
    metadata: Metadata,
    version: i64,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CorrespondenceRecord {
    /// Create a new record in its kind's initial status.
    pub(crate) fn create(
        id: RecordId,
        tenant_id: TenantId,
        created_by: UserId,
        request: ValidatedCreate,
        now: DateTime<Utc>,
    ) -> Self {
        let ValidatedCreate {
            kind,
            fiscal_year_id,
            scope,
            subject,
            party_id,
            primary_document_id,
            priority,
            backdate,
            idempotency_key,
            metadata,
        } = request;
        Self {
            id,
            tenant_id,
            fiscal_year_id,
            scope,
            status: Status::initial(kind),
            subject,
            party_id,
            primary_document_id,
            priority,
            classification_code: None,
            registration_number: None,
            idempotency_key,
            supersedes_id: None,
            backdate,
            assignment: None,
            dispatch: None,
            metadata,
            version: 1,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate a stored record, checking the invariants storage cannot.
    ///
    /// # Errors
    ///
    /// Rejects blank subjects, non-positive versions, and registration
    /// numbers whose display string does not match their counter key.
    pub fn restore(draft: RecordDraft) -> Result<Self, RecordValidationError> {
        let RecordDraft {
            id,
            tenant_id,
            fiscal_year_id,
            scope,
            status,
            subject,
            party_id,
            primary_document_id,
            priority,
            classification_code,
            registration_number,
            idempotency_key,
            supersedes_id,
            backdate,
            assignment,
            dispatch,
            metadata,
            version,
            created_by,
            created_at,
            updated_at,
        } = draft;

        if subject.trim().is_empty() {
            return Err(RecordValidationError::EmptySubject);
        }
        if version < 1 {
            return Err(RecordValidationError::InvalidVersion { version });
        }

        let key = SequenceKey::new(
            tenant_id.clone(),
            status.kind(),
            fiscal_year_id.clone(),
            scope.clone(),
        );
        let registration_number = registration_number
            .map(|(sequence, stored)| {
                let issued = RegistrationNumber::issue(&key, sequence).map_err(|_| {
                    RecordValidationError::NumberMismatch {
                        stored: stored.clone(),
                        expected: format!("a positive sequence, got {sequence}"),
                    }
                })?;
                if issued.formatted_number() == stored {
                    Ok(issued)
                } else {
                    Err(RecordValidationError::NumberMismatch {
                        stored,
                        expected: issued.formatted_number().to_owned(),
                    })
                }
            })
            .transpose()?;

        Ok(Self {
            id,
            tenant_id,
            fiscal_year_id,
            scope,
            status,
            subject,
            party_id,
            primary_document_id,
            priority,
            classification_code,
            registration_number,
            idempotency_key,
            supersedes_id,
            backdate,
            assignment,
            dispatch,
            metadata,
            version,
            created_by,
            created_at,
            updated_at,
        })
    }

    /// Draft successor of a superseded dispatch record.
    pub(crate) fn successor(
        &self,
        id: RecordId,
        created_by: UserId,
        subject: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id: self.tenant_id.clone(),
            fiscal_year_id: self.fiscal_year_id.clone(),
            scope: self.scope.clone(),
            status: Status::initial(self.kind()),
            subject: subject.unwrap_or_else(|| self.subject.clone()),
            party_id: self.party_id,
            primary_document_id: self.primary_document_id,
            priority: self.priority,
            classification_code: self.classification_code.clone(),
            registration_number: None,
            idempotency_key: None,
            supersedes_id: Some(self.id),
            backdate: None,
            assignment: None,
            dispatch: None,
            metadata: self.metadata.clone(),
            version: 1,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record id.
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// Owning tenant.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Intake or dispatch.
    pub const fn kind(&self) -> RecordKind {
        self.status.kind()
    }

    /// Fiscal-year partition.
    pub fn fiscal_year_id(&self) -> &FiscalYearId {
        &self.fiscal_year_id
    }

    /// Organisational scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Current workflow status.
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Subject line.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Applicant (intake) or recipient (dispatch).
    pub const fn party_id(&self) -> PartyId {
        self.party_id
    }

    /// Primary document.
    pub const fn primary_document_id(&self) -> DocumentId {
        self.primary_document_id
    }

    /// Handling priority.
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Classification code, once classified.
    pub fn classification_code(&self) -> Option<&ClassificationCode> {
        self.classification_code.as_ref()
    }

    /// Registration number, once reserved.
    pub fn registration_number(&self) -> Option<&RegistrationNumber> {
        self.registration_number.as_ref()
    }

    /// Sequence value of the registration number.
    pub fn sequence_number(&self) -> Option<i64> {
        self.registration_number
            .as_ref()
            .map(RegistrationNumber::sequence_number)
    }

    /// Display string of the registration number.
    pub fn formatted_number(&self) -> Option<&str> {
        self.registration_number
            .as_ref()
            .map(RegistrationNumber::formatted_number)
    }

    /// Creation idempotency key.
    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }

    /// Predecessor replaced by this record.
    pub const fn supersedes_id(&self) -> Option<RecordId> {
        self.supersedes_id
    }

    /// Backdating approval.
    pub fn backdate(&self) -> Option<&Backdate> {
        self.backdate.as_ref()
    }

    /// Routing details.
    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    /// Delivery tracking.
    pub fn dispatch(&self) -> Option<&DispatchDetails> {
        self.dispatch.as_ref()
    }

    /// Opaque payload.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Optimistic concurrency version.
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Creator.
    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    /// Creation time.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last modification time.
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Counter key the record's number is drawn from.
    pub fn sequence_key(&self) -> SequenceKey {
        SequenceKey::new(
            self.tenant_id.clone(),
            self.kind(),
            self.fiscal_year_id.clone(),
            self.scope.clone(),
        )
    }

    pub(crate) fn transition_to(&mut self, target: Status) -> Result<(), TransitionError> {
        self.status = self.status.transition_to(target)?;
        Ok(())
    }

    pub(crate) fn assign_number(
        &mut self,
        number: RegistrationNumber,
    ) -> Result<(), RecordValidationError> {
        if self.registration_number.is_some() {
            return Err(RecordValidationError::NumberAlreadyAssigned);
        }
        self.registration_number = Some(number);
        Ok(())
    }

    pub(crate) fn set_classification(&mut self, code: ClassificationCode) {
        self.classification_code = Some(code);
    }

    pub(crate) fn set_assignment(&mut self, assignment: Assignment) {
        self.assignment = Some(assignment);
    }

    pub(crate) fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub(crate) fn dispatch_mut(&mut self) -> &mut Option<DispatchDetails> {
        &mut self.dispatch
    }

    pub(crate) fn replace_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    /// Bump the version and modification time after a mutation.
    pub(crate) fn stamp(&mut self, now: DateTime<Utc>) {
        self.version = self.version.saturating_add(1);
        self.updated_at = now;
    }
}

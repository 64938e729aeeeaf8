//! Domain primitives, workflow rules and services.
//!
//! Purpose: model intake and dispatch correspondence records, the status
//! workflow they move through, the registration numbers they receive, and
//! the audit history of every change. Storage and other side effects sit
//! behind the traits in [`ports`].
//!
//! Public surface:
//! - [`RegistrationService`] implements the driving ports
//!   ([`ports::RegistrationCommand`], [`ports::RegistrationQuery`]).
//! - [`CorrespondenceRecord`] with its [`Status`] and [`RegistrationNumber`].
//! - [`DomainError`] and [`ErrorCode`], the error payload of every operation.

pub mod actor;
pub mod audit;
pub mod error;
pub mod idempotency;
pub mod identifier;
pub mod ports;
pub mod record;
pub mod registration;
pub mod sequence;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::actor::Actor;
pub use self::audit::{AuditAction, AuditDraft, AuditEntry};
pub use self::error::{DomainError, DomainErrorValidationError, ErrorCode};
pub use self::idempotency::{
    IDEMPOTENCY_KEY_MAX, IdempotencyGuard, IdempotencyKey, IdempotencyKeyValidationError,
};
pub use self::identifier::{
    ClassificationCode, DocumentId, FiscalYearId, IdentifierError, PartyId, RecordId, SubUnitId,
    TenantId, UnitId, UserId,
};
pub use self::record::{
    Assignment, Backdate, BackdateRequest, CorrespondenceRecord, CreateRecordRequest,
    DispatchChannel, DispatchDetails, Metadata, Priority, RecordDraft, RecordValidationError,
    SUBJECT_MAX, Scope, ScopeKind, ValidatedCreate,
};
pub use self::registration::{
    ApprovalDecision, DispatchInstruction, LifecycleAction, RegistrationService, ReviewDecision,
    RoutingInstruction,
};
pub use self::sequence::{RegistrationNumber, SequenceAllocator, SequenceError, SequenceKey};
pub use self::workflow::{
    DispatchStatus, IntakeStatus, RecordKind, SharedStatus, Status, TransitionError,
    UnknownCode, WorkflowDefect, WorkflowState, WorkflowTableError, verify_workflow_tables,
};

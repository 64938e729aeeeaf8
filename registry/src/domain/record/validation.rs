//! Business validation of record creation requests.

use crate::domain::error::DomainError;
use crate::domain::idempotency::IdempotencyKey;
use crate::domain::identifier::{DocumentId, FiscalYearId, PartyId, UserId};
use crate::domain::workflow::RecordKind;

use super::{Backdate, Metadata, Priority, RecordValidationError, SUBJECT_MAX, Scope, ScopeKind};

/// Backdating details supplied at intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackdateRequest {
    /// Why the entry is backdated; required.
    pub reason: String,
    /// Approving officer.
    pub approver_id: Option<String>,
}

/// Request to create an intake or dispatch record.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRecordRequest {
    /// Intake or dispatch.
    pub kind: RecordKind,
    /// Fiscal-year partition.
    pub fiscal_year_id: String,
    /// Organisation-wide or ward scope.
    pub scope: ScopeKind,
    /// Ward id; required for ward scope.
    pub sub_unit_id: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Applicant (intake) or recipient (dispatch).
    pub party_id: Option<PartyId>,
    /// Primary document.
    pub primary_document_id: Option<DocumentId>,
    /// Defaults to [`Priority::Normal`].
    pub priority: Option<Priority>,
    /// Backdating details.
    pub backdate: Option<BackdateRequest>,
    /// Deduplication token for retries.
    pub idempotency_key: Option<String>,
    /// Initial metadata.
    pub metadata: Metadata,
}

impl CreateRecordRequest {
    /// Request with the required fields and defaults elsewhere.
    pub fn new(
        kind: RecordKind,
        fiscal_year_id: impl Into<String>,
        scope: ScopeKind,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            fiscal_year_id: fiscal_year_id.into(),
            scope,
            sub_unit_id: None,
            subject: subject.into(),
            party_id: None,
            primary_document_id: None,
            priority: None,
            backdate: None,
            idempotency_key: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the ward id.
    #[must_use]
    pub fn with_sub_unit(mut self, sub_unit_id: impl Into<String>) -> Self {
        self.sub_unit_id = Some(sub_unit_id.into());
        self
    }

    /// Set the party and primary document references.
    #[must_use]
    pub fn with_references(mut self, party_id: PartyId, primary_document_id: DocumentId) -> Self {
        self.party_id = Some(party_id);
        self.primary_document_id = Some(primary_document_id);
        self
    }

    /// Set the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Validate business constraints.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::InvalidInput`](crate::domain::ErrorCode)
    /// error whose details name the offending field.
    pub fn validate(self) -> Result<ValidatedCreate, DomainError> {
        let Self {
            kind,
            fiscal_year_id,
            scope,
            sub_unit_id,
            subject,
            party_id,
            primary_document_id,
            priority,
            backdate,
            idempotency_key,
            metadata,
        } = self;

        let subject = subject.trim().to_owned();
        if subject.is_empty() {
            return Err(invalid(RecordValidationError::EmptySubject));
        }
        if subject.chars().count() > SUBJECT_MAX {
            return Err(invalid(RecordValidationError::SubjectTooLong { max: SUBJECT_MAX }));
        }
        let party_id = party_id.ok_or_else(|| {
            invalid(RecordValidationError::MissingField { field: "partyId" })
        })?;
        let primary_document_id = primary_document_id.ok_or_else(|| {
            invalid(RecordValidationError::MissingField {
                field: "primaryDocumentId",
            })
        })?;
        let fiscal_year_id = FiscalYearId::new(fiscal_year_id)
            .map_err(|err| invalid(RecordValidationError::Identifier(err)))?;
        let scope = Scope::resolve(scope, sub_unit_id.as_deref()).map_err(invalid)?;
        let backdate = backdate.map(validate_backdate).transpose()?;
        let idempotency_key = idempotency_key
            .map(IdempotencyKey::new)
            .transpose()
            .map_err(|err| {
                DomainError::invalid_input(err.to_string())
                    .with_details(serde_json::json!({ "field": "idempotencyKey" }))
            })?;

        Ok(ValidatedCreate {
            kind,
            fiscal_year_id,
            scope,
            subject,
            party_id,
            primary_document_id,
            priority: priority.unwrap_or_default(),
            backdate,
            idempotency_key,
            metadata,
        })
    }
}

fn validate_backdate(request: BackdateRequest) -> Result<Backdate, DomainError> {
    let reason = request.reason.trim().to_owned();
    if reason.is_empty() {
        return Err(invalid(RecordValidationError::MissingBackdateReason));
    }
    let approver_id = request
        .approver_id
        .map(UserId::new)
        .transpose()
        .map_err(|err| invalid(RecordValidationError::Identifier(err)))?;
    Ok(Backdate {
        reason,
        approver_id,
    })
}

fn invalid(error: RecordValidationError) -> DomainError {
    let field = error.field();
    DomainError::invalid_input(error.to_string()).with_details(serde_json::json!({ "field": field }))
}

/// Creation request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCreate {
    /// Intake or dispatch.
    pub kind: RecordKind,
    /// Fiscal-year partition.
    pub fiscal_year_id: FiscalYearId,
    /// Scope with its ward id.
    pub scope: Scope,
    /// Trimmed subject.
    pub subject: String,
    /// Applicant or recipient.
    pub party_id: PartyId,
    /// Primary document.
    pub primary_document_id: DocumentId,
    /// Handling priority.
    pub priority: Priority,
    /// Backdating approval.
    pub backdate: Option<Backdate>,
    /// Deduplication token.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Initial metadata.
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn complete() -> CreateRecordRequest {
        CreateRecordRequest::new(RecordKind::Intake, "2081-82", ScopeKind::Municipality, "Land tax appeal")
            .with_references(PartyId::random(), DocumentId::random())
    }

    fn field_of(error: &DomainError) -> Option<&str> {
        error.details().and_then(|details| details["field"].as_str())
    }

    #[rstest]
    fn complete_request_validates(complete: CreateRecordRequest) {
        let validated = complete.validate().expect("request is complete");
        assert_eq!(validated.priority, Priority::Normal);
        assert_eq!(validated.scope, Scope::Municipality);
    }

    #[rstest]
    fn ward_scope_without_sub_unit_is_invalid(complete: CreateRecordRequest) {
        let request = CreateRecordRequest {
            scope: ScopeKind::Ward,
            ..complete
        };
        let err = request.validate().expect_err("ward needs sub-unit");
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(field_of(&err), Some("subUnitId"));
    }

    #[rstest]
    #[case::blank_subject(CreateRecordRequest { subject: "  ".to_owned(), ..complete() }, "subject")]
    #[case::missing_party(CreateRecordRequest { party_id: None, ..complete() }, "partyId")]
    #[case::missing_document(
        CreateRecordRequest { primary_document_id: None, ..complete() },
        "primaryDocumentId"
    )]
    #[case::bad_fiscal_year(
        CreateRecordRequest { fiscal_year_id: "2081/82".to_owned(), ..complete() },
        "fiscal year id"
    )]
    #[case::bad_key(
        CreateRecordRequest { idempotency_key: Some(String::new()), ..complete() },
        "idempotencyKey"
    )]
    fn incomplete_requests_name_the_field(#[case] request: CreateRecordRequest, #[case] field: &str) {
        let err = request.validate().expect_err("request is incomplete");
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(field_of(&err), Some(field));
    }

    #[rstest]
    fn backdate_requires_reason(complete: CreateRecordRequest) {
        let request = CreateRecordRequest {
            backdate: Some(BackdateRequest {
                reason: " ".to_owned(),
                approver_id: None,
            }),
            ..complete
        };
        let err = request.validate().expect_err("reason missing");
        assert_eq!(err.details(), Some(&json!({"field": "backdate.reason"})));
    }

    #[rstest]
    fn subject_is_trimmed(complete: CreateRecordRequest) {
        let request = CreateRecordRequest {
            subject: "  Road repair petition ".to_owned(),
            ..complete
        };
        let validated = request.validate().expect("valid");
        assert_eq!(validated.subject, "Road repair petition");
    }
}

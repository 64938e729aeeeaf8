//! Conversion between record rows and domain records.
//!
//! Rows are rehydrated through [`CorrespondenceRecord::restore`], so a row
//! that violates a record invariant surfaces as
//! [`RecordRepositoryError::Corrupt`] rather than a half-valid record.

use std::fmt::Display;
use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::ports::RecordRepositoryError;
use crate::domain::{
    AuditAction, AuditEntry, ClassificationCode, CorrespondenceRecord, DocumentId, FiscalYearId,
    IdempotencyKey, PartyId, Priority, RecordDraft, RecordId, RecordKind, Scope, ScopeKind,
    Status, TenantId, UserId,
};

use super::models::{AuditRow, NewAuditRow, NewRecordRow, RecordChangeset, RecordRow};

fn corrupt(row_id: uuid::Uuid, field: &str, err: impl Display) -> RecordRepositoryError {
    RecordRepositoryError::corrupt(format!("row {row_id}: {field}: {err}"))
}

fn from_json<T: DeserializeOwned>(
    row_id: uuid::Uuid,
    field: &str,
    value: Option<Value>,
) -> Result<Option<T>, RecordRepositoryError> {
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(|err| corrupt(row_id, field, err))
}

fn to_json<T: Serialize>(
    field: &str,
    value: Option<&T>,
) -> Result<Option<Value>, RecordRepositoryError> {
    value
        .map(serde_json::to_value)
        .transpose()
        .map_err(|err| RecordRepositoryError::query(format!("encode {field}: {err}")))
}

/// Rehydrate a domain record from its row.
pub(crate) fn row_to_record(row: RecordRow) -> Result<CorrespondenceRecord, RecordRepositoryError> {
    let id = row.id;
    let kind = RecordKind::from_str(&row.kind).map_err(|err| corrupt(id, "kind", err))?;
    let status = Status::parse(kind, &row.status).map_err(|err| corrupt(id, "status", err))?;
    let scope_kind = ScopeKind::from_str(&row.scope).map_err(|err| corrupt(id, "scope", err))?;
    let scope = Scope::resolve(scope_kind, row.sub_unit_id.as_deref())
        .map_err(|err| corrupt(id, "scope", err))?;
    let registration_number = match (row.sequence_number, row.formatted_number) {
        (Some(sequence), Some(formatted)) => Some((sequence, formatted)),
        (None, None) => None,
        _ => return Err(corrupt(id, "registration number", "half written")),
    };
    let metadata = match row.metadata {
        Value::Object(map) => map,
        other => return Err(corrupt(id, "metadata", format!("not an object: {other}"))),
    };

    let draft = RecordDraft {
        id: RecordId::from_uuid(id),
        tenant_id: TenantId::new(row.tenant_id).map_err(|err| corrupt(id, "tenant_id", err))?,
        fiscal_year_id: FiscalYearId::new(row.fiscal_year_id)
            .map_err(|err| corrupt(id, "fiscal_year_id", err))?,
        scope,
        status,
        subject: row.subject,
        party_id: PartyId::from_uuid(row.party_id),
        primary_document_id: DocumentId::from_uuid(row.primary_document_id),
        priority: Priority::from_str(&row.priority).map_err(|err| corrupt(id, "priority", err))?,
        classification_code: row
            .classification_code
            .map(ClassificationCode::new)
            .transpose()
            .map_err(|err| corrupt(id, "classification_code", err))?,
        registration_number,
        idempotency_key: row
            .idempotency_key
            .map(IdempotencyKey::new)
            .transpose()
            .map_err(|err| corrupt(id, "idempotency_key", err))?,
        supersedes_id: row.supersedes_id.map(RecordId::from_uuid),
        backdate: from_json(id, "backdate", row.backdate)?,
        assignment: from_json(id, "assignment", row.assignment)?,
        dispatch: from_json(id, "dispatch", row.dispatch)?,
        metadata,
        version: row.version,
        created_by: UserId::new(row.created_by).map_err(|err| corrupt(id, "created_by", err))?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };

    CorrespondenceRecord::restore(draft).map_err(|err| corrupt(id, "record", err))
}

/// Build the insert row for a new record.
pub(crate) fn new_record_row(
    record: &CorrespondenceRecord,
) -> Result<NewRecordRow<'_>, RecordRepositoryError> {
    Ok(NewRecordRow {
        id: *record.id().as_uuid(),
        tenant_id: record.tenant_id().as_str(),
        kind: record.kind().as_str(),
        fiscal_year_id: record.fiscal_year_id().as_str(),
        scope: record.scope().kind().as_str(),
        sub_unit_id: record.scope().sub_unit_id().map(|ward| ward.as_str()),
        status: record.status().as_str(),
        subject: record.subject(),
        party_id: *record.party_id().as_uuid(),
        primary_document_id: *record.primary_document_id().as_uuid(),
        priority: record.priority().as_str(),
        classification_code: record.classification_code().map(|code| code.as_str()),
        sequence_number: record.sequence_number(),
        formatted_number: record.formatted_number(),
        idempotency_key: record.idempotency_key().map(IdempotencyKey::as_str),
        supersedes_id: record.supersedes_id().map(|id| *id.as_uuid()),
        backdate: to_json("backdate", record.backdate())?,
        assignment: to_json("assignment", record.assignment())?,
        dispatch: to_json("dispatch", record.dispatch())?,
        metadata: Value::Object(record.metadata().clone()),
        version: record.version(),
        created_by: record.created_by().as_str(),
        created_at: record.created_at(),
        updated_at: record.updated_at(),
    })
}

/// Build the changeset carrying a record's mutable columns.
pub(crate) fn record_changeset(
    record: &CorrespondenceRecord,
) -> Result<RecordChangeset<'_>, RecordRepositoryError> {
    Ok(RecordChangeset {
        status: record.status().as_str(),
        subject: record.subject(),
        priority: record.priority().as_str(),
        classification_code: record.classification_code().map(|code| code.as_str()),
        sequence_number: record.sequence_number(),
        formatted_number: record.formatted_number(),
        backdate: to_json("backdate", record.backdate())?,
        assignment: to_json("assignment", record.assignment())?,
        dispatch: to_json("dispatch", record.dispatch())?,
        metadata: Value::Object(record.metadata().clone()),
        version: record.version(),
        updated_at: record.updated_at(),
    })
}

/// Build the insert row for an audit entry.
pub(crate) fn new_audit_row(entry: &AuditEntry) -> NewAuditRow<'_> {
    NewAuditRow {
        id: entry.id,
        tenant_id: entry.tenant_id.as_str(),
        entity_type: entry.entity_type.as_str(),
        entity_id: *entry.entity_id.as_uuid(),
        action: entry.action.as_str(),
        performed_by: entry.performed_by.as_str(),
        changes: &entry.changes,
        recorded_at: entry.recorded_at,
    }
}

/// Rehydrate an audit entry from its row.
pub(crate) fn row_to_audit(row: AuditRow) -> Result<AuditEntry, RecordRepositoryError> {
    let id = row.id;
    Ok(AuditEntry {
        id,
        entity_type: RecordKind::from_str(&row.entity_type)
            .map_err(|err| corrupt(id, "entity_type", err))?,
        entity_id: RecordId::from_uuid(row.entity_id),
        action: AuditAction::from_str(&row.action).map_err(|err| corrupt(id, "action", err))?,
        performed_by: UserId::new(row.performed_by)
            .map_err(|err| corrupt(id, "performed_by", err))?,
        changes: row.changes,
        tenant_id: TenantId::new(row.tenant_id).map_err(|err| corrupt(id, "tenant_id", err))?,
        recorded_at: row.recorded_at,
    })
}

//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and never
//! leave it. Conversion to and from domain types lives in the repositories.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{audit_entries, correspondence_records, sequence_counters};

/// Row struct for reading from the correspondence_records table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = correspondence_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RecordRow {
    pub id: Uuid,
    pub tenant_id: String,
    pub kind: String,
    pub fiscal_year_id: String,
    pub scope: String,
    pub sub_unit_id: Option<String>,
    pub status: String,
    pub subject: String,
    pub party_id: Uuid,
    pub primary_document_id: Uuid,
    pub priority: String,
    pub classification_code: Option<String>,
    pub sequence_number: Option<i64>,
    pub formatted_number: Option<String>,
    pub idempotency_key: Option<String>,
    pub supersedes_id: Option<Uuid>,
    pub backdate: Option<serde_json::Value>,
    pub assignment: Option<serde_json::Value>,
    pub dispatch: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub version: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for creating records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = correspondence_records)]
pub(crate) struct NewRecordRow<'a> {
    pub id: Uuid,
    pub tenant_id: &'a str,
    pub kind: &'static str,
    pub fiscal_year_id: &'a str,
    pub scope: &'static str,
    pub sub_unit_id: Option<&'a str>,
    pub status: &'static str,
    pub subject: &'a str,
    pub party_id: Uuid,
    pub primary_document_id: Uuid,
    pub priority: &'static str,
    pub classification_code: Option<&'a str>,
    pub sequence_number: Option<i64>,
    pub formatted_number: Option<&'a str>,
    pub idempotency_key: Option<&'a str>,
    pub supersedes_id: Option<Uuid>,
    pub backdate: Option<serde_json::Value>,
    pub assignment: Option<serde_json::Value>,
    pub dispatch: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub version: i64,
    pub created_by: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset for the mutable columns of a record.
///
/// `None` clears the column; identity, scope and creation columns are never
/// rewritten.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = correspondence_records)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct RecordChangeset<'a> {
    pub status: &'static str,
    pub subject: &'a str,
    pub priority: &'static str,
    pub classification_code: Option<&'a str>,
    pub sequence_number: Option<i64>,
    pub formatted_number: Option<&'a str>,
    pub backdate: Option<serde_json::Value>,
    pub assignment: Option<serde_json::Value>,
    pub dispatch: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for sequence counter upserts.
///
/// `updated_at` is left to the column default.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sequence_counters)]
pub(crate) struct NewCounterRow<'a> {
    pub tenant_id: &'a str,
    pub kind: &'static str,
    pub fiscal_year_id: &'a str,
    pub scope: &'static str,
    pub sub_unit_id: &'a str,
    pub last_value: i64,
}

/// Row struct for reading from the audit_entries table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = audit_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AuditRow {
    pub id: Uuid,
    pub tenant_id: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub performed_by: String,
    pub changes: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Insertable struct for appending audit entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_entries)]
pub(crate) struct NewAuditRow<'a> {
    pub id: Uuid,
    pub tenant_id: &'a str,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub action: &'static str,
    pub performed_by: &'a str,
    pub changes: &'a serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Intake and dispatch records.
    ///
    /// `(tenant_id, idempotency_key)` is unique, as is the registration
    /// number within its counter key. A trigger rejects any change to
    /// `sequence_number` or `formatted_number` once set.
    correspondence_records (id) {
        /// Primary key: UUID v4.
        id -> Uuid,
        /// Owning tenant.
        tenant_id -> Text,
        /// `INTAKE` or `DISPATCH`.
        kind -> Text,
        /// Fiscal-year partition, e.g. `2081-82`.
        fiscal_year_id -> Text,
        /// `MUNICIPALITY` or `WARD`.
        scope -> Text,
        /// Ward id; set exactly when `scope` is `WARD`.
        sub_unit_id -> Nullable<Text>,
        /// Workflow status code of the record's kind.
        status -> Text,
        /// Subject line.
        subject -> Text,
        /// Applicant or recipient reference.
        party_id -> Uuid,
        /// Primary document reference.
        primary_document_id -> Uuid,
        /// `LOW`, `NORMAL`, `HIGH` or `URGENT`.
        priority -> Text,
        /// Classification code, once classified.
        classification_code -> Nullable<Text>,
        /// Counter value; written once.
        sequence_number -> Nullable<Int8>,
        /// Display form of the registration number; written once.
        formatted_number -> Nullable<Text>,
        /// Creation deduplication token.
        idempotency_key -> Nullable<Text>,
        /// Predecessor replaced by this record.
        supersedes_id -> Nullable<Uuid>,
        /// Backdating approval as JSON.
        backdate -> Nullable<Jsonb>,
        /// Routing details as JSON.
        assignment -> Nullable<Jsonb>,
        /// Delivery tracking as JSON.
        dispatch -> Nullable<Jsonb>,
        /// Opaque metadata object.
        metadata -> Jsonb,
        /// Optimistic concurrency version, starting at 1.
        version -> Int8,
        /// Creator.
        created_by -> Text,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Registration number counters, one row per counter key.
    ///
    /// `sub_unit_id` is the empty string for municipality scope so that it
    /// can take part in the primary key.
    sequence_counters (tenant_id, kind, fiscal_year_id, scope, sub_unit_id) {
        /// Owning tenant.
        tenant_id -> Text,
        /// `INTAKE` or `DISPATCH`.
        kind -> Text,
        /// Fiscal-year partition.
        fiscal_year_id -> Text,
        /// `MUNICIPALITY` or `WARD`.
        scope -> Text,
        /// Ward id, or empty.
        sub_unit_id -> Text,
        /// Last issued value.
        last_value -> Int8,
        /// Last advance.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only audit log; triggers reject updates and deletes.
    audit_entries (id) {
        /// Primary key: UUID v4.
        id -> Uuid,
        /// Insertion order, breaking ties between equal timestamps.
        position -> Int8,
        /// Owning tenant.
        tenant_id -> Text,
        /// `INTAKE` or `DISPATCH`.
        entity_type -> Text,
        /// Record the entry describes.
        entity_id -> Uuid,
        /// Action code.
        action -> Text,
        /// Acting user.
        performed_by -> Text,
        /// `{"delta": .., "context": ..}` document.
        changes -> Jsonb,
        /// When the change was made.
        recorded_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(audit_entries, correspondence_records);

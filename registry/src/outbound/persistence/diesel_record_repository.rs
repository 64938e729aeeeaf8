//! PostgreSQL-backed `RecordRepository` implementation using Diesel ORM.
//!
//! Every write runs in one transaction that also appends the audit entry.
//! Updates are guarded with `WHERE version = expected`; a zero-row update is
//! disambiguated into a version conflict or a missing record. Transactions
//! that fail transiently are re-run whole under the configured
//! [`RetryPolicy`].

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{
    InsertOutcome, NumberReservation, RecordInsert, RecordRepository, RecordRepositoryError,
    RecordUpdate, SupersessionWrite,
};
use crate::domain::{AuditEntry, CorrespondenceRecord, IdempotencyKey, RecordId, TenantId};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::diesel_sequence_counter_repository::advance_counter;
use super::models::{AuditRow, RecordRow};
use super::pool::DbPool;
use super::record_mapping::{
    new_audit_row, new_record_row, record_changeset, row_to_audit, row_to_record,
};
use super::retry::RetryPolicy;
use super::schema::{audit_entries, correspondence_records};

/// Diesel-backed implementation of the `RecordRepository` port.
#[derive(Clone)]
pub struct DieselRecordRepository {
    pool: DbPool,
    retry: RetryPolicy,
}

impl DieselRecordRepository {
    /// Create a new repository with the given connection pool and the
    /// default retry policy.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy for transient failures.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Failure inside a transaction closure.
///
/// Diesel needs `From<diesel::result::Error>`; domain rejections ride along
/// so that they roll the transaction back too.
enum TxError {
    Diesel(diesel::result::Error),
    Rejected(RecordRepositoryError),
}

impl From<diesel::result::Error> for TxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

impl TxError {
    fn into_repository_error(self, operation: &str) -> RecordRepositoryError {
        match self {
            Self::Diesel(err) => map_diesel_error(err, operation),
            Self::Rejected(err) => err,
        }
    }
}

/// Explain a zero-row versioned update.
async fn update_failure<C>(
    conn: &mut C,
    record: &CorrespondenceRecord,
    expected_version: i64,
) -> Result<RecordRepositoryError, TxError>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    let id = *record.id().as_uuid();
    let current: Option<i64> = correspondence_records::table
        .filter(
            correspondence_records::id
                .eq(id)
                .and(correspondence_records::tenant_id.eq(record.tenant_id().as_str())),
        )
        .select(correspondence_records::version)
        .first(conn)
        .await
        .optional()?;

    Ok(match current {
        Some(actual) => {
            debug!(record_id = %id, expected_version, actual, "stale record version");
            RecordRepositoryError::version_conflict(id.to_string(), expected_version)
        }
        None => RecordRepositoryError::missing(id.to_string()),
    })
}

async fn append_audit<C>(conn: &mut C, entry: &AuditEntry) -> Result<(), TxError>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    diesel::insert_into(audit_entries::table)
        .values(&new_audit_row(entry))
        .execute(conn)
        .await?;
    Ok(())
}

/// Versioned update plus its audit entry, on an open transaction.
async fn apply_update<C>(conn: &mut C, write: &RecordUpdate) -> Result<(), TxError>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    let record = &write.record;
    let changeset = record_changeset(record).map_err(TxError::Rejected)?;
    let id = *record.id().as_uuid();

    let updated = diesel::update(correspondence_records::table)
        .filter(
            correspondence_records::id
                .eq(id)
                .and(correspondence_records::tenant_id.eq(record.tenant_id().as_str()))
                .and(correspondence_records::version.eq(write.expected_version)),
        )
        .set(&changeset)
        .execute(conn)
        .await?;

    if updated == 0 {
        let error = update_failure(conn, record, write.expected_version).await?;
        return Err(TxError::Rejected(error));
    }

    append_audit(conn, &write.audit).await
}

/// Insert a record that cannot collide on an idempotency key.
async fn insert_plain<C>(conn: &mut C, write: &RecordInsert) -> Result<(), TxError>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    let row = new_record_row(&write.record).map_err(TxError::Rejected)?;
    diesel::insert_into(correspondence_records::table)
        .values(&row)
        .execute(conn)
        .await?;
    append_audit(conn, &write.audit).await
}

impl DieselRecordRepository {
    async fn insert_once(
        &self,
        write: &RecordInsert,
    ) -> Result<InsertOutcome, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = new_record_row(&write.record)?;
        let tenant = write.record.tenant_id().as_str();
        let key = write.record.idempotency_key().map(IdempotencyKey::as_str);

        let winner = conn
            .transaction::<_, TxError, _>(|conn| {
                async move {
                    let inserted = diesel::insert_into(correspondence_records::table)
                        .values(&row)
                        .on_conflict((
                            correspondence_records::tenant_id,
                            correspondence_records::idempotency_key,
                        ))
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    if inserted == 1 {
                        append_audit(conn, &write.audit).await?;
                        return Ok(None);
                    }

                    let Some(key) = key else {
                        return Err(TxError::Rejected(RecordRepositoryError::query(
                            "insert without idempotency key wrote no row",
                        )));
                    };
                    let existing = correspondence_records::table
                        .filter(
                            correspondence_records::tenant_id
                                .eq(tenant)
                                .and(correspondence_records::idempotency_key.eq(key)),
                        )
                        .select(RecordRow::as_select())
                        .first(conn)
                        .await?;
                    Ok(Some(existing))
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| err.into_repository_error("insert"))?;

        match winner {
            None => Ok(InsertOutcome::Inserted(write.record.clone())),
            Some(row) => {
                debug!(
                    record_id = %row.id,
                    "idempotency key already held, returning existing record"
                );
                row_to_record(row).map(InsertOutcome::Existing)
            }
        }
    }

    async fn update_once(
        &self,
        write: &RecordUpdate,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction::<_, TxError, _>(|conn| {
            async move { apply_update(conn, write).await }.scope_boxed()
        })
        .await
        .map_err(|err| err.into_repository_error("update"))?;

        Ok(write.record.clone())
    }

    async fn reserve_once(
        &self,
        write: &NumberReservation,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let key = write.key();

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                let sequence = advance_counter(conn, &key).await?;
                let (record, audit) = write.clone().complete(sequence).map_err(|err| {
                    TxError::Rejected(RecordRepositoryError::query(err.to_string()))
                })?;
                let update = RecordUpdate {
                    record,
                    expected_version: write.expected_version(),
                    audit,
                };
                apply_update(conn, &update).await?;
                Ok(update.record)
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| err.into_repository_error("reserve_number"))
    }

    async fn supersede_once(
        &self,
        write: &SupersessionWrite,
    ) -> Result<(CorrespondenceRecord, CorrespondenceRecord), RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction::<_, TxError, _>(|conn| {
            async move {
                apply_update(conn, &write.retired).await?;
                insert_plain(conn, &write.successor).await
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| err.into_repository_error("supersede"))?;

        Ok((
            write.retired.record.clone(),
            write.successor.record.clone(),
        ))
    }
}

#[async_trait]
impl RecordRepository for DieselRecordRepository {
    async fn find(
        &self,
        tenant_id: &TenantId,
        id: RecordId,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<RecordRow> = correspondence_records::table
            .filter(
                correspondence_records::id
                    .eq(*id.as_uuid())
                    .and(correspondence_records::tenant_id.eq(tenant_id.as_str())),
            )
            .select(RecordRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "find"))?;

        row.map(row_to_record).transpose()
    }

    async fn find_by_idempotency_key(
        &self,
        tenant_id: &TenantId,
        key: &IdempotencyKey,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<RecordRow> = correspondence_records::table
            .filter(
                correspondence_records::tenant_id
                    .eq(tenant_id.as_str())
                    .and(correspondence_records::idempotency_key.eq(key.as_str())),
            )
            .select(RecordRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "find_by_idempotency_key"))?;

        row.map(row_to_record).transpose()
    }

    async fn find_by_number(
        &self,
        tenant_id: &TenantId,
        formatted_number: &str,
    ) -> Result<Option<CorrespondenceRecord>, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<RecordRow> = correspondence_records::table
            .filter(
                correspondence_records::tenant_id
                    .eq(tenant_id.as_str())
                    .and(correspondence_records::formatted_number.eq(formatted_number)),
            )
            .select(RecordRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "find_by_number"))?;

        row.map(row_to_record).transpose()
    }

    async fn insert(&self, write: RecordInsert) -> Result<InsertOutcome, RecordRepositoryError> {
        let write = &write;
        self.retry
            .run("insert", move || self.insert_once(write))
            .await
    }

    async fn update(
        &self,
        write: RecordUpdate,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError> {
        let write = &write;
        self.retry
            .run("update", move || self.update_once(write))
            .await
    }

    async fn reserve_number(
        &self,
        write: NumberReservation,
    ) -> Result<CorrespondenceRecord, RecordRepositoryError> {
        let write = &write;
        self.retry
            .run("reserve_number", move || self.reserve_once(write))
            .await
    }

    async fn supersede(
        &self,
        write: SupersessionWrite,
    ) -> Result<(CorrespondenceRecord, CorrespondenceRecord), RecordRepositoryError> {
        let write = &write;
        self.retry
            .run("supersede", move || self.supersede_once(write))
            .await
    }

    async fn audit_trail(
        &self,
        tenant_id: &TenantId,
        id: RecordId,
    ) -> Result<Vec<AuditEntry>, RecordRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<AuditRow> = audit_entries::table
            .filter(
                audit_entries::tenant_id
                    .eq(tenant_id.as_str())
                    .and(audit_entries::entity_id.eq(*id.as_uuid())),
            )
            .order_by((audit_entries::recorded_at.asc(), audit_entries::position.asc()))
            .select(AuditRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "audit_trail"))?;

        rows.into_iter().map(row_to_audit).collect()
    }
}

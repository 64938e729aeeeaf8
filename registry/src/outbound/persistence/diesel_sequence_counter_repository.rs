//! PostgreSQL-backed `SequenceCounterRepository` implementation using Diesel ORM.
//!
//! A counter advances with a single `INSERT .. ON CONFLICT DO UPDATE ..
//! RETURNING` statement. PostgreSQL holds the row lock until the surrounding
//! transaction ends, so concurrent callers on one key queue on that row while
//! other keys proceed independently.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::domain::SequenceKey;
use crate::domain::ports::{SequenceCounterRepository, SequenceCounterRepositoryError};

use super::diesel_error_mapping::{map_counter_diesel_error, map_counter_pool_error};
use super::models::NewCounterRow;
use super::pool::DbPool;
use super::schema::sequence_counters;

/// Diesel-backed implementation of the `SequenceCounterRepository` port.
#[derive(Clone)]
pub struct DieselSequenceCounterRepository {
    pool: DbPool,
}

impl DieselSequenceCounterRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Storage form of a counter key; municipality scope stores an empty ward.
pub(crate) fn counter_row(key: &SequenceKey) -> NewCounterRow<'_> {
    NewCounterRow {
        tenant_id: key.tenant_id.as_str(),
        kind: key.kind.as_str(),
        fiscal_year_id: key.fiscal_year_id.as_str(),
        scope: key.scope.kind().as_str(),
        sub_unit_id: key.scope.sub_unit_id().map_or("", |ward| ward.as_str()),
        last_value: 1,
    }
}

/// Advance the counter for `key` on `conn` and return the new value.
///
/// Runs inside whatever transaction `conn` has open; a rollback returns the
/// value to the pool of unissued numbers.
pub(crate) async fn advance_counter<C>(conn: &mut C, key: &SequenceKey) -> QueryResult<i64>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    diesel::insert_into(sequence_counters::table)
        .values(&counter_row(key))
        .on_conflict((
            sequence_counters::tenant_id,
            sequence_counters::kind,
            sequence_counters::fiscal_year_id,
            sequence_counters::scope,
            sequence_counters::sub_unit_id,
        ))
        .do_update()
        .set((
            sequence_counters::last_value.eq(sequence_counters::last_value + 1_i64),
            sequence_counters::updated_at.eq(diesel::dsl::now),
        ))
        .returning(sequence_counters::last_value)
        .get_result(conn)
        .await
}

/// PostgreSQL reports `bigint out of range` when `last_value` would overflow.
pub(crate) fn is_counter_overflow(error: &DieselError) -> bool {
    matches!(
        error,
        DieselError::DatabaseError(_, info) if info.message().contains("out of range")
    )
}

#[async_trait]
impl SequenceCounterRepository for DieselSequenceCounterRepository {
    async fn advance(&self, key: &SequenceKey) -> Result<i64, SequenceCounterRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_counter_pool_error)?;

        advance_counter(&mut conn, key).await.map_err(|err| {
            if is_counter_overflow(&err) {
                SequenceCounterRepositoryError::exhausted(key.to_string())
            } else {
                map_counter_diesel_error(err, "advance")
            }
        })
    }

    async fn current(
        &self,
        key: &SequenceKey,
    ) -> Result<Option<i64>, SequenceCounterRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_counter_pool_error)?;
        let row = counter_row(key);

        sequence_counters::table
            .filter(
                sequence_counters::tenant_id
                    .eq(row.tenant_id)
                    .and(sequence_counters::kind.eq(row.kind))
                    .and(sequence_counters::fiscal_year_id.eq(row.fiscal_year_id))
                    .and(sequence_counters::scope.eq(row.scope))
                    .and(sequence_counters::sub_unit_id.eq(row.sub_unit_id)),
            )
            .select(sequence_counters::last_value)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_counter_diesel_error(err, "current"))
    }
}

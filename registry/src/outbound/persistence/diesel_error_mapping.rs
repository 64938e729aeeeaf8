//! Shared Diesel error mapping for the registry repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::{RecordRepositoryError, SequenceCounterRepositoryError};

use super::pool::PoolError;

/// Unique index guarding registration numbers within a counter key.
pub(crate) const NUMBER_INDEX: &str = "correspondence_records_number_key";
/// Unique index guarding formatted numbers within a tenant.
pub(crate) const FORMATTED_NUMBER_INDEX: &str = "correspondence_records_formatted_number_key";

fn log_diesel_error(error: &DieselError, operation: &str) {
    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                %operation,
                "diesel operation failed"
            );
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(error),
            %operation,
            "diesel operation failed"
        ),
    }
}

/// Map pool errors to record repository errors.
pub(crate) fn map_pool_error(error: PoolError) -> RecordRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            RecordRepositoryError::connection(message)
        }
    }
}

/// Map Diesel errors to record repository errors.
///
/// Serialisation failures become [`RecordRepositoryError::Contention`] so the
/// retry policy can re-run the transaction; a unique violation on a number
/// index becomes [`RecordRepositoryError::DuplicateNumber`].
pub(crate) fn map_diesel_error(error: DieselError, operation: &str) -> RecordRepositoryError {
    log_diesel_error(&error, operation);

    match error {
        DieselError::NotFound => RecordRepositoryError::query("record not found"),
        DieselError::QueryBuilderError(_) => RecordRepositoryError::query("database query error"),
        DieselError::DatabaseError(kind, info) => match kind {
            DatabaseErrorKind::ClosedConnection => {
                RecordRepositoryError::connection("database connection error")
            }
            DatabaseErrorKind::SerializationFailure => {
                RecordRepositoryError::contention(info.message())
            }
            DatabaseErrorKind::UniqueViolation
                if matches!(
                    info.constraint_name(),
                    Some(NUMBER_INDEX | FORMATTED_NUMBER_INDEX)
                ) =>
            {
                RecordRepositoryError::duplicate_number(info.message())
            }
            _ => RecordRepositoryError::query("database error"),
        },
        DieselError::DeserializationError(err) => RecordRepositoryError::corrupt(err.to_string()),
        _ => RecordRepositoryError::query("database error"),
    }
}

/// Map pool errors to sequence counter errors.
pub(crate) fn map_counter_pool_error(error: PoolError) -> SequenceCounterRepositoryError {
    SequenceCounterRepositoryError::connection(error.message())
}

/// Map Diesel errors to sequence counter errors.
pub(crate) fn map_counter_diesel_error(
    error: DieselError,
    operation: &str,
) -> SequenceCounterRepositoryError {
    log_diesel_error(&error, operation);

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            SequenceCounterRepositoryError::connection("database connection error")
        }
        _ => SequenceCounterRepositoryError::query("database error"),
    }
}

//! Idempotent record creation.
//!
//! Callers may attach an [`IdempotencyKey`] to a creation request. The
//! [`IdempotencyGuard`] looks the key up per tenant before anything is
//! written; storage additionally enforces `(tenant_id, idempotency_key)`
//! uniqueness so that a creation losing a concurrent race resolves to the
//! winner's record instead of a duplicate.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::DomainError;
use super::identifier::TenantId;
use super::ports::{RecordRepository, RecordRepositoryError};
use super::record::CorrespondenceRecord;

/// Maximum key length in characters.
pub const IDEMPOTENCY_KEY_MAX: usize = 128;

/// Validation errors for [`IdempotencyKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyKeyValidationError {
    /// The key was empty.
    Empty,
    /// The key had leading or trailing whitespace.
    Untrimmed,
    /// The key exceeded [`IDEMPOTENCY_KEY_MAX`].
    TooLong,
    /// The key contained non-printable or non-ASCII characters.
    InvalidCharacters,
}

impl fmt::Display for IdempotencyKeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "idempotency key must not be empty"),
            Self::Untrimmed => {
                write!(f, "idempotency key must not have surrounding whitespace")
            }
            Self::TooLong => write!(
                f,
                "idempotency key must be at most {IDEMPOTENCY_KEY_MAX} characters"
            ),
            Self::InvalidCharacters => {
                write!(f, "idempotency key must contain printable ASCII only")
            }
        }
    }
}

impl std::error::Error for IdempotencyKeyValidationError {}

/// Caller-supplied token deduplicating retried creation requests.
///
/// # Examples
/// ```
/// use correspondence_registry::domain::IdempotencyKey;
///
/// let key = IdempotencyKey::new("K1").expect("valid key");
/// assert_eq!(key.as_str(), "K1");
/// assert!(IdempotencyKey::new(" K1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validate and construct a key.
    ///
    /// # Errors
    ///
    /// Rejects keys outside 1..=128 printable ASCII characters or with
    /// surrounding whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, IdempotencyKeyValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdempotencyKeyValidationError::Empty);
        }
        if value.trim() != value {
            return Err(IdempotencyKeyValidationError::Untrimmed);
        }
        if value.len() > IDEMPOTENCY_KEY_MAX {
            return Err(IdempotencyKeyValidationError::TooLong);
        }
        if !value.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
            return Err(IdempotencyKeyValidationError::InvalidCharacters);
        }
        Ok(Self(value))
    }

    /// Borrow the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Short-circuits creation when a key has already been used by the tenant.
pub struct IdempotencyGuard<R> {
    records: Arc<R>,
}

impl<R> Clone for IdempotencyGuard<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<R: RecordRepository> IdempotencyGuard<R> {
    /// Create a guard over the record store.
    pub fn new(records: Arc<R>) -> Self {
        Self { records }
    }

    /// Return the record previously created with `key`, if any.
    ///
    /// Requests without a key are never deduplicated.
    ///
    /// # Errors
    ///
    /// Storage failures are reported as
    /// [`ErrorCode::Internal`](crate::domain::ErrorCode).
    pub async fn resolve(
        &self,
        tenant_id: &TenantId,
        key: Option<&IdempotencyKey>,
    ) -> Result<Option<CorrespondenceRecord>, DomainError> {
        let Some(key) = key else {
            return Ok(None);
        };
        let existing = self
            .records
            .find_by_idempotency_key(tenant_id, key)
            .await
            .map_err(map_lookup_error)?;
        if let Some(record) = &existing {
            debug!(
                tenant_id = %tenant_id,
                idempotency_key = %key,
                record_id = %record.id(),
                "idempotency key already used; replaying record"
            );
        }
        Ok(existing)
    }
}

fn map_lookup_error(error: RecordRepositoryError) -> DomainError {
    DomainError::internal(format!("idempotency lookup failed: {error}"))
}

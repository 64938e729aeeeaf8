//! Standalone number allocation over the counter port.

use std::sync::Arc;

use tracing::debug;

use crate::domain::error::DomainError;
use crate::domain::ports::{SequenceCounterRepository, SequenceCounterRepositoryError};

use super::{RegistrationNumber, SequenceKey};

/// Issues registration numbers for a [`SequenceKey`].
///
/// Each successful call advances the counter exactly once. Uniqueness under
/// concurrency is the adapter's atomic increment; the allocator adds
/// formatting and error mapping.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use correspondence_registry::domain::{
///     FiscalYearId, RecordKind, Scope, SequenceAllocator, SequenceKey, TenantId,
/// };
/// use correspondence_registry::outbound::memory::InMemoryRegistry;
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let allocator = SequenceAllocator::new(Arc::new(InMemoryRegistry::default()));
/// let key = SequenceKey::new(
///     TenantId::new("T1").expect("tenant"),
///     RecordKind::Intake,
///     FiscalYearId::new("2081-82").expect("fiscal year"),
///     Scope::Municipality,
/// );
/// let number = allocator.reserve_next(&key).await.expect("allocates");
/// assert_eq!(number.formatted_number(), "2081-82/MUN/D-00001");
/// # });
/// ```
pub struct SequenceAllocator<C> {
    counters: Arc<C>,
}

impl<C> Clone for SequenceAllocator<C> {
    fn clone(&self) -> Self {
        Self {
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<C: SequenceCounterRepository> SequenceAllocator<C> {
    /// Create an allocator over the given counters.
    pub fn new(counters: Arc<C>) -> Self {
        Self { counters }
    }

    /// Advance the counter for `key` and format the new value.
    ///
    /// # Errors
    ///
    /// Counter failures are reported as [`crate::domain::ErrorCode::Internal`].
    pub async fn reserve_next(&self, key: &SequenceKey) -> Result<RegistrationNumber, DomainError> {
        let value = self.counters.advance(key).await.map_err(map_counter_error)?;
        let number = RegistrationNumber::issue(key, value)
            .map_err(|err| DomainError::internal(format!("counter returned invalid value: {err}")))?;
        debug!(key = %key, sequence = value, "reserved registration number");
        Ok(number)
    }

    /// Last value issued for `key`, if any.
    ///
    /// # Errors
    ///
    /// Counter read failures are reported as
    /// [`crate::domain::ErrorCode::Internal`].
    pub async fn last_issued(&self, key: &SequenceKey) -> Result<Option<i64>, DomainError> {
        self.counters.current(key).await.map_err(map_counter_error)
    }
}

fn map_counter_error(error: SequenceCounterRepositoryError) -> DomainError {
    match error {
        SequenceCounterRepositoryError::Connection { message } => {
            DomainError::internal(format!("sequence counter unavailable: {message}"))
        }
        SequenceCounterRepositoryError::Query { message } => {
            DomainError::internal(format!("sequence counter error: {message}"))
        }
        SequenceCounterRepositoryError::Exhausted { key } => {
            DomainError::internal(format!("sequence counter exhausted for {key}"))
        }
    }
}

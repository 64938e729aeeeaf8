//! Port abstraction for registration sequence counters.
//!
//! Adapters must advance a counter with an atomic read-increment-write so
//! that concurrent callers on the same key never observe the same value,
//! while callers on different keys never wait on one another.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use crate::domain::sequence::SequenceKey;

use super::define_port_error;

define_port_error! {
    /// Errors raised by sequence counter adapters.
    pub enum SequenceCounterRepositoryError {
        /// Connection could not be established or was lost.
        Connection { message: String } => "sequence counter connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "sequence counter query failed: {message}",
        /// The counter cannot advance further.
        Exhausted { key: String } => "sequence counter exhausted for {key}",
    }
}

/// Port for monotonically increasing counters keyed by [`SequenceKey`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SequenceCounterRepository: Send + Sync {
    /// Advance the counter by one and return the new value.
    ///
    /// A counter that does not exist yet is created and returns 1.
    async fn advance(&self, key: &SequenceKey) -> Result<i64, SequenceCounterRepositoryError>;

    /// Last value issued for `key`, if any.
    async fn current(&self, key: &SequenceKey)
    -> Result<Option<i64>, SequenceCounterRepositoryError>;
}

/// Fixture implementation sharing one counter across all keys.
#[derive(Debug, Default)]
pub struct FixtureSequenceCounterRepository {
    last: AtomicI64,
}

#[async_trait]
impl SequenceCounterRepository for FixtureSequenceCounterRepository {
    async fn advance(&self, _key: &SequenceKey) -> Result<i64, SequenceCounterRepositoryError> {
        Ok(self.last.fetch_add(1, Ordering::SeqCst).saturating_add(1))
    }

    async fn current(
        &self,
        _key: &SequenceKey,
    ) -> Result<Option<i64>, SequenceCounterRepositoryError> {
        let last = self.last.load(Ordering::SeqCst);
        Ok((last > 0).then_some(last))
    }
}

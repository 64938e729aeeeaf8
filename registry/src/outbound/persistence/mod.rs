//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the record and counter ports backed by
//! PostgreSQL through `diesel-async` and a `bb8` connection pool.
//!
//! - Repositories only translate between rows and domain types; workflow
//!   rules stay in the domain.
//! - Row structs (`models.rs`) and table definitions (`schema.rs`) never
//!   leave this module.
//! - Each write is one transaction holding the record change, any counter
//!   advance and the audit entry.
//!
//! # Example
//!
//! ```ignore
//! use correspondence_registry::outbound::persistence::{
//!     DbPool, DieselRecordRepository, PoolConfig, RetryPolicy,
//! };
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/registry")).await?;
//! let records = DieselRecordRepository::new(pool).with_retry_policy(RetryPolicy::default());
//! ```

mod diesel_error_mapping;
mod diesel_record_repository;
mod diesel_sequence_counter_repository;
mod models;
mod pool;
mod record_mapping;
mod retry;
mod schema;

pub use diesel_record_repository::DieselRecordRepository;
pub use diesel_sequence_counter_repository::DieselSequenceCounterRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
pub use retry::RetryPolicy;

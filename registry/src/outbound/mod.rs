//! Outbound adapters implementing domain ports.
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **memory**: in-process repositories for tests and embedded use
//!
//! Adapters convert between domain types and storage representations and
//! contain no workflow rules.

pub mod memory;
pub mod persistence;

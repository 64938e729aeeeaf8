//! Correspondence registration engine.
//!
//! Registers incoming (intake) and outgoing (dispatch) correspondence for a
//! government office: each record moves through a fixed status workflow,
//! receives a sequential registration number scoped by fiscal year and
//! organisational scope, and keeps an append-only audit trail.
//!
//! - [`domain`] holds the records, workflow, number allocation and the
//!   registration service, with storage behind port traits.
//! - [`outbound`] provides the PostgreSQL and in-process adapters.
//! - [`config`] loads adapter settings.

pub mod config;
pub mod domain;
pub mod outbound;

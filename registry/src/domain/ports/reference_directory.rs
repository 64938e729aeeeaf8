//! Port for checking that referenced parties and documents exist.
//!
//! Applicant, recipient and document records are owned by other services;
//! the engine only needs to know whether a reference resolves within the
//! tenant before it creates a record pointing at it.

use async_trait::async_trait;

use crate::domain::identifier::{DocumentId, PartyId, TenantId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by reference directory adapters.
    pub enum ReferenceDirectoryError {
        /// The directory could not be reached.
        Connection { message: String } => "reference directory connection failed: {message}",
        /// The lookup failed.
        Query { message: String } => "reference directory query failed: {message}",
    }
}

/// Existence checks for external references.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferenceDirectory: Send + Sync {
    /// Whether the applicant or recipient exists for the tenant.
    async fn party_exists(
        &self,
        tenant_id: &TenantId,
        party_id: PartyId,
    ) -> Result<bool, ReferenceDirectoryError>;

    /// Whether the document exists for the tenant.
    async fn document_exists(
        &self,
        tenant_id: &TenantId,
        document_id: DocumentId,
    ) -> Result<bool, ReferenceDirectoryError>;
}

/// Fixture implementation that resolves every reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureReferenceDirectory;

#[async_trait]
impl ReferenceDirectory for FixtureReferenceDirectory {
    async fn party_exists(
        &self,
        _tenant_id: &TenantId,
        _party_id: PartyId,
    ) -> Result<bool, ReferenceDirectoryError> {
        Ok(true)
    }

    async fn document_exists(
        &self,
        _tenant_id: &TenantId,
        _document_id: DocumentId,
    ) -> Result<bool, ReferenceDirectoryError> {
        Ok(true)
    }
}

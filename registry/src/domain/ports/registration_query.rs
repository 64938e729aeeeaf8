//! Driving port for tenant-scoped record reads.

use async_trait::async_trait;

use crate::domain::{Actor, AuditEntry, CorrespondenceRecord, DomainError, RecordId};

/// Domain use-case port for reading records and their history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrationQuery: Send + Sync {
    /// Fetch a record by id.
    ///
    /// Records of other tenants are reported as `NotFound`.
    async fn get(&self, actor: &Actor, id: RecordId) -> Result<CorrespondenceRecord, DomainError>;

    /// Fetch a record by its formatted registration number.
    async fn get_by_number(
        &self,
        actor: &Actor,
        formatted_number: &str,
    ) -> Result<CorrespondenceRecord, DomainError>;

    /// Audit entries of a record, oldest first.
    async fn audit_trail(&self, actor: &Actor, id: RecordId) -> Result<Vec<AuditEntry>, DomainError>;
}

/// Fixture query that knows no records.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureRegistrationQuery;

#[async_trait]
impl RegistrationQuery for FixtureRegistrationQuery {
    async fn get(&self, _actor: &Actor, id: RecordId) -> Result<CorrespondenceRecord, DomainError> {
        Err(DomainError::not_found(format!("record {id} not found")))
    }

    async fn get_by_number(
        &self,
        _actor: &Actor,
        formatted_number: &str,
    ) -> Result<CorrespondenceRecord, DomainError> {
        Err(DomainError::not_found(format!(
            "no record holds number {formatted_number}"
        )))
    }

    async fn audit_trail(&self, _actor: &Actor, _id: RecordId) -> Result<Vec<AuditEntry>, DomainError> {
        Ok(Vec::new())
    }
}

//! Shared wiring for registry integration tests.
//!
//! Every suite under `tests/` compiles this module, so the in-memory harness
//! and the embedded PostgreSQL helpers live side by side.

pub mod cluster_skip;
pub mod embedded_postgres;

use std::sync::Arc;

use correspondence_registry::domain::{
    Actor, CreateRecordRequest, DocumentId, PartyId, RecordKind, RegistrationService, ScopeKind,
};
use correspondence_registry::outbound::memory::{InMemoryReferenceDirectory, InMemoryRegistry};
use mockable::DefaultClock;

pub use cluster_skip::handle_cluster_setup_failure;
pub use embedded_postgres::{provision_template_database, shared_cluster_handle};

pub type Service = RegistrationService<InMemoryRegistry, InMemoryReferenceDirectory>;

/// Service over in-memory stores, with the references it needs to resolve.
pub struct Harness {
    pub service: Service,
    pub store: Arc<InMemoryRegistry>,
    pub actor: Actor,
    pub party_id: PartyId,
    pub document_id: DocumentId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(InMemoryRegistry::default())
    }

    pub fn with_store(store: InMemoryRegistry) -> Self {
        let actor = Actor::try_new("registrar-1", "T1").expect("valid actor");
        let party_id = PartyId::random();
        let document_id = DocumentId::random();
        let references = InMemoryReferenceDirectory::default()
            .with_party(actor.tenant_id().clone(), party_id)
            .with_document(actor.tenant_id().clone(), document_id);
        let store = Arc::new(store);
        let service = RegistrationService::new(
            Arc::clone(&store),
            Arc::new(references),
            Arc::new(DefaultClock),
        );
        Self {
            service,
            store,
            actor,
            party_id,
            document_id,
        }
    }

    /// Municipality-scoped request for fiscal year 2081-82.
    pub fn request(&self, kind: RecordKind) -> CreateRecordRequest {
        CreateRecordRequest::new(kind, "2081-82", ScopeKind::Municipality, "Request for land survey")
            .with_references(self.party_id, self.document_id)
    }
}

/// Render a `postgres` error with its SQLSTATE and server message.
///
/// `Display` on `postgres::Error` often collapses to `db error`.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };
    let mut summary = format!(
        "postgres error {:?}: {}",
        db_error.code(),
        db_error.message()
    );
    if let Some(detail) = db_error.detail() {
        summary.push_str("; detail: ");
        summary.push_str(detail);
    }
    if let Some(hint) = db_error.hint() {
        summary.push_str("; hint: ");
        summary.push_str(hint);
    }
    summary
}

//! Caller identity passed explicitly into every engine operation.

use serde::{Deserialize, Serialize};

use super::identifier::{IdentifierError, TenantId, UserId};

/// Resolved caller identity supplied by the boundary layer.
///
/// The engine never authenticates; it uses the actor for tenant scoping and
/// audit attribution only.
///
/// # Examples
/// ```
/// use correspondence_registry::domain::Actor;
///
/// let actor = Actor::try_new("clerk-7", "kathmandu-metro")
///     .expect("identifiers are valid")
///     .with_roles(["registrar"]);
/// assert_eq!(actor.tenant_id().as_str(), "kathmandu-metro");
/// assert!(actor.has_role("registrar"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    user_id: UserId,
    tenant_id: TenantId,
    #[serde(default)]
    roles: Vec<String>,
}

impl Actor {
    /// Build an actor from validated identifiers.
    pub fn new(user_id: UserId, tenant_id: TenantId) -> Self {
        Self {
            user_id,
            tenant_id,
            roles: Vec::new(),
        }
    }

    /// Build an actor from raw identifier strings.
    ///
    /// # Errors
    ///
    /// Fails when either identifier is invalid.
    pub fn try_new(
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Result<Self, IdentifierError> {
        Ok(Self::new(UserId::new(user_id)?, TenantId::new(tenant_id)?))
    }

    /// Attach role names resolved by the boundary.
    #[must_use]
    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Acting user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Tenant every operation is scoped to.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Role names, opaque to the engine.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Whether the actor carries the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|candidate| candidate == role)
    }
}

//! Organisational scope of a record.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::identifier::SubUnitId;
use crate::domain::workflow::UnknownCode;

use super::RecordValidationError;

/// Discriminant of [`Scope`] as supplied by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeKind {
    /// Organisation-wide.
    Municipality,
    /// A single sub-unit.
    Ward,
}

impl ScopeKind {
    /// Stable storage code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Municipality => "MUNICIPALITY",
            Self::Ward => "WARD",
        }
    }
}

impl FromStr for ScopeKind {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MUNICIPALITY" => Ok(Self::Municipality),
            "WARD" => Ok(Self::Ward),
            other => Err(UnknownCode {
                what: "scope",
                value: other.to_owned(),
            }),
        }
    }
}

/// Whether a record belongs to the whole organisation or one ward.
///
/// The ward variant carries its sub-unit id, so a ward record without one
/// cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Organisation-wide.
    Municipality,
    /// Scoped to the given ward.
    Ward(SubUnitId),
}

impl Scope {
    /// Build a scope from the caller's discriminant and optional sub-unit id.
    ///
    /// # Errors
    ///
    /// Ward scope without a sub-unit id, municipality scope with one, and
    /// malformed sub-unit ids are rejected.
    ///
    /// # Examples
    /// ```
    /// use correspondence_registry::domain::{Scope, ScopeKind};
    ///
    /// assert!(Scope::resolve(ScopeKind::Ward, None).is_err());
    /// let ward = Scope::resolve(ScopeKind::Ward, Some("05")).expect("valid ward");
    /// assert_eq!(ward.number_code(), "W05");
    /// ```
    pub fn resolve(kind: ScopeKind, sub_unit_id: Option<&str>) -> Result<Self, RecordValidationError> {
        let sub_unit_id = sub_unit_id.filter(|raw| !raw.trim().is_empty());
        match (kind, sub_unit_id) {
            (ScopeKind::Municipality, None) => Ok(Self::Municipality),
            (ScopeKind::Municipality, Some(_)) => Err(RecordValidationError::UnexpectedSubUnit),
            (ScopeKind::Ward, None) => Err(RecordValidationError::MissingSubUnit),
            (ScopeKind::Ward, Some(raw)) => SubUnitId::new(raw)
                .map(Self::Ward)
                .map_err(RecordValidationError::Identifier),
        }
    }

    /// Discriminant of the scope.
    pub const fn kind(&self) -> ScopeKind {
        match self {
            Self::Municipality => ScopeKind::Municipality,
            Self::Ward(_) => ScopeKind::Ward,
        }
    }

    /// Sub-unit id when ward-scoped.
    pub const fn sub_unit_id(&self) -> Option<&SubUnitId> {
        match self {
            Self::Municipality => None,
            Self::Ward(id) => Some(id),
        }
    }

    /// Scope segment of a formatted registration number.
    pub fn number_code(&self) -> String {
        match self {
            Self::Municipality => "MUN".to_owned(),
            Self::Ward(id) => format!("W{id}"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Municipality => f.write_str(ScopeKind::Municipality.as_str()),
            Self::Ward(id) => write!(f, "{}({id})", ScopeKind::Ward.as_str()),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Scope", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("subUnitId", &self.sub_unit_id())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ScopeKind::Ward, None, RecordValidationError::MissingSubUnit)]
    #[case(ScopeKind::Ward, Some("  "), RecordValidationError::MissingSubUnit)]
    #[case(ScopeKind::Municipality, Some("3"), RecordValidationError::UnexpectedSubUnit)]
    fn inconsistent_scopes_are_rejected(
        #[case] kind: ScopeKind,
        #[case] sub_unit: Option<&str>,
        #[case] expected: RecordValidationError,
    ) {
        assert_eq!(Scope::resolve(kind, sub_unit), Err(expected));
    }

    #[rstest]
    fn municipality_scope_uses_mun_code() {
        let scope = Scope::resolve(ScopeKind::Municipality, None).expect("valid scope");
        assert_eq!(scope.number_code(), "MUN");
        assert!(scope.sub_unit_id().is_none());
    }

    #[rstest]
    fn ward_scope_serialises_sub_unit() {
        let scope = Scope::resolve(ScopeKind::Ward, Some("12")).expect("valid scope");
        let value = serde_json::to_value(&scope).expect("serialises");
        assert_eq!(value, serde_json::json!({"kind": "WARD", "subUnitId": "12"}));
    }
}

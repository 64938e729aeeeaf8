//! Validated identifier newtypes shared across the domain.
//!
//! Text identifiers (tenants, users, fiscal years, wards) arrive from the
//! boundary as opaque strings; UUID identifiers name records and the parties
//! and documents they reference.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors raised when constructing an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The value was empty.
    Empty {
        /// Identifier kind, e.g. `tenant id`.
        kind: &'static str,
    },
    /// The value carried leading or trailing whitespace.
    Untrimmed {
        /// Identifier kind.
        kind: &'static str,
    },
    /// The value exceeded the permitted length.
    TooLong {
        /// Identifier kind.
        kind: &'static str,
        /// Maximum permitted length in characters.
        max: usize,
    },
    /// The value contained characters outside the permitted set.
    InvalidCharacters {
        /// Identifier kind.
        kind: &'static str,
    },
    /// The value is not a UUID.
    InvalidUuid {
        /// Identifier kind.
        kind: &'static str,
    },
}

impl IdentifierError {
    /// Identifier kind the error refers to.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty { kind }
            | Self::Untrimmed { kind }
            | Self::TooLong { kind, .. }
            | Self::InvalidCharacters { kind }
            | Self::InvalidUuid { kind } => kind,
        }
    }
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { kind } => write!(f, "{kind} must not be empty"),
            Self::Untrimmed { kind } => {
                write!(f, "{kind} must not have leading or trailing whitespace")
            }
            Self::TooLong { kind, max } => write!(f, "{kind} must be at most {max} characters"),
            Self::InvalidCharacters { kind } => write!(f, "{kind} contains invalid characters"),
            Self::InvalidUuid { kind } => write!(f, "{kind} must be a valid UUID"),
        }
    }
}

impl std::error::Error for IdentifierError {}

fn validate_text(
    value: &str,
    kind: &'static str,
    max: usize,
    allowed: fn(char) -> bool,
) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { kind });
    }
    if value.trim() != value {
        return Err(IdentifierError::Untrimmed { kind });
    }
    if value.chars().count() > max {
        return Err(IdentifierError::TooLong { kind, max });
    }
    if !value.chars().all(allowed) {
        return Err(IdentifierError::InvalidCharacters { kind });
    }
    Ok(())
}

fn opaque_char(c: char) -> bool {
    !c.is_control()
}

fn code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn fiscal_year_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn sub_unit_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

macro_rules! define_text_id {
    (
        $(#[$meta:meta])*
        $name:ident, kind = $kind:literal, max = $max:literal, chars = $allowed:path
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and construct the identifier.
            ///
            /// # Errors
            ///
            /// Rejects empty or over-long values and disallowed characters.
            pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
                let value = value.into();
                validate_text(&value, $kind, $max, $allowed)?;
                Ok(Self(value))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

macro_rules! define_uuid_id {
    ($(#[$meta:meta])* $name:ident, kind = $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse the identifier from its textual UUID form.
            ///
            /// # Errors
            ///
            /// Returns [`IdentifierError::InvalidUuid`] for malformed input.
            pub fn parse(value: &str) -> Result<Self, IdentifierError> {
                Uuid::parse_str(value)
                    .map(Self)
                    .map_err(|_| IdentifierError::InvalidUuid { kind: $kind })
            }

            /// Access the underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

define_text_id! {
    /// Tenant isolation boundary.
    TenantId, kind = "tenant id", max = 128, chars = opaque_char
}

define_text_id! {
    /// Caller identity as resolved by the boundary layer.
    UserId, kind = "user id", max = 128, chars = opaque_char
}

define_text_id! {
    /// Accounting-period partition, e.g. `2081-82`.
    FiscalYearId, kind = "fiscal year id", max = 16, chars = fiscal_year_char
}

define_text_id! {
    /// Sub-unit (ward) identifier used by ward-scoped records.
    SubUnitId, kind = "sub-unit id", max = 16, chars = sub_unit_char
}

define_text_id! {
    /// Subject classification code assigned during intake classification.
    ClassificationCode, kind = "classification code", max = 64, chars = code_char
}

define_text_id! {
    /// Organisational unit a record is routed to.
    UnitId, kind = "unit id", max = 64, chars = code_char
}

define_uuid_id! {
    /// Identifier of a correspondence record.
    RecordId, kind = "record id"
}

define_uuid_id! {
    /// Applicant (intake) or recipient (dispatch) reference.
    PartyId, kind = "party id"
}

define_uuid_id! {
    /// Reference to a stored document.
    DocumentId, kind = "document id"
}

//! Registration numbering: counter keys, number formatting and allocation.
//!
//! Each [`SequenceKey`] owns an independent monotonically increasing counter.
//! Values are never reused; formatted numbers read
//! `{fiscal_year}/{scope_code}/{prefix}-{sequence:05}`.

mod allocator;

use std::fmt;

use serde::{Deserialize, Serialize};

use super::identifier::{FiscalYearId, TenantId};
use super::record::Scope;
use super::workflow::RecordKind;

pub use allocator::SequenceAllocator;

/// Counter partition: one series per tenant, kind, fiscal year and scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceKey {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Intake and dispatch numbers form separate series.
    pub kind: RecordKind,
    /// Fiscal-year partition.
    pub fiscal_year_id: FiscalYearId,
    /// Organisation-wide or ward scope.
    pub scope: Scope,
}

impl SequenceKey {
    /// Build a key from its parts.
    pub fn new(tenant_id: TenantId, kind: RecordKind, fiscal_year_id: FiscalYearId, scope: Scope) -> Self {
        Self {
            tenant_id,
            kind,
            fiscal_year_id,
            scope,
        }
    }

    /// Format a sequence value under this key.
    ///
    /// # Examples
    /// ```
    /// use correspondence_registry::domain::{
    ///     FiscalYearId, RecordKind, Scope, SequenceKey, TenantId,
    /// };
    ///
    /// let key = SequenceKey::new(
    ///     TenantId::new("T1").expect("tenant"),
    ///     RecordKind::Intake,
    ///     FiscalYearId::new("2081-82").expect("fiscal year"),
    ///     Scope::Municipality,
    /// );
    /// assert_eq!(key.format(1), "2081-82/MUN/D-00001");
    /// ```
    pub fn format(&self, sequence: i64) -> String {
        format!(
            "{}/{}/{}-{sequence:05}",
            self.fiscal_year_id,
            self.scope.number_code(),
            self.kind.number_prefix()
        )
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.tenant_id, self.kind, self.fiscal_year_id, self.scope
        )
    }
}

/// Errors raised while issuing numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// Counters start at 1.
    NonPositive {
        /// Rejected value.
        value: i64,
    },
    /// The counter cannot advance further.
    Exhausted,
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive { value } => {
                write!(f, "sequence values must be positive, got {value}")
            }
            Self::Exhausted => write!(f, "sequence counter exhausted"),
        }
    }
}

impl std::error::Error for SequenceError {}

/// Next value after `last_issued` (0 when the counter is new).
///
/// # Errors
///
/// Returns [`SequenceError::Exhausted`] on overflow.
pub fn next_value(last_issued: i64) -> Result<i64, SequenceError> {
    last_issued.checked_add(1).ok_or(SequenceError::Exhausted)
}

/// Sequence value and display string assigned to a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationNumber {
    sequence_number: i64,
    formatted_number: String,
}

impl RegistrationNumber {
    /// Issue the number for `sequence` under `key`.
    ///
    /// # Errors
    ///
    /// Rejects non-positive values.
    pub fn issue(key: &SequenceKey, sequence: i64) -> Result<Self, SequenceError> {
        if sequence < 1 {
            return Err(SequenceError::NonPositive { value: sequence });
        }
        Ok(Self {
            sequence_number: sequence,
            formatted_number: key.format(sequence),
        })
    }

    /// Integer position in the series.
    pub const fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    /// Human-readable registration number.
    pub fn formatted_number(&self) -> &str {
        &self.formatted_number
    }
}

impl fmt::Display for RegistrationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identifier::SubUnitId;
    use rstest::{fixture, rstest};

    #[fixture]
    fn municipal_intake() -> SequenceKey {
        SequenceKey::new(
            TenantId::new("T1").expect("tenant"),
            RecordKind::Intake,
            FiscalYearId::new("2081-82").expect("fiscal year"),
            Scope::Municipality,
        )
    }

    #[rstest]
    #[case(1, "2081-82/MUN/D-00001")]
    #[case(42, "2081-82/MUN/D-00042")]
    #[case(99_999, "2081-82/MUN/D-99999")]
    #[case(123_456, "2081-82/MUN/D-123456")]
    fn formats_zero_padded_numbers(municipal_intake: SequenceKey, #[case] value: i64, #[case] expected: &str) {
        assert_eq!(municipal_intake.format(value), expected);
    }

    #[rstest]
    fn ward_dispatch_numbers_use_ward_code_and_c_prefix(municipal_intake: SequenceKey) {
        let key = SequenceKey {
            kind: RecordKind::Dispatch,
            scope: Scope::Ward(SubUnitId::new("05").expect("ward")),
            ..municipal_intake
        };
        assert_eq!(key.format(7), "2081-82/W05/C-00007");
    }

    #[rstest]
    fn issue_rejects_zero(municipal_intake: SequenceKey) {
        assert_eq!(
            RegistrationNumber::issue(&municipal_intake, 0),
            Err(SequenceError::NonPositive { value: 0 })
        );
    }

    #[rstest]
    fn next_value_detects_overflow() {
        assert_eq!(next_value(0), Ok(1));
        assert_eq!(next_value(i64::MAX), Err(SequenceError::Exhausted));
    }

    #[rstest]
    fn keys_differ_by_kind(municipal_intake: SequenceKey) {
        let dispatch = SequenceKey {
            kind: RecordKind::Dispatch,
            ..municipal_intake.clone()
        };
        assert_ne!(dispatch, municipal_intake);
    }
}

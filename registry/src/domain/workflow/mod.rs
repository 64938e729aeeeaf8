//! Status workflow for intake and dispatch records.
//!
//! Each record kind owns an immutable adjacency table expressed as `match`
//! arms from a status to the slice of statuses it may move to. The tables
//! are checked once at startup by [`verify_workflow_tables`].

/// Declares a status enum with its stable codes and `ALL` listing.
macro_rules! workflow_states {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$variant_meta:meta])* $variant:ident => $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$variant_meta])* $variant, )+
        }

        impl $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),+];

            const fn code(self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

mod dispatch;
mod intake;

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;

use super::error::DomainError;

pub use dispatch::DispatchStatus;
pub use intake::IntakeStatus;

/// Direction of a record: incoming (intake) or outgoing (dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    /// Incoming correspondence.
    Intake,
    /// Outgoing correspondence.
    Dispatch,
}

impl RecordKind {
    /// Stable storage and audit code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "INTAKE",
            Self::Dispatch => "DISPATCH",
        }
    }

    /// Series prefix used in formatted registration numbers.
    pub const fn number_prefix(self) -> char {
        match self {
            Self::Intake => 'D',
            Self::Dispatch => 'C',
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCode {
    /// What was being parsed, e.g. `record kind`.
    pub what: &'static str,
    /// Rejected input.
    pub value: String,
}

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.what, self.value)
    }
}

impl std::error::Error for UnknownCode {}

impl FromStr for RecordKind {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INTAKE" => Ok(Self::Intake),
            "DISPATCH" => Ok(Self::Dispatch),
            other => Err(UnknownCode {
                what: "record kind",
                value: other.to_owned(),
            }),
        }
    }
}

/// Behaviour shared by the per-kind status enums.
pub trait WorkflowState: Copy + Eq + Hash + fmt::Debug + 'static {
    /// Every status of the kind.
    const ALL: &'static [Self];
    /// Status assigned at creation.
    const INITIAL: Self;
    /// Statuses with no outgoing edges.
    const TERMINAL: &'static [Self];

    /// Stable code, e.g. `PENDING_REVIEW`.
    fn as_str(self) -> &'static str;

    /// Statuses reachable in one step.
    fn successors(self) -> &'static [Self];

    /// Whether the status has no outgoing edges.
    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Whether `next` is a legal successor.
    fn can_transition_to(self, next: Self) -> bool {
        self.successors().contains(&next)
    }

    /// Parse a stable code.
    fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.as_str() == raw)
    }
}

/// Statuses whose names exist in both workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedStatus {
    /// Initial editable state.
    Draft,
    /// Awaiting review.
    PendingReview,
    /// Number allocated, registration pending.
    NumberReserved,
    /// Formally registered.
    Registered,
    /// Cancelled.
    Voided,
    /// Completed.
    Closed,
}

/// Workflow status tagged with its record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Status of an intake record.
    Intake(IntakeStatus),
    /// Status of a dispatch record.
    Dispatch(DispatchStatus),
}

impl Status {
    /// Initial status for a record kind.
    pub const fn initial(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Intake => Self::Intake(IntakeStatus::INITIAL),
            RecordKind::Dispatch => Self::Dispatch(DispatchStatus::INITIAL),
        }
    }

    /// Resolve a status present in both workflows for the given kind.
    pub const fn shared(kind: RecordKind, status: SharedStatus) -> Self {
        match kind {
            RecordKind::Intake => Self::Intake(match status {
                SharedStatus::Draft => IntakeStatus::Draft,
                SharedStatus::PendingReview => IntakeStatus::PendingReview,
                SharedStatus::NumberReserved => IntakeStatus::NumberReserved,
                SharedStatus::Registered => IntakeStatus::Registered,
                SharedStatus::Voided => IntakeStatus::Voided,
                SharedStatus::Closed => IntakeStatus::Closed,
            }),
            RecordKind::Dispatch => Self::Dispatch(match status {
                SharedStatus::Draft => DispatchStatus::Draft,
                SharedStatus::PendingReview => DispatchStatus::PendingReview,
                SharedStatus::NumberReserved => DispatchStatus::NumberReserved,
                SharedStatus::Registered => DispatchStatus::Registered,
                SharedStatus::Voided => DispatchStatus::Voided,
                SharedStatus::Closed => DispatchStatus::Closed,
            }),
        }
    }

    /// Parse a stored status code for the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownCode`] when `raw` is not a status of `kind`.
    pub fn parse(kind: RecordKind, raw: &str) -> Result<Self, UnknownCode> {
        let parsed = match kind {
            RecordKind::Intake => IntakeStatus::parse(raw).map(Self::Intake),
            RecordKind::Dispatch => DispatchStatus::parse(raw).map(Self::Dispatch),
        };
        parsed.ok_or_else(|| UnknownCode {
            what: "status",
            value: raw.to_owned(),
        })
    }

    /// Record kind the status belongs to.
    pub const fn kind(self) -> RecordKind {
        match self {
            Self::Intake(_) => RecordKind::Intake,
            Self::Dispatch(_) => RecordKind::Dispatch,
        }
    }

    /// Stable code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intake(status) => status.as_str(),
            Self::Dispatch(status) => status.as_str(),
        }
    }

    /// Whether the status has no outgoing edges.
    pub fn is_terminal(self) -> bool {
        match self {
            Self::Intake(status) => status.is_terminal(),
            Self::Dispatch(status) => status.is_terminal(),
        }
    }

    /// Every status reachable in one step.
    pub fn successors(self) -> Vec<Self> {
        match self {
            Self::Intake(status) => status.successors().iter().copied().map(Self::Intake).collect(),
            Self::Dispatch(status) => status
                .successors()
                .iter()
                .copied()
                .map(Self::Dispatch)
                .collect(),
        }
    }

    /// Validate the edge `self → target`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the kinds differ or the edge is not in
    /// the table.
    pub fn transition_to(self, target: Self) -> Result<Self, TransitionError> {
        let allowed = match (self, target) {
            (Self::Intake(from), Self::Intake(to)) => from.can_transition_to(to),
            (Self::Dispatch(from), Self::Dispatch(to)) => from.can_transition_to(to),
            _ => false,
        };
        if allowed {
            Ok(target)
        } else {
            Err(TransitionError {
                from: self,
                to: target,
            })
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A requested status edge that the workflow does not permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    /// Current status.
    pub from: Status,
    /// Requested status.
    pub to: Status,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from.kind() == self.to.kind() {
            write!(
                f,
                "{} record cannot move from {} to {}",
                self.from.kind().as_str().to_lowercase(),
                self.from,
                self.to
            )
        } else {
            write!(
                f,
                "status {} belongs to {} records, not {}",
                self.to,
                self.to.kind(),
                self.from.kind()
            )
        }
    }
}

impl std::error::Error for TransitionError {}

impl From<TransitionError> for DomainError {
    fn from(value: TransitionError) -> Self {
        let allowed: Vec<&'static str> = value
            .from
            .successors()
            .into_iter()
            .map(Status::as_str)
            .collect();
        Self::invalid_transition(value.to_string()).with_details(json!({
            "from": value.from.as_str(),
            "to": value.to.as_str(),
            "allowed": allowed,
        }))
    }
}

/// Structural defect found while verifying a transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowDefect {
    /// A declared terminal status has outgoing edges.
    TerminalHasEdges,
    /// A non-terminal status has no outgoing edges.
    DeadEnd,
    /// A status lists itself as a successor.
    SelfLoop,
    /// The status cannot be reached from the initial status.
    Unreachable,
    /// No terminal status can be reached from the status.
    NoPathToTerminal,
}

/// Verification failure for one status of one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTableError {
    /// Kind whose table is defective.
    pub kind: RecordKind,
    /// Offending status code.
    pub status: &'static str,
    /// What is wrong with it.
    pub defect: WorkflowDefect,
}

impl fmt::Display for WorkflowTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let problem = match self.defect {
            WorkflowDefect::TerminalHasEdges => "is terminal but has outgoing edges",
            WorkflowDefect::DeadEnd => "has no outgoing edges but is not terminal",
            WorkflowDefect::SelfLoop => "transitions to itself",
            WorkflowDefect::Unreachable => "is unreachable from the initial status",
            WorkflowDefect::NoPathToTerminal => "cannot reach a terminal status",
        };
        write!(f, "{} workflow: {} {problem}", self.kind, self.status)
    }
}

impl std::error::Error for WorkflowTableError {}

/// Check both transition tables for structural defects.
///
/// # Errors
///
/// Returns the first defect found.
pub fn verify_workflow_tables() -> Result<(), WorkflowTableError> {
    verify_table::<IntakeStatus>(RecordKind::Intake)?;
    verify_table::<DispatchStatus>(RecordKind::Dispatch)
}

fn verify_table<S: WorkflowState>(kind: RecordKind) -> Result<(), WorkflowTableError> {
    let fail = |status: S, defect| WorkflowTableError {
        kind,
        status: status.as_str(),
        defect,
    };

    for &status in S::ALL {
        let declared_terminal = S::TERMINAL.contains(&status);
        match (declared_terminal, status.is_terminal()) {
            (true, false) => return Err(fail(status, WorkflowDefect::TerminalHasEdges)),
            (false, true) => return Err(fail(status, WorkflowDefect::DeadEnd)),
            _ => {}
        }
        if status.can_transition_to(status) {
            return Err(fail(status, WorkflowDefect::SelfLoop));
        }
    }

    let mut reached = HashSet::from([S::INITIAL]);
    let mut frontier = vec![S::INITIAL];
    while let Some(status) = frontier.pop() {
        for &next in status.successors() {
            if reached.insert(next) {
                frontier.push(next);
            }
        }
    }
    if let Some(&status) = S::ALL.iter().find(|status| !reached.contains(status)) {
        return Err(fail(status, WorkflowDefect::Unreachable));
    }

    let mut settled: HashSet<S> = S::TERMINAL.iter().copied().collect();
    loop {
        let before = settled.len();
        for &status in S::ALL {
            if status.successors().iter().any(|next| settled.contains(next)) {
                settled.insert(status);
            }
        }
        if settled.len() == before {
            break;
        }
    }
    match S::ALL.iter().find(|status| !settled.contains(status)) {
        Some(&status) => Err(fail(status, WorkflowDefect::NoPathToTerminal)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests;

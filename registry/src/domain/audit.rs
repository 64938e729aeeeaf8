//! Append-only audit trail.
//!
//! Every successful mutation of a record yields exactly one [`AuditEntry`].
//! Services describe the mutation with an [`AuditDraft`] captured before the
//! change and complete it against the mutated record; storage adapters
//! persist the entry in the same transaction as the record write.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::actor::Actor;
use super::error::DomainError;
use super::identifier::{RecordId, TenantId, UserId};
use super::record::CorrespondenceRecord;
use super::workflow::{RecordKind, UnknownCode};

/// Record fields excluded from the change delta.
const UNTRACKED_FIELDS: &[&str] = &["version", "updatedAt"];

macro_rules! audit_actions {
    ($( $(#[$meta:meta])* $variant:ident => $code:literal ),+ $(,)?) => {
        /// Action recorded in an audit entry.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum AuditAction {
            $( $(#[$meta])* $variant, )+
        }

        impl AuditAction {
            /// Stable storage code.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }

        impl FromStr for AuditAction {
            type Err = UnknownCode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok(Self::$variant),)+
                    other => Err(UnknownCode {
                        what: "audit action",
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

audit_actions! {
    /// Record created.
    Created => "CREATED",
    /// Successor created by supersession.
    CreatedAsSuccessor => "CREATED_AS_SUCCESSOR",
    /// Submitted for review.
    SubmittedForReview => "SUBMITTED_FOR_REVIEW",
    /// Review approved.
    ReviewApproved => "REVIEW_APPROVED",
    /// Returned to the drafter.
    ReturnedToDraft => "RETURNED_TO_DRAFT",
    /// Sent back from classification to review.
    ReturnedToReview => "RETURNED_TO_REVIEW",
    /// Classification code set.
    Classified => "CLASSIFIED",
    /// Approved by the approving officer.
    Approved => "APPROVED",
    /// Rejected by the approving officer.
    Rejected => "REJECTED",
    /// Registration number allocated.
    NumberReserved => "NUMBER_RESERVED",
    /// Registration finalised.
    Registered => "REGISTERED",
    /// Number reserved and registration finalised in one step.
    DirectlyRegistered => "DIRECTLY_REGISTERED",
    /// Routed to a section.
    Routed => "ROUTED",
    /// Section review started.
    SectionReviewStarted => "SECTION_REVIEW_STARTED",
    /// Clarification requested from the applicant.
    ClarificationRequested => "CLARIFICATION_REQUESTED",
    /// Clarification received.
    ClarificationProvided => "CLARIFICATION_PROVIDED",
    /// Accepted by the section.
    Accepted => "ACCEPTED",
    /// Action recorded.
    ActionRecorded => "ACTION_RECORDED",
    /// Response issued.
    ResponseIssued => "RESPONSE_ISSUED",
    /// Acknowledgement requested.
    AcknowledgementRequested => "ACKNOWLEDGEMENT_REQUESTED",
    /// Acknowledgement received.
    AcknowledgementReceived => "ACKNOWLEDGEMENT_RECEIVED",
    /// Signed.
    Signed => "SIGNED",
    /// Sealed.
    Sealed => "SEALED",
    /// Handed to a delivery channel.
    Dispatched => "DISPATCHED",
    /// Reported in transit.
    MarkedInTransit => "MARKED_IN_TRANSIT",
    /// Recipient acknowledged.
    Acknowledged => "ACKNOWLEDGED",
    /// Delivery confirmed.
    Delivered => "DELIVERED",
    /// Returned undelivered.
    ReturnedUndelivered => "RETURNED_UNDELIVERED",
    /// Recalled after dispatch.
    Recalled => "RECALLED",
    /// Replaced by a successor.
    Superseded => "SUPERSEDED",
    /// Voided.
    Voided => "VOIDED",
    /// Closed.
    Closed => "CLOSED",
    /// Scan attached.
    ScanRecorded => "SCAN_RECORDED",
    /// Metadata changed.
    MetadataUpdated => "METADATA_UPDATED",
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write-once log entry describing one mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Entry id.
    pub id: Uuid,
    /// Kind of the mutated record.
    pub entity_type: RecordKind,
    /// Mutated record.
    pub entity_id: RecordId,
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub performed_by: UserId,
    /// `{"delta": {field: {"from", "to"}}, "context": {..}}`.
    pub changes: Value,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// When it happened.
    pub recorded_at: DateTime<Utc>,
}

/// Pending audit entry captured before a mutation is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    action: AuditAction,
    performed_by: UserId,
    before: Option<Map<String, Value>>,
    context: Map<String, Value>,
    recorded_at: DateTime<Utc>,
}

impl AuditDraft {
    /// Describe a mutation of `before` (or a creation when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::Internal`](crate::domain::ErrorCode) when the
    /// record cannot be serialised into a snapshot.
    pub fn new(
        action: AuditAction,
        actor: &Actor,
        before: Option<&CorrespondenceRecord>,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            action,
            performed_by: actor.user_id().clone(),
            before: before.map(snapshot).transpose()?,
            context: Map::new(),
            recorded_at,
        })
    }

    /// Attach action context such as remarks or reasons.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Action being recorded.
    pub const fn action(&self) -> AuditAction {
        self.action
    }

    /// Finish the entry against the mutated record.
    ///
    /// # Errors
    ///
    /// Fails only if the record cannot be serialised.
    pub fn complete(self, after: &CorrespondenceRecord) -> Result<AuditEntry, DomainError> {
        let after_fields = snapshot(after)?;
        let delta = field_delta(self.before.as_ref(), &after_fields);
        let mut changes = json!({ "delta": delta });
        if !self.context.is_empty() {
            if let Some(object) = changes.as_object_mut() {
                object.insert("context".to_owned(), Value::Object(self.context));
            }
        }
        Ok(AuditEntry {
            id: Uuid::new_v4(),
            entity_type: after.kind(),
            entity_id: after.id(),
            action: self.action,
            performed_by: self.performed_by,
            changes,
            tenant_id: after.tenant_id().clone(),
            recorded_at: self.recorded_at,
        })
    }
}

fn snapshot(record: &CorrespondenceRecord) -> Result<Map<String, Value>, DomainError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(DomainError::internal("record did not serialise to an object")),
        Err(err) => Err(DomainError::internal(format!("failed to serialise record: {err}"))),
    }
}

fn field_delta(before: Option<&Map<String, Value>>, after: &Map<String, Value>) -> Map<String, Value> {
    let empty = Map::new();
    let before = before.unwrap_or(&empty);
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    keys.into_iter()
        .filter(|key| !UNTRACKED_FIELDS.contains(&key.as_str()))
        .filter_map(|key| {
            let from = before.get(key).unwrap_or(&Value::Null);
            let to = after.get(key).unwrap_or(&Value::Null);
            (from != to).then(|| (key.clone(), json!({ "from": from, "to": to })))
        })
        .collect()
}

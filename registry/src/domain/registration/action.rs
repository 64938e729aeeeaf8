//! Lifecycle actions and their effect on a record.
//!
//! Each variant names one business action. Applying it validates the
//! action's input, moves the record along the matching workflow edge and
//! sets any fields the action owns. Nothing is persisted here; the service
//! writes the mutated copy together with its audit entry.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};

use crate::domain::audit::AuditAction;
use crate::domain::error::DomainError;
use crate::domain::identifier::{ClassificationCode, DocumentId, UnitId, UserId};
use crate::domain::record::{
    Assignment, CorrespondenceRecord, DispatchChannel, DispatchDetails, Priority,
};
use crate::domain::workflow::{
    DispatchStatus, IntakeStatus, RecordKind, SharedStatus, Status,
};

/// Longest accepted SLA, one year.
const SLA_HOURS_MAX: u32 = 24 * 366;

/// Outcome of a review step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Intake moves to classification, dispatch to approval.
    Approve,
    /// Back to the drafter with remarks.
    ReturnForEdits {
        /// Why the record was returned.
        remarks: String,
    },
}

/// Outcome of the dispatch approval step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Approved for numbering.
    Approve,
    /// Back to draft.
    Reject {
        /// Why approval was refused.
        reason: String,
    },
}

/// Routing of an intake record to a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingInstruction {
    /// Section to route to.
    pub unit_id: String,
    /// Responsible officer.
    pub assignee_id: Option<String>,
    /// Overrides the record's priority when set.
    pub priority: Option<Priority>,
    /// Hours allowed before the SLA deadline.
    pub sla_hours: Option<u32>,
}

/// Hand-over of a dispatch record to a delivery channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchInstruction {
    /// Delivery channel.
    pub channel: DispatchChannel,
    /// Channel tracking reference.
    pub tracking_reference: Option<String>,
}

/// A status-changing business action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// `DRAFT → PENDING_REVIEW`.
    SubmitForReview,
    /// Review outcome.
    Review(ReviewDecision),
    /// Intake `CLASSIFICATION → PENDING_REVIEW`.
    ReturnToReview {
        /// Why classification was abandoned.
        remarks: String,
    },
    /// Set the classification code while in `CLASSIFICATION`.
    Classify {
        /// Subject classification code.
        classification_code: String,
    },
    /// Dispatch approval outcome.
    ApprovalDecision(ApprovalDecision),
    /// `NUMBER_RESERVED → REGISTERED`.
    FinalizeRegistration,
    /// Intake `REGISTERED | IN_REVIEW → ASSIGNED`.
    Route(RoutingInstruction),
    /// Intake `ASSIGNED → IN_REVIEW`.
    StartSectionReview,
    /// Intake `IN_REVIEW → NEEDS_CLARIFICATION`.
    RequestClarification {
        /// What the applicant must clarify.
        note: String,
    },
    /// Intake `NEEDS_CLARIFICATION → IN_REVIEW`.
    ProvideClarification {
        /// Summary of the clarification received.
        note: String,
    },
    /// Intake `IN_REVIEW → ACCEPTED`.
    Accept,
    /// Intake `ACCEPTED → ACTION_TAKEN`.
    RecordAction {
        /// What was done.
        summary: String,
    },
    /// Intake `ACTION_TAKEN → RESPONSE_ISSUED`.
    IssueResponse {
        /// Outgoing response document.
        response_document_id: Option<DocumentId>,
    },
    /// Intake `RESPONSE_ISSUED → ACK_REQUESTED`.
    RequestAcknowledgement,
    /// Intake `ACK_REQUESTED → ACK_RECEIVED`.
    ReceiveAcknowledgement,
    /// Dispatch `→ SIGNED`.
    Sign,
    /// Dispatch `→ SEALED`.
    Seal,
    /// Dispatch `→ DISPATCHED`, including resends after a return.
    Dispatch(DispatchInstruction),
    /// Dispatch `DISPATCHED → IN_TRANSIT`.
    MarkInTransit,
    /// Dispatch `→ ACKNOWLEDGED`.
    Acknowledge,
    /// Dispatch `→ DELIVERED`.
    MarkDelivered,
    /// Dispatch `→ RETURNED_UNDELIVERED`.
    MarkReturned {
        /// Channel's return reason.
        reason: String,
    },
    /// Dispatch `→ RECALLED`.
    Recall {
        /// Why the letter was recalled.
        reason: String,
    },
    /// `→ VOIDED`.
    Void {
        /// Why the record was voided.
        reason: String,
    },
    /// `→ CLOSED`.
    Close {
        /// Closing remarks.
        remarks: Option<String>,
    },
}

/// What applying an action did, for the audit entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AppliedAction {
    pub audit: AuditAction,
    pub context: Map<String, Value>,
}

impl AppliedAction {
    fn new(audit: AuditAction) -> Self {
        Self {
            audit,
            context: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_owned(), value.into());
        self
    }
}

impl LifecycleAction {
    /// Short name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SubmitForReview => "submit_for_review",
            Self::Review(_) => "review",
            Self::ReturnToReview { .. } => "return_to_review",
            Self::Classify { .. } => "classify",
            Self::ApprovalDecision(_) => "approval_decision",
            Self::FinalizeRegistration => "finalize_registration",
            Self::Route(_) => "route",
            Self::StartSectionReview => "start_section_review",
            Self::RequestClarification { .. } => "request_clarification",
            Self::ProvideClarification { .. } => "provide_clarification",
            Self::Accept => "accept",
            Self::RecordAction { .. } => "record_action",
            Self::IssueResponse { .. } => "issue_response",
            Self::RequestAcknowledgement => "request_acknowledgement",
            Self::ReceiveAcknowledgement => "receive_acknowledgement",
            Self::Sign => "sign",
            Self::Seal => "seal",
            Self::Dispatch(_) => "dispatch",
            Self::MarkInTransit => "mark_in_transit",
            Self::Acknowledge => "acknowledge",
            Self::MarkDelivered => "mark_delivered",
            Self::MarkReturned { .. } => "mark_returned",
            Self::Recall { .. } => "recall",
            Self::Void { .. } => "void",
            Self::Close { .. } => "close",
        }
    }

    /// Apply the action to `record` in place.
    ///
    /// On error the record may be partially modified; callers apply actions
    /// to a copy and discard it on failure.
    pub(crate) fn apply(
        self,
        record: &mut CorrespondenceRecord,
        now: DateTime<Utc>,
    ) -> Result<AppliedAction, DomainError> {
        let kind = record.kind();
        let shared = |status| Status::shared(kind, status);

        match self {
            Self::SubmitForReview => {
                record.transition_to(shared(SharedStatus::PendingReview))?;
                Ok(AppliedAction::new(AuditAction::SubmittedForReview))
            }
            Self::Review(ReviewDecision::Approve) => {
                let target = match kind {
                    RecordKind::Intake => Status::Intake(IntakeStatus::Classification),
                    RecordKind::Dispatch => Status::Dispatch(DispatchStatus::PendingApproval),
                };
                record.transition_to(target)?;
                Ok(AppliedAction::new(AuditAction::ReviewApproved))
            }
            Self::Review(ReviewDecision::ReturnForEdits { remarks }) => {
                let remarks = required_text("remarks", remarks)?;
                record.transition_to(shared(SharedStatus::Draft))?;
                Ok(AppliedAction::new(AuditAction::ReturnedToDraft).with("remarks", remarks))
            }
            Self::ReturnToReview { remarks } => {
                let remarks = required_text("remarks", remarks)?;
                record.transition_to(Status::Intake(IntakeStatus::PendingReview))?;
                Ok(AppliedAction::new(AuditAction::ReturnedToReview).with("remarks", remarks))
            }
            Self::Classify {
                classification_code,
            } => {
                let code = ClassificationCode::new(classification_code)
                    .map_err(|err| field_error("classificationCode", &err.to_string()))?;
                let required = Status::Intake(IntakeStatus::Classification);
                if record.status() != required {
                    return Err(DomainError::invalid_transition(format!(
                        "classification requires status {required}, record is {}",
                        record.status()
                    ))
                    .with_details(json!({ "status": record.status().as_str() })));
                }
                record.set_classification(code);
                Ok(AppliedAction::new(AuditAction::Classified))
            }
            Self::ApprovalDecision(ApprovalDecision::Approve) => {
                record.transition_to(Status::Dispatch(DispatchStatus::Approved))?;
                Ok(AppliedAction::new(AuditAction::Approved))
            }
            Self::ApprovalDecision(ApprovalDecision::Reject { reason }) => {
                let reason = required_text("reason", reason)?;
                record.transition_to(Status::Dispatch(DispatchStatus::Draft))?;
                Ok(AppliedAction::new(AuditAction::Rejected).with("reason", reason))
            }
            Self::FinalizeRegistration => {
                record.transition_to(shared(SharedStatus::Registered))?;
                Ok(AppliedAction::new(AuditAction::Registered))
            }
            Self::Route(instruction) => route(record, instruction, now),
            Self::StartSectionReview => {
                record.transition_to(Status::Intake(IntakeStatus::InReview))?;
                Ok(AppliedAction::new(AuditAction::SectionReviewStarted))
            }
            Self::RequestClarification { note } => {
                let note = required_text("note", note)?;
                record.transition_to(Status::Intake(IntakeStatus::NeedsClarification))?;
                Ok(AppliedAction::new(AuditAction::ClarificationRequested).with("note", note))
            }
            Self::ProvideClarification { note } => {
                let note = required_text("note", note)?;
                record.transition_to(Status::Intake(IntakeStatus::InReview))?;
                Ok(AppliedAction::new(AuditAction::ClarificationProvided).with("note", note))
            }
            Self::Accept => {
                record.transition_to(Status::Intake(IntakeStatus::Accepted))?;
                Ok(AppliedAction::new(AuditAction::Accepted))
            }
            Self::RecordAction { summary } => {
                let summary = required_text("summary", summary)?;
                record.transition_to(Status::Intake(IntakeStatus::ActionTaken))?;
                Ok(AppliedAction::new(AuditAction::ActionRecorded).with("summary", summary))
            }
            Self::IssueResponse {
                response_document_id,
            } => {
                record.transition_to(Status::Intake(IntakeStatus::ResponseIssued))?;
                let applied = AppliedAction::new(AuditAction::ResponseIssued);
                Ok(match response_document_id {
                    Some(document) => applied.with("responseDocumentId", document.to_string()),
                    None => applied,
                })
            }
            Self::RequestAcknowledgement => {
                record.transition_to(Status::Intake(IntakeStatus::AckRequested))?;
                Ok(AppliedAction::new(AuditAction::AcknowledgementRequested))
            }
            Self::ReceiveAcknowledgement => {
                record.transition_to(Status::Intake(IntakeStatus::AckReceived))?;
                Ok(AppliedAction::new(AuditAction::AcknowledgementReceived))
            }
            Self::Sign => {
                record.transition_to(Status::Dispatch(DispatchStatus::Signed))?;
                Ok(AppliedAction::new(AuditAction::Signed))
            }
            Self::Seal => {
                record.transition_to(Status::Dispatch(DispatchStatus::Sealed))?;
                Ok(AppliedAction::new(AuditAction::Sealed))
            }
            Self::Dispatch(instruction) => dispatch(record, instruction, now),
            Self::MarkInTransit => {
                record.transition_to(Status::Dispatch(DispatchStatus::InTransit))?;
                Ok(AppliedAction::new(AuditAction::MarkedInTransit))
            }
            Self::Acknowledge => {
                record.transition_to(Status::Dispatch(DispatchStatus::Acknowledged))?;
                Ok(AppliedAction::new(AuditAction::Acknowledged))
            }
            Self::MarkDelivered => {
                record.transition_to(Status::Dispatch(DispatchStatus::Delivered))?;
                if let Some(details) = record.dispatch_mut().as_mut() {
                    details.delivered_at = Some(now);
                }
                Ok(AppliedAction::new(AuditAction::Delivered))
            }
            Self::MarkReturned { reason } => {
                let reason = required_text("reason", reason)?;
                record.transition_to(Status::Dispatch(DispatchStatus::ReturnedUndelivered))?;
                Ok(AppliedAction::new(AuditAction::ReturnedUndelivered).with("reason", reason))
            }
            Self::Recall { reason } => {
                let reason = required_text("reason", reason)?;
                record.transition_to(Status::Dispatch(DispatchStatus::Recalled))?;
                Ok(AppliedAction::new(AuditAction::Recalled).with("reason", reason))
            }
            Self::Void { reason } => {
                let reason = required_text("reason", reason)?;
                record.transition_to(shared(SharedStatus::Voided))?;
                Ok(AppliedAction::new(AuditAction::Voided).with("reason", reason))
            }
            Self::Close { remarks } => {
                record.transition_to(shared(SharedStatus::Closed))?;
                let applied = AppliedAction::new(AuditAction::Closed);
                Ok(match remarks.map(|text| text.trim().to_owned()) {
                    Some(text) if !text.is_empty() => applied.with("remarks", text),
                    _ => applied,
                })
            }
        }
    }
}

fn route(
    record: &mut CorrespondenceRecord,
    instruction: RoutingInstruction,
    now: DateTime<Utc>,
) -> Result<AppliedAction, DomainError> {
    let RoutingInstruction {
        unit_id,
        assignee_id,
        priority,
        sla_hours,
    } = instruction;
    let unit_id =
        UnitId::new(unit_id).map_err(|err| field_error("unitId", &err.to_string()))?;
    let assignee_id = assignee_id
        .map(UserId::new)
        .transpose()
        .map_err(|err| field_error("assigneeId", &err.to_string()))?;
    let sla_deadline = match sla_hours {
        None => None,
        Some(0) => return Err(field_error("slaHours", "SLA hours must be positive")),
        Some(hours) if hours > SLA_HOURS_MAX => {
            return Err(field_error(
                "slaHours",
                &format!("SLA hours must be at most {SLA_HOURS_MAX}"),
            ));
        }
        Some(hours) => Some(now + Duration::hours(i64::from(hours))),
    };

    record.transition_to(Status::Intake(IntakeStatus::Assigned))?;
    if let Some(priority) = priority {
        record.set_priority(priority);
    }
    record.set_assignment(Assignment {
        unit_id,
        assignee_id,
        sla_deadline,
        assigned_at: now,
    });
    Ok(AppliedAction::new(AuditAction::Routed))
}

fn dispatch(
    record: &mut CorrespondenceRecord,
    instruction: DispatchInstruction,
    now: DateTime<Utc>,
) -> Result<AppliedAction, DomainError> {
    let tracking_reference = instruction
        .tracking_reference
        .map(|reference| required_text("trackingReference", reference))
        .transpose()?;

    record.transition_to(Status::Dispatch(DispatchStatus::Dispatched))?;
    let attempts = record
        .dispatch()
        .map_or(1, |previous| previous.attempts.saturating_add(1));
    *record.dispatch_mut() = Some(DispatchDetails {
        channel: instruction.channel,
        tracking_reference,
        dispatched_at: now,
        attempts,
        delivered_at: None,
    });
    Ok(AppliedAction::new(AuditAction::Dispatched).with("attempt", attempts))
}

fn required_text(field: &str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(field_error(field, &format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}

fn field_error(field: &str, message: &str) -> DomainError {
    DomainError::invalid_input(message).with_details(json!({ "field": field }))
}

//! Intake (incoming correspondence) workflow.

use super::WorkflowState;

workflow_states! {
    /// Lifecycle status of an intake record.
    pub enum IntakeStatus {
        /// Being prepared by the front desk.
        Draft => "DRAFT",
        /// Awaiting registrar review.
        PendingReview => "PENDING_REVIEW",
        /// Review approved; subject classification in progress.
        Classification => "CLASSIFICATION",
        /// Registration number allocated.
        NumberReserved => "NUMBER_RESERVED",
        /// Entered in the register.
        Registered => "REGISTERED",
        /// Routed to a section.
        Assigned => "ASSIGNED",
        /// Under section review.
        InReview => "IN_REVIEW",
        /// Waiting on the applicant.
        NeedsClarification => "NEEDS_CLARIFICATION",
        /// Accepted by the section.
        Accepted => "ACCEPTED",
        /// Action recorded.
        ActionTaken => "ACTION_TAKEN",
        /// Response sent to the applicant.
        ResponseIssued => "RESPONSE_ISSUED",
        /// Applicant acknowledgement requested.
        AckRequested => "ACK_REQUESTED",
        /// Applicant acknowledgement received.
        AckReceived => "ACK_RECEIVED",
        /// Completed.
        Closed => "CLOSED",
        /// Cancelled.
        Voided => "VOIDED",
    }
}

impl WorkflowState for IntakeStatus {
    const ALL: &'static [Self] = Self::VARIANTS;
    const INITIAL: Self = Self::Draft;
    const TERMINAL: &'static [Self] = &[Self::Closed, Self::Voided];

    fn as_str(self) -> &'static str {
        self.code()
    }

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::PendingReview, Self::Voided],
            Self::PendingReview => &[Self::Classification, Self::Draft, Self::Voided],
            Self::Classification => &[Self::NumberReserved, Self::PendingReview],
            Self::NumberReserved => &[Self::Registered, Self::Voided],
            Self::Registered => &[Self::Assigned, Self::Voided],
            Self::Assigned => &[Self::InReview, Self::Voided],
            Self::InReview => &[Self::NeedsClarification, Self::Accepted, Self::Assigned],
            Self::NeedsClarification => &[Self::InReview],
            Self::Accepted => &[Self::ActionTaken],
            Self::ActionTaken => &[Self::ResponseIssued, Self::Closed],
            Self::ResponseIssued => &[Self::AckRequested, Self::Closed],
            Self::AckRequested => &[Self::AckReceived, Self::Closed],
            Self::AckReceived => &[Self::Closed],
            Self::Closed | Self::Voided => &[],
        }
    }
}

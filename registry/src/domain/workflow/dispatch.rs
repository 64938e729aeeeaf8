//! Dispatch (outgoing correspondence) workflow.
//!
//! Approval precedes numbering; once registered a letter may be signed and
//! sealed before dispatch. Delivery tracking ends in `CLOSED`, while
//! `VOIDED`, `RECALLED` and `SUPERSEDED` provide the escape routes.

use super::WorkflowState;

workflow_states! {
    /// Lifecycle status of a dispatch record.
    pub enum DispatchStatus {
        /// Being drafted.
        Draft => "DRAFT",
        /// Awaiting review.
        PendingReview => "PENDING_REVIEW",
        /// Reviewed; awaiting the approving officer.
        PendingApproval => "PENDING_APPROVAL",
        /// Approved for numbering.
        Approved => "APPROVED",
        /// Registration number allocated.
        NumberReserved => "NUMBER_RESERVED",
        /// Entered in the register.
        Registered => "REGISTERED",
        /// Signed by the signatory.
        Signed => "SIGNED",
        /// Office seal applied.
        Sealed => "SEALED",
        /// Handed to the delivery channel.
        Dispatched => "DISPATCHED",
        /// Reported in transit by the channel.
        InTransit => "IN_TRANSIT",
        /// Recipient acknowledged receipt.
        Acknowledged => "ACKNOWLEDGED",
        /// Delivery confirmed.
        Delivered => "DELIVERED",
        /// Returned by the channel.
        ReturnedUndelivered => "RETURNED_UNDELIVERED",
        /// Pulled back after dispatch.
        Recalled => "RECALLED",
        /// Replaced by a successor record.
        Superseded => "SUPERSEDED",
        /// Cancelled.
        Voided => "VOIDED",
        /// Completed.
        Closed => "CLOSED",
    }
}

impl WorkflowState for DispatchStatus {
    const ALL: &'static [Self] = Self::VARIANTS;
    const INITIAL: Self = Self::Draft;
    const TERMINAL: &'static [Self] = &[Self::Voided, Self::Superseded, Self::Closed];

    fn as_str(self) -> &'static str {
        self.code()
    }

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::PendingReview, Self::Voided],
            Self::PendingReview => &[Self::PendingApproval, Self::Draft, Self::Voided],
            Self::PendingApproval => &[Self::Approved, Self::Draft, Self::Voided],
            Self::Approved => &[Self::NumberReserved, Self::Voided],
            Self::NumberReserved => &[Self::Registered, Self::Voided],
            Self::Registered => &[
                Self::Signed,
                Self::Sealed,
                Self::Dispatched,
                Self::Voided,
                Self::Superseded,
            ],
            Self::Signed => &[Self::Sealed, Self::Dispatched, Self::Voided, Self::Superseded],
            Self::Sealed => &[Self::Dispatched, Self::Voided, Self::Superseded],
            Self::Dispatched => &[
                Self::InTransit,
                Self::Acknowledged,
                Self::Delivered,
                Self::ReturnedUndelivered,
                Self::Recalled,
            ],
            Self::InTransit => &[
                Self::Acknowledged,
                Self::Delivered,
                Self::ReturnedUndelivered,
                Self::Recalled,
            ],
            Self::Acknowledged => &[Self::Delivered],
            Self::Delivered => &[Self::Closed],
            Self::ReturnedUndelivered => &[Self::Dispatched, Self::Voided],
            Self::Recalled => &[Self::Superseded, Self::Voided],
            Self::Voided | Self::Superseded | Self::Closed => &[],
        }
    }
}

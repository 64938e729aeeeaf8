//! Registration orchestration: lifecycle actions and the service that
//! applies them.

mod action;
mod service;

pub use action::{
    ApprovalDecision, DispatchInstruction, LifecycleAction, ReviewDecision, RoutingInstruction,
};
pub use service::RegistrationService;

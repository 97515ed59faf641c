//! Operator-triggered approval
//!
//! [`ApprovalOrchestrator`] sequences the onboarding transitions around the
//! identity registration call.

mod orchestrator;

pub use orchestrator::{ApprovalError, ApprovalOrchestrator, Dependency};

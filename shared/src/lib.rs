//! Shared types for the onboarding platform
//!
//! Error system, onboarding records and the approval state machine, and small
//! utilities used by every crate in the workspace.

pub mod error;
pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use models::onboarding::{
    ApprovalOutcome, OnboardingRequest, OnboardingStatus, ProvisioningFields, TenantApplication,
    Transition,
};

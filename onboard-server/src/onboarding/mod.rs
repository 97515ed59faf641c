//! Tenant onboarding lifecycle
//!
//! - [`OnboardingService`] - submission, queries and status transitions
//! - [`OnboardingError`] - state-machine errors

mod error;
mod service;

pub use error::{ErrorKind, OnboardingError, OnboardingResult};
pub use service::OnboardingService;

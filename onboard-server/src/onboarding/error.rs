//! Onboarding state-machine errors

use shared::error::{AppError, ErrorCode};
use shared::{OnboardingStatus, Transition};
use thiserror::Error;
use validator::ValidationErrors;

use crate::store::StoreError;

/// Broad classification used by callers deciding whether to retry or abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; never retried automatically
    Validation,
    /// Duplicate email, or another actor already moved the request
    Conflict,
    /// No document for the id / status combination
    NotFound,
    /// Store failure
    Dependency,
}

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email already registered: {email}")]
    EmailTaken { email: String },

    /// Conditional update matched nothing because the request is elsewhere
    #[error("Cannot {transition} request {request_id}: status is {current}")]
    InvalidTransition {
        request_id: String,
        transition: Transition,
        current: OnboardingStatus,
    },

    #[error("Onboarding request not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type OnboardingResult<T> = Result<T, OnboardingError>;

impl OnboardingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OnboardingError::Validation(_) => ErrorKind::Validation,
            OnboardingError::EmailTaken { .. } | OnboardingError::InvalidTransition { .. } => {
                ErrorKind::Conflict
            }
            OnboardingError::NotFound(_) => ErrorKind::NotFound,
            OnboardingError::Store(_) => ErrorKind::Dependency,
        }
    }

    /// Zero-match outcome of a conditional transition
    pub fn is_lost_race(&self) -> bool {
        matches!(
            self,
            OnboardingError::InvalidTransition { .. } | OnboardingError::NotFound(_)
        )
    }
}

impl From<ValidationErrors> for OnboardingError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"))
                })
            })
            .collect();
        messages.sort();
        OnboardingError::Validation(messages.join("; "))
    }
}

impl From<OnboardingError> for AppError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::Validation(msg) => AppError::validation(msg),
            OnboardingError::EmailTaken { email } => {
                AppError::new(ErrorCode::EmailAlreadyRegistered).with_detail("email", email)
            }
            OnboardingError::InvalidTransition {
                request_id,
                transition,
                current,
            } => AppError::with_message(
                ErrorCode::InvalidStatusTransition,
                format!("Cannot {transition} request in status {current}"),
            )
            .with_detail("request_id", request_id)
            .with_detail("status", current.as_str()),
            OnboardingError::NotFound(request_id) => {
                AppError::new(ErrorCode::OnboardingRequestNotFound)
                    .with_detail("request_id", request_id)
            }
            OnboardingError::Store(e) => {
                tracing::error!(error = %e, "Onboarding store error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

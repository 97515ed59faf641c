//! Error codes returned by the onboarding API
//!
//! - 0xxx: request-level errors
//! - 3xxx: onboarding lifecycle
//! - 4xxx: identity service
//! - 9xxx: system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error code carried in [`ApiResponse::code`](super::ApiResponse)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    /// Application or request body failed validation
    ValidationFailed = 2,
    /// Malformed query or path parameter
    InvalidRequest = 5,

    /// Email already has a request in flight or an active tenant
    EmailAlreadyRegistered = 3101,
    OnboardingRequestNotFound = 3102,
    /// Request is not in a status that allows the transition
    InvalidStatusTransition = 3103,
    /// Stored request lacks fields the identity service needs
    ProvisioningFieldsMissing = 3104,
    /// Identity account exists but activation is not committed yet
    ApprovalIncomplete = 3105,

    /// Identity service rejected the registration or was unreachable
    IdentityServiceError = 4001,

    DatabaseError = 9002,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 10] = [
        ErrorCode::Success,
        ErrorCode::ValidationFailed,
        ErrorCode::InvalidRequest,
        ErrorCode::EmailAlreadyRegistered,
        ErrorCode::OnboardingRequestNotFound,
        ErrorCode::InvalidStatusTransition,
        ErrorCode::ProvisioningFieldsMissing,
        ErrorCode::ApprovalIncomplete,
        ErrorCode::IdentityServiceError,
        ErrorCode::DatabaseError,
    ];

    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Default message when no more specific one is given
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "OK",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::EmailAlreadyRegistered => "Onboarding request already exists for this email",
            ErrorCode::OnboardingRequestNotFound => "Onboarding request not found",
            ErrorCode::InvalidStatusTransition => "Request status does not allow this operation",
            ErrorCode::ProvisioningFieldsMissing => "Tenant data missing required fields",
            ErrorCode::ApprovalIncomplete => {
                "Account created, tenant activation pending and will complete automatically"
            }
            ErrorCode::IdentityServiceError => "Identity service error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// A `u16` that is not one of the [`ErrorCode`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        ErrorCode::ALL
            .into_iter()
            .find(|code| code.code() == value)
            .ok_or(InvalidErrorCode(value))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

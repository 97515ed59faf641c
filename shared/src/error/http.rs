//! HTTP status for each error code

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            // The recovery scanner finishes the request
            Self::ApprovalIncomplete => StatusCode::ACCEPTED,
            Self::ValidationFailed | Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::OnboardingRequestNotFound => StatusCode::NOT_FOUND,
            Self::EmailAlreadyRegistered | Self::InvalidStatusTransition => StatusCode::CONFLICT,
            Self::ProvisioningFieldsMissing => StatusCode::UNPROCESSABLE_ENTITY,
            Self::IdentityServiceError => StatusCode::BAD_GATEWAY,
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

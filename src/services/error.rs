//! Domain error taxonomy for the authentication engine.
//!
//! Unknown phone and wrong password share one message, as do unknown and
//! wrong OTP codes, so a caller cannot enumerate accounts or distinguish
//! which check failed.

use thiserror::Error;

use crate::store::StoreError;
use crate::utils::{ApiError, FieldViolation};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed")]
    Validation(Vec<FieldViolation>),

    #[error("{field} already registered")]
    Conflict { field: &'static str },

    /// Unknown phone, unknown code, or wrong code — deliberately generic.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("OTP has expired")]
    OtpExpired,

    #[error("Your account has been blocked. Contact support.")]
    Blocked,

    #[error("Account not activated. Please verify OTP.")]
    NotActivated,

    #[error("Account locked. Try again in {minutes} minutes.")]
    Locked { minutes: i64 },

    #[error("Invalid credentials. {remaining} attempts remaining.")]
    InvalidCredentials { remaining: i32 },

    #[error("Too many OTP requests. Please try again later.")]
    RateLimited,

    #[error("Internal server error")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field } => AuthError::Conflict { field },
            StoreError::Missing => AuthError::Internal("record vanished mid-operation".into()),
            StoreError::Backend(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::Validation(violations) => ApiError::validation(message, violations),
            AuthError::Conflict { .. } => ApiError::conflict(message),
            AuthError::NotFound(_) | AuthError::OtpExpired => ApiError::bad_request(message),
            AuthError::InvalidCredentials { .. } => ApiError::unauthorized(message),
            AuthError::Blocked | AuthError::NotActivated => ApiError::forbidden(message),
            AuthError::Locked { .. } => ApiError::locked(message),
            AuthError::RateLimited => ApiError::too_many_requests(message),
            AuthError::Internal(detail) => {
                log::error!("internal failure: {detail}");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

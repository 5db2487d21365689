use rocket::serde::json::Json;
use rocket::State;
use std::net::IpAddr;

use crate::db::AppAuthService;
use crate::models::{
    ForgotPasswordDto, LoginDto, RefreshTokenDto, RegisterDto, ResetPasswordDto, UserResponse,
    VerifyOtpDto,
};
use crate::services::throttle::{
    ANON_LIMIT, ANON_WINDOW_MS, LOGIN_LIMIT, LOGIN_WINDOW_MS, OTP_LIMIT, OTP_WINDOW_MS,
    REFRESH_LIMIT, REFRESH_WINDOW_MS,
};
use crate::services::RateLimiter;
use crate::utils::{ApiError, ApiResponse};

fn throttle_key(category: &str, ip: Option<IpAddr>) -> String {
    match ip {
        Some(ip) => format!("{category}:{ip}"),
        None => format!("{category}:unknown"),
    }
}

/// --------------------
/// Register (OTP sent)
/// --------------------
#[post("/auth/register", data = "<dto>")]
pub async fn register(
    service: &State<AppAuthService>,
    limiter: &State<RateLimiter>,
    ip: Option<IpAddr>,
    dto: Json<RegisterDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    limiter.check(&throttle_key("anon", ip), ANON_LIMIT, ANON_WINDOW_MS)?;

    let user = service.register(dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Registration successful. OTP sent to phone.".to_string(),
        serde_json::json!({ "user": UserResponse::from(user) }),
    )))
}

/// --------------------
/// Verify OTP (activate)
/// --------------------
#[post("/auth/verify-otp", data = "<dto>")]
pub async fn verify_otp(
    service: &State<AppAuthService>,
    limiter: &State<RateLimiter>,
    ip: Option<IpAddr>,
    dto: Json<VerifyOtpDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    limiter.check(&throttle_key("otp", ip), OTP_LIMIT, OTP_WINDOW_MS)?;

    service.verify_otp(&dto.phone, &dto.otp).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Account verified successfully".to_string(),
        serde_json::json!({}),
    )))
}

/// --------------------
/// Login (JWT)
/// --------------------
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    service: &State<AppAuthService>,
    limiter: &State<RateLimiter>,
    ip: Option<IpAddr>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    limiter.check(&throttle_key("login", ip), LOGIN_LIMIT, LOGIN_WINDOW_MS)?;

    let out = service.login(dto.into_inner()).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "access": out.tokens.access_token,
        "refresh": out.tokens.refresh_token,
        "role": out.role,
        "status": out.status,
    }))))
}

/// --------------------
/// Forgot password (request OTP)
/// --------------------
#[post("/auth/forgot-password", data = "<dto>")]
pub async fn forgot_password(
    service: &State<AppAuthService>,
    limiter: &State<RateLimiter>,
    ip: Option<IpAddr>,
    dto: Json<ForgotPasswordDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    limiter.check(&throttle_key("otp", ip), OTP_LIMIT, OTP_WINDOW_MS)?;

    if !crate::utils::validate_phone(&dto.phone) {
        return Err(ApiError::bad_request("Enter a valid Kenyan phone number"));
    }

    service.request_password_reset(&dto.phone).await?;

    Ok(Json(ApiResponse::success_with_message(
        "OTP sent successfully".to_string(),
        serde_json::json!({}),
    )))
}

/// --------------------
/// Reset password (auto login)
/// --------------------
#[post("/auth/reset-password", data = "<dto>")]
pub async fn reset_password(
    service: &State<AppAuthService>,
    limiter: &State<RateLimiter>,
    ip: Option<IpAddr>,
    dto: Json<ResetPasswordDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    limiter.check(&throttle_key("anon", ip), ANON_LIMIT, ANON_WINDOW_MS)?;

    let out = service.reset_password(dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Password reset successful".to_string(),
        serde_json::json!({
            "access": out.tokens.access_token,
            "refresh": out.tokens.refresh_token,
            "role": out.role,
            "status": out.status,
        }),
    )))
}

/// --------------------
/// Silent refresh token
/// --------------------
#[post("/auth/refresh", data = "<dto>")]
pub async fn refresh_token(
    service: &State<AppAuthService>,
    limiter: &State<RateLimiter>,
    ip: Option<IpAddr>,
    dto: Json<RefreshTokenDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    limiter.check(
        &throttle_key("refresh", ip),
        REFRESH_LIMIT,
        REFRESH_WINDOW_MS,
    )?;

    let access = service.refresh_access_token(&dto.refresh_token).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "access": access
    }))))
}

use rocket::serde::json::Json;
use rocket::State;

use crate::db::AppAuthService;
use crate::guards::AuthGuard;
use crate::models::SubmitKycDto;
use crate::utils::{ApiError, ApiResponse};

/// Record (or re-record) the caller's identity documents. A repeat
/// submission overwrites the previous one and puts the review back in the
/// queue.
#[post("/kyc/submit", data = "<dto>")]
pub async fn submit_kyc(
    service: &State<AppAuthService>,
    auth: AuthGuard,
    dto: Json<SubmitKycDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let profile = service.submit_kyc(auth.user_id, dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "KYC submitted successfully".to_string(),
        serde_json::json!({
            "status": profile.status,
            "submitted_at": profile.submitted_at,
        }),
    )))
}

#[get("/kyc/status")]
pub async fn get_kyc_status(
    service: &State<AppAuthService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    match service.kyc_status(auth.user_id).await? {
        Some(profile) => Ok(Json(ApiResponse::success(serde_json::json!({
            "status": profile.status,
            "submitted_at": profile.submitted_at,
        })))),
        None => Ok(Json(ApiResponse::success(serde_json::json!({
            "status": "not_submitted",
        })))),
    }
}

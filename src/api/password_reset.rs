use actix_web::{HttpResponse, Responder, web};
use hr_ledger::HrError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::AppHr;
use super::error::ApiError;
use crate::auth::auth::AuthUser;
use crate::auth::password::Argon2Password;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize, ToSchema)]
pub struct ResetRequest {
    #[schema(example = "jane.doe@example.com")]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetConfirm {
    pub token: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenValidity {
    pub valid: bool,
}

fn check_new_password(password: &str, confirmation: &str) -> Result<(), HrError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(HrError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirmation {
        return Err(HrError::InvalidInput(
            "password confirmation does not match".into(),
        ));
    }
    Ok(())
}

/// Requests a reset token. The answer is the same whether or not the
/// address belongs to an employee.
#[utoipa::path(
    post,
    path = "/password-reset/request",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Request accepted", body = Object, example = json!({
            "message": "If the email is registered, a reset link has been sent"
        })),
        (status = 429, description = "Too many reset requests for this email")
    ),
    tag = "Password reset"
)]
pub async fn request_reset(
    hr: web::Data<AppHr>,
    payload: web::Json<ResetRequest>,
) -> actix_web::Result<impl Responder> {
    let issued = hr
        .credentials()
        .issue_token(&payload.email)
        .await
        .map_err(ApiError)?;
    if let Some(token) = issued {
        // TODO: hand the token to the mail relay once it exposes an API.
        tracing::debug!(token_id = token.id, expires = %token.expiry_date, "Reset token ready for delivery");
    }
    Ok(HttpResponse::Ok().json(json!({
        "message": "If the email is registered, a reset link has been sent"
    })))
}

/// Sets a new password with a reset token.
#[utoipa::path(
    post,
    path = "/password-reset/confirm",
    request_body = ResetConfirm,
    responses(
        (status = 200, description = "Password changed", body = Object, example = json!({
            "message": "Password has been reset"
        })),
        (status = 400, description = "Password too short or confirmation mismatch"),
        (status = 404, description = "Token unknown or expired"),
        (status = 409, description = "Token already used, or password used recently")
    ),
    tag = "Password reset"
)]
pub async fn confirm_reset(
    hr: web::Data<AppHr>,
    payload: web::Json<ResetConfirm>,
) -> actix_web::Result<impl Responder> {
    check_new_password(&payload.password, &payload.password_confirmation).map_err(ApiError)?;
    let password = Argon2Password::new(&payload.password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    hr.credentials()
        .redeem_token(&payload.token, &password)
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password has been reset" })))
}

#[utoipa::path(
    get,
    path = "/password-reset/validate/{token}",
    params(
        ("token" = String, Path, description = "Reset token from the e-mail link")
    ),
    responses(
        (status = 200, description = "Whether the token can still be redeemed", body = TokenValidity)
    ),
    tag = "Password reset"
)]
pub async fn validate_reset(
    hr: web::Data<AppHr>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let valid = hr
        .credentials()
        .validate_token(&path.into_inner())
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(TokenValidity { valid }))
}

/// Deletes expired reset tokens now instead of waiting for the background
/// sweep (Admin).
#[utoipa::path(
    post,
    path = "/api/v1/admin/reset-tokens/purge",
    responses(
        (status = 200, description = "Number of deleted tokens", body = Object, example = json!({
            "deleted": 3
        })),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Password reset"
)]
pub async fn purge_tokens(auth: AuthUser, hr: web::Data<AppHr>) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let deleted = hr
        .credentials()
        .purge_expired(hr.now())
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

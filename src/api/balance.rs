use actix_web::{HttpResponse, Responder, web};
use hr_ledger::model::leave_type::QuotaKind;
use serde::Deserialize;
use utoipa::ToSchema;

use super::AppHr;
use super::error::ApiError;
use crate::auth::auth::AuthUser;

#[derive(Deserialize, ToSchema)]
pub struct ResetBalance {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "ANNUAL")]
    pub kind: QuotaKind,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 12)]
    pub quota: i32,
}

/// Balances of one employee
#[utoipa::path(
    get,
    path = "/api/v1/balance/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee whose balances to list")
    ),
    responses(
        (status = 200, description = "One row per quota kind", body = [hr_ledger::model::leave_balance::LeaveBalance]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Employee not visible to the caller")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Balance"
)]
pub async fn list_balances(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;
    let balances = hr.ledger().balances(employee_id).await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(balances))
}

/// Opens a new quota period (HR/Admin). Repeating it for the same year
/// leaves the balance unchanged.
#[utoipa::path(
    post,
    path = "/api/v1/balance/reset",
    request_body = ResetBalance,
    responses(
        (status = 200, description = "Balance for the period", body = hr_ledger::model::leave_balance::LeaveBalance),
        (status = 400, description = "Negative quota"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Balance"
)]
pub async fn reset_balance(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    payload: web::Json<ResetBalance>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let payload = payload.into_inner();
    let balance = hr
        .ledger()
        .reset_for_new_period(payload.employee_id, payload.kind, payload.year, payload.quota)
        .await
        .map_err(ApiError)?;
    tracing::info!(
        user_id = auth.user_id,
        user = %auth.username,
        employee = payload.employee_id,
        year = payload.year,
        "Leave balance reset requested"
    );
    Ok(HttpResponse::Ok().json(balance))
}

use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use super::AppHr;
use super::error::ApiError;
use crate::auth::auth::AuthUser;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family visit")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "Team is short-staffed that week")]
    pub reason: Option<String>,
}

/* =========================
Submit leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted", body = hr_ledger::model::leave_request::LeaveRequest),
        (status = 400, description = "Invalid range, duration or inactive leave type"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlapping or duplicate request"),
        (status = 422, description = "Not enough leave balance", body = Object, example = json!({
            "message": "insufficient leave balance: requested 5, remaining 2",
            "kind": "resource_exhausted"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee()?;
    let payload = payload.into_inner();
    let request = hr
        .leave()
        .submit(
            employee_id,
            payload.leave_type_id,
            payload.start_date,
            payload.end_date,
            payload.reason,
        )
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Approve leave (supervisor or HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved and balance debited", body = hr_ledger::model::leave_request::LeaveRequest),
        (status = 403, description = "Caller does not supervise the requester"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Not pending, or overlaps approved leave"),
        (status = 422, description = "Not enough leave balance")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    let approver = auth.employee()?;
    if !auth.role.is_hr_or_admin() {
        hr.leave()
            .ensure_supervisor(leave_id, approver)
            .await
            .map_err(ApiError)?;
    }
    let request = hr.leave().approve(leave_id, approver).await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Reject leave (supervisor or HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected", body = hr_ledger::model::leave_request::LeaveRequest),
        (status = 403, description = "Caller does not supervise the requester"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request is not pending")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeave>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    let approver = auth.employee()?;
    if !auth.role.is_hr_or_admin() {
        hr.leave()
            .ensure_supervisor(leave_id, approver)
            .await
            .map_err(ApiError)?;
    }
    let request = hr
        .leave()
        .reject(leave_id, approver, payload.into_inner().reason)
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Cancel own leave
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the caller's leave request")
    ),
    responses(
        (status = 200, description = "Leave cancelled; approved days are credited back", body = hr_ledger::model::leave_request::LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request can no longer be cancelled")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    let actor = auth.employee()?;
    let leave = hr.leave();
    let request = leave.get(leave_id).await.map_err(ApiError)?;
    // Someone else's request is reported as missing.
    auth.require_self_or_hr(request.employee_id)?;
    let request = leave.cancel(leave_id, actor).await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = hr_ledger::model::leave_request::LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "leave request 42 not found",
            "kind": "not_found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let request = hr.leave().get(path.into_inner()).await.map_err(ApiError)?;
    if !auth.role.is_hr_or_admin() && auth.employee_id != Some(request.employee_id) {
        hr.leave()
            .ensure_supervisor(request.id, auth.employee()?)
            .await
            .map_err(ApiError)?;
    }
    Ok(HttpResponse::Ok().json(request))
}

/// The caller's own leave requests, newest first
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    responses(
        (status = 200, description = "Leave requests", body = [hr_ledger::model::leave_request::LeaveRequest]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(auth: AuthUser, hr: web::Data<AppHr>) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee()?;
    let requests = hr.leave().for_employee(employee_id).await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(requests))
}

/// Pending requests of the caller's direct reports
#[utoipa::path(
    get,
    path = "/api/v1/leave/pending",
    responses(
        (status = 200, description = "Pending leave requests awaiting the caller", body = [hr_ledger::model::leave_request::LeaveRequest]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn pending_leave(
    auth: AuthUser,
    hr: web::Data<AppHr>,
) -> actix_web::Result<impl Responder> {
    let supervisor = auth.employee()?;
    let requests = hr
        .leave()
        .pending_for_supervisor(supervisor)
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(requests))
}

/// Active leave types employees can apply for
#[utoipa::path(
    get,
    path = "/api/v1/leave/types",
    responses(
        (status = 200, description = "Active leave types", body = [hr_ledger::model::leave_type::LeaveType]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_types(_auth: AuthUser, hr: web::Data<AppHr>) -> actix_web::Result<impl Responder> {
    let types = hr.directory().active_leave_types().await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(types))
}

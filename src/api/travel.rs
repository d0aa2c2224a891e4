use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use super::error::ApiError;
use super::{AppHr, approver_for};
use crate::auth::auth::AuthUser;

#[derive(Deserialize, ToSchema)]
pub struct CreateTravel {
    #[schema(example = "Surabaya")]
    pub destination: String,
    #[schema(example = "Client onboarding")]
    pub reason: Option<String>,
    #[schema(example = "2026-02-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-02-04", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectTravel {
    pub reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/travel",
    request_body = CreateTravel,
    responses(
        (status = 200, description = "Travel request submitted", body = hr_ledger::model::travel_request::TravelRequest),
        (status = 400, description = "Invalid range or empty destination"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps approved leave or travel, or duplicates a request")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Travel"
)]
pub async fn create_travel(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    payload: web::Json<CreateTravel>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee()?;
    let payload = payload.into_inner();
    let request = hr
        .travel()
        .submit(
            employee_id,
            payload.destination,
            payload.reason,
            payload.start_date,
            payload.end_date,
        )
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    get,
    path = "/api/v1/travel/{travel_id}",
    params(
        ("travel_id" = u64, Path, description = "ID of the travel request")
    ),
    responses(
        (status = 200, description = "Travel request found", body = hr_ledger::model::travel_request::TravelRequest),
        (status = 404, description = "Travel request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Travel"
)]
pub async fn get_travel(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let request = hr.travel().get(path.into_inner()).await.map_err(ApiError)?;
    if auth.employee_id != Some(request.employee_id) {
        approver_for(&hr, &auth, request.employee_id).await?;
    }
    Ok(HttpResponse::Ok().json(request))
}

/// The caller's own travel requests, newest first
#[utoipa::path(
    get,
    path = "/api/v1/travel",
    responses(
        (status = 200, description = "Travel requests", body = [hr_ledger::model::travel_request::TravelRequest])
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Travel"
)]
pub async fn travel_list(auth: AuthUser, hr: web::Data<AppHr>) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee()?;
    let requests = hr.travel().for_employee(employee_id).await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(requests))
}

#[utoipa::path(
    get,
    path = "/api/v1/travel/pending",
    responses(
        (status = 200, description = "Pending travel requests of the caller's reports", body = [hr_ledger::model::travel_request::TravelRequest])
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Travel"
)]
pub async fn pending_travel(
    auth: AuthUser,
    hr: web::Data<AppHr>,
) -> actix_web::Result<impl Responder> {
    let supervisor = auth.employee()?;
    let requests = hr
        .travel()
        .pending_for_supervisor(supervisor)
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(requests))
}

#[utoipa::path(
    put,
    path = "/api/v1/travel/{travel_id}/approve",
    params(
        ("travel_id" = u64, Path, description = "ID of the travel request to approve")
    ),
    responses(
        (status = 200, description = "Travel approved", body = hr_ledger::model::travel_request::TravelRequest),
        (status = 403, description = "Caller does not supervise the requester"),
        (status = 409, description = "Not pending, or overlaps approved leave or travel")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Travel"
)]
pub async fn approve_travel(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let travel_id = path.into_inner();
    let owner = hr.travel().get(travel_id).await.map_err(ApiError)?.employee_id;
    let approver = approver_for(&hr, &auth, owner).await?;
    let request = hr.travel().approve(travel_id, approver).await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/v1/travel/{travel_id}/reject",
    params(
        ("travel_id" = u64, Path, description = "ID of the travel request to reject")
    ),
    request_body = RejectTravel,
    responses(
        (status = 200, description = "Travel rejected", body = hr_ledger::model::travel_request::TravelRequest),
        (status = 403, description = "Caller does not supervise the requester"),
        (status = 409, description = "Travel request is not pending")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Travel"
)]
pub async fn reject_travel(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
    payload: web::Json<RejectTravel>,
) -> actix_web::Result<impl Responder> {
    let travel_id = path.into_inner();
    let owner = hr.travel().get(travel_id).await.map_err(ApiError)?.employee_id;
    let approver = approver_for(&hr, &auth, owner).await?;
    let request = hr
        .travel()
        .reject(travel_id, approver, payload.into_inner().reason)
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    put,
    path = "/api/v1/travel/{travel_id}/cancel",
    params(
        ("travel_id" = u64, Path, description = "ID of the caller's travel request")
    ),
    responses(
        (status = 200, description = "Travel cancelled", body = hr_ledger::model::travel_request::TravelRequest),
        (status = 404, description = "Travel request not found"),
        (status = 409, description = "Travel request can no longer be cancelled")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Travel"
)]
pub async fn cancel_travel(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let travel_id = path.into_inner();
    let actor = auth.employee()?;
    let owner = hr.travel().get(travel_id).await.map_err(ApiError)?.employee_id;
    auth.require_self_or_hr(owner)?;
    let request = hr.travel().cancel(travel_id, actor).await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

/// Marks an approved trip as taken
#[utoipa::path(
    put,
    path = "/api/v1/travel/{travel_id}/complete",
    params(
        ("travel_id" = u64, Path, description = "ID of the caller's travel request")
    ),
    responses(
        (status = 200, description = "Travel completed", body = hr_ledger::model::travel_request::TravelRequest),
        (status = 404, description = "Travel request not found"),
        (status = 409, description = "Travel request is not approved")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Travel"
)]
pub async fn complete_travel(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let travel_id = path.into_inner();
    let actor = auth.employee()?;
    let owner = hr.travel().get(travel_id).await.map_err(ApiError)?.employee_id;
    auth.require_self_or_hr(owner)?;
    let request = hr.travel().complete(travel_id, actor).await.map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(request))
}

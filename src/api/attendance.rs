use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use hr_ledger::model::attendance::{Attendance, ClockIn, GeoPoint, SessionState};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppHr;
use super::error::ApiError;
use crate::auth::auth::AuthUser;

#[derive(Deserialize, ToSchema, Default)]
pub struct ClockInBody {
    #[schema(example = -6.2088)]
    pub latitude: Option<f64>,
    #[schema(example = 106.8456)]
    pub longitude: Option<f64>,
    #[schema(example = "Head office, Jakarta")]
    pub location_address: Option<String>,
    pub notes: Option<String>,
}

impl From<ClockInBody> for ClockIn {
    fn from(body: ClockInBody) -> Self {
        // A location needs both coordinates; half of one is treated as none.
        let location = match (body.latitude, body.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };
        ClockIn {
            location,
            location_address: body.location_address,
            notes: body.notes,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TodayResponse {
    pub state: SessionState,
    pub session: Option<Attendance>,
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// First day, inclusive
    pub from: NaiveDate,
    /// Last day, inclusive
    pub to: NaiveDate,
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-in",
    request_body = ClockInBody,
    responses(
        (status = 200, description = "Session opened", body = Attendance),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "A session is already open or today's session is closed", body = Object, example = json!({
            "message": "an attendance session is already open since 2026-01-05 08:58:00",
            "kind": "conflict"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    payload: web::Json<ClockInBody>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee()?;
    let session = hr
        .attendance()
        .clock_in(employee_id, payload.into_inner().into(), hr.now())
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(session))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-out",
    responses(
        (status = 200, description = "Session closed", body = Attendance),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "No open session", body = Object, example = json!({
            "message": "no open attendance session",
            "kind": "conflict"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    hr: web::Data<AppHr>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee()?;
    let session = hr
        .attendance()
        .clock_out(employee_id, hr.now())
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(session))
}

/// Today's session and state for the caller
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Today's session", body = TodayResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, hr: web::Data<AppHr>) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee()?;
    let tracker = hr.attendance();
    let session = tracker.todays_session(employee_id).await.map_err(ApiError)?;
    let state = tracker
        .session_state(employee_id, hr.now().date())
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(TodayResponse { state, session }))
}

/// Sessions of one employee within a date range
#[utoipa::path(
    get,
    path = "/api/v1/attendance/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee whose sessions to list"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Sessions, oldest first", body = [Attendance]),
        (status = 400, description = "Invalid range"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Employee not visible to the caller")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    hr: web::Data<AppHr>,
    path: web::Path<u64>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;
    let sessions = hr
        .attendance()
        .history(employee_id, query.from, query.to)
        .await
        .map_err(ApiError)?;
    Ok(HttpResponse::Ok().json(sessions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_a_location_is_no_location() {
        let clock_in: ClockIn = ClockInBody {
            latitude: Some(-6.2),
            ..ClockInBody::default()
        }
        .into();
        assert!(clock_in.location.is_none());

        let clock_in: ClockIn = ClockInBody {
            latitude: Some(-6.2),
            longitude: Some(106.8),
            notes: Some("early".into()),
            ..ClockInBody::default()
        }
        .into();
        assert_eq!(clock_in.location.map(|p| p.longitude), Some(106.8));
        assert_eq!(clock_in.notes.as_deref(), Some("early"));
    }
}

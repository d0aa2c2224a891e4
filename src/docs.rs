use crate::api::attendance::{ClockInBody, TodayResponse};
use crate::api::balance::ResetBalance;
use crate::api::leave_request::{CreateLeave, RejectLeave};
use crate::api::password_reset::{ResetConfirm, ResetRequest, TokenValidity};
use crate::api::travel::{CreateTravel, RejectTravel};
use hr_ledger::model::attendance::{Attendance, AttendanceType, GeoPoint, SessionState};
use hr_ledger::model::leave_balance::LeaveBalance;
use hr_ledger::model::leave_request::{LeaveRequest, LeaveStatus};
use hr_ledger::model::leave_type::{LeaveType, QuotaKind};
use hr_ledger::model::travel_request::{TravelRequest, TravelStatus};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Ledger API",
        version = "1.0.0",
        description = r#"
## Leave, attendance and credential service

Every write goes through a single transaction that locks the affected
employee, request or token, so concurrent requests cannot double-spend a
leave quota, open two attendance sessions or redeem one reset token twice.

### Key Features
- **Attendance**: clock in and out with geofence and calendar classification
- **Leave**: submit, approve, reject and cancel with quota bookkeeping
- **Business travel**: submit, approve, reject, cancel and complete
- **Balances**: per-employee quotas with yearly rollover
- **Password reset**: single-use, rate-limited tokens with password history

### Security
Endpoints under the API prefix require a **JWT Bearer** access token.
Password reset endpoints are public and rate limited per IP.

### Errors
Failures are returned as `{ "message": ..., "kind": ... }` where `kind` is one
of `validation`, `conflict`, `resource_exhausted`, `not_found`, `forbidden`,
`transient` or `internal`.
"#,
    ),
    paths(
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::today,
        crate::api::attendance::history,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::pending_leave,
        crate::api::leave_request::leave_types,

        crate::api::travel::create_travel,
        crate::api::travel::get_travel,
        crate::api::travel::travel_list,
        crate::api::travel::pending_travel,
        crate::api::travel::approve_travel,
        crate::api::travel::reject_travel,
        crate::api::travel::cancel_travel,
        crate::api::travel::complete_travel,

        crate::api::balance::list_balances,
        crate::api::balance::reset_balance,

        crate::api::password_reset::request_reset,
        crate::api::password_reset::confirm_reset,
        crate::api::password_reset::validate_reset,
        crate::api::password_reset::purge_tokens
    ),
    components(
        schemas(
            ClockInBody,
            TodayResponse,
            Attendance,
            AttendanceType,
            GeoPoint,
            SessionState,
            CreateLeave,
            RejectLeave,
            LeaveRequest,
            LeaveStatus,
            LeaveType,
            QuotaKind,
            CreateTravel,
            RejectTravel,
            TravelRequest,
            TravelStatus,
            LeaveBalance,
            ResetBalance,
            ResetRequest,
            ResetConfirm,
            TokenValidity
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Clock-in and clock-out APIs"),
        (name = "Leave", description = "Leave request APIs"),
        (name = "Travel", description = "Business travel APIs"),
        (name = "Balance", description = "Leave quota APIs"),
        (name = "Password reset", description = "Password reset APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/leave/{leave_id}/approve"));
        assert!(doc.paths.paths.contains_key("/password-reset/confirm"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

pub mod attendance;
pub mod balance;
pub mod error;
pub mod leave_request;
pub mod password_reset;
pub mod travel;

use actix_web::web;
use hr_ledger::model::employee::EmployeeId;
use hr_ledger::store::MySqlStore;
use hr_ledger::{Hr, HrError};

use crate::auth::auth::AuthUser;
use error::ApiError;

pub type AppHr = Hr<MySqlStore>;

/// Resolves the acting approver for a request owned by `owner`. HR and
/// admins may decide on anyone's request; everybody else must be the
/// owner's direct supervisor.
pub async fn approver_for(
    hr: &web::Data<AppHr>,
    auth: &AuthUser,
    owner: EmployeeId,
) -> actix_web::Result<EmployeeId> {
    let approver = auth.employee()?;
    if auth.role.is_hr_or_admin() {
        return Ok(approver);
    }
    let employee = hr.directory().employee(owner).await.map_err(ApiError)?;
    if employee.is_supervised_by(approver) {
        Ok(approver)
    } else {
        Err(ApiError(HrError::NotSupervisor {
            approver,
            employee: owner,
        })
        .into())
    }
}

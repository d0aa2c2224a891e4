use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};
use hr_ledger::HrError;
use hr_ledger::model::employee::EmployeeId;

use super::role::Role;
use crate::api::error::ApiError;

/// Caller identity placed in request extensions by
/// [`super::middleware::auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<EmployeeId>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Missing token")),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if self.role.is_hr_or_admin() {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("HR/Admin only"))
        }
    }

    /// The employee record behind this login; engine operations act on it.
    pub fn employee(&self) -> actix_web::Result<EmployeeId> {
        self.employee_id
            .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))
    }

    /// HR and admins may read anyone; others only themselves.
    pub fn require_self_or_hr(&self, employee: EmployeeId) -> actix_web::Result<()> {
        if self.role.is_hr_or_admin() || self.employee_id == Some(employee) {
            Ok(())
        } else {
            Err(ApiError(HrError::not_found("employee", employee)).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "alice".into(),
            role,
            employee_id,
        }
    }

    #[test]
    fn employees_only_see_themselves() {
        let me = user(Role::Employee, Some(7));
        assert!(me.require_self_or_hr(7).is_ok());
        assert!(me.require_self_or_hr(8).is_err());
        assert!(user(Role::Hr, None).require_self_or_hr(8).is_ok());
    }

    #[test]
    fn login_without_employee_record_is_forbidden() {
        assert!(user(Role::Admin, None).employee().is_err());
        assert_eq!(user(Role::Employee, Some(3)).employee().unwrap(), 3);
    }
}

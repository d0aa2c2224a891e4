//! Reference data the workflows read: employees and leave types.

use tracing::{info, instrument};

use super::Hr;
use crate::error::{HrError, HrResult};
use crate::model::employee::{Employee, EmployeeId, EmploymentStatus, NewEmployee};
use crate::model::leave_type::{LeaveType, LeaveTypeId, NewLeaveType};
use crate::store::{Lock, Store, Transaction};

pub struct Directory<'a, S: Store> {
    hr: &'a Hr<S>,
}

impl<'a, S: Store> Directory<'a, S> {
    pub(super) fn new(hr: &'a Hr<S>) -> Self {
        Self { hr }
    }

    #[instrument(skip(self, new), fields(code = %new.employee_code), err)]
    pub async fn create_employee(&self, new: NewEmployee) -> HrResult<Employee> {
        let email = new.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(HrError::InvalidInput(format!("invalid email {email:?}")));
        }
        let new = NewEmployee { email, ..new };
        if let Some(supervisor) = new.supervisor_id {
            // Must exist before anyone reports to them.
            self.employee(supervisor).await?;
        }

        let employee = self
            .hr
            .gateway()
            .retry("directory.create_employee", || async {
                let now = self.hr.now();
                let mut scope = self.hr.gateway().begin("directory.create_employee").await?;
                let employee = scope.tx().insert_employee(&new, now).await?;
                scope.commit().await?;
                Ok(employee)
            })
            .await?;
        info!(employee = employee.id, "Employee created");
        Ok(employee)
    }

    pub async fn employee(&self, id: EmployeeId) -> HrResult<Employee> {
        self.hr
            .gateway()
            .read("directory.employee", |tx| {
                Box::pin(async move {
                    tx.employee(id, Lock::None)
                        .await?
                        .ok_or_else(|| HrError::not_found("employee", id))
                })
            })
            .await
    }

    pub async fn subordinates(&self, supervisor: EmployeeId) -> HrResult<Vec<Employee>> {
        self.hr
            .gateway()
            .read("directory.subordinates", |tx| {
                Box::pin(async move { Ok(tx.subordinates(supervisor).await?) })
            })
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn set_status(&self, id: EmployeeId, status: EmploymentStatus) -> HrResult<Employee> {
        self.hr
            .gateway()
            .retry("directory.set_status", || async {
                let now = self.hr.now();
                let mut scope = self.hr.gateway().begin("directory.set_status").await?;
                let mut employee = scope.lock_employee(id).await?;
                scope.tx().set_employee_status(id, status, now).await?;
                scope.commit().await?;
                employee.status = status;
                employee.updated_at = Some(now);
                Ok(employee)
            })
            .await
    }

    #[instrument(skip(self, new), fields(code = %new.code), err)]
    pub async fn create_leave_type(&self, new: NewLeaveType) -> HrResult<LeaveType> {
        if let (Some(min), Some(max)) = (new.min_duration_days, new.max_duration_days) {
            if min > max {
                return Err(HrError::InvalidInput(format!(
                    "min duration {min} exceeds max duration {max}"
                )));
            }
        }
        self.hr
            .gateway()
            .retry("directory.create_leave_type", || async {
                let mut scope = self.hr.gateway().begin("directory.create_leave_type").await?;
                let leave_type = scope.tx().insert_leave_type(&new).await?;
                scope.commit().await?;
                Ok(leave_type)
            })
            .await
    }

    pub async fn leave_type(&self, id: LeaveTypeId) -> HrResult<LeaveType> {
        self.hr
            .gateway()
            .read("directory.leave_type", |tx| {
                Box::pin(async move {
                    tx.leave_type(id)
                        .await?
                        .ok_or_else(|| HrError::not_found("leave type", id))
                })
            })
            .await
    }

    pub async fn active_leave_types(&self) -> HrResult<Vec<LeaveType>> {
        self.hr
            .gateway()
            .read("directory.leave_types", |tx| {
                Box::pin(async move { Ok(tx.leave_types(true).await?) })
            })
            .await
    }
}

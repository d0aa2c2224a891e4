//! Leave request workflow.
//!
//! `PENDING -> APPROVED | REJECTED | CANCELLED`, `APPROVED -> CANCELLED`.
//! Approval debits the quota and cancelling an approved request credits it
//! back, both in the transaction that flips the status.

use chrono::NaiveDate;
use tracing::{info, instrument};

use super::Hr;
use super::ledger::{credit_in, debit_in};
use crate::error::{HrError, HrResult};
use crate::model::DateRange;
use crate::model::employee::{Employee, EmployeeId};
use crate::model::leave_request::{
    LeaveRequest, LeaveRequestId, LeaveStatus, NewLeaveRequest, StatusChange,
};
use crate::model::leave_type::LeaveTypeId;
use crate::store::{Lock, Store, Transaction};

pub struct LeaveWorkflow<'a, S: Store> {
    hr: &'a Hr<S>,
}

impl<'a, S: Store> LeaveWorkflow<'a, S> {
    pub(super) fn new(hr: &'a Hr<S>) -> Self {
        Self { hr }
    }

    /// Files a PENDING request.
    ///
    /// The balance check here is advisory and taken without the balance
    /// lock; [`Self::approve`] repeats it under lock.
    #[instrument(skip(self, reason), err)]
    pub async fn submit(
        &self,
        employee: EmployeeId,
        leave_type: LeaveTypeId,
        start: NaiveDate,
        end: NaiveDate,
        reason: Option<String>,
    ) -> HrResult<LeaveRequest> {
        let range = DateRange::new(start, end)?;
        self.hr
            .gateway()
            .retry("leave.submit", || {
                self.submit_once(employee, leave_type, range, reason.clone())
            })
            .await
    }

    async fn submit_once(
        &self,
        employee: EmployeeId,
        leave_type_id: LeaveTypeId,
        range: DateRange,
        reason: Option<String>,
    ) -> HrResult<LeaveRequest> {
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("leave.submit").await?;
        let profile = scope.lock_employee(employee).await?;
        if !profile.status.is_active() {
            return Err(HrError::EmployeeInactive(employee));
        }

        let leave_type = scope
            .tx()
            .leave_type(leave_type_id)
            .await?
            .ok_or_else(|| HrError::not_found("leave type", leave_type_id))?;
        if !leave_type.is_active {
            return Err(HrError::LeaveTypeInactive(leave_type.code));
        }
        let days = range.days();
        leave_type.check_duration(days)?;

        let overlapping = scope
            .tx()
            .count_overlapping_leave(employee, range, LeaveStatus::Approved, None)
            .await?;
        if overlapping > 0 {
            return Err(HrError::OverlappingRequest);
        }
        if scope.tx().count_duplicate_leave(employee, range).await? > 0 {
            return Err(HrError::DuplicateRequest);
        }

        if let Some(kind) = leave_type.quota_kind {
            let balance = scope
                .tx()
                .balance(employee, kind, Lock::None)
                .await?
                .ok_or_else(|| HrError::not_found("leave balance", format!("{employee}/{kind}")))?;
            if !balance.has_sufficient(days) {
                return Err(HrError::InsufficientBalance {
                    requested: days,
                    remaining: balance.remaining(),
                });
            }
        }

        let request = scope
            .tx()
            .insert_leave_request(&NewLeaveRequest {
                employee_id: employee,
                leave_type_id,
                range,
                reason,
                created_at: now,
            })
            .await?;
        scope.commit().await?;

        info!(employee, request_id = request.id, days, "Leave request submitted");
        Ok(request)
    }

    /// Approves a PENDING request and debits its quota atomically.
    #[instrument(skip(self), err)]
    pub async fn approve(&self, id: LeaveRequestId, approver: EmployeeId) -> HrResult<LeaveRequest> {
        self.hr
            .gateway()
            .retry("leave.approve", || self.approve_once(id, approver))
            .await
    }

    async fn approve_once(&self, id: LeaveRequestId, approver: EmployeeId) -> HrResult<LeaveRequest> {
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("leave.approve").await?;
        let owner = owner_of(scope.tx(), id).await?;
        scope.lock_employee(owner).await?;
        let request = scope.lock_leave_request(id).await?;
        if request.status != LeaveStatus::Pending {
            return Err(HrError::NotPending {
                status: request.status.to_string(),
            });
        }

        let range = DateRange::new(request.start_date, request.end_date)?;
        let overlapping = scope
            .tx()
            .count_overlapping_leave(owner, range, LeaveStatus::Approved, Some(id))
            .await?;
        if overlapping > 0 {
            return Err(HrError::OverlappingRequest);
        }

        let leave_type = scope
            .tx()
            .leave_type(request.leave_type_id)
            .await?
            .ok_or_else(|| HrError::not_found("leave type", request.leave_type_id))?;
        if let Some(kind) = leave_type.quota_kind {
            debit_in(&mut scope, owner, kind, request.total_days, now).await?;
        }

        let change = StatusChange {
            status: LeaveStatus::Approved,
            actor: approver,
            reason: None,
            at: now,
        };
        scope.tx().update_leave_status(id, &change).await?;
        scope.commit().await?;

        info!(request_id = id, employee = owner, approver, "Leave request approved");
        Ok(apply(request, change))
    }

    /// Rejects a PENDING request. Balances are not touched.
    #[instrument(skip(self, reason), err)]
    pub async fn reject(
        &self,
        id: LeaveRequestId,
        approver: EmployeeId,
        reason: Option<String>,
    ) -> HrResult<LeaveRequest> {
        self.hr
            .gateway()
            .retry("leave.reject", || self.reject_once(id, approver, reason.clone()))
            .await
    }

    async fn reject_once(
        &self,
        id: LeaveRequestId,
        approver: EmployeeId,
        reason: Option<String>,
    ) -> HrResult<LeaveRequest> {
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("leave.reject").await?;
        let owner = owner_of(scope.tx(), id).await?;
        scope.lock_employee(owner).await?;
        let request = scope.lock_leave_request(id).await?;
        if request.status != LeaveStatus::Pending {
            return Err(HrError::NotPending {
                status: request.status.to_string(),
            });
        }

        let change = StatusChange {
            status: LeaveStatus::Rejected,
            actor: approver,
            reason,
            at: now,
        };
        scope.tx().update_leave_status(id, &change).await?;
        scope.commit().await?;

        info!(request_id = id, employee = owner, approver, "Leave request rejected");
        Ok(apply(request, change))
    }

    /// Cancels a PENDING or APPROVED request. Cancelling an approved
    /// request credits the debited days back.
    #[instrument(skip(self), err)]
    pub async fn cancel(&self, id: LeaveRequestId, actor: EmployeeId) -> HrResult<LeaveRequest> {
        self.hr
            .gateway()
            .retry("leave.cancel", || self.cancel_once(id, actor))
            .await
    }

    async fn cancel_once(&self, id: LeaveRequestId, actor: EmployeeId) -> HrResult<LeaveRequest> {
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("leave.cancel").await?;
        let owner = owner_of(scope.tx(), id).await?;
        scope.lock_employee(owner).await?;
        let request = scope.lock_leave_request(id).await?;

        match request.status {
            LeaveStatus::Pending => {}
            LeaveStatus::Approved => {
                let leave_type = scope
                    .tx()
                    .leave_type(request.leave_type_id)
                    .await?
                    .ok_or_else(|| HrError::not_found("leave type", request.leave_type_id))?;
                if let Some(kind) = leave_type.quota_kind {
                    credit_in(&mut scope, owner, kind, request.total_days, now).await?;
                }
            }
            status => {
                return Err(HrError::NotCancellable {
                    status: status.to_string(),
                });
            }
        }

        let change = StatusChange {
            status: LeaveStatus::Cancelled,
            actor,
            reason: None,
            at: now,
        };
        scope.tx().update_leave_status(id, &change).await?;
        scope.commit().await?;

        info!(request_id = id, employee = owner, actor, "Leave request cancelled");
        Ok(apply(request, change))
    }

    pub async fn get(&self, id: LeaveRequestId) -> HrResult<LeaveRequest> {
        self.hr
            .gateway()
            .read("leave.get", |tx| {
                Box::pin(async move {
                    tx.leave_request(id, Lock::None)
                        .await?
                        .ok_or_else(|| HrError::not_found("leave request", id))
                })
            })
            .await
    }

    /// Newest first.
    pub async fn for_employee(&self, employee: EmployeeId) -> HrResult<Vec<LeaveRequest>> {
        self.hr
            .gateway()
            .read("leave.for_employee", |tx| {
                Box::pin(async move { Ok(tx.leave_requests_for_employee(employee).await?) })
            })
            .await
    }

    pub async fn pending_for_supervisor(&self, supervisor: EmployeeId) -> HrResult<Vec<LeaveRequest>> {
        self.hr
            .gateway()
            .read("leave.pending", |tx| {
                Box::pin(async move { Ok(tx.pending_leave_for_supervisor(supervisor).await?) })
            })
            .await
    }

    /// The approved leave covering `day`, if any.
    pub async fn current_leave(
        &self,
        employee: EmployeeId,
        day: NaiveDate,
    ) -> HrResult<Option<LeaveRequest>> {
        self.hr
            .gateway()
            .read("leave.current", |tx| {
                Box::pin(async move { Ok(tx.approved_leave_on(employee, day).await?) })
            })
            .await
    }

    pub async fn supervisor_of(&self, employee: EmployeeId) -> HrResult<Option<Employee>> {
        self.hr
            .gateway()
            .read("leave.supervisor_of", |tx| {
                Box::pin(async move {
                    let profile = tx
                        .employee(employee, Lock::None)
                        .await?
                        .ok_or_else(|| HrError::not_found("employee", employee))?;
                    match profile.supervisor_id {
                        Some(id) => Ok(tx.employee(id, Lock::None).await?),
                        None => Ok(None),
                    }
                })
            })
            .await
    }

    /// Fails with `NotSupervisor` unless `approver` supervises the request's
    /// employee.
    pub async fn ensure_supervisor(&self, id: LeaveRequestId, approver: EmployeeId) -> HrResult<()> {
        let request = self.get(id).await?;
        let supervisor = self.supervisor_of(request.employee_id).await?;
        if supervisor.is_some_and(|s| s.id == approver) {
            Ok(())
        } else {
            Err(HrError::NotSupervisor {
                approver,
                employee: request.employee_id,
            })
        }
    }
}

async fn owner_of<T: Transaction>(tx: &mut T, id: LeaveRequestId) -> HrResult<EmployeeId> {
    tx.leave_request(id, Lock::None)
        .await?
        .map(|r| r.employee_id)
        .ok_or_else(|| HrError::not_found("leave request", id))
}

fn apply(mut request: LeaveRequest, change: StatusChange<LeaveStatus>) -> LeaveRequest {
    request.status = change.status;
    request.updated_by = Some(change.actor);
    request.updated_at = Some(change.at);
    if change.reason.is_some() {
        request.rejection_reason = change.reason;
    }
    request
}

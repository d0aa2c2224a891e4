//! Business travel requests. Same range, overlap and approval rules as
//! leave, without a quota; an approved trip can later be completed.

use chrono::NaiveDate;
use tracing::{info, instrument};

use super::Hr;
use crate::error::{HrError, HrResult};
use crate::model::DateRange;
use crate::model::employee::EmployeeId;
use crate::model::leave_request::{LeaveStatus, StatusChange};
use crate::model::travel_request::{NewTravelRequest, TravelRequest, TravelRequestId, TravelStatus};
use crate::store::{Lock, Store, Transaction};

pub struct TravelWorkflow<'a, S: Store> {
    hr: &'a Hr<S>,
}

/// Which states a transition may start from.
#[derive(Debug, Clone, Copy)]
enum Transition {
    Approve,
    Reject,
    Cancel,
    Complete,
}

impl Transition {
    fn op(self) -> &'static str {
        match self {
            Transition::Approve => "travel.approve",
            Transition::Reject => "travel.reject",
            Transition::Cancel => "travel.cancel",
            Transition::Complete => "travel.complete",
        }
    }

    fn target(self) -> TravelStatus {
        match self {
            Transition::Approve => TravelStatus::Approved,
            Transition::Reject => TravelStatus::Rejected,
            Transition::Cancel => TravelStatus::Cancelled,
            Transition::Complete => TravelStatus::Completed,
        }
    }

    fn check(self, current: TravelStatus) -> HrResult<()> {
        let status = current.to_string();
        match (self, current) {
            (Transition::Approve | Transition::Reject, TravelStatus::Pending) => Ok(()),
            (Transition::Approve | Transition::Reject, _) => Err(HrError::NotPending { status }),
            (Transition::Cancel, TravelStatus::Pending | TravelStatus::Approved) => Ok(()),
            (Transition::Cancel, _) => Err(HrError::NotCancellable { status }),
            (Transition::Complete, TravelStatus::Approved) => Ok(()),
            (Transition::Complete, _) => Err(HrError::NotApproved { status }),
        }
    }
}

impl<'a, S: Store> TravelWorkflow<'a, S> {
    pub(super) fn new(hr: &'a Hr<S>) -> Self {
        Self { hr }
    }

    #[instrument(skip(self, destination, reason), err)]
    pub async fn submit(
        &self,
        employee: EmployeeId,
        destination: String,
        reason: Option<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> HrResult<TravelRequest> {
        let range = DateRange::new(start, end)?;
        let destination = destination.trim().to_string();
        if destination.is_empty() {
            return Err(HrError::InvalidInput("destination must not be empty".into()));
        }
        self.hr
            .gateway()
            .retry("travel.submit", || {
                self.submit_once(employee, destination.clone(), reason.clone(), range)
            })
            .await
    }

    async fn submit_once(
        &self,
        employee: EmployeeId,
        destination: String,
        reason: Option<String>,
        range: DateRange,
    ) -> HrResult<TravelRequest> {
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("travel.submit").await?;
        let profile = scope.lock_employee(employee).await?;
        if !profile.status.is_active() {
            return Err(HrError::EmployeeInactive(employee));
        }

        let on_leave = scope
            .tx()
            .count_overlapping_leave(employee, range, LeaveStatus::Approved, None)
            .await?;
        let travelling = scope
            .tx()
            .count_overlapping_travel(employee, range, TravelStatus::Approved, None)
            .await?;
        if on_leave > 0 || travelling > 0 {
            return Err(HrError::OverlappingRequest);
        }
        if scope.tx().count_duplicate_travel(employee, range).await? > 0 {
            return Err(HrError::DuplicateRequest);
        }

        let request = scope
            .tx()
            .insert_travel_request(&NewTravelRequest {
                employee_id: employee,
                destination,
                reason,
                range,
                created_at: now,
            })
            .await?;
        scope.commit().await?;

        info!(employee, request_id = request.id, days = request.total_days, "Travel request submitted");
        Ok(request)
    }

    #[instrument(skip(self), err)]
    pub async fn approve(&self, id: TravelRequestId, approver: EmployeeId) -> HrResult<TravelRequest> {
        self.transition(id, approver, Transition::Approve, None).await
    }

    #[instrument(skip(self, reason), err)]
    pub async fn reject(
        &self,
        id: TravelRequestId,
        approver: EmployeeId,
        reason: Option<String>,
    ) -> HrResult<TravelRequest> {
        self.transition(id, approver, Transition::Reject, reason).await
    }

    #[instrument(skip(self), err)]
    pub async fn cancel(&self, id: TravelRequestId, actor: EmployeeId) -> HrResult<TravelRequest> {
        self.transition(id, actor, Transition::Cancel, None).await
    }

    #[instrument(skip(self), err)]
    pub async fn complete(&self, id: TravelRequestId, actor: EmployeeId) -> HrResult<TravelRequest> {
        self.transition(id, actor, Transition::Complete, None).await
    }

    async fn transition(
        &self,
        id: TravelRequestId,
        actor: EmployeeId,
        transition: Transition,
        reason: Option<String>,
    ) -> HrResult<TravelRequest> {
        self.hr
            .gateway()
            .retry(transition.op(), || {
                self.transition_once(id, actor, transition, reason.clone())
            })
            .await
    }

    async fn transition_once(
        &self,
        id: TravelRequestId,
        actor: EmployeeId,
        transition: Transition,
        reason: Option<String>,
    ) -> HrResult<TravelRequest> {
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin(transition.op()).await?;
        let owner = scope
            .tx()
            .travel_request(id, Lock::None)
            .await?
            .map(|r| r.employee_id)
            .ok_or_else(|| HrError::not_found("travel request", id))?;
        scope.lock_employee(owner).await?;
        let mut request = scope.lock_travel_request(id).await?;
        transition.check(request.status)?;

        if let Transition::Approve = transition {
            let range = DateRange::new(request.start_date, request.end_date)?;
            let on_leave = scope
                .tx()
                .count_overlapping_leave(owner, range, LeaveStatus::Approved, None)
                .await?;
            let travelling = scope
                .tx()
                .count_overlapping_travel(owner, range, TravelStatus::Approved, Some(id))
                .await?;
            if on_leave > 0 || travelling > 0 {
                return Err(HrError::OverlappingRequest);
            }
        }

        let change = StatusChange {
            status: transition.target(),
            actor,
            reason,
            at: now,
        };
        scope.tx().update_travel_status(id, &change).await?;
        scope.commit().await?;

        request.status = change.status;
        request.updated_by = Some(actor);
        request.updated_at = Some(now);
        if change.reason.is_some() {
            request.rejection_reason = change.reason;
        }
        info!(request_id = id, employee = owner, actor, status = %request.status, "Travel request updated");
        Ok(request)
    }

    pub async fn get(&self, id: TravelRequestId) -> HrResult<TravelRequest> {
        self.hr
            .gateway()
            .read("travel.get", |tx| {
                Box::pin(async move {
                    tx.travel_request(id, Lock::None)
                        .await?
                        .ok_or_else(|| HrError::not_found("travel request", id))
                })
            })
            .await
    }

    pub async fn for_employee(&self, employee: EmployeeId) -> HrResult<Vec<TravelRequest>> {
        self.hr
            .gateway()
            .read("travel.for_employee", |tx| {
                Box::pin(async move { Ok(tx.travel_requests_for_employee(employee).await?) })
            })
            .await
    }

    pub async fn pending_for_supervisor(&self, supervisor: EmployeeId) -> HrResult<Vec<TravelRequest>> {
        self.hr
            .gateway()
            .read("travel.pending", |tx| {
                Box::pin(async move { Ok(tx.pending_travel_for_supervisor(supervisor).await?) })
            })
            .await
    }
}

//! In-process [`Store`].
//!
//! A transaction owns the store mutex from `begin` until it is committed or
//! dropped, so transactions are fully serialized: every read is effectively
//! `FOR UPDATE`. Work happens on a private copy of the tables which `commit`
//! publishes; dropping the transaction discards it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Lock, Store, StoreResult, Transaction};
use crate::error::StoreError;
use crate::model::DateRange;
use crate::model::attendance::{Attendance, AttendanceId, NewAttendance};
use crate::model::credential::{NewResetToken, PasswordHistory, PasswordResetToken};
use crate::model::employee::{Employee, EmployeeId, EmploymentStatus, NewEmployee};
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{
    LeaveRequest, LeaveRequestId, LeaveStatus, NewLeaveRequest, StatusChange,
};
use crate::model::leave_type::{LeaveType, LeaveTypeId, NewLeaveType, QuotaKind};
use crate::model::travel_request::{
    NewTravelRequest, TravelRequest, TravelRequestId, TravelStatus,
};

#[derive(Debug, Default, Clone)]
struct Tables {
    next_id: u64,
    employees: BTreeMap<EmployeeId, Employee>,
    leave_types: BTreeMap<LeaveTypeId, LeaveType>,
    balances: BTreeMap<(EmployeeId, QuotaKind), LeaveBalance>,
    leave_requests: BTreeMap<LeaveRequestId, LeaveRequest>,
    travel_requests: BTreeMap<TravelRequestId, TravelRequest>,
    attendance: BTreeMap<AttendanceId, Attendance>,
    reset_tokens: BTreeMap<u64, PasswordResetToken>,
    password_history: BTreeMap<u64, PasswordHistory>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn employee_mut(&mut self, id: EmployeeId) -> StoreResult<&mut Employee> {
        self.employees
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("employee {id} missing")))
    }

    fn supervised_by(&self, supervisor: EmployeeId) -> Vec<EmployeeId> {
        self.employees
            .values()
            .filter(|e| e.is_supervised_by(supervisor))
            .map(|e| e.id)
            .collect()
    }
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicU32,
    commit: AtomicU32,
}

impl Faults {
    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` calls to `begin` fail with a transient error.
    pub fn fail_next_begins(&self, n: u32) {
        self.faults.begin.store(n, Ordering::SeqCst);
    }

    /// The next `n` commits fail with a transient error and roll back.
    pub fn fail_next_commits(&self, n: u32) {
        self.faults.commit.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        if Faults::take(&self.faults.begin) {
            return Err(StoreError::Transient("injected lock wait timeout".into()));
        }
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx {
            guard,
            work,
            faults: self.faults.clone(),
        })
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
    faults: Arc<Faults>,
}

fn same_dates(start: NaiveDate, end: NaiveDate, range: DateRange) -> bool {
    start == range.start() && end == range.end()
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn employee(&mut self, id: EmployeeId, _lock: Lock) -> StoreResult<Option<Employee>> {
        Ok(self.work.employees.get(&id).cloned())
    }

    async fn employee_by_email(
        &mut self,
        email: &str,
        _lock: Lock,
    ) -> StoreResult<Option<Employee>> {
        Ok(self
            .work
            .employees
            .values()
            .find(|e| e.email == email)
            .cloned())
    }

    async fn insert_employee(
        &mut self,
        new: &NewEmployee,
        at: NaiveDateTime,
    ) -> StoreResult<Employee> {
        let taken = self
            .work
            .employees
            .values()
            .any(|e| e.email == new.email || e.employee_code == new.employee_code);
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "employee {} / {}",
                new.employee_code, new.email
            )));
        }
        let employee = Employee {
            id: self.work.allocate_id(),
            employee_code: new.employee_code.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            supervisor_id: new.supervisor_id,
            status: new.status,
            annual_leave_balance: 0,
            sick_leave_balance: 0,
            created_at: at,
            updated_at: None,
        };
        self.work.employees.insert(employee.id, employee.clone());
        Ok(employee)
    }

    async fn set_employee_status(
        &mut self,
        id: EmployeeId,
        status: EmploymentStatus,
        at: NaiveDateTime,
    ) -> StoreResult<()> {
        let employee = self.work.employee_mut(id)?;
        employee.status = status;
        employee.updated_at = Some(at);
        Ok(())
    }

    async fn set_leave_counter(
        &mut self,
        id: EmployeeId,
        kind: QuotaKind,
        remaining: i32,
    ) -> StoreResult<()> {
        let employee = self.work.employee_mut(id)?;
        match kind {
            QuotaKind::Annual => employee.annual_leave_balance = remaining,
            QuotaKind::Sick => employee.sick_leave_balance = remaining,
        }
        Ok(())
    }

    async fn set_password_hash(
        &mut self,
        id: EmployeeId,
        hash: &str,
        at: NaiveDateTime,
    ) -> StoreResult<()> {
        let employee = self.work.employee_mut(id)?;
        employee.password_hash = hash.to_string();
        employee.updated_at = Some(at);
        Ok(())
    }

    async fn subordinates(&mut self, supervisor: EmployeeId) -> StoreResult<Vec<Employee>> {
        Ok(self
            .work
            .employees
            .values()
            .filter(|e| e.is_supervised_by(supervisor))
            .cloned()
            .collect())
    }

    async fn leave_type(&mut self, id: LeaveTypeId) -> StoreResult<Option<LeaveType>> {
        Ok(self.work.leave_types.get(&id).cloned())
    }

    async fn leave_types(&mut self, active_only: bool) -> StoreResult<Vec<LeaveType>> {
        Ok(self
            .work
            .leave_types
            .values()
            .filter(|lt| !active_only || lt.is_active)
            .cloned()
            .collect())
    }

    async fn insert_leave_type(&mut self, new: &NewLeaveType) -> StoreResult<LeaveType> {
        if self.work.leave_types.values().any(|lt| lt.code == new.code) {
            return Err(StoreError::UniqueViolation(format!("leave type {}", new.code)));
        }
        let leave_type = LeaveType {
            id: self.work.allocate_id(),
            code: new.code.clone(),
            name: new.name.clone(),
            quota_kind: new.quota_kind,
            is_paid: new.is_paid,
            min_duration_days: new.min_duration_days,
            max_duration_days: new.max_duration_days,
            requires_document: new.requires_document,
            is_active: true,
        };
        self.work.leave_types.insert(leave_type.id, leave_type.clone());
        Ok(leave_type)
    }

    async fn balance(
        &mut self,
        employee: EmployeeId,
        kind: QuotaKind,
        _lock: Lock,
    ) -> StoreResult<Option<LeaveBalance>> {
        Ok(self.work.balances.get(&(employee, kind)).cloned())
    }

    async fn balances(&mut self, employee: EmployeeId) -> StoreResult<Vec<LeaveBalance>> {
        Ok(self
            .work
            .balances
            .values()
            .filter(|b| b.employee_id == employee)
            .cloned()
            .collect())
    }

    async fn save_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()> {
        self.work
            .balances
            .insert((balance.employee_id, balance.kind), balance.clone());
        Ok(())
    }

    async fn insert_leave_request(&mut self, new: &NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let request = LeaveRequest {
            id: self.work.allocate_id(),
            employee_id: new.employee_id,
            leave_type_id: new.leave_type_id,
            start_date: new.range.start(),
            end_date: new.range.end(),
            total_days: new.range.days(),
            reason: new.reason.clone(),
            status: LeaveStatus::Pending,
            rejection_reason: None,
            created_by: new.employee_id,
            updated_by: None,
            created_at: new.created_at,
            updated_at: None,
        };
        self.work.leave_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn leave_request(
        &mut self,
        id: LeaveRequestId,
        _lock: Lock,
    ) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.work.leave_requests.get(&id).cloned())
    }

    async fn update_leave_status(
        &mut self,
        id: LeaveRequestId,
        change: &StatusChange<LeaveStatus>,
    ) -> StoreResult<()> {
        let request = self
            .work
            .leave_requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("leave request {id} missing")))?;
        request.status = change.status;
        request.updated_by = Some(change.actor);
        request.updated_at = Some(change.at);
        if change.reason.is_some() {
            request.rejection_reason = change.reason.clone();
        }
        Ok(())
    }

    async fn count_overlapping_leave(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
        status: LeaveStatus,
        exclude: Option<LeaveRequestId>,
    ) -> StoreResult<u64> {
        Ok(self
            .work
            .leave_requests
            .values()
            .filter(|r| r.employee_id == employee && r.status == status)
            .filter(|r| Some(r.id) != exclude)
            .filter(|r| range.overlaps(r.start_date, r.end_date))
            .count() as u64)
    }

    async fn count_duplicate_leave(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
    ) -> StoreResult<u64> {
        Ok(self
            .work
            .leave_requests
            .values()
            .filter(|r| r.employee_id == employee)
            .filter(|r| matches!(r.status, LeaveStatus::Pending | LeaveStatus::Approved))
            .filter(|r| same_dates(r.start_date, r.end_date, range))
            .count() as u64)
    }

    async fn leave_requests_for_employee(
        &mut self,
        employee: EmployeeId,
    ) -> StoreResult<Vec<LeaveRequest>> {
        let mut requests: Vec<_> = self
            .work
            .leave_requests
            .values()
            .filter(|r| r.employee_id == employee)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn pending_leave_for_supervisor(
        &mut self,
        supervisor: EmployeeId,
    ) -> StoreResult<Vec<LeaveRequest>> {
        let team = self.work.supervised_by(supervisor);
        Ok(self
            .work
            .leave_requests
            .values()
            .filter(|r| r.status == LeaveStatus::Pending && team.contains(&r.employee_id))
            .cloned()
            .collect())
    }

    async fn approved_leave_on(
        &mut self,
        employee: EmployeeId,
        day: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>> {
        Ok(self
            .work
            .leave_requests
            .values()
            .find(|r| r.employee_id == employee && r.status == LeaveStatus::Approved && r.covers(day))
            .cloned())
    }

    async fn insert_travel_request(
        &mut self,
        new: &NewTravelRequest,
    ) -> StoreResult<TravelRequest> {
        let request = TravelRequest {
            id: self.work.allocate_id(),
            employee_id: new.employee_id,
            destination: new.destination.clone(),
            reason: new.reason.clone(),
            start_date: new.range.start(),
            end_date: new.range.end(),
            total_days: new.range.days(),
            status: TravelStatus::Pending,
            rejection_reason: None,
            created_by: new.employee_id,
            updated_by: None,
            created_at: new.created_at,
            updated_at: None,
        };
        self.work.travel_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn travel_request(
        &mut self,
        id: TravelRequestId,
        _lock: Lock,
    ) -> StoreResult<Option<TravelRequest>> {
        Ok(self.work.travel_requests.get(&id).cloned())
    }

    async fn update_travel_status(
        &mut self,
        id: TravelRequestId,
        change: &StatusChange<TravelStatus>,
    ) -> StoreResult<()> {
        let request = self
            .work
            .travel_requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("travel request {id} missing")))?;
        request.status = change.status;
        request.updated_by = Some(change.actor);
        request.updated_at = Some(change.at);
        if change.reason.is_some() {
            request.rejection_reason = change.reason.clone();
        }
        Ok(())
    }

    async fn count_overlapping_travel(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
        status: TravelStatus,
        exclude: Option<TravelRequestId>,
    ) -> StoreResult<u64> {
        Ok(self
            .work
            .travel_requests
            .values()
            .filter(|r| r.employee_id == employee && r.status == status)
            .filter(|r| Some(r.id) != exclude)
            .filter(|r| range.overlaps(r.start_date, r.end_date))
            .count() as u64)
    }

    async fn count_duplicate_travel(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
    ) -> StoreResult<u64> {
        Ok(self
            .work
            .travel_requests
            .values()
            .filter(|r| r.employee_id == employee)
            .filter(|r| matches!(r.status, TravelStatus::Pending | TravelStatus::Approved))
            .filter(|r| same_dates(r.start_date, r.end_date, range))
            .count() as u64)
    }

    async fn travel_requests_for_employee(
        &mut self,
        employee: EmployeeId,
    ) -> StoreResult<Vec<TravelRequest>> {
        let mut requests: Vec<_> = self
            .work
            .travel_requests
            .values()
            .filter(|r| r.employee_id == employee)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn pending_travel_for_supervisor(
        &mut self,
        supervisor: EmployeeId,
    ) -> StoreResult<Vec<TravelRequest>> {
        let team = self.work.supervised_by(supervisor);
        Ok(self
            .work
            .travel_requests
            .values()
            .filter(|r| r.status == TravelStatus::Pending && team.contains(&r.employee_id))
            .cloned()
            .collect())
    }

    async fn open_session(&mut self, employee: EmployeeId) -> StoreResult<Option<Attendance>> {
        Ok(self
            .work
            .attendance
            .values()
            .find(|a| a.employee_id == employee && a.is_open())
            .cloned())
    }

    async fn sessions_between(
        &mut self,
        employee: EmployeeId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Attendance>> {
        let mut sessions: Vec<_> = self
            .work
            .attendance
            .values()
            .filter(|a| a.employee_id == employee)
            .filter(|a| a.clock_in_time >= from && a.clock_in_time < to)
            .cloned()
            .collect();
        sessions.sort_by_key(|a| (a.clock_in_time, a.id));
        Ok(sessions)
    }

    async fn insert_attendance(&mut self, new: &NewAttendance) -> StoreResult<Attendance> {
        let attendance = Attendance {
            id: self.work.allocate_id(),
            employee_id: new.employee_id,
            clock_in_time: new.clock_in_time,
            clock_out_time: None,
            latitude: new.location.map(|p| p.latitude),
            longitude: new.location.map(|p| p.longitude),
            location_address: new.location_address.clone(),
            is_within_geofence: new.is_within_geofence,
            attendance_type: new.attendance_type,
            notes: new.notes.clone(),
            created_at: new.clock_in_time,
        };
        self.work.attendance.insert(attendance.id, attendance.clone());
        Ok(attendance)
    }

    async fn close_session(&mut self, id: AttendanceId, at: NaiveDateTime) -> StoreResult<()> {
        let session = self
            .work
            .attendance
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("attendance {id} missing")))?;
        session.clock_out_time = Some(at);
        Ok(())
    }

    async fn count_tokens_since(&mut self, email: &str, since: NaiveDateTime) -> StoreResult<u64> {
        Ok(self
            .work
            .reset_tokens
            .values()
            .filter(|t| t.email == email && t.created_at >= since)
            .count() as u64)
    }

    async fn invalidate_tokens_for_email(
        &mut self,
        email: &str,
        at: NaiveDateTime,
    ) -> StoreResult<u64> {
        let mut changed = 0;
        for token in self
            .work
            .reset_tokens
            .values_mut()
            .filter(|t| t.email == email && !t.used)
        {
            token.used = true;
            token.used_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_reset_token(&mut self, new: &NewResetToken) -> StoreResult<PasswordResetToken> {
        if self.work.reset_tokens.values().any(|t| t.token == new.token) {
            return Err(StoreError::UniqueViolation("reset token".into()));
        }
        let token = PasswordResetToken {
            id: self.work.allocate_id(),
            token: new.token.clone(),
            email: new.email.clone(),
            expiry_date: new.expiry_date,
            used: new.used,
            created_at: new.created_at,
            used_at: new.used.then_some(new.created_at),
        };
        self.work.reset_tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn reset_token(
        &mut self,
        token: &str,
        _lock: Lock,
    ) -> StoreResult<Option<PasswordResetToken>> {
        Ok(self
            .work
            .reset_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn mark_token_used(&mut self, id: u64, at: NaiveDateTime) -> StoreResult<()> {
        let token = self
            .work
            .reset_tokens
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("reset token {id} missing")))?;
        token.used = true;
        token.used_at = Some(at);
        Ok(())
    }

    async fn delete_expired_tokens(&mut self, now: NaiveDateTime) -> StoreResult<u64> {
        let before = self.work.reset_tokens.len();
        self.work.reset_tokens.retain(|_, t| t.expiry_date > now);
        Ok((before - self.work.reset_tokens.len()) as u64)
    }

    async fn recent_password_history(
        &mut self,
        employee: EmployeeId,
        limit: u32,
    ) -> StoreResult<Vec<PasswordHistory>> {
        let mut rows: Vec<_> = self
            .work
            .password_history
            .values()
            .filter(|h| h.employee_id == employee)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn append_password_history(
        &mut self,
        employee: EmployeeId,
        hash: &str,
        at: NaiveDateTime,
    ) -> StoreResult<PasswordHistory> {
        let row = PasswordHistory {
            id: self.work.allocate_id(),
            employee_id: employee,
            hashed_password: hash.to_string(),
            created_at: at,
        };
        self.work.password_history.insert(row.id, row.clone());
        Ok(row)
    }

    async fn prune_password_history(
        &mut self,
        employee: EmployeeId,
        keep: u32,
    ) -> StoreResult<u64> {
        let keep_ids: Vec<u64> = self
            .recent_password_history(employee, keep)
            .await?
            .into_iter()
            .map(|h| h.id)
            .collect();
        let before = self.work.password_history.len();
        self.work
            .password_history
            .retain(|id, h| h.employee_id != employee || keep_ids.contains(id));
        Ok((before - self.work.password_history.len()) as u64)
    }

    async fn commit(self) -> StoreResult<()> {
        let MemoryTx {
            mut guard,
            work,
            faults,
        } = self;
        if Faults::take(&faults.commit) {
            return Err(StoreError::Transient("injected commit failure".into()));
        }
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn new_employee(code: &str) -> NewEmployee {
        NewEmployee {
            employee_code: code.into(),
            first_name: "Ayu".into(),
            last_name: "Lestari".into(),
            email: format!("{code}@x.com"),
            password_hash: "h0".into(),
            supervisor_id: None,
            status: EmploymentStatus::Active,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_employee(&new_employee("E1"), at()).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.employee_by_email("E1@x.com", Lock::None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let e = tx.insert_employee(&new_employee("E1"), at()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.employee(e.id, Lock::None).await.unwrap(), Some(e));
    }

    #[tokio::test]
    async fn injected_commit_failure_discards_work() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);
        let mut tx = store.begin().await.unwrap();
        tx.insert_employee(&new_employee("E1"), at()).await.unwrap();
        assert!(matches!(tx.commit().await, Err(StoreError::Transient(_))));

        let mut tx = store.begin().await.unwrap();
        assert!(tx.employee_by_email("E1@x.com", Lock::None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_employee(&new_employee("E1"), at()).await.unwrap();
        let mut dup = new_employee("E2");
        dup.email = "E1@x.com".into();
        assert!(matches!(
            tx.insert_employee(&dup, at()).await,
            Err(StoreError::UniqueViolation(_))
        ));
    }

    #[tokio::test]
    async fn prune_keeps_newest_rows() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for (i, hash) in ["a", "b", "c", "d"].iter().enumerate() {
            tx.append_password_history(1, hash, at() + chrono::Duration::minutes(i as i64))
                .await
                .unwrap();
        }
        assert_eq!(tx.prune_password_history(1, 2).await.unwrap(), 2);
        let left: Vec<_> = tx
            .recent_password_history(1, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.hashed_password)
            .collect();
        assert_eq!(left, vec!["d", "c"]);
    }
}

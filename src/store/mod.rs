//! Transactional row store the engine runs against.
//!
//! A [`Store`] hands out [`Transaction`]s. Reads that may precede a write take
//! a [`Lock`]; `Lock::ForUpdate` holds an exclusive row lock until the
//! transaction commits or is dropped. Dropping a transaction without calling
//! [`Transaction::commit`] rolls it back.
//!
//! The `count_*` reads and `recent_password_history` back checks that are
//! repeated under a held lock, so they must see the latest committed rows
//! even when an earlier plain read in the same transaction saw older ones.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

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

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
    None,
    ForUpdate,
}

impl Lock {
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Lock::ForUpdate)
    }
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: Transaction;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}

#[async_trait]
pub trait Transaction: Send {
    // ---- employees ----
    async fn employee(&mut self, id: EmployeeId, lock: Lock) -> StoreResult<Option<Employee>>;

    async fn employee_by_email(&mut self, email: &str, lock: Lock)
    -> StoreResult<Option<Employee>>;

    async fn insert_employee(
        &mut self,
        new: &NewEmployee,
        at: NaiveDateTime,
    ) -> StoreResult<Employee>;

    async fn set_employee_status(
        &mut self,
        id: EmployeeId,
        status: EmploymentStatus,
        at: NaiveDateTime,
    ) -> StoreResult<()>;

    /// Refreshes the denormalized remaining-days counter for `kind`.
    async fn set_leave_counter(
        &mut self,
        id: EmployeeId,
        kind: QuotaKind,
        remaining: i32,
    ) -> StoreResult<()>;

    async fn set_password_hash(
        &mut self,
        id: EmployeeId,
        hash: &str,
        at: NaiveDateTime,
    ) -> StoreResult<()>;

    async fn subordinates(&mut self, supervisor: EmployeeId) -> StoreResult<Vec<Employee>>;

    // ---- leave types ----
    async fn leave_type(&mut self, id: LeaveTypeId) -> StoreResult<Option<LeaveType>>;

    async fn leave_types(&mut self, active_only: bool) -> StoreResult<Vec<LeaveType>>;

    async fn insert_leave_type(&mut self, new: &NewLeaveType) -> StoreResult<LeaveType>;

    // ---- balances ----
    async fn balance(
        &mut self,
        employee: EmployeeId,
        kind: QuotaKind,
        lock: Lock,
    ) -> StoreResult<Option<LeaveBalance>>;

    async fn balances(&mut self, employee: EmployeeId) -> StoreResult<Vec<LeaveBalance>>;

    /// Inserts or overwrites the row keyed by `(employee_id, kind)`.
    async fn save_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()>;

    // ---- leave requests ----
    async fn insert_leave_request(&mut self, new: &NewLeaveRequest) -> StoreResult<LeaveRequest>;

    async fn leave_request(
        &mut self,
        id: LeaveRequestId,
        lock: Lock,
    ) -> StoreResult<Option<LeaveRequest>>;

    async fn update_leave_status(
        &mut self,
        id: LeaveRequestId,
        change: &StatusChange<LeaveStatus>,
    ) -> StoreResult<()>;

    /// Requests of `employee` in `status` whose dates intersect `range`.
    async fn count_overlapping_leave(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
        status: LeaveStatus,
        exclude: Option<LeaveRequestId>,
    ) -> StoreResult<u64>;

    /// PENDING or APPROVED requests with exactly these dates.
    async fn count_duplicate_leave(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
    ) -> StoreResult<u64>;

    async fn leave_requests_for_employee(
        &mut self,
        employee: EmployeeId,
    ) -> StoreResult<Vec<LeaveRequest>>;

    async fn pending_leave_for_supervisor(
        &mut self,
        supervisor: EmployeeId,
    ) -> StoreResult<Vec<LeaveRequest>>;

    async fn approved_leave_on(
        &mut self,
        employee: EmployeeId,
        day: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>>;

    // ---- travel requests ----
    async fn insert_travel_request(
        &mut self,
        new: &NewTravelRequest,
    ) -> StoreResult<TravelRequest>;

    async fn travel_request(
        &mut self,
        id: TravelRequestId,
        lock: Lock,
    ) -> StoreResult<Option<TravelRequest>>;

    async fn update_travel_status(
        &mut self,
        id: TravelRequestId,
        change: &StatusChange<TravelStatus>,
    ) -> StoreResult<()>;

    async fn count_overlapping_travel(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
        status: TravelStatus,
        exclude: Option<TravelRequestId>,
    ) -> StoreResult<u64>;

    async fn count_duplicate_travel(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
    ) -> StoreResult<u64>;

    async fn travel_requests_for_employee(
        &mut self,
        employee: EmployeeId,
    ) -> StoreResult<Vec<TravelRequest>>;

    async fn pending_travel_for_supervisor(
        &mut self,
        supervisor: EmployeeId,
    ) -> StoreResult<Vec<TravelRequest>>;

    // ---- attendance ----
    async fn open_session(&mut self, employee: EmployeeId) -> StoreResult<Option<Attendance>>;

    /// Sessions whose clock-in falls in `[from, to)`, oldest first.
    async fn sessions_between(
        &mut self,
        employee: EmployeeId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Attendance>>;

    async fn insert_attendance(&mut self, new: &NewAttendance) -> StoreResult<Attendance>;

    async fn close_session(&mut self, id: AttendanceId, at: NaiveDateTime) -> StoreResult<()>;

    // ---- reset tokens ----
    async fn count_tokens_since(&mut self, email: &str, since: NaiveDateTime) -> StoreResult<u64>;

    /// Marks every unused token of `email` as used. Returns how many changed.
    async fn invalidate_tokens_for_email(
        &mut self,
        email: &str,
        at: NaiveDateTime,
    ) -> StoreResult<u64>;

    async fn insert_reset_token(&mut self, new: &NewResetToken) -> StoreResult<PasswordResetToken>;

    async fn reset_token(
        &mut self,
        token: &str,
        lock: Lock,
    ) -> StoreResult<Option<PasswordResetToken>>;

    async fn mark_token_used(&mut self, id: u64, at: NaiveDateTime) -> StoreResult<()>;

    /// Deletes tokens with `expiry_date <= now`.
    async fn delete_expired_tokens(&mut self, now: NaiveDateTime) -> StoreResult<u64>;

    // ---- password history ----
    /// Newest first.
    async fn recent_password_history(
        &mut self,
        employee: EmployeeId,
        limit: u32,
    ) -> StoreResult<Vec<PasswordHistory>>;

    async fn append_password_history(
        &mut self,
        employee: EmployeeId,
        hash: &str,
        at: NaiveDateTime,
    ) -> StoreResult<PasswordHistory>;

    /// Keeps the newest `keep` rows for `employee`.
    async fn prune_password_history(&mut self, employee: EmployeeId, keep: u32)
    -> StoreResult<u64>;

    async fn commit(self) -> StoreResult<()>
    where
        Self: Sized;
}

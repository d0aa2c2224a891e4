//! MySQL-backed [`Store`] on a sqlx pool.
//!
//! Exclusive reads are `SELECT ... FOR UPDATE` inside the InnoDB transaction;
//! count and history checks are shared locking reads. Dropping a [`MySqlTx`]
//! rolls back through sqlx.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::{MySqlDatabaseError, MySqlPool};
use sqlx::{FromRow, MySql};

use super::{Lock, Store, StoreResult, Transaction};
use crate::error::StoreError;
use crate::model::DateRange;
use crate::model::attendance::{Attendance, AttendanceId, AttendanceType, NewAttendance};
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

const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;
const ER_DUP_ENTRY: u16 = 1062;

fn map_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => StoreError::Transient(err.to_string()),
        sqlx::Error::Database(db) => {
            let number = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number());
            match number {
                Some(ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK) => {
                    StoreError::Transient(db.message().to_string())
                }
                Some(ER_DUP_ENTRY) => StoreError::UniqueViolation(db.message().to_string()),
                _ if db.code().as_deref() == Some("23000") => {
                    StoreError::UniqueViolation(db.message().to_string())
                }
                _ => StoreError::Backend(db.message().to_string()),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn lock_clause(lock: Lock) -> &'static str {
    if lock.is_exclusive() { " FOR UPDATE" } else { "" }
}

/// Suffix for reads the engine re-checks under a held row lock. A locking
/// read sees the latest committed rows, not the REPEATABLE READ snapshot
/// fixed by the transaction's first plain SELECT.
const CURRENT_READ: &str = " LOCK IN SHARE MODE";

fn overlap_count_sql(table: &str, exclude: bool) -> String {
    let exclude_clause = if exclude { " AND id <> ?" } else { "" };
    format!(
        "SELECT COUNT(*) FROM {table} \
         WHERE employee_id = ? AND status = ? AND start_date <= ? AND end_date >= ?\
         {exclude_clause}{CURRENT_READ}"
    )
}

fn duplicate_count_sql(table: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM {table} \
         WHERE employee_id = ? AND start_date = ? AND end_date = ? \
         AND status IN ('PENDING', 'APPROVED'){CURRENT_READ}"
    )
}

fn tokens_since_sql() -> String {
    format!(
        "SELECT COUNT(*) FROM password_reset_tokens WHERE email = ? AND created_at >= ?{CURRENT_READ}"
    )
}

fn password_history_sql() -> String {
    format!(
        "SELECT id, employee_id, hashed_password, created_at FROM password_history \
         WHERE employee_id = ? ORDER BY created_at DESC, id DESC LIMIT ?{CURRENT_READ}"
    )
}

fn parse<T: FromStr>(column: &str, value: &str) -> StoreResult<T> {
    T::from_str(value).map_err(|_| StoreError::Corrupt(format!("{column} = {value:?}")))
}

#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for MySqlStore {
    type Tx = MySqlTx;

    async fn begin(&self) -> StoreResult<MySqlTx> {
        let tx = self.pool.begin().await.map_err(map_err)?;
        Ok(MySqlTx { tx })
    }
}

pub struct MySqlTx {
    tx: sqlx::Transaction<'static, MySql>,
}

/* =========================
Row mapping
========================= */

const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, password_hash, \
     supervisor_id, status, annual_leave_balance, sick_leave_balance, created_at, updated_at";

#[derive(FromRow)]
struct EmployeeRow {
    id: u64,
    employee_code: String,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    supervisor_id: Option<u64>,
    status: String,
    annual_leave_balance: i32,
    sick_leave_balance: i32,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = StoreError;

    fn try_from(row: EmployeeRow) -> StoreResult<Self> {
        Ok(Employee {
            id: row.id,
            employee_code: row.employee_code,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            supervisor_id: row.supervisor_id,
            status: parse("employees.status", &row.status)?,
            annual_leave_balance: row.annual_leave_balance,
            sick_leave_balance: row.sick_leave_balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const LEAVE_TYPE_COLUMNS: &str = "id, code, name, quota_kind, is_paid, min_duration_days, \
     max_duration_days, requires_document, is_active";

#[derive(FromRow)]
struct LeaveTypeRow {
    id: u64,
    code: String,
    name: String,
    quota_kind: Option<String>,
    is_paid: bool,
    min_duration_days: Option<i32>,
    max_duration_days: Option<i32>,
    requires_document: bool,
    is_active: bool,
}

impl TryFrom<LeaveTypeRow> for LeaveType {
    type Error = StoreError;

    fn try_from(row: LeaveTypeRow) -> StoreResult<Self> {
        let quota_kind = row
            .quota_kind
            .as_deref()
            .map(|k| parse("leave_types.quota_kind", k))
            .transpose()?;
        Ok(LeaveType {
            id: row.id,
            code: row.code,
            name: row.name,
            quota_kind,
            is_paid: row.is_paid,
            min_duration_days: row.min_duration_days,
            max_duration_days: row.max_duration_days,
            requires_document: row.requires_document,
            is_active: row.is_active,
        })
    }
}

const BALANCE_COLUMNS: &str = "employee_id, kind, period_year, quota, used, updated_at";

#[derive(FromRow)]
struct BalanceRow {
    employee_id: u64,
    kind: String,
    period_year: i32,
    quota: i32,
    used: i32,
    updated_at: NaiveDateTime,
}

impl TryFrom<BalanceRow> for LeaveBalance {
    type Error = StoreError;

    fn try_from(row: BalanceRow) -> StoreResult<Self> {
        Ok(LeaveBalance {
            employee_id: row.employee_id,
            kind: parse("leave_balances.kind", &row.kind)?,
            period_year: row.period_year,
            quota: row.quota,
            used: row.used,
            updated_at: row.updated_at,
        })
    }
}

const LEAVE_REQUEST_COLUMNS: &str = "lr.id, lr.employee_id, lr.leave_type_id, lr.start_date, \
     lr.end_date, lr.total_days, lr.reason, lr.status, lr.rejection_reason, lr.created_by, \
     lr.updated_by, lr.created_at, lr.updated_at";

#[derive(FromRow)]
struct LeaveRequestRow {
    id: u64,
    employee_id: u64,
    leave_type_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: i32,
    reason: Option<String>,
    status: String,
    rejection_reason: Option<String>,
    created_by: u64,
    updated_by: Option<u64>,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRequestRow) -> StoreResult<Self> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type_id: row.leave_type_id,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            reason: row.reason,
            status: parse("leave_requests.status", &row.status)?,
            rejection_reason: row.rejection_reason,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TRAVEL_COLUMNS: &str = "tr.id, tr.employee_id, tr.destination, tr.reason, tr.start_date, \
     tr.end_date, tr.total_days, tr.status, tr.rejection_reason, tr.created_by, tr.updated_by, \
     tr.created_at, tr.updated_at";

#[derive(FromRow)]
struct TravelRow {
    id: u64,
    employee_id: u64,
    destination: String,
    reason: Option<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: i32,
    status: String,
    rejection_reason: Option<String>,
    created_by: u64,
    updated_by: Option<u64>,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

impl TryFrom<TravelRow> for TravelRequest {
    type Error = StoreError;

    fn try_from(row: TravelRow) -> StoreResult<Self> {
        Ok(TravelRequest {
            id: row.id,
            employee_id: row.employee_id,
            destination: row.destination,
            reason: row.reason,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            status: parse("business_travel_requests.status", &row.status)?,
            rejection_reason: row.rejection_reason,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ATTENDANCE_COLUMNS: &str = "id, employee_id, clock_in_time, clock_out_time, latitude, \
     longitude, location_address, is_within_geofence, attendance_type, notes, created_at";

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    employee_id: u64,
    clock_in_time: NaiveDateTime,
    clock_out_time: Option<NaiveDateTime>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_address: Option<String>,
    is_within_geofence: bool,
    attendance_type: String,
    notes: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<AttendanceRow> for Attendance {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> StoreResult<Self> {
        Ok(Attendance {
            id: row.id,
            employee_id: row.employee_id,
            clock_in_time: row.clock_in_time,
            clock_out_time: row.clock_out_time,
            latitude: row.latitude,
            longitude: row.longitude,
            location_address: row.location_address,
            is_within_geofence: row.is_within_geofence,
            attendance_type: parse::<AttendanceType>("attendances.attendance_type", &row.attendance_type)?,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

const TOKEN_COLUMNS: &str = "id, token, email, expiry_date, used, created_at, used_at";

#[derive(FromRow)]
struct TokenRow {
    id: u64,
    token: String,
    email: String,
    expiry_date: NaiveDateTime,
    used: bool,
    created_at: NaiveDateTime,
    used_at: Option<NaiveDateTime>,
}

impl From<TokenRow> for PasswordResetToken {
    fn from(row: TokenRow) -> Self {
        PasswordResetToken {
            id: row.id,
            token: row.token,
            email: row.email,
            expiry_date: row.expiry_date,
            used: row.used,
            created_at: row.created_at,
            used_at: row.used_at,
        }
    }
}

#[derive(FromRow)]
struct HistoryRow {
    id: u64,
    employee_id: u64,
    hashed_password: String,
    created_at: NaiveDateTime,
}

impl From<HistoryRow> for PasswordHistory {
    fn from(row: HistoryRow) -> Self {
        PasswordHistory {
            id: row.id,
            employee_id: row.employee_id,
            hashed_password: row.hashed_password,
            created_at: row.created_at,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

impl MySqlTx {
    async fn count(&mut self, sql: &str, binds: CountBinds<'_>) -> StoreResult<u64> {
        let query = sqlx::query_scalar::<_, i64>(sql)
            .bind(binds.employee)
            .bind(binds.status)
            .bind(binds.range.end())
            .bind(binds.range.start());
        let query = match binds.exclude {
            Some(id) => query.bind(id),
            None => query,
        };
        let n = query.fetch_one(&mut *self.tx).await.map_err(map_err)?;
        Ok(n.max(0) as u64)
    }
}

struct CountBinds<'a> {
    employee: EmployeeId,
    status: &'a str,
    range: DateRange,
    exclude: Option<u64>,
}

/* =========================
Transaction
========================= */

#[async_trait]
impl Transaction for MySqlTx {
    async fn employee(&mut self, id: EmployeeId, lock: Lock) -> StoreResult<Option<Employee>> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?{}",
            lock_clause(lock)
        );
        sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?
            .map(Employee::try_from)
            .transpose()
    }

    async fn employee_by_email(
        &mut self,
        email: &str,
        lock: Lock,
    ) -> StoreResult<Option<Employee>> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE email = ?{}",
            lock_clause(lock)
        );
        sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?
            .map(Employee::try_from)
            .transpose()
    }

    async fn insert_employee(
        &mut self,
        new: &NewEmployee,
        at: NaiveDateTime,
    ) -> StoreResult<Employee> {
        let result = sqlx::query(
            r#"
            INSERT INTO employees
                (employee_code, first_name, last_name, email, password_hash,
                 supervisor_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.employee_code)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.supervisor_id)
        .bind(new.status.to_string())
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(Employee {
            id: result.last_insert_id(),
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
        })
    }

    async fn set_employee_status(
        &mut self,
        id: EmployeeId,
        status: EmploymentStatus,
        at: NaiveDateTime,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE employees SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(at)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn set_leave_counter(
        &mut self,
        id: EmployeeId,
        kind: QuotaKind,
        remaining: i32,
    ) -> StoreResult<()> {
        let sql = match kind {
            QuotaKind::Annual => "UPDATE employees SET annual_leave_balance = ? WHERE id = ?",
            QuotaKind::Sick => "UPDATE employees SET sick_leave_balance = ? WHERE id = ?",
        };
        sqlx::query(sql)
            .bind(remaining)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn set_password_hash(
        &mut self,
        id: EmployeeId,
        hash: &str,
        at: NaiveDateTime,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE employees SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(at)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn subordinates(&mut self, supervisor: EmployeeId) -> StoreResult<Vec<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE supervisor_id = ? ORDER BY id");
        let rows = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(supervisor)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        convert_all(rows)
    }

    async fn leave_type(&mut self, id: LeaveTypeId) -> StoreResult<Option<LeaveType>> {
        let sql = format!("SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types WHERE id = ?");
        sqlx::query_as::<_, LeaveTypeRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?
            .map(LeaveType::try_from)
            .transpose()
    }

    async fn leave_types(&mut self, active_only: bool) -> StoreResult<Vec<LeaveType>> {
        let filter = if active_only { " WHERE is_active = TRUE" } else { "" };
        let sql = format!("SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types{filter} ORDER BY id");
        let rows = sqlx::query_as::<_, LeaveTypeRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        convert_all(rows)
    }

    async fn insert_leave_type(&mut self, new: &NewLeaveType) -> StoreResult<LeaveType> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_types
                (code, name, quota_kind, is_paid, min_duration_days, max_duration_days,
                 requires_document, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(&new.code)
        .bind(&new.name)
        .bind(new.quota_kind.map(|k| k.to_string()))
        .bind(new.is_paid)
        .bind(new.min_duration_days)
        .bind(new.max_duration_days)
        .bind(new.requires_document)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(LeaveType {
            id: result.last_insert_id(),
            code: new.code.clone(),
            name: new.name.clone(),
            quota_kind: new.quota_kind,
            is_paid: new.is_paid,
            min_duration_days: new.min_duration_days,
            max_duration_days: new.max_duration_days,
            requires_document: new.requires_document,
            is_active: true,
        })
    }

    async fn balance(
        &mut self,
        employee: EmployeeId,
        kind: QuotaKind,
        lock: Lock,
    ) -> StoreResult<Option<LeaveBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances WHERE employee_id = ? AND kind = ?{}",
            lock_clause(lock)
        );
        sqlx::query_as::<_, BalanceRow>(&sql)
            .bind(employee)
            .bind(kind.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?
            .map(LeaveBalance::try_from)
            .transpose()
    }

    async fn balances(&mut self, employee: EmployeeId) -> StoreResult<Vec<LeaveBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances WHERE employee_id = ? ORDER BY kind"
        );
        let rows = sqlx::query_as::<_, BalanceRow>(&sql)
            .bind(employee)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        convert_all(rows)
    }

    async fn save_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO leave_balances (employee_id, kind, period_year, quota, used, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                period_year = VALUES(period_year),
                quota = VALUES(quota),
                used = VALUES(used),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(balance.employee_id)
        .bind(balance.kind.to_string())
        .bind(balance.period_year)
        .bind(balance.quota)
        .bind(balance.used)
        .bind(balance.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn insert_leave_request(&mut self, new: &NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_id, leave_type_id, start_date, end_date, total_days, reason,
                 status, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.leave_type_id)
        .bind(new.range.start())
        .bind(new.range.end())
        .bind(new.range.days())
        .bind(&new.reason)
        .bind(LeaveStatus::Pending.to_string())
        .bind(new.employee_id)
        .bind(new.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(LeaveRequest {
            id: result.last_insert_id(),
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
        })
    }

    async fn leave_request(
        &mut self,
        id: LeaveRequestId,
        lock: Lock,
    ) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!(
            "SELECT {LEAVE_REQUEST_COLUMNS} FROM leave_requests lr WHERE lr.id = ?{}",
            lock_clause(lock)
        );
        sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    async fn update_leave_status(
        &mut self,
        id: LeaveRequestId,
        change: &StatusChange<LeaveStatus>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, updated_by = ?, updated_at = ?,
                rejection_reason = COALESCE(?, rejection_reason)
            WHERE id = ?
            "#,
        )
        .bind(change.status.to_string())
        .bind(change.actor)
        .bind(change.at)
        .bind(&change.reason)
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn count_overlapping_leave(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
        status: LeaveStatus,
        exclude: Option<LeaveRequestId>,
    ) -> StoreResult<u64> {
        let sql = overlap_count_sql("leave_requests", exclude.is_some());
        let status = status.to_string();
        self.count(
            &sql,
            CountBinds {
                employee,
                status: &status,
                range,
                exclude,
            },
        )
        .await
    }

    async fn count_duplicate_leave(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
    ) -> StoreResult<u64> {
        let sql = duplicate_count_sql("leave_requests");
        let n = sqlx::query_scalar::<_, i64>(&sql)
            .bind(employee)
            .bind(range.start())
            .bind(range.end())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(n.max(0) as u64)
    }

    async fn leave_requests_for_employee(
        &mut self,
        employee: EmployeeId,
    ) -> StoreResult<Vec<LeaveRequest>> {
        let sql = format!(
            "SELECT {LEAVE_REQUEST_COLUMNS} FROM leave_requests lr \
             WHERE lr.employee_id = ? ORDER BY lr.created_at DESC, lr.id DESC"
        );
        let rows = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(employee)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        convert_all(rows)
    }

    async fn pending_leave_for_supervisor(
        &mut self,
        supervisor: EmployeeId,
    ) -> StoreResult<Vec<LeaveRequest>> {
        let sql = format!(
            "SELECT {LEAVE_REQUEST_COLUMNS} FROM leave_requests lr \
             JOIN employees e ON e.id = lr.employee_id \
             WHERE e.supervisor_id = ? AND lr.status = 'PENDING' ORDER BY lr.id"
        );
        let rows = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(supervisor)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        convert_all(rows)
    }

    async fn approved_leave_on(
        &mut self,
        employee: EmployeeId,
        day: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!(
            "SELECT {LEAVE_REQUEST_COLUMNS} FROM leave_requests lr \
             WHERE lr.employee_id = ? AND lr.status = 'APPROVED' \
               AND lr.start_date <= ? AND lr.end_date >= ? \
             ORDER BY lr.id LIMIT 1"
        );
        sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(employee)
            .bind(day)
            .bind(day)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    async fn insert_travel_request(
        &mut self,
        new: &NewTravelRequest,
    ) -> StoreResult<TravelRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO business_travel_requests
                (employee_id, destination, reason, start_date, end_date, total_days,
                 status, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(&new.destination)
        .bind(&new.reason)
        .bind(new.range.start())
        .bind(new.range.end())
        .bind(new.range.days())
        .bind(TravelStatus::Pending.to_string())
        .bind(new.employee_id)
        .bind(new.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(TravelRequest {
            id: result.last_insert_id(),
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
        })
    }

    async fn travel_request(
        &mut self,
        id: TravelRequestId,
        lock: Lock,
    ) -> StoreResult<Option<TravelRequest>> {
        let sql = format!(
            "SELECT {TRAVEL_COLUMNS} FROM business_travel_requests tr WHERE tr.id = ?{}",
            lock_clause(lock)
        );
        sqlx::query_as::<_, TravelRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?
            .map(TravelRequest::try_from)
            .transpose()
    }

    async fn update_travel_status(
        &mut self,
        id: TravelRequestId,
        change: &StatusChange<TravelStatus>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE business_travel_requests
            SET status = ?, updated_by = ?, updated_at = ?,
                rejection_reason = COALESCE(?, rejection_reason)
            WHERE id = ?
            "#,
        )
        .bind(change.status.to_string())
        .bind(change.actor)
        .bind(change.at)
        .bind(&change.reason)
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn count_overlapping_travel(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
        status: TravelStatus,
        exclude: Option<TravelRequestId>,
    ) -> StoreResult<u64> {
        let sql = overlap_count_sql("business_travel_requests", exclude.is_some());
        let status = status.to_string();
        self.count(
            &sql,
            CountBinds {
                employee,
                status: &status,
                range,
                exclude,
            },
        )
        .await
    }

    async fn count_duplicate_travel(
        &mut self,
        employee: EmployeeId,
        range: DateRange,
    ) -> StoreResult<u64> {
        let sql = duplicate_count_sql("business_travel_requests");
        let n = sqlx::query_scalar::<_, i64>(&sql)
            .bind(employee)
            .bind(range.start())
            .bind(range.end())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(n.max(0) as u64)
    }

    async fn travel_requests_for_employee(
        &mut self,
        employee: EmployeeId,
    ) -> StoreResult<Vec<TravelRequest>> {
        let sql = format!(
            "SELECT {TRAVEL_COLUMNS} FROM business_travel_requests tr \
             WHERE tr.employee_id = ? ORDER BY tr.created_at DESC, tr.id DESC"
        );
        let rows = sqlx::query_as::<_, TravelRow>(&sql)
            .bind(employee)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        convert_all(rows)
    }

    async fn pending_travel_for_supervisor(
        &mut self,
        supervisor: EmployeeId,
    ) -> StoreResult<Vec<TravelRequest>> {
        let sql = format!(
            "SELECT {TRAVEL_COLUMNS} FROM business_travel_requests tr \
             JOIN employees e ON e.id = tr.employee_id \
             WHERE e.supervisor_id = ? AND tr.status = 'PENDING' ORDER BY tr.id"
        );
        let rows = sqlx::query_as::<_, TravelRow>(&sql)
            .bind(supervisor)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        convert_all(rows)
    }

    async fn open_session(&mut self, employee: EmployeeId) -> StoreResult<Option<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances \
             WHERE employee_id = ? AND clock_out_time IS NULL \
             ORDER BY clock_in_time DESC LIMIT 1 FOR UPDATE"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?
            .map(Attendance::try_from)
            .transpose()
    }

    async fn sessions_between(
        &mut self,
        employee: EmployeeId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances \
             WHERE employee_id = ? AND clock_in_time >= ? AND clock_in_time < ? \
             ORDER BY clock_in_time, id"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        convert_all(rows)
    }

    async fn insert_attendance(&mut self, new: &NewAttendance) -> StoreResult<Attendance> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendances
                (employee_id, clock_in_time, latitude, longitude, location_address,
                 is_within_geofence, attendance_type, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.clock_in_time)
        .bind(new.location.map(|p| p.latitude))
        .bind(new.location.map(|p| p.longitude))
        .bind(&new.location_address)
        .bind(new.is_within_geofence)
        .bind(new.attendance_type.to_string())
        .bind(&new.notes)
        .bind(new.clock_in_time)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(Attendance {
            id: result.last_insert_id(),
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
        })
    }

    async fn close_session(&mut self, id: AttendanceId, at: NaiveDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE attendances SET clock_out_time = ? WHERE id = ? AND clock_out_time IS NULL")
            .bind(at)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn count_tokens_since(&mut self, email: &str, since: NaiveDateTime) -> StoreResult<u64> {
        let sql = tokens_since_sql();
        let n = sqlx::query_scalar::<_, i64>(&sql)
            .bind(email)
            .bind(since)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(n.max(0) as u64)
    }

    async fn invalidate_tokens_for_email(
        &mut self,
        email: &str,
        at: NaiveDateTime,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used = TRUE, used_at = ? WHERE email = ? AND used = FALSE",
        )
        .bind(at)
        .bind(email)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn insert_reset_token(&mut self, new: &NewResetToken) -> StoreResult<PasswordResetToken> {
        let result = sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (token, email, expiry_date, used, created_at, used_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.token)
        .bind(&new.email)
        .bind(new.expiry_date)
        .bind(new.used)
        .bind(new.created_at)
        .bind(new.used.then_some(new.created_at))
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(PasswordResetToken {
            id: result.last_insert_id(),
            token: new.token.clone(),
            email: new.email.clone(),
            expiry_date: new.expiry_date,
            used: new.used,
            created_at: new.created_at,
            used_at: new.used.then_some(new.created_at),
        })
    }

    async fn reset_token(
        &mut self,
        token: &str,
        lock: Lock,
    ) -> StoreResult<Option<PasswordResetToken>> {
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM password_reset_tokens WHERE token = ?{}",
            lock_clause(lock)
        );
        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(row.map(PasswordResetToken::from))
    }

    async fn mark_token_used(&mut self, id: u64, at: NaiveDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE password_reset_tokens SET used = TRUE, used_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete_expired_tokens(&mut self, now: NaiveDateTime) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expiry_date <= ?")
            .bind(now)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn recent_password_history(
        &mut self,
        employee: EmployeeId,
        limit: u32,
    ) -> StoreResult<Vec<PasswordHistory>> {
        let sql = password_history_sql();
        let rows = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(employee)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(rows.into_iter().map(PasswordHistory::from).collect())
    }

    async fn append_password_history(
        &mut self,
        employee: EmployeeId,
        hash: &str,
        at: NaiveDateTime,
    ) -> StoreResult<PasswordHistory> {
        let result = sqlx::query(
            "INSERT INTO password_history (employee_id, hashed_password, created_at) VALUES (?, ?, ?)",
        )
        .bind(employee)
        .bind(hash)
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(PasswordHistory {
            id: result.last_insert_id(),
            employee_id: employee,
            hashed_password: hash.to_string(),
            created_at: at,
        })
    }

    async fn prune_password_history(
        &mut self,
        employee: EmployeeId,
        keep: u32,
    ) -> StoreResult<u64> {
        // MySQL rejects LIMIT directly inside IN (...), hence the derived table.
        let result = sqlx::query(
            r#"
            DELETE FROM password_history
            WHERE employee_id = ?
              AND id NOT IN (
                SELECT id FROM (
                    SELECT id FROM password_history
                    WHERE employee_id = ?
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?
                ) AS recent
              )
            "#,
        )
        .bind(employee)
        .bind(employee)
        .bind(keep)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_err)
    }
}

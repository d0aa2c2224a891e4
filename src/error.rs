//! Error types for the engine.
//!
//! [`HrError`] names every business failure an operation can surface;
//! [`HrError::kind`] folds them into the coarse categories callers act on
//! (reject input, report a conflict, retry later, ...).

use thiserror::Error;

/// Failures raised by a [`crate::store::Store`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Lock wait timeout, deadlock or pool exhaustion. The whole operation
    /// may be retried from the start.
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A row could not be mapped back into a model (unknown enum value, ...).
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Coarse error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    ResourceExhausted,
    NotFound,
    Forbidden,
    Transient,
    Internal,
}

#[derive(Debug, Error)]
pub enum HrError {
    // ---- validation ----
    #[error("end date {end} is before start date {start}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("{days} day(s) is outside the allowed duration for {leave_type} ({min:?}..={max:?})")]
    DurationOutOfBounds {
        leave_type: String,
        days: i32,
        min: Option<i32>,
        max: Option<i32>,
    },

    #[error("day count must be positive, got {0}")]
    InvalidDays(i32),

    #[error("leave type {0} is not active")]
    LeaveTypeInactive(String),

    #[error("clock-out time is before the clock-in time")]
    ClockOutBeforeClockIn,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ---- conflicts ----
    #[error("an attendance session is already open since {since}")]
    AlreadyOpen { since: chrono::NaiveDateTime },

    #[error("attendance for this day is already closed")]
    AlreadyClosed,

    #[error("no open attendance session")]
    NoOpenSession,

    #[error("request is {status}, expected PENDING")]
    NotPending { status: String },

    #[error("request is {status}, expected APPROVED")]
    NotApproved { status: String },

    #[error("request is {status} and cannot be cancelled")]
    NotCancellable { status: String },

    #[error("an approved request already covers part of this period")]
    OverlappingRequest,

    #[error("a request for the same period already exists")]
    DuplicateRequest,

    #[error("employee {0} is not active")]
    EmployeeInactive(u64),

    #[error("reset token has already been used")]
    TokenAlreadyUsed,

    #[error("password was used recently, choose a different one")]
    PasswordReused,

    // ---- resource exhausted ----
    #[error("insufficient balance: requested {requested} day(s), remaining {remaining}")]
    InsufficientBalance { requested: i32, remaining: i32 },

    #[error("too many reset requests, try again later")]
    TooManyRequests,

    // ---- not found ----
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("reset token not found")]
    TokenNotFound,

    #[error("reset token has expired")]
    TokenExpired,

    // ---- forbidden ----
    #[error("employee {approver} is not the supervisor of employee {employee}")]
    NotSupervisor { approver: u64, employee: u64 },

    // ---- internal ----
    #[error("{0} does not fit the calendar")]
    TimeOutOfRange(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HrError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        HrError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HrError::InvalidRange { .. }
            | HrError::DurationOutOfBounds { .. }
            | HrError::InvalidDays(_)
            | HrError::LeaveTypeInactive(_)
            | HrError::ClockOutBeforeClockIn
            | HrError::InvalidInput(_) => ErrorKind::Validation,

            HrError::AlreadyOpen { .. }
            | HrError::AlreadyClosed
            | HrError::NoOpenSession
            | HrError::NotPending { .. }
            | HrError::NotApproved { .. }
            | HrError::NotCancellable { .. }
            | HrError::OverlappingRequest
            | HrError::DuplicateRequest
            | HrError::EmployeeInactive(_)
            | HrError::TokenAlreadyUsed
            | HrError::PasswordReused => ErrorKind::Conflict,

            HrError::InsufficientBalance { .. } | HrError::TooManyRequests => {
                ErrorKind::ResourceExhausted
            }

            // An expired token behaves like a missing one for the caller.
            HrError::NotFound { .. } | HrError::TokenNotFound | HrError::TokenExpired => {
                ErrorKind::NotFound
            }

            HrError::NotSupervisor { .. } => ErrorKind::Forbidden,

            HrError::Store(StoreError::Transient(_)) => ErrorKind::Transient,
            HrError::Store(StoreError::UniqueViolation(_)) => ErrorKind::Conflict,
            HrError::TimeOutOfRange(_) | HrError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-running the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

pub type HrResult<T> = Result<T, HrError>;

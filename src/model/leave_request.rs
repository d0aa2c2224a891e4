use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::DateRange;
use super::employee::EmployeeId;
use super::leave_type::LeaveTypeId;

pub type LeaveRequestId = u64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub employee_id: EmployeeId,
    pub leave_type_id: LeaveTypeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub rejection_reason: Option<String>,
    pub created_by: EmployeeId,
    pub updated_by: Option<EmployeeId>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl LeaveRequest {
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub employee_id: EmployeeId,
    pub leave_type_id: LeaveTypeId,
    pub range: DateRange,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Status change written by an approver or the requester.
#[derive(Debug, Clone)]
pub struct StatusChange<S> {
    pub status: S,
    pub actor: EmployeeId,
    pub reason: Option<String>,
    pub at: NaiveDateTime,
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::leave_type::QuotaKind;

pub type EmployeeId = u64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentStatus {
    Active,
    OnLeave,
    Terminated,
    Probation,
}

impl EmploymentStatus {
    /// Terminated employees keep their records but take no new actions.
    pub fn is_active(&self) -> bool {
        !matches!(self, EmploymentStatus::Terminated)
    }
}

/// Aggregate root for balances and attendance.
///
/// `annual_leave_balance` and `sick_leave_balance` are denormalized copies of
/// the remaining quota in [`super::leave_balance::LeaveBalance`]; only the
/// ledger writes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: EmployeeId,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub supervisor_id: Option<EmployeeId>,
    pub status: EmploymentStatus,
    pub annual_leave_balance: i32,
    pub sick_leave_balance: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl Employee {
    pub fn leave_counter(&self, kind: QuotaKind) -> i32 {
        match kind {
            QuotaKind::Annual => self.annual_leave_balance,
            QuotaKind::Sick => self.sick_leave_balance,
        }
    }

    pub fn is_supervised_by(&self, supervisor: EmployeeId) -> bool {
        self.supervisor_id == Some(supervisor)
    }
}

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub supervisor_id: Option<EmployeeId>,
    pub status: EmploymentStatus,
}

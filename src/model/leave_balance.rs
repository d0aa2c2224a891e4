use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use super::employee::EmployeeId;
use super::leave_type::QuotaKind;
use crate::error::HrError;

/// Per-employee, per-kind quota counters.
///
/// `remaining = quota - used`. `used` never drops below zero; it grows only
/// through [`LeaveBalance::apply_debit`] and shrinks through
/// [`LeaveBalance::apply_credit`]. `quota` changes only on period rollover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaveBalance {
    pub employee_id: EmployeeId,
    pub kind: QuotaKind,
    pub period_year: i32,
    pub quota: i32,
    pub used: i32,
    pub updated_at: NaiveDateTime,
}

impl LeaveBalance {
    pub fn open(
        employee_id: EmployeeId,
        kind: QuotaKind,
        period_year: i32,
        quota: i32,
        at: NaiveDateTime,
    ) -> Self {
        Self {
            employee_id,
            kind,
            period_year,
            quota,
            used: 0,
            updated_at: at,
        }
    }

    /// May be negative if an earlier policy allowed an over-draw.
    pub fn remaining(&self) -> i32 {
        self.quota - self.used
    }

    pub fn has_sufficient(&self, days: i32) -> bool {
        self.remaining() >= days
    }

    pub fn apply_debit(&mut self, days: i32, at: NaiveDateTime) -> Result<(), HrError> {
        if days <= 0 {
            return Err(HrError::InvalidDays(days));
        }
        if !self.has_sufficient(days) {
            return Err(HrError::InsufficientBalance {
                requested: days,
                remaining: self.remaining(),
            });
        }
        self.used += days;
        self.updated_at = at;
        Ok(())
    }

    /// Clamped at zero: crediting more than was used is not an error.
    pub fn apply_credit(&mut self, days: i32, at: NaiveDateTime) -> Result<(), HrError> {
        if days <= 0 {
            return Err(HrError::InvalidDays(days));
        }
        self.used = (self.used - days).max(0);
        self.updated_at = at;
        Ok(())
    }

    /// Returns `false` when the balance already belongs to `year`.
    pub fn roll_over(&mut self, year: i32, quota: i32, at: NaiveDateTime) -> bool {
        if self.period_year == year {
            return false;
        }
        self.period_year = year;
        self.quota = quota;
        self.used = 0;
        self.updated_at = at;
        true
    }
}

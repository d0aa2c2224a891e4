use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::HrError;

pub type LeaveTypeId = u64;

/// Which quota a leave type draws from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotaKind {
    Annual,
    Sick,
}

/// Catalog entry. Treated as immutable while a request refers to it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveType {
    pub id: LeaveTypeId,
    pub code: String,
    pub name: String,
    /// `None` when the type does not draw from any balance.
    pub quota_kind: Option<QuotaKind>,
    pub is_paid: bool,
    pub min_duration_days: Option<i32>,
    pub max_duration_days: Option<i32>,
    pub requires_document: bool,
    pub is_active: bool,
}

impl LeaveType {
    pub fn has_balance_quota(&self) -> bool {
        self.quota_kind.is_some()
    }

    pub fn check_duration(&self, days: i32) -> Result<(), HrError> {
        let too_short = self.min_duration_days.is_some_and(|min| days < min);
        let too_long = self.max_duration_days.is_some_and(|max| days > max);
        if too_short || too_long {
            return Err(HrError::DurationOutOfBounds {
                leave_type: self.code.clone(),
                days,
                min: self.min_duration_days,
                max: self.max_duration_days,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveType {
    pub code: String,
    pub name: String,
    pub quota_kind: Option<QuotaKind>,
    pub is_paid: bool,
    pub min_duration_days: Option<i32>,
    pub max_duration_days: Option<i32>,
    pub requires_document: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maternity() -> LeaveType {
        LeaveType {
            id: 3,
            code: "MATERNITY_LEAVE".into(),
            name: "Maternity".into(),
            quota_kind: None,
            is_paid: true,
            min_duration_days: Some(30),
            max_duration_days: Some(90),
            requires_document: true,
            is_active: true,
        }
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        let lt = maternity();
        assert!(lt.check_duration(30).is_ok());
        assert!(lt.check_duration(90).is_ok());
        assert!(matches!(
            lt.check_duration(29),
            Err(HrError::DurationOutOfBounds { days: 29, .. })
        ));
        assert!(lt.check_duration(91).is_err());
    }

    #[test]
    fn unbounded_type_accepts_any_length() {
        let lt = LeaveType {
            min_duration_days: None,
            max_duration_days: None,
            ..maternity()
        };
        assert!(lt.check_duration(1).is_ok());
        assert!(lt.check_duration(365).is_ok());
        assert!(!lt.has_balance_quota());
    }
}

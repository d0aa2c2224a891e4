use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::DateRange;
use super::employee::EmployeeId;

pub type TravelRequestId = u64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TravelRequest {
    pub id: TravelRequestId,
    pub employee_id: EmployeeId,
    pub destination: String,
    pub reason: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub status: TravelStatus,
    pub rejection_reason: Option<String>,
    pub created_by: EmployeeId,
    pub updated_by: Option<EmployeeId>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewTravelRequest {
    pub employee_id: EmployeeId,
    pub destination: String,
    pub reason: Option<String>,
    pub range: DateRange,
    pub created_at: NaiveDateTime,
}

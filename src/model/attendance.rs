use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::employee::EmployeeId;

pub type AttendanceId = u64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceType {
    Regular,
    Overtime,
    Holiday,
    Weekend,
}

/// Per employee-day session state: `None -> Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    None,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One clock session. At most one row per employee has no clock-out.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Attendance {
    pub id: AttendanceId,
    pub employee_id: EmployeeId,
    pub clock_in_time: NaiveDateTime,
    pub clock_out_time: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_address: Option<String>,
    pub is_within_geofence: bool,
    pub attendance_type: AttendanceType,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Attendance {
    pub fn is_open(&self) -> bool {
        self.clock_out_time.is_none()
    }

    pub fn state(&self) -> SessionState {
        if self.is_open() {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }
}

/// Caller-supplied clock-in details.
#[derive(Debug, Clone, Default)]
pub struct ClockIn {
    pub location: Option<GeoPoint>,
    pub location_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub employee_id: EmployeeId,
    pub clock_in_time: NaiveDateTime,
    pub location: Option<GeoPoint>,
    pub location_address: Option<String>,
    pub is_within_geofence: bool,
    pub attendance_type: AttendanceType,
    pub notes: Option<String>,
}

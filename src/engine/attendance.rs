//! Attendance tracker: one session per employee per day,
//! `NONE -> OPEN -> CLOSED`.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use tracing::{info, instrument, warn};

use super::Hr;
use crate::clock::day_bounds;
use crate::error::{HrError, HrResult};
use crate::model::attendance::{Attendance, AttendanceType, ClockIn, NewAttendance, SessionState};
use crate::model::employee::EmployeeId;
use crate::store::{Store, Transaction};

/// Classifies a clock-in instant.
pub trait AttendanceCalendar: Send + Sync {
    fn classify(&self, at: NaiveDateTime) -> AttendanceType;
}

/// Saturday and Sunday are `WEEKEND`, listed dates are `HOLIDAY`.
#[derive(Debug, Clone, Default)]
pub struct WeekendCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekendCalendar {
    pub fn with_holidays<I: IntoIterator<Item = NaiveDate>>(holidays: I) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }
}

impl AttendanceCalendar for WeekendCalendar {
    fn classify(&self, at: NaiveDateTime) -> AttendanceType {
        let day = at.date();
        if self.holidays.contains(&day) {
            AttendanceType::Holiday
        } else if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            AttendanceType::Weekend
        } else {
            AttendanceType::Regular
        }
    }
}

pub struct AttendanceTracker<'a, S: Store> {
    hr: &'a Hr<S>,
}

impl<'a, S: Store> AttendanceTracker<'a, S> {
    pub(super) fn new(hr: &'a Hr<S>) -> Self {
        Self { hr }
    }

    /// Opens today's session. The geofence result is recorded, never enforced.
    #[instrument(skip(self, details), err)]
    pub async fn clock_in(
        &self,
        employee: EmployeeId,
        details: ClockIn,
        at: NaiveDateTime,
    ) -> HrResult<Attendance> {
        self.hr
            .gateway()
            .retry("attendance.clock_in", || self.clock_in_once(employee, &details, at))
            .await
    }

    async fn clock_in_once(
        &self,
        employee: EmployeeId,
        details: &ClockIn,
        at: NaiveDateTime,
    ) -> HrResult<Attendance> {
        let mut scope = self.hr.gateway().begin("attendance.clock_in").await?;
        let profile = scope.lock_employee(employee).await?;
        if !profile.status.is_active() {
            return Err(HrError::EmployeeInactive(employee));
        }

        if let Some(open) = scope.tx().open_session(employee).await? {
            return Err(HrError::AlreadyOpen {
                since: open.clock_in_time,
            });
        }
        let (day_start, day_end) = day_bounds(at);
        let today = scope.tx().sessions_between(employee, day_start, day_end).await?;
        if !today.is_empty() {
            return Err(HrError::AlreadyClosed);
        }

        let is_within_geofence = details
            .location
            .as_ref()
            .is_some_and(|point| self.hr.geofence().is_within(point));
        if !is_within_geofence {
            warn!(employee, "Clock-in recorded outside the geofence");
        }

        let session = scope
            .tx()
            .insert_attendance(&NewAttendance {
                employee_id: employee,
                clock_in_time: at,
                location: details.location,
                location_address: details.location_address.clone(),
                is_within_geofence,
                attendance_type: self.hr.calendar().classify(at),
                notes: details.notes.clone(),
            })
            .await?;
        scope.commit().await?;

        info!(
            employee,
            attendance_id = session.id,
            attendance_type = %session.attendance_type,
            "Clocked in"
        );
        Ok(session)
    }

    #[instrument(skip(self), err)]
    pub async fn clock_out(&self, employee: EmployeeId, at: NaiveDateTime) -> HrResult<Attendance> {
        self.hr
            .gateway()
            .retry("attendance.clock_out", || self.clock_out_once(employee, at))
            .await
    }

    async fn clock_out_once(&self, employee: EmployeeId, at: NaiveDateTime) -> HrResult<Attendance> {
        let mut scope = self.hr.gateway().begin("attendance.clock_out").await?;
        scope.lock_employee(employee).await?;

        let mut session = scope
            .tx()
            .open_session(employee)
            .await?
            .ok_or(HrError::NoOpenSession)?;
        if at < session.clock_in_time {
            return Err(HrError::ClockOutBeforeClockIn);
        }

        scope.tx().close_session(session.id, at).await?;
        scope.commit().await?;

        session.clock_out_time = Some(at);
        info!(employee, attendance_id = session.id, "Clocked out");
        Ok(session)
    }

    /// Session started on the current day, if any.
    pub async fn todays_session(&self, employee: EmployeeId) -> HrResult<Option<Attendance>> {
        let (from, to) = day_bounds(self.hr.now());
        let sessions = self.history_between(employee, from, to).await?;
        Ok(sessions.into_iter().last())
    }

    /// Same as [`Self::todays_session`] but inside `scope`, with the employee
    /// row locked so the answer stays valid until the scope ends.
    pub async fn todays_session_for_update<T: Transaction>(
        &self,
        scope: &mut super::TxScope<T>,
        employee: EmployeeId,
    ) -> HrResult<Option<Attendance>> {
        scope.lock_employee(employee).await?;
        let (from, to) = day_bounds(self.hr.now());
        let sessions = scope.tx().sessions_between(employee, from, to).await?;
        Ok(sessions.into_iter().last())
    }

    pub async fn session_state(&self, employee: EmployeeId, day: NaiveDate) -> HrResult<SessionState> {
        let (from, to) = day_bounds(day.and_time(chrono::NaiveTime::MIN));
        let sessions = self.history_between(employee, from, to).await?;
        Ok(sessions
            .last()
            .map(Attendance::state)
            .unwrap_or(SessionState::None))
    }

    /// Sessions that started on any day in `from..=to`.
    pub async fn history(
        &self,
        employee: EmployeeId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> HrResult<Vec<Attendance>> {
        if to < from {
            return Err(HrError::InvalidRange { start: from, end: to });
        }
        let start = from.and_time(chrono::NaiveTime::MIN);
        let (_, end) = day_bounds(to.and_time(chrono::NaiveTime::MIN));
        self.history_between(employee, start, end).await
    }

    async fn history_between(
        &self,
        employee: EmployeeId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> HrResult<Vec<Attendance>> {
        self.hr
            .gateway()
            .retry("attendance.history", || async {
                let mut scope = self.hr.gateway().begin("attendance.history").await?;
                let sessions = scope.tx().sessions_between(employee, from, to).await?;
                Ok(sessions)
            })
            .await
    }
}

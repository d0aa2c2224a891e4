mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{at, date, fixture, new_employee, test_config};
use futures::future::join_all;
use hr_ledger::clock::ManualClock;
use hr_ledger::engine::{LockKey, WeekendCalendar};
use hr_ledger::model::attendance::{AttendanceType, ClockIn, GeoPoint, SessionState};
use hr_ledger::model::employee::EmploymentStatus;
use hr_ledger::store::MemoryStore;
use hr_ledger::{Hr, HrError};

fn at_office() -> ClockIn {
    ClockIn {
        location: Some(GeoPoint {
            latitude: -6.2088,
            longitude: 106.8456,
        }),
        location_address: Some("Head office".to_string()),
        notes: None,
    }
}

#[tokio::test]
async fn second_clock_in_while_open_fails() {
    let f = fixture().await;
    let tracker = f.hr.attendance();
    let first = tracker
        .clock_in(f.employee.id, at_office(), at("2024-03-04 09:00"))
        .await
        .unwrap();
    assert!(first.is_within_geofence);
    assert_eq!(first.attendance_type, AttendanceType::Regular);

    let err = tracker
        .clock_in(f.employee.id, at_office(), at("2024-03-04 09:05"))
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::AlreadyOpen { since } if since == at("2024-03-04 09:00")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clock_ins_open_exactly_one_session() {
    let f = fixture().await;
    let tracker = f.hr.attendance();
    let attempts = (0..8).map(|i| {
        tracker.clock_in(
            f.employee.id,
            ClockIn::default(),
            at("2024-03-04 09:00") + Duration::seconds(i),
        )
    });

    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, HrError::AlreadyOpen { .. }))
    );
    let sessions = tracker
        .history(f.employee.id, date("2024-03-04"), date("2024-03-04"))
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn day_ends_closed_after_clock_out() {
    let f = fixture().await;
    let tracker = f.hr.attendance();
    let day = date("2024-03-04");
    assert_eq!(tracker.session_state(f.employee.id, day).await.unwrap(), SessionState::None);

    tracker
        .clock_in(f.employee.id, at_office(), at("2024-03-04 09:00"))
        .await
        .unwrap();
    assert_eq!(tracker.session_state(f.employee.id, day).await.unwrap(), SessionState::Open);

    let closed = tracker
        .clock_out(f.employee.id, at("2024-03-04 17:30"))
        .await
        .unwrap();
    assert_eq!(closed.clock_out_time, Some(at("2024-03-04 17:30")));
    assert_eq!(tracker.session_state(f.employee.id, day).await.unwrap(), SessionState::Closed);

    let again = tracker
        .clock_in(f.employee.id, at_office(), at("2024-03-04 18:00"))
        .await;
    assert!(matches!(again, Err(HrError::AlreadyClosed)));

    // A new day starts from NONE again.
    let next = tracker
        .clock_in(f.employee.id, at_office(), at("2024-03-05 08:55"))
        .await;
    assert!(next.is_ok());
}

#[tokio::test]
async fn clock_out_requires_an_open_session_in_the_past() {
    let f = fixture().await;
    let tracker = f.hr.attendance();
    assert!(matches!(
        tracker.clock_out(f.employee.id, at("2024-03-04 17:00")).await,
        Err(HrError::NoOpenSession)
    ));

    tracker
        .clock_in(f.employee.id, at_office(), at("2024-03-04 09:00"))
        .await
        .unwrap();
    assert!(matches!(
        tracker.clock_out(f.employee.id, at("2024-03-04 08:00")).await,
        Err(HrError::ClockOutBeforeClockIn)
    ));
    assert_eq!(
        tracker
            .session_state(f.employee.id, date("2024-03-04"))
            .await
            .unwrap(),
        SessionState::Open
    );
}

#[tokio::test]
async fn geofence_and_calendar_are_recorded_not_enforced() {
    let f = fixture().await;
    let tracker = f.hr.attendance();

    let far_away = ClockIn {
        location: Some(GeoPoint {
            latitude: -6.9175,
            longitude: 107.6191,
        }),
        ..ClockIn::default()
    };
    // 2024-03-09 is a Saturday.
    let session = tracker
        .clock_in(f.employee.id, far_away, at("2024-03-09 10:00"))
        .await
        .unwrap();
    assert!(!session.is_within_geofence);
    assert_eq!(session.attendance_type, AttendanceType::Weekend);

    let other = f
        .hr
        .directory()
        .create_employee(new_employee("EMP3", None))
        .await
        .unwrap();
    let without_location = tracker
        .clock_in(other.id, ClockIn::default(), at("2024-03-04 09:00"))
        .await
        .unwrap();
    assert!(!without_location.is_within_geofence);
}

#[tokio::test]
async fn terminated_employee_cannot_clock_in() {
    let f = fixture().await;
    f.hr.directory()
        .set_status(f.employee.id, EmploymentStatus::Terminated)
        .await
        .unwrap();
    let err = f
        .hr
        .attendance()
        .clock_in(f.employee.id, at_office(), at("2024-03-04 09:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::EmployeeInactive(_)));
}

#[tokio::test]
async fn todays_session_follows_the_clock() {
    let f = fixture().await;
    let tracker = f.hr.attendance();
    tracker
        .clock_in(f.employee.id, at_office(), at("2024-03-04 09:00"))
        .await
        .unwrap();
    assert!(tracker.todays_session(f.employee.id).await.unwrap().is_some());

    f.clock.advance(Duration::days(1));
    assert!(tracker.todays_session(f.employee.id).await.unwrap().is_none());
}

#[tokio::test]
async fn locking_read_holds_the_employee_row() {
    let f = fixture().await;
    let tracker = f.hr.attendance();
    tracker
        .clock_in(f.employee.id, at_office(), at("2024-03-04 09:00"))
        .await
        .unwrap();

    let mut scope = f.hr.gateway().begin("test.today").await.unwrap();
    let session = tracker
        .todays_session_for_update(&mut scope, f.employee.id)
        .await
        .unwrap();
    assert!(session.is_some_and(|s| s.is_open()));
    assert_eq!(scope.held(), &[LockKey::Employee(f.employee.id)]);
    drop(scope);

    // The scope was rolled back, the session is untouched.
    assert!(tracker.clock_out(f.employee.id, at("2024-03-04 17:00")).await.is_ok());
}

#[tokio::test]
async fn injected_calendar_marks_holidays() {
    let store = MemoryStore::new();
    let holiday = date("2024-03-11");
    let hr = Hr::builder(store)
        .config(test_config())
        .clock(Arc::new(ManualClock::new(at("2024-03-11 09:00"))))
        .calendar(Arc::new(WeekendCalendar::with_holidays([holiday])))
        .build();
    let employee = hr
        .directory()
        .create_employee(new_employee("EMP9", None))
        .await
        .unwrap();

    let session = hr
        .attendance()
        .clock_in(employee.id, at_office(), at("2024-03-11 09:00"))
        .await
        .unwrap();
    assert_eq!(session.attendance_type, AttendanceType::Holiday);
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use hr_ledger::Hr;
use hr_ledger::clock::ManualClock;
use hr_ledger::config::EngineConfig;
use hr_ledger::model::employee::{Employee, EmploymentStatus, NewEmployee};
use hr_ledger::model::leave_type::{LeaveType, NewLeaveType, QuotaKind};
use hr_ledger::store::MemoryStore;

pub struct Fixture {
    pub hr: Hr<MemoryStore>,
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub supervisor: Employee,
    pub employee: Employee,
    pub annual: LeaveType,
    pub unpaid: LeaveType,
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        tx_retry_backoff: Duration::from_millis(1),
        ..EngineConfig::default()
    }
}

pub fn new_employee(code: &str, supervisor: Option<u64>) -> NewEmployee {
    NewEmployee {
        employee_code: code.to_string(),
        first_name: "Test".to_string(),
        last_name: code.to_string(),
        email: format!("{}@example.com", code.to_lowercase()),
        password_hash: "initial-hash".to_string(),
        supervisor_id: supervisor,
        status: EmploymentStatus::Active,
    }
}

pub async fn fixture() -> Fixture {
    fixture_with(test_config()).await
}

/// Monday 2024-03-04 09:00, one supervisor and one report with an annual
/// quota of 12 days for 2024.
pub async fn fixture_with(config: EngineConfig) -> Fixture {
    let store = MemoryStore::new();
    let clock = Arc::new(ManualClock::new(at("2024-03-04 09:00")));
    let hr = Hr::builder(store.clone())
        .config(config)
        .clock(clock.clone())
        .build();

    let directory = hr.directory();
    let supervisor = directory
        .create_employee(new_employee("SUP1", None))
        .await
        .unwrap();
    let employee = directory
        .create_employee(new_employee("EMP1", Some(supervisor.id)))
        .await
        .unwrap();
    let annual = directory
        .create_leave_type(NewLeaveType {
            code: "ANNUAL".to_string(),
            name: "Annual leave".to_string(),
            quota_kind: Some(QuotaKind::Annual),
            is_paid: true,
            min_duration_days: None,
            max_duration_days: Some(10),
            requires_document: false,
        })
        .await
        .unwrap();
    let unpaid = directory
        .create_leave_type(NewLeaveType {
            code: "UNPAID".to_string(),
            name: "Unpaid leave".to_string(),
            quota_kind: None,
            is_paid: false,
            min_duration_days: None,
            max_duration_days: None,
            requires_document: false,
        })
        .await
        .unwrap();
    hr.ledger()
        .reset_for_new_period(employee.id, QuotaKind::Annual, 2024, 12)
        .await
        .unwrap();

    Fixture {
        hr,
        store,
        clock,
        supervisor,
        employee,
        annual,
        unpaid,
    }
}

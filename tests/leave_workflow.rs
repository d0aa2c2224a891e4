mod common;

use common::{date, fixture, fixture_with, new_employee, test_config};
use futures::future::join_all;
use hr_ledger::HrError;
use hr_ledger::model::employee::EmploymentStatus;
use hr_ledger::model::leave_request::LeaveStatus;
use hr_ledger::model::leave_type::{NewLeaveType, QuotaKind};

#[tokio::test]
async fn approve_debits_and_cancel_restores() {
    let f = fixture().await;
    let leave = f.hr.leave();

    let request = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-13"), None)
        .await
        .unwrap();
    assert_eq!(request.status, LeaveStatus::Pending);
    assert_eq!(request.total_days, 3);

    let approved = leave.approve(request.id, f.supervisor.id).await.unwrap();
    assert_eq!(approved.status, LeaveStatus::Approved);
    assert_eq!(approved.updated_by, Some(f.supervisor.id));

    let ledger = f.hr.ledger();
    assert_eq!(ledger.remaining_balance(f.employee.id, QuotaKind::Annual).await.unwrap(), 9);
    let profile = f.hr.directory().employee(f.employee.id).await.unwrap();
    assert_eq!(profile.annual_leave_balance, 9);

    let cancelled = leave.cancel(request.id, f.employee.id).await.unwrap();
    assert_eq!(cancelled.status, LeaveStatus::Cancelled);
    let balance = ledger.balance(f.employee.id, QuotaKind::Annual).await.unwrap();
    assert_eq!(balance.used, 0);
    assert_eq!(balance.remaining(), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_of_overlapping_requests_approve_one() {
    let f = fixture().await;
    let leave = f.hr.leave();
    let a = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-13"), None)
        .await
        .unwrap();
    let b = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-12"), date("2024-03-14"), None)
        .await
        .unwrap();

    let results = join_all([a.id, b.id].map(|id| leave.approve(id, f.supervisor.id))).await;

    let approved = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(approved, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(HrError::OverlappingRequest)))
    );
    assert_eq!(
        f.hr.ledger().remaining_balance(f.employee.id, QuotaKind::Annual).await.unwrap(),
        9
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_never_overdraw_the_balance() {
    let f = fixture().await;
    f.hr.ledger()
        .reset_for_new_period(f.employee.id, QuotaKind::Annual, 2025, 5)
        .await
        .unwrap();
    let leave = f.hr.leave();
    let a = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-13"), None)
        .await
        .unwrap();
    let b = leave
        .submit(f.employee.id, f.annual.id, date("2024-04-01"), date("2024-04-03"), None)
        .await
        .unwrap();

    let results = join_all([a.id, b.id].map(|id| leave.approve(id, f.supervisor.id))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(HrError::InsufficientBalance { requested: 3, remaining: 2 })
    )));
    assert_eq!(
        f.hr.ledger().remaining_balance(f.employee.id, QuotaKind::Annual).await.unwrap(),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn double_approval_of_one_request_debits_once() {
    let f = fixture().await;
    let leave = f.hr.leave();
    let request = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-13"), None)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        leave.approve(request.id, f.supervisor.id),
        leave.approve(request.id, f.supervisor.id)
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(r, Err(HrError::NotPending { .. }))));
    assert_eq!(
        f.hr.ledger().remaining_balance(f.employee.id, QuotaKind::Annual).await.unwrap(),
        9
    );
}

#[tokio::test]
async fn reversed_range_is_rejected_without_writing() {
    let f = fixture().await;
    let err = f
        .hr
        .leave()
        .submit(f.employee.id, f.annual.id, date("2024-03-13"), date("2024-03-11"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::InvalidRange { .. }));
    assert!(f.hr.leave().for_employee(f.employee.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn submit_rejects_overlap_with_approved_leave_and_duplicates() {
    let f = fixture().await;
    let leave = f.hr.leave();
    let first = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-13"), None)
        .await
        .unwrap();

    let duplicate = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-13"), None)
        .await;
    assert!(matches!(duplicate, Err(HrError::DuplicateRequest)));

    leave.approve(first.id, f.supervisor.id).await.unwrap();
    let overlapping = leave
        .submit(f.employee.id, f.unpaid.id, date("2024-03-13"), date("2024-03-15"), None)
        .await;
    assert!(matches!(overlapping, Err(HrError::OverlappingRequest)));

    // Touching ranges share a day and therefore overlap; the day after does not.
    let adjacent = leave
        .submit(f.employee.id, f.unpaid.id, date("2024-03-14"), date("2024-03-15"), None)
        .await;
    assert!(adjacent.is_ok());
}

#[tokio::test]
async fn submit_checks_quota_and_duration_early() {
    let f = fixture().await;
    let leave = f.hr.leave();

    let too_long = leave
        .submit(f.employee.id, f.annual.id, date("2024-04-01"), date("2024-04-11"), None)
        .await;
    assert!(matches!(
        too_long,
        Err(HrError::DurationOutOfBounds { days: 11, max: Some(10), .. })
    ));

    f.hr.ledger()
        .debit(f.employee.id, QuotaKind::Annual, 10)
        .await
        .unwrap();
    let short_of_balance = leave
        .submit(f.employee.id, f.annual.id, date("2024-04-01"), date("2024-04-03"), None)
        .await;
    assert!(matches!(
        short_of_balance,
        Err(HrError::InsufficientBalance { requested: 3, remaining: 2 })
    ));
}

#[tokio::test]
async fn leave_without_quota_needs_no_balance_row() {
    let f = fixture().await;
    let leave = f.hr.leave();
    let request = leave
        .submit(f.employee.id, f.unpaid.id, date("2024-05-01"), date("2024-05-20"), None)
        .await
        .unwrap();
    leave.approve(request.id, f.supervisor.id).await.unwrap();
    assert_eq!(
        f.hr.ledger().remaining_balance(f.employee.id, QuotaKind::Annual).await.unwrap(),
        12
    );
}

#[tokio::test]
async fn inactive_leave_type_and_terminated_employee_are_refused() {
    let f = fixture().await;
    let directory = f.hr.directory();
    let leaver = directory
        .create_employee(new_employee("EMP2", Some(f.supervisor.id)))
        .await
        .unwrap();
    directory
        .set_status(leaver.id, EmploymentStatus::Terminated)
        .await
        .unwrap();

    let err = f
        .hr
        .leave()
        .submit(leaver.id, f.unpaid.id, date("2024-05-01"), date("2024-05-02"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::EmployeeInactive(id) if id == leaver.id));

    let missing = f
        .hr
        .leave()
        .submit(f.employee.id, 9_999, date("2024-05-01"), date("2024-05-02"), None)
        .await;
    assert!(matches!(missing, Err(HrError::NotFound { entity: "leave type", .. })));
}

#[tokio::test]
async fn reject_and_cancel_follow_the_state_machine() {
    let f = fixture().await;
    let leave = f.hr.leave();
    let request = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-12"), None)
        .await
        .unwrap();

    let rejected = leave
        .reject(request.id, f.supervisor.id, Some("Team offsite".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, LeaveStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Team offsite"));

    assert!(matches!(
        leave.approve(request.id, f.supervisor.id).await,
        Err(HrError::NotPending { .. })
    ));
    assert!(matches!(
        leave.cancel(request.id, f.employee.id).await,
        Err(HrError::NotCancellable { .. })
    ));
    assert_eq!(
        f.hr.ledger().remaining_balance(f.employee.id, QuotaKind::Annual).await.unwrap(),
        12
    );

    let stored = leave.get(request.id).await.unwrap();
    assert_eq!(stored.status, LeaveStatus::Rejected);
    assert_eq!(stored.rejection_reason.as_deref(), Some("Team offsite"));
}

#[tokio::test]
async fn pending_cancel_does_not_touch_the_balance() {
    let f = fixture().await;
    let leave = f.hr.leave();
    let request = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-12"), None)
        .await
        .unwrap();
    leave.cancel(request.id, f.employee.id).await.unwrap();
    assert!(matches!(
        leave.cancel(request.id, f.employee.id).await,
        Err(HrError::NotCancellable { .. })
    ));
    let balance = f.hr.ledger().balance(f.employee.id, QuotaKind::Annual).await.unwrap();
    assert_eq!(balance.used, 0);
}

#[tokio::test]
async fn supervisor_reads_and_checks() {
    let f = fixture().await;
    let leave = f.hr.leave();
    let request = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-12"), None)
        .await
        .unwrap();

    let pending = leave.pending_for_supervisor(f.supervisor.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, request.id);

    let supervisor = leave.supervisor_of(f.employee.id).await.unwrap().unwrap();
    assert_eq!(supervisor.id, f.supervisor.id);
    assert!(leave.ensure_supervisor(request.id, f.supervisor.id).await.is_ok());
    assert!(matches!(
        leave.ensure_supervisor(request.id, f.employee.id).await,
        Err(HrError::NotSupervisor { .. })
    ));

    leave.approve(request.id, f.supervisor.id).await.unwrap();
    let current = leave
        .current_leave(f.employee.id, date("2024-03-12"))
        .await
        .unwrap();
    assert_eq!(current.map(|r| r.id), Some(request.id));
    assert!(
        leave
            .current_leave(f.employee.id, date("2024-03-13"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn transient_begin_failures_are_retried() {
    let f = fixture().await;
    let leave = f.hr.leave();
    let request = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-13"), None)
        .await
        .unwrap();

    f.store.fail_next_begins(2);
    let approved = leave.approve(request.id, f.supervisor.id).await.unwrap();
    assert_eq!(approved.status, LeaveStatus::Approved);
    assert_eq!(
        f.hr.ledger().remaining_balance(f.employee.id, QuotaKind::Annual).await.unwrap(),
        9
    );
}

#[tokio::test]
async fn failed_commit_leaves_no_partial_state() {
    let f = fixture_with(test_config()).await;
    let leave = f.hr.leave();
    let request = leave
        .submit(f.employee.id, f.annual.id, date("2024-03-11"), date("2024-03-13"), None)
        .await
        .unwrap();

    // Every attempt fails at commit.
    f.store.fail_next_commits(test_config().tx_max_attempts);
    let err = leave.approve(request.id, f.supervisor.id).await.unwrap_err();
    assert!(err.is_transient());

    assert_eq!(leave.get(request.id).await.unwrap().status, LeaveStatus::Pending);
    assert_eq!(
        f.hr.ledger().remaining_balance(f.employee.id, QuotaKind::Annual).await.unwrap(),
        12
    );
    let profile = f.hr.directory().employee(f.employee.id).await.unwrap();
    assert_eq!(profile.annual_leave_balance, 12);
}

#[tokio::test]
async fn bounded_leave_type_rejects_short_requests() {
    let f = fixture().await;
    let sick = f
        .hr
        .directory()
        .create_leave_type(NewLeaveType {
            code: "SICK".to_string(),
            name: "Sick leave".to_string(),
            quota_kind: Some(QuotaKind::Sick),
            is_paid: true,
            min_duration_days: Some(2),
            max_duration_days: None,
            requires_document: true,
        })
        .await
        .unwrap();
    let err = f
        .hr
        .leave()
        .submit(f.employee.id, sick.id, date("2024-03-11"), date("2024-03-11"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::DurationOutOfBounds { days: 1, min: Some(2), .. }));
}

mod common;

use common::{date, fixture};
use hr_ledger::HrError;
use hr_ledger::model::travel_request::TravelStatus;

#[tokio::test]
async fn approved_trip_can_be_completed_once() {
    let f = fixture().await;
    let travel = f.hr.travel();
    let request = travel
        .submit(
            f.employee.id,
            "  Surabaya ".to_string(),
            Some("Client visit".to_string()),
            date("2024-04-08"),
            date("2024-04-10"),
        )
        .await
        .unwrap();
    assert_eq!(request.destination, "Surabaya");
    assert_eq!(request.total_days, 3);
    assert_eq!(request.status, TravelStatus::Pending);

    let pending = travel.pending_for_supervisor(f.supervisor.id).await.unwrap();
    assert_eq!(pending.len(), 1);

    travel.approve(request.id, f.supervisor.id).await.unwrap();
    let done = travel.complete(request.id, f.employee.id).await.unwrap();
    assert_eq!(done.status, TravelStatus::Completed);

    assert!(matches!(
        travel.complete(request.id, f.employee.id).await,
        Err(HrError::NotApproved { .. })
    ));
    assert_eq!(
        travel.get(request.id).await.unwrap().status,
        TravelStatus::Completed
    );
}

#[tokio::test]
async fn trip_cannot_overlap_approved_leave() {
    let f = fixture().await;
    let leave = f
        .hr
        .leave()
        .submit(
            f.employee.id,
            f.annual.id,
            date("2024-04-08"),
            date("2024-04-09"),
            None,
        )
        .await
        .unwrap();
    f.hr.leave().approve(leave.id, f.supervisor.id).await.unwrap();

    let err = f
        .hr
        .travel()
        .submit(
            f.employee.id,
            "Medan".to_string(),
            None,
            date("2024-04-09"),
            date("2024-04-12"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::OverlappingRequest));
}

#[tokio::test]
async fn only_one_overlapping_trip_is_approved() {
    let f = fixture().await;
    let travel = f.hr.travel();
    let first = travel
        .submit(f.employee.id, "Bali".to_string(), None, date("2024-05-01"), date("2024-05-03"))
        .await
        .unwrap();
    let second = travel
        .submit(f.employee.id, "Lombok".to_string(), None, date("2024-05-03"), date("2024-05-04"))
        .await
        .unwrap();

    travel.approve(first.id, f.supervisor.id).await.unwrap();
    assert!(matches!(
        travel.approve(second.id, f.supervisor.id).await,
        Err(HrError::OverlappingRequest)
    ));
    assert_eq!(travel.get(second.id).await.unwrap().status, TravelStatus::Pending);
}

#[tokio::test]
async fn status_machine_rejects_illegal_moves() {
    let f = fixture().await;
    let travel = f.hr.travel();
    let request = travel
        .submit(f.employee.id, "Makassar".to_string(), None, date("2024-06-03"), date("2024-06-05"))
        .await
        .unwrap();
    travel.approve(request.id, f.supervisor.id).await.unwrap();

    assert!(matches!(
        travel
            .reject(request.id, f.supervisor.id, Some("late".to_string()))
            .await,
        Err(HrError::NotPending { .. })
    ));
    let cancelled = travel.cancel(request.id, f.employee.id).await.unwrap();
    assert_eq!(cancelled.status, TravelStatus::Cancelled);
    assert!(matches!(
        travel.cancel(request.id, f.employee.id).await,
        Err(HrError::NotCancellable { .. })
    ));

    let rejected = travel
        .submit(f.employee.id, "Makassar".to_string(), None, date("2024-06-10"), date("2024-06-11"))
        .await
        .unwrap();
    let rejected = travel
        .reject(rejected.id, f.supervisor.id, Some("budget".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, TravelStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("budget"));
}

#[tokio::test]
async fn invalid_submissions_write_nothing() {
    let f = fixture().await;
    let travel = f.hr.travel();
    travel
        .submit(f.employee.id, "Jogja".to_string(), None, date("2024-07-01"), date("2024-07-02"))
        .await
        .unwrap();

    assert!(matches!(
        travel
            .submit(f.employee.id, "Solo".to_string(), None, date("2024-07-01"), date("2024-07-02"))
            .await,
        Err(HrError::DuplicateRequest)
    ));
    assert!(matches!(
        travel
            .submit(f.employee.id, "Solo".to_string(), None, date("2024-07-05"), date("2024-07-04"))
            .await,
        Err(HrError::InvalidRange { .. })
    ));
    assert!(matches!(
        travel
            .submit(f.employee.id, "   ".to_string(), None, date("2024-07-05"), date("2024-07-06"))
            .await,
        Err(HrError::InvalidInput(_))
    ));
    assert_eq!(travel.for_employee(f.employee.id).await.unwrap().len(), 1);
}

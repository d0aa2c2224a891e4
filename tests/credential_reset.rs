mod common;

use chrono::Duration;
use common::{fixture, fixture_with, test_config};
use futures::future::join_all;
use hr_ledger::HrError;
use hr_ledger::config::EngineConfig;
use hr_ledger::model::credential::PrehashedPassword;
use hr_ledger::store::{Store, Transaction};

fn password(hash: &str) -> PrehashedPassword {
    PrehashedPassword(hash.to_string())
}

#[tokio::test]
async fn unknown_email_issues_nothing() {
    let f = fixture().await;
    let issued = f.hr.credentials().issue_token("nobody@example.com").await.unwrap();
    assert!(issued.is_none());

    let blank = f.hr.credentials().issue_token("   ").await;
    assert!(matches!(blank, Err(HrError::InvalidInput(_))));
}

#[tokio::test]
async fn token_is_single_use() {
    let f = fixture().await;
    let credentials = f.hr.credentials();
    let token = credentials
        .issue_token(&f.employee.email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.token.len(), 32);
    assert!(credentials.validate_token(&token.token).await.unwrap());

    let employee = credentials
        .redeem_token(&token.token, &password("h1"))
        .await
        .unwrap();
    assert_eq!(employee.password_hash, "h1");
    assert!(!credentials.validate_token(&token.token).await.unwrap());

    let again = credentials.redeem_token(&token.token, &password("h2")).await;
    assert!(matches!(again, Err(HrError::TokenAlreadyUsed)));

    let stored = f.hr.directory().employee(f.employee.id).await.unwrap();
    assert_eq!(stored.password_hash, "h1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_succeed_once() {
    let f = fixture().await;
    let credentials = f.hr.credentials();
    let token = credentials
        .issue_token(&f.employee.email)
        .await
        .unwrap()
        .unwrap();

    let candidates = [password("a"), password("b"), password("c")];
    let results = join_all(
        candidates
            .iter()
            .map(|p| credentials.redeem_token(&token.token, p)),
    )
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(HrError::TokenAlreadyUsed)))
            .count(),
        2
    );
}

#[tokio::test]
async fn new_token_supersedes_the_previous_one() {
    let f = fixture().await;
    let credentials = f.hr.credentials();
    let first = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();
    let second = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();
    assert_ne!(first.token, second.token);

    assert!(!credentials.validate_token(&first.token).await.unwrap());
    assert!(credentials.validate_token(&second.token).await.unwrap());
    assert!(matches!(
        credentials.redeem_token(&first.token, &password("h1")).await,
        Err(HrError::TokenAlreadyUsed)
    ));
    assert!(credentials.redeem_token(&second.token, &password("h1")).await.is_ok());
}

#[tokio::test]
async fn expired_token_is_refused_even_if_unused() {
    let f = fixture().await;
    let credentials = f.hr.credentials();
    let token = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();

    f.clock.advance(Duration::hours(1));
    let err = credentials
        .redeem_token(&token.token, &password("h1"))
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::TokenExpired));
    assert!(matches!(
        credentials.redeem_token("not-a-token", &password("h1")).await,
        Err(HrError::TokenNotFound)
    ));
}

#[tokio::test]
async fn token_redeemed_then_expired_reports_expiry() {
    let f = fixture().await;
    let credentials = f.hr.credentials();
    let token = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();
    credentials.redeem_token(&token.token, &password("h1")).await.unwrap();

    f.clock.advance(Duration::hours(1));
    assert!(matches!(
        credentials.redeem_token(&token.token, &password("h2")).await,
        Err(HrError::TokenExpired)
    ));
}

#[tokio::test]
async fn issuance_is_rate_limited_per_window() {
    let f = fixture().await;
    let credentials = f.hr.credentials();
    for _ in 0..3 {
        credentials.issue_token(&f.employee.email).await.unwrap();
        f.clock.advance(Duration::minutes(1));
    }
    assert!(matches!(
        credentials.issue_token(&f.employee.email).await,
        Err(HrError::TooManyRequests)
    ));

    // The oldest token leaves the window an hour after it was created.
    f.clock.advance(Duration::minutes(58));
    assert!(credentials.issue_token(&f.employee.email).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_email_hits_the_same_rate_limit() {
    let f = fixture().await;
    let credentials = f.hr.credentials();
    let unknown = "nobody@example.com";
    for _ in 0..3 {
        assert!(credentials.issue_token(&f.employee.email).await.unwrap().is_some());
        assert!(credentials.issue_token(unknown).await.unwrap().is_none());
    }
    for email in [f.employee.email.as_str(), unknown] {
        assert!(matches!(
            credentials.issue_token(email).await,
            Err(HrError::TooManyRequests)
        ));
    }

    // Recorded attempts never validate, and purge clears them with the rest.
    f.clock.advance(Duration::hours(2));
    assert_eq!(credentials.purge_expired(f.hr.now()).await.unwrap(), 6);
    assert!(credentials.issue_token(unknown).await.unwrap().is_none());
}

#[tokio::test]
async fn out_of_calendar_ttl_is_an_error() {
    let config = EngineConfig {
        reset_token_ttl: std::time::Duration::from_secs(u64::MAX),
        ..test_config()
    };
    let f = fixture_with(config).await;
    let err = f
        .hr
        .credentials()
        .issue_token(&f.employee.email)
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::TimeOutOfRange(_)));
}

#[tokio::test]
async fn recent_passwords_cannot_be_reused() {
    let f = fixture().await;
    let credentials = f.hr.credentials();

    let token = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();
    credentials.redeem_token(&token.token, &password("h1")).await.unwrap();

    let token = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();
    let err = credentials
        .redeem_token(&token.token, &password("h1"))
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::PasswordReused));

    // The failed attempt rolled back, so the token is still live.
    assert!(credentials.validate_token(&token.token).await.unwrap());
    assert!(credentials.redeem_token(&token.token, &password("h2")).await.is_ok());
}

#[tokio::test]
async fn history_is_pruned_to_retention() {
    let config = EngineConfig {
        password_history_depth: 2,
        password_history_retention: 2,
        reset_max_per_window: 10,
        ..test_config()
    };
    let f = fixture_with(config).await;
    let credentials = f.hr.credentials();
    for hash in ["h1", "h2", "h3"] {
        let token = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();
        credentials.redeem_token(&token.token, &password(hash)).await.unwrap();
        f.clock.advance(Duration::minutes(1));
    }

    let mut tx = f.store.begin().await.unwrap();
    let kept: Vec<String> = tx
        .recent_password_history(f.employee.id, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.hashed_password)
        .collect();
    assert_eq!(kept, vec!["h3", "h2"]);
    drop(tx);

    // Outside the depth of two, "h1" is allowed again.
    let token = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();
    assert!(credentials.redeem_token(&token.token, &password("h1")).await.is_ok());
}

#[tokio::test]
async fn purge_removes_expired_tokens_idempotently() {
    let f = fixture().await;
    let credentials = f.hr.credentials();
    let token = credentials.issue_token(&f.employee.email).await.unwrap().unwrap();

    assert_eq!(credentials.purge_expired(f.hr.now()).await.unwrap(), 0);

    f.clock.advance(Duration::hours(2));
    let now = f.hr.now();
    assert_eq!(credentials.purge_expired(now).await.unwrap(), 1);
    assert_eq!(credentials.purge_expired(now).await.unwrap(), 0);
    assert!(!credentials.validate_token(&token.token).await.unwrap());
}

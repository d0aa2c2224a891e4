//! Scoped transactions, row locks and the retry loop.
//!
//! Locks are always taken in the same order inside one transaction:
//! employee row, then the request or token row, then the balance row.
//! Attendance sessions and balances are only touched after the owning
//! employee row is locked, so two operations on the same employee never
//! interleave.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{HrError, HrResult};
use crate::model::credential::PasswordResetToken;
use crate::model::employee::{Employee, EmployeeId};
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{LeaveRequest, LeaveRequestId};
use crate::model::leave_type::QuotaKind;
use crate::model::travel_request::{TravelRequest, TravelRequestId};
use crate::store::{Lock, Store, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `backoff * n`, saturating.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.tx_max_attempts.max(1),
            backoff: config.tx_retry_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// A row held exclusively by a [`TxScope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockKey {
    Employee(EmployeeId),
    LeaveRequest(LeaveRequestId),
    TravelRequest(TravelRequestId),
    ResetToken(u64),
    Balance(EmployeeId, QuotaKind),
}

impl LockKey {
    fn rank(&self) -> u8 {
        match self {
            LockKey::Employee(_) => 0,
            LockKey::LeaveRequest(_) | LockKey::TravelRequest(_) | LockKey::ResetToken(_) => 1,
            LockKey::Balance(..) => 2,
        }
    }
}

pub struct Gateway<S: Store> {
    store: S,
    retry: RetryPolicy,
}

impl<S: Store> Gateway<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn begin(&self, op: &'static str) -> HrResult<TxScope<S::Tx>> {
        let tx = self.store.begin().await?;
        Ok(TxScope {
            tx,
            op,
            held: Vec::new(),
        })
    }

    /// Runs a read-only `query` in its own transaction, rolled back on return.
    pub async fn read<T, F>(&self, op: &'static str, query: F) -> HrResult<T>
    where
        F: for<'t> Fn(&'t mut S::Tx) -> BoxFuture<'t, HrResult<T>>,
    {
        self.retry(op, || async {
            let mut scope = self.begin(op).await?;
            let value = query(scope.tx()).await?;
            Ok(value)
        })
        .await
    }

    /// Runs `attempt` until it succeeds, fails with a non-transient error, or
    /// the attempt budget is spent. Each call must start its own transaction.
    pub async fn retry<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> HrResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HrResult<T>>,
    {
        let mut n = 1;
        loop {
            match attempt().await {
                Err(err) if err.is_transient() && n < self.retry.max_attempts => {
                    warn!(op, attempt = n, error = %err, "Transient store failure, retrying");
                    tokio::time::sleep(self.retry.backoff.saturating_mul(n)).await;
                    n += 1;
                }
                Err(err) if err.is_transient() => {
                    warn!(op, attempts = n, error = %err, "Giving up after transient failures");
                    return Err(err);
                }
                other => return other,
            }
        }
    }
}

/// One store transaction plus the rows it has locked.
///
/// Dropping the scope without calling [`TxScope::commit`] rolls back.
pub struct TxScope<T: Transaction> {
    tx: T,
    op: &'static str,
    held: Vec<LockKey>,
}

impl<T: Transaction> TxScope<T> {
    pub fn tx(&mut self) -> &mut T {
        &mut self.tx
    }

    pub fn held(&self) -> &[LockKey] {
        &self.held
    }

    fn record(&mut self, key: LockKey) {
        debug_assert!(
            self.held.iter().all(|k| k.rank() <= key.rank()),
            "{}: lock {:?} taken out of order after {:?}",
            self.op,
            key,
            self.held
        );
        if !self.held.contains(&key) {
            self.held.push(key);
        }
    }

    pub async fn lock_employee(&mut self, id: EmployeeId) -> HrResult<Employee> {
        let employee = self
            .tx
            .employee(id, Lock::ForUpdate)
            .await?
            .ok_or_else(|| HrError::not_found("employee", id))?;
        self.record(LockKey::Employee(id));
        Ok(employee)
    }

    /// `None` when no employee has this email; no lock is recorded then.
    pub async fn lock_employee_by_email(&mut self, email: &str) -> HrResult<Option<Employee>> {
        let employee = self.tx.employee_by_email(email, Lock::ForUpdate).await?;
        if let Some(e) = &employee {
            self.record(LockKey::Employee(e.id));
        }
        Ok(employee)
    }

    pub async fn lock_leave_request(&mut self, id: LeaveRequestId) -> HrResult<LeaveRequest> {
        let request = self
            .tx
            .leave_request(id, Lock::ForUpdate)
            .await?
            .ok_or_else(|| HrError::not_found("leave request", id))?;
        self.record(LockKey::LeaveRequest(id));
        Ok(request)
    }

    pub async fn lock_travel_request(&mut self, id: TravelRequestId) -> HrResult<TravelRequest> {
        let request = self
            .tx
            .travel_request(id, Lock::ForUpdate)
            .await?
            .ok_or_else(|| HrError::not_found("travel request", id))?;
        self.record(LockKey::TravelRequest(id));
        Ok(request)
    }

    pub async fn lock_reset_token(&mut self, token: &str) -> HrResult<PasswordResetToken> {
        let row = self
            .tx
            .reset_token(token, Lock::ForUpdate)
            .await?
            .ok_or(HrError::TokenNotFound)?;
        self.record(LockKey::ResetToken(row.id));
        Ok(row)
    }

    pub async fn lock_balance(
        &mut self,
        employee: EmployeeId,
        kind: QuotaKind,
    ) -> HrResult<LeaveBalance> {
        let balance = self
            .tx
            .balance(employee, kind, Lock::ForUpdate)
            .await?
            .ok_or_else(|| HrError::not_found("leave balance", format!("{employee}/{kind}")))?;
        self.record(LockKey::Balance(employee, kind));
        Ok(balance)
    }

    pub async fn commit(self) -> HrResult<()> {
        debug!(op = self.op, locks = ?self.held, "Committing transaction");
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn gateway(max_attempts: u32) -> Gateway<MemoryStore> {
        Gateway::new(
            MemoryStore::new(),
            RetryPolicy {
                max_attempts,
                backoff: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let gw = gateway(3);
        let calls = AtomicU32::new(0);
        let result = gw
            .retry("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HrError::from(StoreError::Transient("deadlock".into())))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let gw = gateway(2);
        let calls = AtomicU32::new(0);
        let result: HrResult<()> = gw
            .retry("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HrError::from(StoreError::Transient("lock wait".into())))
            })
            .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn business_errors_are_not_retried() {
        let gw = gateway(5);
        let calls = AtomicU32::new(0);
        let result: HrResult<()> = gw
            .retry("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HrError::OverlappingRequest)
            })
            .await;
        assert!(matches!(result, Err(HrError::OverlappingRequest)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_rows_surface_as_not_found() {
        let gw = gateway(1);
        let mut scope = gw.begin("test").await.unwrap();
        assert!(matches!(
            scope.lock_employee(99).await,
            Err(HrError::NotFound { entity: "employee", .. })
        ));
        assert!(matches!(
            scope.lock_reset_token("nope").await,
            Err(HrError::TokenNotFound)
        ));
        assert!(scope.held().is_empty());
    }

    #[test]
    fn lock_ranks_follow_employee_request_balance_order() {
        assert!(LockKey::Employee(1).rank() < LockKey::LeaveRequest(1).rank());
        assert!(LockKey::ResetToken(1).rank() < LockKey::Balance(1, QuotaKind::Annual).rank());
    }
}

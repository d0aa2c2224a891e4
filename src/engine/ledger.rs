//! Quota ledger: the only writer of leave balances and of the employee's
//! denormalized remaining-days counters.

use tracing::{info, instrument};

use super::Hr;
use super::gateway::TxScope;
use crate::error::{HrError, HrResult};
use crate::model::employee::EmployeeId;
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_type::QuotaKind;
use crate::store::{Lock, Store, Transaction};
use chrono::NaiveDateTime;

pub struct QuotaLedger<'a, S: Store> {
    hr: &'a Hr<S>,
}

impl<'a, S: Store> QuotaLedger<'a, S> {
    pub(super) fn new(hr: &'a Hr<S>) -> Self {
        Self { hr }
    }

    #[instrument(skip(self), err)]
    pub async fn debit(
        &self,
        employee: EmployeeId,
        kind: QuotaKind,
        days: i32,
    ) -> HrResult<LeaveBalance> {
        self.hr
            .gateway()
            .retry("ledger.debit", || self.adjust_once(employee, kind, days, Adjust::Debit))
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn credit(
        &self,
        employee: EmployeeId,
        kind: QuotaKind,
        days: i32,
    ) -> HrResult<LeaveBalance> {
        self.hr
            .gateway()
            .retry("ledger.credit", || self.adjust_once(employee, kind, days, Adjust::Credit))
            .await
    }

    async fn adjust_once(
        &self,
        employee: EmployeeId,
        kind: QuotaKind,
        days: i32,
        adjust: Adjust,
    ) -> HrResult<LeaveBalance> {
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("ledger.adjust").await?;
        scope.lock_employee(employee).await?;
        let balance = match adjust {
            Adjust::Debit => debit_in(&mut scope, employee, kind, days, now).await?,
            Adjust::Credit => credit_in(&mut scope, employee, kind, days, now).await?,
        };
        scope.commit().await?;
        Ok(balance)
    }

    pub async fn remaining_balance(&self, employee: EmployeeId, kind: QuotaKind) -> HrResult<i32> {
        Ok(self.balance(employee, kind).await?.remaining())
    }

    pub async fn balance(&self, employee: EmployeeId, kind: QuotaKind) -> HrResult<LeaveBalance> {
        self.hr
            .gateway()
            .retry("ledger.balance", || async {
                let mut scope = self.hr.gateway().begin("ledger.balance").await?;
                let balance = scope.tx().balance(employee, kind, Lock::None).await?;
                balance.ok_or_else(|| HrError::not_found("leave balance", format!("{employee}/{kind}")))
            })
            .await
    }

    pub async fn balances(&self, employee: EmployeeId) -> HrResult<Vec<LeaveBalance>> {
        self.hr
            .gateway()
            .retry("ledger.balances", || async {
                let mut scope = self.hr.gateway().begin("ledger.balances").await?;
                let balances = scope.tx().balances(employee).await?;
                Ok(balances)
            })
            .await
    }

    /// Opens the balance for `year` with a fresh `quota`. Creates the row if
    /// the employee has none; a balance already in `year` is left untouched.
    #[instrument(skip(self), err)]
    pub async fn reset_for_new_period(
        &self,
        employee: EmployeeId,
        kind: QuotaKind,
        year: i32,
        quota: i32,
    ) -> HrResult<LeaveBalance> {
        if quota < 0 {
            return Err(HrError::InvalidInput(format!("quota must not be negative, got {quota}")));
        }
        self.hr
            .gateway()
            .retry("ledger.reset", || self.reset_once(employee, kind, year, quota))
            .await
    }

    async fn reset_once(
        &self,
        employee: EmployeeId,
        kind: QuotaKind,
        year: i32,
        quota: i32,
    ) -> HrResult<LeaveBalance> {
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("ledger.reset").await?;
        scope.lock_employee(employee).await?;

        let existing = scope.tx().balance(employee, kind, Lock::ForUpdate).await?;
        let balance = match existing {
            Some(mut balance) => {
                if !balance.roll_over(year, quota, now) {
                    return Ok(balance);
                }
                balance
            }
            None => LeaveBalance::open(employee, kind, year, quota, now),
        };
        persist(&mut scope, &balance).await?;
        scope.commit().await?;

        info!(employee, %kind, year, quota, "Leave balance opened for period");
        Ok(balance)
    }
}

#[derive(Debug, Clone, Copy)]
enum Adjust {
    Debit,
    Credit,
}

/// Debits inside a caller's transaction. The employee row must already be
/// locked by `scope`.
pub(crate) async fn debit_in<T: Transaction>(
    scope: &mut TxScope<T>,
    employee: EmployeeId,
    kind: QuotaKind,
    days: i32,
    at: NaiveDateTime,
) -> HrResult<LeaveBalance> {
    let mut balance = scope.lock_balance(employee, kind).await?;
    balance.apply_debit(days, at)?;
    persist(scope, &balance).await?;
    info!(employee, %kind, days, remaining = balance.remaining(), "Leave balance debited");
    Ok(balance)
}

pub(crate) async fn credit_in<T: Transaction>(
    scope: &mut TxScope<T>,
    employee: EmployeeId,
    kind: QuotaKind,
    days: i32,
    at: NaiveDateTime,
) -> HrResult<LeaveBalance> {
    let mut balance = scope.lock_balance(employee, kind).await?;
    balance.apply_credit(days, at)?;
    persist(scope, &balance).await?;
    info!(employee, %kind, days, remaining = balance.remaining(), "Leave balance credited");
    Ok(balance)
}

async fn persist<T: Transaction>(scope: &mut TxScope<T>, balance: &LeaveBalance) -> HrResult<()> {
    scope.tx().save_balance(balance).await?;
    scope
        .tx()
        .set_leave_counter(balance.employee_id, balance.kind, balance.remaining())
        .await?;
    Ok(())
}

//! Password reset tokens and password history.
//!
//! At most one live token exists per email. Redeeming a token is
//! single-use under concurrency: the token row is locked, checked and marked
//! used in one transaction.

use chrono::{Duration, NaiveDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::Hr;
use crate::error::{HrError, HrResult};
use crate::model::credential::{NewPassword, NewResetToken, PasswordResetToken};
use crate::model::employee::Employee;
use crate::store::{Lock, Store, Transaction};

pub struct CredentialReset<'a, S: Store> {
    hr: &'a Hr<S>,
}

/// `at` shifted by `by`, or `TimeOutOfRange` naming `what` when the result
/// leaves chrono's calendar.
fn shifted(
    at: NaiveDateTime,
    by: std::time::Duration,
    forward: bool,
    what: &'static str,
) -> HrResult<NaiveDateTime> {
    let by = Duration::from_std(by).map_err(|_| HrError::TimeOutOfRange(what))?;
    let shifted = if forward {
        at.checked_add_signed(by)
    } else {
        at.checked_sub_signed(by)
    };
    shifted.ok_or(HrError::TimeOutOfRange(what))
}

impl<'a, S: Store> CredentialReset<'a, S> {
    pub(super) fn new(hr: &'a Hr<S>) -> Self {
        Self { hr }
    }

    /// Issues a fresh token for `email`, superseding any live one.
    ///
    /// Returns `Ok(None)` when no employee has that email, so callers can
    /// answer the same way whether or not the address is known. The rate
    /// limit applies either way: an unknown address still records its attempt
    /// as a spent token row.
    #[instrument(skip(self), err)]
    pub async fn issue_token(&self, email: &str) -> HrResult<Option<PasswordResetToken>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(HrError::InvalidInput("email must not be empty".into()));
        }
        self.hr
            .gateway()
            .retry("credentials.issue", || self.issue_once(email))
            .await
    }

    async fn issue_once(&self, email: &str) -> HrResult<Option<PasswordResetToken>> {
        let config = self.hr.config();
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("credentials.issue").await?;
        let employee = scope.lock_employee_by_email(email).await?;

        let since = shifted(now, config.reset_window, false, "reset window start")?;
        let expiry_date = shifted(now, config.reset_token_ttl, true, "reset token expiry")?;
        let recent = scope.tx().count_tokens_since(email, since).await?;
        if recent >= u64::from(config.reset_max_per_window) {
            warn!(recent, "Password reset rate limit reached");
            return Err(HrError::TooManyRequests);
        }

        let new = NewResetToken {
            token: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            expiry_date,
            used: employee.is_none(),
            created_at: now,
        };
        let Some(employee) = employee else {
            scope.tx().insert_reset_token(&new).await?;
            scope.commit().await?;
            info!("Password reset requested for unknown email");
            return Ok(None);
        };

        let superseded = scope.tx().invalidate_tokens_for_email(email, now).await?;
        let token = scope.tx().insert_reset_token(&new).await?;
        scope.commit().await?;

        info!(employee = employee.id, superseded, expires = %token.expiry_date, "Password reset token issued");
        Ok(Some(token))
    }

    /// Sets a new password through a live token and consumes it.
    ///
    /// Checks, in order: token exists, not expired, not used, password not
    /// among the recent history.
    #[instrument(skip_all, err)]
    pub async fn redeem_token(&self, token: &str, password: &dyn NewPassword) -> HrResult<Employee> {
        self.hr
            .gateway()
            .retry("credentials.redeem", || self.redeem_once(token, password))
            .await
    }

    async fn redeem_once(&self, token: &str, password: &dyn NewPassword) -> HrResult<Employee> {
        let config = self.hr.config();
        let now = self.hr.now();
        let mut scope = self.hr.gateway().begin("credentials.redeem").await?;

        let email = scope
            .tx()
            .reset_token(token, Lock::None)
            .await?
            .ok_or(HrError::TokenNotFound)?
            .email;
        let mut employee = scope
            .lock_employee_by_email(&email)
            .await?
            .ok_or_else(|| HrError::not_found("employee", &email))?;
        let row = scope.lock_reset_token(token).await?;

        if row.is_expired(now) {
            return Err(HrError::TokenExpired);
        }
        if row.used {
            return Err(HrError::TokenAlreadyUsed);
        }

        let history = scope
            .tx()
            .recent_password_history(employee.id, config.password_history_depth)
            .await?;
        if history.iter().any(|h| password.matches(&h.hashed_password)) {
            return Err(HrError::PasswordReused);
        }

        let hash = password.hash();
        scope.tx().append_password_history(employee.id, hash, now).await?;
        let pruned = scope
            .tx()
            .prune_password_history(employee.id, config.password_history_retention)
            .await?;
        scope.tx().set_password_hash(employee.id, hash, now).await?;
        scope.tx().mark_token_used(row.id, now).await?;
        scope.tx().invalidate_tokens_for_email(&email, now).await?;
        scope.commit().await?;

        employee.password_hash = hash.to_string();
        employee.updated_at = Some(now);
        info!(employee = employee.id, pruned, "Password reset completed");
        Ok(employee)
    }

    /// Whether `token` exists, is unused and has not expired.
    pub async fn validate_token(&self, token: &str) -> HrResult<bool> {
        let now = self.hr.now();
        let token = token.to_string();
        self.hr
            .gateway()
            .read("credentials.validate", |tx| {
                let token = token.clone();
                Box::pin(async move {
                    let row = tx.reset_token(&token, Lock::None).await?;
                    Ok(row.is_some_and(|t| t.is_valid(now)))
                })
            })
            .await
    }

    /// Deletes every token whose expiry is at or before `now`.
    #[instrument(skip(self), err)]
    pub async fn purge_expired(&self, now: NaiveDateTime) -> HrResult<u64> {
        self.hr
            .gateway()
            .retry("credentials.purge", || async {
                let mut scope = self.hr.gateway().begin("credentials.purge").await?;
                let deleted = scope.tx().delete_expired_tokens(now).await?;
                scope.commit().await?;
                Ok(deleted)
            })
            .await
            .inspect(|deleted| info!(deleted, "Expired reset tokens purged"))
    }
}

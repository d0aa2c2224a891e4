use chrono::NaiveDateTime;

use super::employee::EmployeeId;

/// Single-use, time-boxed password reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub id: u64,
    pub token: String,
    pub email: String,
    pub expiry_date: NaiveDateTime,
    pub used: bool,
    pub created_at: NaiveDateTime,
    pub used_at: Option<NaiveDateTime>,
}

impl PasswordResetToken {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now >= self.expiry_date
    }

    pub fn is_valid(&self, now: NaiveDateTime) -> bool {
        !self.used && !self.is_expired(now)
    }
}

#[derive(Debug, Clone)]
pub struct NewResetToken {
    pub token: String,
    pub email: String,
    pub expiry_date: NaiveDateTime,
    /// Inserted already spent; records an attempt without granting access.
    pub used: bool,
    pub created_at: NaiveDateTime,
}

/// Append-only record of a previous password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHistory {
    pub id: u64,
    pub employee_id: EmployeeId,
    pub hashed_password: String,
    pub created_at: NaiveDateTime,
}

/// A replacement password as seen by the engine: the hash to persist and a
/// way to tell whether it denotes the same password as an older hash.
pub trait NewPassword: Send + Sync {
    fn hash(&self) -> &str;

    fn matches(&self, previous_hash: &str) -> bool;
}

/// Deterministic hash compared by string equality.
#[derive(Debug, Clone)]
pub struct PrehashedPassword(pub String);

impl NewPassword for PrehashedPassword {
    fn hash(&self) -> &str {
        &self.0
    }

    fn matches(&self, previous_hash: &str) -> bool {
        self.0 == previous_hash
    }
}

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use hr_ledger::model::credential::NewPassword;

/// A new password hashed with a fresh salt. History entries are compared by
/// verifying the plain text against each stored hash.
pub struct Argon2Password {
    plain: String,
    hash: String,
}

impl Argon2Password {
    pub fn new(plain: &str) -> Result<Self, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)?
            .to_string();
        Ok(Self {
            plain: plain.to_string(),
            hash,
        })
    }
}

impl NewPassword for Argon2Password {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn matches(&self, previous_hash: &str) -> bool {
        // Hashes written by other schemes simply never match.
        PasswordHash::new(previous_hash).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(self.plain.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

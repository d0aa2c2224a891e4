use jsonwebtoken::{DecodingKey, Validation, decode, errors::Error};

use crate::models::Claims;

/// Checks signature and expiry. Tokens are minted by the login service, so
/// this side only ever verifies.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenType;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn token(exp_offset: i64, secret: &str) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = Claims {
            user_id: 1,
            sub: "alice".into(),
            role: 3,
            exp: (now + exp_offset) as usize,
            jti: "jti".into(),
            token_type: TokenType::Access,
            employee_id: Some(7),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_live_token() {
        let claims = verify_token(&token(600, "s3cret"), "s3cret").unwrap();
        assert_eq!(claims.employee_id, Some(7));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_token() {
        assert!(verify_token(&token(600, "s3cret"), "other").is_err());
        assert!(verify_token(&token(-600, "s3cret"), "s3cret").is_err());
    }
}

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::models::{Role, User};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub uid: i64,
    pub email: String,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &User, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.username.clone(),
            uid: user.id,
            email: user.email.clone(),
            roles: user.roles.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("JWT decode failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            username: "dev".to_string(),
            email: "dev@example.com".to_string(),
            password_hash: String::new(),
            oauth_user: false,
            roles: vec![Role::Developer],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn token_carries_identity_and_roles() {
        let token = encode_token(&Claims::new(&user(), Duration::hours(1)), "secret").unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "dev");
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.roles, vec![Role::Developer]);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let token = encode_token(&Claims::new(&user(), Duration::hours(1)), "secret").unwrap();
        assert!(decode_token(&token, "other").is_err());

        let expired = encode_token(&Claims::new(&user(), Duration::hours(-2)), "secret").unwrap();
        assert!(decode_token(&expired, "secret").is_err());
    }
}

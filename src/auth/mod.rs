pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

pub const TOKEN_ISSUER: &str = "lexcase-api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: String) -> Self {
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self::with_expiry(user_id, email, role, Duration::hours(expiry_hours as i64))
    }

    pub fn with_expiry(user_id: Uuid, email: String, role: String, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            email,
            role,
            iss: TOKEN_ISSUER.to_string(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Seconds until expiry, as reported to clients
    pub fn expires_in(&self) -> i64 {
        (self.exp - self.iat).max(0)
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

fn secret() -> Result<&'static [u8], JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    Ok(secret.as_bytes())
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_secret(secret()?);
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    let decoding_key = DecodingKey::from_secret(secret()?);
    let mut validation = Validation::default();
    validation.set_issuer(&[TOKEN_ISSUER]);

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::InvalidToken("Token has expired".to_string()),
            _ => JwtError::InvalidToken(format!("Invalid JWT token: {}", e)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, "asha@example.com".to_string(), "lawyer".to_string());
        let token = generate_jwt(&claims).unwrap();
        let decoded = validate_jwt(&token).unwrap();
        assert_eq!(decoded.sub, id);
        assert_eq!(decoded.role, "lawyer");
        assert_eq!(decoded.iss, TOKEN_ISSUER);
        assert!(decoded.expires_in() > 0);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        // Well past the default 60s leeway
        let claims = Claims::with_expiry(
            Uuid::new_v4(),
            "old@example.com".to_string(),
            "staff".to_string(),
            Duration::hours(-2),
        );
        let token = generate_jwt(&claims).unwrap();
        match validate_jwt(&token) {
            Err(JwtError::InvalidToken(msg)) => assert!(msg.contains("expired")),
            other => panic!("expected expiry error, got {:?}", other),
        }
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), "x@example.com".to_string(), "admin".to_string());
        claims.iss = "someone-else".to_string();
        let token = generate_jwt(&claims).unwrap();
        assert!(matches!(validate_jwt(&token), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let claims = Claims::new(Uuid::new_v4(), "x@example.com".to_string(), "client".to_string());
        let mut token = generate_jwt(&claims).unwrap();
        token.push('x');
        assert!(validate_jwt(&token).is_err());
        assert!(validate_jwt("not.a.token").is_err());
    }
}

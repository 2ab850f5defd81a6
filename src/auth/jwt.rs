//! JWT Token Service
//!
//! Issues and decodes the signed session tokens stored in each user's active
//! token list. Expiry is deliberately NOT enforced at decode time: two routes
//! (refresh and logout) must accept an expired token, so the middleware
//! checks expiry manually against [`expired_token_allowed`].

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

const ISSUER: &str = "market-server";

/// Nominal token lifetime.
const TOKEN_LIFETIME_DAYS: i64 = 7;

/// Routes that accept an expired (but otherwise valid and still listed)
/// token, so clients can rotate or drop a stale session.
const EXPIRED_TOKEN_ROUTES: [&str; 2] = ["/user/refresh", "/user/logout"];

/// Whether `path` is allowed to proceed with an expired token.
pub fn expired_token_allowed(path: &str) -> bool {
    EXPIRED_TOKEN_ROUTES.contains(&path)
}

/// JWT claims binding a user identity to an issue/expiry window
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User unique identifier
    pub sub: Uuid,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
    /// Token issuer
    pub iss: String,
}

impl Claims {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }
}

/// Token service for issuing and decoding session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Create a new token service with the provided secret
    pub fn new(secret: &str) -> Self {
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        // Expiry is checked per-route in the middleware, not here.
        validation.validate_exp = false;

        Self {
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Generate a signed token for a user
    pub fn create_token(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let expiration = now + Duration::days(TOKEN_LIFETIME_DAYS);

        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).context("Failed to encode token")
    }

    /// Verify signature and structure, returning the claims.
    ///
    /// An expired token still decodes successfully here; callers decide
    /// whether expiry matters for the route at hand.
    pub fn decode(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("token rejected: {e}");
                ApiError::MalformedToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip() {
        let tokens = TokenService::new("test_secret");
        let user_id = Uuid::new_v4();

        let token = tokens.create_token(user_id).unwrap();
        let claims = tokens.decode(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_DAYS * 24 * 3600);
        assert!(!claims.is_expired(Utc::now()));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let tokens = TokenService::new("test_secret");
        assert!(matches!(
            tokens.decode("not-a-jwt"),
            Err(ApiError::MalformedToken)
        ));
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let token = TokenService::new("secret_a")
            .create_token(Uuid::new_v4())
            .unwrap();
        assert!(matches!(
            TokenService::new("secret_b").decode(&token),
            Err(ApiError::MalformedToken)
        ));
    }

    #[test]
    fn expired_token_still_decodes() {
        // Expiry enforcement belongs to the middleware so that refresh and
        // logout can accept stale tokens.
        let tokens = TokenService::new("test_secret");
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (now - Duration::days(8)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
            iss: ISSUER.to_string(),
        };
        let token = encode(&Header::default(), &claims, &tokens.encoding_key).unwrap();

        let decoded = tokens.decode(&token).unwrap();
        assert!(decoded.is_expired(now));
    }

    #[test]
    fn expiry_override_covers_exactly_refresh_and_logout() {
        assert!(expired_token_allowed("/user/refresh"));
        assert!(expired_token_allowed("/user/logout"));
        assert!(!expired_token_allowed("/user/profile"));
        assert!(!expired_token_allowed("/order"));
    }
}

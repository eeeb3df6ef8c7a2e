//! JWT signing and validation for access and refresh tokens.
//!
//! Both token kinds are HS256-signed JWTs carrying a random `jti`, so two
//! mints in the same second still produce distinct token strings. For
//! refresh tokens the `jti` additionally keys the server-side
//! [`TokenRecord`](crate::services::token_store): a refresh token whose
//! `jti` was never stored is rejected regardless of its signature.

use canopy_core::types::DbId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims embedded in every token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier.
    pub jti: String,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_expiry_secs: i64,
    /// Refresh token lifetime in seconds (default: 604800 = 7 days).
    pub refresh_token_expiry_secs: i64,
}

/// Default access token expiry: 15 minutes.
const DEFAULT_ACCESS_EXPIRY_SECS: i64 = 60 * 15;
/// Default refresh token expiry: 7 days.
const DEFAULT_REFRESH_EXPIRY_SECS: i64 = 60 * 60 * 24 * 7;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default  |
    /// |----------------------------|----------|----------|
    /// | `JWT_SECRET`               | **yes**  | --       |
    /// | `JWT_ACCESS_EXPIRY_SECS`   | no       | `900`    |
    /// | `JWT_REFRESH_EXPIRY_SECS`  | no       | `604800` |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_secs: i64 = std::env::var("JWT_ACCESS_EXPIRY_SECS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_SECS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_SECS must be a valid i64");

        let refresh_token_expiry_secs: i64 = std::env::var("JWT_REFRESH_EXPIRY_SECS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_SECS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_SECS must be a valid i64");

        Self {
            secret,
            access_token_expiry_secs,
            refresh_token_expiry_secs,
        }
    }
}

/// Generate an HS256 access token for the given user.
pub fn generate_access_token(
    user_id: DbId,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        exp: now + config.access_token_expiry_secs,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Generate an HS256 refresh token carrying the given `jti`.
///
/// The caller supplies the `jti` because it also keys the server-side
/// record for this token.
pub fn generate_refresh_token(
    user_id: DbId,
    token_id: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        exp: now + config.refresh_token_expiry_secs,
        iat: now,
        jti: token_id.to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Validate and decode a token, returning the embedded [`Claims`].
///
/// Validates the signature and expiration automatically. Whether a live
/// server-side record exists for the claims is the token store's concern.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to build a test config with a known secret.
    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_secs: 900,
            refresh_token_expiry_secs: 604_800,
        }
    }

    #[test]
    fn generate_and_validate_access_token() {
        let config = test_config();
        let token = generate_access_token(42, &config).expect("token generation should succeed");

        let claims = validate_token(&token, &config).expect("token validation should succeed");
        assert_eq!(claims.sub, 42);
        assert!(claims.exp > claims.iat);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn access_tokens_are_unique_per_mint() {
        let config = test_config();
        let first = generate_access_token(42, &config).expect("token generation should succeed");
        let second = generate_access_token(42, &config).expect("token generation should succeed");
        assert_ne!(first, second, "the random jti makes each mint distinct");
    }

    #[test]
    fn refresh_token_carries_the_given_jti() {
        let config = test_config();
        let token = generate_refresh_token(7, "token-id-123", &config)
            .expect("token generation should succeed");

        let claims = validate_token(&token, &config).expect("token validation should succeed");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.jti, "token-id-123");
    }

    #[test]
    fn expired_token_fails() {
        let config = test_config();

        // Manually create an already-expired token, well past the default
        // 60-second leeway.
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: 1,
            exp: now - 300,
            iat: now - 600,
            jti: "expired-token".to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .expect("encoding should succeed");

        assert!(
            validate_token(&token, &config).is_err(),
            "expired token must fail validation"
        );
    }

    #[test]
    fn different_secrets_fail() {
        let config_a = JwtConfig {
            secret: "secret-alpha".to_string(),
            ..test_config()
        };
        let config_b = JwtConfig {
            secret: "secret-bravo".to_string(),
            ..test_config()
        };

        let token =
            generate_access_token(1, &config_a).expect("token generation should succeed");
        assert!(
            validate_token(&token, &config_b).is_err(),
            "token signed with a different secret must fail"
        );
    }
}

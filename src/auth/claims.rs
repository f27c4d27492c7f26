//! Identity token verification.
//!
//! Embedded apps receive a short-lived identity token (JWT) with every
//! request. This module decodes and validates those tokens against the
//! configured application secret, producing the structured claim the rest of
//! the authentication flow works from.
//!
//! # Claims
//!
//! - `iss`: Issuer (e.g., `https://shop.example.com/admin`)
//! - `dest`: Destination URL identifying the issuing shop
//! - `aud`: Audience (must match the app's API key)
//! - `sub`: Subject (user id, optional)
//! - `exp` / `nbf` / `iat`: time-based claims
//! - `jti`: unique token id
//! - `sid`: platform session id (optional)
//!
//! # Dual-Key Validation
//!
//! To support seamless secret rotation, verification first attempts the
//! primary API secret key, then falls back to the old secret key if
//! configured.

use crate::auth::AuthError;
use crate::config::{AppConfig, ShopDomain};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// Leeway for time-based claim validation, in seconds.
const JWT_LEEWAY_SECS: u64 = 10;

/// The decoded claims of a verified identity token.
///
/// Verification is pure with respect to state: it consults only the
/// configured application key/secret pair and performs no I/O beyond
/// cryptographic checks.
///
/// # Thread Safety
///
/// `TokenClaims` is `Send + Sync`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Issuer - the admin URL that issued the token.
    pub iss: String,
    /// Destination - a URL identifying the target shop.
    pub dest: String,
    /// Audience - must match the app's API key.
    pub aud: String,
    /// Subject - the user id, when present.
    pub sub: Option<String>,
    /// Expiration timestamp (Unix).
    pub exp: i64,
    /// Not-before timestamp (Unix).
    pub nbf: i64,
    /// Issued-at timestamp (Unix).
    pub iat: i64,
    /// Unique identifier for this token.
    pub jti: String,
    /// Platform session id, when present.
    pub sid: Option<String>,
}

impl TokenClaims {
    /// Decodes and validates an identity token.
    ///
    /// Tries the primary API secret key first, then the old secret key if
    /// one is configured, and finally checks that the `aud` claim matches
    /// the app's API key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] when the token is malformed,
    /// expired, carries a bad signature, or was issued for a different app.
    pub fn decode(token: &str, config: &AppConfig) -> Result<Self, AuthError> {
        let claims = match Self::decode_with_key(token, config.api_secret_key().as_ref()) {
            Ok(claims) => claims,
            Err(primary_err) => {
                if let Some(old_key) = config.old_api_secret_key() {
                    Self::decode_with_key(token, old_key.as_ref()).map_err(|_| {
                        // Surface the primary key's error when both fail
                        AuthError::InvalidToken {
                            reason: format!("error decoding session token: {primary_err}"),
                        }
                    })?
                } else {
                    return Err(AuthError::InvalidToken {
                        reason: format!("error decoding session token: {primary_err}"),
                    });
                }
            }
        };

        if claims.aud != config.api_key().as_ref() {
            return Err(AuthError::InvalidToken {
                reason: "session token was issued for a different API key".to_string(),
            });
        }

        Ok(claims)
    }

    fn decode_with_key(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = JWT_LEEWAY_SECS;
        // The aud claim is checked manually against the API key
        validation.validate_aud = false;

        let key = DecodingKey::from_secret(secret.as_bytes());
        let token_data = decode::<Self>(token, &key, &validation)?;

        Ok(token_data.claims)
    }

    /// Returns the canonical shop domain extracted from the `dest` claim.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] when the destination does not
    /// contain a valid host.
    pub fn shop_domain(&self) -> Result<ShopDomain, AuthError> {
        ShopDomain::from_url(&self.dest).map_err(|_| AuthError::InvalidToken {
            reason: format!("session token destination '{}' is not a valid shop URL", self.dest),
        })
    }
}

// Verify TokenClaims is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<TokenClaims>();
};


#[cfg(test)]
mod tests {
    use super::test_support::{current_timestamp, encode_token, valid_claims};
    use super::*;
    use crate::config::{ApiKey, ApiSecretKey};

    const API_KEY: &str = "test-api-key";

    fn config(secret: &str) -> AppConfig {
        AppConfig::builder()
            .api_key(ApiKey::new(API_KEY).unwrap())
            .api_secret_key(ApiSecretKey::new(secret).unwrap())
            .build()
            .unwrap()
    }

    fn config_with_old_key(primary: &str, old: &str) -> AppConfig {
        AppConfig::builder()
            .api_key(ApiKey::new(API_KEY).unwrap())
            .api_secret_key(ApiSecretKey::new(primary).unwrap())
            .old_api_secret_key(ApiSecretKey::new(old).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_decode_accepts_valid_token() {
        let secret = "test-secret";
        let claims = valid_claims("my-shop.example.com", API_KEY);
        let token = encode_token(&claims, secret);

        let decoded = TokenClaims::decode(&token, &config(secret)).unwrap();

        assert_eq!(decoded.iss, claims.iss);
        assert_eq!(decoded.dest, claims.dest);
        assert_eq!(decoded.aud, API_KEY);
        assert_eq!(decoded.jti, claims.jti);
    }

    #[test]
    fn test_decode_rejects_garbage_token() {
        let result = TokenClaims::decode("not-a-jwt", &config("secret"));
        assert!(matches!(result, Err(AuthError::InvalidToken { .. })));
    }

    #[test]
    fn test_decode_rejects_wrong_signature() {
        let claims = valid_claims("my-shop.example.com", API_KEY);
        let token = encode_token(&claims, "wrong-secret");

        let result = TokenClaims::decode(&token, &config("right-secret"));

        assert!(matches!(result, Err(AuthError::InvalidToken { .. })));
    }

    #[test]
    fn test_decode_falls_back_to_old_secret_key() {
        let claims = valid_claims("my-shop.example.com", API_KEY);
        let token = encode_token(&claims, "old-secret");

        let decoded =
            TokenClaims::decode(&token, &config_with_old_key("new-secret", "old-secret")).unwrap();

        assert_eq!(decoded.aud, API_KEY);
    }

    #[test]
    fn test_decode_rejects_when_both_keys_fail() {
        let claims = valid_claims("my-shop.example.com", API_KEY);
        let token = encode_token(&claims, "neither-secret");

        let result = TokenClaims::decode(&token, &config_with_old_key("new-secret", "old-secret"));

        assert!(matches!(result, Err(AuthError::InvalidToken { .. })));
    }

    #[test]
    fn test_decode_rejects_mismatched_audience() {
        let secret = "test-secret";
        let claims = valid_claims("my-shop.example.com", "someone-elses-api-key");
        let token = encode_token(&claims, secret);

        let result = TokenClaims::decode(&token, &config(secret));

        match result {
            Err(AuthError::InvalidToken { reason }) => {
                assert!(reason.contains("different API key"));
            }
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_expired_token() {
        let secret = "test-secret";
        let mut claims = valid_claims("my-shop.example.com", API_KEY);
        claims.exp = current_timestamp() - 3600;
        let token = encode_token(&claims, secret);

        let result = TokenClaims::decode(&token, &config(secret));

        assert!(matches!(result, Err(AuthError::InvalidToken { .. })));
    }

    #[test]
    fn test_decode_accepts_token_within_leeway() {
        let secret = "test-secret";
        let mut claims = valid_claims("my-shop.example.com", API_KEY);
        claims.exp = current_timestamp() - 5;
        let token = encode_token(&claims, secret);

        assert!(TokenClaims::decode(&token, &config(secret)).is_ok());
    }

    #[test]
    fn test_shop_domain_extracts_host_from_dest() {
        let secret = "test-secret";
        let mut claims = valid_claims("my-shop.example.com", API_KEY);
        claims.dest = "https://my-shop.example.com/admin".to_string();
        let token = encode_token(&claims, secret);

        let decoded = TokenClaims::decode(&token, &config(secret)).unwrap();

        assert_eq!(
            decoded.shop_domain().unwrap().as_ref(),
            "my-shop.example.com"
        );
    }

    #[test]
    fn test_shop_domain_rejects_empty_destination() {
        let secret = "test-secret";
        let mut claims = valid_claims("my-shop.example.com", API_KEY);
        claims.dest = "https://".to_string();
        let token = encode_token(&claims, secret);

        let decoded = TokenClaims::decode(&token, &config(secret)).unwrap();

        assert!(matches!(
            decoded.shop_domain(),
            Err(AuthError::InvalidToken { .. })
        ));
    }
}

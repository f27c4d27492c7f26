//! OAuth 2.0 token exchange (RFC 8693).
//!
//! The slow authentication path trades a verified identity token for a
//! long-lived offline access token by calling the platform's authorization
//! endpoint. This is the flow's single external-dependency suspension point:
//! there is no internal retry, and a failed exchange fails the whole
//! authentication attempt.
//!
//! The exchange lives behind the [`TokenExchange`] trait so the request
//! authenticator can be exercised without the network.

use crate::auth::AuthError;
use crate::config::{AppConfig, ShopDomain};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Grant type for token exchange (RFC 8693).
const TOKEN_EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Subject token type for identity tokens.
const ID_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:id_token";

/// Requested token type for offline access tokens.
const OFFLINE_ACCESS_TOKEN_TYPE: &str = "urn:shopify:params:oauth:token-type:offline-access-token";

/// The result of a successful offline token exchange.
///
/// Carries everything the session reconciler needs to persist a session:
/// the canonical shop domain, the durable access token, and the granted
/// scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessTokenBundle {
    /// The shop the token was issued for.
    pub shop: ShopDomain,
    /// The durable offline access token.
    pub access_token: String,
    /// Granted permission scope string.
    pub scope: Option<String>,
    /// Seconds until expiry, for shops configured with expiring tokens.
    pub expires_in: Option<i64>,
}

/// Request body for token exchange.
#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    subject_token: &'a str,
    subject_token_type: &'a str,
    requested_token_type: &'a str,
}

/// Successful response from the authorization endpoint.
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
    scope: Option<String>,
    expires_in: Option<i64>,
}

/// Error response from the authorization endpoint.
#[derive(Debug, Deserialize)]
struct TokenExchangeErrorResponse {
    error: Option<String>,
}

/// Capability seam for the token exchange round trip.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchanges a verified identity token for an offline access token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ExchangeFailed`] when the remote call errors, times
    ///   out, or returns an unusable response
    /// - [`AuthError::InvalidToken`] when the endpoint rejects the subject
    ///   token itself
    async fn exchange_offline(
        &self,
        shop: &ShopDomain,
        session_token: &str,
    ) -> Result<AccessTokenBundle, AuthError>;
}

/// [`TokenExchange`] implementation that talks to the platform's
/// authorization endpoint over HTTPS.
///
/// # Example
///
/// ```rust,ignore
/// use shopify_app_auth::{HttpTokenExchanger, TokenExchange, ShopDomain};
///
/// let exchanger = HttpTokenExchanger::new(config);
/// let shop = ShopDomain::new("my-shop.example.com")?;
/// let bundle = exchanger.exchange_offline(&shop, identity_token).await?;
/// println!("Access token: {}", bundle.access_token);
/// ```
#[derive(Clone, Debug)]
pub struct HttpTokenExchanger {
    config: AppConfig,
    http: reqwest::Client,
    endpoint_override: Option<String>,
}

impl HttpTokenExchanger {
    /// Creates an exchanger that derives the endpoint from the shop domain
    /// (`https://{shop}/admin/oauth/access_token`).
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            endpoint_override: None,
        }
    }

    /// Creates an exchanger that posts to a fixed endpoint instead of
    /// deriving it from the shop domain. Used for tests and staging
    /// environments.
    #[must_use]
    pub fn with_endpoint(config: AppConfig, endpoint: impl Into<String>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            endpoint_override: Some(endpoint.into()),
        }
    }

    fn token_url(&self, shop: &ShopDomain) -> String {
        self.endpoint_override.clone().unwrap_or_else(|| {
            format!("https://{}/admin/oauth/access_token", shop.as_ref())
        })
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchanger {
    async fn exchange_offline(
        &self,
        shop: &ShopDomain,
        session_token: &str,
    ) -> Result<AccessTokenBundle, AuthError> {
        let request_body = TokenExchangeRequest {
            client_id: self.config.api_key().as_ref(),
            client_secret: self.config.api_secret_key().as_ref(),
            grant_type: TOKEN_EXCHANGE_GRANT_TYPE,
            subject_token: session_token,
            subject_token_type: ID_TOKEN_TYPE,
            requested_token_type: OFFLINE_ACCESS_TOKEN_TYPE,
        };

        let response = self
            .http
            .post(self.token_url(shop))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed {
                status: 0,
                message: format!("network error: {e}"),
            })?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();

            // invalid_subject_token means the identity token itself was bad
            if status == 400 {
                if let Ok(error_response) =
                    serde_json::from_str::<TokenExchangeErrorResponse>(&error_body)
                {
                    if error_response.error.as_deref() == Some("invalid_subject_token") {
                        return Err(AuthError::InvalidToken {
                            reason: "session token was rejected by token exchange".to_string(),
                        });
                    }
                }
            }

            return Err(AuthError::ExchangeFailed {
                status,
                message: error_body,
            });
        }

        let token_response: TokenExchangeResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::ExchangeFailed {
                    status,
                    message: format!("failed to parse token response: {e}"),
                })?;

        Ok(AccessTokenBundle {
            shop: shop.clone(),
            access_token: token_response.access_token,
            scope: token_response.scope,
            expires_in: token_response.expires_in,
        })
    }
}

// Verify exchanger types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpTokenExchanger>();
    assert_send_sync::<AccessTokenBundle>();
};

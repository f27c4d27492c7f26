//! GraphQL admin API client with retry handling.

use std::time::Duration;

use crate::config::{ApiVersion, ShopDomain};
use serde_json::Value;
use thiserror::Error;

/// Fixed retry wait time in seconds, used when the server does not say
/// otherwise.
const RETRY_WAIT_TIME: u64 = 1;

/// Total request attempts before giving up on a retryable failure.
const MAX_TRIES: u32 = 3;

/// Errors from outbound API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, TLS, connect, timeout).
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response that was not retried or survived all retries.
    #[error("API responded with status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, when one was readable.
        message: String,
    },
}

/// Client for the admin GraphQL API, bound to one shop and one access
/// token.
///
/// # Retry Behavior
///
/// - **429 (Rate Limited)** and **5xx (Server Error)**: retried using the
///   `Retry-After` header value, or 1 second when absent
/// - **Other non-2xx**: returned immediately without retry
///
/// At most three attempts are made in total.
///
/// # Example
///
/// ```rust,ignore
/// use shopify_app_auth::{ApiClient, ApiVersion, ShopDomain};
///
/// let shop = ShopDomain::new("my-shop.example.com")?;
/// let client = ApiClient::new(shop, "offline-token".to_string(), ApiVersion::latest());
///
/// let data = client.graphql("query { shop { name } }", None).await?;
/// println!("{data}");
/// ```
#[derive(Clone)]
pub struct ApiClient {
    shop: ShopDomain,
    access_token: String,
    api_version: ApiVersion,
    http: reqwest::Client,
    endpoint_override: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("shop", &self.shop)
            .field("access_token", &"*****")
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

// Verify ApiClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ApiClient>();
};

impl ApiClient {
    /// Creates a client that talks to
    /// `https://{shop}/admin/api/{version}/graphql.json`.
    ///
    /// # Panics
    ///
    /// Panics if the underlying reqwest client cannot be created. This
    /// should only happen in extremely unusual circumstances (e.g., TLS
    /// initialization failure).
    #[must_use]
    pub fn new(shop: ShopDomain, access_token: String, api_version: ApiVersion) -> Self {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            shop,
            access_token,
            api_version,
            http,
            endpoint_override: None,
        }
    }

    /// Creates a client that posts to a fixed endpoint instead of deriving
    /// it from the shop domain. Used for tests and staging environments.
    ///
    /// # Panics
    ///
    /// Panics if the underlying reqwest client cannot be created.
    #[must_use]
    pub fn with_endpoint(
        shop: ShopDomain,
        access_token: String,
        api_version: ApiVersion,
        endpoint: impl Into<String>,
    ) -> Self {
        let mut client = Self::new(shop, access_token, api_version);
        client.endpoint_override = Some(endpoint.into());
        client
    }

    /// Returns the shop this client is bound to.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    /// Returns the API version this client targets.
    #[must_use]
    pub const fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    fn graphql_url(&self) -> String {
        self.endpoint_override.clone().unwrap_or_else(|| {
            format!(
                "https://{}/admin/api/{}/graphql.json",
                self.shop.as_ref(),
                self.api_version
            )
        })
    }

    /// Executes a GraphQL query against the admin API.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failures and
    /// [`ApiError::Status`] on non-2xx responses that are not retryable or
    /// that survive all retries.
    pub async fn graphql(&self, query: &str, variables: Option<Value>) -> Result<Value, ApiError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables.unwrap_or(Value::Null),
        });

        let url = self.graphql_url();
        let mut tries: u32 = 0;
        loop {
            tries += 1;

            let response = self
                .http
                .post(&url)
                .header("X-Shopify-Access-Token", &self.access_token)
                .header("Accept", "application/json")
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }

            let code = status.as_u16();
            let retry_after = Self::retry_after(&response);
            let message = response.text().await.unwrap_or_default();

            let retryable = code == 429 || code >= 500;
            if !retryable || tries >= MAX_TRIES {
                return Err(ApiError::Status {
                    status: code,
                    message,
                });
            }

            tracing::warn!(
                status = code,
                attempt = tries,
                shop = self.shop.as_ref(),
                "retrying API request"
            );
            tokio::time::sleep(retry_after).await;
        }
    }

    /// Delay before the next attempt: `Retry-After` when it parses to a
    /// finite non-negative number of seconds, a fixed wait otherwise.
    fn retry_after(response: &reqwest::Response) -> Duration {
        response
            .headers()
            .get("Retry-After")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map_or(Duration::from_secs(RETRY_WAIT_TIME), Duration::from_secs_f64)
    }
}

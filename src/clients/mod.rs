//! Outbound API client.
//!
//! Once a request is authenticated, the resulting context carries an
//! [`ApiClient`] bound to the shop's domain and the session's offline access
//! token. The client speaks the admin GraphQL endpoint and retries
//! rate-limited and transient server failures with a short fixed delay.

mod api_client;

pub use api_client::{ApiClient, ApiError};

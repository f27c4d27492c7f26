//! The framework-agnostic inbound request surface.
//!
//! The host web framework extracts the `Authorization` header and the
//! `id_token` query parameter and hands them over as an [`AuthRequest`];
//! this crate stays independent of any particular HTTP stack.

/// The credential-bearing parts of an inbound request.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::AuthRequest;
///
/// let request = AuthRequest::new().authorization("Bearer abc123");
/// assert_eq!(request.bearer_token(), Some("abc123"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AuthRequest {
    authorization: Option<String>,
    id_token: Option<String>,
}

impl AuthRequest {
    /// Creates an empty request carrying no credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `Authorization` header value.
    #[must_use]
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Sets the `id_token` query parameter value.
    #[must_use]
    pub fn id_token(mut self, value: impl Into<String>) -> Self {
        self.id_token = Some(value.into());
        self
    }

    /// Extracts the bearer token, if any.
    ///
    /// The `Authorization: Bearer <token>` header takes priority (API
    /// calls); the `id_token` query parameter is the fallback (initial page
    /// loads).
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        if let Some(header) = &self.authorization {
            if let Some(token) = header.strip_prefix("Bearer ") {
                if !token.is_empty() {
                    return Some(token);
                }
            }
        }

        self.id_token.as_deref().filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_from_authorization_header() {
        let request = AuthRequest::new().authorization("Bearer my-token");
        assert_eq!(request.bearer_token(), Some("my-token"));
    }

    #[test]
    fn test_bearer_token_from_id_token_parameter() {
        let request = AuthRequest::new().id_token("my-token");
        assert_eq!(request.bearer_token(), Some("my-token"));
    }

    #[test]
    fn test_header_takes_priority_over_id_token() {
        let request = AuthRequest::new()
            .authorization("Bearer header-token")
            .id_token("param-token");
        assert_eq!(request.bearer_token(), Some("header-token"));
    }

    #[test]
    fn test_non_bearer_header_falls_back_to_id_token() {
        let request = AuthRequest::new()
            .authorization("Basic dXNlcjpwYXNz")
            .id_token("param-token");
        assert_eq!(request.bearer_token(), Some("param-token"));
    }

    #[test]
    fn test_empty_request_has_no_token() {
        assert_eq!(AuthRequest::new().bearer_token(), None);
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let request = AuthRequest::new().authorization("Bearer ").id_token("");
        assert_eq!(request.bearer_token(), None);
    }
}

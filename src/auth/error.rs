//! The authentication failure taxonomy.
//!
//! Every component signals its failures through explicit [`AuthError`]
//! variants, so callers classify outcomes with a type-level match instead of
//! inspecting error message text.
//!
//! # Caller Mapping
//!
//! Callers are expected to translate [`AuthError::NoToken`] and
//! [`AuthError::InvalidToken`] into an authorization-denied response, and the
//! remaining variants into a server-fault response; see
//! [`AuthError::is_client_error`].

use crate::store::StoreError;
use thiserror::Error;

/// A categorized authentication failure.
///
/// # Thread Safety
///
/// `AuthError` is `Send + Sync`, making it safe to use across async boundaries.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was presented on the request.
    #[error("no session token found on the request")]
    NoToken,

    /// A credential was presented but failed cryptographic or structural
    /// validation.
    #[error("invalid session token: {reason}")]
    InvalidToken {
        /// What was wrong with the token.
        reason: String,
    },

    /// The token was valid, but the authorization exchange with the remote
    /// endpoint failed. Transient upstream faults and policy rejections are
    /// not distinguished further.
    #[error("token exchange failed with status {status}: {message}")]
    ExchangeFailed {
        /// The HTTP status code returned, or 0 for transport errors.
        status: u16,
        /// The error message from the response.
        message: String,
    },

    /// A post-exchange persistence invariant was violated.
    #[error("session reconciliation failed")]
    ReconciliationFailed(#[from] StoreError),

    /// A session reached the authenticator without an access token.
    ///
    /// Defensive invariant check; should never trigger given the upstream
    /// guarantees.
    #[error("session '{session_id}' has no access token")]
    MissingAccessToken {
        /// The id of the offending session.
        session_id: String,
    },
}

impl AuthError {
    /// Returns the stable categorized kind of this failure, used when
    /// logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoToken => "no_token",
            Self::InvalidToken { .. } => "invalid_token",
            Self::ExchangeFailed { .. } => "exchange_failed",
            Self::ReconciliationFailed(_) => "reconciliation_failed",
            Self::MissingAccessToken { .. } => "missing_access_token",
        }
    }

    /// Returns `true` for failures caused by the client's credential rather
    /// than an internal or upstream fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::NoToken | Self::InvalidToken { .. })
    }
}

// Verify AuthError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AuthError>();
};

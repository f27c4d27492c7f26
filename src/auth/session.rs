//! The persisted session model.
//!
//! A session binds a shop (and optionally a specific end user, for online
//! sessions) to an access token. The request authenticator only consumes
//! offline sessions, whose ids are a deterministic function of the shop
//! domain so the fast path can derive them locally.

use crate::auth::exchange::AccessTokenBundle;
use crate::config::ShopDomain;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One authenticated actor/shop pairing issued by the platform.
///
/// Sessions are created or overwritten (upsert keyed by `id`) every time the
/// token-exchange handshake completes, and deleted externally on uninstall.
///
/// # Invariant
///
/// Any session consumed by the request authenticator has a non-null
/// `access_token`; the authenticator enforces this defensively.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::{Session, ShopDomain};
///
/// let domain = ShopDomain::new("my-shop.example.com").unwrap();
/// assert_eq!(Session::offline_id(&domain), "offline_my-shop.example.com");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier, derived from shop domain and online/offline mode.
    pub id: String,
    /// The shop this session is for; foreign reference to a shop by domain.
    pub shop: ShopDomain,
    /// Opaque state string used during the handshake.
    pub state: String,
    /// Whether this is a short-lived user session rather than a long-lived
    /// offline session.
    pub is_online: bool,
    /// Granted permission scope string.
    pub scope: Option<String>,
    /// Absent for offline sessions, which never expire.
    pub expires: Option<DateTime<Utc>>,
    /// Absent until the handshake completes.
    pub access_token: Option<String>,
}

impl Session {
    /// Returns the deterministic id of the offline session for a shop.
    #[must_use]
    pub fn offline_id(shop: &ShopDomain) -> String {
        format!("offline_{}", shop.as_ref())
    }

    /// Builds the offline session that a reconciliation persists from a
    /// completed token exchange.
    #[must_use]
    pub fn offline_from_bundle(bundle: &AccessTokenBundle) -> Self {
        Self {
            id: Self::offline_id(&bundle.shop),
            shop: bundle.shop.clone(),
            state: String::new(),
            is_online: false,
            scope: bundle.scope.clone(),
            expires: bundle
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            access_token: Some(bundle.access_token.clone()),
        }
    }

    /// Returns `true` if this session has expired.
    ///
    /// Sessions without an expiration time are considered never expired.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires.is_some_and(|expires| Utc::now() > expires)
    }

    /// Returns `true` if this session holds an access token and has not
    /// expired.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.access_token.is_some() && !self.expired()
    }
}

// Verify Session is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
};

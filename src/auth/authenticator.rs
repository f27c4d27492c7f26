//! The request authenticator.
//!
//! Single entry point invoked once per inbound request. The flow is linear
//! with an early-exit fast path:
//!
//! 1. Extract the bearer token (header first, then the `id_token`
//!    parameter); none found fails with `NoToken`.
//! 2. Decode and verify the identity token; the shop domain and the offline
//!    session id are derived locally from its destination claim.
//! 3. Fast path: if the offline session already exists with an access token
//!    and its shop row is present, succeed without any network call.
//! 4. Slow path: exchange the identity token for an offline access token,
//!    reconcile storage, succeed.
//!
//! Every failure is logged once with its categorized kind and the shop
//! domain (best effort, `"unknown"` when not determinable) and then
//! re-signaled to the caller unchanged. The caller decides the
//! transport-level response.

use std::sync::Arc;

use crate::auth::claims::TokenClaims;
use crate::auth::exchange::{HttpTokenExchanger, TokenExchange};
use crate::auth::reconcile::SessionReconciler;
use crate::auth::request::AuthRequest;
use crate::auth::{AuthError, Session};
use crate::clients::ApiClient;
use crate::config::{AppConfig, ShopDomain};
use crate::store::{CredentialStore, Shop};

/// A ready-to-use authenticated context.
///
/// Holds the durable session and shop rows plus an API client handle bound
/// to the shop's domain and the session's access token.
#[derive(Clone, Debug)]
pub struct AuthContext {
    /// The authenticated session.
    pub session: Session,
    /// The shop the session belongs to.
    pub shop: Shop,
    /// Outbound API client bound to this shop and access token.
    pub api: ApiClient,
}

impl AuthContext {
    /// Builds a context from reconciled rows.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingAccessToken`] if the session lacks an
    /// access token. Upstream guarantees make this unreachable in practice;
    /// the check is a defensive invariant.
    pub fn new(session: Session, shop: Shop, config: &AppConfig) -> Result<Self, AuthError> {
        let Some(access_token) = session.access_token.clone() else {
            return Err(AuthError::MissingAccessToken {
                session_id: session.id.clone(),
            });
        };

        let api = ApiClient::new(session.shop.clone(), access_token, config.api_version());

        Ok(Self { session, shop, api })
    }
}

/// Authenticates inbound requests against the credential store, driving the
/// token exchange and reconciliation when needed.
///
/// All collaborators are explicitly injected; the exchanger defaults to
/// [`HttpTokenExchanger`] but any [`TokenExchange`] implementation can be
/// substituted.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use shopify_app_auth::{Authenticator, AuthRequest, MemoryStore};
///
/// let authenticator = Authenticator::new(config, Arc::new(MemoryStore::new()));
///
/// let request = AuthRequest::new().authorization(format!("Bearer {id_token}"));
/// let context = authenticator.authenticate(&request).await?;
/// let shop_data = context.api.graphql("query { shop { name } }", None).await?;
/// ```
pub struct Authenticator<S> {
    config: AppConfig,
    store: Arc<S>,
    reconciler: SessionReconciler<S>,
    exchanger: Arc<dyn TokenExchange>,
}

impl<S: CredentialStore> Authenticator<S> {
    /// Creates an authenticator that performs real token exchanges over
    /// HTTPS.
    #[must_use]
    pub fn new(config: AppConfig, store: Arc<S>) -> Self {
        let exchanger = Arc::new(HttpTokenExchanger::new(config.clone()));
        Self::with_exchanger(config, store, exchanger)
    }

    /// Creates an authenticator with a custom token exchanger.
    #[must_use]
    pub fn with_exchanger(
        config: AppConfig,
        store: Arc<S>,
        exchanger: Arc<dyn TokenExchange>,
    ) -> Self {
        Self {
            config,
            reconciler: SessionReconciler::new(Arc::clone(&store)),
            store,
            exchanger,
        }
    }

    /// Authenticates one inbound request.
    ///
    /// # Errors
    ///
    /// Returns one of the categorized [`AuthError`] variants; see the
    /// module docs for the flow. Failures are logged here exactly once and
    /// never retried.
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<AuthContext, AuthError> {
        let mut shop_hint: Option<ShopDomain> = None;
        let result = self.resolve(request, &mut shop_hint).await;

        if let Err(error) = &result {
            let shop = shop_hint.as_ref().map_or("unknown", ShopDomain::as_ref);
            tracing::error!(
                kind = error.kind(),
                shop,
                "authentication failed: {error}"
            );
        }

        result
    }

    async fn resolve(
        &self,
        request: &AuthRequest,
        shop_hint: &mut Option<ShopDomain>,
    ) -> Result<AuthContext, AuthError> {
        let token = request.bearer_token().ok_or(AuthError::NoToken)?;

        let claims = TokenClaims::decode(token, &self.config)?;
        let shop = claims.shop_domain()?;
        *shop_hint = Some(shop.clone());

        // Fast path: an already-reconciled offline session skips the
        // exchange round trip entirely.
        let offline_id = Session::offline_id(&shop);
        if let Some(session) = self.store.session(&offline_id).await? {
            if session.access_token.is_some() {
                if let Some(shop_row) = self.store.shop(&session.shop).await? {
                    return AuthContext::new(session, shop_row, &self.config);
                }
            }
        }

        // Slow path: exchange the identity token and reconcile storage.
        let bundle = self.exchanger.exchange_offline(&shop, token).await?;
        let (session, shop_row) = self.reconciler.reconcile(&bundle).await?;

        AuthContext::new(session, shop_row, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::test_support::{encode_token, valid_claims};
    use crate::auth::exchange::AccessTokenBundle;
    use crate::config::{ApiKey, ApiSecretKey};
    use crate::store::{MemoryStore, ShopDetails, StoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const API_KEY: &str = "test-api-key";
    const SECRET: &str = "test-secret";
    const SHOP: &str = "acme.example.com";

    fn config() -> AppConfig {
        AppConfig::builder()
            .api_key(ApiKey::new(API_KEY).unwrap())
            .api_secret_key(ApiSecretKey::new(SECRET).unwrap())
            .build()
            .unwrap()
    }

    fn identity_token() -> String {
        encode_token(&valid_claims(SHOP, API_KEY), SECRET)
    }

    fn domain() -> ShopDomain {
        ShopDomain::new(SHOP).unwrap()
    }

    /// Exchanger that hands out a fixed token and counts invocations.
    struct StubExchanger {
        access_token: String,
        calls: AtomicUsize,
    }

    impl StubExchanger {
        fn new(access_token: &str) -> Arc<Self> {
            Arc::new(Self {
                access_token: access_token.to_string(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenExchange for StubExchanger {
        async fn exchange_offline(
            &self,
            shop: &ShopDomain,
            _session_token: &str,
        ) -> Result<AccessTokenBundle, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessTokenBundle {
                shop: shop.clone(),
                access_token: self.access_token.clone(),
                scope: Some("read_products".to_string()),
                expires_in: None,
            })
        }
    }

    /// Exchanger that must never be reached.
    struct UnreachableExchanger;

    #[async_trait]
    impl TokenExchange for UnreachableExchanger {
        async fn exchange_offline(
            &self,
            _shop: &ShopDomain,
            _session_token: &str,
        ) -> Result<AccessTokenBundle, AuthError> {
            panic!("token exchange must not be reached");
        }
    }

    /// Store wrapper that counts every operation.
    struct CountingStore {
        inner: MemoryStore,
        ops: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryStore::new(),
                ops: AtomicUsize::new(0),
            })
        }

        fn ops(&self) -> usize {
            self.ops.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn session(&self, id: &str) -> Result<Option<Session>, StoreError> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            self.inner.session(id).await
        }

        async fn shop(&self, domain: &ShopDomain) -> Result<Option<Shop>, StoreError> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            self.inner.shop(domain).await
        }

        async fn upsert(&self, session: &Session) -> Result<(Session, Shop), StoreError> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert(session).await
        }

        async fn update_shop_details(
            &self,
            domain: &ShopDomain,
            details: ShopDetails,
        ) -> Result<Shop, StoreError> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            self.inner.update_shop_details(domain, details).await
        }

        async fn delete_sessions(&self, domain: &ShopDomain) -> Result<u64, StoreError> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            self.inner.delete_sessions(domain).await
        }
    }

    #[tokio::test]
    async fn test_request_without_token_fails_without_any_io() {
        let store = CountingStore::new();
        let exchanger = StubExchanger::new("t1");
        let authenticator =
            Authenticator::with_exchanger(config(), Arc::clone(&store), exchanger.clone());

        let result = authenticator.authenticate(&AuthRequest::new()).await;

        assert!(matches!(result, Err(AuthError::NoToken)));
        assert_eq!(store.ops(), 0);
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_token_never_reaches_the_exchange_step() {
        let store = CountingStore::new();
        let exchanger = StubExchanger::new("t1");
        let authenticator =
            Authenticator::with_exchanger(config(), Arc::clone(&store), exchanger.clone());

        let request = AuthRequest::new().authorization("Bearer not-a-jwt");
        let result = authenticator.authenticate(&request).await;

        assert!(matches!(result, Err(AuthError::InvalidToken { .. })));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_slow_path_exchanges_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let exchanger = StubExchanger::new("fresh-token");
        let authenticator =
            Authenticator::with_exchanger(config(), Arc::clone(&store), exchanger.clone());

        let request = AuthRequest::new().authorization(format!("Bearer {}", identity_token()));
        let context = authenticator.authenticate(&request).await.unwrap();

        assert_eq!(exchanger.calls(), 1);
        assert_eq!(context.session.id, format!("offline_{SHOP}"));
        assert_eq!(context.session.access_token.as_deref(), Some("fresh-token"));
        assert_eq!(context.shop.domain, domain());
        assert_eq!(context.api.shop(), &domain());

        // Rows were durably persisted
        let stored = store
            .session(&context.session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, context.session);
    }

    #[tokio::test]
    async fn test_fast_path_skips_the_exchange_for_onboarded_shops() {
        let store = Arc::new(MemoryStore::new());

        // Onboard via the slow path first
        let onboarding =
            Authenticator::with_exchanger(config(), Arc::clone(&store), StubExchanger::new("t1"));
        let request = AuthRequest::new().authorization(format!("Bearer {}", identity_token()));
        let slow = onboarding.authenticate(&request).await.unwrap();

        // A fresh token for the same shop must now be served locally; the
        // exchanger would panic if reached
        let authenticator = Authenticator::with_exchanger(
            config(),
            Arc::clone(&store),
            Arc::new(UnreachableExchanger),
        );
        let request = AuthRequest::new().id_token(identity_token());
        let fast = authenticator.authenticate(&request).await.unwrap();

        // The two paths are observationally equivalent
        assert_eq!(fast.session, slow.session);
        assert_eq!(fast.shop, slow.shop);
    }

    #[tokio::test]
    async fn test_tokenless_stored_session_falls_back_to_slow_path() {
        let store = Arc::new(MemoryStore::new());

        // A session stub whose handshake never completed
        store
            .upsert(&Session {
                id: Session::offline_id(&domain()),
                shop: domain(),
                state: "pending".to_string(),
                is_online: false,
                scope: None,
                expires: None,
                access_token: None,
            })
            .await
            .unwrap();

        let exchanger = StubExchanger::new("recovered-token");
        let authenticator = Authenticator::with_exchanger(
            config(),
            Arc::clone(&store),
            Arc::clone(&exchanger) as Arc<dyn TokenExchange>,
        );

        let request = AuthRequest::new().id_token(identity_token());
        let context = authenticator.authenticate(&request).await.unwrap();

        assert_eq!(exchanger.calls(), 1);
        assert_eq!(
            context.session.access_token.as_deref(),
            Some("recovered-token")
        );
    }

    #[tokio::test]
    async fn test_failed_exchange_is_surfaced_unchanged() {
        struct FailingExchanger;

        #[async_trait]
        impl TokenExchange for FailingExchanger {
            async fn exchange_offline(
                &self,
                _shop: &ShopDomain,
                _session_token: &str,
            ) -> Result<AccessTokenBundle, AuthError> {
                Err(AuthError::ExchangeFailed {
                    status: 503,
                    message: "upstream unavailable".to_string(),
                })
            }
        }

        let authenticator = Authenticator::with_exchanger(
            config(),
            Arc::new(MemoryStore::new()),
            Arc::new(FailingExchanger) as Arc<dyn TokenExchange>,
        );

        let request = AuthRequest::new().id_token(identity_token());
        let result = authenticator.authenticate(&request).await;

        match result {
            Err(AuthError::ExchangeFailed { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("expected ExchangeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_context_requires_access_token() {
        let session = Session {
            id: "offline_acme.example.com".to_string(),
            shop: domain(),
            state: String::new(),
            is_online: false,
            scope: None,
            expires: None,
            access_token: None,
        };
        let shop = Shop::new(domain());

        let result = AuthContext::new(session, shop, &config());

        match result {
            Err(AuthError::MissingAccessToken { session_id }) => {
                assert_eq!(session_id, "offline_acme.example.com");
            }
            other => panic!("expected MissingAccessToken, got {other:?}"),
        }
    }
}

//! In-process credential store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::auth::Session;
use crate::config::ShopDomain;
use crate::store::{CredentialStore, Shop, ShopDetails, StoreError};

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<String, Session>,
    shops: HashMap<ShopDomain, Shop>,
}

/// An in-process [`CredentialStore`] backed by hash maps.
///
/// The whole [`upsert`](CredentialStore::upsert) sequence runs while holding
/// a single async mutex with no await points inside, so it is atomic with
/// respect to concurrent reconciliations. Suitable for tests and
/// single-process deployments; nothing survives a restart.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::MemoryStore;
///
/// let store = MemoryStore::new();
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.sessions.get(id).cloned())
    }

    async fn shop(&self, domain: &ShopDomain) -> Result<Option<Shop>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.shops.get(domain).cloned())
    }

    async fn upsert(&self, session: &Session) -> Result<(Session, Shop), StoreError> {
        let mut state = self.state.lock().await;

        // The session row's full column set is the upsert's conflict set, so
        // replacing the row wholesale matches the relational semantics.
        state
            .sessions
            .insert(session.id.clone(), session.clone());

        match state.shops.entry(session.shop.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().updated_at = Utc::now();
            }
            Entry::Vacant(entry) => {
                entry.insert(Shop::new(session.shop.clone()));
            }
        }

        let stored_session =
            state
                .sessions
                .get(&session.id)
                .cloned()
                .ok_or_else(|| StoreError::MissingRow {
                    entity: "session",
                    key: session.id.clone(),
                })?;
        let stored_shop =
            state
                .shops
                .get(&session.shop)
                .cloned()
                .ok_or_else(|| StoreError::MissingRow {
                    entity: "shop",
                    key: session.shop.as_ref().to_string(),
                })?;

        Ok((stored_session, stored_shop))
    }

    async fn update_shop_details(
        &self,
        domain: &ShopDomain,
        details: ShopDetails,
    ) -> Result<Shop, StoreError> {
        let mut state = self.state.lock().await;

        let shop = state
            .shops
            .get_mut(domain)
            .ok_or_else(|| StoreError::MissingRow {
                entity: "shop",
                key: domain.as_ref().to_string(),
            })?;

        if details.name.is_some() {
            shop.name = details.name;
        }
        if details.email.is_some() {
            shop.email = details.email;
        }
        if details.contact_email.is_some() {
            shop.contact_email = details.contact_email;
        }
        if details.currency_code.is_some() {
            shop.currency_code = details.currency_code;
        }
        if details.weight_unit.is_some() {
            shop.weight_unit = details.weight_unit;
        }
        if details.timezone.is_some() {
            shop.timezone = details.timezone;
        }
        if details.url.is_some() {
            shop.url = details.url;
        }
        shop.updated_at = Utc::now();

        Ok(shop.clone())
    }

    async fn delete_sessions(&self, domain: &ShopDomain) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, session| session.shop != *domain);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn domain() -> ShopDomain {
        ShopDomain::new("acme.example.com").unwrap()
    }

    fn offline_session(token: &str, scope: &str) -> Session {
        Session {
            id: Session::offline_id(&domain()),
            shop: domain(),
            state: String::new(),
            is_online: false,
            scope: Some(scope.to_string()),
            expires: None,
            access_token: Some(token.to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_session_and_shop() {
        let store = MemoryStore::new();

        let (session, shop) = store.upsert(&offline_session("t1", "read")).await.unwrap();

        assert_eq!(session.access_token.as_deref(), Some("t1"));
        assert_eq!(shop.domain, domain());
        assert!(shop.name.is_none());

        let looked_up = store.session(&session.id).await.unwrap().unwrap();
        assert_eq!(looked_up, session);
    }

    #[tokio::test]
    async fn test_reconciling_twice_is_idempotent() {
        let store = MemoryStore::new();

        let (_, first_shop) = store.upsert(&offline_session("t1", "read")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (session, second_shop) = store.upsert(&offline_session("t1", "read")).await.unwrap();

        // Descriptive fields untouched, updated_at advanced, same shop row
        assert_eq!(second_shop.id, first_shop.id);
        assert_eq!(second_shop.created_at, first_shop.created_at);
        assert!(second_shop.updated_at > first_shop.updated_at);
        assert!(second_shop.name.is_none());
        assert_eq!(session.access_token.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_concurrent_reconciliation_converges_to_last_commit() {
        let store = MemoryStore::new();

        store.upsert(&offline_session("t1", "scope-one")).await.unwrap();
        let (session, _) = store.upsert(&offline_session("t2", "scope-two")).await.unwrap();

        // Last-committed-wins for the whole column group, never a mix
        assert_eq!(session.access_token.as_deref(), Some("t2"));
        assert_eq!(session.scope.as_deref(), Some("scope-two"));
    }

    #[tokio::test]
    async fn test_shop_upsert_never_overwrites_synced_details() {
        let store = MemoryStore::new();

        store.upsert(&offline_session("t1", "read")).await.unwrap();
        store
            .update_shop_details(
                &domain(),
                ShopDetails {
                    name: Some("Acme".to_string()),
                    currency_code: Some("USD".to_string()),
                    ..ShopDetails::default()
                },
            )
            .await
            .unwrap();

        let (_, shop) = store.upsert(&offline_session("t2", "write")).await.unwrap();

        assert_eq!(shop.name.as_deref(), Some("Acme"));
        assert_eq!(shop.currency_code.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn test_update_shop_details_leaves_none_fields_untouched() {
        let store = MemoryStore::new();
        store.upsert(&offline_session("t1", "read")).await.unwrap();

        store
            .update_shop_details(
                &domain(),
                ShopDetails {
                    name: Some("Acme".to_string()),
                    ..ShopDetails::default()
                },
            )
            .await
            .unwrap();
        let shop = store
            .update_shop_details(
                &domain(),
                ShopDetails {
                    email: Some("owner@acme.example.com".to_string()),
                    ..ShopDetails::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(shop.name.as_deref(), Some("Acme"));
        assert_eq!(shop.email.as_deref(), Some("owner@acme.example.com"));
    }

    #[tokio::test]
    async fn test_update_shop_details_for_unknown_domain_is_missing_row() {
        let store = MemoryStore::new();
        let result = store
            .update_shop_details(&domain(), ShopDetails::default())
            .await;
        assert!(matches!(result, Err(StoreError::MissingRow { .. })));
    }

    #[tokio::test]
    async fn test_uninstall_then_reonboard_has_no_conflicts() {
        let store = MemoryStore::new();

        store.upsert(&offline_session("t1", "read")).await.unwrap();
        let removed = store.delete_sessions(&domain()).await.unwrap();
        assert_eq!(removed, 1);

        let id = Session::offline_id(&domain());
        assert!(store.session(&id).await.unwrap().is_none());
        // The shop row survives an uninstall
        assert!(store.shop(&domain()).await.unwrap().is_some());

        // Re-onboarding the same domain succeeds
        let (session, _) = store.upsert(&offline_session("t3", "read")).await.unwrap();
        assert_eq!(session.access_token.as_deref(), Some("t3"));
    }

    #[tokio::test]
    async fn test_delete_sessions_only_touches_matching_domain() {
        let store = MemoryStore::new();
        let other = ShopDomain::new("other.example.com").unwrap();

        store.upsert(&offline_session("t1", "read")).await.unwrap();
        store
            .upsert(&Session {
                id: Session::offline_id(&other),
                shop: other.clone(),
                state: String::new(),
                is_online: false,
                scope: None,
                expires: None,
                access_token: Some("t2".to_string()),
            })
            .await
            .unwrap();

        let removed = store.delete_sessions(&domain()).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .session(&Session::offline_id(&other))
            .await
            .unwrap()
            .is_some());
    }
}

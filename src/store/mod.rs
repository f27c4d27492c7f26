//! Durable credential storage for sessions and shops.
//!
//! The credential store is the single shared mutable resource of the
//! authentication core. All mutation goes through [`CredentialStore::upsert`],
//! which executes the session upsert, the shop upsert, and the read-back of
//! both rows as one atomic unit. Concurrent reconciliations for the same shop
//! therefore converge on one caller's input per column group
//! (last-committed-wins), never a partial mix.
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`]: in-process, for tests and single-process deployments
//! - [`SqliteStore`]: SQLite-backed via `sqlx`
//!
//! # Example
//!
//! ```rust
//! use shopify_app_auth::{CredentialStore, MemoryStore, Session, ShopDomain};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let domain = ShopDomain::new("my-shop.example.com")?;
//!
//! let session = Session {
//!     id: Session::offline_id(&domain),
//!     shop: domain.clone(),
//!     state: String::new(),
//!     is_online: false,
//!     scope: Some("read_products".to_string()),
//!     expires: None,
//!     access_token: Some("token".to_string()),
//! };
//!
//! let (session, shop) = store.upsert(&session).await?;
//! assert_eq!(shop.domain, domain);
//! # Ok(())
//! # }
//! ```

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::auth::Session;
use crate::config::ShopDomain;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database reported an error.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// A row that the preceding upsert guaranteed could not be read back.
    ///
    /// This is a data-integrity fault, not a normal error.
    #[error("{entity} row for '{key}' missing after upsert")]
    MissingRow {
        /// The relation the row belongs to.
        entity: &'static str,
        /// The unique key that was looked up.
        key: String,
    },

    /// A stored row failed to convert back into its domain type.
    #[error("stored {entity} row for '{key}' is invalid: {reason}")]
    InvalidRow {
        /// The relation the row belongs to.
        entity: &'static str,
        /// The unique key of the row.
        key: String,
        /// Why the row could not be converted.
        reason: String,
    },
}

/// One tenant installation, keyed by its unique domain.
///
/// A shop row is created with only `domain` populated the first time any
/// session for that domain is reconciled. The descriptive attributes are
/// filled in later by the background shop sync via
/// [`CredentialStore::update_shop_details`]; reconciliation never touches
/// them. Rows are deleted externally on uninstall, never by this core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    /// Generated unique identifier.
    pub id: String,
    /// Unique natural key, canonical lowercase host string.
    pub domain: ShopDomain,
    /// Display name of the shop.
    pub name: Option<String>,
    /// Account email.
    pub email: Option<String>,
    /// Customer-facing contact email.
    pub contact_email: Option<String>,
    /// ISO currency code.
    pub currency_code: Option<String>,
    /// Default weight unit.
    pub weight_unit: Option<String>,
    /// IANA timezone name.
    pub timezone: Option<String>,
    /// Public storefront URL.
    pub url: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed whenever the row is touched during reconciliation,
    /// even if nothing else changed.
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    /// Creates a fresh shop row with only the domain populated.
    #[must_use]
    pub fn new(domain: ShopDomain) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            domain,
            name: None,
            email: None,
            contact_email: None,
            currency_code: None,
            weight_unit: None,
            timezone: None,
            url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The descriptive field group written by the background shop sync.
///
/// Fields set to `Some` overwrite the stored value; `None` fields are left
/// untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopDetails {
    /// Display name of the shop.
    pub name: Option<String>,
    /// Account email.
    pub email: Option<String>,
    /// Customer-facing contact email.
    pub contact_email: Option<String>,
    /// ISO currency code.
    pub currency_code: Option<String>,
    /// Default weight unit.
    pub weight_unit: Option<String>,
    /// IANA timezone name.
    pub timezone: Option<String>,
    /// Public storefront URL.
    pub url: Option<String>,
}

/// Durable mapping from session identifier to access token and shop metadata.
///
/// Implementations must make [`upsert`](Self::upsert) atomic: both upserts
/// plus the read-back execute as one unit, so the returned values reflect
/// exactly what was committed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Point lookup of a session by its unique id.
    async fn session(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Point lookup of a shop by its unique domain.
    async fn shop(&self, domain: &ShopDomain) -> Result<Option<Shop>, StoreError>;

    /// Atomically reconciles storage with the given session.
    ///
    /// 1. Upserts the session row keyed by `id`: insert if absent; on
    ///    conflict overwrite `access_token`, `expires`, `scope`, `state`,
    ///    and `shop`. Replaying the same input converges to the same row.
    /// 2. Upserts the shop row keyed by `domain`: insert with only the
    ///    domain set if absent; on conflict touch `updated_at` only.
    /// 3. Reads both rows back within the same transaction scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingRow`] if either row cannot be read back
    /// after the upserts.
    async fn upsert(&self, session: &Session) -> Result<(Session, Shop), StoreError>;

    /// Applies synced descriptive attributes to an existing shop row.
    ///
    /// `Some` fields overwrite, `None` fields are left untouched, and
    /// `updated_at` is refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingRow`] if no shop exists for the domain.
    async fn update_shop_details(
        &self,
        domain: &ShopDomain,
        details: ShopDetails,
    ) -> Result<Shop, StoreError>;

    /// Removes every session for the given shop domain in one operation.
    ///
    /// Used by the uninstall flow. The shop row is left in place, and
    /// reconciling the same domain again afterwards must succeed without
    /// unique-key conflicts.
    async fn delete_sessions(&self, domain: &ShopDomain) -> Result<u64, StoreError>;
}

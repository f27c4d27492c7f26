//! SQLite implementation of [`CredentialStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use crate::auth::Session;
use crate::config::ShopDomain;
use crate::store::{CredentialStore, Shop, ShopDetails, StoreError};

const CREATE_SESSION_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS session (
    id TEXT PRIMARY KEY,
    shop TEXT NOT NULL UNIQUE,
    state TEXT NOT NULL,
    is_online INTEGER NOT NULL DEFAULT 0,
    scope TEXT,
    expires TEXT,
    access_token TEXT
)";

const CREATE_SHOP_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS shop (
    id TEXT PRIMARY KEY,
    domain TEXT NOT NULL UNIQUE,
    name TEXT,
    email TEXT,
    contact_email TEXT,
    currency_code TEXT,
    weight_unit TEXT,
    timezone TEXT,
    url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const SELECT_SESSION: &str = "\
SELECT id, shop, state, is_online, scope, expires, access_token
FROM session WHERE id = ?";

const SELECT_SHOP: &str = "\
SELECT id, domain, name, email, contact_email, currency_code, weight_unit,
       timezone, url, created_at, updated_at
FROM shop WHERE domain = ?";

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    shop: String,
    state: String,
    is_online: bool,
    scope: Option<String>,
    expires: Option<DateTime<Utc>>,
    access_token: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, StoreError> {
        let shop = ShopDomain::new(&self.shop).map_err(|e| StoreError::InvalidRow {
            entity: "session",
            key: self.id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Session {
            id: self.id,
            shop,
            state: self.state,
            is_online: self.is_online,
            scope: self.scope,
            expires: self.expires,
            access_token: self.access_token,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: String,
    domain: String,
    name: Option<String>,
    email: Option<String>,
    contact_email: Option<String>,
    currency_code: Option<String>,
    weight_unit: Option<String>,
    timezone: Option<String>,
    url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShopRow {
    fn into_shop(self) -> Result<Shop, StoreError> {
        let domain = ShopDomain::new(&self.domain).map_err(|e| StoreError::InvalidRow {
            entity: "shop",
            key: self.id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Shop {
            id: self.id,
            domain,
            name: self.name,
            email: self.email,
            contact_email: self.contact_email,
            currency_code: self.currency_code,
            weight_unit: self.weight_unit,
            timezone: self.timezone,
            url: self.url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A SQLite-backed [`CredentialStore`] using `sqlx`.
///
/// Upserts rely on `INSERT .. ON CONFLICT .. DO UPDATE` with the unique key
/// as the conflict target, executed inside a single transaction together
/// with the read-back of both rows.
///
/// # Example
///
/// ```rust,no_run
/// use shopify_app_auth::SqliteStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteStore::connect("sqlite://sessions.db").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to the database at `url` and applies the schema.
    ///
    /// The pool is limited to a single connection: SQLite serializes writers
    /// anyway, and `sqlite::memory:` databases exist per connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection or migration fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wraps an existing pool without applying the schema.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the `session` and `shop` relations if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_SESSION_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_SHOP_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(SELECT_SESSION)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(SessionRow::into_session).transpose()
    }

    async fn shop(&self, domain: &ShopDomain) -> Result<Option<Shop>, StoreError> {
        let row = sqlx::query_as::<_, ShopRow>(SELECT_SHOP)
            .bind(domain.as_ref())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ShopRow::into_shop).transpose()
    }

    async fn upsert(&self, session: &Session) -> Result<(Session, Shop), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO session (id, shop, state, is_online, scope, expires, access_token)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               access_token = excluded.access_token,
               expires = excluded.expires,
               scope = excluded.scope,
               state = excluded.state,
               shop = excluded.shop",
        )
        .bind(&session.id)
        .bind(session.shop.as_ref())
        .bind(&session.state)
        .bind(session.is_online)
        .bind(&session.scope)
        .bind(session.expires)
        .bind(&session.access_token)
        .execute(&mut *tx)
        .await?;

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO shop (id, domain, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(domain) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session.shop.as_ref())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let session_row = sqlx::query_as::<_, SessionRow>(SELECT_SESSION)
            .bind(&session.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::MissingRow {
                entity: "session",
                key: session.id.clone(),
            })?;
        let shop_row = sqlx::query_as::<_, ShopRow>(SELECT_SHOP)
            .bind(session.shop.as_ref())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::MissingRow {
                entity: "shop",
                key: session.shop.as_ref().to_string(),
            })?;

        tx.commit().await?;

        Ok((session_row.into_session()?, shop_row.into_shop()?))
    }

    async fn update_shop_details(
        &self,
        domain: &ShopDomain,
        details: ShopDetails,
    ) -> Result<Shop, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE shop SET
               name = COALESCE(?, name),
               email = COALESCE(?, email),
               contact_email = COALESCE(?, contact_email),
               currency_code = COALESCE(?, currency_code),
               weight_unit = COALESCE(?, weight_unit),
               timezone = COALESCE(?, timezone),
               url = COALESCE(?, url),
               updated_at = ?
             WHERE domain = ?",
        )
        .bind(&details.name)
        .bind(&details.email)
        .bind(&details.contact_email)
        .bind(&details.currency_code)
        .bind(&details.weight_unit)
        .bind(&details.timezone)
        .bind(&details.url)
        .bind(Utc::now())
        .bind(domain.as_ref())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                entity: "shop",
                key: domain.as_ref().to_string(),
            });
        }

        let shop_row = sqlx::query_as::<_, ShopRow>(SELECT_SHOP)
            .bind(domain.as_ref())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::MissingRow {
                entity: "shop",
                key: domain.as_ref().to_string(),
            })?;

        tx.commit().await?;

        shop_row.into_shop()
    }

    async fn delete_sessions(&self, domain: &ShopDomain) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM session WHERE shop = ?")
            .bind(domain.as_ref())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

//! # Shopify App Auth
//!
//! Embedded-app authentication for Shopify apps: identity token
//! verification, offline token exchange, and durable session storage, tied
//! together behind a single per-request entry point.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`AppConfig`] and [`AppConfigBuilder`]
//! - Validated newtypes for API credentials and shop domains
//! - Identity token (JWT) verification with dual-key secret rotation
//! - RFC 8693 token exchange for offline access tokens
//! - Transactional session and shop persistence behind the
//!   [`CredentialStore`] trait, with in-memory and `SQLite` backends
//! - A request [`Authenticator`] with a local fast path that avoids the
//!   network once a shop is onboarded
//! - An async GraphQL [`ApiClient`] with retry and rate limit handling
//!
//! ## Quick Start
//!
//! ```rust
//! use shopify_app_auth::{AppConfig, ApiKey, ApiSecretKey, ApiVersion};
//!
//! // Create configuration using the builder pattern
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("your-api-secret").unwrap())
//!     .api_version(ApiVersion::latest())
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Authenticating Requests
//!
//! The host web framework hands over the `Authorization` header and the
//! `id_token` query parameter; everything else happens here:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopify_app_auth::{Authenticator, AuthRequest, SqliteStore};
//!
//! let store = Arc::new(SqliteStore::connect("sqlite:app.db").await?);
//! let authenticator = Authenticator::new(config, store);
//!
//! let request = AuthRequest::new()
//!     .authorization(header_value)
//!     .id_token(query_param);
//!
//! let context = authenticator.authenticate(&request).await?;
//! let shop_data = context.api.graphql("query { shop { name } }", None).await?;
//! ```
//!
//! The first request from a shop performs a token exchange and persists the
//! offline session; subsequent requests authenticate locally without any
//! network call.
//!
//! ## Design Principles
//!
//! - **Explicit over implicit**: collaborators are injected, never global
//! - **Fail once, loudly**: every authentication failure is categorized and
//!   logged exactly once, then surfaced to the caller unchanged
//! - **Storage is the synchronization point**: concurrent onboarding races
//!   resolve through the store's conflict handling, not application locks

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod store;

pub use auth::{
    AccessTokenBundle, AuthContext, AuthError, AuthRequest, Authenticator, HttpTokenExchanger,
    Session, SessionReconciler, TokenClaims, TokenExchange,
};
pub use clients::{ApiClient, ApiError};
pub use config::{ApiKey, ApiSecretKey, ApiVersion, AppConfig, AppConfigBuilder, ShopDomain};
pub use error::ConfigError;
pub use store::{CredentialStore, MemoryStore, Shop, ShopDetails, SqliteStore, StoreError};

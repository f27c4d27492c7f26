//! Request authentication for embedded apps.
//!
//! This module implements the full authentication flow for requests arriving
//! from an embedded app frontend:
//!
//! - [`AuthRequest`]: the framework-agnostic credential-bearing request
//! - [`TokenClaims`]: identity token (JWT) verification
//! - [`TokenExchange`] / [`HttpTokenExchanger`]: RFC 8693 token exchange for
//!   offline access tokens
//! - [`Session`]: the durable credential record
//! - [`SessionReconciler`]: idempotent persistence of exchanged credentials
//! - [`Authenticator`]: the per-request entry point tying it all together
//! - [`AuthError`]: the categorized failure taxonomy
//!
//! # Flow
//!
//! Every inbound request carries a short-lived identity token. The
//! authenticator verifies it locally, then either serves the request from an
//! already-reconciled offline session (fast path) or performs a token
//! exchange and reconciles storage (slow path). Both paths end in an
//! [`AuthContext`] holding the session, the shop, and a ready API client.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopify_app_auth::{Authenticator, AuthRequest, MemoryStore};
//!
//! let authenticator = Authenticator::new(config, Arc::new(MemoryStore::new()));
//!
//! let request = AuthRequest::new().authorization(format!("Bearer {id_token}"));
//! let context = authenticator.authenticate(&request).await?;
//! ```

mod authenticator;
mod claims;
mod error;
mod exchange;
mod reconcile;
mod request;
pub mod session;

pub use authenticator::{AuthContext, Authenticator};
pub use claims::TokenClaims;
pub use error::AuthError;
pub use exchange::{AccessTokenBundle, HttpTokenExchanger, TokenExchange};
pub use reconcile::SessionReconciler;
pub use request::AuthRequest;
pub use session::Session;

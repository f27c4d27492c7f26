//! Session reconciliation.
//!
//! After a successful token exchange, the reconciler brings durable storage
//! in line with the freshly obtained credential: the session row is
//! upserted by id, the shop row is upserted by domain, and both are read
//! back within the same transaction scope. Replaying the same exchange
//! result converges to the same rows, so reconciliation is idempotent.
//!
//! Concurrency is handled entirely by the store's conflict resolution:
//! two reconciliations for the same shop racing each other end with one
//! caller's input per column group (last-committed-wins), never a merge.
//! No application-level mutex is taken.

use std::sync::Arc;

use crate::auth::exchange::AccessTokenBundle;
use crate::auth::{AuthError, Session};
use crate::store::{CredentialStore, Shop};

/// Orchestrates lookup-or-create of session and shop records for exchanged
/// credentials.
#[derive(Debug)]
pub struct SessionReconciler<S> {
    store: Arc<S>,
}

impl<S> Clone for SessionReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CredentialStore> SessionReconciler<S> {
    /// Creates a reconciler over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ensures durable session and shop rows exist for the exchange result
    /// and returns exactly what was committed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ReconciliationFailed`] if the store cannot
    /// complete the atomic upsert-and-read-back sequence.
    pub async fn reconcile(
        &self,
        bundle: &AccessTokenBundle,
    ) -> Result<(Session, Shop), AuthError> {
        let session = Session::offline_from_bundle(bundle);
        let (session, shop) = self.store.upsert(&session).await?;
        Ok((session, shop))
    }
}

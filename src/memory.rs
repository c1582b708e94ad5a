//! In-process identity layer.
//!
//! DESIGN
//! ======
//! `MemoryProvider` stands in for the hosted identity service: it owns the
//! session store, fans out change events, and can be scripted to fail or
//! delay the direct query. Redirect processing is driven explicitly with
//! [`MemoryProvider::complete_redirect`] so callers decide whether the
//! session lands before, during, or after the callback page's query.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::provider::{IdentityProvider, Listeners, OAuthProvider, ProviderError, Subscription};
use crate::session::{EventKind, Session, SessionChangeEvent};

/// A recorded `sign_in` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRequest {
    pub provider: OAuthProvider,
    pub redirect_to: String,
}

#[derive(Default)]
struct StoreState {
    session: Option<Session>,
    query_error: Option<String>,
    query_delay: Option<Duration>,
    subscribe_count: usize,
    sign_in_requests: Vec<SignInRequest>,
}

/// Session store plus notification channel, held in memory.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    store: Arc<Mutex<StoreState>>,
    listeners: Listeners,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose store already holds `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let provider = Self::new();
        provider.lock().session = Some(session);
        provider
    }

    /// Make the next direct query fail with `message`.
    pub fn fail_next_query(&self, message: impl Into<String>) {
        self.lock().query_error = Some(message.into());
    }

    /// Delay every direct query. The store is read when the query is issued,
    /// so a redirect completed during the delay is not reflected in its result.
    pub fn set_query_delay(&self, delay: Duration) {
        self.lock().query_delay = Some(delay);
    }

    /// Finish processing redirect-carried credentials: store the session and
    /// notify subscribers with `SIGNED_IN`.
    pub fn complete_redirect(&self, session: Session) {
        tracing::info!(user_id = %session.user.id, "redirect credentials processed");
        self.replace_and_notify(EventKind::SignedIn, Some(session));
    }

    /// Swap in a refreshed session and notify with `TOKEN_REFRESHED`.
    pub fn refresh_session(&self, session: Session) {
        self.replace_and_notify(EventKind::TokenRefreshed, Some(session));
    }

    /// Provider-side revocation: clear the store and notify with `SIGNED_OUT`.
    pub fn revoke(&self) {
        tracing::info!("session revoked by provider");
        self.replace_and_notify(EventKind::SignedOut, None);
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Total subscriptions ever created.
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.lock().subscribe_count
    }

    #[must_use]
    pub fn sign_in_requests(&self) -> Vec<SignInRequest> {
        self.lock().sign_in_requests.clone()
    }

    // Store and listener updates happen under the store lock so a concurrent
    // subscriber sees either the old session plus this event, or the new one.
    fn replace_and_notify(&self, kind: EventKind, session: Option<Session>) {
        let mut store = self.lock();
        store.session.clone_from(&session);
        let reached = self.listeners.broadcast(&SessionChangeEvent::new(kind, session));
        drop(store);
        tracing::debug!(event = %kind, listeners = reached, "session change broadcast");
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryProvider {
    async fn query_current_session(&self) -> Result<Option<Session>, ProviderError> {
        let (snapshot, delay) = {
            let mut store = self.lock();
            let snapshot = match store.query_error.take() {
                Some(message) => Err(ProviderError::Query(message)),
                None => Ok(store.session.clone()),
            };
            (snapshot, store.query_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        snapshot
    }

    async fn sign_in(&self, provider: OAuthProvider, redirect_to: &str) -> Result<(), ProviderError> {
        if !is_absolute_http_url(redirect_to) {
            return Err(ProviderError::InvalidRedirect(redirect_to.to_owned()));
        }

        tracing::info!(%provider, redirect_to, "oauth sign-in started");
        self.lock()
            .sign_in_requests
            .push(SignInRequest { provider, redirect_to: redirect_to.to_owned() });
        Ok(())
    }

    fn subscribe_session_changes(&self) -> Subscription {
        let mut store = self.lock();
        store.subscribe_count += 1;
        let initial = SessionChangeEvent::new(EventKind::InitialSession, store.session.clone());
        self.listeners.subscribe(Some(initial))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        tracing::info!("sign-out requested");
        self.replace_and_notify(EventKind::SignedOut, None);
        Ok(())
    }
}

fn is_absolute_http_url(raw: &str) -> bool {
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.starts_with('/'))
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

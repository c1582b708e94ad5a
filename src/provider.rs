//! Identity provider seam.
//!
//! ARCHITECTURE
//! ============
//! The identity layer owns the session store. This crate reads it through a
//! one-shot query and observes it through a standing subscription; it never
//! writes the store directly (sign-in and sign-out are delegated).
//!
//! Subscriptions are channel-backed. Each subscriber gets its own unbounded
//! queue registered in a [`Listeners`] map; `unsubscribe` removes the entry so
//! no further events are queued for it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::session::{Session, SessionChangeEvent};

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The direct session query failed (malformed redirect data, provider error).
    #[error("{0}")]
    Query(String),
    #[error("invalid redirect target: {0}")]
    InvalidRedirect(String),
    #[error("sign-in failed: {0}")]
    SignIn(String),
    #[error("sign-out failed: {0}")]
    SignOut(String),
}

impl ProviderError {
    /// Raw reason text, as surfaced to the viewer.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Query(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// OAUTH PROVIDER
// =============================================================================

/// External OAuth identity the viewer signs in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
        }
    }

    /// Parse a provider name (case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "google" => Some(Self::Google),
            _ => None,
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// IDENTITY PROVIDER TRAIT
// =============================================================================

/// The external identity layer, as seen by the reconciler and the guard.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Report the session currently held by the store, if any.
    ///
    /// Side-effect free. `Ok(None)` is not a failure: the provider may still
    /// be processing credentials carried by the redirect.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Query`] if the query itself failed.
    async fn query_current_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Start an OAuth sign-in that will redirect back to `redirect_to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the redirect target is rejected or the provider
    /// could not start the flow.
    async fn sign_in(&self, provider: OAuthProvider, redirect_to: &str) -> Result<(), ProviderError>;

    /// Register for every future session mutation.
    fn subscribe_session_changes(&self) -> Subscription;

    /// End the current session. All subscribers observe `SIGNED_OUT`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::SignOut`] if the provider refused.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

type Release = Box<dyn FnOnce() + Send>;

/// Handle to a session-change subscription.
///
/// Call [`Subscription::unsubscribe`] to stop delivery. A handle dropped
/// without being released is released on drop.
pub struct Subscription {
    id: Uuid,
    events: mpsc::UnboundedReceiver<SessionChangeEvent>,
    release: Option<Release>,
}

impl Subscription {
    pub fn new(
        id: Uuid,
        events: mpsc::UnboundedReceiver<SessionChangeEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self { id, events, release: Some(Box::new(release)) }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next event. `None` once the provider has gone away.
    pub async fn recv(&mut self) -> Option<SessionChangeEvent> {
        self.events.recv().await
    }

    /// Stop delivery. Events already queued are discarded with the handle.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            tracing::debug!(subscription = %self.id, "session subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("released", &self.release.is_none())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// LISTENERS
// =============================================================================

type ListenerMap = HashMap<Uuid, mpsc::UnboundedSender<SessionChangeEvent>>;

/// Fan-out registry of live subscriptions.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<Mutex<ListenerMap>>,
}

impl Listeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. `initial` is queued ahead of any broadcast.
    #[must_use]
    pub fn subscribe(&self, initial: Option<SessionChangeEvent>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(event) = initial {
            let _ = tx.send(event);
        }

        let id = Uuid::new_v4();
        lock(&self.inner).insert(id, tx);

        let registry: Weak<Mutex<ListenerMap>> = Arc::downgrade(&self.inner);
        Subscription::new(id, rx, move || {
            if let Some(inner) = registry.upgrade() {
                lock(&inner).remove(&id);
            }
        })
    }

    /// Queue `event` for every live subscriber, pruning closed ones.
    /// Returns the number of subscribers reached.
    pub fn broadcast(&self, event: &SessionChangeEvent) -> usize {
        let mut inner = lock(&self.inner);
        inner.retain(|_, tx| tx.send(event.clone()).is_ok());
        inner.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(inner: &Mutex<ListenerMap>) -> std::sync::MutexGuard<'_, ListenerMap> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;

//! Session guard for protected views.
//!
//! ARCHITECTURE
//! ============
//! Activating a guard spawns one task that owns the view's subscription. The
//! task subscribes first, then issues the direct query. Until the query
//! returns, the guard stays `Initializing` and only queues incoming session
//! changes. The first decision comes from [`GuardState::resolve`]: the query
//! result, overridden by any changes queued while it was outstanding. Later
//! changes go through [`GuardState::apply`] in arrival order.
//!
//! `INITIAL_SESSION` is never acted on here. It snapshots the store at
//! subscribe time, which is older than the query.
//!
//! LIFECYCLE
//! =========
//! `Initializing -> Authenticated | Unauthenticated`, then
//! `Authenticated -> Unauthenticated` on sign-out or revocation. Nothing
//! re-enters `Initializing`. Reaching `Unauthenticated`, or tearing the view
//! down, releases the subscription and ends the task.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::navigation::{NavigationMode, Navigator, Route};
use crate::provider::{IdentityProvider, ProviderError};
use crate::session::{EventKind, Session, SessionChangeEvent};
use crate::view::GuardView;

// =============================================================================
// STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GuardState {
    /// Direct query outstanding; render nothing, decide nothing.
    #[default]
    Initializing,
    /// Last-known session, re-synced on every notification.
    Authenticated(Session),
    Unauthenticated,
}

/// Something the guard learned about the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Query(Option<Session>),
    Event(SessionChangeEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardEffect {
    RedirectToLanding,
}

impl GuardState {
    /// First decision for an activation: the query result, then every change
    /// that arrived while the query was outstanding, in order.
    #[must_use]
    pub fn resolve(
        query: Option<Session>,
        queued: impl IntoIterator<Item = SessionChangeEvent>,
    ) -> (Self, Option<GuardEffect>) {
        let latest = queued
            .into_iter()
            .filter(|event| event.kind != EventKind::InitialSession)
            .fold(query, |_, event| event.session);
        Self::Initializing.apply(Observation::Query(latest))
    }

    /// Next state after `observation`, plus the effect to perform.
    ///
    /// Notifications are ignored until the query has decided, and
    /// `INITIAL_SESSION` is ignored always. Once decided, a repeated query
    /// result is ignored.
    #[must_use]
    pub fn apply(self, observation: Observation) -> (Self, Option<GuardEffect>) {
        let reported = match observation {
            _ if matches!(self, Self::Unauthenticated) => return (self, None),
            Observation::Event(event) if event.kind == EventKind::InitialSession => return (self, None),
            Observation::Event(_) if self.is_initializing() => return (self, None),
            Observation::Query(_) if matches!(self, Self::Authenticated(_)) => return (self, None),
            Observation::Query(session) => session,
            Observation::Event(event) => event.session,
        };

        match reported {
            Some(session) => (Self::Authenticated(session), None),
            None => (Self::Unauthenticated, Some(GuardEffect::RedirectToLanding)),
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_initializing(&self) -> bool {
        matches!(self, Self::Initializing)
    }
}

// =============================================================================
// GUARD
// =============================================================================

/// Entry point for gating a protected view.
pub struct SessionGuard;

impl SessionGuard {
    /// Start guarding a view. Must be called inside a Tokio runtime.
    pub fn activate<P, N>(provider: P, navigator: N) -> GuardHandle<P>
    where
        P: IdentityProvider + 'static,
        N: Navigator + 'static,
    {
        let provider = Arc::new(provider);
        let (state_tx, state_rx) = watch::channel(GuardState::Initializing);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(guard_loop(Arc::clone(&provider), navigator, state_tx, shutdown_rx));

        GuardHandle { provider, state: state_rx, shutdown: Some(shutdown_tx), task: Some(task) }
    }
}

async fn guard_loop<P, N>(
    provider: Arc<P>,
    navigator: N,
    state: watch::Sender<GuardState>,
    mut shutdown: oneshot::Receiver<()>,
) where
    P: IdentityProvider + ?Sized,
    N: Navigator,
{
    let mut subscription = provider.subscribe_session_changes();
    let query = provider.query_current_session();
    tokio::pin!(query);
    let mut query_done = false;
    let mut events_open = true;
    let mut queued: Vec<SessionChangeEvent> = Vec::new();

    loop {
        let (next, effect) = tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::debug!("session guard torn down");
                break;
            }
            result = &mut query, if !query_done => {
                query_done = true;
                let session = result.unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "session query failed, treating as signed out");
                    None
                });
                GuardState::resolve(session, queued.drain(..))
            }
            event = subscription.recv(), if events_open => match event {
                Some(event) if !query_done => {
                    tracing::debug!(event = %event.kind, "session change queued behind query");
                    queued.push(event);
                    continue;
                }
                Some(event) => {
                    let current = state.borrow().clone();
                    current.apply(Observation::Event(event))
                }
                None => {
                    tracing::warn!("session channel closed");
                    events_open = false;
                    if query_done {
                        break;
                    }
                    continue;
                }
            },
        };

        if effect == Some(GuardEffect::RedirectToLanding) {
            subscription.unsubscribe();
            navigator.navigate(Route::Landing, NavigationMode::Replace);
            state.send_replace(next);
            tracing::info!("no session, left protected view");
            return;
        }

        state.send_if_modified(|prev| {
            if *prev == next {
                return false;
            }
            if let (GuardState::Initializing, Some(session)) = (&*prev, next.session()) {
                tracing::info!(user_id = %session.user.id, "protected view unlocked");
            }
            *prev = next;
            true
        });
    }

    subscription.unsubscribe();
}

// =============================================================================
// HANDLE
// =============================================================================

/// Owner of an active guard. Dropping it tears the guard down.
pub struct GuardHandle<P: ?Sized> {
    provider: Arc<P>,
    state: watch::Receiver<GuardState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<P> GuardHandle<P>
where
    P: IdentityProvider + ?Sized,
{
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<GuardState> {
        self.state.clone()
    }

    #[must_use]
    pub fn view(&self) -> GuardView {
        GuardView::from(&*self.state.borrow())
    }

    /// Wait until the initial decision has been made.
    pub async fn resolved(&mut self) -> GuardState {
        if self.state.wait_for(|s| !s.is_initializing()).await.is_err() {
            tracing::debug!("session guard stopped before resolving");
        }
        self.state()
    }

    /// Ask the identity layer to end the session. The guard reacts to the
    /// resulting `SIGNED_OUT` notification like any other.
    ///
    /// # Errors
    ///
    /// Propagates the provider's sign-out error.
    pub async fn sign_out(&self) -> Result<(), ProviderError> {
        self.provider.sign_out().await
    }

    /// Release the subscription and wait for the guard task to finish.
    pub async fn teardown(mut self) {
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "session guard task failed");
            }
        }
    }
}

impl<P: ?Sized> GuardHandle<P> {
    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl<P: ?Sized> Drop for GuardHandle<P> {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

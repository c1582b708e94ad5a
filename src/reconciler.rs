//! Session reconciler for the OAuth callback page.
//!
//! ARCHITECTURE
//! ============
//! After the identity provider redirects back, two sources may report the
//! new session: the direct query issued on page load, and the session-change
//! channel once redirect credentials have been processed. The reconciler
//! turns whichever answers first into one outcome and at most one navigation.
//!
//! 1. Query. An error is terminal and nothing is subscribed. A live session
//!    resolves immediately.
//! 2. No session and no error: subscribe and wait for the first sign-in event
//!    that carries a session, optionally bounded by a timeout.
//! 3. Release the subscription, then act on what was observed.
//!
//! Every resolution goes through [`Resolution::claim`], so a second run or a
//! second sign-in event can never navigate again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::navigation::{NavigationMode, Navigator, Route};
use crate::provider::{IdentityProvider, Subscription};
use crate::session::Session;

// =============================================================================
// OUTCOME
// =============================================================================

/// Terminal failure shown on the callback page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// The direct query failed; carries the provider's reason verbatim.
    #[error("{0}")]
    Query(String),
    /// No session materialized within the configured window.
    #[error("timeout")]
    Timeout(Duration),
}

impl AuthFailure {
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Result of reconciling a post-redirect page load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthOutcome {
    #[default]
    Pending,
    Authenticated(Session),
    Failed(AuthFailure),
}

impl AuthOutcome {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// One-shot "already resolved" flag.
#[derive(Debug, Default)]
struct Resolution(AtomicBool);

impl Resolution {
    /// Returns `true` for exactly one caller.
    fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    fn is_resolved(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// =============================================================================
// RECONCILER
// =============================================================================

pub struct SessionReconciler<P, N> {
    provider: P,
    navigator: N,
    timeout: Option<Duration>,
    resolution: Resolution,
    outcome: watch::Sender<AuthOutcome>,
}

impl<P, N> SessionReconciler<P, N>
where
    P: IdentityProvider,
    N: Navigator,
{
    #[must_use]
    pub fn new(provider: P, navigator: N) -> Self {
        let (outcome, _) = watch::channel(AuthOutcome::Pending);
        Self { provider, navigator, timeout: None, resolution: Resolution::default(), outcome }
    }

    /// Bound the pending state. `None` waits for a sign-in indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Observe the outcome as it changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthOutcome> {
        self.outcome.subscribe()
    }

    #[must_use]
    pub fn outcome(&self) -> AuthOutcome {
        self.outcome.borrow().clone()
    }

    /// Reconcile the current page activation.
    ///
    /// Returns `Pending` only if the notification channel closed before any
    /// sign-in arrived and no timeout was configured.
    pub async fn run(&self) -> AuthOutcome {
        if self.resolution.is_resolved() {
            return self.outcome();
        }

        match self.provider.query_current_session().await {
            Err(err) => {
                tracing::warn!(error = %err, "auth callback query failed");
                return self.fail(AuthFailure::Query(err.message()));
            }
            Ok(Some(session)) => {
                tracing::info!(user_id = %session.user.id, "session established on first query");
                return self.authenticate(session);
            }
            Ok(None) => {
                tracing::debug!("no session yet, waiting for sign-in notification");
            }
        }

        let mut subscription = self.provider.subscribe_session_changes();
        let observed = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait_for_sign_in(&mut subscription))
                .await
                .map_err(|_| limit),
            None => Ok(wait_for_sign_in(&mut subscription).await),
        };
        subscription.unsubscribe();

        match observed {
            Ok(Some(session)) => {
                tracing::info!(user_id = %session.user.id, "session established by notification");
                self.authenticate(session)
            }
            Ok(None) => {
                tracing::warn!("session channel closed before sign-in");
                self.outcome()
            }
            Err(limit) => {
                tracing::warn!(timeout_secs = limit.as_secs_f64(), "auth callback timed out");
                self.fail(AuthFailure::Timeout(limit))
            }
        }
    }

    /// Manual escape from the failed view.
    pub fn return_home(&self) {
        self.navigator.navigate(Route::Landing, NavigationMode::Push);
    }

    fn authenticate(&self, session: Session) -> AuthOutcome {
        if self.resolution.claim() {
            self.outcome.send_replace(AuthOutcome::Authenticated(session));
            self.navigator.navigate(Route::Dashboard, NavigationMode::Push);
        }
        self.outcome()
    }

    fn fail(&self, failure: AuthFailure) -> AuthOutcome {
        if self.resolution.claim() {
            self.outcome.send_replace(AuthOutcome::Failed(failure));
        }
        self.outcome()
    }
}

/// First session carried by a sign-in event; `None` if the channel closes.
async fn wait_for_sign_in(subscription: &mut Subscription) -> Option<Session> {
    while let Some(event) = subscription.recv().await {
        if event.kind.is_sign_in() {
            if let Some(session) = event.session {
                return Some(session);
            }
        }
        tracing::debug!(event = %event.kind, "ignoring session change while pending");
    }
    None
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;

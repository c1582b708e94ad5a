use super::*;
use crate::memory::MemoryProvider;
use crate::navigation::HistoryNavigator;
use crate::provider::{Listeners, OAuthProvider, ProviderError};
use crate::session::{EventKind, SessionChangeEvent, User, UserMetadata};
use uuid::Uuid;

fn session(name: &str) -> Session {
    Session::new(
        format!("tok-{name}"),
        User {
            id: Uuid::new_v4(),
            email: Some(format!("{name}@example.com")),
            user_metadata: UserMetadata { full_name: Some(name.to_owned()), avatar_url: None },
        },
    )
}

fn reconciler(provider: &MemoryProvider) -> (SessionReconciler<MemoryProvider, HistoryNavigator>, HistoryNavigator) {
    let nav = HistoryNavigator::new();
    (SessionReconciler::new(provider.clone(), nav.clone()), nav)
}

async fn after(ms: u64, f: impl FnOnce()) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    f();
}

// =========================================================================
// ClosedChannelProvider: query reports nothing, subscription ends at once
// =========================================================================

struct ClosedChannelProvider;

#[async_trait::async_trait]
impl IdentityProvider for ClosedChannelProvider {
    async fn query_current_session(&self) -> Result<Option<Session>, ProviderError> {
        Ok(None)
    }

    async fn sign_in(&self, _provider: OAuthProvider, _redirect_to: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    fn subscribe_session_changes(&self) -> Subscription {
        let listeners = Listeners::new();
        listeners.subscribe(None)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

// =========================================================================
// Direct query paths
// =========================================================================

#[tokio::test]
async fn live_session_on_first_query_navigates_once() {
    let s = session("ada");
    let provider = MemoryProvider::with_session(s.clone());
    let (r, nav) = reconciler(&provider);

    let outcome = r.run().await;

    assert_eq!(outcome, AuthOutcome::Authenticated(s));
    assert_eq!(nav.history(), vec![(Route::Dashboard, NavigationMode::Push)]);
    assert_eq!(provider.subscribe_count(), 0);
}

#[tokio::test]
async fn query_error_is_terminal_and_never_subscribes() {
    let provider = MemoryProvider::new();
    provider.fail_next_query("Invalid login credentials");
    let (r, nav) = reconciler(&provider);

    let outcome = r.run().await;

    assert_eq!(outcome, AuthOutcome::Failed(AuthFailure::Query("Invalid login credentials".into())));
    assert_eq!(provider.subscribe_count(), 0);
    assert_eq!(provider.listener_count(), 0);
    assert!(nav.history().is_empty());
}

#[tokio::test]
async fn rerun_after_failure_keeps_outcome_without_requerying() {
    let provider = MemoryProvider::new();
    provider.fail_next_query("bad state");
    let (r, _nav) = reconciler(&provider);

    let first = r.run().await;
    let second = r.run().await;

    assert_eq!(first, second);
    assert_eq!(provider.subscribe_count(), 0);
}

// =========================================================================
// Notification paths
// =========================================================================

#[tokio::test]
async fn no_session_then_signed_in_authenticates() {
    let provider = MemoryProvider::new();
    let (r, nav) = reconciler(&provider);
    let s = session("ada");

    let (outcome, ()) = tokio::join!(r.run(), after(10, || provider.complete_redirect(s.clone())));

    assert_eq!(outcome, AuthOutcome::Authenticated(s));
    assert_eq!(nav.visits(Route::Dashboard), 1);
    assert_eq!(provider.subscribe_count(), 1);
    assert_eq!(provider.listener_count(), 0);
}

#[tokio::test]
async fn sign_in_landing_during_query_is_caught_on_subscribe() {
    let provider = MemoryProvider::new();
    provider.set_query_delay(Duration::from_millis(40));
    let (r, nav) = reconciler(&provider);
    let s = session("ada");

    let (outcome, ()) = tokio::join!(r.run(), after(5, || provider.complete_redirect(s.clone())));

    assert_eq!(outcome, AuthOutcome::Authenticated(s));
    assert_eq!(nav.visits(Route::Dashboard), 1);
    assert_eq!(provider.listener_count(), 0);
}

#[tokio::test]
async fn repeated_sign_in_events_navigate_once() {
    let provider = MemoryProvider::new();
    let (r, nav) = reconciler(&provider);

    let (outcome, ()) = tokio::join!(
        r.run(),
        after(10, || {
            provider.complete_redirect(session("ada"));
            provider.complete_redirect(session("ada"));
        })
    );

    assert!(matches!(outcome, AuthOutcome::Authenticated(_)));
    assert_eq!(nav.visits(Route::Dashboard), 1);
}

#[tokio::test]
async fn non_sign_in_events_are_ignored_while_pending() {
    let provider = MemoryProvider::new();
    let (r, nav) = reconciler(&provider);
    let mut rx = r.watch();
    let s = session("ada");

    let (outcome, ()) = tokio::join!(r.run(), async {
        after(5, || provider.refresh_session(session("stale"))).await;
        after(5, || provider.revoke()).await;
        assert!(rx.borrow_and_update().is_pending());
        assert!(nav.history().is_empty());
        after(5, || provider.complete_redirect(s.clone())).await;
    });

    assert_eq!(outcome, AuthOutcome::Authenticated(s));
    assert_eq!(nav.visits(Route::Dashboard), 1);
}

#[tokio::test]
async fn wait_for_sign_in_skips_events_without_session() {
    let listeners = Listeners::new();
    let mut sub = listeners.subscribe(Some(SessionChangeEvent::new(EventKind::InitialSession, None)));
    let s = session("ada");
    listeners.broadcast(&SessionChangeEvent::new(EventKind::SignedIn, None));
    listeners.broadcast(&SessionChangeEvent::new(EventKind::TokenRefreshed, Some(session("other"))));
    listeners.broadcast(&SessionChangeEvent::new(EventKind::SignedIn, Some(s.clone())));

    assert_eq!(wait_for_sign_in(&mut sub).await, Some(s));
}

#[tokio::test]
async fn watch_reports_pending_then_authenticated() {
    let provider = MemoryProvider::new();
    let (r, _nav) = reconciler(&provider);
    let rx = r.watch();
    let s = session("ada");

    let ((), ()) = tokio::join!(
        async {
            r.run().await;
        },
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(*rx.borrow(), AuthOutcome::Pending);
            provider.complete_redirect(s.clone());
        }
    );

    assert_eq!(*rx.borrow(), AuthOutcome::Authenticated(s));
}

// =========================================================================
// Timeout
// =========================================================================

#[tokio::test]
async fn timeout_fails_and_releases_subscription() {
    let provider = MemoryProvider::new();
    let (r, nav) = reconciler(&provider);
    let r = r.with_timeout(Some(Duration::from_millis(20)));

    let outcome = r.run().await;

    assert_eq!(outcome, AuthOutcome::Failed(AuthFailure::Timeout(Duration::from_millis(20))));
    assert_eq!(AuthFailure::Timeout(Duration::from_millis(20)).reason(), "timeout");
    assert_eq!(provider.listener_count(), 0);

    provider.complete_redirect(session("late"));
    tokio::task::yield_now().await;
    assert!(nav.history().is_empty());
    assert!(matches!(r.outcome(), AuthOutcome::Failed(AuthFailure::Timeout(_))));
}

#[tokio::test]
async fn sign_in_before_timeout_wins() {
    let provider = MemoryProvider::new();
    let (r, nav) = reconciler(&provider);
    let r = r.with_timeout(Some(Duration::from_millis(200)));
    let s = session("ada");

    let (outcome, ()) = tokio::join!(r.run(), after(10, || provider.complete_redirect(s.clone())));

    assert_eq!(outcome, AuthOutcome::Authenticated(s));
    assert_eq!(nav.visits(Route::Dashboard), 1);
}

// =========================================================================
// Exactly-once across runs
// =========================================================================

#[tokio::test]
async fn concurrent_runs_navigate_once() {
    let provider = MemoryProvider::with_session(session("ada"));
    let (r, nav) = reconciler(&provider);

    let (a, b) = tokio::join!(r.run(), r.run());

    assert_eq!(a, b);
    assert!(matches!(a, AuthOutcome::Authenticated(_)));
    assert_eq!(nav.visits(Route::Dashboard), 1);
}

#[tokio::test]
async fn closed_channel_leaves_outcome_pending() {
    let nav = HistoryNavigator::new();
    let r = SessionReconciler::new(ClosedChannelProvider, nav.clone());

    assert_eq!(r.run().await, AuthOutcome::Pending);
    assert!(nav.history().is_empty());
}

#[tokio::test]
async fn return_home_navigates_to_landing() {
    let provider = MemoryProvider::new();
    provider.fail_next_query("oops");
    let (r, nav) = reconciler(&provider);

    r.run().await;
    r.return_home();

    assert_eq!(nav.history(), vec![(Route::Landing, NavigationMode::Push)]);
}

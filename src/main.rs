use std::time::Duration;

use djwya::config::AuthConfig;
use djwya::guard::{GuardState, SessionGuard};
use djwya::login::SignInButton;
use djwya::memory::MemoryProvider;
use djwya::navigation::HistoryNavigator;
use djwya::reconciler::SessionReconciler;
use djwya::session::{Session, User, UserMetadata};
use djwya::view::{CallbackView, GuardView};

/// Walk the sign-in flow end to end against the in-memory identity layer.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AuthConfig::from_env()?;
    let provider = MemoryProvider::new();
    let navigator = HistoryNavigator::new();

    SignInButton::new().click(&provider, &config).await?;

    // The provider finishes processing the redirect a moment after the
    // callback page has already queried.
    let redirect = {
        let provider = provider.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            provider.complete_redirect(demo_session());
        })
    };

    let reconciler =
        SessionReconciler::new(provider.clone(), navigator.clone()).with_timeout(config.callback_timeout);
    let outcome = reconciler.run().await;
    redirect.await?;

    let callback = CallbackView::from(&outcome);
    tracing::info!(headline = callback.headline(), detail = callback.detail(), "callback page");

    let mut guard = SessionGuard::activate(provider.clone(), navigator.clone());
    if let GuardState::Authenticated(_) = guard.resolved().await {
        if let GuardView::Protected(dashboard) = guard.view() {
            tracing::info!(
                welcome = %dashboard.welcome(),
                avatar = dashboard.avatar_url.as_deref().unwrap_or("-"),
                "dashboard"
            );
        }
        guard.sign_out().await?;
        let mut state = guard.watch();
        state.wait_for(|s| *s == GuardState::Unauthenticated).await.ok();
    }
    guard.teardown().await;

    let trail: Vec<&str> = navigator.history().iter().map(|(route, _)| route.path()).collect();
    tracing::info!(?trail, "navigation history");
    Ok(())
}

fn demo_session() -> Session {
    Session::new(
        "demo-access-token",
        User {
            id: uuid::Uuid::new_v4(),
            email: Some("raver@djwya.app".into()),
            user_metadata: UserMetadata { full_name: Some("Demo Raver".into()), avatar_url: None },
        },
    )
}

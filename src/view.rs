//! Render models for the callback and dashboard pages.
//!
//! These carry the text and optional pieces each page shows so the UI layer
//! stays a pure projection of auth state.

use crate::guard::GuardState;
use crate::navigation::Route;
use crate::reconciler::AuthOutcome;
use crate::session::Session;

// =============================================================================
// CALLBACK PAGE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackView {
    Authenticating,
    /// Also shown briefly while the dashboard navigation takes over.
    Redirecting,
    Failed { reason: String },
}

impl CallbackView {
    #[must_use]
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Authenticating => "Authenticating...",
            Self::Redirecting => "Signed in",
            Self::Failed { .. } => "Authentication Failed",
        }
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Authenticating => "Connecting to your DJWYA profile.",
            Self::Redirecting => "Taking you to your dashboard.",
            Self::Failed { reason } => reason.as_str(),
        }
    }

    /// Manual escape offered with a failure: label and destination.
    #[must_use]
    pub fn escape_action(&self) -> Option<(&'static str, Route)> {
        match self {
            Self::Failed { .. } => Some(("Return Home", Route::Landing)),
            _ => None,
        }
    }
}

impl From<&AuthOutcome> for CallbackView {
    fn from(outcome: &AuthOutcome) -> Self {
        match outcome {
            AuthOutcome::Pending => Self::Authenticating,
            AuthOutcome::Authenticated(_) => Self::Redirecting,
            AuthOutcome::Failed(failure) => Self::Failed { reason: failure.reason() },
        }
    }
}

// =============================================================================
// DASHBOARD
// =============================================================================

pub const DASHBOARD_TAGLINE: &str = "Ravers Elite";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub display_name: String,
    /// Rendered only when present.
    pub avatar_url: Option<String>,
    pub tagline: &'static str,
}

impl DashboardView {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            display_name: session.user.display_name(),
            avatar_url: session.user.avatar_url().map(str::to_owned),
            tagline: DASHBOARD_TAGLINE,
        }
    }

    #[must_use]
    pub fn welcome(&self) -> String {
        format!("Welcome back, {}", self.display_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    /// Neutral spinner; no content and no redirect decision yet.
    Loading,
    Protected(DashboardView),
    Redirecting,
}

impl From<&GuardState> for GuardView {
    fn from(state: &GuardState) -> Self {
        match state {
            GuardState::Initializing => Self::Loading,
            GuardState::Authenticated(session) => Self::Protected(DashboardView::from_session(session)),
            GuardState::Unauthenticated => Self::Redirecting,
        }
    }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;

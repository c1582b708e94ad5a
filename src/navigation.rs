//! Client-side routes and the navigation seam.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Fixed routes the auth flow moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Public landing page.
    Landing,
    /// The only route the identity provider redirects back to.
    AuthCallback,
    /// Protected destination.
    Dashboard,
}

impl Route {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::AuthCallback => "/auth/callback",
            Self::Dashboard => "/dashboard",
        }
    }

    /// Absolute URL for this route under `origin` (no trailing slash expected).
    #[must_use]
    pub fn absolute_url(self, origin: &str) -> String {
        format!("{}{}", origin.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// History behaviour for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// Add a history entry.
    Push,
    /// Replace the current entry so "back" cannot return to it.
    Replace,
}

/// Router abstraction. Navigation is fire-and-forget.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route, mode: NavigationMode);
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate(&self, route: Route, mode: NavigationMode) {
        (**self).navigate(route, mode);
    }
}

// =============================================================================
// HISTORY NAVIGATOR
// =============================================================================

/// Headless navigator that logs and records every navigation.
#[derive(Debug, Clone, Default)]
pub struct HistoryNavigator {
    history: Arc<Mutex<Vec<(Route, NavigationMode)>>>,
}

impl HistoryNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every navigation so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<(Route, NavigationMode)> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How many times `route` was navigated to.
    #[must_use]
    pub fn visits(&self, route: Route) -> usize {
        self.history().iter().filter(|(r, _)| *r == route).count()
    }

    #[must_use]
    pub fn current(&self) -> Option<Route> {
        self.history().last().map(|(r, _)| *r)
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, route: Route, mode: NavigationMode) {
        tracing::info!(%route, ?mode, "navigate");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((route, mode));
    }
}

#[cfg(test)]
#[path = "navigation_test.rs"]
mod tests;

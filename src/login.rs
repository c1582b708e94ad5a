//! "Continue with Google" action on the landing page.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::AuthConfig;
use crate::provider::{IdentityProvider, ProviderError};

/// Sign-in button state. Clicks while a sign-in is in flight are ignored.
#[derive(Debug, Default)]
pub struct SignInButton {
    in_flight: AtomicBool,
}

impl SignInButton {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        if self.is_disabled() { "Connecting..." } else { "Continue with Google" }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start the OAuth flow, redirecting back to the callback route.
    ///
    /// Returns `Ok(false)` if a sign-in was already in flight.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the flow could not be started. The
    /// button is re-enabled either way.
    pub async fn click<P>(&self, provider: &P, config: &AuthConfig) -> Result<bool, ProviderError>
    where
        P: IdentityProvider + ?Sized,
    {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        let redirect_to = config.callback_url();
        let result = provider.sign_in(config.oauth_provider, &redirect_to).await;
        self.in_flight.store(false, Ordering::Release);

        match result {
            Ok(()) => Ok(true),
            Err(err) => {
                tracing::error!(error = %err, provider = %config.oauth_provider, "sign-in failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "login_test.rs"]
mod tests;

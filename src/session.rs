//! Session and session-change event types.
//!
//! DESIGN
//! ======
//! Field names mirror the identity provider's JSON payloads so sessions and
//! events deserialize without adapters. A session is opaque to this crate:
//! the access token is carried but never parsed, and `Debug` redacts it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// SESSION
// =============================================================================

/// A live, provider-issued session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer credential. Never inspected here.
    pub access_token: String,
    /// Expiry in seconds since the Unix epoch, managed by the provider.
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Identity the session belongs to.
    pub user: User,
}

impl Session {
    #[must_use]
    pub fn new(access_token: impl Into<String>, user: User) -> Self {
        Self { access_token: access_token.into(), expires_at: None, user }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Account identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Profile fields copied from the OAuth identity (Google sign-in).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl User {
    /// Name shown in the dashboard header.
    ///
    /// Falls back from the profile's full name to the email address, then to
    /// the account id. Blank values count as missing.
    #[must_use]
    pub fn display_name(&self) -> String {
        non_blank(self.user_metadata.full_name.as_deref())
            .or_else(|| non_blank(self.email.as_deref()))
            .map_or_else(|| self.id.to_string(), str::to_owned)
    }

    /// Avatar reference, if the profile carries a non-blank one.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        non_blank(self.user_metadata.avatar_url.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// SESSION CHANGE EVENTS
// =============================================================================

/// Kind of session mutation reported by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Delivered once to each new subscriber with the current session.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl EventKind {
    /// Whether this kind reports that a viewer is signed in.
    ///
    /// `INITIAL_SESSION` counts: it carries whatever the store held when the
    /// subscription was registered, which may be a session established
    /// between a negative direct query and the subscribe call.
    #[must_use]
    pub fn is_sign_in(self) -> bool {
        matches!(self, Self::SignedIn | Self::InitialSession)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered on the session-change channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChangeEvent {
    #[serde(rename = "event")]
    pub kind: EventKind,
    pub session: Option<Session>,
}

impl SessionChangeEvent {
    #[must_use]
    pub fn new(kind: EventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    /// The session carried by a sign-in event, if any.
    #[must_use]
    pub fn signed_in_session(&self) -> Option<&Session> {
        if self.kind.is_sign_in() { self.session.as_ref() } else { None }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

//! # djwya
//!
//! Session acquisition for the DJWYA web client: the OAuth callback
//! reconciler, the session guard that gates the dashboard, and the sign-in
//! action on the landing page.
//!
//! The identity layer itself is external. This crate only talks to it
//! through the [`provider::IdentityProvider`] trait; [`memory::MemoryProvider`]
//! is an in-process implementation used by the tests and the demo binary.

pub mod config;
pub mod guard;
pub mod login;
pub mod memory;
pub mod navigation;
pub mod provider;
pub mod reconciler;
pub mod session;
pub mod view;

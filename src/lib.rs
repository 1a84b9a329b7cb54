//! Google Drive access facade.
//!
//! This crate wraps Google OAuth2 sign-in and a minimal slice of the Drive
//! v3 REST API, scoped to `drive.file`:
//! - An explicit [`session::DriveSession`] that obtains a bearer token
//!   through an injected [`auth::TokenProvider`] and caches it in memory
//! - A [`client::DriveClient`] issuing four authenticated operations:
//!   find-by-name, create JSON file, read content, overwrite content
//!
//! # Design Principles
//! - Session as a value: no ambient global authentication state
//! - Provider decoupling: token acquisition is an async request/response
//!   contract, not a callback convention
//! - Pass-through errors: no retries, no refresh; every failure surfaces
//!   to the immediate caller
//! - Opaque content: file bodies are plain strings, never parsed

pub mod auth;
pub mod client;
pub mod error;
pub mod session;

pub use auth::{
    AuthCode, AuthCodeFlow, AuthConfig, ConsentBroker, ConsentPrompt, OAuthCodeProvider,
    TokenProvider,
};
pub use client::{DriveClient, DriveEndpoints, DriveFile};
pub use error::{Error, Result};
pub use session::{DriveSession, SessionEvent, SessionState};

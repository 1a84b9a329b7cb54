//! Sign-in session: token cache, state machine, and notifications.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::auth::{ConsentPrompt, TokenProvider};
use crate::error::{Error, Result};

/// Capacity of the notification channel; events are droppable UI hints.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Authentication state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    Authenticating,
    SignedIn,
    /// A resting state: `sign_in` may be retried from here.
    SignInFailed,
}

/// Notifications emitted for integrating UI.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SignedIn,
    SignInError(String),
}

struct SessionInner {
    token: Option<String>,
    state: SessionState,
    /// Set once a sign-in has succeeded with explicit consent; later
    /// sign-ins re-authorize silently.
    consented: bool,
}

/// An authentication session over a [`TokenProvider`].
///
/// Owns the cached bearer token for its lifetime; construct, sign in, hand
/// to a [`DriveClient`](crate::client::DriveClient), drop when done. One
/// live token per session, no persistence, no automatic refresh: an expired
/// token surfaces as an HTTP error from the next Drive call.
pub struct DriveSession {
    provider: Arc<dyn TokenProvider>,
    inner: RwLock<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl DriveSession {
    /// Create a signed-out session backed by the given provider.
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            provider,
            inner: RwLock::new(SessionInner {
                token: None,
                state: SessionState::SignedOut,
                consented: false,
            }),
            events,
        }
    }

    /// Run the sign-in flow and cache the resulting token.
    ///
    /// The first successful flow requires explicit consent; subsequent
    /// calls request silent re-authorization. Safe to retry after failure.
    ///
    /// # Errors
    /// - Provider failure (consent denied, flow error); the token is
    ///   cleared and the session rests in `SignInFailed`.
    pub async fn sign_in(&self) -> Result<String> {
        let prompt = {
            let mut inner = self.inner.write().await;
            inner.state = SessionState::Authenticating;
            if inner.consented {
                ConsentPrompt::Silent
            } else {
                ConsentPrompt::Consent
            }
        };

        // Lock released while the provider runs: the flow may block on
        // user interaction for an unbounded time.
        match self.provider.request_token(prompt).await {
            Ok(token) => {
                let mut inner = self.inner.write().await;
                inner.token = Some(token.clone());
                inner.consented = true;
                inner.state = SessionState::SignedIn;
                drop(inner);

                tracing::info!("Drive sign-in succeeded");
                let _ = self.events.send(SessionEvent::SignedIn);
                Ok(token)
            }
            Err(err) => {
                let mut inner = self.inner.write().await;
                inner.token = None;
                inner.state = SessionState::SignInFailed;
                drop(inner);

                tracing::warn!(error = %err, "Drive sign-in failed");
                let _ = self.events.send(SessionEvent::SignInError(err.to_string()));
                Err(err)
            }
        }
    }

    /// Whether a token is currently cached.
    pub async fn is_signed_in(&self) -> bool {
        self.inner.read().await.token.is_some()
    }

    /// The cached bearer token, if any.
    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.token.clone()
    }

    /// Current authentication state.
    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    /// Subscribe to sign-in notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Cached token or [`Error::AuthenticationRequired`].
    pub(crate) async fn require_token(&self) -> Result<String> {
        self.access_token().await.ok_or(Error::AuthenticationRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider that records the prompts it was asked with.
    struct RecordingProvider {
        prompts: Mutex<Vec<ConsentPrompt>>,
        fail: bool,
    }

    impl RecordingProvider {
        fn new(fail: bool) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl TokenProvider for RecordingProvider {
        async fn request_token(&self, prompt: ConsentPrompt) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt);
            if self.fail {
                Err(Error::Provider("access denied".to_string()))
            } else {
                Ok("token-123".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_sign_in_caches_token() {
        let session = DriveSession::new(Arc::new(RecordingProvider::new(false)));

        assert!(!session.is_signed_in().await);
        assert_eq!(session.state().await, SessionState::SignedOut);

        let token = session.sign_in().await.unwrap();

        assert_eq!(token, "token-123");
        assert!(session.is_signed_in().await);
        assert_eq!(session.access_token().await.as_deref(), Some("token-123"));
        assert_eq!(session.state().await, SessionState::SignedIn);
    }

    #[tokio::test]
    async fn test_second_sign_in_is_silent() {
        let provider = Arc::new(RecordingProvider::new(false));
        let session = DriveSession::new(provider.clone());

        session.sign_in().await.unwrap();
        session.sign_in().await.unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(
            *prompts,
            vec![ConsentPrompt::Consent, ConsentPrompt::Silent]
        );
    }

    #[tokio::test]
    async fn test_sign_in_failure_clears_token() {
        let session = DriveSession::new(Arc::new(RecordingProvider::new(true)));

        let err = session.sign_in().await.unwrap_err();

        assert!(matches!(err, Error::Provider(_)));
        assert!(!session.is_signed_in().await);
        assert_eq!(session.state().await, SessionState::SignInFailed);
    }

    #[tokio::test]
    async fn test_failed_sign_in_reprompts_for_consent() {
        let provider = Arc::new(RecordingProvider::new(true));
        let session = DriveSession::new(provider.clone());

        let _ = session.sign_in().await;
        let _ = session.sign_in().await;

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(
            *prompts,
            vec![ConsentPrompt::Consent, ConsentPrompt::Consent]
        );
    }

    #[tokio::test]
    async fn test_signed_in_event_emitted() {
        let session = DriveSession::new(Arc::new(RecordingProvider::new(false)));
        let mut events = session.subscribe();

        session.sign_in().await.unwrap();

        let event = events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::SignedIn));
    }

    #[tokio::test]
    async fn test_sign_in_error_event_emitted() {
        let session = DriveSession::new(Arc::new(RecordingProvider::new(true)));
        let mut events = session.subscribe();

        let _ = session.sign_in().await;

        match events.recv().await.unwrap() {
            SessionEvent::SignInError(message) => {
                assert!(message.contains("access denied"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

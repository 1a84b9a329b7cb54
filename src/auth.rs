//! OAuth2 authorization flow and the token provider contract.

use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use std::sync::Arc;

use crate::error::{Error, Result};

/// OAuth2 client ID for the Drive API.
const GOOGLE_CLIENT_ID: &str = "YOUR_CLIENT_ID";
/// OAuth2 client secret (note: in production, this should be securely managed).
const GOOGLE_CLIENT_SECRET: &str = "YOUR_CLIENT_SECRET";
/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Redirect URL for the OAuth2 callback (localhost for desktop apps).
const REDIRECT_URL: &str = "http://localhost:8080/callback";

/// Drive scope limited to files this application created or opened.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Whether the authorization request must show the consent screen.
///
/// The first sign-in of a session requires explicit consent; later
/// sign-ins re-authorize silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentPrompt {
    Consent,
    Silent,
}

/// Asynchronous token source for a [`DriveSession`](crate::session::DriveSession).
///
/// Replaces provider-specific callback conventions with a plain
/// request/response contract: the session asks for a token and receives
/// either a bearer token string or a structured error.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a bearer access token, prompting the user when required.
    async fn request_token(&self, prompt: ConsentPrompt) -> Result<String>;
}

/// Configuration for the OAuth2 authorization-code flow.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Client ID (can be overridden from default).
    pub client_id: String,
    /// Client secret (can be overridden from default).
    pub client_secret: String,
    /// Redirect URL for the OAuth2 callback.
    pub redirect_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: GOOGLE_CLIENT_ID.to_string(),
            client_secret: GOOGLE_CLIENT_SECRET.to_string(),
            redirect_url: REDIRECT_URL.to_string(),
        }
    }
}

/// Authorization response delivered back to the application's redirect
/// handler: the code to exchange plus the echoed CSRF state.
#[derive(Debug, Clone)]
pub struct AuthCode {
    pub code: String,
    pub state: String,
}

/// Presents an authorization URL to the user and returns the redirect result.
///
/// How the URL is shown (browser, embedded view) and how the redirect is
/// captured (local listener, manual paste) is up to the application.
#[async_trait]
pub trait ConsentBroker: Send + Sync {
    async fn obtain_code(&self, auth_url: &str) -> Result<AuthCode>;
}

/// OAuth2 authorization-code flow against Google's endpoints.
pub struct AuthCodeFlow {
    client: BasicClient,
    config: AuthConfig,
}

impl AuthCodeFlow {
    /// Create a new flow.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            Some(
                TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone())
                .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
        );

        Ok(Self { client, config })
    }

    /// Create with compiled-in defaults.
    pub fn with_defaults() -> Result<Self> {
        Self::new(AuthConfig::default())
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Returns the URL and the CSRF state that must match on callback.
    pub fn authorization_url(&self, prompt: ConsentPrompt) -> (String, String) {
        let request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()));

        let request = match prompt {
            ConsentPrompt::Consent => request.add_extra_param("prompt", "consent"),
            ConsentPrompt::Silent => request.add_extra_param("prompt", "none"),
        };

        let (auth_url, csrf_token) = request.url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    /// - Invalid or expired authorization code
    /// - Network errors reaching the token endpoint
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        use oauth2::reqwest::async_http_client;

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Provider(format!("Token exchange failed: {}", e)))?;

        Ok(token_result.access_token().secret().clone())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

/// [`TokenProvider`] that composes the authorization-code flow with a
/// [`ConsentBroker`], verifying the CSRF state before exchanging the code.
pub struct OAuthCodeProvider {
    flow: AuthCodeFlow,
    broker: Arc<dyn ConsentBroker>,
}

impl OAuthCodeProvider {
    pub fn new(flow: AuthCodeFlow, broker: Arc<dyn ConsentBroker>) -> Self {
        Self { flow, broker }
    }
}

#[async_trait]
impl TokenProvider for OAuthCodeProvider {
    async fn request_token(&self, prompt: ConsentPrompt) -> Result<String> {
        let (auth_url, csrf_state) = self.flow.authorization_url(prompt);

        let auth_code = self.broker.obtain_code(&auth_url).await?;

        if auth_code.state != csrf_state {
            return Err(Error::Provider(
                "Authorization state mismatch (possible CSRF)".to_string(),
            ));
        }

        self.flow.exchange_code(&auth_code.code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            client_id: "test_id".to_string(),
            client_secret: "test_secret".to_string(),
            redirect_url: "http://localhost:8080/callback".to_string(),
        }
    }

    #[test]
    fn test_auth_config_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.redirect_url, REDIRECT_URL);
        assert!(!config.client_id.is_empty());
    }

    #[test]
    fn test_flow_creation() {
        let flow = AuthCodeFlow::new(test_config()).unwrap();
        assert_eq!(flow.config().client_id, "test_id");
    }

    #[test]
    fn test_authorization_url_with_consent() {
        let flow = AuthCodeFlow::new(test_config()).unwrap();
        let (url, state) = flow.authorization_url(ConsentPrompt::Consent);

        assert!(url.contains("accounts.google.com"));
        assert!(url.contains("client_id=test_id"));
        assert!(url.contains("scope="));
        assert!(url.contains("prompt=consent"));
        assert!(!state.is_empty());
    }

    #[test]
    fn test_authorization_url_silent() {
        let flow = AuthCodeFlow::new(test_config()).unwrap();
        let (url, _) = flow.authorization_url(ConsentPrompt::Silent);

        assert!(url.contains("prompt=none"));
        assert!(!url.contains("prompt=consent"));
    }

    #[test]
    fn test_state_is_random_per_request() {
        let flow = AuthCodeFlow::new(test_config()).unwrap();
        let (_, first) = flow.authorization_url(ConsentPrompt::Consent);
        let (_, second) = flow.authorization_url(ConsentPrompt::Consent);
        assert_ne!(first, second);
    }

    struct FixedBroker {
        state: String,
    }

    #[async_trait]
    impl ConsentBroker for FixedBroker {
        async fn obtain_code(&self, _auth_url: &str) -> Result<AuthCode> {
            Ok(AuthCode {
                code: "code".to_string(),
                state: self.state.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_provider_rejects_state_mismatch() {
        let flow = AuthCodeFlow::new(test_config()).unwrap();
        let provider = OAuthCodeProvider::new(
            flow,
            Arc::new(FixedBroker {
                state: "stale".to_string(),
            }),
        );

        let err = provider
            .request_token(ConsentPrompt::Consent)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider(_)));
        assert!(err.to_string().contains("state mismatch"));
    }
}

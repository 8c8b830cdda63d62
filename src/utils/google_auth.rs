// The `google_auth` module obtains bearer credentials for the Gmail API and
// builds the authenticated Gmail hub.

use async_trait::async_trait;
use google_gmail1::{
    Gmail,
    common::GetToken,
    yup_oauth2::{
        self, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
        authenticator_delegate::InstalledFlowDelegate,
    },
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::Client, client::legacy::connect::HttpConnector, rt::TokioExecutor,
};
use rustls::crypto::{CryptoProvider, ring::default_provider};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A type alias for the HTTPS connector.
pub type HttpsConnectorType = HttpsConnector<HttpConnector>;
/// A type alias for the authenticator.
pub type AuthType = yup_oauth2::authenticator::Authenticator<HttpsConnectorType>;
/// A type alias for the Gmail hub.
pub type GmailHubType = Gmail<HttpsConnectorType>;

/// The `AuthError` enum defines the possible errors that can occur during authentication.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The OAuth client secret could not be read.
    #[error("Missing or unreadable OAuth client secret at {path}: {source}")]
    MissingCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The authenticator could not be built.
    #[error("Failed to build the OAuth authenticator: {0}")]
    Authenticator(String),
    /// Fetching or refreshing the token failed (expired, revoked, network).
    #[error("Failed to obtain an access token: {0}")]
    Token(String),
    /// The provider answered without an access token.
    #[error("The authorization server returned no access token")]
    NoToken,
    /// The HTTPS transport could not be set up.
    #[error("Failed to set up the HTTPS transport: {0}")]
    Transport(String),
}

/// The `GConf` struct holds the configuration for Google authentication.
#[derive(Clone, Debug)]
pub struct GConf(Arc<InnerConf>);

/// The inner configuration for `GConf`.
#[derive(Clone, Debug)]
pub struct InnerConf {
    /// The path to the `credential.json` file.
    pub credentials_path: PathBuf,
    /// The path to the `token.json` file.
    pub token_path: PathBuf,
}

impl GConf {
    /// Creates a new `GConf`.
    pub fn new(credentials_path: PathBuf, token_path: PathBuf) -> GConf {
        GConf(Arc::new(InnerConf {
            credentials_path,
            token_path,
        }))
    }

    pub fn credentials_path(&self) -> &PathBuf {
        &self.0.credentials_path
    }

    pub fn token_path(&self) -> &PathBuf {
        &self.0.token_path
    }
}

/// Source of bearer tokens for the mail service.
///
/// The Gmail hub asks for a token before every request; implementations hand
/// back a currently valid one, refreshing it if needed.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns a valid access token for `scopes`.
    async fn valid_token(&self, scopes: &[String]) -> Result<String, AuthError>;
}

/// A provider that always returns the same token.
///
/// Used when a token was issued out of band, and by tests.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn valid_token(&self, _scopes: &[String]) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

/// Interactive installed-app OAuth flow with tokens persisted to disk.
///
/// Token fetch and refresh happen under an exclusive lock, so concurrent
/// callers never refresh and persist the same token twice.
pub struct OAuthCredentialProvider {
    auth: Mutex<AuthType>,
}

impl OAuthCredentialProvider {
    /// Reads the client secret and builds the authenticator. The browser is
    /// only opened later, on the first token request without a stored token.
    pub async fn new(conf: &GConf) -> Result<Self, AuthError> {
        info!(credentials = %conf.credentials_path().display(), "Loading OAuth client secret");
        let secret = yup_oauth2::read_application_secret(conf.credentials_path())
            .await
            .map_err(|source| AuthError::MissingCredentials {
                path: conf.credentials_path().clone(),
                source,
            })?;

        let auth =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .persist_tokens_to_disk(conf.token_path())
                .flow_delegate(Box::new(BrowserFlowDelegate))
                .build()
                .await
                .map_err(|e| AuthError::Authenticator(e.to_string()))?;

        Ok(Self {
            auth: Mutex::new(auth),
        })
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentialProvider {
    async fn valid_token(&self, scopes: &[String]) -> Result<String, AuthError> {
        let auth = self.auth.lock().await;
        let token = auth
            .token(scopes)
            .await
            .map_err(|e| AuthError::Token(e.to_string()))?;
        token
            .token()
            .map(str::to_string)
            .ok_or(AuthError::NoToken)
    }
}

/// Opens the consent page in the default browser.
#[derive(Clone, Copy)]
pub struct BrowserFlowDelegate;

impl InstalledFlowDelegate for BrowserFlowDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            info!("Opening the browser to authorize Gmail access");
            if let Err(e) = webbrowser::open(url) {
                warn!(error = %e, "Could not open a browser");
            }
            eprintln!("If the browser did not open, visit this URL to authorize:\n{url}");
            if !need_code {
                return Ok(String::new());
            }
            eprintln!("Paste the authorization code here:");
            let mut code = String::new();
            match BufReader::new(tokio::io::stdin()).read_line(&mut code).await {
                Ok(_) => Ok(code.trim().to_string()),
                Err(e) => Err(e.to_string()),
            }
        })
    }
}

/// Adapts a [`CredentialProvider`] to the token hook of the Google API hub.
#[derive(Clone)]
pub struct HubCredentials(pub Arc<dyn CredentialProvider>);

impl GetToken for HubCredentials {
    fn get_token<'a>(
        &'a self,
        scopes: &'a [&str],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>>
                + Send
                + 'a,
        >,
    > {
        Box::pin(async move {
            let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
            debug!(?scopes, "Hub requested an access token");
            match self.0.valid_token(&scopes).await {
                Ok(token) => Ok(Some(token)),
                Err(e) => Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            }
        })
    }
}

/// Builds a Gmail hub whose requests are authorized by `credentials`.
pub fn gmail_hub(credentials: Arc<dyn CredentialProvider>) -> Result<GmailHubType, AuthError> {
    // Initialize the crypto provider; a second install is a no-op error.
    _ = CryptoProvider::install_default(default_provider());

    let https = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| AuthError::Transport(e.to_string()))?
        .https_or_http()
        .enable_http1()
        .build();

    let client = Client::builder(TokioExecutor::new()).build(https);

    Ok(Gmail::new(client, HubCredentials(credentials)))
}

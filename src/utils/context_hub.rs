// The `context_hub` module provides a centralized hub for managing Google API
// authentication and context.

use super::google_auth::{
    AuthError, CredentialProvider, GConf, GmailHubType, OAuthCredentialProvider,
    StaticTokenProvider, gmail_hub,
};
use google_gmail1::api::Scope;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as TokioMutex;
use tracing::info;

/// A hub for managing Google API authentication and context.
///
/// Components that need Gmail access (the summarize and send tools) register
/// their scopes up front. The first call to [`ContextHub::get_hub`] authorizes
/// once with every collected scope, so the user sees a single consent screen,
/// and caches the resulting hub for all later callers.
///
/// Intended to be wrapped in an `Arc` and shared.
pub struct ContextHub {
    gconf: GConf,
    static_token: Option<String>,
    scopes: Mutex<Vec<Scope>>,
    hub: TokioMutex<Option<GmailHubType>>,
}

impl ContextHub {
    /// Creates a new `ContextHub` that authorizes through the installed-app
    /// OAuth flow described by `gconf`.
    pub fn new(gconf: GConf) -> Self {
        Self {
            gconf,
            static_token: None,
            scopes: Mutex::new(Vec::new()),
            hub: TokioMutex::new(None),
        }
    }

    /// Uses a pre-issued bearer token instead of the OAuth flow.
    pub fn with_static_token(mut self, token: Option<String>) -> Self {
        self.static_token = token;
        self
    }

    /// Adds a new scope to the hub. This operation is synchronous.
    pub fn add_scope(&self, scope: Scope) {
        let mut scopes = self.scopes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
        tracing::debug!("Registered scopes: {:?}", scopes);
    }

    /// The scopes registered so far, as URLs.
    pub fn scope_urls(&self) -> Vec<String> {
        self.scopes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|scope| scope.as_ref().to_string())
            .collect()
    }

    /// Returns the authenticated `GmailHubType`.
    ///
    /// The first call builds the credential provider and requests a token for
    /// every registered scope, which surfaces missing or revoked credentials
    /// at startup rather than in the middle of an agent run.
    pub async fn get_hub(&self) -> Result<GmailHubType, AuthError> {
        let mut hub_guard = self.hub.lock().await;
        if let Some(hub) = hub_guard.as_ref() {
            return Ok(hub.clone());
        }

        let provider: Arc<dyn CredentialProvider> = match &self.static_token {
            Some(token) => {
                info!("Using a pre-issued access token");
                Arc::new(StaticTokenProvider::new(token.clone()))
            }
            None => Arc::new(OAuthCredentialProvider::new(&self.gconf).await?),
        };

        // Collect the scope list before awaiting so the std mutex is not held
        // across an await point.
        let scopes = self.scope_urls();
        provider.valid_token(&scopes).await?;
        info!(scope_count = scopes.len(), "Authorized with the Gmail API");

        let hub = gmail_hub(provider)?;
        *hub_guard = Some(hub.clone());
        Ok(hub)
    }
}

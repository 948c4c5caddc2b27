use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Credentials;
use crate::download::Fetch;
use crate::error::{Result, TuneGrabError};
use crate::spotify::types::TokenResponse;

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Credentials plus the current bearer token.
///
/// Shared by every resolver call. The token is written only by
/// [`SpotifySession::refresh`] and [`SpotifySession::set_credentials`]; a `None`
/// token means the resolvers run in scraping-only mode.
pub struct SpotifySession {
    fetch: Arc<dyn Fetch>,
    credentials: RwLock<Credentials>,
    token: RwLock<Option<String>>,
}

impl SpotifySession {
    pub fn new(fetch: Arc<dyn Fetch>, credentials: Credentials) -> Self {
        Self {
            fetch,
            credentials: RwLock::new(credentials),
            token: RwLock::new(None),
        }
    }

    /// Start with a token that is already known
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            ..self
        }
    }

    pub fn fetch(&self) -> &dyn Fetch {
        self.fetch.as_ref()
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Exchange the stored credentials for a fresh token. Failures are logged and
    /// leave the current token untouched.
    pub async fn refresh(&self) -> Option<String> {
        let credentials = self.credentials.read().await.clone();
        let token = request_access_token(self.fetch(), &credentials).await?;
        *self.token.write().await = Some(token.clone());
        info!("Spotify access token refreshed");
        Some(token)
    }

    /// Replace the credentials and immediately try to obtain a token with them
    pub async fn set_credentials(&self, client_id: &str, client_secret: &str) -> bool {
        *self.credentials.write().await = Credentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        };
        self.refresh().await.is_some()
    }

    /// GET an API resource with the bearer token. A 401 answer refreshes the
    /// token once and retries.
    pub async fn authorized_get(&self, url: &str) -> Result<String> {
        let token = self
            .token()
            .await
            .ok_or_else(|| TuneGrabError::Resolution("no Spotify access token".to_string()))?;

        match self.fetch.get_text(url, bearer(&token)?).await {
            Err(e) if e.is_unauthorized() => {
                warn!("Spotify token rejected, refreshing");
                let token = self.refresh().await.ok_or(e)?;
                self.fetch.get_text(url, bearer(&token)?).await
            }
            other => other,
        }
    }
}

fn bearer(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token))?,
    );
    Ok(headers)
}

/// Client-credentials grant. Returns `None` on any failure.
pub async fn request_access_token(fetch: &dyn Fetch, credentials: &Credentials) -> Option<String> {
    let basic = STANDARD.encode(format!(
        "{}:{}",
        credentials.client_id, credentials.client_secret
    ));
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&format!("Basic {}", basic)) {
        Ok(value) => headers.insert(AUTHORIZATION, value),
        Err(e) => {
            warn!("Invalid Spotify credentials: {}", e);
            return None;
        }
    };

    let body = match fetch
        .post_form(TOKEN_URL, "grant_type=client_credentials", headers)
        .await
    {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to obtain Spotify access token: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<TokenResponse>(&body) {
        Ok(t) => Some(t.access_token),
        Err(e) => {
            warn!("Unexpected token response: {}", e);
            None
        }
    }
}

use super::{build_mime, Notifier, NotifyError, OutboundMessage};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SEND_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";
const SCOPE: &str = "https://www.googleapis.com/auth/gmail.compose";
const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";
const DEFAULT_TOKEN_CACHE: &str = "token.json";

/// Treat tokens about to expire as expired so one does not lapse mid-call.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth client secret, as found in the "installed application" JSON Google
/// hands out.
#[derive(Debug, Clone, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: ClientSecret,
}

/// The persisted credential cache. This file is the only durable artifact of
/// the authorization flow.
#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Where a delivery attempt starts from, read off the credential cache.
#[derive(Debug)]
enum TokenState {
    /// No cache, or a cache with no way forward: interactive authorization.
    Missing,
    /// Usable refresh token: refresh without user interaction.
    Expired { refresh_token: String },
    /// Cached access token still valid: use it as-is.
    Valid { access_token: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

/// OAuth mail API backend. Composes base64url-encoded MIME and delivers it
/// through the Gmail send endpoint with a bearer token obtained from the
/// credential cache (refreshing or reauthorizing as needed).
pub struct GmailNotifier {
    secret: ClientSecret,
    cache_path: PathBuf,
    http: reqwest::Client,
}

impl GmailNotifier {
    pub fn new(credentials_file: &Path) -> Result<Self, NotifyError> {
        Self::with_cache_path(credentials_file, Path::new(DEFAULT_TOKEN_CACHE))
    }

    pub fn with_cache_path(credentials_file: &Path, cache_path: &Path) -> Result<Self, NotifyError> {
        let raw = fs::read_to_string(credentials_file).map_err(|e| {
            NotifyError::Auth(format!(
                "cannot read client secret {}: {}",
                credentials_file.display(),
                e
            ))
        })?;
        let parsed: ClientSecretFile = serde_json::from_str(&raw)
            .map_err(|e| NotifyError::Auth(format!("malformed client secret: {}", e)))?;

        Ok(Self {
            secret: parsed.installed,
            cache_path: cache_path.to_path_buf(),
            http: reqwest::Client::new(),
        })
    }

    fn token_state(&self) -> TokenState {
        let cached: CachedToken = match fs::read_to_string(&self.cache_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
        {
            Some(cached) => cached,
            None => return TokenState::Missing,
        };

        if cached.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > Utc::now() {
            TokenState::Valid {
                access_token: cached.access_token,
            }
        } else if let Some(refresh_token) = cached.refresh_token {
            TokenState::Expired { refresh_token }
        } else {
            TokenState::Missing
        }
    }

    async fn access_token(&self) -> Result<String, NotifyError> {
        match self.token_state() {
            TokenState::Valid { access_token } => {
                debug!("Using cached access token");
                Ok(access_token)
            }
            TokenState::Expired { refresh_token } => self.refresh(&refresh_token).await,
            TokenState::Missing => self.authorize().await,
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, NotifyError> {
        debug!("Refreshing expired access token");
        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(&[
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| NotifyError::Auth(format!("token refresh request failed: {}", e)))?;

        let token = Self::parse_token_response(response).await?;
        // Refresh responses usually omit the refresh token; keep the one we had.
        self.store_token(&token, Some(refresh_token.to_string()))?;
        Ok(token.access_token)
    }

    /// Interactive flow for the first run (or a cache with no refresh token):
    /// print the consent URL and exchange the pasted authorization code.
    async fn authorize(&self) -> Result<String, NotifyError> {
        let consent_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            self.secret.auth_uri, self.secret.client_id, OOB_REDIRECT, SCOPE
        );
        println!("Open this URL to authorize mail access:\n\n  {}\n", consent_url);
        print!("Paste the authorization code here: ");
        use std::io::Write;
        std::io::stdout()
            .flush()
            .map_err(|e| NotifyError::Auth(e.to_string()))?;

        let mut code = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut code)
            .map_err(|e| NotifyError::Auth(format!("cannot read authorization code: {}", e)))?;
        let code = code.trim();
        if code.is_empty() {
            return Err(NotifyError::Auth("no authorization code provided".to_string()));
        }

        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(&[
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", OOB_REDIRECT),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| NotifyError::Auth(format!("code exchange failed: {}", e)))?;

        let token = Self::parse_token_response(response).await?;
        self.store_token(&token, None)?;
        info!("Authorization complete; token cached at {}", self.cache_path.display());
        Ok(token.access_token)
    }

    async fn parse_token_response(response: reqwest::Response) -> Result<TokenResponse, NotifyError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Auth(e.to_string()))?;
        if !status.is_success() {
            return Err(NotifyError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| NotifyError::Auth(format!("malformed token response: {}", e)))
    }

    fn store_token(
        &self,
        token: &TokenResponse,
        fallback_refresh: Option<String>,
    ) -> Result<(), NotifyError> {
        let cached = CachedToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone().or(fallback_refresh),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        let raw = serde_json::to_string(&cached)
            .map_err(|e| NotifyError::Auth(e.to_string()))?;
        fs::write(&self.cache_path, raw).map_err(|e| {
            NotifyError::Auth(format!(
                "cannot persist token cache {}: {}",
                self.cache_path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl Notifier for GmailNotifier {
    fn compose(
        &self,
        sender: &str,
        recipients: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<OutboundMessage, NotifyError> {
        let message = build_mime(sender, recipients, subject, html_body)?;
        Ok(OutboundMessage::Encoded(URL_SAFE.encode(message.formatted())))
    }

    async fn deliver(&self, message: OutboundMessage) -> Result<(), NotifyError> {
        let OutboundMessage::Encoded(raw) = message else {
            return Err(NotifyError::UnsupportedMessage);
        };

        let access_token = self.access_token().await?;
        let response = self
            .http
            .post(SEND_ENDPOINT)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| NotifyError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api(format!(
                "send returned {}: {}",
                status, body
            )));
        }

        info!("Mail API accepted the message");
        Ok(())
    }
}

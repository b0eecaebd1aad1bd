//! Credentials for the Realtime Database REST API.
//!
//! A service-account key is exchanged for a short-lived OAuth2 access token
//! (RS256-signed JWT assertion, RFC 7523). The key file is only read when the
//! first token is needed, so a missing or broken key surfaces on the first
//! upload rather than at startup.

use crate::utils::error::{Result, UploaderError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const CREDENTIALS_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const TOKEN_SCOPES: &str =
    "https://www.googleapis.com/auth/firebase.database https://www.googleapis.com/auth/userinfo.email";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Path to a service-account JSON key.
    ServiceAccount(PathBuf),
    /// Legacy database secret, sent as the `auth` query parameter.
    DatabaseSecret(String),
    /// No credentials; for the local emulator or open database rules.
    Anonymous,
}

impl Credentials {
    /// Explicit key path first, then a database secret, then
    /// `GOOGLE_APPLICATION_CREDENTIALS`.
    ///
    /// A value still holding an unexpanded `${VAR}` counts as unset.
    pub fn resolve(credentials_path: Option<&str>, auth_secret: Option<&str>) -> Self {
        let non_empty = |s: &&str| {
            if s.contains("${") {
                tracing::warn!("Ignoring credential setting with unset variable: {}", s);
                return false;
            }
            !s.trim().is_empty()
        };

        if let Some(path) = credentials_path.filter(non_empty) {
            return Credentials::ServiceAccount(PathBuf::from(path));
        }
        if let Some(secret) = auth_secret.filter(non_empty) {
            return Credentials::DatabaseSecret(secret.to_string());
        }
        match std::env::var(CREDENTIALS_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Credentials::ServiceAccount(PathBuf::from(path)),
            _ => Credentials::Anonymous,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Credentials::ServiceAccount(path) => format!("service account key {}", path.display()),
            Credentials::DatabaseSecret(_) => "database secret".to_string(),
            Credentials::Anonymous => "anonymous".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            UploaderError::credentials(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| UploaderError::credentials(format!("invalid service account key: {}", e)))
    }

    /// Signed JWT assertion for the token exchange.
    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: TOKEN_SCOPES,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| UploaderError::credentials(format!("invalid private key: {}", e)))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| UploaderError::credentials(format!("cannot sign token request: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges a signed assertion for an access token at the key's token URI.
pub async fn fetch_access_token(client: &Client, key: &ServiceAccountKey) -> Result<AccessToken> {
    let now = Utc::now();
    let assertion = key.assertion(now)?;

    tracing::debug!("Requesting access token for {}", key.client_email);
    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| UploaderError::credentials(format!("token request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UploaderError::credentials(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| UploaderError::credentials(format!("invalid token response: {}", e)))?;

    Ok(AccessToken {
        value: token.access_token,
        expires_at: now + Duration::seconds(token.expires_in),
    })
}

/// Caches the access token for one service-account key and refreshes it
/// shortly before it expires.
#[derive(Debug)]
pub struct TokenSource {
    key_path: PathBuf,
    client: Client,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenSource {
    pub fn new(key_path: PathBuf, client: Client) -> Self {
        Self {
            key_path,
            client,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        // 持有鎖直到取得 token，避免同時重複換發
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let key = ServiceAccountKey::from_file(&self.key_path)?;
        let token = fetch_access_token(&self.client, &key).await?;
        tracing::info!(
            "Obtained access token for {} (expires {})",
            key.client_email,
            token.expires_at
        );

        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

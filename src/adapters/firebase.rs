use crate::adapters::credentials::{Credentials, TokenSource};
use crate::domain::model::DestinationPath;
use crate::domain::ports::DocumentStore;
use crate::utils::error::{Result, UploaderError};
use crate::utils::validation::validate_url;
use reqwest::{Client, StatusCode};
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Handle to a Firebase Realtime Database, spoken to over its REST API.
///
/// Cheap to clone; clones share the HTTP connection pool and the cached
/// access token.
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    base_url: Url,
    client: Client,
    auth: Auth,
}

#[derive(Debug)]
enum Auth {
    Bearer(TokenSource),
    Secret(String),
    Anonymous,
}

impl FirebaseStore {
    pub fn connect(database_url: &str, credentials: Credentials) -> Result<Self> {
        Self::connect_with_timeout(database_url, credentials, None)
    }

    /// Builds the handle. Nothing is sent over the network and the
    /// credentials file is not read until the first write.
    pub fn connect_with_timeout(
        database_url: &str,
        credentials: Credentials,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        validate_url("store.database_url", database_url)?;
        let base_url = Url::parse(database_url).map_err(|e| UploaderError::Config {
            message: format!("invalid database URL '{}': {}", database_url, e),
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let auth = match credentials {
            Credentials::ServiceAccount(path) => Auth::Bearer(TokenSource::new(path, client.clone())),
            Credentials::DatabaseSecret(secret) => Auth::Secret(secret),
            Credentials::Anonymous => Auth::Anonymous,
        };

        tracing::debug!("Store handle created for {}", base_url);
        Ok(Self {
            inner: Arc::new(Inner {
                base_url,
                client,
                auth,
            }),
        })
    }

    pub fn database_url(&self) -> &str {
        self.inner.base_url.as_str()
    }

    /// `<base>/<segments...>.json?print=silent`, percent-encoded per segment.
    pub fn document_url(&self, path: &DestinationPath) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| UploaderError::Config {
                message: format!("database URL cannot be a base: {}", self.inner.base_url),
            })?;
            segments.pop_if_empty();

            let (last, parents) = path
                .segments()
                .split_last()
                .ok_or_else(|| UploaderError::validation("Destination path cannot be empty"))?;
            segments.extend(parents);
            segments.push(&format!("{}.json", last));
        }
        url.set_query(None);
        url.query_pairs_mut().append_pair("print", "silent");

        if let Auth::Secret(secret) = &self.inner.auth {
            url.query_pairs_mut().append_pair("auth", secret);
        }
        Ok(url)
    }
}

impl DocumentStore for FirebaseStore {
    async fn replace(&self, path: &DestinationPath, document: &serde_json::Value) -> Result<()> {
        let url = self.document_url(path)?;
        let mut request = self.inner.client.put(url).json(document);

        if let Auth::Bearer(tokens) = &self.inner.auth {
            request = request.bearer_auth(tokens.access_token().await?);
        }

        tracing::debug!("PUT /{}.json", path);
        let response = request
            .send()
            .await
            .map_err(|e| UploaderError::store(describe_transport_error(&e.without_url())))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("Store answered {} for '{}'", status, path);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(UploaderError::store(rejection_message(status, &body)))
    }
}

/// The store reports failures as `{"error": "<message>"}`; keep that message
/// as-is when present.
fn rejection_message(status: StatusCode, body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    }
}

// The request URL may carry the database secret, so callers strip it first.
fn describe_transport_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

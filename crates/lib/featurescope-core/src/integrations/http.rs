use std::fmt;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::error::{ServerError, ServerResult};
use crate::retry::{RetryPolicy, retry_with_backoff};

/// Settings shared by the HTTP collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub bearer_token: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bearer_token: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// JSON-over-HTTP client with a lazily built connection pool.
///
/// Transport failures and timeouts are retried with backoff. Status failures
/// are returned on the first attempt.
pub struct HttpClient {
    client: RwLock<Option<Client>>,
    settings: HttpSettings,
}

enum Failure {
    Transport(reqwest::Error),
    Timeout,
    Final(ServerError),
}

impl Failure {
    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }

    const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "{err}"),
            Self::Timeout => f.write_str("timeout"),
            Self::Final(err) => write!(f, "{err}"),
        }
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            client: RwLock::new(None),
            settings,
        }
    }

    /// Builds the underlying client if it does not exist yet.
    ///
    /// # Errors
    /// Returns `ServerError::Api` if the TLS backend cannot be initialised.
    pub async fn connect(&self) -> ServerResult<()> {
        self.client().await.map(|_| ())
    }

    pub async fn disconnect(&self) {
        self.client.write().await.take();
    }

    pub async fn is_connected(&self) -> bool {
        self.client.read().await.is_some()
    }

    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn post_json<T: DeserializeOwned>(&self, url: &str, body: &Value) -> ServerResult<T> {
        self.request(Method::POST, url, Some(body)).await
    }

    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ServerResult<T> {
        self.request(Method::GET, url, None).await
    }

    /// Sends one JSON request and decodes the response body into `T`.
    ///
    /// # Errors
    /// `Authentication` for 401/403, `Api` for other failing statuses,
    /// exhausted transport retries and undecodable bodies.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> ServerResult<T> {
        let client = self.client().await?;
        let bearer = self.settings.bearer_token.as_deref();
        debug!(method = %method, endpoint = url, "sending request");

        let result = retry_with_backoff(self.settings.retry, Failure::is_retryable, |_| {
            send_once(&client, method.clone(), url, bearer, body)
        })
        .await;

        let value = match result {
            Ok(value) => value,
            Err(Failure::Final(err)) => return Err(err),
            Err(Failure::Transport(err)) => {
                error!(method = %method, endpoint = url, "request failed: {err}");
                return Err(ServerError::api_at(format!("Request failed: {err}"), None, url));
            }
            Err(Failure::Timeout) => {
                error!(method = %method, endpoint = url, "request timed out");
                return Err(ServerError::api_at(
                    format!("Request timeout after {}s", self.settings.timeout.as_secs()),
                    None,
                    url,
                ));
            }
        };

        debug!(method = %method, endpoint = url, "request succeeded");
        serde_json::from_value(value).map_err(|err| {
            ServerError::api_at(format!("invalid response payload: {err}"), None, url)
        })
    }

    async fn client(&self) -> ServerResult<Client> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(client.clone());
        }

        let mut slot = self.client.write().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.settings.timeout)
            .build()
            .map_err(|err| ServerError::api(format!("Failed to build HTTP client: {err}")))?;
        *slot = Some(client.clone());
        Ok(client)
    }
}

async fn send_once(
    client: &Client,
    method: Method,
    url: &str,
    bearer: Option<&str>,
    body: Option<&Value>,
) -> Result<Value, Failure> {
    let mut request = client
        .request(method, url)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await.map_err(Failure::from_send)?;
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Failure::Final(ServerError::Authentication(
            "Invalid or expired token".to_string(),
        )));
    }
    if status == StatusCode::FORBIDDEN {
        return Err(Failure::Final(ServerError::Authentication(
            "Insufficient permissions".to_string(),
        )));
    }
    if status.is_client_error() || status.is_server_error() {
        let text = response.text().await.unwrap_or_default();
        return Err(Failure::Final(ServerError::api_at(
            format!("API request failed: {text}"),
            Some(status.as_u16()),
            url,
        )));
    }

    response.json::<Value>().await.map_err(|err| {
        if err.is_timeout() {
            Failure::Timeout
        } else if err.is_decode() {
            Failure::Final(ServerError::api_at(
                format!("invalid response payload: {err}"),
                Some(status.as_u16()),
                url,
            ))
        } else {
            Failure::Transport(err)
        }
    })
}

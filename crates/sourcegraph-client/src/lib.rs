pub mod types;
pub mod url;

pub use types::{parse_symbols, SearchRequest, SymbolResult, LABEL_SEPARATOR};
pub use url::AssistEndpoint;

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://sourcegraph.com";
pub const DEFAULT_CLIENT_ID: &str = "sourcegraph-sublime-1";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("unexpected status code: {0}")]
    Status(StatusCode),
    #[error("fallback command `{program}` could not be started: {source}")]
    FallbackSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("fallback command `{program}` exited with {status}: {stderr}")]
    FallbackStatus {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("response body is not valid UTF-8")]
    Decode(#[from] std::string::FromUtf8Error),
}

impl ClientError {
    /// True when no body could be retrieved at all, as opposed to a body that
    /// arrived but could not be decoded.
    pub fn is_fetch_failure(&self) -> bool {
        !matches!(self, ClientError::Decode(_))
    }

    /// True when the fallback command ran and failed after the direct request.
    pub fn is_fallback_failure(&self) -> bool {
        matches!(
            self,
            ClientError::FallbackSpawn { .. } | ClientError::FallbackStatus { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Value of the `_via` query parameter.
    pub client_id: String,
    pub user_agent: String,
    /// `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
    /// Program and leading arguments used when the direct request fails. The
    /// URL is appended as the final argument. Empty disables the fallback.
    pub fallback_command: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            user_agent: format!("SourcegraphAssist/{}", env!("CARGO_PKG_VERSION")),
            timeout: None,
            fallback_command: vec!["curl".to_string(), "--".to_string()],
        }
    }
}

/// Anything able to turn a URL into a response body.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ClientError>;
}

#[derive(Debug)]
pub struct SourcegraphClient {
    /// `None` when the TLS stack could not be initialised; every request then
    /// goes straight to the fallback command.
    http: Option<Client>,
    config: ClientConfig,
}

impl Default for SourcegraphClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SourcegraphClient {
    pub fn with_config(config: ClientConfig) -> Self {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = match builder.build() {
            Ok(client) => Some(client),
            Err(error) => {
                warn!(
                    error = %error,
                    "failed to build HTTP client; requests will use the fallback command"
                );
                None
            }
        };

        Self { http, config }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn symbol_url(&self, endpoint: AssistEndpoint, request: &SearchRequest) -> String {
        url::symbol_url(
            &self.config.base_url,
            &self.config.client_id,
            endpoint,
            request,
        )
    }

    pub fn search_url(&self, query: &str) -> String {
        url::search_url(&self.config.base_url, &self.config.client_id, query)
    }

    pub fn symbol_page_url(&self, symbol: &SymbolResult) -> String {
        url::symbol_page_url(&self.config.base_url, symbol)
    }

    #[instrument(name = "sourcegraph_client.fetch", skip(self))]
    pub async fn fetch_url(&self, url: &str) -> Result<String, ClientError> {
        let direct = match &self.http {
            Some(http) => Self::fetch_direct(http, url).await,
            None => Err(ClientError::Http("HTTP client unavailable".to_string())),
        };

        match direct {
            Ok(body) => Ok(body),
            Err(error @ ClientError::Decode(_)) => Err(error),
            Err(error) => {
                if self.config.fallback_command.is_empty() {
                    return Err(error);
                }
                warn!(error = %error, url, "direct request failed; trying fallback command");
                self.fetch_fallback(url).await
            }
        }
    }

    async fn fetch_direct(http: &Client, url: &str) -> Result<String, ClientError> {
        let response = http
            .get(url)
            .send()
            .await
            .map_err(|err| ClientError::Http(err.to_string()))?;
        if !response.status().is_success() {
            warn!(status = %response.status(), url, "Sourcegraph request failed");
            return Err(ClientError::Status(response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| ClientError::Http(err.to_string()))?;
        debug!(url, bytes = bytes.len(), "direct request succeeded");
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    async fn fetch_fallback(&self, url: &str) -> Result<String, ClientError> {
        let Some((program, args)) = self.config.fallback_command.split_first() else {
            return Err(ClientError::Http("no fallback command configured".to_string()));
        };

        let output = Command::new(program)
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ClientError::FallbackSpawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ClientError::FallbackStatus {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(
            program = %program,
            bytes = output.stdout.len(),
            "fallback command succeeded"
        );
        Ok(String::from_utf8(output.stdout)?)
    }
}

#[async_trait]
impl Fetch for SourcegraphClient {
    async fn fetch(&self, url: &str) -> Result<String, ClientError> {
        self.fetch_url(url).await
    }
}

//! HTTP transport for pages, player scripts and media bytes

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::error::ResolveError;

/// Desktop browser user agent sent with page requests
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Language negotiated for page requests
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Receives `(downloaded, total)` after each chunk; `total` is 0 when unknown
pub type ProgressCallback<'a> = dyn FnMut(u64, u64) + Send + 'a;

/// Successful HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// Check if the response declares a JSON body
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }
}

/// Fetch and download capability used by the resolver
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a text resource; non-success statuses are errors
    async fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ResolveError>;

    /// Stream a resource to `output`, returning the number of bytes written.
    ///
    /// On failure no partial file is left behind.
    async fn download(
        &self,
        url: &str,
        output: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<u64, ResolveError>;
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request timeout for page and script fetches
    pub timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Attempts per fetch, including the first
    pub max_retries: u32,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    client: Client,
    /// Media client without a whole-request timeout
    media_client: Client,
    config: HttpClientConfig,
}

impl HttpTransport {
    /// Create a transport with default configuration
    pub fn new() -> Result<Self, ResolveError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a transport with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self, ResolveError> {
        let base = || {
            ClientBuilder::new()
                .connect_timeout(config.connect_timeout)
                .user_agent(config.user_agent.clone())
                .gzip(true)
                .brotli(true)
        };

        let client = base().timeout(config.timeout).build()?;
        let media_client = base().build()?;

        Ok(Self {
            client,
            media_client,
            config,
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn fetch_once(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ResolveError> {
        let mut request = self
            .client
            .get(url)
            .header("Accept-Language", self.config.accept_language.as_str());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }

    async fn stream_to_file(
        &self,
        url: &str,
        file: &mut File,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<u64, ResolveError> {
        let mut response = self.media_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut downloaded = 0u64;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }

        file.flush().await?;
        file.sync_all().await?;

        if downloaded == 0 {
            return Err(ResolveError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("empty download from {}", url),
            )));
        }

        // Final report so unknown totals still reach completion
        if total == 0 || downloaded != total {
            progress(downloaded, downloaded);
        }
        Ok(downloaded)
    }
}

/// Upper bound on the doubling exponent; 200ms * 2^8 is about 51s
const MAX_BACKOFF_EXPONENT: u32 = 8;

/// Delay before retry `attempt + 1`: 200ms doubled per attempt, capped
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(200u64 << attempt.min(MAX_BACKOFF_EXPONENT))
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ResolveError> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            debug!("GET {} (attempt {}/{})", url, attempt + 1, attempts);

            match self.fetch_once(url, headers).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => {
                    warn!("Request to {} failed: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            // Exponential backoff
            if attempt + 1 < attempts {
                let delay = backoff_delay(attempt);
                debug!("Retrying in {}", humantime::format_duration(delay));
                tokio::time::sleep(delay).await;
            }
        }

        error!("All {} attempts for {} failed", attempts, url);
        Err(last_error.unwrap_or_else(|| ResolveError::InvalidUrl(url.to_string())))
    }

    async fn download(
        &self,
        url: &str,
        output: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<u64, ResolveError> {
        if url.is_empty() {
            return Err(ResolveError::InvalidUrl("stream has no URL".to_string()));
        }

        info!("Downloading to {}", output.display());
        let tmp_path = partial_path(output);
        let mut file = File::create(&tmp_path).await?;

        match self.stream_to_file(url, &mut file, progress).await {
            Ok(bytes) => {
                drop(file);
                tokio::fs::rename(&tmp_path, output).await?;
                info!("Download completed: {} bytes", bytes);
                Ok(bytes)
            }
            Err(e) => {
                warn!("Download failed: {}, removing partial file", e);
                drop(file);
                let _ = tokio::fs::remove_file(&tmp_path).await;
                Err(e)
            }
        }
    }
}

//! Source fetching over HTTP or from the local filesystem.

use crate::parser::ContentType;
use crag_core::{AppError, AppResult};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

const FETCH_TIMEOUT_SECS: u64 = 60;

/// Raw body of a fetched source.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub uri: String,
    pub body: String,
    pub content_type: ContentType,
}

/// Fetches source URIs: `http(s)://` over the network, `file://` and bare
/// paths from disk. Relative paths resolve against the base directory when
/// one is set.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    base_dir: Option<PathBuf>,
}

impl Fetcher {
    pub fn new() -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(concat!("crag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Knowledge(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_dir: None,
        })
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Local path a non-remote URI refers to.
    pub fn resolve_path(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub async fn fetch(&self, uri: &str) -> AppResult<FetchedDocument> {
        if is_remote(uri) {
            self.fetch_http(uri).await
        } else {
            fetch_file(uri, &self.resolve_path(uri)).await
        }
    }

    async fn fetch_http(&self, uri: &str) -> AppResult<FetchedDocument> {
        tracing::debug!("Fetching {}", uri);

        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to fetch {}: {}", uri, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Knowledge(format!(
                "Failed to fetch {}: HTTP {}",
                uri, status
            )));
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(ContentType::from_mime);

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to read body of {}: {}", uri, e)))?;

        let content_type = header_type
            .or_else(|| ContentType::from_path(Path::new(url_path(uri))))
            .unwrap_or_else(|| ContentType::sniff(&body));

        Ok(FetchedDocument {
            uri: uri.to_string(),
            body,
            content_type,
        })
    }
}

async fn fetch_file(uri: &str, path: &Path) -> AppResult<FetchedDocument> {
    let body = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if body.contains('\0') {
        return Err(AppError::Knowledge(format!(
            "Binary file not supported: {:?}",
            path
        )));
    }

    let content_type = ContentType::from_path(path).unwrap_or_else(|| ContentType::sniff(&body));

    Ok(FetchedDocument {
        uri: uri.to_string(),
        body,
        content_type,
    })
}

/// Whether a URI is fetched over the network.
pub fn is_remote(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Path component of a URL, without query or fragment.
fn url_path(uri: &str) -> &str {
    let without_scheme = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    let path = without_scheme
        .find('/')
        .map(|i| &without_scheme[i..])
        .unwrap_or("");
    path.split(['?', '#']).next().unwrap_or(path)
}

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

use crate::chunk::Batch;
use crate::config::HashType;
use crate::error::{Error, Result};

/// Password placeholder for hashes the service does not know.
pub const NOT_FOUND_MARKER: &str = "[not found]";

/// Interpreted result of looking up one hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(String, String),
    NotFound(String),
    ServerError(u16),
    RateLimited,
    TransportError(String),
}

impl LookupOutcome {
    /// True for outcomes that belong in the `<hash>:<password>` result stream,
    /// false for status and error lines.
    pub fn is_result(&self) -> bool {
        matches!(self, LookupOutcome::Found(..) | LookupOutcome::NotFound(_))
    }
}

impl fmt::Display for LookupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupOutcome::Found(hash, password) => write!(f, "{hash}:{password}"),
            LookupOutcome::NotFound(hash) => write!(f, "{hash}:{NOT_FOUND_MARKER}"),
            LookupOutcome::ServerError(status) => write!(f, "Error: Unexpected status code {status}"),
            LookupOutcome::RateLimited => {
                f.write_str("Error: Rate limited by the lookup service (status code 429)")
            }
            LookupOutcome::TransportError(msg) => write!(f, "Error during lookup: {msg}"),
        }
    }
}

/// Raw reply to a bulk request. Interpretation is left to the caller because
/// the service omits unmatched hashes from the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResponse {
    pub status: u16,
    pub lines: Vec<String>,
}

/// Splits a `hash:password` result line. The hash is lowercased; the password
/// is kept verbatim and may itself contain colons.
pub fn parse_result_line(line: &str) -> Option<(String, &str)> {
    let (hash, password) = line.split_once(':')?;
    let hash = hash.trim();
    if hash.is_empty() || password.is_empty() {
        return None;
    }
    Some((hash.to_ascii_lowercase(), password))
}

fn body_lines(body: &str) -> Vec<String> {
    body.lines().map(str::trim_end).filter(|l| !l.is_empty()).map(String::from).collect()
}

/// The remote lookup service as seen by the retry driver.
pub trait LookupClient {
    /// Looks up a single hash.
    fn lookup_single(&self, hash_type: HashType, hash: &str) -> impl Future<Output = LookupOutcome>;

    /// Submits one batch. `Err` is always [`Error::Transport`].
    fn lookup_batch(
        &self,
        hash_type: HashType,
        batch: &Batch,
    ) -> impl Future<Output = Result<BatchResponse>>;
}

/// [`LookupClient`] backed by the ntlm.pw HTTP API.
#[derive(Debug, Clone)]
pub struct HttpLookupClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLookupClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::InvalidConfiguration("API URL must not be empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ntlm-lookup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl LookupClient for HttpLookupClient {
    async fn lookup_single(&self, hash_type: HashType, hash: &str) -> LookupOutcome {
        let url = format!("{}/{}/{}", self.base_url, hash_type, hash);
        tracing::debug!(%url, "single lookup");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return LookupOutcome::TransportError(e.to_string()),
        };

        match response.status() {
            StatusCode::NO_CONTENT => LookupOutcome::NotFound(hash.to_string()),
            StatusCode::OK => match response.text().await {
                Ok(body) => single_outcome(hash, &body),
                Err(e) => LookupOutcome::TransportError(e.to_string()),
            },
            StatusCode::TOO_MANY_REQUESTS => LookupOutcome::RateLimited,
            status => LookupOutcome::ServerError(status.as_u16()),
        }
    }

    async fn lookup_batch(&self, hash_type: HashType, batch: &Batch) -> Result<BatchResponse> {
        let url = format!("{}?hashtype={}", self.base_url, hash_type);
        tracing::debug!(%url, batch = batch.index, size = batch.len(), "bulk lookup");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(batch.payload())
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| Error::Transport(e.to_string()))?;

        Ok(BatchResponse { status, lines: body_lines(&body) })
    }
}

/// Picks the outcome for `hash` out of a 200 body; a body that never
/// mentions the hash counts as not found.
fn single_outcome(hash: &str, body: &str) -> LookupOutcome {
    let wanted = hash.to_ascii_lowercase();
    for line in body_lines(body) {
        let Some((found_hash, password)) = parse_result_line(&line) else {
            continue;
        };
        if found_hash != wanted {
            continue;
        }
        if password == NOT_FOUND_MARKER {
            return LookupOutcome::NotFound(hash.to_string());
        }
        return LookupOutcome::Found(hash.to_string(), password.to_string());
    }
    LookupOutcome::NotFound(hash.to_string())
}

use std::fmt;
use std::time::Duration;

/// Base URL of the public lookup service.
pub const DEFAULT_API_URL: &str = "https://ntlm.pw/api/lookup";

/// Environment variable name for overriding the lookup service base URL.
pub const API_URL_ENV: &str = "NTLM_LOOKUP_API_URL";

/// Maximum number of hashes the service accepts in one bulk request.
pub const DEFAULT_BATCH_SIZE: usize = 300;

/// Per-request timeout for the HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Returns the base URL from the NTLM_LOOKUP_API_URL environment variable,
/// or falls back to [`DEFAULT_API_URL`].
pub fn api_url_from_env() -> String {
    std::env::var(API_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

/// Hash algorithms understood by the lookup service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum HashType {
    #[default]
    Nt,
    Lm,
    Md5,
    Sha1,
    Sha256,
}

impl HashType {
    /// Spelling used in request paths and the `hashtype` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            HashType::Nt => "nt",
            HashType::Lm => "lm",
            HashType::Md5 => "md5",
            HashType::Sha1 => "sha1",
            HashType::Sha256 => "sha256",
        }
    }

    /// Number of hex characters in a digest of this type.
    pub fn hex_len(self) -> usize {
        match self {
            HashType::Nt | HashType::Lm | HashType::Md5 => 32,
            HashType::Sha1 => 40,
            HashType::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

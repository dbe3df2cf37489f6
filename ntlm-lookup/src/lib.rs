//! Recovers plaintext passwords for NTLM hashes using the
//! [ntlm.pw](https://ntlm.pw) lookup service.
//!
//! **This is not a cracking engine.** Nothing is guessed locally; hashes are
//! only looked up against the remote service's precomputed dataset.
//!
//! # Pipeline
//!
//! ```text
//! input lines -> extract -> CanonicalHashes (sorted) -> chunk -> RetryDriver -> ResultSink
//! ```
//!
//! - [`extract`] pulls canonical lowercase hashes out of raw hash lists and
//!   `domain\user:uid:lmhash:nthash:::` dump lines, dropping anything else.
//! - [`chunk`] splits the sorted hashes into bulk requests of at most 300.
//! - [`RetryDriver`] submits batches strictly one at a time, waiting 5 seconds
//!   between requests. A 429 puts the driver to sleep for 15 minutes and then
//!   resubmits the same batch. Other failures abandon the batch with an error
//!   line and the run continues.
//! - [`ResultSink`] prints `<hash>:<password>` or `<hash>:[not found]` for
//!   every hash, mirroring everything into the output file when one is given.
//!
//! # Usage
//!
//! ```sh
//! ntlm-lookup -t nt -f hashes.txt -o results.txt
//! ntlm-lookup -t nt -x 8846f7eaee8fb117ad06bdd830b7586c
//! ```
//!
//! Everything runs on a single task, since the service enforces one global
//! rate limit. Progress is not persisted: an interrupted run starts over.

pub mod chunk;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod ntlm;
pub mod sink;

pub use chunk::{Batch, chunk};
pub use client::{BatchResponse, HttpLookupClient, LookupClient, LookupOutcome, NOT_FOUND_MARKER};
pub use config::{DEFAULT_API_URL, DEFAULT_BATCH_SIZE, HashType, api_url_from_env};
pub use driver::{Delay, DriverConfig, DriverState, RetryDriver, RetryPolicy, RunSummary, TokioDelay};
pub use error::{Error, Result};
pub use extract::{CanonicalHashes, HashRecord, extract, read_hashes};
pub use ntlm::{nt_hash, read_hash_list};
pub use sink::ResultSink;

/// Installs the stderr `tracing` subscriber used by the binaries.
///
/// `RUST_LOG` takes precedence; otherwise only warnings are shown so the
/// result stream stays readable.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).compact().init();
}

//! Sequential batch submission with throttle handling.
//!
//! The driver walks the batches one at a time through an explicit state
//! machine:
//!
//! ```text
//! Pending(i) --submit--> InFlight(i) --200--------------> Advancing(i)
//!                                    --429--------------> Throttled(i)
//!                                    --other / network--> Advancing(i)
//! Throttled(i) --backoff--> Pending(i)
//! Advancing(i) --> Pending(i + 1) | Done
//! ```
//!
//! A throttled batch is always resubmitted under the same index, so no batch
//! is skipped and no outcome is emitted twice. Any other failure abandons the
//! batch with an error line.

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

use indicatif::ProgressBar;

use crate::chunk::Batch;
use crate::client::{LookupClient, LookupOutcome, NOT_FOUND_MARKER, parse_result_line};
use crate::config::HashType;
use crate::error::{Error, Result};
use crate::sink::ResultSink;

/// Pause between consecutive bulk requests.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(5);

/// Cool-down after a 429 before the same batch is resubmitted.
pub const DEFAULT_THROTTLE_BACKOFF: Duration = Duration::from_secs(900);

/// Timing and retry limits for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub request_delay: Duration,
    pub throttle_backoff: Duration,
    /// Consecutive 429 responses tolerated for one batch before it is
    /// abandoned. `None` retries forever.
    pub max_throttle_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_delay: DEFAULT_REQUEST_DELAY,
            throttle_backoff: DEFAULT_THROTTLE_BACKOFF,
            max_throttle_retries: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverConfig {
    pub hash_type: HashType,
    pub policy: RetryPolicy,
}

/// Suspension point between requests, injectable so tests need not wait.
pub trait Delay {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Real wall-clock delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Pending(usize),
    InFlight(usize),
    Throttled(usize),
    Advancing(usize),
    Done,
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed_batches: usize,
    pub throttled: u64,
}

/// The driver's cursor. Only ever moves forward and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub state: DriverState,
    /// Submissions of the current batch so far.
    pub attempts: u32,
    pub summary: RunSummary,
}

impl RunState {
    fn new(batches: usize) -> Self {
        let state = if batches == 0 { DriverState::Done } else { DriverState::Pending(0) };
        Self { state, attempts: 0, summary: RunSummary { batches, ..RunSummary::default() } }
    }
}

pub struct RetryDriver<C, D> {
    client: C,
    delay: D,
    config: DriverConfig,
    batches: Vec<Batch>,
    run: RunState,
    progress: Option<ProgressBar>,
}

impl<C: LookupClient, D: Delay> RetryDriver<C, D> {
    pub fn new(client: C, delay: D, config: DriverConfig, batches: Vec<Batch>) -> Self {
        let run = RunState::new(batches.len());
        Self { client, delay, config, batches, run, progress: None }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn state(&self) -> &DriverState {
        &self.run.state
    }

    /// Drives every batch to completion or abandonment.
    ///
    /// Only an output write failure stops the run early.
    pub async fn run<W: Write>(&mut self, sink: &mut ResultSink<W>) -> Result<RunSummary> {
        tracing::info!(
            batches = self.batches.len(),
            hash_type = %self.config.hash_type,
            "starting lookup run"
        );

        while self.run.state != DriverState::Done {
            self.step(sink).await?;
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        let summary = self.run.summary;
        tracing::info!(?summary, "lookup run finished");
        Ok(summary)
    }

    /// Performs exactly one transition and returns the new state.
    pub async fn step<W: Write>(&mut self, sink: &mut ResultSink<W>) -> Result<&DriverState> {
        let next = match self.run.state {
            DriverState::Done => DriverState::Done,
            DriverState::Pending(i) if i >= self.batches.len() => DriverState::Done,
            DriverState::Pending(i) => {
                self.run.attempts += 1;
                DriverState::InFlight(i)
            }
            DriverState::InFlight(i) => self.submit(i, sink).await?,
            DriverState::Throttled(i) => self.throttled(i, sink).await?,
            DriverState::Advancing(i) => {
                self.run.attempts = 0;
                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
                if i + 1 >= self.batches.len() {
                    DriverState::Done
                } else {
                    self.delay.sleep(self.config.policy.request_delay).await;
                    DriverState::Pending(i + 1)
                }
            }
        };

        tracing::debug!(from = ?self.run.state, to = ?next, "transition");
        self.run.state = next;
        Ok(&self.run.state)
    }

    async fn submit<W: Write>(&mut self, i: usize, sink: &mut ResultSink<W>) -> Result<DriverState> {
        let batch = &self.batches[i];
        tracing::debug!(batch = i, size = batch.len(), attempt = self.run.attempts, "submitting batch");

        let response = match self.client.lookup_batch(self.config.hash_type, batch).await {
            Ok(r) => r,
            Err(e) => {
                let msg = match e {
                    Error::Transport(msg) => msg,
                    other => other.to_string(),
                };
                self.run.summary.failed_batches += 1;
                sink.status(&format!("Error during bulk lookup: {msg}"))?;
                return Ok(DriverState::Advancing(i));
            }
        };

        match response.status {
            200 => {
                let (found, not_found) = emit_batch(batch, &response.lines, sink)?;
                self.run.summary.found += found;
                self.run.summary.not_found += not_found;
                Ok(DriverState::Advancing(i))
            }
            429 => {
                self.run.summary.throttled += 1;
                Ok(DriverState::Throttled(i))
            }
            status => {
                self.run.summary.failed_batches += 1;
                sink.status(&LookupOutcome::ServerError(status).to_string())?;
                Ok(DriverState::Advancing(i))
            }
        }
    }

    async fn throttled<W: Write>(&mut self, i: usize, sink: &mut ResultSink<W>) -> Result<DriverState> {
        let policy = self.config.policy;

        if let Some(max) = policy.max_throttle_retries {
            if self.run.attempts > max {
                self.run.summary.failed_batches += 1;
                sink.status(&format!(
                    "Error: Batch {} still rate limited after {} retries, skipping {} hashes",
                    i + 1,
                    max,
                    self.batches[i].len()
                ))?;
                return Ok(DriverState::Advancing(i));
            }
        }

        let secs = policy.throttle_backoff.as_secs();
        sink.status(&format!(
            "Warning: Rate limited (status code 429) on batch {}/{}, retrying in {}s",
            i + 1,
            self.batches.len(),
            secs
        ))?;
        tracing::warn!(batch = i, attempt = self.run.attempts, backoff_secs = secs, "throttled");

        if let Some(pb) = &self.progress {
            pb.set_message(format!("throttled, waiting {secs}s"));
        }
        self.delay.sleep(policy.throttle_backoff).await;
        if let Some(pb) = &self.progress {
            pb.set_message("");
        }

        Ok(DriverState::Pending(i))
    }
}

/// Writes exactly one outcome line per hash in `batch`, in batch order.
/// Hashes missing from `lines` are reported as not found.
fn emit_batch<W: Write>(
    batch: &Batch,
    lines: &[String],
    sink: &mut ResultSink<W>,
) -> Result<(usize, usize)> {
    let mut passwords: HashMap<String, &str> = HashMap::with_capacity(lines.len());
    for line in lines {
        match parse_result_line(line) {
            Some((hash, password)) if password != NOT_FOUND_MARKER => {
                passwords.entry(hash).or_insert(password);
            }
            Some(_) => {}
            None => tracing::debug!(%line, "ignoring unparseable response line"),
        }
    }

    let (mut found, mut not_found) = (0, 0);
    for hash in &batch.hashes {
        let outcome = match passwords.get(hash.as_str()) {
            Some(password) => {
                found += 1;
                LookupOutcome::Found(hash.clone(), password.to_string())
            }
            None => {
                not_found += 1;
                LookupOutcome::NotFound(hash.clone())
            }
        };
        sink.emit(&outcome.to_string())?;
    }

    Ok((found, not_found))
}

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use ntlm_lookup::config::DEFAULT_REQUEST_TIMEOUT;
use ntlm_lookup::driver::{DEFAULT_REQUEST_DELAY, DEFAULT_THROTTLE_BACKOFF};
use ntlm_lookup::{
    DEFAULT_BATCH_SIZE, DriverConfig, Error, HashType, HttpLookupClient, LookupClient,
    ResultSink, RetryDriver, RetryPolicy, TokioDelay, api_url_from_env, chunk, read_hashes,
};

#[derive(Parser, Debug)]
#[command(name = "ntlm-lookup")]
#[command(about = "Look up NTLM and other password hashes against the ntlm.pw API")]
#[command(group(ArgGroup::new("input").required(true).args(["file", "hash"])))]
struct Args {
    /// Hash type
    #[arg(short = 't', long = "type", value_enum, default_value_t = HashType::Nt)]
    hash_type: HashType,

    /// File containing hashes (raw or `domain\user:uid:lm:nt:::` dump lines) for bulk lookup
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Single hash to look up
    #[arg(short = 'x', long)]
    hash: Option<String>,

    /// Output file to save results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Lookup service base URL (default: $NTLM_LOOKUP_API_URL or https://ntlm.pw/api/lookup)
    #[arg(long)]
    api_url: Option<String>,

    /// Hashes per bulk request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Seconds to wait between bulk requests
    #[arg(long, default_value_t = DEFAULT_REQUEST_DELAY.as_secs())]
    delay_secs: u64,

    /// Seconds to wait after the service answers 429 before retrying
    #[arg(long, default_value_t = DEFAULT_THROTTLE_BACKOFF.as_secs())]
    backoff_secs: u64,

    /// Give up on a batch after this many throttled retries (default: retry forever)
    #[arg(long)]
    max_throttle_retries: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Disable progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    ntlm_lookup::init_tracing();
    let args = Args::parse();

    let (client, mut sink) = match setup(&args) {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match (&args.file, &args.hash) {
        (Some(file), _) => bulk_lookup(&args, file, client, &mut sink).await,
        (None, Some(hash)) => single_lookup(args.hash_type, hash, &client, &mut sink).await,
        (None, None) => Err(Error::InvalidConfiguration("either --file or --hash is required".into())),
    };

    // Fatal errors are reported once, on stderr and in the output file.
    if let Err(e) = &result
        && let Err(write_err) = sink.status(&e.to_string())
    {
        tracing::warn!(error = %write_err, "could not record fatal error in output");
    }

    // Flush the output even when the run failed part way.
    match (result, sink.finish()) {
        (Ok(()), Ok(_)) => ExitCode::SUCCESS,
        (Ok(()), Err(e)) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        (Err(_), _) => ExitCode::FAILURE,
    }
}

fn setup(args: &Args) -> Result<(HttpLookupClient, ResultSink<BufWriter<File>>), Error> {
    // Validate arguments
    if args.batch_size == 0 {
        return Err(Error::InvalidConfiguration("--batch-size must be at least 1".into()));
    }

    let api_url = args.api_url.clone().unwrap_or_else(api_url_from_env);
    let client = HttpLookupClient::new(api_url, Duration::from_secs(args.timeout_secs))?;
    let sink = ResultSink::open(args.output.as_deref(), false)?;
    Ok((client, sink))
}

async fn single_lookup<W: Write>(
    hash_type: HashType,
    hash: &str,
    client: &HttpLookupClient,
    sink: &mut ResultSink<W>,
) -> Result<(), Error> {
    let outcome = client.lookup_single(hash_type, hash.trim()).await;
    if outcome.is_result() {
        sink.emit(&outcome.to_string())
    } else {
        sink.status(&outcome.to_string())
    }
}

async fn bulk_lookup<W: Write>(
    args: &Args,
    file: &Path,
    client: HttpLookupClient,
    sink: &mut ResultSink<W>,
) -> Result<(), Error> {
    let hashes = read_hashes(file, args.hash_type).await?;

    let batches = chunk(&hashes.sorted(), args.batch_size)?;
    tracing::info!(hashes = hashes.len(), batches = batches.len(), "loaded input");

    let config = DriverConfig {
        hash_type: args.hash_type,
        policy: RetryPolicy {
            request_delay: Duration::from_secs(args.delay_secs),
            throttle_backoff: Duration::from_secs(args.backoff_secs),
            max_throttle_retries: args.max_throttle_retries,
        },
    };

    let total = batches.len() as u64;
    let mut driver = RetryDriver::new(client, TokioDelay, config, batches);

    // Set up progress bar
    if !args.no_progress && total > 1 {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")
                .map_err(|e| Error::InvalidConfiguration(e.to_string()))?
                .progress_chars("#>-"),
        );
        sink.attach_progress(pb.clone());
        driver = driver.with_progress(pb);
    }

    let summary = driver.run(sink).await?;
    eprintln!(
        "Lookup complete: {} found, {} not found, {} failed batches",
        summary.found, summary.not_found, summary.failed_batches
    );
    Ok(())
}

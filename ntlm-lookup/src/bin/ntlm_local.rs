//! Offline check of one known password against NT hash lists.
//!
//! Every canonical NT hash found in the input files is written to the output
//! in the same `<hash>:<password>` / `<hash>:[not found]` format the remote
//! lookup produces, so both can feed the same report.

use std::path::PathBuf;

use clap::Parser;
use ntlm_lookup::{CanonicalHashes, Error, LookupOutcome, ResultSink, nt_hash, read_hash_list};

#[derive(Parser, Debug)]
#[command(name = "ntlm-local")]
#[command(about = "Check NTLM hashes against one known plaintext password")]
struct Args {
    /// Files containing NTLM hashes (`user:hash`, bare hashes or dump lines).
    /// Patterns like `dumps/*.txt` are expanded by the shell, not here.
    #[arg(short, long, required = true, num_args = 1..)]
    file: Vec<PathBuf>,

    /// Password to test against the hashes
    #[arg(short, long)]
    password: String,

    /// Output file for results
    #[arg(short, long)]
    output: PathBuf,

    /// Append to the output file instead of overwriting
    #[arg(short, long)]
    append: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    ntlm_lookup::init_tracing();
    let args = Args::parse();

    let mut hashes = CanonicalHashes::new();
    for path in &args.file {
        let records = read_hash_list(path).await?;
        eprintln!("Processing {}: {} hashes", path.display(), records.len());
        hashes.extend(records);
    }

    if hashes.is_empty() {
        return Err(Error::InvalidConfiguration("no valid hashes found in the input files".into()));
    }

    let target = nt_hash(&args.password);
    tracing::debug!(%target, "computed NT hash");

    let mut sink = ResultSink::open(Some(args.output.as_path()), args.append)?;
    let mut matches = 0usize;
    let result = hashes.iter().try_for_each(|hash| {
        let outcome = if hash == target {
            matches += 1;
            LookupOutcome::Found(hash.to_string(), args.password.clone())
        } else {
            LookupOutcome::NotFound(hash.to_string())
        };
        sink.emit(&outcome.to_string())
    });
    let finished = sink.finish();
    result?;
    finished?;

    let mode = if args.append { "Appended to" } else { "Wrote" };
    eprintln!("{mode} {}", args.output.display());
    eprintln!("Found {matches} matches out of {} hashes", hashes.len());
    Ok(())
}

use std::path::PathBuf;

use clap::Parser;
use ntlm_report::{Error, Report, parse_cracked, parse_dump, read_text};

#[derive(Parser, Debug)]
#[command(name = "ntlm-report")]
#[command(about = "Match a credential dump with recovered passwords and write a two-sheet report")]
struct Args {
    /// Credential dump file (`domain\user:uid:lmhash:nthash:::`)
    #[arg(short, long)]
    file: PathBuf,

    /// Lookup results file (`hash:password` lines)
    #[arg(short, long)]
    passwords: PathBuf,

    /// Output report file (JSON)
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<(), Error> {
    ntlm_lookup::init_tracing();
    let args = Args::parse();

    println!("Parsing hash file: {}", args.file.display());
    let entries = parse_dump(&read_text(&args.file)?);
    println!("Found {} hash entries", entries.len());

    println!("Parsing cracked passwords file: {}", args.passwords.display());
    let cracked = parse_cracked(&read_text(&args.passwords)?);
    println!("Found {} cracked passwords (excluding [not found])", cracked.len());

    let report = Report::build(entries, &cracked);
    println!("Successfully matched {} passwords", report.cracked_passwords.len());
    tracing::debug!(output = %args.output.display(), "writing report");

    report.write(&args.output)?;
    println!("Sheet 1 - All_Hashes: {} entries", report.all_hashes.len());
    println!("Sheet 2 - Cracked_Passwords: {} entries", report.cracked_passwords.len());
    println!("Report written to {}", args.output.display());
    Ok(())
}

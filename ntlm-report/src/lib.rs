//! Matches credential-dump entries against `ntlm-lookup` results.
//!
//! The dump is read as `[domain\]user:uid:lmhash:nthash:...` lines and the
//! results as `hash:password` (or `hash password`) lines. Each account is
//! matched by exact case-insensitive hash equality, NT hash first and LM hash
//! as a fallback. The report has two sheets: every parsed dump entry, and the
//! accounts whose password was recovered.

pub mod error;
pub mod parse;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

pub use error::{Error, Result};
pub use parse::{parse_cracked, parse_dump};

/// One account line from the credential dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpEntry {
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "UID")]
    pub uid: String,
    #[serde(rename = "LM Hash")]
    pub lm_hash: String,
    #[serde(rename = "NT Hash")]
    pub nt_hash: String,
    #[serde(rename = "Full Entry")]
    pub full_entry: String,
}

/// An account whose password was recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrackedAccount {
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    #[serde(rename = "All_Hashes")]
    pub all_hashes: Vec<DumpEntry>,
    #[serde(rename = "Cracked_Passwords")]
    pub cracked_passwords: Vec<CrackedAccount>,
}

/// Pairs dump entries with recovered passwords, NT hash first, then LM.
/// Entries with no recovered password are left out.
pub fn match_passwords(
    entries: &[DumpEntry],
    cracked: &BTreeMap<String, String>,
) -> Vec<CrackedAccount> {
    entries
        .iter()
        .filter_map(|entry| {
            let password = cracked
                .get(&entry.nt_hash.to_ascii_lowercase())
                .or_else(|| cracked.get(&entry.lm_hash.to_ascii_lowercase()))?;
            Some(CrackedAccount {
                domain: entry.domain.clone(),
                username: entry.username.clone(),
                password: password.clone(),
            })
        })
        .collect()
}

impl Report {
    pub fn build(entries: Vec<DumpEntry>, cracked: &BTreeMap<String, String>) -> Self {
        let cracked_passwords = match_passwords(&entries, cracked);
        Self { all_hashes: entries, cracked_passwords }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| Error::Io { path: path.to_path_buf(), source })
    }
}

/// Reads a text file, mapping a missing file to [`Error::InputNotFound`].
/// Undecodable bytes are replaced rather than rejected.
pub fn read_text(path: &Path) -> Result<String> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::InputNotFound { path: path.to_path_buf() })
        }
        Err(source) => Err(Error::Io { path: path.to_path_buf(), source }),
    }
}

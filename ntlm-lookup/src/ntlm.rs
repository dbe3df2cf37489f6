//! Local NT hash computation, for checking one known password offline.
//!
//! Hash lists for the local check are looser than bulk lookup input: besides
//! bare hashes and dump lines they may carry `<user>:<nt hash>` pairs, and
//! `#` starts a comment line.

use std::path::Path;

use md4::{Digest, Md4};

use crate::error::Result;
use crate::extract::{HashRecord, NTLM_HEX_LEN, is_hex_digest, parse_dump_line, read_input};

/// Hex lookup table for digest rendering.
pub const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Raw NT hash: MD4 over the UTF-16LE encoding of `password`.
pub fn nt_hash_bytes(password: &str) -> [u8; 16] {
    let mut hasher = Md4::new();
    for unit in password.encode_utf16() {
        hasher.update(unit.to_le_bytes());
    }
    hasher.finalize().into()
}

/// NT hash of `password` as 32 lowercase hex characters.
pub fn nt_hash(password: &str) -> String {
    let digest = nt_hash_bytes(password);
    let mut out = String::with_capacity(32);
    for byte in digest {
        out.push(HEX_CHARS[(byte >> 4) as usize] as char);
        out.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Extracts the lowercase NT hash from one hash list line.
///
/// Accepts a dump line, a `<user>:<hash>[:...]` line (second field), or a
/// bare hash. Comment and blank lines yield `None`.
pub fn parse_hash_list_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if let Some((_, nt)) = parse_dump_line(line) {
        return Some(nt.to_ascii_lowercase());
    }

    let candidate = match line.split(':').nth(1) {
        Some(field) => field.trim(),
        None => line,
    };
    is_hex_digest(candidate, NTLM_HEX_LEN).then(|| candidate.to_ascii_lowercase())
}

/// Reads a hash list for the local check, warning once per unusable line.
pub async fn read_hash_list(path: &Path) -> Result<Vec<HashRecord>> {
    let text = read_input(path).await?;

    let mut records = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_hash_list_line(trimmed) {
            Some(hash) => records.push(HashRecord { raw_line: line.to_string(), canonical_hash: hash }),
            None => tracing::warn!(
                path = %path.display(),
                line = lineno + 1,
                "skipping line without an NT hash"
            ),
        }
    }
    Ok(records)
}

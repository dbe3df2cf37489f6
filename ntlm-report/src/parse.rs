use std::collections::BTreeMap;

use ntlm_lookup::NOT_FOUND_MARKER;

use crate::DumpEntry;

/// Parses credential dump lines with at least four colon-separated fields.
pub fn parse_dump(text: &str) -> Vec<DumpEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() < 4 {
                return None;
            }

            let (domain, username) = match parts[0].split_once('\\') {
                Some((domain, user)) => (domain, user),
                None => ("", parts[0]),
            };

            Some(DumpEntry {
                domain: domain.to_string(),
                username: username.to_string(),
                uid: parts[1].to_string(),
                lm_hash: parts[2].to_string(),
                nt_hash: parts[3].to_string(),
                full_entry: line.to_string(),
            })
        })
        .collect()
}

/// Parses lookup results into a lowercase-hash -> password map.
///
/// Accepts `hash:password` and `hash password` lines. Not-found lines and
/// status lines (anything whose key is not hex) are skipped. A later line for
/// the same hash replaces an earlier one.
pub fn parse_cracked(text: &str) -> BTreeMap<String, String> {
    let mut cracked = BTreeMap::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.to_ascii_lowercase().contains(NOT_FOUND_MARKER) {
            continue;
        }

        let Some((hash, password)) = line.split_once(':').or_else(|| line.split_once(' ')) else {
            continue;
        };
        let (hash, password) = (hash.trim(), password.trim());

        if hash.is_empty() || password.is_empty() || !hash.bytes().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        cracked.insert(hash.to_ascii_lowercase(), password.to_string());
    }

    cracked
}

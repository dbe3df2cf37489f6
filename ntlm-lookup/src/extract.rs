//! Canonical hash extraction from raw hash lists and credential dumps.
//!
//! Two line shapes are understood:
//!
//! - a bare hex digest (`5835048ce94ad0564e29a924a03510ef`)
//! - a dump line `[domain\]user:uid:lmhash:nthash:::`, as produced by
//!   secretsdump-style tools
//!
//! Anything else is skipped without complaint. Extraction is best-effort,
//! not validation.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::config::HashType;
use crate::error::{Error, Result};

/// Length of an LM or NT hash in hex characters.
pub const NTLM_HEX_LEN: usize = 32;

/// A line of input together with the canonical hash found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub raw_line: String,
    pub canonical_hash: String,
}

/// Returns true if `s` is exactly `len` ASCII hex characters.
#[inline]
pub fn is_hex_digest(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|c| c.is_ascii_hexdigit())
}

/// Splits a dump line into its `(lm_hash, nt_hash)` fields.
///
/// Matches `*:<digits>:<32 hex>:<32 hex>:::`. Text after the trailing `:::`
/// (e.g. `(status=Enabled)`) is ignored.
pub fn parse_dump_line(line: &str) -> Option<(&str, &str)> {
    let (fields, _) = line.split_once(":::")?;

    // user may itself be empty, but the separator before uid must exist
    let mut parts = fields.rsplitn(4, ':');
    let nt = parts.next()?;
    let lm = parts.next()?;
    let uid = parts.next()?;
    parts.next()?;

    let uid_ok = !uid.is_empty() && uid.bytes().all(|c| c.is_ascii_digit());
    if uid_ok && is_hex_digest(lm, NTLM_HEX_LEN) && is_hex_digest(nt, NTLM_HEX_LEN) {
        Some((lm, nt))
    } else {
        None
    }
}

/// Extracts the lowercase canonical hash of `hash_type` from one input line.
pub fn parse_line(line: &str, hash_type: HashType) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some((lm, nt)) = parse_dump_line(line) {
        match hash_type {
            HashType::Nt => return Some(nt.to_ascii_lowercase()),
            HashType::Lm => return Some(lm.to_ascii_lowercase()),
            _ => {}
        }
    }

    is_hex_digest(line, hash_type.hex_len()).then(|| line.to_ascii_lowercase())
}

/// Lazily yields distinct [`HashRecord`]s in first-seen order.
pub struct HashExtractor<I> {
    lines: I,
    hash_type: HashType,
    seen: HashSet<String>,
}

impl<I, S> Iterator for HashExtractor<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = HashRecord;

    fn next(&mut self) -> Option<HashRecord> {
        for line in self.lines.by_ref() {
            let line = line.as_ref();
            let Some(hash) = parse_line(line, self.hash_type) else {
                continue;
            };
            if self.seen.insert(hash.clone()) {
                return Some(HashRecord { raw_line: line.to_string(), canonical_hash: hash });
            }
        }
        None
    }
}

/// Builds a deduplicating extractor over `lines`.
pub fn extract<I, S>(lines: I, hash_type: HashType) -> HashExtractor<I::IntoIter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    HashExtractor { lines: lines.into_iter(), hash_type, seen: HashSet::new() }
}

/// Deduplicated set of canonical hashes with a stable, sorted ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalHashes {
    hashes: BTreeSet<String>,
}

impl CanonicalHashes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Iterates hashes in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hashes.iter().map(String::as_str)
    }

    /// The deterministic ordering handed to the chunker.
    pub fn sorted(&self) -> Vec<String> {
        self.hashes.iter().cloned().collect()
    }
}

impl FromIterator<HashRecord> for CanonicalHashes {
    fn from_iter<T: IntoIterator<Item = HashRecord>>(iter: T) -> Self {
        Self { hashes: iter.into_iter().map(|r| r.canonical_hash).collect() }
    }
}

impl Extend<HashRecord> for CanonicalHashes {
    fn extend<T: IntoIterator<Item = HashRecord>>(&mut self, iter: T) {
        self.hashes.extend(iter.into_iter().map(|r| r.canonical_hash));
    }
}

/// Reads `path` and extracts its canonical hashes.
///
/// A missing file is [`Error::InputNotFound`]; an empty file yields an empty set.
/// Invalid UTF-8 is replaced rather than rejected.
pub async fn read_hashes(path: &Path, hash_type: HashType) -> Result<CanonicalHashes> {
    let text = read_input(path).await?;

    let hashes: CanonicalHashes = extract(text.lines(), hash_type).collect();
    tracing::debug!(path = %path.display(), count = hashes.len(), "extracted hashes");
    Ok(hashes)
}

/// Reads an input file as text, replacing invalid UTF-8.
pub(crate) async fn read_input(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::InputNotFound { path: path.to_path_buf() },
        _ => Error::InputRead { path: path.to_path_buf(), source: e },
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP_LINE: &str =
        "CORP\\jdoe:1001:aad3b435b51404eeaad3b435b51404ee:5835048ce94ad0564e29a924a03510ef:::";

    #[test]
    fn test_dump_line_yields_nt_hash() {
        assert_eq!(
            parse_line(DUMP_LINE, HashType::Nt).as_deref(),
            Some("5835048ce94ad0564e29a924a03510ef")
        );
    }

    #[test]
    fn test_dump_line_yields_lm_hash_for_lm_type() {
        assert_eq!(
            parse_line(DUMP_LINE, HashType::Lm).as_deref(),
            Some("aad3b435b51404eeaad3b435b51404ee")
        );
    }

    #[test]
    fn test_dump_line_without_domain_and_with_status_suffix() {
        let line = "Administrator:500:AAD3B435B51404EEAAD3B435B51404EE:31D6CFE0D16AE931B73C59D7E0C089C0::: (status=Disabled)";
        assert_eq!(
            parse_line(line, HashType::Nt).as_deref(),
            Some("31d6cfe0d16ae931b73c59d7e0c089c0")
        );
    }

    #[test]
    fn test_raw_hash_is_lowercased() {
        assert_eq!(
            parse_line("  5835048CE94AD0564E29A924A03510EF \t", HashType::Nt).as_deref(),
            Some("5835048ce94ad0564e29a924a03510ef")
        );
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        for line in [
            "",
            "   ",
            "# comment",
            "5835048ce94ad0564e29a924a03510e",
            "5835048ce94ad0564e29a924a03510efa",
            "5835048ce94ad0564e29a924a03510eg",
            "jdoe:abc:aad3b435b51404eeaad3b435b51404ee:5835048ce94ad0564e29a924a03510ef:::",
            "jdoe:1001:aad3b435b51404ee:5835048ce94ad0564e29a924a03510ef:::",
            "1001:aad3b435b51404eeaad3b435b51404ee:5835048ce94ad0564e29a924a03510ef:::",
        ] {
            assert_eq!(parse_line(line, HashType::Nt), None, "line {line:?}");
        }
    }

    #[test]
    fn test_sha1_uses_its_own_length() {
        let sha1 = "CBFDAC6008F9CAB4083784CBD1874F76618D2A97";
        assert_eq!(parse_line(sha1, HashType::Sha1).as_deref(), Some(&*sha1.to_lowercase()));
        assert_eq!(parse_line(sha1, HashType::Nt), None);
        assert_eq!(parse_line(DUMP_LINE, HashType::Sha1), None);
    }

    #[test]
    fn test_extract_dedups_in_first_seen_order() {
        let lines = [
            "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "garbage",
            "  bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb  ",
            "x\\y:1:aad3b435b51404eeaad3b435b51404ee:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa:::",
        ];
        let records: Vec<HashRecord> = extract(lines, HashType::Nt).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].canonical_hash, "b".repeat(32));
        assert_eq!(records[0].raw_line, "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
        assert_eq!(records[1].canonical_hash, "a".repeat(32));
    }

    #[test]
    fn test_canonical_hashes_are_sorted() {
        let lines = ["cccccccccccccccccccccccccccccccc", "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", DUMP_LINE];
        let hashes: CanonicalHashes = extract(lines, HashType::Nt).collect();

        assert_eq!(
            hashes.sorted(),
            vec![
                "5835048ce94ad0564e29a924a03510ef".to_string(),
                "a".repeat(32),
                "c".repeat(32),
            ]
        );
    }

    #[test]
    fn test_padding_and_duplicates_do_not_change_the_set() {
        let plain = ["aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", DUMP_LINE];
        let noisy = [
            "  aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "",
            DUMP_LINE,
            "\tAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\t",
            DUMP_LINE,
        ];

        let a: CanonicalHashes = extract(plain, HashType::Nt).collect();
        let b: CanonicalHashes = extract(noisy, HashType::Nt).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_extend_merges_without_duplicates() {
        let mut hashes: CanonicalHashes =
            extract(["cccccccccccccccccccccccccccccccc"], HashType::Nt).collect();
        hashes.extend(extract(
            ["aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC"],
            HashType::Nt,
        ));

        assert_eq!(hashes.sorted(), vec!["a".repeat(32), "c".repeat(32)]);
    }

    #[tokio::test]
    async fn test_read_hashes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        match read_hashes(&path, HashType::Nt).await {
            Err(Error::InputNotFound { path: p }) => assert_eq!(p, path),
            other => panic!("expected InputNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_hashes_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let hashes = read_hashes(file.path(), HashType::Nt).await.unwrap();
        assert!(hashes.is_empty());
    }
}

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::Arc;

use crate::commit::{CommitRecord, Signature};
use crate::error::{Result, ScanError};
use crate::timezone::TimezoneCache;

/// Separator between commits in `git log -z` output
pub const RECORD_SEPARATOR: char = '\0';

/// Indentation git puts in front of every message line in raw format
pub const MESSAGE_INDENT: usize = 4;

/// Parser for `git log --pretty=raw -z` output.
///
/// Owns the [`TimezoneCache`] used to resolve signature offsets. The cache
/// can be shared with other parsers through [`LogParser::with_cache`].
#[derive(Debug, Default)]
pub struct LogParser {
    timezones: Arc<TimezoneCache>,
}

impl LogParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(timezones: Arc<TimezoneCache>) -> Self {
        Self { timezones }
    }

    pub fn timezones(&self) -> &TimezoneCache {
        &self.timezones
    }

    /// Lazily parse a raw log, one result per non-empty record
    pub fn entries<'a>(&'a self, log: &'a str) -> Entries<'a> {
        Entries {
            parser: self,
            chunks: log.split(RECORD_SEPARATOR),
            index: 0,
        }
    }

    /// Parse a whole raw log, stopping at the first malformed record
    pub fn parse(&self, log: &str) -> Result<Vec<CommitRecord>> {
        self.entries(log).collect()
    }

    /// Parse a single NUL-free record. `index` is only used in diagnostics.
    pub fn parse_entry(&self, chunk: &str, index: usize) -> Result<CommitRecord> {
        let chunk = chunk.trim_start_matches('\n').trim_end_matches('\n');
        let (header_block, message) = match chunk.split_once("\n\n") {
            Some((headers, message)) => (headers, Some(message)),
            None => (chunk, None),
        };

        let mut commit = None;
        let mut parents = Vec::new();
        let mut tree = None;
        let mut author = None;
        let mut committer = None;
        let mut extra_headers = IndexMap::new();

        for (key, value) in fold_headers(header_block, index)? {
            match key {
                "commit" => commit = Some(value),
                "parent" => parents.push(value),
                "tree" => tree = Some(value),
                "author" => author = Some(value),
                "committer" => committer = Some(value),
                _ => {
                    extra_headers.insert(key.to_string(), value);
                }
            }
        }

        let commit = commit.ok_or_else(|| ScanError::MalformedLogEntry {
            index,
            reason: "missing 'commit' header".to_string(),
        })?;

        let author = author
            .map(|raw| self.parse_signature(raw, "author", index))
            .transpose()?;
        let committer = committer
            .map(|raw| self.parse_signature(raw, "committer", index))
            .transpose()?;

        Ok(CommitRecord {
            commit,
            parents,
            tree,
            author,
            committer,
            message: message.map(strip_message_indent),
            extra_headers,
        })
    }

    /// Split `name <email> epoch ±HHMM` from the right and derive the date.
    fn parse_signature(&self, raw: String, role: &str, index: usize) -> Result<Signature> {
        let malformed = |reason: String| ScanError::MalformedLogEntry { index, reason };

        let mut parts = raw.rsplitn(4, ' ');
        let (offset, epoch, email, name) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(offset), Some(epoch), Some(email), Some(name)) => (offset, epoch, email, name),
            _ => {
                return Err(malformed(format!(
                    "'{}' header '{}' is not 'name <email> epoch offset'",
                    role, raw
                )))
            }
        };

        let seconds: f64 = epoch
            .parse()
            .map_err(|_| malformed(format!("'{}' header has invalid epoch '{}'", role, epoch)))?;
        let instant = instant_from_epoch(seconds).ok_or_else(|| {
            malformed(format!("'{}' header epoch {} is out of range", role, epoch))
        })?;
        let zone = self.timezones.resolve(offset)?;

        let email = email
            .strip_prefix('<')
            .and_then(|e| e.strip_suffix('>'))
            .unwrap_or(email)
            .to_string();
        let name = name.to_string();

        Ok(Signature {
            date: instant.with_timezone(&zone.fixed_offset()),
            raw,
            name,
            email,
        })
    }
}

/// Iterator returned by [`LogParser::entries`]
pub struct Entries<'a> {
    parser: &'a LogParser,
    chunks: std::str::Split<'a, char>,
    index: usize,
}

impl Iterator for Entries<'_> {
    type Item = Result<CommitRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        for chunk in self.chunks.by_ref() {
            if chunk.trim_matches('\n').is_empty() {
                continue;
            }
            let index = self.index;
            self.index += 1;
            return Some(self.parser.parse_entry(chunk, index));
        }
        None
    }
}

/// Join continuation lines (leading single space) onto the preceding header
/// and split each header on its first space.
fn fold_headers(block: &str, index: usize) -> Result<Vec<(&str, String)>> {
    let mut headers: Vec<(&str, String)> = Vec::new();

    for line in block.split('\n') {
        if let Some(continuation) = line.strip_prefix(' ') {
            let Some((_, value)) = headers.last_mut() else {
                return Err(ScanError::MalformedLogEntry {
                    index,
                    reason: "continuation line before the first header".to_string(),
                });
            };
            value.push('\n');
            value.push_str(continuation);
            continue;
        }

        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        headers.push((key, value.to_string()));
    }

    Ok(headers)
}

/// Remove up to [`MESSAGE_INDENT`] leading spaces from every line
fn strip_message_indent(message: &str) -> String {
    message
        .split('\n')
        .map(|line| {
            let indent = line
                .bytes()
                .take(MESSAGE_INDENT)
                .take_while(|b| *b == b' ')
                .count();
            &line[indent..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Interpret floating-point epoch seconds as a UTC instant
fn instant_from_epoch(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn raw_commit(hash: &str, signature: &str, message: &str) -> String {
        format!(
            "commit {}\ntree 1111111111111111111111111111111111111111\nauthor {}\ncommitter {}\n\n    {}\n",
            hash, signature, signature, message
        )
    }

    #[test]
    fn test_parse_two_commits() {
        let log = format!(
            "{}\0{}\0",
            raw_commit(HASH_A, "A <a@x> 1000000000 +0000", "fix memory leak"),
            raw_commit(HASH_B, "B <b@x> 1000000100 +0000", "update docs"),
        );
        let records = LogParser::new().parse(&log).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].commit, HASH_A);
        assert_eq!(records[0].message.as_deref(), Some("fix memory leak"));
        assert_eq!(records[1].commit, HASH_B);
        assert_eq!(records[1].message.as_deref(), Some("update docs"));
        assert_eq!(
            records[0].tree.as_deref(),
            Some("1111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn test_signature_derivation() {
        let log = raw_commit(HASH_A, "A U Thor <author@example.com> 1000000000 +0200", "msg");
        let record = LogParser::new().parse_entry(&log, 0).unwrap();
        let author = record.author.unwrap();

        assert_eq!(author.raw, "A U Thor <author@example.com> 1000000000 +0200");
        assert_eq!(author.name, "A U Thor");
        assert_eq!(author.email, "author@example.com");
        assert_eq!(author.date.timestamp(), 1_000_000_000);
        assert_eq!(author.date.offset().local_minus_utc(), 7200);
        assert_eq!(author.date.to_rfc3339(), "2001-09-09T03:46:40+02:00");
    }

    #[test]
    fn test_epoch_zero_with_negative_half_hour_offset() {
        let log = raw_commit(HASH_A, "A <a@x> 0 -0530", "msg");
        let parser = LogParser::new();
        let record = parser.parse_entry(&log, 0).unwrap();
        let date = record.committer.unwrap().date;

        assert_eq!(date, Utc.timestamp_opt(0, 0).unwrap());
        assert_eq!(date.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(parser.timezones().resolve("-0530").unwrap().offset_string(), "-0530");
        assert_eq!(date.format("%z").to_string(), "-0530");
    }

    #[test]
    fn test_fractional_epoch() {
        let log = raw_commit(HASH_A, "A <a@x> 10.5 +0000", "msg");
        let record = LogParser::new().parse_entry(&log, 0).unwrap();
        let date = record.author.unwrap().date;
        assert_eq!(date.timestamp(), 10);
        assert_eq!(date.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_offsets_share_cache() {
        let log = format!(
            "{}\0{}",
            raw_commit(HASH_A, "A <a@x> 1 +0100", "one"),
            raw_commit(HASH_B, "B <b@x> 2 +0100", "two"),
        );
        let parser = LogParser::new();
        parser.parse(&log).unwrap();
        assert_eq!(parser.timezones().len(), 1);
    }

    #[test]
    fn test_merge_commit_keeps_all_parents() {
        let log = format!(
            "commit {}\ntree t\nparent {}\nparent {}\nauthor A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\n\n    Merge branch 'x'\n",
            HASH_A, HASH_B, "cccccccccccccccccccccccccccccccccccccccc"
        );
        let record = LogParser::new().parse_entry(&log, 0).unwrap();
        assert_eq!(
            record.parents,
            vec![HASH_B.to_string(), "cccccccccccccccccccccccccccccccccccccccc".to_string()]
        );
        assert!(record.is_merge());
    }

    #[test]
    fn test_root_commit_has_no_parents() {
        let log = raw_commit(HASH_A, "A <a@x> 1 +0000", "initial");
        let record = LogParser::new().parse_entry(&log, 0).unwrap();
        assert!(record.parents.is_empty());
    }

    #[test]
    fn test_message_indent_stripped_per_line() {
        let log = format!(
            "commit {}\n\n    line one\n  line two\n        nested\n\n    last",
            HASH_A
        );
        let record = LogParser::new().parse_entry(&log, 0).unwrap();
        assert_eq!(
            record.message.as_deref(),
            Some("line one\nline two\n    nested\n\nlast")
        );
    }

    #[test]
    fn test_no_blank_line_means_no_message() {
        let log = format!("commit {}\ntree t", HASH_A);
        let record = LogParser::new().parse_entry(&log, 0).unwrap();
        assert_eq!(record.message, None);
        assert_eq!(record.author, None);
        assert_eq!(record.committer, None);
    }

    #[test]
    fn test_continuation_lines_are_folded() {
        let log = format!(
            "commit {}\ngpgsig -----BEGIN PGP SIGNATURE-----\n \n iQEzBAABCAAdFiEE\n -----END PGP SIGNATURE-----\nauthor A <a@x> 1 +0000\n\n    signed",
            HASH_A
        );
        let record = LogParser::new().parse_entry(&log, 0).unwrap();
        assert_eq!(
            record.extra_headers.get("gpgsig").map(String::as_str),
            Some("-----BEGIN PGP SIGNATURE-----\n\niQEzBAABCAAdFiEE\n-----END PGP SIGNATURE-----")
        );
        assert_eq!(record.author.unwrap().name, "A");
        assert_eq!(record.message.as_deref(), Some("signed"));
    }

    #[test]
    fn test_duplicate_single_valued_header_last_wins() {
        let log = format!("commit {}\nencoding latin1\nencoding UTF-8\ntree t1\ntree t2", HASH_A);
        let record = LogParser::new().parse_entry(&log, 0).unwrap();
        assert_eq!(record.get("encoding").as_deref(), Some("UTF-8"));
        assert_eq!(record.tree.as_deref(), Some("t2"));
    }

    #[test]
    fn test_empty_chunks_are_skipped() {
        let log = format!(
            "\0{}\0\n\0{}\0",
            raw_commit(HASH_A, "A <a@x> 1 +0000", "one"),
            raw_commit(HASH_B, "A <a@x> 2 +0000", "two"),
        );
        let records = LogParser::new().parse(&log).unwrap();
        assert_eq!(records.len(), 2);
        assert!(LogParser::new().parse("").unwrap().is_empty());
    }

    #[test]
    fn test_missing_commit_header() {
        let log = format!(
            "{}\0tree t\nauthor A <a@x> 1 +0000\n\n    orphan",
            raw_commit(HASH_A, "A <a@x> 1 +0000", "ok")
        );
        match LogParser::new().parse(&log) {
            Err(ScanError::MalformedLogEntry { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("commit"));
            }
            other => panic!("expected MalformedLogEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_offset_propagates_unchanged() {
        let log = raw_commit(HASH_A, "A <a@x> 1 +01:00", "msg");
        match LogParser::new().parse(&log) {
            Err(ScanError::MalformedOffset(offset)) => assert_eq!(offset, "+01:00"),
            other => panic!("expected MalformedOffset, got {:?}", other),
        }
    }

    #[test]
    fn test_short_signature_rejected() {
        let log = format!("commit {}\nauthor <a@x> 1\n\n    msg", HASH_A);
        assert!(matches!(
            LogParser::new().parse_entry(&log, 3),
            Err(ScanError::MalformedLogEntry { index: 3, .. })
        ));
    }

    #[test]
    fn test_non_numeric_epoch_rejected() {
        let log = format!("commit {}\ncommitter A <a@x> soon +0000", HASH_A);
        match LogParser::new().parse_entry(&log, 0) {
            Err(ScanError::MalformedLogEntry { reason, .. }) => assert!(reason.contains("soon")),
            other => panic!("expected MalformedLogEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_author_name() {
        let log = format!("commit {}\nauthor  <a@x> 5 +0000", HASH_A);
        let author = LogParser::new().parse_entry(&log, 0).unwrap().author.unwrap();
        assert_eq!(author.name, "");
        assert_eq!(author.email, "a@x");
    }

    #[test]
    fn test_lazy_entries_stop_at_error() {
        let log = format!(
            "{}\0commit {}\nauthor A <a@x> 1 bogus\0{}",
            raw_commit(HASH_A, "A <a@x> 1 +0000", "one"),
            HASH_B,
            raw_commit(HASH_A, "A <a@x> 1 +0000", "three"),
        );
        let parser = LogParser::new();
        let mut entries = parser.entries(&log);
        assert!(entries.next().unwrap().is_ok());
        assert!(entries.next().unwrap().is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_record_count_and_order_preserved(
            messages in proptest::collection::vec("[a-z]{1,12}( [a-z]{1,12}){0,3}", 0..20),
            trailing_separator in proptest::bool::ANY,
        ) {
            let mut chunks = Vec::new();
            for (i, message) in messages.iter().enumerate() {
                chunks.push(raw_commit(&format!("{:040x}", i), "A <a@x> 1 +0000", message));
            }
            let mut log = chunks.join("\0");
            if trailing_separator {
                log.push('\0');
            }

            let records = LogParser::new().parse(&log).unwrap();
            proptest::prop_assert_eq!(records.len(), messages.len());
            for (i, record) in records.iter().enumerate() {
                proptest::prop_assert_eq!(&record.commit, &format!("{:040x}", i));
                proptest::prop_assert_eq!(record.message.as_deref(), Some(messages[i].as_str()));
            }
        }
    }
}

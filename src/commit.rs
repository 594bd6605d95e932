use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Display format used when a date is rendered as a field value
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// An `author` or `committer` header together with the parts derived from it.
///
/// A signature is only ever built whole, so a record either has all of
/// name, email and date for a role or none of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Header value as it appeared in the log: `name <email> epoch ±HHMM`
    pub raw: String,
    pub name: String,
    pub email: String,
    /// Absolute instant, displayed in the offset recorded by git
    pub date: DateTime<FixedOffset>,
}

/// One commit parsed from a raw git log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit: String,
    /// Parent hashes in header order: empty for a root commit, several for a merge
    pub parents: Vec<String>,
    pub tree: Option<String>,
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
    /// Message body with the log's indentation removed
    pub message: Option<String>,
    /// Every other header (`encoding`, `gpgsig`, `mergetag`, ...), last occurrence wins
    pub extra_headers: IndexMap<String, String>,
}

impl CommitRecord {
    pub fn new(commit: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
            parents: Vec::new(),
            tree: None,
            author: None,
            committer: None,
            message: None,
            extra_headers: IndexMap::new(),
        }
    }

    /// Abbreviated hash as shown by `git log --oneline`
    pub fn short_hash(&self) -> &str {
        let end = self
            .commit
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.commit.len());
        &self.commit[..end]
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Look up a field by its log name.
    ///
    /// Accepts the raw header names, the derived `author.*` / `committer.*`
    /// names and `commit message`. Repeated `parent` values are joined with
    /// a space.
    pub fn get(&self, field: &str) -> Option<String> {
        match field {
            "commit" => Some(self.commit.clone()),
            "parent" => {
                if self.parents.is_empty() {
                    None
                } else {
                    Some(self.parents.join(" "))
                }
            }
            "tree" => self.tree.clone(),
            "commit message" => self.message.clone(),
            _ => {
                if let Some(value) = signature_field(self.author.as_ref(), "author", field) {
                    return value;
                }
                if let Some(value) = signature_field(self.committer.as_ref(), "committer", field) {
                    return value;
                }
                self.extra_headers.get(field).cloned()
            }
        }
    }
}

/// Resolve `role`, `role.name`, `role.email` and `role.date`.
/// Returns `None` when `field` does not belong to `role` at all.
fn signature_field(
    signature: Option<&Signature>,
    role: &str,
    field: &str,
) -> Option<Option<String>> {
    let suffix = field.strip_prefix(role)?;
    let value = match suffix {
        "" => signature.map(|s| s.raw.clone()),
        ".name" => signature.map(|s| s.name.clone()),
        ".email" => signature.map(|s| s.email.clone()),
        ".date" => signature.map(|s| s.date.format(DATE_FORMAT).to_string()),
        _ => return None,
    };
    Some(value)
}

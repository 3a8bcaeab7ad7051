use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// One fragment of a message body, in the order it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// Raw HTML (or plain text) appended verbatim.
    Text(String),
    Image(ImageBlock),
}

/// Inline image request. Width and height are CSS values passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBlock {
    pub path: PathBuf,
    pub width: Option<String>,
    pub height: Option<String>,
    /// When set, no `<img>` tag is generated: the caller references `cid:` itself.
    pub cid: Option<String>,
}

/// Image loaded during body assembly, ready to become a `Content-ID` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub cid: String,
    pub mime_subtype: String,
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Why an image block produced no inline part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Missing(PathBuf),
    NotAnImage { path: PathBuf, mime: String },
    Unreadable { path: PathBuf, error: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Missing(p) => write!(f, "image {} no longer exists", p.display()),
            SkipReason::NotAnImage { path, mime } => {
                write!(f, "{} guessed as {mime}, not an image", path.display())
            }
            SkipReason::Unreadable { path, error } => {
                write!(f, "cannot read {}: {error}", path.display())
            }
        }
    }
}

/// One address or many; duplicates are collapsed when normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// Distinct addresses in first-occurrence order.
    ///
    /// Surrounding whitespace is trimmed, and the trimmed form is what a
    /// [`DeliveryResult`] reports, so `" a@x.com"` and `"a@x.com"` count as one
    /// recipient.
    pub fn normalized(&self) -> Vec<String> {
        let mut seen = HashSet::with_capacity(self.0.len());
        self.0
            .iter()
            .map(|r| r.trim())
            .filter(|r| seen.insert(*r))
            .map(str::to_string)
            .collect()
    }
}

impl From<&str> for Recipients {
    fn from(v: &str) -> Self {
        Recipients(vec![v.to_string()])
    }
}

impl From<String> for Recipients {
    fn from(v: String) -> Self {
        Recipients(vec![v])
    }
}

impl From<Vec<String>> for Recipients {
    fn from(v: Vec<String>) -> Self {
        Recipients(v)
    }
}

impl From<Vec<&str>> for Recipients {
    fn from(v: Vec<&str>) -> Self {
        Recipients(v.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Recipients {
    fn from(v: &[&str]) -> Self {
        Recipients(v.iter().map(|s| s.to_string()).collect())
    }
}

/// Outcome of a batch: each recipient is in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub sent: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

impl DeliveryResult {
    pub fn total(&self) -> usize {
        self.sent.len() + self.failed.len()
    }
}

/// Attachment kept in memory, never written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A message retrieved by [`EzReader`](crate::mail::imap_client::EzReader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EzMail {
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
    pub date: Option<DateTime<Utc>>,
}

impl EzMail {
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Body flattened to one line, cut at `max_length` chars with a trailing `...`.
    pub fn summary(&self, max_length: usize) -> String {
        let text = self.body.replace('\n', " ");
        let text = text.trim();
        if text.chars().count() <= max_length {
            text.to_string()
        } else {
            let mut out: String = text.chars().take(max_length).collect();
            out.push_str("...");
            out
        }
    }
}

impl fmt::Display for EzMail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<EzMail from={:?} subject={:?} attachments={}>",
            self.sender,
            self.subject,
            self.attachments.len()
        )
    }
}

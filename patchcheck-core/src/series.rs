//! Patch series selection.
//!
//! A query usually returns every revision of a series plus review replies.
//! Selection keeps the messages whose body carries a hunk, orders them by
//! `(version, number)` parsed from the subject and drops all but the newest
//! version.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::diff::PatchSet;
use crate::error::DiffError;
use crate::mail::MailMessage;

/// A hunk header at the start of a body line.
static HUNK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n@@ [0-9 +,-]+ @@").unwrap());

/// `N/M]` position within a series.
static SERIES_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)/[0-9]+\]").unwrap());

/// `vN` revision inside the leading bracket, followed by a space or the
/// closing bracket: `[PATCH v2 1/3]`, `[PATCHv3]`, `[PATCH net-next v4]`.
static SERIES_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(?:[^\]]*[ ])?(?:PATCH)?v([0-9]+)[ \]]").unwrap());

/// True when `body` contains at least one hunk header line.
pub fn is_patch(body: &str) -> bool {
    HUNK_MARKER.is_match(body)
}

/// Position of a message in its series, parsed from the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PatchIdentity {
    /// Revision; 1 when the subject names none.
    pub version: u32,
    /// Position within the revision; 0 for a lone patch or cover letter.
    pub number: u32,
}

impl PatchIdentity {
    pub fn from_subject(subject: &str) -> Self {
        let capture = |re: &Regex| {
            re.captures(subject)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        };
        Self {
            version: capture(&SERIES_VERSION).unwrap_or(1),
            number: capture(&SERIES_NUMBER).unwrap_or(0),
        }
    }
}

/// Collapses runs of whitespace to one space and trims the ends.
pub fn normalize_subject(subject: &str) -> String {
    subject.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A message selected as part of the patch series.
#[derive(Debug, Clone)]
pub struct PatchMessage {
    message: MailMessage,
    identity: PatchIdentity,
}

impl PatchMessage {
    /// Wraps `message` if its body carries a hunk.
    pub fn from_message(message: MailMessage) -> Option<Self> {
        if !is_patch(message.body()) {
            return None;
        }
        let identity = PatchIdentity::from_subject(message.subject());
        Some(Self { message, identity })
    }

    pub fn identity(&self) -> PatchIdentity {
        self.identity
    }

    /// Subject as it appears in the message headers.
    pub fn subject(&self) -> &str {
        self.message.subject()
    }

    /// Subject with whitespace normalized, as used in reports.
    pub fn display_subject(&self) -> String {
        normalize_subject(self.message.subject())
    }

    pub fn body(&self) -> &str {
        self.message.body()
    }

    pub fn message(&self) -> &MailMessage {
        &self.message
    }

    /// Parses the diff carried by the body.
    pub fn diff(&self) -> Result<PatchSet, DiffError> {
        PatchSet::parse(self.message.body())
    }
}

/// The newest revision of a series, in series order.
#[derive(Debug, Clone, Default)]
pub struct PatchSeries {
    patches: Vec<PatchMessage>,
}

impl PatchSeries {
    /// Filters, orders and reduces `messages` to the newest revision.
    ///
    /// The ordering is stable: messages sharing an identity keep their
    /// query order.
    pub fn select(messages: impl IntoIterator<Item = MailMessage>) -> Self {
        let mut patches: Vec<PatchMessage> = messages
            .into_iter()
            .filter_map(PatchMessage::from_message)
            .collect();
        patches.sort_by_key(PatchMessage::identity);

        let newest = patches.iter().map(|p| p.identity.version).max();
        if let Some(newest) = newest {
            patches.retain(|p| p.identity.version == newest);
        }
        debug!(patches = patches.len(), version = ?newest, "Selected patch series");
        Self { patches }
    }

    /// Revision of the selected patches, if any were selected.
    pub fn version(&self) -> Option<u32> {
        self.patches.first().map(|p| p.identity.version)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchMessage> {
        self.patches.iter()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

impl<'a> IntoIterator for &'a PatchSeries {
    type Item = &'a PatchMessage;
    type IntoIter = std::slice::Iter<'a, PatchMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}

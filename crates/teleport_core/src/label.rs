//! Source endpoint labels.
//!
//! A label is the sole identity of a source endpoint: a short, case-sensitive
//! string chosen by the user or drawn at random. Uniqueness across live
//! sources is enforced one layer up, by the [`Directory`](crate::Directory).

use std::fmt;
use std::str::FromStr;

use rand::distr::{Alphanumeric, SampleString};

use crate::types::TeleportError;

/// Maximum label length in bytes (the label text box is this wide).
pub const MAX_LABEL_LEN: usize = 4;

/// A validated, non-empty label.
///
/// An unbound relay target is represented as `Option<Label>::None`, never as
/// an empty `Label`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(String);

impl Label {
    /// Validate arbitrary text as a label. Empty and oversized strings are
    /// rejected; any other content is accepted verbatim, case preserved.
    pub fn parse(text: &str) -> Result<Self, TeleportError> {
        if text.is_empty() {
            return Err(TeleportError::EmptyLabel);
        }
        if text.len() > MAX_LABEL_LEN {
            return Err(TeleportError::LabelTooLong(text.to_owned()));
        }
        Ok(Label(text.to_owned()))
    }

    /// Draw a random full-length alphanumeric label. The caller is
    /// responsible for rejecting collisions against live sources.
    pub fn random() -> Self {
        Label(Alphanumeric.sample_string(&mut rand::rng(), MAX_LABEL_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Label {
    type Err = TeleportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::parse(s)
    }
}

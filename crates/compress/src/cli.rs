//! Compression CLI Helpers

use crate::Compression;
use crate::error::Error;
use std::str::FromStr;

/// A `--format[=FORMAT]` flag: absent, present without a value, or present with one.
pub type Flag = Option<Option<String>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Preference {
    /// Compression format was specified on the command-line
    Explicit(Compression),
    /// Compression flag was enabled on the command-line, but no format was specified
    Implicit,
    /// Compression was omitted from the command-line
    NotSpecified,
}
impl TryFrom<Flag> for Preference {
    type Error = Error;
    fn try_from(value: Flag) -> Result<Self, Self::Error> {
        match value {
            Some(Some(s)) if s.is_empty() => Ok(Self::Implicit),
            Some(Some(s)) => Ok(Self::Explicit(Compression::from_str(&s)?)),
            Some(None) => Ok(Self::Implicit),
            None => Ok(Self::NotSpecified),
        }
    }
}
impl Preference {
    /// Pick a format: an explicit choice wins, a bare flag means the configured
    /// default, and no flag at all follows the destination (`implied`) if it
    /// says anything, else the configured default.
    pub fn resolve(&self, configured: &Compression, implied: Option<&Compression>) -> Compression {
        match self {
            Self::Explicit(c) => *c,
            Self::Implicit => *configured,
            Self::NotSpecified => implied.copied().unwrap_or(*configured),
        }
    }
}

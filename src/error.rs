// Core error taxonomy. Encoding/decoding failures stay at the io boundary as
// their own types; these are the conditions the filter pipeline itself raises.
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A filter was requested while the session has no image loaded.
    NoImageLoaded,
    /// A zero-sized or malformed buffer reached a filter.
    InvalidInput(&'static str),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoImageLoaded => write!(f, "no image loaded"),
            Error::InvalidInput(what) => write!(f, "invalid input: {what}"),
        }
    }
}

impl std::error::Error for Error {}

//! Error type for the resolution cache.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::error;
use std::fmt::{Display, Formatter};
use std::io;
use std::sync::Arc;

//------------ Error ---------------------------------------------------------

/// Error type for the resolution cache.
///
/// Only [`Error::InvalidUrl`] is ever returned from a lookup. Resolution
/// failures are absorbed by the engine and persistence failures are only
/// seen by whoever runs a persistence pass.
#[derive(Clone, Debug)]
pub enum Error {
    /// A target looked like a URL but could not be parsed as one.
    InvalidUrl {
        /// The target as given by the caller.
        target: String,

        /// The reason parsing failed.
        err: url::ParseError,
    },

    /// Reading or writing the cache file failed.
    Persist(Arc<io::Error>),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::InvalidUrl { target, err } => {
                write!(f, "invalid URL '{target}': {err}")
            }
            Error::Persist(err) => {
                write!(f, "error accessing cache file: {err}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::InvalidUrl { err, .. } => Some(err),
            Error::Persist(err) => Some(&**err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Persist(Arc::new(err))
    }
}

//============ Testing =======================================================

//! Error types for livejoin.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

/// Result type alias for livejoin operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for livejoin operations.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The transport reported a failure for a live query or read.
    Transport {
        collection: String,
        message: String,
    },
    /// The transport rejected a query specification.
    InvalidQuery {
        message: String,
    },
    /// A subscription disposer failed during reconciliation or teardown.
    Reconciliation {
        key: String,
        message: String,
    },
    /// A next/previous page requery failed.
    Pagination {
        page: usize,
        source: Box<Error>,
    },
    /// Document not found.
    NotFound {
        collection: String,
        id: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport { collection, message } => {
                write!(f, "Transport error on collection {}: {}", collection, message)
            }
            Error::InvalidQuery { message } => {
                write!(f, "Invalid query: {}", message)
            }
            Error::Reconciliation { key, message } => {
                write!(f, "Failed to dispose subscription {}: {}", key, message)
            }
            Error::Pagination { page, source } => {
                write!(f, "Failed to load page {}: {}", page, source)
            }
            Error::NotFound { collection, id } => {
                write!(f, "Document {} not found in collection {}", id, collection)
            }
        }
    }
}

impl Error {
    /// Creates a transport error.
    pub fn transport(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transport {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates a reconciliation error.
    pub fn reconciliation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Reconciliation {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wraps a requery failure for the given target page.
    pub fn pagination(page: usize, source: Error) -> Self {
        Error::Pagination {
            page,
            source: Box::new(source),
        }
    }

    /// Creates a not found error.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

//! Crate-wide error type.
//!
//! Library code propagates [`PgError`] with `?`; the binaries translate it
//! into a stderr diagnostic and a non-zero exit code.  Hash-collision
//! verification failures are not errors — they are counted and logged by the
//! matchers.

use std::io;

use thiserror::Error;

/// Errors raised by the matching and persistence layers.
#[derive(Debug, Error)]
pub enum PgError {
    /// An input could not be opened or an output could not be created.
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Invalid configuration detected before any work starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal consistency failure; must never be silently ignored.
    #[error("internal consistency failure: {0}")]
    Inconsistent(String),

    /// The operation is exposed by the interface but has no defined behavior.
    #[error("operation not implemented: {0}")]
    Unimplemented(&'static str),

    /// Plain I/O failure from an already-open stream.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PgError {
    /// Wraps an open/create failure with the offending path.
    pub fn open(path: impl std::fmt::Display, source: io::Error) -> Self {
        PgError::Open { path: path.to_string(), source }
    }
}

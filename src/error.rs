//! The closed set of error kinds a caller can observe (spec §7).
//!
//! Everything that crosses the public API boundary — a broken pipe, a
//! malformed frame, a engine-side exception, a call made from the wrong
//! state — is folded into this one enum. Recoverable, query-scoped
//! outcomes (a timeout, a cancellation, "no more results") are returned as
//! `Err(Error::_)` rather than as a separate success-shaped variant: `Result`
//! is already the idiomatic closed-set-of-outcomes mechanism in Rust, so a
//! parallel `Failure(ErrorKind)` data variant would just duplicate it.

use mqi_protocol::Term;
use mqi_transport::TransportError;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine subprocess could not be launched, or never produced a
    /// usable handshake within the configured startup window.
    #[error("failed to launch engine: {0}")]
    LaunchFailed(String),

    /// The handshake completed but the configured password did not match.
    #[error("engine rejected the handshake password")]
    AuthenticationFailed,

    /// A read or write on the underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The byte stream could not be decoded into a frame.
    #[error("frame error: {0}")]
    Frame(#[from] mqi_protocol::FrameError),

    /// A frame decoded cleanly but its JSON or term shape violated the
    /// wire contract (spec §4.B/§6).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// An operation was attempted while the session was in a state that
    /// does not permit it (spec §4.E transition table).
    #[error("invalid session state: expected {expected}, was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// `exception(time_limit_exceeded)`: the query's timeout elapsed.
    #[error("query timeout exceeded")]
    TimeoutExceeded,

    /// `exception(cancel_goal)`: the query was cancelled via `cancel_async`.
    #[error("query was cancelled")]
    Cancelled,

    /// `exception(no_more_results)`: an async query has no further
    /// solutions to deliver.
    #[error("no more results")]
    NoMoreResults,

    /// `exception(no_query)`: `cancel_async`/`async_result` issued with no
    /// async query in flight.
    #[error("no query is running")]
    NoQuery,

    /// The session is `Broken` or `Closed` and can no longer be used.
    #[error("session is no longer available ({0})")]
    SessionUnavailable(&'static str),

    /// Any other `exception(_)` payload the engine raised while evaluating
    /// the goal. Carries the raw term for the caller to inspect.
    #[error("query raised an exception: {0}")]
    QueryException(Term),
}

impl Error {
    /// Wrap an I/O error from the process-manager layer (pipe setup,
    /// handshake read, socket-file cleanup) that has no more specific
    /// `Error` variant of its own.
    pub(crate) fn launch_io(context: &str, source: io::Error) -> Error {
        Error::LaunchFailed(format!("{context}: {source}"))
    }
}

impl From<mqi_protocol::DecodeError> for Error {
    fn from(e: mqi_protocol::DecodeError) -> Self {
        Error::ProtocolViolation(e.to_string())
    }
}

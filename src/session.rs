//! The session/query state machine (spec §4.E), grounded on the teacher's
//! `UplinkSession` handshake-then-request/response pattern
//! (`services/forwarder/src/uplink.rs`) and its `SessionError` →
//! terminal-state handling (`services/receiver/src/session.rs`).

use crate::engine::Engine;
use crate::error::Error;
use crate::query::{PollOutcome, QueryResult, Solution};
use mqi_protocol::{self as proto, RawReply, Term, Timeout};
use mqi_transport::{Transport, TransportError};
use std::io::Write;
use std::time::Duration;

/// Slack added on top of a caller-supplied query timeout before applying it
/// as a client-side read timeout: the engine needs time to detect its own
/// `time_limit_exceeded` and write the reply before the socket would
/// otherwise time out underneath it.
const READ_TIMEOUT_SLACK: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    SyncPending,
    AsyncRunning,
    AsyncDraining,
    Closed,
    Broken,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::SyncPending => "SyncPending",
            SessionState::AsyncRunning => "AsyncRunning",
            SessionState::AsyncDraining => "AsyncDraining",
            SessionState::Closed => "Closed",
            SessionState::Broken => "Broken",
        }
    }
}

/// One open connection to an [`Engine`], enforcing request/response
/// ordering and the query lifecycle described in spec §4.E.
///
/// `!Sync` by construction (it holds `&mut` state with no internal
/// locking): a session is used by one thread at a time. The `'engine`
/// lifetime ties it to the `Engine` it was opened from, so it cannot
/// outlive the process it talks to.
pub struct Session<'engine> {
    _engine: &'engine Engine,
    transport: Box<dyn Transport>,
    state: SessionState,
    find_all: bool,
    default_query_timeout: Option<f64>,
    #[cfg(debug_assertions)]
    in_call: bool,
}

impl<'engine> Session<'engine> {
    pub(crate) fn handshake(
        engine: &'engine Engine,
        mut transport: Box<dyn Transport>,
        password: &str,
        default_query_timeout: Option<f64>,
    ) -> Result<Session<'engine>, Error> {
        transport
            .write_all(&proto::encode(&proto::password_request(password)))
            .map_err(TransportError::from)?;
        let payload = proto::decode_one(&mut transport)?;
        match proto::decode_reply(&payload)? {
            RawReply::True(_) => {
                tracing::debug!(target: "mqi_client::session", "handshake ok");
                Ok(Session {
                    _engine: engine,
                    transport,
                    state: SessionState::Idle,
                    find_all: false,
                    default_query_timeout,
                    #[cfg(debug_assertions)]
                    in_call: false,
                })
            }
            RawReply::False => Err(Error::AuthenticationFailed),
            RawReply::Exception(term) => Err(Error::ProtocolViolation(format!(
                "handshake raised an exception: {term}"
            ))),
        }
    }

    /// Run `goal` to completion and collect every solution up front. Only
    /// valid from `Idle`; returns to `Idle` on every outcome including an
    /// engine-side exception, except `connection_failed` which marks the
    /// session `Broken`.
    pub fn run_sync(&mut self, goal: &str, timeout: Timeout) -> Result<QueryResult, Error> {
        self.ensure_idle()?;
        self.enter_call();
        self.state = SessionState::SyncPending;
        tracing::debug!(target: "mqi_client::session", %goal, "-> SyncPending");

        let result = (|| -> Result<QueryResult, Error> {
            self.apply_read_timeout(timeout);
            self.write_frame(&proto::run_request(goal, timeout))?;
            match self.read_reply()? {
                RawReply::False => Ok(QueryResult::False),
                RawReply::True(term) => Ok(QueryResult::Solutions(decode_solutions(&term)?)),
                RawReply::Exception(term) => Err(self.exception_to_error(&term)),
            }
        })();

        if !matches!(self.state, SessionState::Broken) {
            self.state = SessionState::Idle;
        }
        tracing::debug!(target: "mqi_client::session", state = self.state.name(), "run_sync settled");
        self.exit_call();
        result
    }

    /// Convenience over [`Session::run_sync`] using the engine's configured
    /// default query timeout (or the engine's own default if none was
    /// configured).
    pub fn run_sync_default_timeout(&mut self, goal: &str) -> Result<QueryResult, Error> {
        self.run_sync(goal, self.default_timeout())
    }

    /// Start an asynchronous query. On success the session moves to
    /// `AsyncRunning`; on a parse/ack exception it stays `Idle` and the
    /// error is returned.
    pub fn run_async(&mut self, goal: &str, timeout: Timeout, find_all: bool) -> Result<(), Error> {
        self.ensure_idle()?;
        self.enter_call();
        tracing::debug!(target: "mqi_client::session", %goal, find_all, "run_async ack");

        let result = (|| -> Result<(), Error> {
            self.write_frame(&proto::run_async_request(goal, timeout, find_all))?;
            match self.read_reply()? {
                RawReply::True(_) => Ok(()),
                RawReply::False => Err(Error::ProtocolViolation(
                    "run_async ack was 'false'".into(),
                )),
                RawReply::Exception(term) => Err(self.exception_to_error(&term)),
            }
        })();

        match &result {
            Ok(()) => {
                self.find_all = find_all;
                self.state = SessionState::AsyncRunning;
            }
            Err(_) if !matches!(self.state, SessionState::Broken) => {
                self.state = SessionState::Idle;
            }
            Err(_) => {}
        }
        self.exit_call();
        result
    }

    /// Poll for the next solution(s) of a running async query.
    ///
    /// With `find_all=false` a `True` reply carries exactly one solution and
    /// the session stays `AsyncRunning` for the next `poll`. With
    /// `find_all=true` the engine reports every solution at once — `True`
    /// with a list of zero or more answers, or `False` for zero — and the
    /// session moves to `AsyncDraining`, since the batch is already
    /// complete and nothing more is pollable except the terminal exception
    /// (spec §4.E's state diagram).
    ///
    /// Every other terminal outcome — `no_more_results`, `cancel_goal`,
    /// `time_limit_exceeded`, or any other engine exception — is returned
    /// as `Err` and drops the session back to `Idle`; see [`Error`].
    pub fn poll(&mut self, wait: Timeout) -> Result<PollOutcome, Error> {
        if !matches!(
            self.state,
            SessionState::AsyncRunning | SessionState::AsyncDraining
        ) {
            return Err(self.invalid_state_error("AsyncRunning or AsyncDraining"));
        }
        self.enter_call();
        let find_all = self.find_all;

        let result = (|| -> Result<PollOutcome, Error> {
            self.apply_read_timeout(wait);
            self.write_frame(&proto::async_result_request(wait))?;
            match self.read_reply()? {
                RawReply::True(term) => {
                    let mut solutions = decode_solutions(&term)?;
                    if find_all {
                        Ok(PollOutcome::Solutions(solutions))
                    } else if solutions.len() == 1 {
                        Ok(PollOutcome::Solution(solutions.remove(0)))
                    } else {
                        Err(Error::ProtocolViolation(format!(
                            "expected exactly one solution in an async_result reply, got {}",
                            solutions.len()
                        )))
                    }
                }
                RawReply::False if find_all => Ok(PollOutcome::Solutions(Vec::new())),
                RawReply::False => Err(Error::ProtocolViolation(
                    "async_result replied 'false'".into(),
                )),
                RawReply::Exception(term) if term.as_atom() == Some("result_not_available") => {
                    Ok(PollOutcome::NotReady)
                }
                RawReply::Exception(term) => Err(self.exception_to_error(&term)),
            }
        })();

        match &result {
            Ok(PollOutcome::Solutions(_)) => {
                self.state = SessionState::AsyncDraining;
            }
            Ok(PollOutcome::Solution(_) | PollOutcome::NotReady) => {
                self.state = SessionState::AsyncRunning;
            }
            Err(_) if !matches!(self.state, SessionState::Broken) => {
                self.state = SessionState::Idle;
            }
            Err(_) => {}
        }
        self.exit_call();
        result
    }

    /// Cancel a running async query. Does not by itself change state; the
    /// next `poll` observes the `cancel_goal` terminal exception.
    pub fn cancel(&mut self) -> Result<(), Error> {
        if !matches!(
            self.state,
            SessionState::AsyncRunning | SessionState::AsyncDraining
        ) {
            return Err(self.invalid_state_error("AsyncRunning or AsyncDraining"));
        }
        self.enter_call();
        let result = (|| -> Result<(), Error> {
            self.write_frame(&proto::cancel_async_request())?;
            match self.read_reply()? {
                RawReply::True(_) => Ok(()),
                RawReply::False => Err(Error::ProtocolViolation(
                    "cancel_async replied 'false'".into(),
                )),
                RawReply::Exception(term) if term.as_atom() == Some("no_query") => {
                    Err(Error::NoQuery)
                }
                RawReply::Exception(term) => Err(self.exception_to_error(&term)),
            }
        })();
        self.exit_call();
        result
    }

    /// Close the session: ask the engine to release the connection's
    /// per-session state, then release the transport.
    ///
    /// Idempotent, and a no-op if the session is already `Closed`. A
    /// session that is already `Broken` transitions to `Closed` silently
    /// — a dead peer cannot be asked to close gracefully, and that's not
    /// the caller's fault.
    pub fn close(&mut self) -> Result<(), Error> {
        match self.state {
            SessionState::Closed => return Ok(()),
            SessionState::Broken => {
                self.state = SessionState::Closed;
                self.transport.shutdown();
                return Ok(());
            }
            _ => {}
        }
        let outcome = self
            .write_frame(&proto::close_request())
            .and_then(|()| self.read_reply());
        self.state = SessionState::Closed;
        self.transport.shutdown();
        match outcome {
            Ok(RawReply::True(_)) | Err(_) => Ok(()),
            Ok(other) => Err(Error::ProtocolViolation(format!(
                "close replied unexpectedly: {other:?}"
            ))),
        }
    }

    /// Ask the engine process itself to exit. Used by [`Engine`]'s
    /// shutdown path, never part of the ordinary query lifecycle.
    pub(crate) fn quit(&mut self) {
        let ack = self.write_frame(&proto::quit_request()).and_then(|()| {
            let _ = self
                .transport
                .set_read_timeout(Some(std::time::Duration::from_secs(2)));
            self.read_reply()
        });
        self.state = SessionState::Closed;
        self.transport.shutdown();
        match ack {
            Ok(RawReply::True(_)) => {
                tracing::debug!(target: "mqi_client::session", "engine acknowledged quit");
            }
            _ => {
                tracing::warn!(target: "mqi_client::session", "engine did not acknowledge quit; falling back to signal termination");
            }
        }
    }

    /// Derive a client-side socket read timeout from a query's wire timeout
    /// (spec §4.C) and apply it. `Default`/`Unlimited` leave the socket
    /// blocking indefinitely — the engine itself owns those semantics.
    fn apply_read_timeout(&self, timeout: Timeout) {
        let duration = match timeout {
            Timeout::Seconds(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                Some(Duration::from_secs_f64(seconds) + READ_TIMEOUT_SLACK)
            }
            _ => None,
        };
        if let Err(e) = self.transport.set_read_timeout(duration) {
            tracing::warn!(target: "mqi_client::session", error = %e, "failed to set read timeout");
        }
    }

    fn default_timeout(&self) -> Timeout {
        match self.default_query_timeout {
            Some(seconds) => Timeout::Seconds(seconds),
            None => Timeout::Default,
        }
    }

    fn ensure_idle(&self) -> Result<(), Error> {
        if self.state != SessionState::Idle {
            return Err(self.invalid_state_error("Idle"));
        }
        Ok(())
    }

    /// `SessionUnavailable` when the session is terminally `Broken`/`Closed`,
    /// `InvalidState` otherwise (spec §7 distinguishes the two).
    fn invalid_state_error(&self, expected: &'static str) -> Error {
        match self.state {
            SessionState::Broken | SessionState::Closed => {
                Error::SessionUnavailable(self.state.name())
            }
            _ => Error::InvalidState {
                expected,
                actual: self.state.name(),
            },
        }
    }

    fn write_frame(&mut self, payload: &str) -> Result<(), Error> {
        tracing::trace!(target: "mqi_client::session", %payload, "-> engine");
        if let Err(e) = self.transport.write_all(&proto::encode(payload)) {
            self.state = SessionState::Broken;
            return Err(TransportError::from(e).into());
        }
        Ok(())
    }

    fn read_reply(&mut self) -> Result<RawReply, Error> {
        let payload = match proto::decode_one(&mut self.transport) {
            Ok(p) => p,
            Err(e) => {
                self.state = SessionState::Broken;
                return Err(e.into());
            }
        };
        tracing::trace!(target: "mqi_client::session", %payload, "<- engine");
        let reply = proto::decode_reply(&payload).map_err(|e| {
            self.state = SessionState::Broken;
            Error::from(e)
        })?;
        if matches!(&reply, RawReply::Exception(t) if t.as_atom() == Some("connection_failed")) {
            self.state = SessionState::Broken;
        }
        Ok(reply)
    }

    fn exception_to_error(&mut self, term: &Term) -> Error {
        match term.as_atom() {
            Some("time_limit_exceeded") => Error::TimeoutExceeded,
            Some("cancel_goal") => Error::Cancelled,
            Some("no_more_results") => Error::NoMoreResults,
            Some("connection_failed") => {
                self.state = SessionState::Broken;
                Error::Transport(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "engine reported connection_failed",
                )))
            }
            _ => Error::QueryException(term.clone()),
        }
    }

    #[cfg(debug_assertions)]
    fn enter_call(&mut self) {
        debug_assert!(!self.in_call, "Session methods are not re-entrant");
        self.in_call = true;
    }
    #[cfg(debug_assertions)]
    fn exit_call(&mut self) {
        self.in_call = false;
    }
    #[cfg(not(debug_assertions))]
    fn enter_call(&mut self) {}
    #[cfg(not(debug_assertions))]
    fn exit_call(&mut self) {}
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !matches!(self.state, SessionState::Closed) {
            let _ = self.close();
        }
    }
}

/// Decode a `true(_)` payload's argument as a list of answers, each itself
/// a list of `=` bindings (spec §4.B).
fn decode_solutions(term: &Term) -> Result<Vec<Solution>, Error> {
    let answers = term
        .as_list()
        .ok_or_else(|| Error::ProtocolViolation(format!("expected a list of answers, got {term}")))?;
    answers
        .iter()
        .map(|answer| {
            let bindings_terms = answer.as_list().ok_or_else(|| {
                Error::ProtocolViolation(format!("expected an answer to be a list, got {answer}"))
            })?;
            let bindings = bindings_terms
                .iter()
                .map(|b| proto::extract_binding(b).map_err(Error::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Solution::from_bindings(bindings))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqi_protocol::Term;

    fn binding(var: &str, value: Term) -> Term {
        Term::compound("=", vec![Term::Variable(var.into()), value])
    }

    #[test]
    fn decode_solutions_collects_each_answer() {
        let term = Term::List(vec![
            Term::List(vec![binding("X", Term::integer(1))]),
            Term::List(vec![binding("X", Term::integer(2))]),
        ]);
        let solutions = decode_solutions(&term).unwrap();
        assert_eq!(solutions.len(), 2);
        assert_eq!(solutions[0].get("X"), Some(&Term::integer(1)));
        assert_eq!(solutions[1].get("X"), Some(&Term::integer(2)));
    }

    #[test]
    fn decode_solutions_rejects_non_list_answer() {
        let term = Term::List(vec![Term::integer(1)]);
        assert!(matches!(
            decode_solutions(&term),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn ground_goal_solution_has_no_bindings() {
        let term = Term::List(vec![Term::List(vec![])]);
        let solutions = decode_solutions(&term).unwrap();
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].bindings().is_empty());
    }

    #[test]
    fn session_state_names_are_stable() {
        assert_eq!(SessionState::Idle.name(), "Idle");
        assert_eq!(SessionState::Broken.name(), "Broken");
    }
}

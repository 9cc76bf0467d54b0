//! Query outcome types (spec §3 `QueryResult`, §4.F `PollOutcome`).
//!
//! The language-neutral spec models these as closed sum types with a
//! `Failure(ErrorKind)` variant folded in. Rust already has a
//! closed-set-of-outcomes mechanism — `Result` — so `Failure` is realized
//! here as `Err(Error::_)` rather than duplicated as data; see
//! [`crate::Error`].

use mqi_protocol::Term;

/// One answer's variable bindings, in the order the engine reported them.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    bindings: Vec<(String, Term)>,
}

impl Solution {
    pub(crate) fn from_bindings(bindings: Vec<(String, Term)>) -> Self {
        Solution { bindings }
    }

    /// The term bound to `name`, if this answer bound it.
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// All bindings, in report order.
    pub fn bindings(&self) -> &[(String, Term)] {
        &self.bindings
    }
}

/// The outcome of [`crate::Session::run_sync`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// The goal failed: no solutions.
    False,
    /// The goal succeeded with these solutions, collected up front.
    Solutions(Vec<Solution>),
}

/// The outcome of one [`crate::Session::poll`] call on an async query.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// One more solution is available. Only ever produced when the query
    /// was started with `find_all=false` — the session stays `AsyncRunning`
    /// and the caller polls again for the next one.
    Solution(Solution),
    /// Every solution the query produced, delivered in one batch. Only ever
    /// produced when the query was started with `find_all=true` (an empty
    /// batch means the goal had no solutions at all) — the session moves to
    /// `AsyncDraining` and the next `poll` observes the terminal exception.
    Solutions(Vec<Solution>),
    /// No solution was available within the requested wait, but the query
    /// is still running — poll again.
    NotReady,
}

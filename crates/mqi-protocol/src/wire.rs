//! Request payload construction (spec §6).

use std::fmt;

/// A query timeout as sent over the wire: a number of seconds, the engine's
/// own default (`_`), or unlimited (`-1`).
///
/// Per spec §9's open question, the default-vs-unlimited distinction is
/// preserved verbatim and never normalized by this client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timeout {
    Seconds(f64),
    Default,
    Unlimited,
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Seconds(s) => write!(f, "{s}"),
            Timeout::Default => write!(f, "_"),
            Timeout::Unlimited => write!(f, "-1"),
        }
    }
}

/// None of these builders append the Prolog clause terminator `.` — that's
/// `frame::encode`'s job (it appends the sole `.\n` every payload gets on
/// the wire, mirroring `password_request`'s bare-secret convention). A
/// builder that appended its own `.` here would produce a doubled period
/// once `encode` added its own.
pub fn password_request(password: &str) -> String {
    password.to_owned()
}

pub fn run_request(goal: &str, timeout: Timeout) -> String {
    format!("run({goal}, {timeout})")
}

pub fn run_async_request(goal: &str, timeout: Timeout, find_all: bool) -> String {
    format!("run_async({goal}, {timeout}, {find_all})")
}

pub fn async_result_request(wait_seconds: Timeout) -> String {
    format!("async_result({wait_seconds})")
}

pub fn cancel_async_request() -> String {
    "cancel_async".to_owned()
}

pub fn close_request() -> String {
    "close".to_owned()
}

pub fn quit_request() -> String {
    "quit".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_request_formats_goal_and_timeout() {
        assert_eq!(
            run_request("member(X,[1,2,3])", Timeout::Unlimited),
            "run(member(X,[1,2,3]), -1)"
        );
        assert_eq!(
            run_request("sleep(10)", Timeout::Seconds(1.0)),
            "run(sleep(10), 1)"
        );
        assert_eq!(run_request("true", Timeout::Default), "run(true, _)");
    }

    #[test]
    fn run_async_request_includes_find_all_flag() {
        assert_eq!(
            run_async_request("member(X,[a,b])", Timeout::Unlimited, false),
            "run_async(member(X,[a,b]), -1, false)"
        );
    }

    #[test]
    fn fixed_request_strings() {
        assert_eq!(cancel_async_request(), "cancel_async");
        assert_eq!(close_request(), "close");
        assert_eq!(quit_request(), "quit");
    }

    /// Every builder here must leave the sole `.` terminator to
    /// `frame::encode` — none should end in `.` themselves.
    #[test]
    fn no_builder_appends_its_own_terminator() {
        assert!(!run_request("true", Timeout::Unlimited).ends_with('.'));
        assert!(!run_async_request("true", Timeout::Unlimited, true).ends_with('.'));
        assert!(!async_result_request(Timeout::Unlimited).ends_with('.'));
        assert!(!cancel_async_request().ends_with('.'));
        assert!(!close_request().ends_with('.'));
        assert!(!quit_request().ends_with('.'));
    }
}

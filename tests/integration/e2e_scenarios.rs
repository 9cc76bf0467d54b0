//! End-to-end scenarios against a real subprocess (`fake-engine`), driven
//! entirely through the public facade — no internal types touched.

use mqi_client::{Engine, EngineOptions, PollOutcome, QueryResult, Timeout};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn launch(scenario: &str) -> Engine {
    init_tracing();
    let exe = env!("CARGO_BIN_EXE_fake-engine");
    Engine::launch(
        EngineOptions::new()
            .engine_executable_path(exe)
            .password("integration-test-secret")
            .extra_args([format!("--scenario={scenario}")]),
    )
    .expect("engine should launch")
}

#[test]
fn member_query_returns_three_solutions() {
    let engine = launch("member_query");
    let mut session = engine.open_session().expect("session should open");

    let result = session
        .run_sync("member(X,[1,2,3])", Timeout::Unlimited)
        .expect("query should succeed");

    match result {
        QueryResult::Solutions(solutions) => {
            assert_eq!(solutions.len(), 3);
            let values: Vec<_> = solutions
                .iter()
                .map(|s| s.get("X").unwrap().as_integer().unwrap().to_string())
                .collect();
            assert_eq!(values, vec!["1", "2", "3"]);
        }
        other => panic!("expected Solutions, got {other:?}"),
    }
}

#[test]
fn failing_goal_returns_false() {
    let engine = launch("fail_query");
    let mut session = engine.open_session().expect("session should open");

    let result = session
        .run_sync("fail", Timeout::Unlimited)
        .expect("a failed goal is not itself an error");
    assert_eq!(result, QueryResult::False);
}

#[test]
fn slow_goal_times_out_and_session_recovers() {
    let engine = launch("timeout");
    let mut session = engine.open_session().expect("session should open");

    let err = session
        .run_sync("sleep(10)", Timeout::Seconds(1.0))
        .expect_err("should time out");
    assert!(matches!(err, mqi_client::Error::TimeoutExceeded));

    // The session must have returned to Idle, not Broken: a second query on
    // the same session should still work.
    let result = session
        .run_sync("fail", Timeout::Unlimited)
        .expect("session should still be usable after a timeout");
    let _ = result;
}

#[test]
fn heartbeats_emitted_during_a_sync_query_are_absorbed() {
    let engine = launch("heartbeat_sync");
    let mut session = engine.open_session().expect("session should open");

    // The fake engine emits several bare '.' heartbeat bytes mid-wait before
    // replying; run_sync must absorb them rather than treating them as a
    // malformed frame (spec §4.A, invariant 2).
    let result = session
        .run_sync("fail", Timeout::Seconds(5.0))
        .expect("heartbeats before the reply must not break the frame decoder");
    assert_eq!(result, QueryResult::False);
}

#[test]
fn async_query_polls_one_solution_at_a_time_then_terminates() {
    let engine = launch("async_basic");
    let mut session = engine.open_session().expect("session should open");

    session
        .run_async("member(X,[1,2])", Timeout::Unlimited, false)
        .expect("run_async should be acked");

    let first = session.poll(Timeout::Unlimited).expect("first poll");
    assert!(matches!(first, PollOutcome::Solution(_)));

    let second = session.poll(Timeout::Unlimited).expect("second poll");
    assert!(matches!(second, PollOutcome::Solution(_)));

    let third = session.poll(Timeout::Unlimited).expect_err("no more results");
    assert!(matches!(third, mqi_client::Error::NoMoreResults));
}

#[test]
fn find_all_poll_delivers_every_solution_in_one_batch() {
    let engine = launch("async_find_all");
    let mut session = engine.open_session().expect("session should open");

    session
        .run_async("member(X,[1,2,3])", Timeout::Unlimited, true)
        .expect("run_async should be acked");

    let batch = session.poll(Timeout::Unlimited).expect("find_all batch poll");
    match batch {
        PollOutcome::Solutions(solutions) => {
            assert_eq!(solutions.len(), 3);
            let values: Vec<_> = solutions
                .iter()
                .map(|s| s.get("X").unwrap().as_integer().unwrap().to_string())
                .collect();
            assert_eq!(values, vec!["1", "2", "3"]);
        }
        other => panic!("expected Solutions, got {other:?}"),
    }

    // AsyncDraining: the batch already drained the query, so the next poll
    // only ever observes the terminal exception.
    let after = session.poll(Timeout::Unlimited).expect_err("no more results");
    assert!(matches!(after, mqi_client::Error::NoMoreResults));
}

#[test]
fn find_all_poll_with_no_solutions_reports_an_empty_batch() {
    let engine = launch("async_find_all_no_solutions");
    let mut session = engine.open_session().expect("session should open");

    session
        .run_async("fail", Timeout::Unlimited, true)
        .expect("run_async should be acked");

    let batch = session.poll(Timeout::Unlimited).expect("find_all batch poll");
    assert_eq!(batch, PollOutcome::Solutions(vec![]));
}

#[test]
fn run_sync_while_async_query_is_running_is_an_invalid_state() {
    let engine = launch("async_basic");
    let mut session = engine.open_session().expect("session should open");

    session
        .run_async("member(X,[1,2])", Timeout::Unlimited, false)
        .expect("run_async should be acked");

    let err = session
        .run_sync("true", Timeout::Unlimited)
        .expect_err("run_sync is not valid while AsyncRunning");
    assert!(matches!(
        err,
        mqi_client::Error::InvalidState { expected: "Idle", actual: "AsyncRunning" }
    ));
}

#[test]
fn operations_after_close_are_session_unavailable() {
    let engine = launch("member_query");
    let mut session = engine.open_session().expect("session should open");

    session.close().expect("close should be acked");

    let err = session
        .run_sync("true", Timeout::Unlimited)
        .expect_err("a closed session must reject further operations");
    assert!(matches!(
        err,
        mqi_client::Error::SessionUnavailable("Closed")
    ));
}

#[test]
fn cancel_interrupts_a_running_async_query() {
    let engine = launch("cancel");
    let mut session = engine.open_session().expect("session should open");

    session
        .run_async("member(X,[1,2,3])", Timeout::Unlimited, false)
        .expect("run_async should be acked");

    let first = session.poll(Timeout::Unlimited).expect("first poll");
    assert!(matches!(first, PollOutcome::Solution(_)));

    session.cancel().expect("cancel should be acked");

    let after_cancel = session
        .poll(Timeout::Unlimited)
        .expect_err("poll after cancel observes the cancellation");
    assert!(matches!(after_cancel, mqi_client::Error::Cancelled));
}

//! A stand-in MQI engine for integration tests, playing the same role the
//! workspace's `services/emulator` plays for hardware: a scriptable double
//! that speaks the real wire protocol closely enough to drive the client
//! through a fixed scenario, without needing a real logic-programming
//! engine installed on the test machine.
//!
//! Engine-side behavior is explicitly out of scope for this crate — this
//! binary exists only so `mqi-client`'s integration tests can exercise the
//! real process-launch and handshake path end to end. Reply JSON is built
//! with `mqi_test_utils::reply`, shared with the in-process `FakeEngine`
//! used by the protocol/transport crates' own tests, so the two fixtures
//! never drift apart on what a given reply shape looks like.

use mqi_test_utils::reply;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

struct Args {
    port: u16,
    password: String,
    scenario: String,
}

fn parse_args() -> Args {
    let mut port = 0u16;
    let mut password = String::new();
    let mut scenario = String::new();
    for arg in std::env::args().skip(1) {
        if let Some(v) = arg.strip_prefix("--port=") {
            port = v.parse().unwrap_or(0);
        } else if let Some(v) = arg.strip_prefix("--password=") {
            password = v.to_owned();
        } else if let Some(v) = arg.strip_prefix("--scenario=") {
            scenario = v.to_owned();
        }
    }
    Args {
        port,
        password,
        scenario,
    }
}

enum Step {
    Reply(String),
    /// Sleep, optionally emitting heartbeat `.` bytes at intervals during
    /// the sleep (as the real engine does roughly every 2s while a
    /// synchronous query runs — spec §4.A), then reply.
    SleepThenReply {
        total: Duration,
        heartbeat_every: Option<Duration>,
        reply: String,
    },
}

fn member_query_script() -> Vec<Step> {
    vec![Step::Reply(reply::true_with_answers(&[
        reply::answer(&[reply::binding("X", "1")]),
        reply::answer(&[reply::binding("X", "2")]),
        reply::answer(&[reply::binding("X", "3")]),
    ]))]
}

fn script_for(scenario: &str) -> Vec<Step> {
    match scenario {
        "member_query" => member_query_script(),
        "fail_query" => vec![Step::Reply(reply::false_reply())],
        "timeout" => vec![
            Step::SleepThenReply {
                total: Duration::from_millis(1200),
                heartbeat_every: None,
                reply: reply::exception("time_limit_exceeded"),
            },
            // The test reuses this session for a second query after the
            // timeout, to confirm the session recovered to Idle.
            Step::Reply(reply::false_reply()),
        ],
        "heartbeat_sync" => vec![Step::SleepThenReply {
            total: Duration::from_millis(600),
            heartbeat_every: Some(Duration::from_millis(100)),
            reply: reply::false_reply(),
        }],
        "async_basic" => vec![
            Step::Reply(reply::ack()),
            Step::Reply(reply::true_with_answers(&[reply::answer(&[
                reply::binding("X", "1"),
            ])])),
            Step::Reply(reply::true_with_answers(&[reply::answer(&[
                reply::binding("X", "2"),
            ])])),
            Step::Reply(reply::exception("no_more_results")),
        ],
        "cancel" => vec![
            Step::Reply(reply::ack()),
            Step::Reply(reply::true_with_answers(&[reply::answer(&[
                reply::binding("X", "1"),
            ])])),
            Step::Reply(reply::ack()),
            Step::Reply(reply::exception("cancel_goal")),
        ],
        "async_find_all" => vec![
            Step::Reply(reply::ack()),
            Step::Reply(reply::true_with_answers(&[
                reply::answer(&[reply::binding("X", "1")]),
                reply::answer(&[reply::binding("X", "2")]),
                reply::answer(&[reply::binding("X", "3")]),
            ])),
            Step::Reply(reply::exception("no_more_results")),
        ],
        "async_find_all_no_solutions" => vec![
            Step::Reply(reply::ack()),
            Step::Reply(reply::false_reply()),
            Step::Reply(reply::exception("no_more_results")),
        ],
        _ => vec![],
    }
}

fn handle_connection(mut stream: TcpStream, args: &Args) {
    let password = match mqi_protocol::decode_one(&mut stream) {
        Ok(p) => p,
        Err(_) => return,
    };
    let bad_password = args.scenario == "bad_password";
    if bad_password || password.trim_end_matches('.') != args.password {
        let _ = stream.write_all(&mqi_protocol::encode(&reply::false_reply()));
        return;
    }
    let _ = stream.write_all(&mqi_protocol::encode(&reply::handshake_ok()));

    let mut script = script_for(&args.scenario).into_iter();
    loop {
        if mqi_protocol::decode_one(&mut stream).is_err() {
            return;
        }
        let Some(step) = script.next() else {
            return;
        };
        let payload = match step {
            Step::Reply(p) => p,
            Step::SleepThenReply {
                total,
                heartbeat_every,
                reply: final_reply,
            } => {
                sleep_with_heartbeats(&mut stream, total, heartbeat_every);
                final_reply
            }
        };
        if stream.write_all(&mqi_protocol::encode(&payload)).is_err() {
            return;
        }
    }
}

/// Sleep for `total`, writing a single heartbeat `.` byte directly to the
/// stream every `heartbeat_every` if set — outside the frame encoder, since
/// heartbeats are never part of a frame's payload (spec §4.A, §9).
fn sleep_with_heartbeats(stream: &mut TcpStream, total: Duration, heartbeat_every: Option<Duration>) {
    let Some(interval) = heartbeat_every else {
        std::thread::sleep(total);
        return;
    };
    let mut remaining = total;
    while !remaining.is_zero() {
        let tick = interval.min(remaining);
        std::thread::sleep(tick);
        remaining = remaining.saturating_sub(tick);
        let _ = stream.write_all(b".");
    }
}

fn main() {
    let args = parse_args();
    let listener = TcpListener::bind(("127.0.0.1", args.port)).expect("bind fake engine listener");
    let bound_port = listener.local_addr().unwrap().port();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{bound_port}").unwrap();
    writeln!(out, "ok").unwrap();
    out.flush().unwrap();
    drop(out);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => handle_connection(stream, &args),
            Err(_) => break,
        }
    }
}

//! In-process scriptable stand-in for the MQI engine's wire protocol.
//!
//! Plays the same role `rt-test-utils::MockWsServer` plays for the
//! teacher's WebSocket clients, adapted to MQI's blocking, half-duplex
//! framing: bind a random loopback port, accept exactly one connection,
//! perform the password handshake, then answer a fixed script of request
//! frames in order. Lets `mqi-transport`/`mqi-protocol` tests (and the
//! `fake-engine` subprocess fixture) drive real sockets without hand-rolling
//! the same JSON reply literals in more than one place.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

/// One scripted step: answer the next request frame with `reply`, optionally
/// preceded by raw heartbeat `.` bytes written straight to the socket (spec
/// §4.A — heartbeats never go through the frame encoder).
#[derive(Debug, Clone)]
pub struct Step {
    pub reply: String,
    pub heartbeats_before: usize,
}

impl Step {
    pub fn reply(reply: impl Into<String>) -> Step {
        Step {
            reply: reply.into(),
            heartbeats_before: 0,
        }
    }

    pub fn with_heartbeats(mut self, n: usize) -> Step {
        self.heartbeats_before = n;
        self
    }
}

/// A single-connection fake MQI engine listening on a random loopback port.
pub struct FakeEngine {
    port: u16,
    handle: Option<JoinHandle<()>>,
}

impl FakeEngine {
    /// Bind and start serving on a background thread. Returns as soon as the
    /// listener is bound; the handshake and scripted replies happen on the
    /// background thread as the test's client drives the connection.
    pub fn start(password: impl Into<String>, steps: Vec<Step>) -> FakeEngine {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake engine listener");
        let port = listener.local_addr().expect("listener has a local addr").port();
        let password = password.into();
        let handle = std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve(stream, &password, steps);
            }
        });
        FakeEngine {
            port,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(mut stream: TcpStream, password: &str, steps: Vec<Step>) {
    let got = match mqi_protocol::decode_one(&mut stream) {
        Ok(p) => p,
        Err(_) => return,
    };
    if got != password {
        let _ = stream.write_all(&mqi_protocol::encode(&reply::false_reply()));
        return;
    }
    if stream
        .write_all(&mqi_protocol::encode(&reply::handshake_ok()))
        .is_err()
    {
        return;
    }

    for step in steps {
        if mqi_protocol::decode_one(&mut stream).is_err() {
            return;
        }
        if step.heartbeats_before > 0 {
            let heartbeats = vec![b'.'; step.heartbeats_before];
            if stream.write_all(&heartbeats).is_err() {
                return;
            }
        }
        if stream
            .write_all(&mqi_protocol::encode(&step.reply))
            .is_err()
        {
            return;
        }
    }
}

/// Builders for the JSON reply shapes in spec §4.B/§6, shared between
/// `FakeEngine` and the `fake-engine` subprocess fixture so neither hand-rolls
/// the same JSON literal twice.
pub mod reply {
    /// `true([[threads(comm, goal)]])`, the handshake acknowledgement. The
    /// two thread identifiers are informational only (spec §6).
    pub fn handshake_ok() -> String {
        r#"{"functor":"true","args":[[[{"functor":"threads","args":["comm-1","goal-1"]}]]]}"#
            .to_owned()
    }

    /// A bare `false` reply: handshake rejection or a failed goal.
    pub fn false_reply() -> String {
        "\"false\"".to_owned()
    }

    /// `exception(<kind>)`.
    pub fn exception(kind: &str) -> String {
        format!(r#"{{"functor":"exception","args":["{kind}"]}}"#)
    }

    /// `true([[]])`: the ack for `run_async`/`cancel_async`/`close`/`quit`.
    pub fn ack() -> String {
        r#"{"functor":"true","args":[[]]}"#.to_owned()
    }

    /// One `=(Variable(name), <value_json>)` binding, as a bare JSON object
    /// (not yet wrapped in its enclosing answer array).
    pub fn binding(name: &str, value_json: &str) -> String {
        format!(
            r#"{{"functor":"=","args":[{{"functor":"variable","args":["{name}"]}},{value_json}]}}"#
        )
    }

    /// One answer: a JSON array of already-rendered `binding(...)` strings.
    pub fn answer(bindings_json: &[String]) -> String {
        format!("[{}]", bindings_json.join(","))
    }

    /// `true(<answers>)` where each element of `answers_json` is a rendered
    /// `answer(...)`.
    pub fn true_with_answers(answers_json: &[String]) -> String {
        format!(
            r#"{{"functor":"true","args":[[{}]]}}"#,
            answers_json.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::net::TcpStream as Client;

    #[test]
    fn accepts_one_connection_and_runs_its_script() {
        let engine = FakeEngine::start(
            "secret",
            vec![Step::reply(reply::ack()), Step::reply(reply::false_reply())],
        );
        let mut client = Client::connect(("127.0.0.1", engine.port())).unwrap();
        client.write_all(&mqi_protocol::encode("secret")).unwrap();
        let mut buf = Vec::new();
        let handshake = read_one(&mut client, &mut buf);
        assert_eq!(handshake, reply::handshake_ok());

        client
            .write_all(&mqi_protocol::encode("run_async(true, -1, false)."))
            .unwrap();
        assert_eq!(read_one(&mut client, &mut Vec::new()), reply::ack());

        client
            .write_all(&mqi_protocol::encode("async_result(-1)."))
            .unwrap();
        assert_eq!(
            read_one(&mut client, &mut Vec::new()),
            reply::false_reply()
        );
    }

    #[test]
    fn wrong_password_gets_false_and_no_further_steps() {
        let engine = FakeEngine::start("secret", vec![Step::reply(reply::ack())]);
        let mut client = Client::connect(("127.0.0.1", engine.port())).unwrap();
        client.write_all(&mqi_protocol::encode("wrong")).unwrap();
        assert_eq!(
            read_one(&mut client, &mut Vec::new()),
            reply::false_reply()
        );
    }

    fn read_one(stream: &mut TcpStream, _scratch: &mut Vec<u8>) -> String {
        mqi_protocol::decode_one(stream).unwrap()
    }
}

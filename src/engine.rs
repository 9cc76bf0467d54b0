//! The engine process handle (spec §4.D, §4.F facade).

use crate::error::Error;
use crate::options::EngineOptions;
use crate::process::{self, Endpoint, SpawnedEngine};
use crate::session::Session;
use mqi_transport::Transport;
use std::time::Duration;

/// A running engine subprocess. Owns the child process and, for Unix
/// sockets, the socket file it created.
///
/// Cloneable only via `&Engine` — sessions borrow the engine for their
/// lifetime (`Session<'engine>`), which is enough to share one engine
/// across threads without an `Arc` wrapper of its own.
pub struct Engine {
    child: std::process::Child,
    endpoint: Endpoint,
    password: String,
    default_query_timeout: Option<f64>,
    owned_socket_path: Option<std::path::PathBuf>,
    terminated: bool,
}

impl Engine {
    /// Spawn the engine executable and block until its handshake lines are
    /// available on stdout (or `options.startup_timeout` elapses).
    pub fn launch(options: EngineOptions) -> Result<Engine, Error> {
        let timeout = options.query_timeout_seconds;
        let SpawnedEngine {
            child,
            endpoint,
            password,
            owned_socket_path,
            ..
        } = process::spawn(&options)?;
        tracing::info!(target: "mqi_client::engine", pid = child.id(), "engine launched");
        Ok(Engine {
            child,
            endpoint,
            password,
            default_query_timeout: timeout,
            owned_socket_path,
            terminated: false,
        })
    }

    /// Open a new session against this engine: connects, performs the
    /// password handshake, and returns a session ready for `run_sync`.
    pub fn open_session(&self) -> Result<Session<'_>, Error> {
        let transport: Box<dyn Transport> = match &self.endpoint {
            Endpoint::Tcp(port) => Box::new(mqi_transport::TcpTransport::connect(*port)?),
            #[cfg(unix)]
            Endpoint::Unix(path) => Box::new(mqi_transport::UnixTransport::connect(path)?),
        };
        Session::handshake(self, transport, &self.password, self.default_query_timeout)
    }

    /// Explicit, diagnosable shutdown: attempt a graceful `quit`, then
    /// `SIGTERM`, then `SIGKILL`. Prefer this over relying on `Drop` when
    /// the caller wants to observe failures; `Drop` does the same thing
    /// best-effort if this was never called.
    pub fn shutdown(mut self) -> Result<(), Error> {
        self.terminate()
    }

    fn terminate(&mut self) -> Result<(), Error> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        if let Ok(mut session) = self.open_session() {
            session.quit();
        }

        process::terminate(&mut self.child, Duration::from_secs(2));

        #[cfg(unix)]
        if let Some(path) = &self.owned_socket_path {
            mqi_transport::remove_socket_file(path);
        }

        tracing::info!(target: "mqi_client::engine", "engine terminated");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

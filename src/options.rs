//! Engine launch configuration (spec §4.D, §6 env vars).
//!
//! Unlike the teacher's `ForwarderConfig` (a persistent TOML file describing
//! a long-running service), an MQI engine is launched fresh per [`Engine`]
//! and most of its settings are per-launch choices rather than deployment
//! config — so this is a consuming builder, not a file format.

use std::path::PathBuf;
use std::time::Duration;

/// How the client should reach the engine once it is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    Tcp,
    #[cfg(unix)]
    Unix,
}

/// Launch-time options for [`crate::Engine::launch`].
///
/// `engine_executable_path` falls back to the `PROLOG_PATH` environment
/// variable, and `extra_args` to `PROLOG_ARGS` (space-separated), mirroring
/// the env vars the real `swipl` launcher consumes (spec §6).
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub(crate) engine_executable_path: Option<PathBuf>,
    pub(crate) extra_args: Vec<String>,
    pub(crate) port: Option<u16>,
    pub(crate) password: Option<String>,
    pub(crate) endpoint_kind: EndpointKind,
    #[cfg(unix)]
    pub(crate) unix_socket_path: Option<PathBuf>,
    pub(crate) query_timeout_seconds: Option<f64>,
    pub(crate) pending_connections: u32,
    pub(crate) output_file_name: Option<PathBuf>,
    pub(crate) startup_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            engine_executable_path: None,
            extra_args: Vec::new(),
            port: None,
            password: None,
            endpoint_kind: EndpointKind::Tcp,
            #[cfg(unix)]
            unix_socket_path: None,
            query_timeout_seconds: None,
            pending_connections: 1,
            output_file_name: None,
            startup_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path to the engine executable. Falls back to `PROLOG_PATH` at launch
    /// time if never set.
    pub fn engine_executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_executable_path = Some(path.into());
        self
    }

    /// Extra arguments appended after the MQI-launch flags. Falls back to
    /// splitting `PROLOG_ARGS` on whitespace at launch time if never set.
    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Request a specific TCP port instead of letting the engine pick one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self.endpoint_kind = EndpointKind::Tcp;
        self
    }

    /// Pre-shared handshake password. A random one is generated at launch
    /// if never set.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Use a Unix domain socket instead of TCP loopback. Leaves the path
    /// unset so the engine picks its own scratch path unless
    /// [`EngineOptions::unix_socket_path`] is also called.
    #[cfg(unix)]
    pub fn use_unix_socket(mut self) -> Self {
        self.endpoint_kind = EndpointKind::Unix;
        self
    }

    /// Pin the Unix domain socket path instead of letting the engine choose
    /// one. Implies [`EngineOptions::use_unix_socket`].
    #[cfg(unix)]
    pub fn unix_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.unix_socket_path = Some(path.into());
        self.endpoint_kind = EndpointKind::Unix;
        self
    }

    /// Default query timeout (seconds) passed to `run`/`run_async` when a
    /// call site doesn't specify one. `None` leaves each query to the
    /// engine's own default (spec §9 open question: this is a pass-through,
    /// never normalized to a fixed client-side default).
    pub fn query_timeout_seconds(mut self, seconds: f64) -> Self {
        self.query_timeout_seconds = Some(seconds);
        self
    }

    /// Size of the engine's listen backlog.
    pub fn pending_connections(mut self, n: u32) -> Self {
        self.pending_connections = n;
        self
    }

    /// Redirect the engine's stdout/stderr to a file instead of draining it
    /// in-process.
    pub fn output_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file_name = Some(path.into());
        self
    }

    /// How long to wait for the handshake lines on stdout before giving up
    /// and killing the child.
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

//! Spawns and supervises the engine subprocess (spec §4.D).
//!
//! Grounded on `continuum-core`'s documented process-group strategy
//! (`libc` for `setsid`/`kill -pgid`) for termination, and on the
//! `services/forwarder` binary's habit of dedicating a thread per captured
//! stream rather than multiplexing stdout/stderr on one reader.

use crate::error::Error;
use crate::options::{EndpointKind, EngineOptions};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Tcp(u16),
    #[cfg(unix)]
    Unix(PathBuf),
}

pub(crate) struct SpawnedEngine {
    pub(crate) child: Child,
    pub(crate) endpoint: Endpoint,
    pub(crate) password: String,
    pub(crate) owned_socket_path: Option<PathBuf>,
    _stdout_drain: JoinHandle<()>,
    _stderr_drain: Option<JoinHandle<()>>,
}

pub(crate) fn spawn(options: &EngineOptions) -> Result<SpawnedEngine, Error> {
    let exe = resolve_executable(options)?;
    let password = options
        .password
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    let extra_args = resolve_extra_args(options);

    // <engine_executable> --quiet -g mqi_start -t halt --
    //     --write_connection_values=true [--port=<n> | --unix_domain_socket[=<path>]]
    //     --password=<s> [--query_timeout=<n>] --pending_connections=<n>
    //     [--write_output_to_file=<path>]  (spec §6)
    let mut args = vec![
        "--quiet".to_owned(),
        "-g".to_owned(),
        "mqi_start".to_owned(),
        "-t".to_owned(),
        "halt".to_owned(),
        "--".to_owned(),
        "--write_connection_values=true".to_owned(),
    ];
    match options.endpoint_kind {
        EndpointKind::Tcp => {
            if let Some(port) = options.port {
                args.push(format!("--port={port}"));
            }
        }
        #[cfg(unix)]
        EndpointKind::Unix => match &options.unix_socket_path {
            Some(path) => args.push(format!("--unix_domain_socket={}", path.display())),
            None => args.push("--unix_domain_socket".to_owned()),
        },
    }
    args.push(format!("--password={password}"));
    if let Some(seconds) = options.query_timeout_seconds {
        args.push(format!("--query_timeout={seconds}"));
    }
    args.push(format!(
        "--pending_connections={}",
        options.pending_connections
    ));
    if let Some(path) = &options.output_file_name {
        args.push(format!("--write_output_to_file={}", path.display()));
    }
    args.extend(extra_args);

    let mut command = Command::new(&exe);
    command.args(&args).stdin(Stdio::null());

    let redirect_file = match &options.output_file_name {
        Some(path) => Some(
            std::fs::File::create(path)
                .map_err(|e| Error::launch_io("creating output_file_name", e))?,
        ),
        None => None,
    };

    match &redirect_file {
        Some(file) => {
            command.stdout(Stdio::from(
                file.try_clone()
                    .map_err(|e| Error::launch_io("cloning output_file_name handle", e))?,
            ));
            command.stderr(Stdio::from(
                file.try_clone()
                    .map_err(|e| Error::launch_io("cloning output_file_name handle", e))?,
            ));
        }
        None => {
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New session/process group so the whole subtree can be killed
        // together on teardown, rather than leaking orphaned grandchildren.
        unsafe {
            command.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }

    let mut child = command
        .spawn()
        .map_err(|e| Error::launch_io(&format!("spawning {}", exe.display()), e))?;

    let (handshake_tx, handshake_rx) = mpsc::channel();
    let stdout_drain;
    let stderr_drain;

    if redirect_file.is_some() {
        stdout_drain = spawn_noop_drain();
        stderr_drain = None;
    } else {
        let stdout = child.stdout.take().expect("stdout was piped");
        stdout_drain = spawn_line_drain("stdout", stdout, Some(handshake_tx));
        let stderr = child.stderr.take().expect("stderr was piped");
        stderr_drain = Some(spawn_line_drain("stderr", stderr, None));
    }

    let endpoint = if redirect_file.is_some() {
        // No handshake lines to read; trust the options we launched with.
        default_endpoint(options)?
    } else {
        read_handshake(&handshake_rx, options.startup_timeout, &mut child)?
    };

    Ok(SpawnedEngine {
        child,
        endpoint,
        password,
        owned_socket_path: owned_socket_path(options),
        _stdout_drain: stdout_drain,
        _stderr_drain: stderr_drain,
    })
}

fn owned_socket_path(options: &EngineOptions) -> Option<PathBuf> {
    #[cfg(unix)]
    {
        if options.endpoint_kind == EndpointKind::Unix {
            return options.unix_socket_path.clone();
        }
    }
    #[cfg(not(unix))]
    let _ = options;
    None
}

fn default_endpoint(options: &EngineOptions) -> Result<Endpoint, Error> {
    match options.endpoint_kind {
        EndpointKind::Tcp => options.port.map(Endpoint::Tcp).ok_or_else(|| {
            Error::LaunchFailed(
                "output_file_name set but no port configured and no handshake to read".into(),
            )
        }),
        #[cfg(unix)]
        EndpointKind::Unix => options
            .unix_socket_path
            .clone()
            .map(Endpoint::Unix)
            .ok_or_else(|| {
                Error::LaunchFailed(
                    "output_file_name set but no unix_socket_path configured".into(),
                )
            }),
    }
}

/// Platform-common install locations tried when neither
/// `engine_executable_path` nor `PROLOG_PATH` name an executable.
const STANDARD_ENGINE_LOCATIONS: &[&str] = &[
    "/usr/bin/swipl",
    "/usr/local/bin/swipl",
    "/opt/homebrew/bin/swipl",
];

/// Resolve the engine executable: an explicit option, then `PROLOG_PATH`,
/// then a list of common install locations, then `PATH` lookup (spec §4.D,
/// §6 "Environment variables (consumed)").
fn resolve_executable(options: &EngineOptions) -> Result<PathBuf, Error> {
    if let Some(path) = &options.engine_executable_path {
        return Ok(path.clone());
    }
    if let Some(path) = std::env::var_os("PROLOG_PATH") {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = STANDARD_ENGINE_LOCATIONS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
    {
        return Ok(path);
    }
    which_on_path("swipl").ok_or_else(|| {
        Error::LaunchFailed(
            "no engine_executable_path/PROLOG_PATH set and no 'swipl' found in standard \
             locations or PATH"
                .into(),
        )
    })
}

/// Search `PATH` for an executable named `name`, the way a shell would.
fn which_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn resolve_extra_args(options: &EngineOptions) -> Vec<String> {
    if !options.extra_args.is_empty() {
        return options.extra_args.clone();
    }
    std::env::var("PROLOG_ARGS")
        .map(|raw| raw.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Read the two handshake lines (endpoint, then password-echo or ack) the
/// engine writes to stdout on startup, within `timeout`. Kills the child on
/// timeout or malformed output (spec §4.D).
fn read_handshake(
    rx: &mpsc::Receiver<String>,
    timeout: Duration,
    child: &mut Child,
) -> Result<Endpoint, Error> {
    let deadline = Instant::now() + timeout;
    let mut lines = Vec::with_capacity(2);
    while lines.len() < 2 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::LaunchFailed(format!(
                "engine produced no handshake within {timeout:?}"
            )));
        }
        match rx.recv_timeout(remaining) {
            Ok(line) => lines.push(line),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::LaunchFailed(
                    "engine exited before completing the handshake".into(),
                ));
            }
        }
    }

    parse_endpoint(&lines[0])
}

fn parse_endpoint(line: &str) -> Result<Endpoint, Error> {
    let line = line.trim();
    // TCP: the engine's first handshake line is the bare decimal port.
    if let Ok(port) = line.parse::<u16>() {
        return Ok(Endpoint::Tcp(port));
    }
    // UDS: the bare socket path.
    #[cfg(unix)]
    if line.starts_with('/') {
        return Ok(Endpoint::Unix(PathBuf::from(line)));
    }
    Err(Error::LaunchFailed(format!(
        "could not parse handshake endpoint line: {line:?}"
    )))
}

fn spawn_noop_drain() -> JoinHandle<()> {
    std::thread::spawn(|| {})
}

/// Drain one stream line-by-line for the lifetime of the process, tagging
/// each line with its origin at `trace` level. The first two non-empty
/// lines are additionally forwarded to `handshake_tx`, if present.
fn spawn_line_drain(
    origin: &'static str,
    stream: impl std::io::Read + Send + 'static,
    handshake_tx: Option<mpsc::Sender<String>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut sent = 0;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim_end_matches(['\r', '\n']);
                    if trimmed.is_empty() {
                        continue;
                    }
                    tracing::debug!(target: "mqi_client::engine_output", %origin, line = %trimmed);
                    if let Some(tx) = &handshake_tx {
                        if sent < 2 {
                            if tx.send(trimmed.to_owned()).is_err() {
                                // Handshake reader gave up (timed out); keep
                                // draining so the pipe never backs up.
                            }
                            sent += 1;
                        }
                    }
                }
                Err(_) => break,
            }
        }
    })
}

/// Terminate the child's whole process group: `SIGTERM`, then `SIGKILL`
/// after a grace period if it hasn't exited.
pub(crate) fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        let pid = child.id() as i32;
        unsafe {
            libc::kill(-pid, libc::SIGTERM);
        }
        let deadline = Instant::now() + grace;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                _ => break,
            }
        }
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
        let _ = child.wait();
    }
    #[cfg(not(unix))]
    {
        let _ = grace;
        let _ = child.kill();
        let _ = child.wait();
    }
}

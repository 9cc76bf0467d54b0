//! Byte-stream endpoints for the MQI wire protocol (spec §4.C): a TCP
//! loopback connection or a Unix domain socket, behind one small trait so
//! the session layer never has to care which.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::{Path, PathBuf};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("refused to connect to non-loopback address {0}")]
    NonLoopback(SocketAddr),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[cfg(unix)]
    #[error("Unix domain sockets are not usable on this platform")]
    UnixSocketsUnsupported,
}

/// Capability set required of an MQI byte-stream endpoint (spec §4.C):
/// open, read, write, and shutdown. Reads/writes are plain blocking I/O —
/// the session layer owns framing and sequencing on top of this.
pub trait Transport: Read + Write + Send {
    /// Apply a read timeout derived from the session's configured query
    /// timeout plus slack (spec §5). `None` clears any existing timeout.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError>;

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError>;

    /// Half- or full-close the underlying stream. Best-effort: a session
    /// that is already broken should not fail merely because shutdown
    /// could not be delivered to an already-dead peer.
    fn shutdown(&self);
}

// ---------------------------------------------------------------------------
// TCP loopback
// ---------------------------------------------------------------------------

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `127.0.0.1:<port>`. Refuses any other address per spec §4.C.
    pub fn connect(port: u16) -> Result<Self, TransportError> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        Self::connect_addr(addr)
    }

    /// Connect to an explicit address, rejecting non-loopback targets.
    pub fn connect_addr(addr: SocketAddr) -> Result<Self, TransportError> {
        if !addr.ip().is_loopback() {
            return Err(TransportError::NonLoopback(addr));
        }
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true).ok();
        Ok(TcpTransport { stream })
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for TcpTransport {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        Ok(self.stream.set_read_timeout(timeout)?)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        Ok(self.stream.set_write_timeout(timeout)?)
    }

    fn shutdown(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

// ---------------------------------------------------------------------------
// Unix domain socket
// ---------------------------------------------------------------------------

#[cfg(unix)]
pub struct UnixTransport {
    stream: UnixStream,
}

#[cfg(unix)]
impl UnixTransport {
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(path.as_ref())?;
        Ok(UnixTransport { stream })
    }
}

#[cfg(unix)]
impl Read for UnixTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

#[cfg(unix)]
impl Write for UnixTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

#[cfg(unix)]
impl Transport for UnixTransport {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        Ok(self.stream.set_read_timeout(timeout)?)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        Ok(self.stream.set_write_timeout(timeout)?)
    }

    fn shutdown(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

/// Remove a Unix domain socket file this process created, if it still
/// exists. Owned by the engine handle's drop path (spec §5), never called
/// by sessions.
#[cfg(unix)]
pub fn remove_socket_file(path: &PathBuf) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

    #[test]
    fn tcp_transport_refuses_non_loopback() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)), 80);
        let err = TcpTransport::connect_addr(addr).unwrap_err();
        assert!(matches!(err, TransportError::NonLoopback(_)));
    }

    #[test]
    fn tcp_transport_round_trips_bytes() {
        let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).unwrap();
            sock.write_all(&buf).unwrap();
        });

        let mut client = TcpTransport::connect(port).unwrap();
        client.write_all(b"hello").unwrap();
        let mut echoed = [0u8; 5];
        client.read_exact(&mut echoed).unwrap();
        assert_eq!(&echoed, b"hello");
        server.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn unix_transport_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mqi-test.sock");
        let listener = std::os::unix::net::UnixListener::bind(&path).unwrap();
        let server_path = path.clone();
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 3];
            sock.read_exact(&mut buf).unwrap();
            sock.write_all(&buf).unwrap();
            let _ = server_path;
        });

        let mut client = UnixTransport::connect(&path).unwrap();
        client.write_all(b"abc").unwrap();
        let mut echoed = [0u8; 3];
        client.read_exact(&mut echoed).unwrap();
        assert_eq!(&echoed, b"abc");
        server.join().unwrap();

        remove_socket_file(&path);
        assert!(!path.exists());
    }

    /// Drives a real `TcpTransport` through a handshake and one request/reply
    /// against `mqi-test-utils`'s `FakeEngine`, including heartbeat bytes the
    /// fake engine writes ahead of its reply — the same absorption the frame
    /// decoder must perform regardless of which concrete `Transport` carries
    /// the bytes (spec §4.A, §9).
    #[test]
    fn transport_carries_frames_and_absorbs_heartbeats_through_a_real_socket() {
        let engine = mqi_test_utils::FakeEngine::start(
            "secret",
            vec![mqi_test_utils::Step::reply(mqi_test_utils::reply::ack())
                .with_heartbeats(3)],
        );
        let mut client = TcpTransport::connect(engine.port()).unwrap();

        client
            .write_all(&mqi_protocol::encode("secret"))
            .unwrap();
        let handshake = mqi_protocol::decode_one(&mut client).unwrap();
        assert_eq!(
            mqi_protocol::decode_reply(&handshake).unwrap(),
            mqi_protocol::decode_reply(&mqi_test_utils::reply::handshake_ok()).unwrap()
        );

        client
            .write_all(&mqi_protocol::encode("run_async(true, -1, false)."))
            .unwrap();
        let reply = mqi_protocol::decode_one(&mut client).unwrap();
        assert_eq!(reply, mqi_test_utils::reply::ack());
    }
}

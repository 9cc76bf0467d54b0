//! Length-prefixed, UTF-8, period-terminated message framing (spec §4.A).
//!
//! Wire shape: `<decimal-length>.\n<payload>` where `payload` itself ends in
//! `.\n` and is counted by the length prefix. Heartbeat `.` bytes may appear
//! between frames (never mid-payload) and are silently absorbed.

use std::io::Read;
use thiserror::Error;

const TERMINATOR: &[u8; 2] = b".\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("connection closed before a complete frame was read")]
    ConnectionClosed,
}

/// States of the incremental frame decoder (spec §9 design note).
#[derive(Debug, Clone, PartialEq, Eq)]
enum DecoderState {
    /// Either a heartbeat `.` byte or the start of a decimal length.
    AwaitingLenOrHeartbeat,
    /// Accumulating decimal digits of the length prefix.
    ReadingLen { digits: String },
    /// Reading exactly `len` payload bytes.
    ReadingPayload { len: usize },
}

/// Encode `payload` as one frame: `len(payload + ".\n") + ".\n" + payload + ".\n"`.
pub fn encode(payload: &str) -> Vec<u8> {
    let body = format!("{payload}.\n");
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(body.len().to_string().as_bytes());
    out.extend_from_slice(TERMINATOR);
    out.extend_from_slice(body.as_bytes());
    out
}

/// Read and decode exactly one frame from `reader`, absorbing any heartbeat
/// `.` bytes that precede the length prefix.
///
/// Returns the decoded payload with its trailing `.\n` stripped.
pub fn decode_one<R: Read>(reader: &mut R) -> Result<String, FrameError> {
    let mut state = DecoderState::AwaitingLenOrHeartbeat;
    let mut byte = [0u8; 1];
    loop {
        match &mut state {
            DecoderState::AwaitingLenOrHeartbeat => {
                read_exact_or_eof(reader, &mut byte)?;
                match byte[0] {
                    b'.' => continue, // heartbeat; stay in this state
                    b'0'..=b'9' => {
                        state = DecoderState::ReadingLen {
                            digits: (byte[0] as char).to_string(),
                        };
                    }
                    other => {
                        return Err(FrameError::Malformed(format!(
                            "unexpected byte {other:#04x} while awaiting length or heartbeat"
                        )));
                    }
                }
            }
            DecoderState::ReadingLen { digits } => {
                read_exact_or_eof(reader, &mut byte)?;
                match byte[0] {
                    b'0'..=b'9' => digits.push(byte[0] as char),
                    b'.' => {
                        // Expect the length-prefix terminator's '\n' next.
                        read_exact_or_eof(reader, &mut byte)?;
                        if byte[0] != b'\n' {
                            return Err(FrameError::Malformed(
                                "length prefix terminator missing trailing newline".into(),
                            ));
                        }
                        let len: usize = digits.parse().map_err(|_| {
                            FrameError::Malformed(format!("invalid length digits: {digits:?}"))
                        })?;
                        state = DecoderState::ReadingPayload { len };
                    }
                    other => {
                        return Err(FrameError::Malformed(format!(
                            "unexpected byte {other:#04x} while reading length prefix"
                        )));
                    }
                }
            }
            DecoderState::ReadingPayload { len } => {
                if *len < TERMINATOR.len() {
                    return Err(FrameError::Malformed(format!(
                        "frame length {len} too short to contain terminator"
                    )));
                }
                let mut payload = vec![0u8; *len];
                reader
                    .read_exact(&mut payload)
                    .map_err(|_| FrameError::ConnectionClosed)?;
                if &payload[payload.len() - 2..] != TERMINATOR {
                    return Err(FrameError::Malformed(
                        "payload missing '.\\n' terminator".into(),
                    ));
                }
                let text = std::str::from_utf8(&payload[..payload.len() - 2])
                    .map_err(|e| FrameError::Malformed(format!("invalid UTF-8: {e}")))?;
                return Ok(text.to_owned());
            }
        }
    }
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8; 1]) -> Result<(), FrameError> {
    match reader.read(buf) {
        Ok(0) => Err(FrameError::ConnectionClosed),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(FrameError::ConnectionClosed)
        }
        Err(e) => Err(FrameError::Malformed(format!("I/O error: {e}"))),
    }
}

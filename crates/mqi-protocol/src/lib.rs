//! Wire-level types for the Machine Query Interface (MQI): frame codec,
//! answer-term decoder, and request payload builders.
//!
//! This crate has no knowledge of sockets, processes, or session state —
//! those live in `mqi-transport` and the root `mqi-client` crate. It only
//! knows how to turn bytes into [`Term`]s and back.

mod decode;
mod frame;
mod term;
mod wire;

pub use decode::{decode_reply, decode_term, extract_binding, DecodeError, RawReply};
pub use frame::{decode_one, encode, FrameError};
pub use term::Term;
pub use wire::{
    async_result_request, cancel_async_request, close_request, password_request,
    quit_request, run_async_request, run_request, Timeout,
};

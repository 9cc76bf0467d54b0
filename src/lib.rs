//! Client library for the Machine Query Interface (MQI): launches and
//! supervises an embedded logic-programming engine subprocess, and drives
//! queries against it over a framed, length-prefixed wire protocol.
//!
//! This crate emits [`tracing`] events but never installs a subscriber —
//! wire a subscriber in the binary that embeds this library if you want to
//! see them.
//!
//! ```no_run
//! use mqi_client::{Engine, EngineOptions, Timeout};
//!
//! let engine = Engine::launch(EngineOptions::new().port(0))?;
//! let mut session = engine.open_session()?;
//! let result = session.run_sync("member(X,[1,2,3])", Timeout::Unlimited)?;
//! println!("{result:?}");
//! # Ok::<(), mqi_client::Error>(())
//! ```

mod engine;
mod error;
mod options;
mod process;
mod query;
mod session;

pub use engine::Engine;
pub use error::Error;
pub use options::EngineOptions;
pub use query::{PollOutcome, QueryResult, Solution};
pub use session::Session;

// Re-exported so callers never need to depend on `mqi-protocol` directly
// for the handful of wire-level types that appear in this crate's public
// API.
pub use mqi_protocol::{Term, Timeout};

pub mod prelude {
    //! Common imports for users of this crate: `use mqi_client::prelude::*;`
    pub use crate::{Engine, EngineOptions, Error, PollOutcome, QueryResult, Session, Solution};
    pub use mqi_protocol::{Term, Timeout};
}

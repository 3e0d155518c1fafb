//! # Obsession
//!
//! A typed, asynchronous session engine for the `obs-websocket` v5 protocol.
//!
//! The crate speaks the full control-channel core: version negotiation and
//! challenge-response authentication, correlated request/response exchanges,
//! batched requests, and server-pushed event streams. Concrete request and
//! event payloads are open-ended: anything implementing
//! [`requests::RequestType`] or [`events::EventType`] plugs into the engine,
//! and a small set of commonly needed shapes ships in-tree.
//!
//! ```no_run
//! use obsession::{requests::general::GetVersion, Client};
//!
//! # async fn run() -> obsession::Result<()> {
//! let client = Client::connect("localhost", 4455, Some("secret")).await?;
//! let version = client.send(&GetVersion).await?;
//! println!("connected to OBS {}", version.obs_version);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs, rust_2018_idioms, clippy::all)]

pub use self::{
    client::Client,
    error::{Error, Result},
};

pub mod client;
mod error;
pub mod events;
pub mod requests;
pub mod responses;

/// The RPC protocol revision implemented by this library and requested from
/// the server during identification.
pub const RPC_VERSION: u32 = 1;

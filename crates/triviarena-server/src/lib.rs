//! WebSocket front door for Triviarena.
//!
//! Accepts sockets, frames the protocol, and routes player actions into
//! the lobby registry. One handler task plus one writer task per
//! connection; everything stateful lives in [`triviarena_game`].
//!
//! # Key types
//!
//! - [`TriviarenaServer`] — bound listener, accept loop, shutdown
//! - [`TriviarenaServerBuilder`] — address, game config, source and store
//! - [`ServerError`] — connection-level failures

mod error;
mod handler;
mod server;

pub use error::ServerError;
pub use server::{TriviarenaServer, TriviarenaServerBuilder};

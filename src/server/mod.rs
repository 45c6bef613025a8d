//! HTTP/2 server-side surface (spec.md §4.4).
//!
//! `ServerCore` negotiates ALPN per accepted connection and bridges each
//! resulting `h2` stream into an `IncomingRequest`/`OutgoingResponse` pair
//! for a handler to answer.

mod builder;
#[cfg(feature = "tls")]
mod core;
pub mod raw;

pub use self::builder::ServerBuilder;
#[cfg(feature = "tls")]
pub use self::core::{ServerCore, ServerHandle};
pub use crate::proto::h2::server::Pusher;

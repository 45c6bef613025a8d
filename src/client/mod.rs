//! HTTP/2 client-side surface (spec.md §4.5).
//!
//! `ClientAgent` coalesces connections per `(tls, host, port)` authority,
//! negotiates ALPN once per authority, and falls back to HTTP/1.1 when the
//! peer doesn't speak `h2` — never as an error, per spec.md's design notes.

mod agent;
mod global;
pub mod raw;

pub use self::agent::{ClientAgent, Response};
pub use self::global::default_agent;
pub use crate::proto::h2::client::PushPromises;

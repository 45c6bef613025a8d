#![cfg_attr(docsrs, feature(doc_cfg))]

//! # h2bridge
//!
//! The HTTP/2 semantic layer of a dual-stack HTTP client/server library:
//! header-block validation, readable/writable message wrappers over `h2`
//! streams, server-side stream bridging with ALPN negotiation, and
//! client-side per-authority connection coalescing with an HTTP/1.1
//! fallback when a peer doesn't speak `h2`.
//!
//! `h2bridge` deliberately doesn't reimplement HTTP/2 framing, HPACK, TLS,
//! or HTTP/1.1 — those are the `h2`, `rustls`, and `hyper` crates'
//! jobs, consumed here as-is. What this crate adds on top:
//!
//! - [`header`] — the extra conformance rules HTTP/2 framing alone doesn't
//!   enforce (deprecated/forbidden header names, casing).
//! - [`message`] — [`message::IncomingMessage`]/[`message::OutgoingMessage`]
//!   and their request/response/promise specializations, bridging `h2`
//!   streams to something application code reads and writes like a body.
//! - [`server`] — [`server::ServerCore`], which negotiates ALPN per
//!   accepted connection and bridges streams to a request handler.
//! - [`client`] — [`client::ClientAgent`], which coalesces connections per
//!   authority and falls back to HTTP/1.1 when `h2` isn't negotiated.
//!
//! # Features
//!
//! - `client` / `server` — the two halves above.
//! - `tls` — ALPN/TLS negotiation via `rustls`/`tokio-rustls`.
//! - `fallback-http1` — HTTP/1.1 fallback via the real `hyper` client/server
//!   stack, used as-is rather than reimplemented.
//! - `layers` — a configured `tracing-subscriber` for binaries and tests
//!   that want one; the `tracing` facade itself is always present.

pub use http;
pub use http::{HeaderMap, Method, Request, Response, StatusCode, Uri, Version};

pub use crate::error::{Error, Result};

mod common;
mod error;
pub mod header;
pub mod message;
mod proto;
pub mod rt;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

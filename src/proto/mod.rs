//! Per-connection tasks that drive an `h2` connection and bridge its
//! streams into `IncomingMessage`/`OutgoingMessage` pairs.
//!
//! `ServerCore` and `ClientAgent` each spawn one of these per negotiated
//! HTTP/2 connection; the rest of the crate never touches `h2::Connection`
//! directly.

pub(crate) mod h2;

//! The `h2`-facing half of the bridge: per-connection dispatch tasks shared
//! by the client and server sides.

pub(crate) mod client;
pub(crate) mod server;

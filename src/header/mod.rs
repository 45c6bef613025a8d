//! Header-block validation for the HTTP/2 semantic layer.
//!
//! Header blocks themselves are represented with `http::HeaderMap`; this
//! module only adds the extra HTTP/2 conformance rules `spec.md` §4.1
//! requires on top of what the `h2`/`http` crates already structurally
//! guarantee (pseudo-headers never reach a `HeaderMap` at all, since `h2`
//! splits them into `Request`/`Response` fields before we ever see them).

mod validator;

pub(crate) use self::validator::validate_inbound;
pub use self::validator::is_forbidden_outbound;

/// Headers that may never appear on an outbound message, regardless of
/// direction.
///
/// `host` is deliberately absent: spec.md's Open Question #1 keeps the
/// asymmetry the original system had — `host` is tolerated inbound (servers
/// may see it from older/misbehaving peers) but rejected outbound, since
/// `:authority` is the single source of truth once we're the ones writing
/// the header block. See [`is_forbidden_outbound`] for the outbound set,
/// which does include `host`.
pub(crate) const FORBIDDEN_INBOUND: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "transfer-encoding",
    "upgrade",
];

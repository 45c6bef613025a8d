//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;

/// Result type returned from methods that can produce an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents errors that can occur bridging HTTP/2 streams into messages.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Caller violated a precondition (spec.md §7, Usage error).
    User(User),
    /// Inbound data violated HTTP/2 conformance; the stream was reset.
    Protocol(h2::Reason),
    /// Socket, endpoint or TLS failure.
    Transport,
    /// A general error surfaced by the `h2` framing endpoint.
    H2,
    /// A pending item was dropped before ever being processed.
    Canceled,
    /// A dispatch or body channel is closed.
    ChannelClosed,
    /// ALPN/NPN negotiation chose something other than `h2`.
    ///
    /// Not a failure mode the caller needs to handle as an error in the
    /// common case; kept so `ClientAgent` can distinguish "fell back to
    /// HTTP/1.1" from a genuine transport failure when logging.
    NegotiatedFallback,
}

#[derive(Debug)]
pub(crate) enum User {
    /// `setHeader`/`removeHeader` called after headers were already sent.
    HeadersSent,
    /// caller tried to set a forbidden header (spec.md §3 Invariants).
    ForbiddenHeader,
    /// caller asked for `http:` without enabling the plain-TCP transport.
    PlaintextUpgradeUnsupported,
    /// server builder is missing `key`+`cert` (or `pfx`) for TLS mode.
    MissingTlsCredentials,
    /// a raw (plain-TCP) client/server was given a `https:`/TLS-only option.
    TlsNotSupportedOnRaw,
    /// server builder was given `pfx` instead of `key`+`cert`; PKCS#12 isn't
    /// in this crate's dependency stack, only PEM via `rustls-pemfile`.
    PfxNotSupported,
    /// `OutgoingRequest::basic_auth` produced a value `HeaderValue` rejects
    /// (a `user`/`password` containing a CR or LF).
    InvalidCredentials,
}

impl Error {
    /// Returns true if this error was caused by user/caller code.
    pub fn is_user(&self) -> bool {
        matches!(self.inner.kind, Kind::User(_))
    }

    /// Returns true if this was a stream-level HTTP/2 protocol violation,
    /// and if so, the reset reason that was (or should be) sent.
    pub fn protocol_reason(&self) -> Option<h2::Reason> {
        match self.inner.kind {
            Kind::Protocol(reason) => Some(reason),
            _ => None,
        }
    }

    /// Returns true if this was about an operation that was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self.inner.kind, Kind::Canceled)
    }

    /// Returns true if a sender's channel is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::ChannelClosed)
    }

    /// Consumes the error, returning its cause.
    pub fn into_cause(self) -> Option<Cause> {
        self.inner.cause
    }

    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn new_protocol(reason: h2::Reason) -> Error {
        Error::new(Kind::Protocol(reason))
    }

    pub(crate) fn new_canceled() -> Error {
        Error::new(Kind::Canceled)
    }

    pub(crate) fn new_closed() -> Error {
        Error::new(Kind::ChannelClosed)
    }

    pub(crate) fn new_io(cause: std::io::Error) -> Error {
        Error::new(Kind::Transport).with(cause)
    }

    #[cfg(feature = "tls")]
    pub(crate) fn new_tls<C: Into<Cause>>(cause: C) -> Error {
        Error::new(Kind::Transport).with(cause)
    }

    /// A transport-level failure outside TLS specifically — the HTTP/1.1
    /// fallback connection, most often.
    pub(crate) fn new_transport<C: Into<Cause>>(cause: C) -> Error {
        Error::new(Kind::Transport).with(cause)
    }

    pub(crate) fn new_negotiated_fallback() -> Error {
        Error::new(Kind::NegotiatedFallback)
    }

    fn new_user(user: User) -> Error {
        Error::new(Kind::User(user))
    }

    pub(crate) fn new_user_headers_sent() -> Error {
        Error::new_user(User::HeadersSent)
    }

    pub(crate) fn new_user_forbidden_header() -> Error {
        Error::new_user(User::ForbiddenHeader)
    }

    pub(crate) fn new_user_plaintext_upgrade_unsupported() -> Error {
        Error::new_user(User::PlaintextUpgradeUnsupported)
    }

    pub(crate) fn new_user_missing_tls_credentials() -> Error {
        Error::new_user(User::MissingTlsCredentials)
    }

    pub(crate) fn new_user_tls_not_supported_on_raw() -> Error {
        Error::new_user(User::TlsNotSupportedOnRaw)
    }

    pub(crate) fn new_user_pfx_not_supported() -> Error {
        Error::new_user(User::PfxNotSupported)
    }

    pub(crate) fn new_user_invalid_credentials() -> Error {
        Error::new_user(User::InvalidCredentials)
    }

    pub(crate) fn new_h2(cause: h2::Error) -> Error {
        if let Some(reason) = cause.reason() {
            Error::new_protocol(reason).with(cause)
        } else if cause.is_io() {
            Error::new_io(cause.into_io().expect("h2::Error::is_io"))
        } else {
            Error::new(Kind::H2).with(cause)
        }
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::User(User::HeadersSent) => "setHeader called after headers were sent",
            Kind::User(User::ForbiddenHeader) => "attempted to set a forbidden header",
            Kind::User(User::PlaintextUpgradeUnsupported) => {
                "http: scheme requires the raw (plain-TCP) transport"
            }
            Kind::User(User::MissingTlsCredentials) => {
                "server requires `key` and `cert` (or `pfx`) for TLS"
            }
            Kind::User(User::TlsNotSupportedOnRaw) => "TLS options given to a raw (plain) endpoint",
            Kind::User(User::PfxNotSupported) => "pfx credentials given; only key+cert PEM is supported",
            Kind::User(User::InvalidCredentials) => "basic_auth user/password produced an invalid header value",
            Kind::Protocol(_) => "stream reset for an HTTP/2 protocol violation",
            Kind::Transport => "transport error",
            Kind::H2 => "http2 framing error",
            Kind::Canceled => "operation was canceled",
            Kind::ChannelClosed => "channel closed",
            Kind::NegotiatedFallback => "ALPN/NPN negotiated HTTP/1.1, not an error",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("h2bridge::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref cause) = self.inner.cause {
            write!(f, "{}: {}", self.description(), cause)
        } else {
            f.write_str(self.description())
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::new_io(err)
    }
}

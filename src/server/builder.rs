//! `ServerCore` configuration (spec.md §4.4).

use crate::error::{Error, Result};

#[derive(Default, Clone)]
pub(crate) struct H2Settings {
    pub(crate) initial_window_size: Option<u32>,
    pub(crate) max_concurrent_streams: Option<u32>,
    pub(crate) max_frame_size: Option<u32>,
}

/// What an `h2` response comes back as from a fallback HTTP/1.1 handler.
#[cfg(feature = "fallback-http1")]
pub type Http1Response = std::result::Result<http::Response<hyper::Body>, Box<dyn std::error::Error + Send + Sync>>;

/// A handler for connections that ALPN negotiated down to `http/1.1` (or
/// that presented no SNI), installed with [`ServerBuilder::fallback_http1`].
///
/// Mirrors spec.md §4.4's `fallback(socket)`: rather than reimplementing
/// HTTP/1.1 parsing, this crate hands the connection's already-accepted
/// byte stream to a user-supplied handler built on the real `hyper`
/// client/server stack, the same collaborator the client side's
/// `fallback-http1` feature consumes.
#[cfg(feature = "fallback-http1")]
pub type Http1Handler = std::sync::Arc<
    dyn Fn(http::Request<hyper::Body>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Http1Response> + Send>>
        + Send
        + Sync,
>;

/// Builds a [`super::core::ServerCore`]. Mirrors the original design's
/// `key`/`cert`/`pfx`/`plain`/`settings`/`ciphers`/`honorCipherOrder`/`log`
/// options, adapted to this crate's config-then-build idiom.
#[derive(Default)]
pub struct ServerBuilder {
    key: Option<Vec<u8>>,
    cert: Option<Vec<u8>>,
    pfx: Option<Vec<u8>>,
    plain: bool,
    ciphers: Option<String>,
    honor_cipher_order: bool,
    h2_settings: H2Settings,
    #[cfg(feature = "fallback-http1")]
    fallback_http1: Option<Http1Handler>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// PEM-encoded private key.
    pub fn key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// PEM-encoded certificate chain.
    pub fn cert(mut self, cert: impl Into<Vec<u8>>) -> Self {
        self.cert = Some(cert.into());
        self
    }

    /// PKCS#12 credentials. Accepted for API parity with the original
    /// design, but building a TLS config from it isn't supported — this
    /// crate's TLS stack is `rustls`, which only loads PEM. Use
    /// [`ServerBuilder::key`] and [`ServerBuilder::cert`] instead.
    pub fn pfx(mut self, pfx: impl Into<Vec<u8>>) -> Self {
        self.pfx = Some(pfx.into());
        self
    }

    /// Skip TLS/ALPN negotiation and speak HTTP/2 in the clear.
    pub fn plain(mut self, plain: bool) -> Self {
        self.plain = plain;
        self
    }

    /// Installs the handler a connection falls back to when ALPN doesn't
    /// negotiate `h2` (or the client presented no SNI) — spec.md §4.4's
    /// `fallback(socket)`. Without one, such a connection is simply closed.
    #[cfg(feature = "fallback-http1")]
    pub fn fallback_http1(mut self, handler: Http1Handler) -> Self {
        self.fallback_http1 = Some(handler);
        self
    }

    /// Accepted for compatibility; `rustls` chooses its own cipher suite
    /// order rather than exposing a configurable preference list the way
    /// the original OpenSSL-backed design did.
    pub fn ciphers(mut self, ciphers: impl Into<String>) -> Self {
        self.ciphers = Some(ciphers.into());
        self
    }

    pub fn honor_cipher_order(mut self, honor: bool) -> Self {
        self.honor_cipher_order = honor;
        self
    }

    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.h2_settings.initial_window_size = Some(size);
        self
    }

    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.h2_settings.max_concurrent_streams = Some(max);
        self
    }

    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.h2_settings.max_frame_size = Some(size);
        self
    }

    pub(crate) fn is_plain(&self) -> bool {
        self.plain
    }

    #[cfg(feature = "fallback-http1")]
    pub(crate) fn http1_handler(&self) -> Option<Http1Handler> {
        self.fallback_http1.clone()
    }

    pub(crate) fn h2_builder(&self) -> h2::server::Builder {
        let mut builder = h2::server::Builder::new();
        if let Some(w) = self.h2_settings.initial_window_size {
            builder.initial_window_size(w);
        }
        if let Some(m) = self.h2_settings.max_concurrent_streams {
            builder.max_concurrent_streams(m);
        }
        if let Some(f) = self.h2_settings.max_frame_size {
            builder.max_frame_size(f);
        }
        builder
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.plain {
            if self.key.is_some() || self.cert.is_some() || self.pfx.is_some() {
                return Err(Error::new_user_tls_not_supported_on_raw());
            }
            return Ok(());
        }

        if self.pfx.is_some() && self.key.is_none() && self.cert.is_none() {
            return Err(Error::new_user_pfx_not_supported());
        }
        if self.key.is_none() || self.cert.is_none() {
            return Err(Error::new_user_missing_tls_credentials());
        }
        Ok(())
    }

    #[cfg(feature = "tls")]
    pub(crate) fn tls_config(&self) -> Result<std::sync::Arc<rustls::ServerConfig>> {
        use std::io::Cursor;

        if self.ciphers.is_some() || self.honor_cipher_order {
            tracing::debug!(
                "ciphers/honor_cipher_order accepted for compatibility; rustls picks its own suite order"
            );
        }

        let cert_pem = self
            .cert
            .as_deref()
            .ok_or_else(Error::new_user_missing_tls_credentials)?;
        let key_pem = self
            .key
            .as_deref()
            .ok_or_else(Error::new_user_missing_tls_credentials)?;

        let certs = rustls_pemfile::certs(&mut Cursor::new(cert_pem))
            .map_err(Error::new_io)?
            .into_iter()
            .map(rustls::Certificate)
            .collect();

        let mut keys = rustls_pemfile::pkcs8_private_keys(&mut Cursor::new(key_pem)).map_err(Error::new_io)?;
        if keys.is_empty() {
            return Err(Error::new_user_missing_tls_credentials());
        }
        let key = rustls::PrivateKey(keys.remove(0));

        let mut config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(Error::new_tls)?;

        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(std::sync::Arc::new(config))
    }
}

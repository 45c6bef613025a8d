use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, Uri};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};

use crate::common::exec::{BoxSendFuture, Exec};
use crate::error::{Error, Result};
use crate::message::{IncomingResponse, OutgoingRequest};
use crate::proto::h2::client as h2client;
use crate::rt::Executor;

type Key = (bool, String, u16);

#[derive(Clone)]
enum Endpoint {
    H2(h2client::SendRequest),
    #[cfg(feature = "fallback-http1")]
    H1(Arc<Mutex<hyper::client::conn::SendRequest<hyper::Body>>>),
}

enum Slot {
    Connecting(broadcast::Sender<()>),
    Ready(Endpoint),
}

/// A response from either the `h2` path or, when ALPN negotiated
/// `http/1.1`, the real `hyper` fallback stack — handed back as-is rather
/// than forced into this crate's HTTP/2-specific `IncomingResponse`, since
/// that's the whole point of consuming `hyper` for this collaborator.
pub enum Response {
    H2(IncomingResponse),
    #[cfg(feature = "fallback-http1")]
    H1(http::Response<hyper::Body>),
}

/// Per-authority connection coalescing and ALPN negotiation (spec.md
/// §4.5). At most one negotiation runs per `(tls, host, port)` key at a
/// time; concurrent callers for the same key wait on the in-flight
/// negotiation's `broadcast` channel rather than racing their own — the
/// first negotiation to finish wins and is installed for everyone.
pub struct ClientAgent {
    endpoints: Mutex<HashMap<Key, Slot>>,
    exec: Exec,
}

impl Default for ClientAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientAgent {
    pub fn new() -> Self {
        ClientAgent {
            endpoints: Mutex::new(HashMap::new()),
            exec: Exec::default(),
        }
    }

    /// Runs this agent's background connection-driving tasks on `exec`
    /// instead of `tokio::spawn`.
    pub fn with_executor<E>(mut self, exec: E) -> Self
    where
        E: Executor<BoxSendFuture> + Send + Sync + 'static,
    {
        self.exec = Exec::Executor(Arc::new(exec));
        self
    }

    /// Stops reusing every cached connection: the next request for any
    /// authority renegotiates from scratch. Already-issued `SendRequest`
    /// clones held by in-flight requests are untouched — `h2`/`hyper` own
    /// their connections' actual lifetimes, this only forgets the cache.
    pub async fn close(&self) {
        self.endpoints.lock().await.clear();
    }

    pub async fn get(&self, uri: Uri) -> Result<Response> {
        self.request(OutgoingRequest::new(Method::GET, uri)).await
    }

    pub async fn request(&self, req: OutgoingRequest) -> Result<Response> {
        let (response, _pushes) = self.request_with_pushes(req).await?;
        Ok(response)
    }

    /// Like [`ClientAgent::request`], but also returns the stream of
    /// resources the server promised to push while answering this request
    /// (spec.md §6, "Server push reception"). Pushes are only ever offered
    /// on the `h2` path; a request that falls back to HTTP/1.1 gets `None`.
    pub async fn request_with_pushes(
        &self,
        mut req: OutgoingRequest,
    ) -> Result<(Response, Option<h2client::PushPromises>)> {
        let key = Self::key_for(req.uri())?;
        let endpoint = self.endpoint(key).await?;

        match endpoint {
            Endpoint::H2(send_request) => {
                let (response, pushes) = h2client::send(send_request, &mut req).await?;
                Ok((Response::H2(response), Some(pushes)))
            }
            #[cfg(feature = "fallback-http1")]
            Endpoint::H1(send_request) => {
                let response = self.send_h1(send_request, req).await?;
                Ok((response, None))
            }
        }
    }

    fn key_for(uri: &Uri) -> Result<Key> {
        let tls = match uri.scheme_str() {
            Some("https") | None => true,
            Some("http") => false,
            Some(_) => return Err(Error::new_user_plaintext_upgrade_unsupported()),
        };
        let host = uri
            .host()
            .ok_or_else(Error::new_user_plaintext_upgrade_unsupported)?
            .to_owned();
        let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });
        Ok((tls, host, port))
    }

    /// Returns a handle to the negotiated connection for `key`, negotiating
    /// one first if nothing is open or in flight yet.
    async fn endpoint(&self, key: Key) -> Result<Endpoint> {
        loop {
            let mut guard = self.endpoints.lock().await;
            match guard.get(&key) {
                Some(Slot::Ready(ep)) => return Ok(ep.clone()),
                Some(Slot::Connecting(tx)) => {
                    let mut rx = tx.subscribe();
                    drop(guard);
                    let _ = rx.recv().await;
                    continue;
                }
                None => {
                    let (tx, _rx) = broadcast::channel(1);
                    guard.insert(key.clone(), Slot::Connecting(tx.clone()));
                    drop(guard);

                    let result = self.negotiate(&key).await;

                    let mut guard = self.endpoints.lock().await;
                    return match result {
                        Ok(ep) => {
                            guard.insert(key.clone(), Slot::Ready(ep.clone()));
                            drop(guard);
                            let _ = tx.send(());
                            Ok(ep)
                        }
                        Err(e) => {
                            guard.remove(&key);
                            drop(guard);
                            let _ = tx.send(());
                            Err(e)
                        }
                    };
                }
            }
        }
    }

    async fn negotiate(&self, key: &Key) -> Result<Endpoint> {
        let (tls, host, port) = key;
        let stream = TcpStream::connect((host.as_str(), *port))
            .await
            .map_err(Error::new_io)?;

        if !*tls {
            let send_request = h2client::handshake(stream, &self.exec).await?;
            return Ok(Endpoint::H2(send_request));
        }

        self.negotiate_tls(host, stream).await
    }

    #[cfg(feature = "tls")]
    async fn negotiate_tls(&self, host: &str, stream: TcpStream) -> Result<Endpoint> {
        let mut roots = rustls::RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs().map_err(Error::new_io)? {
            let _ = roots.add(&rustls::Certificate(cert.0));
        }

        let mut config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        let connector = tokio_rustls::TlsConnector::from(Arc::new(config));
        let server_name = rustls::ServerName::try_from(host).map_err(Error::new_tls)?;

        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(Error::new_io)?;

        // Negotiation failure is not an error (spec.md design notes): no
        // ALPN extension at all, same as an explicit `h2`, keeps us on the
        // fast path; only an explicit non-`h2` choice triggers fallback.
        let alpn = tls_stream.get_ref().1.alpn_protocol().map(|p| p.to_vec());
        match alpn.as_deref() {
            Some(b"h2") | None => {
                let send_request = h2client::handshake(tls_stream, &self.exec).await?;
                Ok(Endpoint::H2(send_request))
            }
            _ => self.fallback_http1(tls_stream).await,
        }
    }

    #[cfg(not(feature = "tls"))]
    async fn negotiate_tls(&self, _host: &str, _stream: TcpStream) -> Result<Endpoint> {
        Err(Error::new_user_plaintext_upgrade_unsupported())
    }

    #[cfg(feature = "fallback-http1")]
    async fn fallback_http1<IO>(&self, io: IO) -> Result<Endpoint>
    where
        IO: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (send_request, connection) = hyper::client::conn::Builder::new()
            .handshake::<IO, hyper::Body>(io)
            .await
            .map_err(Error::new_transport)?;

        self.exec.execute(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "http/1.1 fallback connection closed");
            }
        });

        Ok(Endpoint::H1(Arc::new(Mutex::new(send_request))))
    }

    #[cfg(not(feature = "fallback-http1"))]
    async fn fallback_http1<IO>(&self, _io: IO) -> Result<Endpoint> {
        Err(Error::new_negotiated_fallback())
    }

    #[cfg(feature = "fallback-http1")]
    async fn send_h1(
        &self,
        send_request: Arc<Mutex<hyper::client::conn::SendRequest<hyper::Body>>>,
        mut req: OutgoingRequest,
    ) -> Result<Response> {
        let headers = req.message().headers().clone();
        let method = req.method().clone();
        let uri = req.uri().clone();
        let buffered = req.message_mut().take_buffered();

        let body = match buffered {
            Some((chunks, _trailers)) => {
                let mut flat = Vec::new();
                for chunk in chunks {
                    flat.extend_from_slice(&chunk);
                }
                hyper::Body::from(flat)
            }
            None => hyper::Body::empty(),
        };

        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(h) = builder.headers_mut() {
            *h = headers;
        }
        let h1_request = builder.body(body).map_err(Error::new_transport)?;

        let response = {
            let mut guard = send_request.lock().await;
            guard.send_request(h1_request).await.map_err(Error::new_transport)?
        };

        Ok(Response::H1(response))
    }
}

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

use crate::error::{Error, Result};
use crate::header;
use super::incoming::Priority;

/// Where an [`OutgoingMessage`] is along its write lifecycle.
///
/// The original design's `Buffering → Attached → HeadersSent → Writing →
/// Ending → Closed` chain collapses to three states here because `h2`'s own
/// API only ever hands back a writable [`h2::SendStream`] in the same call
/// that sends the header block (`send_request`/`send_response`) — there is
/// no point in this implementation where headers are "sent" without the
/// message also becoming writable, so `Attached` and `HeadersSent` are the
/// same transition.
enum SendState {
    /// Not yet bound to a stream: a `ClientAgent` request constructed before
    /// its connection finished negotiating, or a response still waiting on
    /// its `SendResponse` handle. Writes accumulate here.
    Buffering {
        body: Vec<Bytes>,
        end: bool,
        trailers: Option<HeaderMap>,
    },
    /// Headers sent, body frames flow straight to the wire.
    Open(h2::SendStream<Bytes>),
    /// `end()` has been called and flushed.
    Closed,
}

/// The writable half of the bridge (spec.md §4.3).
///
/// Header mutation is only legal before the message is attached to a
/// stream; once [`OutgoingMessage::attach`] has run, `set_header`/
/// `remove_header` return [`Error::new_user_headers_sent`], matching
/// spec.md's "headers sent" invariant.
pub struct OutgoingMessage {
    headers: HeaderMap,
    headers_sent: bool,
    state: SendState,
}

impl OutgoingMessage {
    pub(crate) fn new() -> Self {
        OutgoingMessage {
            headers: HeaderMap::new(),
            headers_sent: false,
            state: SendState::Buffering {
                body: Vec::new(),
                end: false,
                trailers: None,
            },
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Whether `end()` has already been called (buffered or flushed). A
    /// second `end()` call while still `Buffering` would otherwise silently
    /// overwrite whatever trailers the first call set, so callers that
    /// might run after a handler already ended the message (`ServerCore`'s
    /// handler-forgot-to-end safety net, for one) must check this first.
    pub fn is_ended(&self) -> bool {
        match &self.state {
            SendState::Buffering { end, .. } => *end,
            SendState::Open(_) => false,
            SendState::Closed => true,
        }
    }

    /// Sets a regular header. Fails if headers have already gone out, or if
    /// `name` is on the forbidden-outbound list (spec.md §3 Invariants).
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<()> {
        if self.headers_sent {
            return Err(Error::new_user_headers_sent());
        }
        if header::is_forbidden_outbound(name.as_str()) {
            return Err(Error::new_user_forbidden_header());
        }
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn remove_header(&mut self, name: &HeaderName) -> Result<()> {
        if self.headers_sent {
            return Err(Error::new_user_headers_sent());
        }
        self.headers.remove(name);
        Ok(())
    }

    /// Queues (if not yet attached) or writes (if attached) a body chunk.
    pub fn write(&mut self, chunk: Bytes) -> Result<()> {
        match &mut self.state {
            SendState::Buffering { body, end, .. } => {
                if *end {
                    return Err(Error::new_closed());
                }
                body.push(chunk);
                Ok(())
            }
            SendState::Open(send) => send
                .send_data(chunk, false)
                .map_err(Error::new_h2),
            SendState::Closed => Err(Error::new_closed()),
        }
    }

    /// Ends the message, optionally with a single trailer block.
    ///
    /// A second call while still `Buffering` is a no-op rather than a
    /// silent trailer overwrite: once `end` is already buffered, whatever
    /// trailers came with the first call are what gets sent on attach.
    pub fn end(&mut self, trailers: Option<HeaderMap>) -> Result<()> {
        match &mut self.state {
            SendState::Buffering { end, .. } if *end => Ok(()),
            SendState::Buffering {
                end,
                trailers: buffered_trailers,
                ..
            } => {
                *end = true;
                *buffered_trailers = trailers;
                Ok(())
            }
            SendState::Open(_) => {
                let send = match std::mem::replace(&mut self.state, SendState::Closed) {
                    SendState::Open(send) => send,
                    _ => unreachable!(),
                };
                Self::flush_end(send, trailers)
            }
            SendState::Closed => Err(Error::new_closed()),
        }
    }

    fn flush_end(mut send: h2::SendStream<Bytes>, trailers: Option<HeaderMap>) -> Result<()> {
        send.send_data(Bytes::new(), trailers.is_none())
            .map_err(Error::new_h2)?;
        if let Some(trailers) = trailers {
            send.send_trailers(trailers).map_err(Error::new_h2)?;
        }
        Ok(())
    }

    /// Pulls out whatever was buffered before this message was ever attached
    /// to an `h2` stream, for a caller that needs to hand it to something
    /// else entirely — namely the HTTP/1.1 fallback path, which builds its
    /// own `hyper::Body` rather than an `h2::SendStream`. Leaves the message
    /// `Closed`; calling it after `attach` returns `None`.
    pub(crate) fn take_buffered(&mut self) -> Option<(Vec<Bytes>, Option<HeaderMap>)> {
        match std::mem::replace(&mut self.state, SendState::Closed) {
            SendState::Buffering { body, trailers, .. } => Some((body, trailers)),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Binds this message to a live `h2` stream, flushing anything buffered
    /// before the connection was ready. Called by `ServerCore`/`ClientAgent`
    /// once the header block has actually gone out over the wire.
    pub(crate) fn attach(&mut self, mut send: h2::SendStream<Bytes>) -> Result<()> {
        self.headers_sent = true;
        let (body, end, trailers) = match std::mem::replace(
            &mut self.state,
            SendState::Closed,
        ) {
            SendState::Buffering { body, end, trailers } => (body, end, trailers),
            other => {
                self.state = other;
                return Ok(());
            }
        };

        for chunk in body {
            send.send_data(chunk, false).map_err(Error::new_h2)?;
        }

        if end {
            Self::flush_end(send, trailers)?;
        } else {
            self.state = SendState::Open(send);
        }

        Ok(())
    }
}

/// An outbound request (spec.md §4.3). Pseudo-headers live as plain fields
/// rather than inside the `HeaderMap`, matching how `h2`/`http` keep them
/// off to the side in `Request::parts`.
pub struct OutgoingRequest {
    message: OutgoingMessage,
    method: Method,
    uri: Uri,
    priority: Option<Priority>,
}

impl OutgoingRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        OutgoingRequest {
            message: OutgoingMessage::new(),
            method,
            uri,
            priority: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn message(&self) -> &OutgoingMessage {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut OutgoingMessage {
        &mut self.message
    }

    /// Records a PRIORITY hint for this stream. Like
    /// [`super::IncomingPromise::set_priority`], this is bookkeeping only:
    /// `h2` has no public API to send a PRIORITY frame, on an open stream or
    /// otherwise, so there is nothing this crate can put on the wire for it.
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = Some(priority);
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// Sets `authorization: Basic <base64(user:password)>` (spec.md §4.5,
    /// `OutgoingRequest._start`'s `options.auth` handling).
    pub fn basic_auth(&mut self, user: &str, password: &str) -> Result<()> {
        use base64::Engine;
        let credentials = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        let value = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| Error::new_user_invalid_credentials().with(e))?;
        self.message.headers.insert(http::header::AUTHORIZATION, value);
        Ok(())
    }

    /// Builds the `http::Request` `h2::client::SendRequest::send_request`
    /// expects, consuming the accumulated headers.
    pub(crate) fn build_h2_request(&self) -> Result<http::Request<()>> {
        let mut builder = http::Request::builder().method(self.method.clone()).uri(self.uri.clone());
        if let Some(headers) = builder.headers_mut() {
            *headers = self.message.headers.clone();
        }
        builder.body(()).map_err(|e| Error::new_protocol(h2::Reason::PROTOCOL_ERROR).with(e))
    }

    pub(crate) fn attach(&mut self, send: h2::SendStream<Bytes>) -> Result<()> {
        self.message.attach(send)
    }
}

/// An outbound response (spec.md §4.3).
pub struct OutgoingResponse {
    message: OutgoingMessage,
    status: StatusCode,
    priority: Option<Priority>,
    altsvc: Option<(String, String)>,
    send_date: bool,
}

impl OutgoingResponse {
    pub fn new(status: StatusCode) -> Self {
        OutgoingResponse {
            message: OutgoingMessage::new(),
            status,
            priority: None,
            altsvc: None,
            send_date: true,
        }
    }

    /// Whether a `date` header is injected automatically when this response
    /// is sent (spec.md §3, `OutgoingResponse.sendDate`, default `true`).
    /// Has no effect once the caller has already set `date` themselves.
    pub fn set_send_date(&mut self, send_date: bool) {
        self.send_date = send_date;
    }

    pub fn send_date(&self) -> bool {
        self.send_date
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<()> {
        if self.message.headers_sent {
            return Err(Error::new_user_headers_sent());
        }
        self.status = status;
        Ok(())
    }

    pub fn message(&self) -> &OutgoingMessage {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut OutgoingMessage {
        &mut self.message
    }

    /// Records a PRIORITY hint for this stream (see
    /// [`OutgoingRequest::set_priority`] for why it's bookkeeping only).
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = Some(priority);
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// Records an `origin`/`Alt-Svc` value pair for this stream.
    ///
    /// RFC 7838's ALTSVC frame isn't part of core HTTP/2 and `h2` exposes no
    /// public API to emit one, so like [`OutgoingResponse::set_priority`]
    /// this only records what the caller asked for — readable back via
    /// [`OutgoingResponse::altsvc`] — rather than putting anything on the
    /// wire. A full implementation would need either an `h2` patch or a
    /// raw-frame escape hatch this crate doesn't have.
    pub fn send_altsvc(&mut self, origin: impl Into<String>, value: impl Into<String>) -> Result<()> {
        if self.message.headers_sent {
            return Err(Error::new_user_headers_sent());
        }
        self.altsvc = Some((origin.into(), value.into()));
        Ok(())
    }

    pub fn altsvc(&self) -> Option<(&str, &str)> {
        self.altsvc.as_ref().map(|(o, v)| (o.as_str(), v.as_str()))
    }

    pub(crate) fn build_h2_response(&self) -> Result<http::Response<()>> {
        let mut headers = self.message.headers.clone();
        if self.send_date && !headers.contains_key(http::header::DATE) {
            if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(std::time::SystemTime::now())) {
                headers.insert(http::header::DATE, value);
            }
        }

        let mut builder = http::Response::builder().status(self.status);
        if let Some(h) = builder.headers_mut() {
            *h = headers;
        }
        builder.body(()).map_err(|e| Error::new_protocol(h2::Reason::PROTOCOL_ERROR).with(e))
    }

    pub(crate) fn attach(&mut self, send: h2::SendStream<Bytes>) -> Result<()> {
        self.message.attach(send)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_forbidden_outbound_header() {
        let mut msg = OutgoingMessage::new();
        let err = msg
            .set_header(HeaderName::from_static("transfer-encoding"), HeaderValue::from_static("chunked"))
            .unwrap_err();
        assert!(err.is_user());
    }

    #[test]
    fn rejects_host_outbound() {
        let mut msg = OutgoingMessage::new();
        let err = msg
            .set_header(HeaderName::from_static("host"), HeaderValue::from_static("example.com"))
            .unwrap_err();
        assert!(err.is_user());
    }

    #[test]
    fn write_after_end_fails() {
        let mut msg = OutgoingMessage::new();
        msg.end(None).unwrap();
        assert!(msg.write(Bytes::from_static(b"late")).is_err());
    }

    #[test]
    fn take_buffered_returns_queued_body() {
        let mut msg = OutgoingMessage::new();
        msg.write(Bytes::from_static(b"a")).unwrap();
        msg.write(Bytes::from_static(b"b")).unwrap();
        msg.end(None).unwrap();

        let (chunks, trailers) = msg.take_buffered().expect("still buffering, never attached");
        assert_eq!(chunks, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        assert!(trailers.is_none());
    }
}

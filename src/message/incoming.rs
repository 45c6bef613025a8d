use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use http_body::Body;

use crate::common::ready;
use crate::error::{Error, Result};
use crate::header;

/// A readable, already-validated HTTP/2 message body (spec.md §4.2).
///
/// Constructing one runs `HeaderValidator` over the header block; a
/// violation is reported as an error the caller resets the stream with,
/// before any handler ever sees the message. The optional single trailer
/// block becomes visible through [`IncomingMessage::trailers`] once the
/// body has been fully read — `h2` only ever delivers one, so there is
/// nothing further to cap here.
pub struct IncomingMessage {
    headers: HeaderMap,
    recv: h2::RecvStream,
    data_done: bool,
    trailers: Option<HeaderMap>,
}

impl IncomingMessage {
    pub(crate) fn new(headers: HeaderMap, recv: h2::RecvStream) -> Result<Self> {
        header::validate_inbound(&headers).map_err(|_| Error::new_protocol(h2::Reason::PROTOCOL_ERROR))?;
        Ok(IncomingMessage {
            headers,
            recv,
            data_done: false,
            trailers: None,
        })
    }

    /// The (already-validated) regular header block, pseudo-headers excluded.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// `Some` once the body has been fully drained and the peer sent a
    /// trailer block; stays `None` for a body with no trailers.
    pub fn trailers(&self) -> Option<&HeaderMap> {
        self.trailers.as_ref()
    }
}

impl Body for IncomingMessage {
    type Data = Bytes;
    type Error = Error;

    fn poll_data(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes>>> {
        if self.data_done {
            return Poll::Ready(None);
        }
        match ready!(self.recv.poll_data(cx)) {
            Some(Ok(bytes)) => {
                let len = bytes.len();
                let _ = self.recv.flow_control().release_capacity(len);
                Poll::Ready(Some(Ok(bytes)))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(Error::new_h2(e)))),
            None => {
                self.data_done = true;
                Poll::Ready(None)
            }
        }
    }

    fn poll_trailers(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Option<HeaderMap>>> {
        match ready!(self.recv.poll_trailers(cx)) {
            Ok(map) => {
                self.trailers = map.clone();
                Poll::Ready(Ok(map))
            }
            Err(e) => Poll::Ready(Err(Error::new_h2(e))),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.recv.is_end_stream()
    }
}

/// An inbound request (spec.md §4.2). The pseudo-headers (`:method`,
/// `:scheme`, `:authority`, `:path`) are already split out of the header
/// block by the `h2`/`http` crates before we ever see a `Request` — they
/// cannot construct one missing a valid method or URI — so unlike the
/// original design's `_checkSpecialHeader`, there is nothing left for this
/// layer to re-derive. `:authority` is additionally mirrored into a `host`
/// regular header for callers that still read it that way.
pub struct IncomingRequest {
    message: IncomingMessage,
    method: Method,
    scheme: String,
    host: String,
    url: String,
}

impl IncomingRequest {
    pub(crate) fn from_h2(req: http::Request<h2::RecvStream>) -> Result<Self> {
        let (parts, recv) = req.into_parts();
        let mut headers = parts.headers;

        // `:scheme` and `:authority` are mandatory, non-empty pseudo-headers
        // (spec.md §3). `h2`'s own frame layer already rejects a missing or
        // empty `:scheme` before a `Request` is ever built, but `:authority`
        // is carried as `Option<String>` all the way through (see
        // `frame::Pseudo` upstream) and can legitimately reach here unset —
        // default instead of reset would violate the mandatory-field
        // invariant, so this resets the stream with `PROTOCOL_ERROR` rather
        // than substituting a placeholder.
        let scheme = parts
            .uri
            .scheme_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::new_protocol(h2::Reason::PROTOCOL_ERROR))?
            .to_owned();
        let host = parts
            .uri
            .authority()
            .map(|a| a.as_str().to_owned())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::new_protocol(h2::Reason::PROTOCOL_ERROR))?;
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".to_owned());

        if let Ok(value) = HeaderValue::from_str(&host) {
            headers.insert(http::header::HOST, value);
        }

        let message = IncomingMessage::new(headers, recv)?;

        Ok(IncomingRequest {
            message,
            method: parts.method,
            scheme,
            host,
            url,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn message(&self) -> &IncomingMessage {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut IncomingMessage {
        &mut self.message
    }

    pub fn into_message(self) -> IncomingMessage {
        self.message
    }
}

impl Body for IncomingRequest {
    type Data = Bytes;
    type Error = Error;

    fn poll_data(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes>>> {
        Pin::new(&mut self.get_mut().message).poll_data(cx)
    }

    fn poll_trailers(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Option<HeaderMap>>> {
        Pin::new(&mut self.get_mut().message).poll_trailers(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.message.is_end_stream()
    }
}

/// An inbound response (spec.md §4.2).
pub struct IncomingResponse {
    message: IncomingMessage,
    status: StatusCode,
}

impl IncomingResponse {
    pub(crate) fn from_h2(resp: http::Response<h2::RecvStream>) -> Result<Self> {
        let (parts, recv) = resp.into_parts();
        let message = IncomingMessage::new(parts.headers, recv)?;
        Ok(IncomingResponse {
            message,
            status: parts.status,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &IncomingMessage {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut IncomingMessage {
        &mut self.message
    }

    pub fn into_message(self) -> IncomingMessage {
        self.message
    }
}

impl Body for IncomingResponse {
    type Data = Bytes;
    type Error = Error;

    fn poll_data(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes>>> {
        Pin::new(&mut self.get_mut().message).poll_data(cx)
    }

    fn poll_trailers(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Option<HeaderMap>>> {
        Pin::new(&mut self.get_mut().message).poll_trailers(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.message.is_end_stream()
    }
}

/// A local record of a caller's PRIORITY hint on a promised/pushed stream.
///
/// `h2` does not expose a public API to send a PRIORITY frame for an
/// already-open stream, so this is bookkeeping only — recorded for callers
/// that want to read back what they asked for, not wired onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub exclusive: bool,
    pub weight: u8,
}

/// A server push promise (spec.md §4.2, §6 "Server push reception").
///
/// Carries the promised request's pseudo-headers and regular headers, plus
/// the not-yet-arrived response. Dropping an unresolved [`IncomingPromise`]
/// (via [`IncomingPromise::cancel`] or simply letting it go out of scope)
/// causes `h2` to reset the pushed stream with `CANCEL`, since that is its
/// documented behavior for an [`h2::client::ResponseFuture`] dropped before
/// completion.
pub struct IncomingPromise {
    method: Method,
    scheme: String,
    host: String,
    url: String,
    headers: HeaderMap,
    response: h2::client::ResponseFuture,
    priority: Option<Priority>,
}

impl IncomingPromise {
    pub(crate) fn new(request: http::Request<()>, response: h2::client::ResponseFuture) -> Result<Self> {
        let (parts, ()) = request.into_parts();

        header::validate_inbound(&parts.headers)
            .map_err(|_| Error::new_protocol(h2::Reason::PROTOCOL_ERROR))?;

        // Same mandatory, non-empty `:scheme`/`:authority` invariant as
        // `IncomingRequest::from_h2` applies to a promised request.
        let scheme = parts
            .uri
            .scheme_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::new_protocol(h2::Reason::PROTOCOL_ERROR))?
            .to_owned();
        let host = parts
            .uri
            .authority()
            .map(|a| a.as_str().to_owned())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::new_protocol(h2::Reason::PROTOCOL_ERROR))?;
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".to_owned());

        Ok(IncomingPromise {
            method: parts.method,
            scheme,
            host,
            url,
            headers: parts.headers,
            response,
            priority: None,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = Some(priority);
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// Waits for the pushed response to arrive.
    pub async fn response(self) -> Result<IncomingResponse> {
        let resp = self.response.await.map_err(Error::new_h2)?;
        IncomingResponse::from_h2(resp)
    }

    /// Declines the pushed resource.
    pub fn cancel(self) {
        drop(self.response);
    }
}

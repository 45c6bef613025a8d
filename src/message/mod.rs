//! Message-level wrappers around `h2` streams (spec.md §4.2, §4.3).
//!
//! `IncomingMessage` and `OutgoingMessage` are the two halves of the bridge:
//! one turns a `RecvStream` plus its header block into something a handler
//! reads like a body, the other turns handler writes into `SendStream`
//! frames. `ServerCore` and `ClientAgent` build the four concrete kinds
//! (`IncomingRequest`, `IncomingResponse`, `OutgoingRequest`,
//! `OutgoingResponse`) plus `IncomingPromise` on top of these two cores.

mod incoming;
mod outgoing;

pub use self::incoming::{IncomingMessage, IncomingPromise, IncomingRequest, IncomingResponse, Priority};
pub use self::outgoing::{OutgoingMessage, OutgoingRequest, OutgoingResponse};

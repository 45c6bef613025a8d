//! Internal helpers shared across the proto, message, client and server
//! modules. Nothing here is part of the public API.

macro_rules! ready {
    ($e:expr) => {
        match $e {
            std::task::Poll::Ready(v) => v,
            std::task::Poll::Pending => return std::task::Poll::Pending,
        }
    };
}
pub(crate) use ready;

pub(crate) mod exec;

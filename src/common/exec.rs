use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::rt::Executor;

pub(crate) type BoxSendFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Runs background tasks spawned by a connection (the body-pump task on the
/// client side, the per-stream service task on the server side). Defaults to
/// `tokio::spawn`; `with_executor` on `ServerCore`/`RawServerCore`/
/// `ClientAgent` installs a caller-supplied [`Executor`] instead.
#[derive(Clone)]
pub(crate) enum Exec {
    Tokio,
    Executor(Arc<dyn Executor<BoxSendFuture> + Send + Sync>),
}

impl Exec {
    pub(crate) fn execute<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match *self {
            Exec::Tokio => {
                tokio::spawn(fut);
            }
            Exec::Executor(ref e) => {
                e.execute(Box::pin(fut));
            }
        }
    }
}

impl Default for Exec {
    fn default() -> Exec {
        Exec::Tokio
    }
}

impl fmt::Debug for Exec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exec").finish()
    }
}

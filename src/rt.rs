//! Runtime components.
//!
//! `h2bridge` spawns background connection-driving tasks (the body pump on
//! the client side, the per-stream service task on the server side) with
//! `tokio::spawn` by default. Implement [`Executor`] for your own type and
//! hand it to `with_executor` on [`crate::server::ServerCore`],
//! [`crate::server::raw::RawServerCore`], or [`crate::client::ClientAgent`]
//! to run them elsewhere instead.

/// An executor of futures.
///
/// This trait lets `h2bridge` abstract over async runtimes.
///
/// ```ignore
/// use h2bridge::rt::Executor;
///
/// #[derive(Clone)]
/// struct MyExecutor;
///
/// impl<F> Executor<F> for MyExecutor
/// where
///     F: std::future::Future + Send + 'static,
///     F::Output: Send + 'static,
/// {
///     fn execute(&self, fut: F) {
///         tokio::spawn(fut);
///     }
/// }
/// ```
pub trait Executor<Fut> {
    /// Places the future into the executor to run.
    fn execute(&self, fut: Fut);
}

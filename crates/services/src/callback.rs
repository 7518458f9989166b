//! Result/error handler pairs and delivery that respects a caller going away.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::debug;

type Handler<A> = Box<dyn FnOnce(A) + Send>;

/// A success handler and a failure handler; consuming the callback runs exactly one.
pub struct Callback<T, E> {
    on_result: Handler<T>,
    on_error: Handler<E>,
}

impl<T, E> Callback<T, E> {
    pub fn new(
        on_result: impl FnOnce(T) + Send + 'static,
        on_error: impl FnOnce(E) + Send + 'static,
    ) -> Self {
        Self {
            on_result: Box::new(on_result),
            on_error: Box::new(on_error),
        }
    }

    pub fn complete(self, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => (self.on_result)(value),
            Err(err) => (self.on_error)(err),
        }
    }
}

/// Lifetime of a caller such as a screen. Dropping or closing it makes every
/// token it handed out stale.
#[derive(Debug)]
pub struct CallerScope {
    live: Arc<AtomicBool>,
}

impl CallerScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn token(&self) -> CallerToken {
        CallerToken {
            live: Arc::clone(&self.live),
        }
    }

    pub fn close(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl Default for CallerScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CallerScope {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, Clone)]
pub struct CallerToken {
    live: Arc<AtomicBool>,
}

impl CallerToken {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// Run `operation` on the Tokio runtime and hand its outcome to `callback`.
///
/// If the caller's scope has closed by the time the operation finishes, the
/// outcome is dropped and neither handler runs.
pub fn dispatch<T, E, F>(token: CallerToken, operation: F, callback: Callback<T, E>) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    tokio::spawn(async move {
        let outcome = operation.await;
        if token.is_live() {
            callback.complete(outcome);
        } else {
            debug!(ok = outcome.is_ok(), "caller gone; dropping result");
        }
    })
}

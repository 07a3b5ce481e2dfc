//! The asynchronous result primitive every exchange is built from.
//!
//! An [AsyncResult] is a single-assignment cell: it starts out pending and
//! transitions exactly once to either a value or a failure. Exactly one
//! [Completer] can drive that transition; any number of consumers may
//! observe it, either by registering a completion listener, by composing
//! further results with [AsyncResult::map] and friends, by `.await`ing it
//! from async code, or by blocking on [AsyncResult::await_value].

use crate::outcome::{catch, panic_error};
use crate::*;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

mod join;
pub use join::*;

mod race;
pub use race::*;

/// Bounds for values carried by an [AsyncResult].
///
/// The terminal state is shared by all consumers, so values must be
/// clonable and thread safe.
pub trait ResultValue: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> ResultValue for T {}

type Callback<T> = Box<dyn FnOnce(&VendResult<T>) + 'static + Send>;

struct Listeners<T> {
    callbacks: Vec<Callback<T>>,
    wakers: Vec<Waker>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            callbacks: Vec::new(),
            wakers: Vec::new(),
        }
    }
}

struct Inner<T> {
    terminal: OnceLock<VendResult<T>>,
    listeners: Mutex<Listeners<T>>,
    done: Condvar,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            terminal: OnceLock::new(),
            listeners: Mutex::new(Listeners::default()),
            done: Condvar::new(),
        }
    }

    fn complete(&self, result: VendResult<T>) -> bool {
        if self.terminal.set(result).is_err() {
            return false;
        }

        let Listeners { callbacks, wakers } = {
            let mut lock = self.listeners.lock().unwrap();
            self.done.notify_all();
            std::mem::take(&mut *lock)
        };

        for waker in wakers {
            waker.wake();
        }

        if let Some(terminal) = self.terminal.get() {
            for cb in callbacks {
                cb(terminal);
            }
        }

        true
    }

    fn on_complete(&self, cb: Callback<T>) {
        let mut lock = self.listeners.lock().unwrap();
        match self.terminal.get() {
            None => lock.callbacks.push(cb),
            Some(terminal) => {
                drop(lock);
                cb(terminal);
            }
        }
    }
}

/// The producer side of an [AsyncResult].
///
/// Dropping a completer that has not completed its result fails the result,
/// so consumers are never left waiting on a producer that went away.
pub struct Completer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> std::fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer")
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if self.inner.terminal.get().is_none() {
            self.inner.complete(Err(VendError::other(
                "result abandoned by its producer",
            )));
        }
    }
}

impl<T> Completer<T> {
    /// Complete the result with a value.
    /// Returns false if the result had already reached its terminal state.
    pub fn set(&self, value: T) -> bool {
        self.inner.complete(Ok(value))
    }

    /// Complete the result with a failure.
    /// Returns false if the result had already reached its terminal state.
    pub fn set_failure(&self, err: VendError) -> bool {
        self.inner.complete(Err(err))
    }

    /// Complete the result with an outcome.
    /// Returns false if the result had already reached its terminal state.
    pub fn complete(&self, result: VendResult<T>) -> bool {
        self.inner.complete(result)
    }

    /// True until the result reaches its terminal state, including by
    /// being cancelled by a consumer.
    pub fn is_pending(&self) -> bool {
        self.inner.terminal.get().is_none()
    }
}

/// A value that will exist later, or a failure.
pub struct AsyncResult<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AsyncResult<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.terminal.get() {
            None => f.write_str("AsyncResult(pending)"),
            Some(Ok(v)) => f.debug_tuple("AsyncResult").field(v).finish(),
            Some(Err(e)) => f.debug_tuple("AsyncResult").field(e).finish(),
        }
    }
}

impl<T: ResultValue> std::future::Future for AsyncResult<T> {
    type Output = VendResult<T>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        if let Some(terminal) = self.inner.terminal.get() {
            return Poll::Ready(terminal.clone());
        }

        let mut lock = self.inner.listeners.lock().unwrap();

        // completion may have raced with taking the lock
        if let Some(terminal) = self.inner.terminal.get() {
            return Poll::Ready(terminal.clone());
        }

        if !lock.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            lock.wakers.push(cx.waker().clone());
        }

        Poll::Pending
    }
}

impl<T: ResultValue> AsyncResult<T> {
    /// Create a pending result along with the completer that drives it.
    pub fn create() -> (Completer<T>, Self) {
        let inner = Arc::new(Inner::new());
        (
            Completer {
                inner: inner.clone(),
            },
            Self { inner },
        )
    }

    /// A result that already holds the given outcome.
    pub fn from_result(result: VendResult<T>) -> Self {
        let inner = Inner::new();
        let _ = inner.terminal.set(result);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// A result that already holds a value.
    pub fn immediate(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    /// A result that already holds a failure.
    pub fn failed(err: VendError) -> Self {
        Self::from_result(Err(err))
    }

    /// Run a future on the current tokio runtime, exposing its output as a
    /// result. Cancelling the result aborts the task. A panic inside the
    /// future fails the result, as does calling this outside a runtime.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = VendResult<T>> + 'static + Send,
    {
        let (completer, out) = Self::create();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                completer.set_failure(VendError::other_src(
                    "no tokio runtime to spawn on",
                    err,
                ));
                return out;
            }
        };

        let task = handle.spawn(async move {
            use futures::FutureExt;
            let result = match std::panic::AssertUnwindSafe(fut)
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => Err(panic_error(payload)),
            };
            completer.complete(result);
        });

        let abort = task.abort_handle();
        out.on_complete(move |r| {
            if matches!(r, Err(VendError::Cancelled)) {
                abort.abort();
            }
        });

        out
    }

    /// Register a listener invoked with the terminal state.
    ///
    /// The listener runs on whichever thread completes the result, or
    /// immediately on the calling thread if the result is already done.
    pub fn on_complete(
        &self,
        cb: impl FnOnce(&VendResult<T>) + 'static + Send,
    ) {
        self.inner.on_complete(Box::new(cb));
    }

    /// Cancel the result. Returns false if it was already terminal.
    pub fn cancel(&self) -> bool {
        self.inner.complete(Err(VendError::Cancelled))
    }

    /// True if the result was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.terminal.get(), Some(Err(VendError::Cancelled)))
    }

    /// True once the result reached its terminal state.
    pub fn is_done(&self) -> bool {
        self.inner.terminal.get().is_some()
    }

    /// The terminal state, if reached.
    pub fn try_get(&self) -> Option<VendResult<T>> {
        self.inner.terminal.get().cloned()
    }

    /// Cancel `upstream` whenever this result gets cancelled.
    pub fn propagate_cancel_to<U: ResultValue>(&self, upstream: &AsyncResult<U>) {
        let upstream = upstream.clone();
        self.on_complete(move |r| {
            if matches!(r, Err(VendError::Cancelled)) {
                upstream.cancel();
            }
        });
    }

    /// Transform the value. Failures propagate untransformed, a panic in
    /// `f` fails the derived result.
    ///
    /// None of the derived-result combinators invoke their callback once
    /// the derived result has been cancelled.
    pub fn map<U, F>(&self, f: F) -> AsyncResult<U>
    where
        U: ResultValue,
        F: FnOnce(T) -> U + 'static + Send,
    {
        self.try_map(move |v| Ok(f(v)))
    }

    /// Transform the value with a fallible function.
    pub fn try_map<U, F>(&self, f: F) -> AsyncResult<U>
    where
        U: ResultValue,
        F: FnOnce(T) -> VendResult<U> + 'static + Send,
    {
        let (completer, out) = AsyncResult::create();
        self.on_complete(move |r| {
            if !completer.is_pending() {
                return;
            }
            let r = match r {
                Ok(v) => {
                    let v = v.clone();
                    catch(move || f(v))
                }
                Err(e) => Err(e.clone()),
            };
            completer.complete(r);
        });
        out
    }

    /// Fold both outcomes into a value of the derived result.
    pub fn match_with<U, V, E>(&self, on_value: V, on_error: E) -> AsyncResult<U>
    where
        U: ResultValue,
        V: FnOnce(T) -> U + 'static + Send,
        E: FnOnce(VendError) -> U + 'static + Send,
    {
        let (completer, out) = AsyncResult::create();
        self.on_complete(move |r| {
            if !completer.is_pending() {
                return;
            }
            let r = r.clone();
            completer.complete(catch(move || match r {
                Ok(v) => Ok(on_value(v)),
                Err(e) => Ok(on_error(e)),
            }));
        });
        out
    }

    /// Chain an asynchronous computation. A failure short-circuits without
    /// invoking `f`. Cancelling the derived result cancels the result
    /// returned by `f`.
    pub fn flat_map<U, F>(&self, f: F) -> AsyncResult<U>
    where
        U: ResultValue,
        F: FnOnce(T) -> AsyncResult<U> + 'static + Send,
    {
        let (completer, out) = AsyncResult::create();
        self.on_complete(move |r| match r {
            _ if !completer.is_pending() => (),
            Ok(v) => {
                let v = v.clone();
                match catch(move || Ok(f(v))) {
                    Ok(next) => forward(next, completer),
                    Err(e) => {
                        completer.set_failure(e);
                    }
                }
            }
            Err(e) => {
                completer.set_failure(e.clone());
            }
        });
        out
    }

    /// Replace a failure with the result of `f`. Cancellations are not
    /// recovered.
    pub fn recover_with<F>(&self, f: F) -> AsyncResult<T>
    where
        F: FnOnce(VendError) -> AsyncResult<T> + 'static + Send,
    {
        let (completer, out) = AsyncResult::create();
        self.on_complete(move |r| match r {
            _ if !completer.is_pending() => (),
            Ok(v) => {
                completer.set(v.clone());
            }
            Err(VendError::Cancelled) => {
                completer.set_failure(VendError::Cancelled);
            }
            Err(e) => {
                let e = e.clone();
                match catch(move || Ok(f(e))) {
                    Ok(next) => forward(next, completer),
                    Err(e) => {
                        completer.set_failure(e);
                    }
                }
            }
        });
        out
    }

    /// Fail with `on_timeout()` unless this result completes within
    /// `duration`. Whichever side loses the race is cancelled.
    pub fn with_timeout<F>(&self, duration: Duration, on_timeout: F) -> Self
    where
        F: FnOnce() -> VendError + 'static + Send,
    {
        let sleep = AsyncResult::<()>::delay(duration);
        let timer = sleep.try_map(move |()| Err(on_timeout()));
        let out = first_of(vec![self.clone(), timer]);
        let source = self.clone();
        out.on_complete(move |_| {
            sleep.cancel();
            source.cancel();
        });
        out
    }

    /// Block the calling thread until the result is terminal or `timeout`
    /// elapses. A failure is returned as the stored error itself.
    ///
    /// Never call this from an async task, `.await` the result instead.
    pub fn await_value(&self, timeout: Option<Duration>) -> VendResult<T> {
        if let Some(terminal) = self.inner.terminal.get() {
            return terminal.clone();
        }

        // a timeout past the end of the clock never elapses
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut lock = self.inner.listeners.lock().unwrap();
        loop {
            if let Some(terminal) = self.inner.terminal.get() {
                return terminal.clone();
            }
            match deadline {
                None => {
                    lock = self.inner.done.wait(lock).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(VendError::timeout("awaiting result"));
                    }
                    lock = self
                        .inner
                        .done
                        .wait_timeout(lock, deadline - now)
                        .unwrap()
                        .0;
                }
            }
        }
    }

    /// Nobody will observe this result. Log a failure instead of losing it.
    pub fn and_forget(&self) {
        self.and_forget_with(|err| {
            tracing::error!(?err, "background task failed");
        });
    }

    /// Like [AsyncResult::and_forget] with a custom failure handler.
    /// Cancellations are not reported.
    pub fn and_forget_with(
        &self,
        on_error: impl FnOnce(&VendError) + 'static + Send,
    ) {
        self.on_complete(move |r| {
            if let Err(err) = r {
                if !err.is_cancelled() {
                    on_error(err);
                }
            }
        });
    }
}

impl AsyncResult<()> {
    /// A result that completes after `duration`.
    pub fn delay(duration: Duration) -> Self {
        Self::spawn(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }
}

/// Complete `completer` with the outcome of `next`, and cancel `next` if
/// the completer's result gets cancelled first.
fn forward<U: ResultValue>(next: AsyncResult<U>, completer: Completer<U>) {
    AsyncResult {
        inner: completer.inner.clone(),
    }
    .propagate_cancel_to(&next);
    next.on_complete(move |r| {
        completer.complete(r.clone());
    });
}

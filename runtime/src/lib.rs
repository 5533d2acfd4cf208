//! # Booking Runtime
//!
//! Executes the effect descriptions produced by reducers and bounds calls to
//! collaborators with deadlines.
//!
//! The runtime never decides *whether* an effect should run. Callers hand it
//! effects only after the state change that produced them has been committed.
//! Every spawned effect is tracked so callers (tests, graceful shutdown) can
//! wait for in-flight work to finish.
//!
//! ## Example
//!
//! ```ignore
//! use booking_runtime::{EffectRunner, deadline};
//!
//! let runner = EffectRunner::<AppointmentAction>::new();
//! let mut handle = runner.run(effects);
//! handle.wait().await;
//!
//! let user = deadline(Duration::from_secs(2), identity.get_user(id)).await?;
//! ```

use booking_core::effect::Effect;
use futures::future::{BoxFuture, FutureExt, join_all};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

pub mod retry;

/// Errors raised by the [`EffectRunner`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// Draining did not finish before the timeout.
    #[error("shutdown timed out with {pending} effects still running")]
    ShutdownTimeout {
        /// Effects still in flight when the timeout expired
        pending: usize,
    },
}

/// A bounded call ran past its deadline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut` with an upper bound on how long it may take.
///
/// # Errors
///
/// Returns [`DeadlineExceeded`] if `fut` does not complete within `duration`.
/// The future is dropped in that case.
pub async fn deadline<F>(duration: Duration, fut: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| DeadlineExceeded(duration))
}

/// Handle for tracking completion of one batch of effects.
///
/// Returned by [`EffectRunner::run`]. Dropping the handle does not cancel the
/// effects.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, Tracking) {
        let tracking = Tracking::new();
        let handle = Self {
            effects: Arc::clone(&tracking.counter),
            completion: tracking.notifier.subscribe(),
        };
        (handle, tracking)
    }

    /// A handle with nothing to wait for.
    #[must_use]
    pub fn completed() -> Self {
        Self::new().0
    }

    /// Number of effects from this batch still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait until every effect in the batch has finished.
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for the batch with an upper bound.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineExceeded`] if effects are still running at `timeout`.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), DeadlineExceeded> {
        deadline(timeout, self.wait()).await
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// An in-flight counter paired with a channel that fires when it reaches zero.
#[derive(Clone)]
struct Tracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl Tracking {
    fn new() -> Self {
        let (tx, _) = watch::channel(());
        Self {
            counter: Arc::new(AtomicUsize::new(0)),
            notifier: Arc::new(tx),
        }
    }

    fn start(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notifier.send_replace(());
        }
    }
}

/// Decrements both the batch counter and the runner-wide counter on drop,
/// including when the effect panics.
struct CompletionGuard {
    batch: Tracking,
    runner: Tracking,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.runner.finish();
        self.batch.finish();
    }
}

/// Executes [`Effect`] trees on the tokio runtime.
///
/// Each top-level effect is spawned as its own task. `Parallel` children run
/// concurrently inside that task; `Sequential` children run in order. Actions
/// produced by `Future` effects are dropped.
pub struct EffectRunner<A> {
    inflight: Tracking,
    shutdown: Arc<AtomicBool>,
    _action: PhantomData<fn() -> A>,
}

impl<A> Clone for EffectRunner<A> {
    fn clone(&self) -> Self {
        Self {
            inflight: self.inflight.clone(),
            shutdown: Arc::clone(&self.shutdown),
            _action: PhantomData,
        }
    }
}

impl<A> std::fmt::Debug for EffectRunner<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRunner")
            .field("pending_effects", &self.inflight.counter.load(Ordering::SeqCst))
            .field("shutting_down", &self.shutdown.load(Ordering::SeqCst))
            .finish()
    }
}

impl<A> Default for EffectRunner<A>
where
    A: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EffectRunner<A>
where
    A: Send + 'static,
{
    /// Runner with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflight: Tracking::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            _action: PhantomData,
        }
    }

    /// Number of effects currently running across all batches.
    #[must_use]
    pub fn pending_effects(&self) -> usize {
        self.inflight.counter.load(Ordering::SeqCst)
    }

    /// Whether [`drain`](Self::drain) has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Spawn every effect in `effects` and return a handle for the batch.
    ///
    /// No-op effects are skipped. After [`drain`](Self::drain) has started the
    /// effects are dropped and a completed handle is returned.
    pub fn run<I>(&self, effects: I) -> EffectHandle
    where
        I: IntoIterator<Item = Effect<A>>,
    {
        let (handle, tracking) = EffectHandle::new();

        if self.is_shutting_down() {
            tracing::warn!("Effect runner is shutting down, dropping effects");
            metrics::counter!("effects.rejected").increment(1);
            return handle;
        }

        for effect in effects {
            if effect.is_noop() {
                continue;
            }

            tracking.start();
            self.inflight.start();
            metrics::counter!("effects.spawned").increment(1);

            let guard = CompletionGuard {
                batch: tracking.clone(),
                runner: self.inflight.clone(),
            };

            tokio::spawn(async move {
                let _guard = guard;
                execute(effect).await;
                tracing::trace!("Effect completed");
            });
        }

        handle
    }

    /// Wait until no effects are running, without refusing new ones.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::ShutdownTimeout`] if effects are still running
    /// when `timeout` expires.
    pub async fn settle(&self, timeout: Duration) -> Result<(), RunnerError> {
        let mut idle = self.inflight.notifier.subscribe();
        let settled = deadline(timeout, async {
            while self.pending_effects() > 0 {
                if idle.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;

        settled.map_err(|_| RunnerError::ShutdownTimeout {
            pending: self.pending_effects(),
        })
    }

    /// Stop accepting effects and wait for in-flight ones to finish.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::ShutdownTimeout`] if effects are still running
    /// when `timeout` expires.
    pub async fn drain(&self, timeout: Duration) -> Result<(), RunnerError> {
        tracing::info!(pending_effects = self.pending_effects(), "Draining effect runner");
        self.shutdown.store(true, Ordering::SeqCst);

        match self.settle(timeout).await {
            Ok(()) => {
                tracing::info!("Effect runner drained");
                Ok(())
            },
            Err(err) => {
                tracing::warn!(error = %err, "Effect runner drain timed out");
                metrics::counter!("effects.drain_timeout").increment(1);
                Err(err)
            },
        }
    }
}

fn execute<A>(effect: Effect<A>) -> BoxFuture<'static, ()>
where
    A: Send + 'static,
{
    async move {
        match effect {
            Effect::None => {},
            Effect::Future(fut) => {
                if fut.await.is_some() {
                    tracing::trace!("Dropping action produced by effect");
                }
            },
            Effect::Parallel(effects) => {
                join_all(effects.into_iter().map(execute)).await;
            },
            Effect::Sequential(effects) => {
                for e in effects {
                    execute(e).await;
                }
            },
        }
    }
    .boxed()
}

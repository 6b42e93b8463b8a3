//! Stage handler trait and implementations.
//!
//! A handler is the opaque unit of work bound to one stage. It receives the
//! running accumulator and the run's original seed.

use crate::core::Outcome;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;

/// Trait for stage handlers.
///
/// Handlers must be idempotent for a given `(input, seed)` pair: a crash
/// between handler completion and result persistence re-invokes the handler
/// on the next run.
#[async_trait]
pub trait StageHandler: Send + Sync + Debug {
    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `input` - The accumulator: the seed for the first stage, otherwise
    ///   the previous stage's value
    /// * `seed` - The original input of the run
    ///
    /// # Returns
    ///
    /// An outcome telling the engine whether to continue or pause, or an
    /// error that leaves the stage incomplete.
    async fn handle(&self, input: Value, seed: &Value) -> anyhow::Result<Outcome>;
}

/// A synchronous function-based handler.
pub struct FnHandler<F>
where
    F: Fn(Value, &Value) -> anyhow::Result<Outcome> + Send + Sync,
{
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Value, &Value) -> anyhow::Result<Outcome> + Send + Sync,
{
    /// Creates a new function-based handler.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnHandler<F>
where
    F: Fn(Value, &Value) -> anyhow::Result<Outcome> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> StageHandler for FnHandler<F>
where
    F: Fn(Value, &Value) -> anyhow::Result<Outcome> + Send + Sync,
{
    async fn handle(&self, input: Value, seed: &Value) -> anyhow::Result<Outcome> {
        (self.func)(input, seed)
    }
}

/// An async function-based handler.
///
/// The closure receives owned copies of the input and seed so the returned
/// future can be `'static`.
pub struct AsyncFnHandler<F, Fut>
where
    F: Fn(Value, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnHandler<F, Fut>
where
    F: Fn(Value, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    /// Creates a new async function-based handler.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnHandler<F, Fut>
where
    F: Fn(Value, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> StageHandler for AsyncFnHandler<F, Fut>
where
    F: Fn(Value, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    async fn handle(&self, input: Value, seed: &Value) -> anyhow::Result<Outcome> {
        (self.func)(input, seed.clone()).await
    }
}

/// A handler that passes its input through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughHandler;

#[async_trait]
impl StageHandler for PassThroughHandler {
    async fn handle(&self, input: Value, _seed: &Value) -> anyhow::Result<Outcome> {
        Ok(Outcome::Continue(input))
    }
}

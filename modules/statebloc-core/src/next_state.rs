//! Normalization of mapping results into a single future state.

use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};

use crate::error::{BlocError, BlocResult};

/// What a mapper (or a will-change hook) hands back.
pub enum NextState<S> {
    /// A ready state.
    Value(S),
    /// No change: resolves to the reference state.
    Unchanged,
    /// A state that becomes available later.
    Future(BoxFuture<'static, BlocResult<S>>),
    /// Only the first emission is used; the stream is dropped afterwards.
    Stream(BoxStream<'static, BlocResult<S>>),
    /// The transition failed before producing anything.
    Error(BlocError),
}

impl<S> NextState<S> {
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = BlocResult<S>> + Send + 'static,
    {
        NextState::Future(future.boxed())
    }

    /// Like [`NextState::future`] for futures failing with `anyhow::Error`.
    pub fn try_future<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<S>> + Send + 'static,
    {
        NextState::Future(future.map(|r| r.map_err(BlocError::from)).boxed())
    }

    pub fn stream<St>(stream: St) -> Self
    where
        St: Stream<Item = BlocResult<S>> + Send + 'static,
    {
        NextState::Stream(stream.boxed())
    }

    pub fn from_result<E: Into<BlocError>>(result: Result<S, E>) -> Self {
        match result {
            Ok(state) => NextState::Value(state),
            Err(e) => NextState::Error(e.into()),
        }
    }
}

impl<S: Clone> NextState<S> {
    /// Collapse into one state. `Unchanged` and an empty stream resolve to
    /// `reference`.
    pub async fn resolve(self, reference: &S) -> BlocResult<S> {
        match self {
            NextState::Value(state) => Ok(state),
            NextState::Unchanged => Ok(reference.clone()),
            NextState::Future(future) => future.await,
            NextState::Stream(mut stream) => match stream.next().await {
                Some(first) => first,
                None => Ok(reference.clone()),
            },
            NextState::Error(e) => Err(e),
        }
    }
}

impl<S> From<Option<S>> for NextState<S> {
    fn from(value: Option<S>) -> Self {
        match value {
            Some(state) => NextState::Value(state),
            None => NextState::Unchanged,
        }
    }
}

impl<S> std::fmt::Debug for NextState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NextState::Value(_) => f.write_str("NextState::Value"),
            NextState::Unchanged => f.write_str("NextState::Unchanged"),
            NextState::Future(_) => f.write_str("NextState::Future"),
            NextState::Stream(_) => f.write_str("NextState::Stream"),
            NextState::Error(e) => write!(f, "NextState::Error({e})"),
        }
    }
}

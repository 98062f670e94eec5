//! The state container: one current state, a replay-one stream, and the
//! guarded commit path every transition goes through.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::{FutureExt, StreamExt};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::builder::StateBuilder;
use crate::config::PipelineConfig;
use crate::delegate::{CompletedTransition, StateDelegate, StateTransition};
use crate::error::{guarded, BlocError, BlocResult};
use crate::event::{BlocEvent, UpdateStrategy};
use crate::topic::{receiver_stream, Subscription, Topic};
use crate::traits::BlocState;

/// Construction options shared by containers and pipelines.
///
/// At least one of `initial_state` and `state_builder` is required. When
/// both are given the initial state wins at construction and the builder
/// serves `reset()`. `P` is the payload type of the driving events.
#[derive(TypedBuilder)]
pub struct BlocOptions<S, P = ()> {
    #[builder(default, setter(strip_option))]
    pub initial_state: Option<S>,
    #[builder(default, setter(strip_option))]
    pub state_builder: Option<StateBuilder<S>>,
    #[builder(default)]
    pub config: PipelineConfig,
    #[builder(default)]
    pub delegate: StateDelegate<S, P>,
}

impl<S, P> BlocOptions<S, P> {
    pub fn with_initial_state(state: S) -> Self {
        Self::builder().initial_state(state).build()
    }

    pub fn with_state_builder(builder: StateBuilder<S>) -> Self {
        Self::builder().state_builder(builder).build()
    }
}

/// Holds exactly one current state. Cheap to clone; clones share the state.
///
/// `P` is the payload type of the events that drive the container when it
/// sits behind an event pipeline. Transition records carry those events.
pub struct StateContainer<S, P = ()> {
    inner: Arc<ContainerInner<S, P>>,
}

struct ContainerInner<S, P> {
    config: PipelineConfig,
    state: RwLock<S>,
    /// Held from reading the current state until the commit is emitted.
    commit: tokio::sync::Mutex<()>,
    states: Topic<S>,
    errors: Topic<BlocError>,
    builder: StateBuilder<S>,
    delegate: RwLock<Arc<StateDelegate<S, P>>>,
    disposed: AtomicBool,
}

impl<S, P> Clone for StateContainer<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: BlocState> StateContainer<S> {
    pub fn new(options: BlocOptions<S>) -> BlocResult<Self> {
        Self::from_options(options)
    }
}

impl<S, P> StateContainer<S, P>
where
    S: BlocState,
    P: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_options(options: BlocOptions<S, P>) -> BlocResult<Self> {
        let BlocOptions {
            initial_state,
            state_builder,
            config,
            delegate,
        } = options;
        config.validate()?;

        let (initial, builder) = match (initial_state, state_builder) {
            (Some(state), Some(builder)) => (state, builder),
            (Some(state), None) => (state.clone(), StateBuilder::from_value(state)),
            (None, Some(builder)) => (builder.build(), builder),
            (None, None) => return Err(BlocError::MissingDefaultState),
        };

        Ok(Self {
            inner: Arc::new(ContainerInner {
                states: Topic::new(config.channel_capacity),
                errors: Topic::new(config.channel_capacity),
                config,
                state: RwLock::new(initial),
                commit: tokio::sync::Mutex::new(()),
                builder,
                delegate: RwLock::new(Arc::new(delegate)),
                disposed: AtomicBool::new(false),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// The last committed state.
    pub fn current_state(&self) -> S {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current state first, then every committed state. Ends on dispose.
    pub fn stream(&self) -> Subscription<S> {
        // Snapshot and subscribe under the read lock so no commit can land
        // between the two.
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        match self.inner.states.receiver() {
            Some(rx) => {
                let current = state.clone();
                drop(state);
                Box::pin(futures::stream::once(async move { current }).chain(receiver_stream(rx)))
            }
            None => Box::pin(futures::stream::empty()),
        }
    }

    /// Every error routed to the error handler from now on.
    pub fn errors(&self) -> Subscription<BlocError> {
        self.inner.errors.subscribe()
    }

    /// Replace the state wholesale through the commit path.
    pub async fn set_state(&self, candidate: S) {
        self.apply(candidate, UpdateStrategy::Replace, None).await;
    }

    /// Shallow-merge `partial` onto the current state, then commit.
    pub async fn patch_state(&self, partial: S) {
        self.apply(partial, UpdateStrategy::Merge, None).await;
    }

    /// Commit a fresh default from the state builder. Hooks fire as usual.
    pub async fn reset(&self) {
        let default = self.inner.builder.build();
        self.apply(default, UpdateStrategy::Replace, None).await;
    }

    /// Terminal. Closes every stream; later commits are discarded.
    pub fn dispose(&self) {
        {
            let _state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            if self.inner.disposed.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        self.inner.states.close();
        self.inner.errors.close();
        info!(bloc = %self.name(), "Disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn set_delegate(&self, delegate: StateDelegate<S, P>) {
        *self
            .inner
            .delegate
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(delegate);
    }

    fn delegate(&self) -> Arc<StateDelegate<S, P>> {
        self.inner
            .delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve `next` against the current state with `strategy`, run the
    /// will-change hook, commit, then run the did-change hook.
    ///
    /// Returns the committed state, or `None` when the transition failed
    /// (already routed to the error handler) or the container is disposed.
    /// A panicking hook is reported like a failing one.
    pub(crate) async fn apply(
        &self,
        next: S,
        strategy: UpdateStrategy,
        event: Option<&BlocEvent<P>>,
    ) -> Option<S> {
        let commit = self.inner.commit.lock().await;
        if self.is_disposed() {
            debug!(bloc = %self.name(), "Discarding state produced after dispose");
            return None;
        }

        let previous = self.current_state();
        let candidate = match strategy {
            UpdateStrategy::Merge => previous.merge(next),
            UpdateStrategy::Replace => next,
        };

        let delegate = self.delegate();
        let resolved = match &delegate.state_will_change {
            Some(hook) => {
                let transition = StateTransition {
                    current_state: previous.clone(),
                    next_state: candidate.clone(),
                    event: event.cloned(),
                };
                AssertUnwindSafe(async { hook(self, &transition).resolve(&candidate).await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(BlocError::from_panic(panic)))
                    .map_err(|e| BlocError::hook("state_will_change", e))
            }
            None => Ok(candidate),
        };

        let committed = match resolved {
            Ok(state) => state,
            Err(e) => {
                drop(commit);
                self.handle_error(e);
                return None;
            }
        };

        if !self.store(committed.clone()) {
            debug!(bloc = %self.name(), "Discarding state produced after dispose");
            return None;
        }
        drop(commit);
        let event_type = event.map(|e| e.event_type.as_str());
        debug!(bloc = %self.name(), event_type = ?event_type, "State committed");

        if let Some(hook) = &delegate.state_did_change {
            let transition = CompletedTransition {
                current_state: committed.clone(),
                previous_state: previous,
                event: event.cloned(),
            };
            if let Err(e) = guarded(|| hook(self, &transition)) {
                self.handle_error(BlocError::hook("state_did_change", e));
            }
        }

        Some(committed)
    }

    fn store(&self, next: S) -> bool {
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        if self.is_disposed() {
            return false;
        }
        *state = next.clone();
        self.inner.states.publish(next);
        true
    }

    /// The single error path: log, broadcast, then notify the delegate.
    /// State is never touched.
    pub(crate) fn handle_error(&self, error: BlocError) {
        warn!(bloc = %self.name(), error = %error, "State transition failed");
        self.inner.errors.publish(error.clone());

        let delegate = self.delegate();
        if let Some(hook) = &delegate.did_catch_error {
            let state = self.current_state();
            if let Err(panic) = guarded(|| hook(self, &error, &state)) {
                warn!(bloc = %self.name(), error = %panic, "Error hook panicked");
            }
        }
    }
}

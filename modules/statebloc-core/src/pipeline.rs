//! The event pipeline.
//!
//! Intake → will-process hook → map → normalize → strategy → commit →
//! did-process hook. One processor task per pipeline drains the queue and
//! runs each event to completion before taking the next. A panic in the
//! mapper or in a hook fails that event only.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::container::{BlocOptions, StateContainer};
use crate::delegate::{EventDelegate, EventHooks};
use crate::error::{guarded, BlocError, BlocResult};
use crate::event::{BlocEvent, UpdateStrategy};
use crate::topic::{Subscription, Topic};
use crate::traits::{BlocState, EventMapper};

/// Builds the event `dispatch_payload` attaches its payload to.
pub type EventFactory = Arc<dyn Fn() -> BlocEvent<()> + Send + Sync>;

/// A state container fed by dispatched events. Cheap to clone; clones
/// share the container and the queue.
pub struct EventPipeline<P, S> {
    container: StateContainer<S, P>,
    shared: Arc<PipelineShared<P, S>>,
}

struct PipelineShared<P, S> {
    /// Taken on dispose. The processor stops once every sender is gone.
    queue: Mutex<Option<mpsc::UnboundedSender<BlocEvent<P>>>>,
    event_factory: RwLock<Option<EventFactory>>,
    hooks: Arc<RwLock<Arc<EventHooks<P, S>>>>,
    events: Arc<Topic<BlocEvent<P>>>,
}

impl<P, S> Clone for EventPipeline<P, S> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<P, S> EventPipeline<P, S>
where
    P: Clone + Send + Sync + 'static,
    S: BlocState,
{
    /// Build the container and spawn the processor task on the current
    /// Tokio runtime. Fails with `BlocError::Config` outside of one.
    pub fn new<M>(mapper: M, options: BlocOptions<S, P>) -> BlocResult<Self>
    where
        M: EventMapper<P, S>,
    {
        let runtime = Handle::try_current().map_err(|e| {
            BlocError::Config(format!("event pipelines need a Tokio runtime: {e}"))
        })?;
        let container = StateContainer::from_options(options)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let hooks = Arc::new(RwLock::new(Arc::new(EventHooks::default())));
        let events = Arc::new(Topic::new(container.config().channel_capacity));

        let processor = Processor {
            container: container.clone(),
            mapper: Arc::new(mapper),
            hooks: hooks.clone(),
            events: events.clone(),
        };
        runtime.spawn(processor.run(rx));

        Ok(Self {
            container,
            shared: Arc::new(PipelineShared {
                queue: Mutex::new(Some(tx)),
                event_factory: RwLock::new(None),
                hooks,
                events,
            }),
        })
    }

    pub fn with_event_factory<F>(self, factory: F) -> Self
    where
        F: Fn() -> BlocEvent<()> + Send + Sync + 'static,
    {
        *self
            .shared
            .event_factory
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(factory));
        self
    }

    pub fn with_delegate(self, delegate: EventDelegate<P, S>) -> Self {
        self.set_delegate(delegate);
        self
    }

    /// Replace both the state hooks and the event hooks.
    pub fn set_delegate(&self, delegate: EventDelegate<P, S>) {
        let (state, hooks) = delegate.split();
        self.container.set_delegate(state);
        *self
            .shared
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(hooks);
    }

    /// Enqueue an event. Silently dropped once disposed.
    pub fn dispatch_event(&self, event: BlocEvent<P>) {
        let queue = self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
        match queue.as_ref() {
            Some(tx) if !self.container.is_disposed() => {
                if tx.send(event).is_err() {
                    debug!(bloc = %self.container.name(), "Event processor gone, dropping event");
                }
            }
            _ => {
                debug!(
                    bloc = %self.container.name(),
                    event_type = %event.event_type,
                    "Dropping event dispatched after dispose"
                );
            }
        }
    }

    /// Build an event with the configured factory and dispatch it.
    pub fn dispatch_payload(&self, payload: P) -> BlocResult<()> {
        let factory = self
            .shared
            .event_factory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(BlocError::MissingEventFactory)?;
        self.dispatch_event(factory().attach(payload));
        Ok(())
    }

    /// Events as the processor picks them up, after any delegate rewrite.
    pub fn events(&self) -> Subscription<BlocEvent<P>> {
        self.shared.events.subscribe()
    }

    /// The default strategy for events that carry none.
    pub fn update_strategy(&self) -> UpdateStrategy {
        self.container.config().effective_update_strategy()
    }

    pub fn container(&self) -> &StateContainer<S, P> {
        &self.container
    }

    pub fn current_state(&self) -> S {
        self.container.current_state()
    }

    pub fn stream(&self) -> Subscription<S> {
        self.container.stream()
    }

    pub fn errors(&self) -> Subscription<BlocError> {
        self.container.errors()
    }

    pub async fn set_state(&self, candidate: S) {
        self.container.set_state(candidate).await
    }

    pub async fn patch_state(&self, partial: S) {
        self.container.patch_state(partial).await
    }

    pub async fn reset(&self) {
        self.container.reset().await
    }

    pub fn is_disposed(&self) -> bool {
        self.container.is_disposed()
    }

    /// Terminal: stops intake, closes every stream, discards in-flight work.
    pub fn dispose(&self) {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.shared.events.close();
        self.container.dispose();
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

struct Processor<P, S> {
    container: StateContainer<S, P>,
    mapper: Arc<dyn EventMapper<P, S>>,
    hooks: Arc<RwLock<Arc<EventHooks<P, S>>>>,
    events: Arc<Topic<BlocEvent<P>>>,
}

impl<P, S> Processor<P, S>
where
    P: Clone + Send + Sync + 'static,
    S: BlocState,
{
    async fn run(self, mut rx: mpsc::UnboundedReceiver<BlocEvent<P>>) {
        while let Some(event) = rx.recv().await {
            if self.container.is_disposed() {
                break;
            }
            self.process(event).await;
        }
        debug!(bloc = %self.container.name(), "Event processor stopped");
    }

    async fn process(&self, dispatched: BlocEvent<P>) {
        let bloc = &self.container;
        let hooks = self
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let current = bloc.current_state();

        let rewrite = match &hooks.will_process_event {
            Some(hook) => guarded(|| hook(bloc, &dispatched, &current)).and_then(|r| r),
            None => Ok(None),
        };
        let event = match rewrite {
            Ok(Some(rewritten)) => rewritten,
            Ok(None) => dispatched,
            Err(e) => {
                bloc.handle_error(BlocError::hook("will_process_event", e));
                return;
            }
        };

        self.events.publish(event.clone());
        debug!(bloc = %bloc.name(), event_type = %event.event_type, "Processing event");

        let resolved = AssertUnwindSafe(async {
            self.mapper
                .map_event_to_state(bloc, &event, &current)
                .resolve(&current)
                .await
        })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(BlocError::from_panic(panic)));

        if bloc.is_disposed() {
            debug!(
                bloc = %bloc.name(),
                event_type = %event.event_type,
                "Discarding result resolved after dispose"
            );
            return;
        }

        let next = match resolved {
            Ok(state) => state,
            Err(e) => {
                bloc.handle_error(e);
                return;
            }
        };

        let strategy = event
            .update_strategy()
            .unwrap_or_else(|| bloc.config().effective_update_strategy());

        if let Some(committed) = bloc.apply(next, strategy, Some(&event)).await {
            if let Some(hook) = &hooks.did_process_event {
                if let Err(e) = guarded(|| hook(bloc, &event, &committed)) {
                    bloc.handle_error(BlocError::hook("did_process_event", e));
                }
            }
        }
    }
}

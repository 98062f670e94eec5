//! Optional lifecycle hooks.
//!
//! A delegate is a set of optional slots; the engine checks each slot for
//! presence right before invoking it. Every hook receives the owning
//! container first. Hooks run outside the state lock but inside the commit
//! path, so they must not call `set_state` on the same container.
//!
//! `P` is the payload type of the events driving the container. Plain
//! containers use the default `()`.

use std::sync::Arc;

use crate::container::StateContainer;
use crate::error::BlocError;
use crate::event::BlocEvent;
use crate::next_state::NextState;

/// Passed to `state_will_change`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition<S, P = ()> {
    pub current_state: S,
    pub next_state: S,
    /// The event driving the transition. `None` for `set_state`,
    /// `patch_state` and `reset`.
    pub event: Option<BlocEvent<P>>,
}

impl<S, P> StateTransition<S, P> {
    pub fn event_type(&self) -> Option<&str> {
        self.event.as_ref().map(|e| e.event_type.as_str())
    }
}

/// Passed to `state_did_change`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTransition<S, P = ()> {
    pub current_state: S,
    pub previous_state: S,
    pub event: Option<BlocEvent<P>>,
}

impl<S, P> CompletedTransition<S, P> {
    pub fn event_type(&self) -> Option<&str> {
        self.event.as_ref().map(|e| e.event_type.as_str())
    }
}

/// May substitute the candidate. `NextState::Unchanged` keeps it.
pub type StateWillChangeHook<S, P = ()> =
    Arc<dyn Fn(&StateContainer<S, P>, &StateTransition<S, P>) -> NextState<S> + Send + Sync>;

pub type StateDidChangeHook<S, P = ()> =
    Arc<dyn Fn(&StateContainer<S, P>, &CompletedTransition<S, P>) + Send + Sync>;

/// Receives every error together with the state left in place.
pub type DidCatchErrorHook<S, P = ()> =
    Arc<dyn Fn(&StateContainer<S, P>, &BlocError, &S) + Send + Sync>;

/// `Ok(Some(event))` replaces the dispatched event for this cycle.
pub type WillProcessEventHook<P, S> = Arc<
    dyn Fn(&StateContainer<S, P>, &BlocEvent<P>, &S) -> Result<Option<BlocEvent<P>>, BlocError>
        + Send
        + Sync,
>;

/// Called with the committed state after an event completed.
pub type DidProcessEventHook<P, S> =
    Arc<dyn Fn(&StateContainer<S, P>, &BlocEvent<P>, &S) + Send + Sync>;

/// Hooks understood by every container.
pub struct StateDelegate<S, P = ()> {
    pub(crate) state_will_change: Option<StateWillChangeHook<S, P>>,
    pub(crate) state_did_change: Option<StateDidChangeHook<S, P>>,
    pub(crate) did_catch_error: Option<DidCatchErrorHook<S, P>>,
}

impl<S, P> StateDelegate<S, P> {
    pub fn new() -> Self {
        Self {
            state_will_change: None,
            state_did_change: None,
            did_catch_error: None,
        }
    }

    pub fn on_state_will_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<S, P>, &StateTransition<S, P>) -> NextState<S>
            + Send
            + Sync
            + 'static,
    {
        self.state_will_change = Some(Arc::new(hook));
        self
    }

    pub fn on_state_did_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<S, P>, &CompletedTransition<S, P>) + Send + Sync + 'static,
    {
        self.state_did_change = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<S, P>, &BlocError, &S) + Send + Sync + 'static,
    {
        self.did_catch_error = Some(Arc::new(hook));
        self
    }
}

impl<S, P> Default for StateDelegate<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, P> Clone for StateDelegate<S, P> {
    fn clone(&self) -> Self {
        Self {
            state_will_change: self.state_will_change.clone(),
            state_did_change: self.state_did_change.clone(),
            did_catch_error: self.did_catch_error.clone(),
        }
    }
}

/// The event-processing hooks, split off from the state hooks so the
/// processor task can swap them independently of the container.
pub(crate) struct EventHooks<P, S> {
    pub(crate) will_process_event: Option<WillProcessEventHook<P, S>>,
    pub(crate) did_process_event: Option<DidProcessEventHook<P, S>>,
}

impl<P, S> Default for EventHooks<P, S> {
    fn default() -> Self {
        Self {
            will_process_event: None,
            did_process_event: None,
        }
    }
}

/// Hooks understood by an event pipeline: the state hooks plus the two
/// event hooks.
pub struct EventDelegate<P, S> {
    state: StateDelegate<S, P>,
    hooks: EventHooks<P, S>,
}

impl<P, S> EventDelegate<P, S> {
    pub fn new() -> Self {
        Self {
            state: StateDelegate::new(),
            hooks: EventHooks::default(),
        }
    }

    pub fn on_state_will_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<S, P>, &StateTransition<S, P>) -> NextState<S>
            + Send
            + Sync
            + 'static,
    {
        self.state = self.state.on_state_will_change(hook);
        self
    }

    pub fn on_state_did_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<S, P>, &CompletedTransition<S, P>) + Send + Sync + 'static,
    {
        self.state = self.state.on_state_did_change(hook);
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<S, P>, &BlocError, &S) + Send + Sync + 'static,
    {
        self.state = self.state.on_error(hook);
        self
    }

    pub fn on_will_process_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<S, P>, &BlocEvent<P>, &S) -> Result<Option<BlocEvent<P>>, BlocError>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.will_process_event = Some(Arc::new(hook));
        self
    }

    pub fn on_did_process_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<S, P>, &BlocEvent<P>, &S) + Send + Sync + 'static,
    {
        self.hooks.did_process_event = Some(Arc::new(hook));
        self
    }

    pub(crate) fn split(self) -> (StateDelegate<S, P>, EventHooks<P, S>) {
        (self.state, self.hooks)
    }
}

impl<P, S> Default for EventDelegate<P, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> From<StateDelegate<S, P>> for EventDelegate<P, S> {
    fn from(state: StateDelegate<S, P>) -> Self {
        Self {
            state,
            hooks: EventHooks::default(),
        }
    }
}

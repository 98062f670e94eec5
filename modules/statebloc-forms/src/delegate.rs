//! Hooks for form pipelines.

use std::sync::Arc;

use statebloc_core::{
    BlocError, BlocEvent, CompletedTransition, EventDelegate, NextState, StateContainer,
    StateTransition,
};

use crate::state::FormState;

/// Called with every model that passed validation, before it is committed.
pub type DidValidateModelHook<P, M, V> =
    Arc<dyn Fn(&StateContainer<FormState<V>, P>, &BlocEvent<P>, &M) + Send + Sync>;

/// The event-pipeline hooks plus `did_validate_model`.
pub struct FormDelegate<P, M, V> {
    events: EventDelegate<P, FormState<V>>,
    did_validate_model: Option<DidValidateModelHook<P, M, V>>,
}

impl<P, M, V> FormDelegate<P, M, V> {
    pub fn new() -> Self {
        Self {
            events: EventDelegate::new(),
            did_validate_model: None,
        }
    }

    pub fn on_did_validate_model<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<FormState<V>, P>, &BlocEvent<P>, &M) + Send + Sync + 'static,
    {
        self.did_validate_model = Some(Arc::new(hook));
        self
    }

    pub fn on_state_will_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<FormState<V>, P>, &StateTransition<FormState<V>, P>) -> NextState<FormState<V>>
            + Send
            + Sync
            + 'static,
    {
        self.events = self.events.on_state_will_change(hook);
        self
    }

    pub fn on_state_did_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<FormState<V>, P>, &CompletedTransition<FormState<V>, P>)
            + Send
            + Sync
            + 'static,
    {
        self.events = self.events.on_state_did_change(hook);
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<FormState<V>, P>, &BlocError, &FormState<V>) + Send + Sync + 'static,
    {
        self.events = self.events.on_error(hook);
        self
    }

    pub fn on_will_process_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(
                &StateContainer<FormState<V>, P>,
                &BlocEvent<P>,
                &FormState<V>,
            ) -> Result<Option<BlocEvent<P>>, BlocError>
            + Send
            + Sync
            + 'static,
    {
        self.events = self.events.on_will_process_event(hook);
        self
    }

    pub fn on_did_process_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateContainer<FormState<V>, P>, &BlocEvent<P>, &FormState<V>) + Send + Sync + 'static,
    {
        self.events = self.events.on_did_process_event(hook);
        self
    }

    pub(crate) fn split(
        self,
    ) -> (
        EventDelegate<P, FormState<V>>,
        Option<DidValidateModelHook<P, M, V>>,
    ) {
        (self.events, self.did_validate_model)
    }
}

impl<P, M, V> Default for FormDelegate<P, M, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, M, V> From<EventDelegate<P, FormState<V>>> for FormDelegate<P, M, V> {
    fn from(events: EventDelegate<P, FormState<V>>) -> Self {
        Self {
            events,
            did_validate_model: None,
        }
    }
}

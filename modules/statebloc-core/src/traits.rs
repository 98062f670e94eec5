//! Core traits for the state engine.

use std::collections::{BTreeMap, HashMap};

use crate::container::StateContainer;
use crate::event::BlocEvent;
use crate::next_state::NextState;

/// A state value owned by one container.
///
/// Each transition produces a new value; `merge` is the shallow merge used by
/// the `merge` update strategy: keys present in `patch` win, everything else
/// is kept from `self`.
pub trait BlocState: Clone + Send + Sync + 'static {
    fn merge(&self, patch: Self) -> Self;
}

/// Objects merge key by key; any other JSON value is replaced by the patch.
impl BlocState for serde_json::Value {
    fn merge(&self, patch: Self) -> Self {
        match (self, patch) {
            (serde_json::Value::Object(current), serde_json::Value::Object(patch)) => {
                let mut merged = current.clone();
                merged.extend(patch);
                serde_json::Value::Object(merged)
            }
            (_, patch) => patch,
        }
    }
}

impl<V: Clone + Send + Sync + 'static> BlocState for BTreeMap<String, V> {
    fn merge(&self, patch: Self) -> Self {
        let mut merged = self.clone();
        merged.extend(patch);
        merged
    }
}

impl<V: Clone + Send + Sync + 'static> BlocState for HashMap<String, V> {
    fn merge(&self, patch: Self) -> Self {
        let mut merged = self.clone();
        merged.extend(patch);
        merged
    }
}

/// An object able to build a default state. Must be side-effect free: it is
/// called at construction and again on every `reset()`.
pub trait DefaultStateProvider<S>: Send + Sync {
    fn build_default(&self) -> S;
}

/// Maps an event onto the next state. May return a value, nothing, a future
/// or a stream; see [`NextState`]. A panic inside the mapper is caught and
/// reported as a processing error.
pub trait EventMapper<P, S: BlocState>: Send + Sync + 'static {
    fn map_event_to_state(
        &self,
        bloc: &StateContainer<S, P>,
        event: &BlocEvent<P>,
        current: &S,
    ) -> NextState<S>;
}

impl<P, S, F> EventMapper<P, S> for F
where
    S: BlocState,
    F: Fn(&StateContainer<S, P>, &BlocEvent<P>, &S) -> NextState<S> + Send + Sync + 'static,
{
    fn map_event_to_state(
        &self,
        bloc: &StateContainer<S, P>,
        event: &BlocEvent<P>,
        current: &S,
    ) -> NextState<S> {
        self(bloc, event, current)
    }
}

/// Signals an intentionally unhandled event type from inside a mapper.
pub fn no_support_for_event<P, S>(event: &BlocEvent<P>) -> NextState<S> {
    NextState::Error(crate::error::BlocError::UnsupportedEvent {
        event_type: event.event_type.clone(),
    })
}

//! Default-state construction.

use std::sync::Arc;

use crate::traits::DefaultStateProvider;

/// Produces the default state: at construction when no initial state is
/// given, and on every `reset()`.
pub enum StateBuilder<S> {
    Factory(Arc<dyn Fn() -> S + Send + Sync>),
    Provider(Arc<dyn DefaultStateProvider<S>>),
}

impl<S> StateBuilder<S> {
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        StateBuilder::Factory(Arc::new(factory))
    }

    pub fn from_provider<B>(provider: B) -> Self
    where
        B: DefaultStateProvider<S> + 'static,
    {
        StateBuilder::Provider(Arc::new(provider))
    }

    pub fn build(&self) -> S {
        match self {
            StateBuilder::Factory(factory) => factory(),
            StateBuilder::Provider(provider) => provider.build_default(),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> StateBuilder<S> {
    /// A builder that always hands back a clone of `value`.
    pub fn from_value(value: S) -> Self {
        StateBuilder::from_fn(move || value.clone())
    }
}

impl<S> Clone for StateBuilder<S> {
    fn clone(&self) -> Self {
        match self {
            StateBuilder::Factory(factory) => StateBuilder::Factory(factory.clone()),
            StateBuilder::Provider(provider) => StateBuilder::Provider(provider.clone()),
        }
    }
}

impl<S> std::fmt::Debug for StateBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateBuilder::Factory(_) => f.write_str("StateBuilder::Factory"),
            StateBuilder::Provider(_) => f.write_str("StateBuilder::Provider"),
        }
    }
}

//! Reactive state containers.
//!
//! A container owns one state value and publishes every committed state on
//! a replay-one stream. An event pipeline adds an intake queue on top:
//! events are mapped to a next state (a value, nothing, a future, or a
//! stream), normalized, combined with the current state by an update
//! strategy, and committed, strictly one event at a time.
//!
//! Consumers define their domain by implementing `EventMapper` and may
//! observe or intercept every step through an optional delegate.
//!
//! ```ignore
//! use serde_json::{json, Value};
//! use statebloc_core::{BlocEvent, BlocOptions, EventPipeline, NextState};
//!
//! let bloc = EventPipeline::new(
//!     |_bloc: &_, event: &BlocEvent<Value>, _current: &Value| {
//!         NextState::Value(event.payload.clone())
//!     },
//!     BlocOptions::with_initial_state(json!({"firstname": "foo"})),
//! )?;
//!
//! bloc.dispatch_event(BlocEvent::new("people", json!({"firstname": "baz"})));
//! ```

pub mod builder;
pub mod config;
pub mod container;
pub mod delegate;
pub mod error;
pub mod event;
pub mod next_state;
pub mod pipeline;
pub mod topic;
pub mod traits;

pub use builder::StateBuilder;
pub use config::PipelineConfig;
pub use container::{BlocOptions, StateContainer};
pub use delegate::{
    CompletedTransition, DidCatchErrorHook, DidProcessEventHook, EventDelegate, StateDelegate,
    StateDidChangeHook, StateTransition, StateWillChangeHook, WillProcessEventHook,
};
pub use error::{BlocError, BlocResult};
pub use event::{BlocEvent, EventMeta, UpdateStrategy};
pub use next_state::NextState;
pub use pipeline::{EventFactory, EventPipeline};
pub use topic::{Subscription, Topic};
pub use traits::{no_support_for_event, BlocState, DefaultStateProvider, EventMapper};

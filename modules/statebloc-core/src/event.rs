//! Events dispatched to a pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlocError;

/// How a mapped result combines with the current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// Shallow-merge the mapped result onto the current state.
    #[default]
    Merge,
    /// Replace the current state wholesale.
    Replace,
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStrategy::Merge => f.write_str("merge"),
            UpdateStrategy::Replace => f.write_str("replace"),
        }
    }
}

impl FromStr for UpdateStrategy {
    type Err = BlocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(UpdateStrategy::Merge),
            "replace" => Ok(UpdateStrategy::Replace),
            other => Err(BlocError::Config(format!(
                "unknown update strategy {other:?} (expected merge or replace)"
            ))),
        }
    }
}

/// Per-event metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Overrides the pipeline's default strategy for this one transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<UpdateStrategy>,
}

/// A typed message requesting a state transition. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlocEvent<P> {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EventMeta>,
}

impl<P> BlocEvent<P> {
    pub fn new(event_type: impl Into<String>, payload: P) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            error: None,
            meta: None,
        }
    }

    pub fn with_strategy(mut self, strategy: UpdateStrategy) -> Self {
        self.meta
            .get_or_insert_with(EventMeta::default)
            .update_strategy = Some(strategy);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// The strategy requested by this event, if any.
    pub fn update_strategy(&self) -> Option<UpdateStrategy> {
        self.meta.as_ref().and_then(|m| m.update_strategy)
    }
}

impl BlocEvent<()> {
    /// Turn a payload-less event (as built by an event factory) into a full
    /// event carrying `payload`.
    pub fn attach<P>(self, payload: P) -> BlocEvent<P> {
        BlocEvent {
            event_type: self.event_type,
            payload,
            error: self.error,
            meta: self.meta,
        }
    }
}

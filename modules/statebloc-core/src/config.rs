use std::env;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::error::BlocError;
use crate::event::UpdateStrategy;

const DEFAULT_NAME: &str = "bloc";
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Per-instance engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct PipelineConfig {
    /// Logged as the `bloc` field on every trace event.
    #[builder(default = DEFAULT_NAME.to_string(), setter(into))]
    pub name: String,
    /// Used when an event carries no strategy of its own. Unset means
    /// `merge` for plain pipelines; form pipelines fill in `replace`.
    #[builder(default, setter(strip_option))]
    pub update_strategy: Option<UpdateStrategy>,
    /// Buffer size of each broadcast stream. Slower subscribers skip ahead.
    #[builder(default = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    /// Load overrides from `STATEBLOC_NAME`, `STATEBLOC_UPDATE_STRATEGY` and
    /// `STATEBLOC_CHANNEL_CAPACITY`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, BlocError> {
        let mut config = Self::default();

        if let Ok(name) = env::var("STATEBLOC_NAME") {
            config.name = name;
        }
        if let Ok(strategy) = env::var("STATEBLOC_UPDATE_STRATEGY") {
            config.update_strategy = Some(strategy.parse()?);
        }
        if let Ok(capacity) = env::var("STATEBLOC_CHANNEL_CAPACITY") {
            config.channel_capacity = capacity.trim().parse().map_err(|_| {
                BlocError::Config(format!(
                    "STATEBLOC_CHANNEL_CAPACITY must be a number, got {capacity:?}"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// The configured default strategy, `merge` when unset.
    pub fn effective_update_strategy(&self) -> UpdateStrategy {
        self.update_strategy.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), BlocError> {
        if self.channel_capacity == 0 {
            return Err(BlocError::Config(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

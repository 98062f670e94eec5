//! The form pipeline: an event pipeline whose mapping step is fixed to
//! state → model → validate → annotated state.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use statebloc_core::{
    BlocError, BlocEvent, BlocOptions, BlocResult, EventMapper, EventPipeline, NextState,
    StateBuilder, StateContainer, Subscription, Topic, UpdateStrategy,
};
use tracing::debug;

use crate::delegate::{DidValidateModelHook, FormDelegate};
use crate::mapper::FormMapper;
use crate::state::FormState;
use crate::validation::{SchemaError, SchemaValidator, ValidateOptions};

type ValidateHookSlot<P, M, V> = Arc<RwLock<Option<DidValidateModelHook<P, M, V>>>>;

/// An event pipeline over `FormState<V>`. Cheap to clone.
pub struct FormPipeline<P, M, V> {
    pipeline: EventPipeline<P, FormState<V>>,
    validator: Arc<dyn SchemaValidator<M>>,
    models: Arc<Topic<M>>,
    did_validate_model: ValidateHookSlot<P, M, V>,
}

impl<P, M, V> Clone for FormPipeline<P, M, V> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            validator: self.validator.clone(),
            models: self.models.clone(),
            did_validate_model: self.did_validate_model.clone(),
        }
    }
}

impl<P, M, V> FormPipeline<P, M, V>
where
    P: Clone + Send + Sync + 'static,
    M: Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Events default to the `replace` strategy unless the config names
    /// one, and the mapper's field declarations serve as the state builder
    /// unless one is supplied.
    pub fn new<F, T>(
        mapper: F,
        validator: T,
        options: BlocOptions<FormState<V>, P>,
    ) -> BlocResult<Self>
    where
        F: FormMapper<P, M, V>,
        T: SchemaValidator<M> + 'static,
    {
        let mut options = options;
        if options.config.update_strategy.is_none() {
            options.config.update_strategy = Some(UpdateStrategy::Replace);
        }
        if options.state_builder.is_none() {
            options.state_builder = Some(StateBuilder::from_provider(mapper.state_builder().clone()));
        }

        let validator: Arc<dyn SchemaValidator<M>> = Arc::new(validator);
        let models = Arc::new(Topic::new(options.config.channel_capacity));
        let did_validate_model: ValidateHookSlot<P, M, V> = Arc::new(RwLock::new(None));

        let validating = ValidatingMapper {
            mapper: Arc::new(mapper),
            validator: validator.clone(),
            models: models.clone(),
            did_validate_model: did_validate_model.clone(),
        };
        let pipeline = EventPipeline::new(validating, options)?;

        Ok(Self {
            pipeline,
            validator,
            models,
            did_validate_model,
        })
    }

    pub fn with_event_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> BlocEvent<()> + Send + Sync + 'static,
    {
        self.pipeline = self.pipeline.with_event_factory(factory);
        self
    }

    pub fn with_delegate(self, delegate: FormDelegate<P, M, V>) -> Self {
        self.set_delegate(delegate);
        self
    }

    pub fn set_delegate(&self, delegate: FormDelegate<P, M, V>) {
        let (events, did_validate_model) = delegate.split();
        self.pipeline.set_delegate(events);
        *self
            .did_validate_model
            .write()
            .unwrap_or_else(PoisonError::into_inner) = did_validate_model;
    }

    /// Every model that passed validation. Ends on dispose.
    pub fn models(&self) -> Subscription<M> {
        self.models.subscribe()
    }

    pub fn validator(&self) -> &dyn SchemaValidator<M> {
        self.validator.as_ref()
    }

    pub fn dispatch_event(&self, event: BlocEvent<P>) {
        self.pipeline.dispatch_event(event);
    }

    pub fn dispatch_payload(&self, payload: P) -> BlocResult<()> {
        self.pipeline.dispatch_payload(payload)
    }

    pub fn pipeline(&self) -> &EventPipeline<P, FormState<V>> {
        &self.pipeline
    }

    pub fn container(&self) -> &StateContainer<FormState<V>, P> {
        self.pipeline.container()
    }

    pub fn current_state(&self) -> FormState<V> {
        self.pipeline.current_state()
    }

    pub fn stream(&self) -> Subscription<FormState<V>> {
        self.pipeline.stream()
    }

    pub fn errors(&self) -> Subscription<BlocError> {
        self.pipeline.errors()
    }

    pub fn events(&self) -> Subscription<BlocEvent<P>> {
        self.pipeline.events()
    }

    pub async fn set_state(&self, state: FormState<V>) {
        self.pipeline.set_state(state).await
    }

    pub async fn patch_state(&self, partial: FormState<V>) {
        self.pipeline.patch_state(partial).await
    }

    pub async fn reset(&self) {
        self.pipeline.reset().await
    }

    pub fn is_disposed(&self) -> bool {
        self.pipeline.is_disposed()
    }

    pub fn dispose(&self) {
        self.pipeline.dispose();
        self.models.close();
    }
}

struct ValidatingMapper<P, M, V> {
    mapper: Arc<dyn FormMapper<P, M, V>>,
    validator: Arc<dyn SchemaValidator<M>>,
    models: Arc<Topic<M>>,
    did_validate_model: ValidateHookSlot<P, M, V>,
}

impl<P, M, V> EventMapper<P, FormState<V>> for ValidatingMapper<P, M, V>
where
    P: Clone + Send + Sync + 'static,
    M: Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn map_event_to_state(
        &self,
        bloc: &StateContainer<FormState<V>, P>,
        event: &BlocEvent<P>,
        current: &FormState<V>,
    ) -> NextState<FormState<V>> {
        let current_model = self.mapper.map_state_to_model(current);
        let candidate = self.mapper.map_event_to_model(event, current_model);

        let mapper = self.mapper.clone();
        let validator = self.validator.clone();
        let models = self.models.clone();
        let hook = self
            .did_validate_model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let bloc = bloc.clone();
        let event = event.clone();

        NextState::future(async move {
            let options = ValidateOptions { abort_early: false };
            match validator.validate(candidate, options).await {
                Ok(model) => {
                    if !bloc.is_disposed() {
                        models.publish(model.clone());
                        if let Some(hook) = hook {
                            hook(&bloc, &event, &model);
                        }
                    }
                    Ok(mapper.map_model_to_state(&model, &[]))
                }
                Err(SchemaError::Invalid(rejection)) => {
                    let errors = rejection.errors();
                    debug!(
                        bloc = %bloc.name(),
                        errors = errors.len(),
                        "Model failed validation"
                    );
                    Ok(mapper.map_model_to_state(&rejection.value, &errors))
                }
                Err(SchemaError::Internal(e)) => Err(BlocError::processing(e)),
            }
        })
    }
}

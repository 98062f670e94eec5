use std::collections::BTreeMap;

use statebloc_core::BlocEvent;

use crate::state::{FormState, FormStateBuilder};
use crate::validation::ValidationError;

/// The per-form projections between form state, events and the model the
/// validator checks.
///
/// `P` is the event payload, `M` the model and `V` the field value type.
pub trait FormMapper<P, M, V>: Send + Sync + 'static {
    /// Declares the form's fields. Also serves as the default state builder.
    fn state_builder(&self) -> &FormStateBuilder<V>;

    /// Project the current field values into a model.
    fn map_state_to_model(&self, state: &FormState<V>) -> M;

    /// Apply the event's payload onto the current model.
    fn map_event_to_model(&self, event: &BlocEvent<P>, current: M) -> M;

    /// Field values of `model`, keyed by field name.
    fn map_model_to_values(&self, model: &M) -> BTreeMap<String, Option<V>>;

    /// Rebuild every declared field from `model`, then attach `errors`.
    fn map_model_to_state(&self, model: &M, errors: &[ValidationError]) -> FormState<V> {
        self.state_builder()
            .build_from_values(self.map_model_to_values(model))
            .annotate(errors)
    }
}

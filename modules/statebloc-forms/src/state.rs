//! Form state and the builder that declares a form's fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statebloc_core::{BlocState, DefaultStateProvider};
use tracing::debug;

use crate::validation::ValidationError;

/// Display-ready state of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFieldState<V> {
    pub value: Option<V>,
    pub required: bool,
    pub valid: bool,
    pub disabled: bool,
    pub errors: Vec<ValidationError>,
}

impl<V> FormFieldState<V> {
    pub fn new(value: Option<V>, required: bool) -> Self {
        Self {
            value,
            required,
            valid: true,
            disabled: false,
            errors: Vec::new(),
        }
    }
}

/// Every field of a form keyed by name, plus the overall validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormState<V> {
    pub fields: BTreeMap<String, FormFieldState<V>>,
    pub valid: bool,
}

impl<V> Default for FormState<V> {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
            valid: true,
        }
    }
}

impl<V> FormState<V> {
    pub fn field(&self, name: &str) -> Option<&FormFieldState<V>> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&V> {
        self.field(name).and_then(|f| f.value.as_ref())
    }

    /// Attach each error to the field named by its path. Errors naming no
    /// declared field are dropped. `valid` is recomputed afterwards.
    pub fn annotate(mut self, errors: &[ValidationError]) -> Self {
        for error in errors {
            match self.fields.get_mut(&error.path) {
                Some(field) => {
                    field.valid = false;
                    field.errors.push(error.clone());
                }
                None => debug!(path = %error.path, "Discarding error for unknown field"),
            }
        }
        self.refresh_validity();
        self
    }

    fn refresh_validity(&mut self) {
        self.valid = self.fields.values().all(|f| f.errors.is_empty());
    }
}

/// Fields in `patch` replace their counterparts; the rest are kept.
impl<V: Clone + Send + Sync + 'static> BlocState for FormState<V> {
    fn merge(&self, patch: Self) -> Self {
        let mut merged = self.clone();
        merged.fields.extend(patch.fields);
        merged.refresh_validity();
        merged
    }
}

/// Declares a form's fields and whether each one is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormStateBuilder<V> {
    fields: BTreeMap<String, bool>,
    _value: std::marker::PhantomData<fn() -> V>,
}

impl<V> FormStateBuilder<V> {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            _value: std::marker::PhantomData,
        }
    }

    /// Declare an optional field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), false);
        self
    }

    pub fn required_field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), true);
        self
    }

    /// Every declared field, empty and valid.
    pub fn build_default(&self) -> FormState<V> {
        self.build_from_values(BTreeMap::new())
    }

    /// One field state per declared field, taking values from `values`.
    /// Undeclared keys are ignored; missing ones start empty.
    pub fn build_from_values(&self, mut values: BTreeMap<String, Option<V>>) -> FormState<V> {
        let fields = self
            .fields
            .iter()
            .map(|(name, required)| {
                let value = values.remove(name).flatten();
                (name.clone(), FormFieldState::new(value, *required))
            })
            .collect();

        FormState {
            fields,
            valid: true,
        }
    }
}

impl<V> Default for FormStateBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> DefaultStateProvider<FormState<V>> for FormStateBuilder<V> {
    fn build_default(&self) -> FormState<V> {
        FormStateBuilder::build_default(self)
    }
}

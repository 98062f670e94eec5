//! Form pipelines on top of `statebloc-core`.
//!
//! A form pipeline keeps a `FormState` of named fields. Every event is
//! projected onto a model, validated by a pluggable `SchemaValidator`, and
//! turned back into a fully annotated form state. Field errors are part of
//! the committed state; only validator failures take the error path.

pub mod delegate;
pub mod mapper;
pub mod pipeline;
pub mod state;
pub mod validation;

pub use delegate::{DidValidateModelHook, FormDelegate};
pub use mapper::FormMapper;
pub use pipeline::FormPipeline;
pub use state::{FormFieldState, FormState, FormStateBuilder};
pub use validation::{
    SchemaError, SchemaValidator, ValidateOptions, ValidationError, ValidationRejection,
};

//! A contact form driven end to end through the form pipeline.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use statebloc_core::{
    BlocError, BlocEvent, BlocOptions, PipelineConfig, Subscription, UpdateStrategy,
};
use statebloc_forms::{
    FormDelegate, FormMapper, FormPipeline, FormState, FormStateBuilder, SchemaError,
    SchemaValidator, ValidateOptions, ValidationError, ValidationRejection,
};
use tokio::time::timeout;

// ---------------------------------------------------------------------------
// Contact form fixture
// ---------------------------------------------------------------------------

const CONTACT_EVENT: &str = "contact_form";

#[derive(Debug, Clone, Default, PartialEq)]
struct ContactModel {
    name: Option<String>,
    email: Option<String>,
    subject: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct ContactPayload {
    name: Option<String>,
    email: Option<String>,
    subject: Option<String>,
    message: Option<String>,
}

struct ContactFormMapper {
    builder: FormStateBuilder<String>,
}

impl ContactFormMapper {
    fn new() -> Self {
        Self {
            builder: FormStateBuilder::new()
                .required_field("name")
                .required_field("email")
                .required_field("message")
                .field("subject"),
        }
    }
}

impl FormMapper<ContactPayload, ContactModel, String> for ContactFormMapper {
    fn state_builder(&self) -> &FormStateBuilder<String> {
        &self.builder
    }

    fn map_state_to_model(&self, state: &FormState<String>) -> ContactModel {
        ContactModel {
            name: state.value("name").cloned(),
            email: state.value("email").cloned(),
            subject: state.value("subject").cloned(),
            message: state.value("message").cloned(),
        }
    }

    fn map_event_to_model(&self, event: &BlocEvent<ContactPayload>, current: ContactModel) -> ContactModel {
        let payload = event.payload.clone();
        ContactModel {
            name: payload.name.or(current.name),
            email: payload.email.or(current.email),
            subject: payload.subject.or(current.subject),
            message: payload.message.or(current.message),
        }
    }

    fn map_model_to_values(&self, model: &ContactModel) -> BTreeMap<String, Option<String>> {
        BTreeMap::from([
            ("name".to_string(), model.name.clone()),
            ("email".to_string(), model.email.clone()),
            ("subject".to_string(), model.subject.clone()),
            ("message".to_string(), model.message.clone()),
        ])
    }
}

struct ContactSchema {
    max_name: usize,
    max_subject: usize,
    max_message: usize,
    require_subject: bool,
}

impl Default for ContactSchema {
    fn default() -> Self {
        Self {
            max_name: 256,
            max_subject: 256,
            max_message: 2048,
            require_subject: false,
        }
    }
}

impl ContactSchema {
    fn with_required_subject() -> Self {
        Self {
            require_subject: true,
            ..Self::default()
        }
    }

    fn check(
        errors: &mut Vec<ValidationError>,
        path: &str,
        value: Option<&String>,
        required: bool,
        max: usize,
    ) {
        match value.filter(|v| !v.is_empty()) {
            None if required => errors.push(ValidationError::new(path, format!("{path} is a required field"))),
            Some(v) if v.chars().count() > max => errors.push(ValidationError::new(
                path,
                format!("{path} must be at most {max} characters"),
            )),
            _ => {}
        }
    }
}

#[async_trait]
impl SchemaValidator<ContactModel> for ContactSchema {
    async fn validate(
        &self,
        model: ContactModel,
        options: ValidateOptions,
    ) -> Result<ContactModel, SchemaError<ContactModel>> {
        let mut errors = Vec::new();
        Self::check(&mut errors, "name", model.name.as_ref(), true, self.max_name);
        Self::check(&mut errors, "message", model.message.as_ref(), true, self.max_message);
        Self::check(&mut errors, "subject", model.subject.as_ref(), self.require_subject, self.max_subject);
        if let Some(email) = model.email.as_ref().filter(|e| !e.contains('@')) {
            errors.push(ValidationError::new("email", format!("{email} is not a valid email")));
        }

        if options.abort_early {
            errors.truncate(1);
        }
        match errors.len() {
            0 => Ok(model),
            1 => {
                let error = errors.remove(0);
                Err(SchemaError::Invalid(ValidationRejection::single(
                    model,
                    error.path,
                    error.message,
                )))
            }
            _ => Err(SchemaError::Invalid(ValidationRejection::new(model, errors))),
        }
    }
}

/// Rejects everything with an error for a field the form does not declare.
struct UnknownFieldSchema;

#[async_trait]
impl SchemaValidator<ContactModel> for UnknownFieldSchema {
    async fn validate(
        &self,
        model: ContactModel,
        _options: ValidateOptions,
    ) -> Result<ContactModel, SchemaError<ContactModel>> {
        Err(SchemaError::Invalid(ValidationRejection::new(
            model,
            vec![ValidationError::new("phone", "phone is a required field")],
        )))
    }
}

struct BrokenSchema;

#[async_trait]
impl SchemaValidator<ContactModel> for BrokenSchema {
    async fn validate(
        &self,
        _model: ContactModel,
        _options: ValidateOptions,
    ) -> Result<ContactModel, SchemaError<ContactModel>> {
        Err(anyhow::anyhow!("schema could not be compiled").into())
    }
}

type ContactForm = FormPipeline<ContactPayload, ContactModel, String>;
type ContactDelegate = FormDelegate<ContactPayload, ContactModel, String>;

fn contact_form_with<T>(schema: T, initial: Option<FormState<String>>) -> ContactForm
where
    T: SchemaValidator<ContactModel> + 'static,
{
    let options = match initial {
        Some(state) => BlocOptions::with_initial_state(state),
        None => BlocOptions::builder().build(),
    };
    FormPipeline::new(ContactFormMapper::new(), schema, options)
        .unwrap()
        .with_event_factory(|| BlocEvent::new(CONTACT_EVENT, ()))
}

fn contact_form(initial: Option<FormState<String>>) -> ContactForm {
    contact_form_with(ContactSchema::default(), initial)
}

fn valid_model() -> ContactModel {
    ContactModel {
        name: Some("foo".to_string()),
        email: Some("foo@example.com".to_string()),
        subject: None,
        message: Some("hello world".to_string()),
    }
}

fn valid_state() -> FormState<String> {
    ContactFormMapper::new().map_model_to_state(&valid_model(), &[])
}

fn on_name_change(form: &ContactForm, name: &str) {
    form.dispatch_payload(ContactPayload {
        name: Some(name.to_string()),
        ..Default::default()
    })
    .unwrap();
}

fn on_email_change(form: &ContactForm, email: &str) {
    form.dispatch_payload(ContactPayload {
        email: Some(email.to_string()),
        ..Default::default()
    })
    .unwrap();
}

async fn next<T>(stream: &mut Subscription<T>) -> Option<T> {
    timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("stream did not emit in time")
}

/// Skips the replayed current state and returns the next committed one.
async fn next_commit(form: &ContactForm, trigger: impl FnOnce(&ContactForm)) -> FormState<String> {
    let mut states = form.stream();
    next(&mut states).await;
    trigger(form);
    next(&mut states).await.unwrap()
}

fn recording_delegate() -> (
    ContactDelegate,
    Arc<Mutex<Vec<ContactModel>>>,
) {
    let validated = Arc::new(Mutex::new(Vec::new()));
    let validated_c = validated.clone();
    let delegate = ContactDelegate::new().on_did_validate_model(move |_, _, model: &ContactModel| {
        validated_c.lock().unwrap().push(model.clone());
    });
    (delegate, validated)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn starts_from_the_declared_fields() {
    let form = contact_form(None);
    let state = form.current_state();

    assert_eq!(state.fields.len(), 4);
    assert!(state.field("name").unwrap().required);
    assert!(state.field("email").unwrap().required);
    assert!(state.field("message").unwrap().required);
    assert!(!state.field("subject").unwrap().required);
    assert_eq!(form.pipeline().update_strategy(), UpdateStrategy::Replace);
    assert_eq!(
        form.container().config().update_strategy,
        Some(UpdateStrategy::Replace)
    );
}

#[tokio::test]
async fn keeps_an_explicitly_configured_strategy() {
    let options = BlocOptions::builder()
        .config(
            PipelineConfig::builder()
                .name("contact")
                .update_strategy(UpdateStrategy::Merge)
                .build(),
        )
        .build();
    let form: ContactForm =
        FormPipeline::new(ContactFormMapper::new(), ContactSchema::default(), options)
            .unwrap()
            .with_event_factory(|| BlocEvent::new(CONTACT_EVENT, ()));

    assert_eq!(form.pipeline().update_strategy(), UpdateStrategy::Merge);
    assert_eq!(form.container().name(), "contact");

    let state = next_commit(&form, |f| on_name_change(f, "foo")).await;
    assert_eq!(state.fields.len(), 4);
    assert_eq!(state.value("name"), Some(&"foo".to_string()));
}

#[tokio::test]
async fn accepts_a_custom_initial_state() {
    let mut initial = valid_state();
    initial.fields.get_mut("subject").unwrap().value = Some("hello".to_string());

    let form = contact_form(Some(initial));
    let mut states = form.stream();

    assert_eq!(
        next(&mut states).await.unwrap().value("subject"),
        Some(&"hello".to_string())
    );
}

#[tokio::test]
async fn custom_schema_rejects_with_a_single_error() {
    let form = contact_form_with(ContactSchema::with_required_subject(), None);

    let result = form
        .validator()
        .validate(valid_model(), ValidateOptions::default())
        .await;

    match result {
        Err(SchemaError::Invalid(rejection)) => {
            assert!(rejection.inner.is_empty());
            assert_eq!(rejection.path.as_deref(), Some("subject"));
            assert_eq!(rejection.errors().len(), 1);
        }
        other => panic!("expected a validation rejection, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Field changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn name_change_commits_an_annotated_state() {
    let form = contact_form(None);
    let (delegate, validated) = recording_delegate();
    form.set_delegate(delegate);

    let state = next_commit(&form, |f| on_name_change(f, "foo")).await;

    let name = state.field("name").unwrap();
    assert_eq!(name.value.as_deref(), Some("foo"));
    assert!(name.valid);
    assert!(name.required);

    // message is still missing
    assert!(!state.field("message").unwrap().valid);
    assert!(!state.valid);
    assert!(validated.lock().unwrap().is_empty());
}

#[tokio::test]
async fn valid_model_is_validated_and_published() {
    let form = contact_form(Some(valid_state()));
    let (delegate, validated) = recording_delegate();
    form.set_delegate(delegate);
    let mut models = form.models();

    let state = next_commit(&form, |f| on_name_change(f, "qux")).await;

    assert!(state.valid);
    assert!(!state.field("subject").unwrap().required);
    assert!(state.fields.values().all(|f| f.valid && f.errors.is_empty()));

    let published = next(&mut models).await.unwrap();
    assert_eq!(published.name.as_deref(), Some("qux"));

    let validated = validated.lock().unwrap();
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].name.as_deref(), Some("qux"));
}

#[tokio::test]
async fn invalid_email_marks_only_the_email_field() {
    let form = contact_form(Some(valid_state()));

    let state = next_commit(&form, |f| on_email_change(f, "not-an-email")).await;

    let email = state.field("email").unwrap();
    assert!(!email.valid);
    assert_eq!(email.value.as_deref(), Some("not-an-email"));
    assert_eq!(email.errors.len(), 1);
    assert_eq!(email.errors[0].message, "not-an-email is not a valid email");

    for name in ["name", "subject", "message"] {
        assert!(state.field(name).unwrap().valid, "{name} should stay valid");
    }
    assert!(!state.valid);
}

#[tokio::test]
async fn invalid_models_are_not_published() {
    let form = contact_form(Some(valid_state()));
    let mut models = form.models();

    next_commit(&form, |f| on_email_change(f, "nope")).await;
    next_commit(&form, |f| on_email_change(f, "qux@example.com")).await;

    let published = next(&mut models).await.unwrap();
    assert_eq!(published.email.as_deref(), Some("qux@example.com"));
}

#[tokio::test]
async fn errors_for_unknown_fields_are_discarded() {
    let form = contact_form_with(UnknownFieldSchema, Some(valid_state()));
    let (delegate, validated) = recording_delegate();
    form.set_delegate(delegate);

    let state = next_commit(&form, |f| on_name_change(f, "bar")).await;

    assert!(state.valid);
    assert_eq!(state.value("name"), Some(&"bar".to_string()));
    assert!(validated.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Failures and lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validator_failures_take_the_error_path() {
    let form = contact_form_with(BrokenSchema, Some(valid_state()));
    let caught = Arc::new(Mutex::new(Vec::<String>::new()));
    let caught_c = caught.clone();
    form.set_delegate(ContactDelegate::new().on_error(move |_, error, _| {
        caught_c.lock().unwrap().push(error.to_string());
    }));
    let mut errors = form.errors();

    on_name_change(&form, "qux");

    let error = next(&mut errors).await.unwrap();
    assert!(matches!(error, BlocError::Processing(_)));
    assert_eq!(form.current_state(), valid_state());
    assert_eq!(
        *caught.lock().unwrap(),
        vec!["processing error: schema could not be compiled".to_string()]
    );
}

#[tokio::test]
async fn reset_restores_the_declared_defaults() {
    let form = contact_form(None);
    next_commit(&form, |f| on_name_change(f, "foo")).await;

    form.reset().await;

    assert_eq!(
        form.current_state(),
        ContactFormMapper::new().state_builder().build_default()
    );
}

#[tokio::test]
async fn dispose_ends_every_stream() {
    let form = contact_form(None);
    let mut states = form.stream();
    let mut models = form.models();
    next(&mut states).await;

    form.dispose();
    on_name_change(&form, "late");

    assert_eq!(next(&mut states).await, None);
    assert_eq!(next(&mut models).await, None);
    assert!(form.is_disposed());
}

//! Answers router coprocessor requests with generated mock data.

use std::sync::Arc;

use displaydoc::Display;
use http::StatusCode;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use subgraph_validator::Generator;
use subgraph_validator::GenerationError;
use subgraph_validator::OperationError;
use subgraph_validator::SubgraphValidators;
use subgraph_validator::add_typename_to_document;
use subgraph_validator::correction;
use subgraph_validator::normalize_operation;
use thiserror::Error;
use tracing::Instrument;

use crate::external::Control;
use crate::external::Externalizable;
use crate::external::PipelineStep;
use crate::external::SubgraphRequestBody;

const DATA: &str = "data";
const CONTROL: &str = "control";

/// Errors answered to the router as a GraphQL error response.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub(crate) enum MockError {
    /// the subgraph request has no query
    MissingQuery,
    /// {0}
    Operation(#[from] OperationError),
    /// {0}
    Generation(#[from] GenerationError),
}

impl MockError {
    fn extension_code(&self) -> &'static str {
        match self {
            MockError::MissingQuery => "GRAPHQL_PARSE_FAILED",
            MockError::Operation(error) => error.extension_code(),
            MockError::Generation(_) => "GENERATION_FAILED",
        }
    }

    fn to_graphql_response(&self) -> Value {
        json!({
            "errors": [{
                "message": self.to_string(),
                "extensions": { "code": self.extension_code() },
            }]
        })
    }
}

/// The coprocessor state shared by every request.
#[derive(Clone)]
pub struct Mocker {
    validators: Arc<SubgraphValidators>,
    generator: Arc<dyn Generator>,
    add_typename: bool,
}

impl Mocker {
    pub fn new(
        validators: SubgraphValidators,
        generator: Arc<dyn Generator>,
        add_typename: bool,
    ) -> Self {
        Self {
            validators: Arc::new(validators),
            generator,
            add_typename,
        }
    }

    /// Handle one coprocessor payload.
    ///
    /// Subgraph requests are answered with a `break` carrying the mock response; every other
    /// stage continues unchanged.
    pub async fn handle(&self, payload: Value) -> Result<Value, serde_json::Error> {
        let stage = payload
            .get("stage")
            .and_then(Value::as_str)
            .and_then(|stage| stage.parse::<PipelineStep>().ok());
        if stage != Some(PipelineStep::SubgraphRequest) {
            tracing::debug!(?stage, "continuing");
            return Ok(continue_with(payload));
        }

        let request: Externalizable<SubgraphRequestBody> = serde_json::from_value(payload)?;
        let span = tracing::info_span!(
            "subgraph_request",
            service = request.service_name.as_deref().unwrap_or_default(),
            id = request.id.as_deref().unwrap_or_default(),
        );
        let reply = self.subgraph_request(request).instrument(span).await;
        serde_json::to_value(reply)
    }

    async fn subgraph_request(
        &self,
        mut request: Externalizable<SubgraphRequestBody>,
    ) -> Externalizable<Value> {
        let body = request.body.take().unwrap_or_default();
        let service = request.service_name.clone().unwrap_or_default();
        match self.mock(&service, body).await {
            Ok(data) => request.reply(Control::status(StatusCode::OK), data),
            Err(error) => {
                tracing::error!(%error, "could not mock the subgraph response");
                request.reply(
                    Control::status(StatusCode::INTERNAL_SERVER_ERROR),
                    error.to_graphql_response(),
                )
            }
        }
    }

    async fn mock(&self, service: &str, body: SubgraphRequestBody) -> Result<Value, MockError> {
        let query = body.query.ok_or(MockError::MissingQuery)?;
        let mut operation = if self.add_typename {
            add_typename_to_document(&query)?
        } else {
            normalize_operation(&query)?
        };
        operation.truncate(operation.trim_end().len());
        tracing::debug!(%operation, variables = ?body.variables, "mocking operation");

        // Operation defects fail the request before anything is generated.
        let validator = self.validators.operation_validator(service, &operation)?;

        let prompt = correction::mock_prompt(&operation, body.variables.as_ref());
        let generated = correction::generate(self.generator.as_ref(), &prompt).await?;
        let correction =
            correction::correct_with(validator.as_ref(), generated, self.generator.as_ref())
                .await;
        tracing::info!(
            outcome = %correction.outcome,
            corrections = correction.corrections,
            "mock data ready"
        );
        Ok(envelope(correction.data))
    }
}

fn continue_with(mut payload: Value) -> Value {
    if let Value::Object(object) = &mut payload {
        object.insert(CONTROL.to_string(), json!(Control::Continue));
    }
    payload
}

fn envelope(data: Value) -> Value {
    match data {
        Value::Object(object) if object.contains_key(DATA) => Value::Object(object),
        data => Value::Object(Map::from_iter([(DATA.to_string(), data)])),
    }
}

use std::collections::HashMap;

use serde_json::Value;

use crate::compile;
use crate::correction;
use crate::correction::Correction;
use crate::correction::Generator;
use crate::error::OperationError;
use crate::error::SchemaError;
use crate::schema::SubgraphSchema;
use crate::validator::Validator;

/// Compiles operations sent to one subgraph into validators of their response data.
#[derive(Debug)]
pub struct SubgraphValidator {
    schema: SubgraphSchema,
}

impl SubgraphValidator {
    /// Build the validator of a subgraph from its SDL.
    pub fn new(sdl: &str) -> Result<Self, SchemaError> {
        Ok(Self {
            schema: SubgraphSchema::parse(sdl)?,
        })
    }

    pub fn schema(&self) -> &SubgraphSchema {
        &self.schema
    }

    /// Compile the first operation of `operation` into the validator of its response data.
    ///
    /// Documents holding several operations are not supported: the others are ignored.
    pub fn operation_validator(&self, operation: &str) -> Result<Validator, OperationError> {
        compile::operation_validator(&self.schema, operation)
    }
}

/// Validators of every known subgraph, by service name.
///
/// Built once at startup and read concurrently afterwards.
#[derive(Debug, Default)]
pub struct SubgraphValidators {
    validators: HashMap<String, SubgraphValidator>,
}

impl SubgraphValidators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, service: impl Into<String>, validator: SubgraphValidator) {
        self.validators.insert(service.into(), validator);
    }

    pub fn get(&self, service: &str) -> Option<&SubgraphValidator> {
        self.validators.get(service)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Compile an operation sent to `service`, before any data is generated for it.
    ///
    /// Returns `None` for services without a validator.
    pub fn operation_validator(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<Option<Validator>, OperationError> {
        self.get(service)
            .map(|subgraph| subgraph.operation_validator(operation))
            .transpose()
    }

    /// Validate data generated for an operation sent to `service`, correcting it once if needed.
    ///
    /// Services without a validator pass their data through untouched. Errors are defects of the
    /// operation and are never retried.
    pub async fn validate_and_correct(
        &self,
        service: &str,
        operation: &str,
        data: Value,
        generator: &dyn Generator,
    ) -> Result<Correction, OperationError> {
        let validator = self.operation_validator(service, operation)?;
        Ok(correction::correct_with(validator.as_ref(), data, generator).await)
    }
}

impl FromIterator<(String, SubgraphValidator)> for SubgraphValidators {
    fn from_iter<T: IntoIterator<Item = (String, SubgraphValidator)>>(iter: T) -> Self {
        Self {
            validators: iter.into_iter().collect(),
        }
    }
}

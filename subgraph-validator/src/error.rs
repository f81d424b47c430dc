//! Validator errors.

use apollo_compiler::validation::DiagnosticList;
use displaydoc::Display;
use thiserror::Error;

use crate::validator::Issue;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building the type definition table of a subgraph.
///
/// These are fatal: a subgraph whose schema cannot be built has no validator.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum SchemaError {
    /// GraphQL parser error: {0}
    Parse(ParseErrors),
    /// GraphQL validation error: {0}
    Validate(ParseErrors),
}

/// Errors raised while compiling an operation into a validator.
///
/// They describe a defect of the operation itself, never of the data it is applied to.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum OperationError {
    /// GraphQL parser error: {0}
    Parse(ParseErrors),
    /// the document does not contain an operation
    MissingOperation,
    /// the schema does not define a root type for {0} operations
    UnsupportedOperationType(String),
    /// cannot query field '{field}' on type '{type_name}'
    UnknownField { type_name: String, field: String },
    /// type '{0}' cannot be resolved in the subgraph schema
    UnresolvedType(String),
    /// field '{field}' of composite type '{type_name}' must have a selection of subfields
    MissingSelectionSet { type_name: String, field: String },
    /// unknown fragment '{0}'
    UnknownFragment(String),
    /// selection processing recursion limit exceeded
    RecursionLimitExceeded,
    /// selection processing limit exceeded
    SelectionLimitExceeded,
}

impl OperationError {
    /// Error code surfaced to the router in GraphQL error extensions.
    pub fn extension_code(&self) -> &'static str {
        match self {
            OperationError::Parse(_) => "GRAPHQL_PARSE_FAILED",
            OperationError::MissingOperation => "GRAPHQL_UNKNOWN_OPERATION_NAME",
            OperationError::RecursionLimitExceeded => "RECURSION_LIMIT_EXCEEDED",
            OperationError::SelectionLimitExceeded => "SELECTION_LIMIT_EXCEEDED",
            OperationError::UnsupportedOperationType(_)
            | OperationError::UnknownField { .. }
            | OperationError::UnresolvedType(_)
            | OperationError::MissingSelectionSet { .. }
            | OperationError::UnknownFragment(_) => "GRAPHQL_VALIDATION_FAILED",
        }
    }
}

/// The generated value does not match the shape required by the operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub issues: Vec<Issue>,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "response validation failed with {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n{issue}")?;
        }
        Ok(())
    }
}

/// Errors raised while asking the generator for data.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum GenerationError {
    /// generator request failed: {0}
    Generator(BoxError),
    /// generator output is not valid JSON: {0}
    MalformedOutput(serde_json::Error),
}

/// Collection of GraphQL diagnostics.
#[derive(Debug)]
pub struct ParseErrors {
    pub errors: DiagnosticList,
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut errors = self.errors.iter();
        for (i, error) in errors.by_ref().take(5).enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        let remaining = errors.count();
        if remaining > 0 {
            write!(f, "\n...and {remaining} other errors")?;
        }
        Ok(())
    }
}

impl From<DiagnosticList> for ParseErrors {
    fn from(errors: DiagnosticList) -> Self {
        Self { errors }
    }
}

//! Compilation of operations into response validators.
//!
//! The operation is walked from its root selection set down to the scalar leaves. At each level
//! the strategy depends on the parent type: object types produce a plain object shape, while
//! interfaces and unions produce a discriminated union as soon as the selection contains inline
//! fragments.

use std::cell::Cell;
use std::collections::HashMap;

use apollo_compiler::ast;
use apollo_compiler::ast::OperationType;

use crate::error::OperationError;
use crate::schema::SubgraphSchema;
use crate::validator::Validator;

mod field_type;
mod selection_set;

/// Limit on nested selection sets, including named fragment expansion.
pub(crate) const RECURSION_LIMIT: usize = 512;

/// Limit on selections visited while compiling one operation, fragment expansions included.
pub(crate) const SELECTION_LIMIT: usize = 100_000;

const OPERATION_PATH: &str = "operation.graphql";

/// Compiles operations of a single document against a subgraph schema.
pub(crate) struct OperationCompiler<'schema, 'doc> {
    schema: &'schema SubgraphSchema,
    document: &'doc ast::Document,
    fragments: HashMap<&'doc str, &'doc ast::FragmentDefinition>,
    visited_selections: Cell<usize>,
}

impl<'schema, 'doc> OperationCompiler<'schema, 'doc> {
    pub(crate) fn new(schema: &'schema SubgraphSchema, document: &'doc ast::Document) -> Self {
        let fragments = document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                ast::Definition::FragmentDefinition(fragment) => {
                    Some((fragment.name.as_str(), &**fragment))
                }
                _ => None,
            })
            .collect();
        Self {
            schema,
            document,
            fragments,
            visited_selections: Cell::new(0),
        }
    }

    /// Compile the first operation of the document.
    pub(crate) fn compile(&self) -> Result<Validator, OperationError> {
        let operation = self
            .document
            .definitions
            .iter()
            .find_map(|definition| match definition {
                ast::Definition::OperationDefinition(operation) => Some(operation),
                _ => None,
            })
            .ok_or(OperationError::MissingOperation)?;

        let root = self
            .schema
            .root_type(operation.operation_type)
            .ok_or_else(|| {
                OperationError::UnsupportedOperationType(
                    operation_kind(operation.operation_type).to_string(),
                )
            })?;
        let parent = self
            .schema
            .parent_type(root)
            .ok_or_else(|| OperationError::UnresolvedType(root.to_string()))?;

        self.selection_set(&operation.selection_set, parent, 0)
    }
}

fn operation_kind(operation_type: OperationType) -> &'static str {
    match operation_type {
        OperationType::Query => "query",
        OperationType::Mutation => "mutation",
        OperationType::Subscription => "subscription",
    }
}

/// Parse an operation and compile it into the validator of its response data.
pub(crate) fn operation_validator(
    schema: &SubgraphSchema,
    operation: &str,
) -> Result<Validator, OperationError> {
    let document = ast::Document::parse(operation, OPERATION_PATH)
        .map_err(|invalid| OperationError::Parse(invalid.errors.into()))?;
    OperationCompiler::new(schema, &document).compile()
}

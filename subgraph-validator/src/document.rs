//! Rewriting of operation documents before they are sent to a generator.

use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::DirectiveList;
use apollo_compiler::name;

use crate::error::OperationError;
use crate::validator::TYPENAME;

const OPERATION_PATH: &str = "operation.graphql";
const EXPORT_DIRECTIVE: &str = "export";

fn parse(operation: &str) -> Result<ast::Document, OperationError> {
    ast::Document::parse(operation, OPERATION_PATH)
        .map_err(|invalid| OperationError::Parse(invalid.errors.into()))
}

/// Parse an operation and print it back in canonical form.
pub fn normalize_operation(operation: &str) -> Result<String, OperationError> {
    Ok(parse(operation)?.to_string())
}

/// Add `__typename` to every nested selection set of the operation and fragments of a document.
///
/// The root selection set of an operation is left alone. Selection sets that already select a
/// `__`-prefixed field, or that belong to a field marked `@export`, are not extended.
pub fn add_typename_to_document(operation: &str) -> Result<String, OperationError> {
    let mut document = parse(operation)?;
    for definition in &mut document.definitions {
        match definition {
            ast::Definition::OperationDefinition(operation) => {
                descend(&mut operation.make_mut().selection_set);
            }
            ast::Definition::FragmentDefinition(fragment) => {
                add_typename(&mut fragment.make_mut().selection_set);
            }
            _ => {}
        }
    }
    Ok(document.to_string())
}

fn add_typename(selection_set: &mut Vec<ast::Selection>) {
    let selects_meta_field = selection_set.iter().any(|selection| {
        matches!(selection, ast::Selection::Field(field) if field.name.starts_with("__"))
    });
    if !selects_meta_field {
        selection_set.push(ast::Selection::Field(Node::new(ast::Field {
            alias: None,
            name: name!("__typename"),
            arguments: Vec::new(),
            directives: DirectiveList::new(),
            selection_set: Vec::new(),
        })));
    }
    descend(selection_set);
}

fn descend(selection_set: &mut [ast::Selection]) {
    for selection in selection_set {
        match selection {
            ast::Selection::Field(field) => {
                if field.selection_set.is_empty() || field.name.as_str() == TYPENAME {
                    continue;
                }
                let exported = field
                    .directives
                    .iter()
                    .any(|directive| directive.name.as_str() == EXPORT_DIRECTIVE);
                let field = field.make_mut();
                if exported {
                    descend(&mut field.selection_set);
                } else {
                    add_typename(&mut field.selection_set);
                }
            }
            ast::Selection::InlineFragment(inline) => {
                add_typename(&mut inline.make_mut().selection_set);
            }
            ast::Selection::FragmentSpread(_) => {}
        }
    }
}

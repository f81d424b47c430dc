//! Subgraph schema augmentation.
//!
//! Subgraph SDL is not a complete GraphQL schema on its own: federation directives are applied
//! without being declared and the `_entities` and `_service` root fields only exist once the
//! subgraph library has processed the document. The supplement built here fills those gaps so the
//! document validates and the router's entity fetches can be checked like any other operation.

use std::collections::HashSet;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::OperationType;
use indexmap::IndexMap;
use indexmap::IndexSet;

pub(crate) const ANY_SCALAR: &str = "_Any";
pub(crate) const SERVICE_TYPE: &str = "_Service";
pub(crate) const ENTITY_UNION: &str = "_Entity";
pub(crate) const ENTITIES_FIELD: &str = "_entities";
pub(crate) const SERVICE_FIELD: &str = "_service";

const BUILT_IN_DIRECTIVES: [&str; 5] = ["skip", "include", "deprecated", "specifiedBy", "oneOf"];
const TYPE_SYSTEM_LOCATIONS: &str = "SCHEMA | SCALAR | OBJECT | FIELD_DEFINITION \
    | ARGUMENT_DEFINITION | INTERFACE | UNION | ENUM | ENUM_VALUE | INPUT_OBJECT \
    | INPUT_FIELD_DEFINITION";

#[derive(Default)]
struct Inventory<'doc> {
    declared_types: HashSet<&'doc str>,
    declared_directives: HashSet<&'doc str>,
    applied_directives: IndexMap<&'doc str, IndexSet<&'doc str>>,
    entities: IndexSet<&'doc str>,
    query_root: Option<&'doc str>,
}

impl<'doc> Inventory<'doc> {
    fn take(document: &'doc ast::Document) -> Self {
        let mut inventory = Self::default();
        for definition in &document.definitions {
            inventory.record(definition);
        }
        inventory
    }

    fn record(&mut self, definition: &'doc ast::Definition) {
        match definition {
            ast::Definition::SchemaDefinition(schema) => {
                self.applied(&schema.directives);
                self.roots(&schema.root_operations);
            }
            ast::Definition::SchemaExtension(schema) => {
                self.applied(&schema.directives);
                self.roots(&schema.root_operations);
            }
            ast::Definition::DirectiveDefinition(directive) => {
                self.declared_directives.insert(directive.name.as_str());
                for argument in &directive.arguments {
                    self.applied(&argument.directives);
                }
            }
            ast::Definition::ScalarTypeDefinition(scalar) => {
                self.declared_types.insert(scalar.name.as_str());
                self.applied(&scalar.directives);
            }
            ast::Definition::ScalarTypeExtension(scalar) => {
                self.applied(&scalar.directives);
            }
            ast::Definition::ObjectTypeDefinition(object) => {
                self.declared_types.insert(object.name.as_str());
                self.object(&object.name, &object.directives, &object.fields);
            }
            ast::Definition::ObjectTypeExtension(object) => {
                self.object(&object.name, &object.directives, &object.fields);
            }
            ast::Definition::InterfaceTypeDefinition(interface) => {
                self.declared_types.insert(interface.name.as_str());
                self.applied(&interface.directives);
                self.fields(&interface.fields);
            }
            ast::Definition::InterfaceTypeExtension(interface) => {
                self.applied(&interface.directives);
                self.fields(&interface.fields);
            }
            ast::Definition::UnionTypeDefinition(union_) => {
                self.declared_types.insert(union_.name.as_str());
                self.applied(&union_.directives);
            }
            ast::Definition::UnionTypeExtension(union_) => {
                self.applied(&union_.directives);
            }
            ast::Definition::EnumTypeDefinition(enum_) => {
                self.declared_types.insert(enum_.name.as_str());
                self.applied(&enum_.directives);
                for value in &enum_.values {
                    self.applied(&value.directives);
                }
            }
            ast::Definition::EnumTypeExtension(enum_) => {
                self.applied(&enum_.directives);
                for value in &enum_.values {
                    self.applied(&value.directives);
                }
            }
            ast::Definition::InputObjectTypeDefinition(input) => {
                self.declared_types.insert(input.name.as_str());
                self.applied(&input.directives);
                for field in &input.fields {
                    self.applied(&field.directives);
                }
            }
            ast::Definition::InputObjectTypeExtension(input) => {
                self.applied(&input.directives);
                for field in &input.fields {
                    self.applied(&field.directives);
                }
            }
            ast::Definition::OperationDefinition(_) | ast::Definition::FragmentDefinition(_) => {}
        }
    }

    fn roots(&mut self, root_operations: &'doc [Node<(OperationType, ast::NamedType)>]) {
        for root in root_operations {
            let (operation_type, name) = &**root;
            if *operation_type == OperationType::Query {
                self.query_root = Some(name.as_str());
            }
        }
    }

    fn object(
        &mut self,
        name: &'doc Name,
        directives: &'doc ast::DirectiveList,
        fields: &'doc [Node<ast::FieldDefinition>],
    ) {
        self.applied(directives);
        self.fields(fields);
        if directives.iter().any(|directive| is_key(&directive.name)) {
            self.entities.insert(name.as_str());
        }
    }

    fn fields(&mut self, fields: &'doc [Node<ast::FieldDefinition>]) {
        for field in fields {
            self.applied(&field.directives);
            for argument in &field.arguments {
                self.applied(&argument.directives);
            }
        }
    }

    fn applied(&mut self, directives: &'doc ast::DirectiveList) {
        for directive in directives.iter() {
            let arguments = self
                .applied_directives
                .entry(directive.name.as_str())
                .or_default();
            arguments.extend(directive.arguments.iter().map(|argument| argument.name.as_str()));
        }
    }
}

fn is_key(directive: &str) -> bool {
    directive == "key" || directive.ends_with("__key")
}

/// Render the definitions missing from a subgraph document.
///
/// Returns an empty string when the document is already complete.
pub(crate) fn supplement(document: &ast::Document) -> String {
    let inventory = Inventory::take(document);
    let query_root = inventory.query_root.unwrap_or("Query");
    let query_fields = document.definitions.iter().filter_map(|definition| match definition {
        ast::Definition::ObjectTypeDefinition(object) if object.name.as_str() == query_root => {
            Some(&object.fields)
        }
        ast::Definition::ObjectTypeExtension(object) if object.name.as_str() == query_root => {
            Some(&object.fields)
        }
        _ => None,
    });
    let mut query_exists = false;
    let mut existing_query_fields = HashSet::new();
    for fields in query_fields {
        query_exists = true;
        existing_query_fields.extend(fields.iter().map(|field| field.name.as_str()));
    }

    let mut lines = Vec::new();
    if !inventory.declared_types.contains(ANY_SCALAR) {
        lines.push(format!("scalar {ANY_SCALAR}"));
    }
    if !inventory.declared_types.contains(SERVICE_TYPE) {
        lines.push(format!("type {SERVICE_TYPE} {{ sdl: String }}"));
    }
    let has_entities = !inventory.entities.is_empty();
    if has_entities && !inventory.declared_types.contains(ENTITY_UNION) {
        let members = inventory
            .entities
            .iter()
            .copied()
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(format!("union {ENTITY_UNION} = {members}"));
    }

    for (name, arguments) in &inventory.applied_directives {
        if BUILT_IN_DIRECTIVES.contains(name) || inventory.declared_directives.contains(name) {
            continue;
        }
        let arguments = if arguments.is_empty() {
            String::new()
        } else {
            let arguments = arguments
                .iter()
                .map(|argument| format!("{argument}: {ANY_SCALAR}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({arguments})")
        };
        lines.push(format!(
            "directive @{name}{arguments} repeatable on {TYPE_SYSTEM_LOCATIONS}"
        ));
    }

    let mut root_fields = Vec::new();
    if has_entities && !existing_query_fields.contains(ENTITIES_FIELD) {
        root_fields.push(format!(
            "{ENTITIES_FIELD}(representations: [{ANY_SCALAR}!]!): [{ENTITY_UNION}]!"
        ));
    }
    if !existing_query_fields.contains(SERVICE_FIELD) {
        root_fields.push(format!("{SERVICE_FIELD}: {SERVICE_TYPE}!"));
    }
    if !root_fields.is_empty() {
        let keyword = if query_exists { "extend type" } else { "type" };
        lines.push(format!("{keyword} {query_root} {{"));
        lines.extend(root_fields.into_iter().map(|field| format!("  {field}")));
        lines.push("}".to_string());
    }

    let out: String = lines.into_iter().map(|line| line + "\n").collect();
    if !out.is_empty() {
        tracing::debug!(supplement = %out, "augmenting subgraph schema");
    }
    out
}

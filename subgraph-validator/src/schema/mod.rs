//! The type definition table of a subgraph.
//!
//! A [`SubgraphSchema`] is built once per subgraph and then shared by every operation compiled
//! against it. Building happens in two phases: every definition and extension of the document is
//! collected first, then extensions are merged into their base definitions, so the order in which
//! they appear in the SDL does not matter.

use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::OperationType;
use apollo_compiler::validation::Valid;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::error::SchemaError;
use crate::validator::ScalarCoercion;

mod federation;
mod merge;

pub use merge::CompositeType;
pub use merge::UnionType;
use merge::Collected;

const SUBGRAPH_PATH: &str = "subgraph.graphql";
const BUILT_IN_SCALARS: [&str; 5] = ["String", "ID", "Int", "Float", "Boolean"];

/// A parent type that a selection set may be applied to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ParentType<'schema> {
    Object(&'schema CompositeType),
    Interface(&'schema CompositeType),
    Union(&'schema UnionType),
}

/// A validated subgraph schema along with the definitions needed to compile operations.
#[derive(Debug)]
pub struct SubgraphSchema {
    schema: Valid<Schema>,
    scalars: IndexMap<String, ScalarCoercion>,
    enums: IndexMap<String, IndexSet<String>>,
    interfaces: IndexMap<String, CompositeType>,
    object_types: IndexMap<String, CompositeType>,
    unions: IndexMap<String, UnionType>,
}

#[derive(Default)]
struct Definitions {
    scalars: Vec<String>,
    enums: Vec<(String, Vec<String>)>,
    interfaces: Collected<CompositeType>,
    object_types: Collected<CompositeType>,
    unions: Collected<UnionType>,
}

impl Definitions {
    fn collect(document: &ast::Document) -> Self {
        let mut definitions = Self::default();
        for definition in &document.definitions {
            match definition {
                ast::Definition::ScalarTypeDefinition(scalar) => {
                    definitions.scalars.push(scalar.name.to_string());
                }
                ast::Definition::ScalarTypeExtension(scalar) => {
                    definitions.scalars.push(scalar.name.to_string());
                }
                ast::Definition::EnumTypeDefinition(enum_) => definitions.enums.push((
                    enum_.name.to_string(),
                    enum_.values.iter().map(|value| value.value.to_string()).collect(),
                )),
                ast::Definition::EnumTypeExtension(enum_) => definitions.enums.push((
                    enum_.name.to_string(),
                    enum_.values.iter().map(|value| value.value.to_string()).collect(),
                )),
                ast::Definition::ObjectTypeDefinition(object) => {
                    definitions.object_types.definitions.push(CompositeType::from_ast(
                        &object.name,
                        &object.implements_interfaces,
                        &object.fields,
                    ));
                }
                ast::Definition::ObjectTypeExtension(object) => {
                    definitions.object_types.extensions.push(CompositeType::from_ast(
                        &object.name,
                        &object.implements_interfaces,
                        &object.fields,
                    ));
                }
                ast::Definition::InterfaceTypeDefinition(interface) => {
                    definitions.interfaces.definitions.push(CompositeType::from_ast(
                        &interface.name,
                        &interface.implements_interfaces,
                        &interface.fields,
                    ));
                }
                ast::Definition::InterfaceTypeExtension(interface) => {
                    definitions.interfaces.extensions.push(CompositeType::from_ast(
                        &interface.name,
                        &interface.implements_interfaces,
                        &interface.fields,
                    ));
                }
                ast::Definition::UnionTypeDefinition(union_) => {
                    definitions
                        .unions
                        .definitions
                        .push(UnionType::from_ast(&union_.name, &union_.members));
                }
                ast::Definition::UnionTypeExtension(union_) => {
                    definitions
                        .unions
                        .extensions
                        .push(UnionType::from_ast(&union_.name, &union_.members));
                }
                _ => {}
            }
        }
        definitions
    }
}

impl SubgraphSchema {
    /// Parse, augment and validate subgraph SDL.
    pub fn parse(sdl: &str) -> Result<Self, SchemaError> {
        let document = ast::Document::parse(sdl, SUBGRAPH_PATH)
            .map_err(|invalid| SchemaError::Parse(invalid.errors.into()))?;
        let supplement = federation::supplement(&document);
        let (source, document) = if supplement.is_empty() {
            (sdl.to_string(), document)
        } else {
            let source = format!("{sdl}\n{supplement}");
            let document = ast::Document::parse(source.as_str(), SUBGRAPH_PATH)
                .map_err(|invalid| SchemaError::Parse(invalid.errors.into()))?;
            (source, document)
        };

        let schema = Schema::builder()
            .adopt_orphan_extensions()
            .parse(source, SUBGRAPH_PATH)
            .build()
            .map_err(|invalid| SchemaError::Validate(invalid.errors.into()))?
            .validate()
            .map_err(|invalid| SchemaError::Validate(invalid.errors.into()))?;

        let definitions = Definitions::collect(&document);

        let mut scalars: IndexMap<String, ScalarCoercion> = BUILT_IN_SCALARS
            .iter()
            .map(|name| (name.to_string(), ScalarCoercion::for_scalar(name)))
            .collect();
        for name in definitions.scalars {
            let coercion = ScalarCoercion::for_scalar(&name);
            scalars.entry(name).or_insert(coercion);
        }

        let mut enums: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for (name, values) in definitions.enums {
            enums.entry(name).or_default().extend(values);
        }

        let subgraph = Self {
            schema,
            scalars,
            enums,
            interfaces: merge::merge(definitions.interfaces),
            object_types: merge::merge(definitions.object_types),
            unions: merge::merge(definitions.unions),
        };
        tracing::debug!(
            object_types = subgraph.object_types.len(),
            interfaces = subgraph.interfaces.len(),
            unions = subgraph.unions.len(),
            enums = subgraph.enums.len(),
            "built subgraph type definition table"
        );
        Ok(subgraph)
    }

    /// The validated schema, augmented with the federation surface.
    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    /// Name of the root type of an operation kind, if the schema defines one.
    pub fn root_type(&self, operation_type: OperationType) -> Option<&str> {
        self.schema
            .root_operation(operation_type)
            .map(|name| name.as_str())
    }

    pub fn scalar(&self, name: &str) -> Option<&ScalarCoercion> {
        self.scalars.get(name)
    }

    pub fn enum_values(&self, name: &str) -> Option<&IndexSet<String>> {
        self.enums.get(name)
    }

    pub fn object_type(&self, name: &str) -> Option<&CompositeType> {
        self.object_types.get(name)
    }

    pub fn interface(&self, name: &str) -> Option<&CompositeType> {
        self.interfaces.get(name)
    }

    pub fn union(&self, name: &str) -> Option<&UnionType> {
        self.unions.get(name)
    }

    /// Resolve a type that takes a selection set. Interfaces are looked up first.
    pub(crate) fn parent_type(&self, name: &str) -> Option<ParentType<'_>> {
        self.interfaces
            .get(name)
            .map(ParentType::Interface)
            .or_else(|| self.object_types.get(name).map(ParentType::Object))
            .or_else(|| self.unions.get(name).map(ParentType::Union))
    }

    /// Resolve the target of a type condition inside an abstract selection.
    pub(crate) fn fragment_type(&self, name: &str) -> Option<&CompositeType> {
        self.object_types
            .get(name)
            .or_else(|| self.interfaces.get(name))
    }

    /// Every `__typename` a value of this interface may carry: the interface itself and the
    /// object types implementing it.
    pub(crate) fn possible_typenames(&self, interface: &CompositeType) -> IndexSet<String> {
        std::iter::once(interface.name.clone())
            .chain(
                self.object_types
                    .values()
                    .filter(|object| object.implements(&interface.name))
                    .map(|object| object.name.clone()),
            )
            .collect()
    }

    /// Whether a fragment with the given type condition applies to values of an object type.
    pub(crate) fn condition_applies_to_object(
        &self,
        object: &CompositeType,
        type_condition: &str,
    ) -> bool {
        object.name == type_condition
            || object.implements(type_condition)
            || self
                .unions
                .get(type_condition)
                .is_some_and(|union_| union_.members.contains(&object.name))
    }
}

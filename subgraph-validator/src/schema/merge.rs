//! Merging of type extensions into their base definitions.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use indexmap::IndexMap;
use indexmap::IndexSet;

/// An object type or an interface, once its extensions have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub name: String,
    pub implements_interfaces: IndexSet<String>,
    pub fields: IndexMap<String, ast::Type>,
}

/// A union, once its extensions have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    pub name: String,
    pub members: IndexSet<String>,
}

/// Definitions of one kind collected from a document, extensions kept apart.
#[derive(Debug)]
pub(crate) struct Collected<T> {
    pub(crate) definitions: Vec<T>,
    pub(crate) extensions: Vec<T>,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

pub(crate) trait Extendable {
    fn name(&self) -> &str;

    /// Apply an extension. On a name collision the base definition wins.
    fn absorb(&mut self, extension: Self);
}

impl CompositeType {
    pub(crate) fn from_ast(
        name: &Name,
        implements_interfaces: &[Name],
        fields: &[Node<ast::FieldDefinition>],
    ) -> Self {
        let mut composite = Self {
            name: name.to_string(),
            implements_interfaces: implements_interfaces
                .iter()
                .map(|name| name.to_string())
                .collect(),
            fields: IndexMap::with_capacity(fields.len()),
        };
        for field in fields {
            composite
                .fields
                .entry(field.name.to_string())
                .or_insert_with(|| field.ty.clone());
        }
        composite
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.implements_interfaces.contains(interface)
    }
}

impl UnionType {
    pub(crate) fn from_ast(name: &Name, members: &[Name]) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(|member| member.to_string()).collect(),
        }
    }
}

impl Extendable for CompositeType {
    fn name(&self) -> &str {
        &self.name
    }

    fn absorb(&mut self, extension: Self) {
        self.implements_interfaces
            .extend(extension.implements_interfaces);
        for (name, ty) in extension.fields {
            self.fields.entry(name).or_insert(ty);
        }
    }
}

impl Extendable for UnionType {
    fn name(&self) -> &str {
        &self.name
    }

    fn absorb(&mut self, extension: Self) {
        self.members.extend(extension.members);
    }
}

/// Produce the final table of one kind of definitions.
///
/// Extensions without a base definition become the base definition. Directives are not part of
/// the merged definitions since they do not affect the shape of responses.
pub(crate) fn merge<T: Extendable>(collected: Collected<T>) -> IndexMap<String, T> {
    let mut merged: IndexMap<String, T> = IndexMap::with_capacity(collected.definitions.len());
    for definition in collected.definitions {
        merged.insert(definition.name().to_string(), definition);
    }
    for extension in collected.extensions {
        match merged.get_mut(extension.name()) {
            Some(definition) => definition.absorb(extension),
            None => {
                merged.insert(extension.name().to_string(), extension);
            }
        }
    }
    merged
}

use std::collections::HashSet;

use apollo_compiler::ast;

use super::OperationCompiler;
use super::RECURSION_LIMIT;
use super::SELECTION_LIMIT;
use crate::error::OperationError;
use crate::schema::CompositeType;
use crate::schema::ParentType;
use crate::schema::UnionType;
use crate::validator::DiscriminatedShape;
use crate::validator::ObjectShape;
use crate::validator::ScalarCoercion;
use crate::validator::TYPENAME;
use crate::validator::Validator;

/// A fragment that does not apply unconditionally to the parent type.
struct ConditionalFragment<'doc> {
    type_condition: &'doc str,
    selection_set: &'doc [ast::Selection],
}

/// Selections of one level, with unconditional fragments flattened and named spreads resolved.
#[derive(Default)]
struct Partitioned<'doc> {
    fields: Vec<&'doc ast::Field>,
    fragments: Vec<ConditionalFragment<'doc>>,
}

fn response_key(field: &ast::Field) -> &str {
    field.alias.as_ref().unwrap_or(&field.name).as_str()
}

fn check_depth(depth: usize) -> Result<(), OperationError> {
    if depth > RECURSION_LIMIT {
        tracing::error!("selection processing recursion limit({RECURSION_LIMIT}) exceeded");
        return Err(OperationError::RecursionLimitExceeded);
    }
    Ok(())
}

impl<'doc> OperationCompiler<'_, 'doc> {
    pub(super) fn selection_set(
        &self,
        selections: &'doc [ast::Selection],
        parent: ParentType<'_>,
        depth: usize,
    ) -> Result<Validator, OperationError> {
        check_depth(depth)?;
        match parent {
            ParentType::Object(object) => self
                .object_selections(selections, object, depth)
                .map(Validator::from),
            ParentType::Interface(interface) => {
                self.interface_selections(selections, interface, depth)
            }
            ParentType::Union(union_) => self.union_selections(selections, union_, depth),
        }
    }

    /// Split a selection set into fields and conditional fragments.
    ///
    /// Named fragment spreads are handled like the equivalent inline fragment, and a fragment
    /// spread more than once on the same level is expanded once. Fragments without a type
    /// condition, or whose condition `applies` to the parent, are merged into the fields.
    fn partition(
        &self,
        selections: &'doc [ast::Selection],
        applies: &dyn Fn(&str) -> bool,
        depth: usize,
    ) -> Result<Partitioned<'doc>, OperationError> {
        let mut partitioned = Partitioned::default();
        let mut spread = HashSet::new();
        self.partition_into(selections, applies, depth, &mut spread, &mut partitioned)?;
        Ok(partitioned)
    }

    fn partition_into(
        &self,
        selections: &'doc [ast::Selection],
        applies: &dyn Fn(&str) -> bool,
        depth: usize,
        spread: &mut HashSet<&'doc str>,
        partitioned: &mut Partitioned<'doc>,
    ) -> Result<(), OperationError> {
        check_depth(depth)?;
        for selection in selections {
            self.count_selection()?;
            let (fragment_name, type_condition, selection_set) = match selection {
                ast::Selection::Field(field) => {
                    partitioned.fields.push(field);
                    continue;
                }
                ast::Selection::InlineFragment(inline) => (
                    None,
                    inline.type_condition.as_ref().map(|name| name.as_str()),
                    inline.selection_set.as_slice(),
                ),
                ast::Selection::FragmentSpread(fragment_spread) => {
                    let fragment = self
                        .fragments
                        .get(fragment_spread.fragment_name.as_str())
                        .copied()
                        .ok_or_else(|| {
                            OperationError::UnknownFragment(
                                fragment_spread.fragment_name.to_string(),
                            )
                        })?;
                    if spread.contains(fragment.name.as_str()) {
                        continue;
                    }
                    (
                        Some(fragment.name.as_str()),
                        Some(fragment.type_condition.as_str()),
                        fragment.selection_set.as_slice(),
                    )
                }
            };
            match type_condition {
                Some(type_condition) if !applies(type_condition) => {
                    partitioned.fragments.push(ConditionalFragment {
                        type_condition,
                        selection_set,
                    });
                }
                _ => self.partition_into(selection_set, applies, depth + 1, spread, partitioned)?,
            }
            // Marked once expanded: a fragment spreading itself still recurses into the limit.
            if let Some(fragment_name) = fragment_name {
                spread.insert(fragment_name);
            }
        }
        Ok(())
    }

    /// Count a visited selection against the limit of the whole operation.
    fn count_selection(&self) -> Result<(), OperationError> {
        let visited = self.visited_selections.get() + 1;
        if visited > SELECTION_LIMIT {
            tracing::error!("selection processing limit({SELECTION_LIMIT}) exceeded");
            return Err(OperationError::SelectionLimitExceeded);
        }
        self.visited_selections.set(visited);
        Ok(())
    }

    /// Object types never produce a discriminated union: fragments that apply are flattened, and
    /// fragments on other types can never match and are skipped.
    pub(super) fn object_selections(
        &self,
        selections: &'doc [ast::Selection],
        object: &CompositeType,
        depth: usize,
    ) -> Result<ObjectShape, OperationError> {
        let applies = |type_condition: &str| {
            self.schema
                .condition_applies_to_object(object, type_condition)
        };
        let partitioned = self.partition(selections, &applies, depth)?;

        let mut shape = ObjectShape::new();
        for field in partitioned.fields {
            let validator = if field.name.as_str() == TYPENAME {
                Validator::scalar(ScalarCoercion::Typename(object.name.clone()))
            } else {
                self.field_selection(field, object, depth)?
            };
            shape.insert(response_key(field), validator);
        }
        Ok(shape)
    }

    fn interface_selections(
        &self,
        selections: &'doc [ast::Selection],
        interface: &CompositeType,
        depth: usize,
    ) -> Result<Validator, OperationError> {
        let applies = |type_condition: &str| {
            type_condition == interface.name || interface.implements(type_condition)
        };
        let partitioned = self.partition(selections, &applies, depth)?;

        let mut shared = ObjectShape::new();
        for field in partitioned.fields {
            let validator = if field.name.as_str() == TYPENAME {
                Validator::EnumMember(self.schema.possible_typenames(interface))
            } else {
                self.field_selection(field, interface, depth)?
            };
            shared.insert(response_key(field), validator);
        }
        if partitioned.fragments.is_empty() {
            return Ok(shared.into());
        }

        let mut variants = DiscriminatedShape::new();
        for fragment in partitioned.fragments {
            let mut variant = ObjectShape::new();
            variant.insert(TYPENAME, Validator::enum_member([fragment.type_condition]));
            for (key, validator) in shared.fields() {
                // The variant's own discriminator is narrower than the interface-wide one.
                if key != TYPENAME {
                    variant.insert(key, validator.clone());
                }
            }
            variant.merge(self.fragment_selections(&fragment, depth)?);
            variants.insert(fragment.type_condition, variant);
        }
        Ok(variants.into())
    }

    fn union_selections(
        &self,
        selections: &'doc [ast::Selection],
        union_: &UnionType,
        depth: usize,
    ) -> Result<Validator, OperationError> {
        let applies = |type_condition: &str| type_condition == union_.name;
        let partitioned = self.partition(selections, &applies, depth)?;

        let mut shared = ObjectShape::new();
        for field in partitioned.fields {
            if field.name.as_str() != TYPENAME {
                return Err(OperationError::UnknownField {
                    type_name: union_.name.clone(),
                    field: field.name.to_string(),
                });
            }
            shared.insert(
                response_key(field),
                Validator::EnumMember(union_.members.clone()),
            );
        }
        if partitioned.fragments.is_empty() {
            return Ok(shared.into());
        }

        let mut variants = DiscriminatedShape::new();
        for fragment in partitioned.fragments {
            let mut variant = ObjectShape::new();
            variant.insert(TYPENAME, Validator::enum_member([fragment.type_condition]));
            variant.merge(self.fragment_selections(&fragment, depth)?);
            variants.insert(fragment.type_condition, variant);
        }
        Ok(variants.into())
    }

    /// Fields of a fragment narrowing an abstract type, compiled as a selection on the narrower
    /// type.
    fn fragment_selections(
        &self,
        fragment: &ConditionalFragment<'doc>,
        depth: usize,
    ) -> Result<ObjectShape, OperationError> {
        let fragment_type = self
            .schema
            .fragment_type(fragment.type_condition)
            .ok_or_else(|| OperationError::UnresolvedType(fragment.type_condition.to_string()))?;
        self.object_selections(fragment.selection_set, fragment_type, depth + 1)
    }
}

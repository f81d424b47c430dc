use apollo_compiler::ast;

use super::OperationCompiler;
use crate::error::OperationError;
use crate::schema::CompositeType;
use crate::validator::Validator;

impl<'doc> OperationCompiler<'_, 'doc> {
    /// Validator of a field selected on a parent object type or interface.
    pub(super) fn field_selection(
        &self,
        field: &'doc ast::Field,
        parent: &CompositeType,
        depth: usize,
    ) -> Result<Validator, OperationError> {
        let ty = parent
            .fields
            .get(field.name.as_str())
            .ok_or_else(|| OperationError::UnknownField {
                type_name: parent.name.clone(),
                field: field.name.to_string(),
            })?;
        self.field_type(ty, field, depth)
    }

    /// Translate a field's declared type. Every layer without a non-null wrapper accepts null.
    fn field_type(
        &self,
        ty: &ast::Type,
        field: &'doc ast::Field,
        depth: usize,
    ) -> Result<Validator, OperationError> {
        Ok(match ty {
            ast::Type::Named(name) => self.named_type(name, field, depth)?.nullable(),
            ast::Type::NonNullNamed(name) => self.named_type(name, field, depth)?,
            ast::Type::List(item) => Validator::list(self.field_type(item, field, depth)?).nullable(),
            ast::Type::NonNullList(item) => Validator::list(self.field_type(item, field, depth)?),
        })
    }

    fn named_type(
        &self,
        name: &str,
        field: &'doc ast::Field,
        depth: usize,
    ) -> Result<Validator, OperationError> {
        if let Some(coercion) = self.schema.scalar(name) {
            return Ok(Validator::scalar(coercion.clone()));
        }
        if let Some(values) = self.schema.enum_values(name) {
            return Ok(Validator::EnumMember(values.clone()));
        }
        let parent = self
            .schema
            .parent_type(name)
            .ok_or_else(|| OperationError::UnresolvedType(name.to_string()))?;
        if field.selection_set.is_empty() {
            return Err(OperationError::MissingSelectionSet {
                type_name: name.to_string(),
                field: field.name.to_string(),
            });
        }
        self.selection_set(&field.selection_set, parent, depth + 1)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::SubgraphValidator;
    use crate::error::OperationError;

    const SDL: &str = r#"
        type Query {
          a: Int
          b: Int!
          c: [Int]
          d: [Int!]
          e: [Int]!
          f: [Int!]!
          g: [[String!]]
        }
    "#;

    fn validate(operation: &str, data: serde_json::Value) -> serde_json::Value {
        let validator = SubgraphValidator::new(SDL).unwrap();
        validator
            .operation_validator(operation)
            .unwrap()
            .validate(&data)
            .unwrap()
    }

    #[test]
    fn nullability_follows_wrappers() {
        assert_eq!(
            validate(
                "{ a b c d e f }",
                json!({"a": null, "b": null, "c": null, "d": [1], "e": [null], "f": [2]})
            ),
            json!({"a": null, "b": 0, "c": null, "d": [1], "e": [null], "f": [2]})
        );
    }

    #[test]
    fn nested_lists() {
        assert_eq!(
            validate("{ g }", json!({"g": [["x", null], null]})),
            json!({"g": [["x", "null"], null]})
        );
    }

    #[test]
    fn non_null_list_rejects_null() {
        let validator = SubgraphValidator::new(SDL).unwrap();
        let failure = validator
            .operation_validator("{ e }")
            .unwrap()
            .validate(&json!({"e": null}))
            .unwrap_err();
        assert_eq!(failure.issues[0].to_string(), "e: Expected array, received null");
    }

    #[test]
    fn unknown_fields_are_errors() {
        let validator = SubgraphValidator::new(SDL).unwrap();
        assert!(matches!(
            validator.operation_validator("{ z }"),
            Err(OperationError::UnknownField { type_name, field }) if type_name == "Query" && field == "z"
        ));
    }
}

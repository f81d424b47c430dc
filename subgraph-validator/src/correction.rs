//! Validation of generated data with a bounded self-correction round.
//!
//! Generated data that fails validation is sent back to the generator along with the list of
//! issues. The corrected data is validated again, but never corrected a second time: once the
//! ceiling is reached the best available value is returned, valid or not.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BoxError;
use crate::error::GenerationError;
use crate::formatter::parse_generated_text;
use crate::formatter::to_pretty_string;
use crate::validator::Issue;
use crate::validator::Validator;

/// Generation calls allowed per request, the initial one included.
pub const MAX_ATTEMPTS: usize = 2;

const DATA: &str = "data";

/// Produces text from a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, BoxError>;
}

/// How a validation round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The data validated, possibly after coercion.
    Accepted,
    /// No validator exists for the service.
    Unvalidated,
    /// Validation failed without reporting a single issue to correct.
    GivenUp,
    /// The data still failed validation once the correction ceiling was reached.
    Exhausted,
    /// The correction request failed or returned unparsable text.
    GenerationFailed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Accepted => "accepted",
            Outcome::Unvalidated => "unvalidated",
            Outcome::GivenUp => "given_up",
            Outcome::Exhausted => "exhausted",
            Outcome::GenerationFailed => "generation_failed",
        })
    }
}

/// Result of [`correct`].
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub data: Value,
    pub outcome: Outcome,
    /// Number of correction requests sent to the generator.
    pub corrections: usize,
}

impl Correction {
    pub(crate) fn unvalidated(data: Value) -> Self {
        Self {
            data: unwrap_data(data),
            outcome: Outcome::Unvalidated,
            corrections: 0,
        }
    }
}

/// Prompt asking for mock data fulfilling an operation.
pub fn mock_prompt(operation: &str, variables: Option<&Value>) -> String {
    let mut prompt =
        format!("Give me mock data that fulfills this query:\n```graphql\n{operation}\n```");
    let variables = variables.filter(|variables| match variables {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    });
    if let Some(variables) = variables {
        prompt.push_str(&format!(
            "\n\nWith variables:\n```json\n{}\n```",
            to_pretty_string(variables)
        ));
    }
    prompt
}

/// Prompt asking the generator to fix the issues found in a value.
pub fn correction_prompt(data: &Value, issues: &[Issue]) -> String {
    let issues = issues
        .iter()
        .map(|issue| format!("{} is the wrong type. {}.", issue.dotted_path(), issue.message))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Return this data:\n```json\n{}\n```\n\nwith the following errors fixed:\n{issues}",
        to_pretty_string(data)
    )
}

/// Ask the generator for a value and parse it.
pub async fn generate(generator: &dyn Generator, prompt: &str) -> Result<Value, GenerationError> {
    let text = generator
        .generate(prompt)
        .await
        .map_err(GenerationError::Generator)?;
    tracing::debug!(text = %text, "generator response");
    parse_generated_text(&text).map_err(GenerationError::MalformedOutput)
}

/// Remove the `data` envelope generators sometimes wrap their output in.
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut object) if object.get(DATA).is_some_and(|data| !data.is_null()) => {
            object.remove(DATA).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Like [`correct`], passing the data through unvalidated when there is no validator.
pub async fn correct_with(
    validator: Option<&Validator>,
    data: Value,
    generator: &dyn Generator,
) -> Correction {
    match validator {
        Some(validator) => correct(validator, data, generator).await,
        None => {
            tracing::debug!("no validator registered, skipping validation");
            Correction::unvalidated(data)
        }
    }
}

/// Validate generated data, asking the generator to correct it at most once.
pub async fn correct(validator: &Validator, data: Value, generator: &dyn Generator) -> Correction {
    let mut candidate = unwrap_data(data);
    let mut attempts = 1;
    loop {
        let failure = match validator.validate(&candidate) {
            Ok(data) => {
                tracing::info!(attempts, "generated data is valid");
                return Correction {
                    data,
                    outcome: Outcome::Accepted,
                    corrections: attempts - 1,
                };
            }
            Err(failure) => failure,
        };
        tracing::info!(attempts, issues = failure.issues.len(), "generated data is invalid");
        tracing::debug!(%failure);

        let outcome = if failure.issues.is_empty() {
            Some(Outcome::GivenUp)
        } else if attempts >= MAX_ATTEMPTS {
            Some(Outcome::Exhausted)
        } else {
            None
        };
        if let Some(outcome) = outcome {
            return Correction {
                data: candidate,
                outcome,
                corrections: attempts - 1,
            };
        }

        let prompt = correction_prompt(&candidate, &failure.issues);
        match generate(generator, &prompt).await {
            Ok(corrected) => candidate = unwrap_data(corrected),
            Err(error) => {
                tracing::warn!(%error, "correction request failed");
                return Correction {
                    data: candidate,
                    outcome: Outcome::GenerationFailed,
                    corrections: attempts,
                };
            }
        }
        attempts += 1;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::validator::PathElement;

    #[test]
    fn correction_prompt_lists_issues() {
        let issues = vec![
            Issue {
                path: vec![PathElement::Key("book".into()), PathElement::Key("pages".into())],
                message: "Expected number, received nan".into(),
            },
            Issue {
                path: vec![
                    PathElement::Key("book".into()),
                    PathElement::Key("ratings".into()),
                    PathElement::Index(1),
                ],
                message: "Required".into(),
            },
        ];
        insta::assert_snapshot!(
            correction_prompt(&json!({"book": {"pages": "many"}}), &issues),
            @r###"
        Return this data:
        ```json
        {
          "book": {
            "pages": "many"
          }
        }
        ```

        with the following errors fixed:
        book.pages is the wrong type. Expected number, received nan.
        book.ratings.1 is the wrong type. Required.
        "###
        );
    }

    #[test]
    fn mock_prompt_includes_variables() {
        assert_eq!(
            mock_prompt("{ bookTitle }", None),
            "Give me mock data that fulfills this query:\n```graphql\n{ bookTitle }\n```"
        );
        assert_eq!(mock_prompt("{ bookTitle }", Some(&json!({}))), mock_prompt("{ bookTitle }", None));
        assert_eq!(
            mock_prompt("query($id: ID!) { book(id: $id) { title } }", Some(&json!({"id": "1"}))),
            "Give me mock data that fulfills this query:\n```graphql\nquery($id: ID!) { book(id: $id) { title } }\n```\n\nWith variables:\n```json\n{\n  \"id\": \"1\"\n}\n```"
        );
    }

    #[test]
    fn data_envelope_is_optional() {
        assert_eq!(unwrap_data(json!({"data": {"a": 1}})), json!({"a": 1}));
        assert_eq!(unwrap_data(json!({"a": 1})), json!({"a": 1}));
        assert_eq!(unwrap_data(json!({"data": null})), json!({"data": null}));
    }
}

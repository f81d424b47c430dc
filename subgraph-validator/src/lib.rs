//! Validation of generated GraphQL response data against subgraph schemas.
//!
//! A [`SubgraphValidator`] is built from the SDL of a subgraph. Every operation sent to that
//! subgraph compiles into a [`Validator`] describing the exact shape of its response data, which
//! checks and coerces values produced by an untrusted [`Generator`]. The [`correction`] module
//! drives a single round of generator-side repair when validation fails.
//!
//! ```
//! use serde_json::json;
//! use subgraph_validator::SubgraphValidator;
//!
//! let subgraph = SubgraphValidator::new("type Query { bookTitle: String }").unwrap();
//! let validator = subgraph.operation_validator("{ bookTitle }").unwrap();
//! assert_eq!(
//!     validator.validate(&json!({ "bookTitle": "The Martian" })).unwrap(),
//!     json!({ "bookTitle": "The Martian" }),
//! );
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing,
    )
)]

mod compile;
pub mod correction;
mod document;
pub mod error;
pub mod formatter;
mod registry;
pub mod schema;
pub mod validator;

pub use correction::Correction;
pub use correction::Generator;
pub use correction::Outcome;
pub use document::add_typename_to_document;
pub use document::normalize_operation;
pub use error::GenerationError;
pub use error::OperationError;
pub use error::SchemaError;
pub use error::ValidationFailure;
pub use registry::SubgraphValidator;
pub use registry::SubgraphValidators;
pub use validator::Validator;

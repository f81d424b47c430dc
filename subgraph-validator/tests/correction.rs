use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use subgraph_validator::Generator;
use subgraph_validator::Outcome;
use subgraph_validator::SubgraphValidator;
use subgraph_validator::correction;
use subgraph_validator::error::BoxError;

/// Replies with canned texts in order, then fails.
#[derive(Default)]
struct StubGenerator {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn replying(replies: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "no more replies".into())
    }
}

/// Always replies with the same invalid data.
struct StubbornGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl Generator for StubbornGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("```json\n{\"data\": {\"book\": {\"pages\": \"many\"}}}\n```".to_string())
    }
}

const SDL: &str = r#"
    type Query {
      book: Book
    }

    type Book {
      title: String!
      pages: Int!
    }
"#;

const OPERATION: &str = "{ book { title pages } }";

fn validator() -> subgraph_validator::Validator {
    SubgraphValidator::new(SDL)
        .unwrap()
        .operation_validator(OPERATION)
        .unwrap()
}

#[tokio::test]
async fn valid_data_is_accepted_without_correction() {
    let generator = StubGenerator::default();
    let correction = correction::correct(
        &validator(),
        json!({"data": {"book": {"title": "Dune", "pages": "412"}}}),
        &generator,
    )
    .await;

    assert_eq!(correction.outcome, Outcome::Accepted);
    assert_eq!(correction.corrections, 0);
    assert_eq!(correction.data, json!({"book": {"title": "Dune", "pages": 412}}));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn invalid_data_is_corrected_once() {
    let generator = StubGenerator::replying([
        "```json\n{\"book\": {\"title\": \"Dune\", \"pages\": 412}}\n```",
    ]);
    let correction = correction::correct(
        &validator(),
        json!({"book": {"title": "Dune", "pages": "many"}}),
        &generator,
    )
    .await;

    assert_eq!(correction.outcome, Outcome::Accepted);
    assert_eq!(correction.corrections, 1);
    assert_eq!(correction.data, json!({"book": {"title": "Dune", "pages": 412}}));

    let prompts = generator.prompts.lock().unwrap();
    insta::assert_snapshot!(prompts[0].as_str(), @r###"
    Return this data:
    ```json
    {
      "book": {
        "title": "Dune",
        "pages": "many"
      }
    }
    ```

    with the following errors fixed:
    book.pages is the wrong type. Expected number, received nan.
    "###);
}

#[tokio::test]
async fn correction_ceiling_is_respected() {
    let generator = StubbornGenerator {
        calls: AtomicUsize::new(0),
    };
    let initial = correction::generate(&generator, "Give me mock data")
        .await
        .unwrap();
    let correction = correction::correct(&validator(), initial, &generator).await;

    assert_eq!(generator.calls.load(Ordering::SeqCst), correction::MAX_ATTEMPTS);
    assert_eq!(correction.outcome, Outcome::Exhausted);
    assert_eq!(correction.data, json!({"book": {"pages": "many"}}));
}

#[tokio::test]
async fn failed_corrections_return_the_current_candidate() {
    let generator = StubGenerator::replying(["I cannot do that."]);
    let original = json!({"book": {"title": "Dune"}});
    let correction = correction::correct(&validator(), original.clone(), &generator).await;

    assert_eq!(correction.outcome, Outcome::GenerationFailed);
    assert_eq!(correction.data, original);
    assert_eq!(generator.calls(), 1);

    let generator = StubGenerator::default();
    let correction = correction::correct(&validator(), original.clone(), &generator).await;
    assert_eq!(correction.outcome, Outcome::GenerationFailed);
    assert_eq!(correction.data, original);
}

#[tokio::test]
async fn generation_errors_are_typed() {
    let generator = StubGenerator::replying(["not json"]);
    assert!(matches!(
        correction::generate(&generator, "prompt").await,
        Err(subgraph_validator::GenerationError::MalformedOutput(_))
    ));
    assert!(matches!(
        correction::generate(&generator, "prompt").await,
        Err(subgraph_validator::GenerationError::Generator(_))
    ));
}

//! Logic for loading configuration in to an object model

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use apollo_federation::Supergraph;
use apollo_federation::error::FederationError;
use apollo_federation::subgraph::ValidSubgraph;
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use subgraph_validator::SchemaError;
use subgraph_validator::SubgraphValidator;
use subgraph_validator::SubgraphValidators;
use thiserror::Error;
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_API_KEY_ENV: &str = "GOOGLE_GENERATIVE_AI_API_KEY";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not read {path}: {error}
    CannotRead {
        path: PathBuf,
        error: std::io::Error,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_yaml::Error),
    /// could not read the generator api key from environment variable {name}: {error}
    CannotReadApiKey {
        name: String,
        error: std::env::VarError,
    },
    /// invalid schema for subgraph {service}: {error}
    InvalidSubgraphSchema { service: String, error: SchemaError },
    /// could not extract subgraphs from the supergraph schema: {0}
    InvalidSupergraph(FederationError),
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4001))
}

fn default_endpoint() -> Url {
    #[allow(clippy::expect_used)]
    Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid url")
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// The configuration for the mocker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// The socket address to listen on for coprocessor requests.
    pub listen: SocketAddr,

    /// Supergraph schema file. Every subgraph it composes gets a validator.
    pub supergraph: Option<PathBuf>,

    /// Subgraph SDL files by service name, taking precedence over subgraphs of the supergraph.
    /// Relative paths are resolved against the directory of the configuration file.
    pub subgraphs: BTreeMap<String, PathBuf>,

    /// Generator settings.
    pub generator: GeneratorConfig,

    /// Add `__typename` to nested selection sets before asking for mock data.
    pub add_typename: bool,
}

/// Configuration of the text generation service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct GeneratorConfig {
    /// Base url of the generative language API.
    pub endpoint: Url,

    /// Model used to generate mock data.
    pub model: String,

    /// Environment variable holding the api key.
    pub api_key_env: String,

    /// Request timeout in human-readable format; defaults to 60s
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            supergraph: None,
            subgraphs: BTreeMap::new(),
            generator: GeneratorConfig::default(),
            add_typename: false,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout: default_timeout(),
        }
    }
}

impl GeneratorConfig {
    /// Read the api key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigurationError> {
        std::env::var(&self.api_key_env).map_err(|error| ConfigurationError::CannotReadApiKey {
            name: self.api_key_env.clone(),
            error,
        })
    }
}

impl Configuration {
    /// Load a configuration file. Subgraph paths are made absolute.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|error| ConfigurationError::CannotRead {
            path: path.to_path_buf(),
            error,
        })?;
        let mut configuration: Configuration = raw.parse()?;
        if let Some(base) = path.parent() {
            configuration.resolve_paths(base);
        }
        Ok(configuration)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in self.supergraph.iter_mut().chain(self.subgraphs.values_mut()) {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Build the validator of every configured subgraph.
    pub fn validators(&self) -> Result<SubgraphValidators, ConfigurationError> {
        let mut validators = SubgraphValidators::new();
        if let Some(path) = &self.supergraph {
            for (service, sdl) in extract_subgraphs(&read(path)?)? {
                validators.insert(service.clone(), subgraph_validator(&service, &sdl)?);
                tracing::info!(service = %service, supergraph = %path.display(), "loaded subgraph schema");
            }
        }
        for (service, path) in &self.subgraphs {
            validators.insert(service.clone(), subgraph_validator(service, &read(path)?)?);
            tracing::info!(service = %service, path = %path.display(), "loaded subgraph schema");
        }
        Ok(validators)
    }
}

fn read(path: &Path) -> Result<String, ConfigurationError> {
    std::fs::read_to_string(path).map_err(|error| ConfigurationError::CannotRead {
        path: path.to_path_buf(),
        error,
    })
}

fn subgraph_validator(service: &str, sdl: &str) -> Result<SubgraphValidator, ConfigurationError> {
    SubgraphValidator::new(sdl).map_err(|error| ConfigurationError::InvalidSubgraphSchema {
        service: service.to_string(),
        error,
    })
}

/// The SDL of every subgraph composed in a supergraph, by subgraph name.
fn extract_subgraphs(supergraph_sdl: &str) -> Result<Vec<(String, String)>, ConfigurationError> {
    let subgraphs = Supergraph::new(supergraph_sdl)
        .and_then(|supergraph| supergraph.extract_subgraphs())
        .map_err(ConfigurationError::InvalidSupergraph)?;
    Ok(subgraphs
        .into_iter()
        .map(|(_, subgraph)| {
            let subgraph = ValidSubgraph::from(subgraph);
            (subgraph.name, subgraph.schema.to_string())
        })
        .collect())
}

impl std::str::FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Configuration::default());
        }
        serde_yaml::from_str(s).map_err(ConfigurationError::DeserializeConfigError)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults() {
        let configuration: Configuration = "".parse().unwrap();
        assert_eq!(configuration, Configuration::default());
        assert_eq!(configuration.listen.to_string(), "127.0.0.1:4001");
        assert_eq!(configuration.generator.model, "gemini-1.5-flash");
        assert_eq!(configuration.generator.timeout, Duration::from_secs(60));
        assert_eq!(
            configuration.generator.endpoint.as_str(),
            "https://generativelanguage.googleapis.com/"
        );
    }

    #[test]
    fn parses_yaml() {
        let configuration: Configuration = r#"
listen: 0.0.0.0:8080
add_typename: true
subgraphs:
  books: schemas/books.graphql
generator:
  model: gemini-2.0-flash
  timeout: 2m 30s
"#
        .parse()
        .unwrap();

        assert_eq!(configuration.listen.to_string(), "0.0.0.0:8080");
        assert!(configuration.add_typename);
        assert_eq!(
            configuration.subgraphs["books"],
            PathBuf::from("schemas/books.graphql")
        );
        assert_eq!(configuration.generator.model, "gemini-2.0-flash");
        assert_eq!(configuration.generator.timeout, Duration::from_secs(150));
        assert_eq!(configuration.generator.api_key_env, DEFAULT_API_KEY_ENV);
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = "listen: 127.0.0.1:4001\nplugins: {}\n"
            .parse::<Configuration>()
            .unwrap_err();
        assert!(matches!(error, ConfigurationError::DeserializeConfigError(_)));
        assert!(error.to_string().contains("unknown field `plugins`"));
    }

    #[test]
    fn loads_subgraphs_relative_to_the_configuration() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("schemas")).unwrap();
        std::fs::write(
            dir.path().join("schemas/books.graphql"),
            "type Query { bookTitle: String }",
        )
        .unwrap();
        let config_path = dir.path().join("mocker.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "subgraphs:\n  books: schemas/books.graphql").unwrap();

        let configuration = Configuration::load(&config_path).unwrap();
        assert_eq!(
            configuration.subgraphs["books"],
            dir.path().join("schemas/books.graphql")
        );
        let validators = configuration.validators().unwrap();
        assert_eq!(validators.services().collect::<Vec<_>>(), vec!["books"]);
    }

    #[test]
    fn demo_configuration_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demo/mocker.yaml");
        let configuration = Configuration::load(&path).unwrap();
        let validators = configuration.validators().unwrap();
        let books = validators.get("books").unwrap();
        assert!(
            books
                .operation_validator("{ search(text: \"dune\") { ... on Book { title } } }")
                .is_ok()
        );
    }

    #[test]
    fn extracts_subgraphs_from_the_supergraph() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demo/supergraph.yaml");
        let configuration = Configuration::load(&path).unwrap();
        assert_eq!(
            configuration.supergraph,
            Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("demo/supergraph.graphql"))
        );

        let validators = configuration.validators().unwrap();
        let mut services = validators.services().collect::<Vec<_>>();
        services.sort_unstable();
        assert_eq!(services, vec!["books", "reviews"]);

        let books = validators.get("books").unwrap();
        assert!(books.operation_validator("{ books { id title } }").is_ok());
        let error = books
            .operation_validator("{ books { reviews { body } } }")
            .unwrap_err();
        assert!(matches!(
            error,
            subgraph_validator::OperationError::UnknownField { .. }
        ));

        let reviews = validators.get("reviews").unwrap();
        assert!(
            reviews
                .operation_validator(
                    "query($representations: [_Any!]!) { _entities(representations: $representations) { ... on Book { reviews { body } } } }"
                )
                .is_ok()
        );
    }

    #[test]
    fn subgraph_files_override_the_supergraph() {
        let dir = tempfile::tempdir().unwrap();
        let books = dir.path().join("books.graphql");
        std::fs::write(&books, "type Query { bookTitle: String }").unwrap();
        let configuration = Configuration {
            supergraph: Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("demo/supergraph.graphql")),
            subgraphs: [("books".to_string(), books)].into_iter().collect(),
            ..Default::default()
        };

        let validators = configuration.validators().unwrap();
        let books = validators.get("books").unwrap();
        assert!(books.operation_validator("{ bookTitle }").is_ok());
        assert!(books.operation_validator("{ books { title } }").is_err());
        assert!(validators.get("reviews").is_some());
    }

    #[test]
    fn invalid_supergraphs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let supergraph = dir.path().join("supergraph.graphql");
        std::fs::write(&supergraph, "type Query { books: [String] }").unwrap();
        let configuration = Configuration {
            supergraph: Some(supergraph),
            ..Default::default()
        };

        let error = configuration.validators().unwrap_err();
        assert!(matches!(error, ConfigurationError::InvalidSupergraph(_)));
    }

    #[test]
    fn invalid_subgraph_schemas_name_their_service() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("broken.graphql");
        std::fs::write(&schema, "type Query {").unwrap();
        let configuration = Configuration {
            subgraphs: [("broken".to_string(), schema)].into_iter().collect(),
            ..Default::default()
        };

        let error = configuration.validators().unwrap_err();
        assert!(error.to_string().starts_with("invalid schema for subgraph broken: "));
    }
}

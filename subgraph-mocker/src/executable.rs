//! Main entry point for CLI command to start the coprocessor.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::ValueEnum;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::configuration::Configuration;
use crate::coprocessor::Mocker;
use crate::generator::GeminiGenerator;
use crate::server;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Options for the coprocessor
#[derive(Parser, Debug)]
#[command(
    name = "mocker",
    about = "Router coprocessor answering subgraph requests with generated mock data",
    version
)]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace).
    #[arg(long = "log", default_value = "info", env = "MOCKER_LOG")]
    log_level: String,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Configuration location relative to the current directory.
    #[arg(short, long = "config", env = "MOCKER_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(long = "listen")]
    listen: Option<SocketAddr>,
}

/// This is the main coprocessor entrypoint.
pub fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(start(Opt::parse()))
}

fn init_logging(opt: &Opt) -> Result<()> {
    let builder = tracing_subscriber::fmt::fmt().with_env_filter(
        EnvFilter::try_new(&opt.log_level).context("could not parse log configuration")?,
    );
    let installed = match opt.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed
        .map_err(|error| anyhow::anyhow!(error))
        .context("could not install the log subscriber")
}

async fn start(opt: Opt) -> Result<()> {
    init_logging(&opt)?;

    let mut configuration = match &opt.config_path {
        Some(path) => {
            let path = if path.is_relative() {
                std::env::current_dir()?.join(path)
            } else {
                path.clone()
            };
            Configuration::load(&path)
                .with_context(|| format!("could not load configuration {}", path.display()))?
        }
        None => Configuration::default(),
    };
    if let Some(listen) = opt.listen {
        configuration.listen = listen;
    }
    if configuration.supergraph.is_none() && configuration.subgraphs.is_empty() {
        tracing::warn!("no subgraph schemas configured, generated data will not be validated");
    }

    let validators = configuration.validators()?;
    let api_key = configuration.generator.api_key()?;
    let generator = GeminiGenerator::new(&configuration.generator, api_key)?;
    let mocker = Mocker::new(validators, Arc::new(generator), configuration.add_typename);

    let listener = TcpListener::bind(configuration.listen)
        .await
        .with_context(|| format!("could not listen on {}", configuration.listen))?;
    server::serve(listener, mocker).await?;
    Ok(())
}

//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod phase;
pub mod register;
pub mod version;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::api::ApiClient;
use crate::cli::args::{Cli, Commands};
use crate::config::{ClientConfig, ConfigLoader};
use crate::error::XorOjError;
use crate::observability::init_metrics;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), XorOjError> {
    if let Some(port) = cli.metrics_port {
        init_metrics(Some(port))?;
    }

    match cli.command {
        Commands::Phase(args) => phase::run(&args),
        Commands::Watch(args) => watch::run(&args).await,
        Commands::Register(args) => register::run(&args, cli.quiet).await,
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads configuration and builds the API client shared by the
/// network-facing commands. Load warnings are logged.
pub(crate) fn connect(config_path: Option<&Path>) -> Result<(ClientConfig, Arc<ApiClient>), XorOjError> {
    let loaded = ConfigLoader::new().load_optional(config_path)?;
    for warning in &loaded.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("-"),
            "{}", warning.message
        );
    }
    let client = ApiClient::new(&loaded.config.api)?;
    Ok((loaded.config, Arc::new(client)))
}

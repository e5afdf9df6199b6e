//! CLI command definitions and dispatch.

mod info;
mod inspect;
mod status;
pub mod submit;

use clap::{Args, Parser, Subcommand};
use tokio::task::JoinHandle;

use a3s_forge_core::config::ForgeConfig;
use a3s_forge_core::error::Result;
use a3s_forge_runtime::{CancelHandle, CancelSignal};

/// Value that clears a tower setting inherited from the environment.
const NULL_VALUE: &str = "null";

#[derive(Parser)]
#[command(name = "a3s-forge", version, about)]
pub struct Cli {
    /// Log level filter (e.g. debug, info, warn); overrides RUST_LOG
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit a container request and print the resulting image
    Submit(submit::SubmitArgs),
    /// Inspect a container image
    Inspect(inspect::InspectArgs),
    /// Show client and build service information
    Info(info::InfoArgs),
    /// Show (or await) the status of a container request
    Status(status::StatusArgs),
}

/// Build service connection options shared by all commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ServiceArgs {
    /// Build service endpoint
    #[arg(long, visible_alias = "wave-endpoint", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Tower access token ("null" to unset)
    #[arg(long, value_name = "TOKEN")]
    pub tower_token: Option<String>,

    /// Tower API endpoint ("null" to unset)
    #[arg(long, value_name = "URL")]
    pub tower_endpoint: Option<String>,

    /// Tower workspace id
    #[arg(long, value_name = "ID")]
    pub tower_workspace_id: Option<u64>,
}

impl ServiceArgs {
    /// Resolve the configuration: defaults, config file, environment, then flags.
    pub fn resolve(&self) -> Result<ForgeConfig> {
        let mut config = ForgeConfig::resolve()?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides.
    pub fn apply(&self, config: &mut ForgeConfig) {
        if let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            config.endpoint = endpoint.to_string();
        }
        if let Some(token) = &self.tower_token {
            config.tower.access_token = (token != NULL_VALUE).then(|| token.clone());
        }
        if let Some(endpoint) = &self.tower_endpoint {
            config.tower.endpoint = (endpoint != NULL_VALUE).then(|| endpoint.clone());
        }
        if let Some(id) = self.tower_workspace_id {
            config.tower.workspace_id = Some(id);
        }
    }
}

/// Cancellation signal fired by Ctrl-C. Abort the returned task when done.
pub(crate) fn cancel_on_ctrl_c() -> (CancelSignal, JoinHandle<()>) {
    let handle = CancelHandle::new();
    let signal = handle.signal();
    let task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            handle.cancel();
        }
    });
    (signal, task)
}

pub async fn dispatch(cli: Cli) -> std::result::Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Submit(args) => submit::execute(args).await,
        Command::Inspect(args) => inspect::execute(args).await,
        Command::Info(args) => info::execute(args).await,
        Command::Status(args) => status::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_args_override_config() {
        let mut config = ForgeConfig::default();
        config.tower.access_token = Some("from-env".to_string());

        let args = ServiceArgs {
            endpoint: Some("https://builds.example.com".to_string()),
            tower_token: Some("null".to_string()),
            tower_endpoint: Some("https://tower.example.com".to_string()),
            tower_workspace_id: Some(42),
        };
        args.apply(&mut config);

        assert_eq!(config.endpoint, "https://builds.example.com");
        assert_eq!(config.tower.access_token, None);
        assert_eq!(
            config.tower.endpoint.as_deref(),
            Some("https://tower.example.com")
        );
        assert_eq!(config.tower.workspace_id, Some(42));
    }

    #[test]
    fn test_service_args_keep_config_when_unset() {
        let mut config = ForgeConfig::default();
        config.tower.access_token = Some("from-env".to_string());
        ServiceArgs::default().apply(&mut config);
        assert_eq!(config.tower.access_token.as_deref(), Some("from-env"));
        assert_eq!(config.endpoint, a3s_forge_core::config::DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_cli_parses_global_log_level() {
        let cli = Cli::try_parse_from(["a3s-forge", "info", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Info(_)));
    }
}

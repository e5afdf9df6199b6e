//! `a3s-forge submit` command.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use a3s_forge_core::config::ForgeConfig;
use a3s_forge_core::error::ForgeError;
use a3s_forge_runtime::{ForgeClient, SubmitOutcome};

use super::ServiceArgs;
use crate::output::{self, OutputFormat};
use crate::request;

/// Channels used when `--conda-channels` is not given.
pub const DEFAULT_CONDA_CHANNELS: &str = "conda-forge,bioconda";

/// Image used to install Conda packages when `--conda-base-image` is not given.
pub const DEFAULT_MAMBA_IMAGE: &str = "mambaorg/micromamba:1.5.1";

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Container image to augment (e.g. ubuntu:latest)
    #[arg(short = 'i', long, value_name = "IMAGE")]
    pub image: Option<String>,

    /// Container file to build: local path, file:// or http(s) URL
    #[arg(short = 'f', long, value_name = "FILE")]
    pub containerfile: Option<String>,

    /// Build context directory
    #[arg(long, value_name = "DIR")]
    pub context: Option<PathBuf>,

    /// Directory to append as a container layer (repeatable)
    #[arg(long = "layer", value_name = "DIR")]
    pub layers: Vec<PathBuf>,

    /// Environment variable for the container (repeatable)
    #[arg(long = "config-env", value_name = "NAME=VALUE")]
    pub config_env: Vec<String>,

    /// Command for the container
    #[arg(long, value_name = "CMD")]
    pub config_cmd: Option<String>,

    /// Entrypoint for the container
    #[arg(long, value_name = "ENTRYPOINT")]
    pub config_entrypoint: Option<String>,

    /// Working directory for the container
    #[arg(long, value_name = "DIR")]
    pub config_working_dir: Option<String>,

    /// Container config JSON file: local path, file:// or http(s) URL
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<String>,

    /// Conda environment file
    #[arg(long, value_name = "FILE")]
    pub conda_file: Option<PathBuf>,

    /// Conda package to install (repeatable)
    #[arg(long = "conda-package", visible_alias = "conda", value_name = "PACKAGE")]
    pub conda_packages: Vec<String>,

    /// Conda channels, comma or space separated
    #[arg(long, value_name = "CHANNELS", default_value = DEFAULT_CONDA_CHANNELS)]
    pub conda_channels: String,

    /// Base image used to install Conda packages
    #[arg(long, value_name = "IMAGE", default_value = DEFAULT_MAMBA_IMAGE)]
    pub conda_base_image: String,

    /// Command run after the Conda environment is created (repeatable)
    #[arg(long = "conda-run-command", value_name = "CMD")]
    pub conda_run_commands: Vec<String>,

    /// Target platform: linux/amd64 or linux/arm64
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Repository where built images are pushed
    #[arg(long = "build-repo", visible_alias = "build-repository", value_name = "REPO")]
    pub build_repo: Option<String>,

    /// Repository used as build cache
    #[arg(long = "cache-repo", visible_alias = "cache-repository", value_name = "REPO")]
    pub cache_repo: Option<String>,

    /// Persist the container in the build repository
    #[arg(short = 'F', long)]
    pub freeze: bool,

    /// Copy the image into the build repository
    #[arg(short = 'm', long)]
    pub mirror: bool,

    /// Build a Singularity image
    #[arg(short = 's', long)]
    pub singularity: bool,

    /// Validate the request without building
    #[arg(long)]
    pub dry_run: bool,

    /// Wait for the build to complete, optionally with a timeout (e.g. 10m, 2s)
    #[arg(
        long = "await",
        value_name = "DURATION",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub await_for: Option<String>,

    /// Keep file modification times in packed layers
    #[arg(long)]
    pub preserve_timestamp: bool,

    /// Security scan mode
    #[arg(long, value_enum, value_name = "MODE")]
    pub scan_mode: Option<ScanMode>,

    /// Vulnerability level allowed in the container (repeatable)
    #[arg(long = "scan-level", value_enum, value_name = "LEVEL")]
    pub scan_levels: Vec<ScanLevel>,

    /// Compression used for the build
    #[arg(long, value_enum, value_name = "MODE")]
    pub build_compression: Option<CompressionMode>,

    /// Container to include in the base image (repeatable)
    #[arg(long = "include", value_name = "IMAGE")]
    pub includes: Vec<String>,

    /// Naming of the resulting container image
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub name_strategy: Option<NameStrategy>,

    /// Print the full response in this format
    #[arg(short = 'o', long, value_enum)]
    pub output: Option<OutputFormat>,

    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanMode {
    None,
    Async,
    Required,
}

impl ScanMode {
    pub fn as_wire(self) -> &'static str {
        match self {
            ScanMode::None => "none",
            ScanMode::Async => "async",
            ScanMode::Required => "required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ScanLevel {
    pub fn as_wire(self) -> &'static str {
        match self {
            ScanLevel::Low => "LOW",
            ScanLevel::Medium => "MEDIUM",
            ScanLevel::High => "HIGH",
            ScanLevel::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompressionMode {
    Gzip,
    Zstd,
    Estargz,
}

impl CompressionMode {
    pub fn as_wire(self) -> &'static str {
        match self {
            CompressionMode::Gzip => "gzip",
            CompressionMode::Zstd => "zstd",
            CompressionMode::Estargz => "estargz",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NameStrategy {
    None,
    #[value(name = "tagPrefix")]
    TagPrefix,
    #[value(name = "imageSuffix")]
    ImageSuffix,
}

impl NameStrategy {
    pub fn as_wire(self) -> &'static str {
        match self {
            NameStrategy::None => "none",
            NameStrategy::TagPrefix => "tagPrefix",
            NameStrategy::ImageSuffix => "imageSuffix",
        }
    }
}

impl SubmitArgs {
    /// Await timeout: `None` when not awaiting, the configured default for a
    /// bare `--await`.
    pub fn await_timeout(&self, config: &ForgeConfig) -> Result<Option<Duration>, ForgeError> {
        match self.await_for.as_deref().map(str::trim) {
            None => Ok(None),
            Some("") => Ok(Some(config.poll.timeout())),
            Some(value) => output::parse_duration(value)
                .map(Some)
                .map_err(|e| ForgeError::validation(format!("Invalid --await value: {e}"))),
        }
    }
}

pub async fn execute(args: SubmitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.service.resolve()?;
    request::validate(&args, &config)?;
    let await_timeout = args.await_timeout(&config)?;

    let container_request = request::build_request(&args, &config).await?;
    let client = ForgeClient::from_config(&config)?;

    let outcome = match await_timeout {
        Some(timeout) => {
            let (signal, ctrl_c) = super::cancel_on_ctrl_c();
            let result = client
                .submit_and_await(&container_request, timeout, &signal)
                .await;
            ctrl_c.abort();
            result?
        }
        None => SubmitOutcome::Submitted(client.submit(&container_request).await?),
    };

    match outcome {
        SubmitOutcome::Submitted(response) => match args.output {
            Some(format) => println!("{}", output::render(&response, format)?),
            None => println!("{}", response.target_image.unwrap_or_default()),
        },
        SubmitOutcome::Awaited(awaited) => match args.output {
            Some(format) => println!("{}", output::render(&awaited, format)?),
            None if !awaited.succeeded() => {
                return Err(ForgeError::BuildFailed {
                    reason: awaited.reason,
                    details_uri: awaited.details_uri,
                }
                .into())
            }
            None => println!("{}", awaited.response.target_image.unwrap_or_default()),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Command};
    use clap::Parser;

    fn parse(args: &[&str]) -> SubmitArgs {
        let argv = std::iter::once("a3s-forge")
            .chain(std::iter::once("submit"))
            .chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Submit(args) => args,
            _ => panic!("expected submit command"),
        }
    }

    #[test]
    fn test_parse_repeatable_options() {
        let args = parse(&[
            "-i",
            "alpine",
            "--config-env",
            "A=1",
            "--config-env",
            "B=2",
            "--layer",
            "l1",
            "--layer",
            "l2",
            "--scan-level",
            "high",
            "--scan-level",
            "critical",
        ]);
        assert_eq!(args.image.as_deref(), Some("alpine"));
        assert_eq!(args.config_env, vec!["A=1", "B=2"]);
        assert_eq!(args.layers.len(), 2);
        assert_eq!(args.scan_levels, vec![ScanLevel::High, ScanLevel::Critical]);
    }

    #[test]
    fn test_await_flag_forms() {
        let config = ForgeConfig::default();

        let args = parse(&["-i", "alpine"]);
        assert_eq!(args.await_timeout(&config).unwrap(), None);

        let args = parse(&["-i", "alpine", "--await"]);
        assert_eq!(
            args.await_timeout(&config).unwrap(),
            Some(Duration::from_secs(900))
        );

        let args = parse(&["-i", "alpine", "--await", "2m"]);
        assert_eq!(
            args.await_timeout(&config).unwrap(),
            Some(Duration::from_secs(120))
        );

        let args = parse(&["-i", "alpine", "--await", "soon"]);
        assert!(matches!(
            args.await_timeout(&config),
            Err(ForgeError::Validation(_))
        ));
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(ScanMode::Required.as_wire(), "required");
        assert_eq!(ScanLevel::Medium.as_wire(), "MEDIUM");
        assert_eq!(CompressionMode::Estargz.as_wire(), "estargz");
        assert_eq!(NameStrategy::ImageSuffix.as_wire(), "imageSuffix");
    }

    #[test]
    fn test_include_and_name_strategy_flags() {
        let args = parse(&[
            "-i",
            "ubuntu",
            "--include",
            "alpine:latest",
            "--include",
            "busybox",
            "--name-strategy",
            "tagPrefix",
        ]);
        assert_eq!(args.includes, vec!["alpine:latest", "busybox"]);
        assert_eq!(args.name_strategy, Some(NameStrategy::TagPrefix));
    }

    #[test]
    fn test_conda_defaults() {
        let args = parse(&["--conda-package", "numpy"]);
        assert_eq!(args.conda_channels, DEFAULT_CONDA_CHANNELS);
        assert_eq!(args.conda_base_image, DEFAULT_MAMBA_IMAGE);
    }

    #[test]
    fn test_output_format_flag() {
        let args = parse(&["-i", "alpine", "-o", "yaml"]);
        assert_eq!(args.output, Some(OutputFormat::Yaml));
    }
}

//! Submit argument validation and container request assembly.

use std::path::Path;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;

use a3s_forge_core::api::{
    BuildCompression, CondaOpts, ContainerConfig, PackagesSpec, PackagesType,
    SubmitContainerRequest,
};
use a3s_forge_core::config::ForgeConfig;
use a3s_forge_core::error::{ForgeError, Result};
use a3s_forge_runtime::{IgnoreFilter, LayerBudget, LayerSet, PackedLayer, Packer};

use crate::commands::submit::SubmitArgs;

/// Accepted `--platform` values.
pub const VALID_PLATFORMS: [&str; 6] = [
    "amd64",
    "x86_64",
    "linux/amd64",
    "linux/x86_64",
    "arm64",
    "linux/arm64",
];

const SINGULARITY_FORMAT: &str = "sif";

fn is_env_var(value: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=.*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn fail<T>(message: impl Into<String>) -> Result<T> {
    Err(ForgeError::validation(message))
}

/// Check the submit arguments for conflicts and malformed values.
pub fn validate(args: &SubmitArgs, config: &ForgeConfig) -> Result<()> {
    let has_image = is_set(&args.image);
    let has_containerfile = is_set(&args.containerfile);
    let has_conda_file = args.conda_file.is_some();
    let has_conda_packages = !args.conda_packages.is_empty();

    if has_image && has_containerfile {
        return fail("Argument --image and --containerfile conflict each other - Specify an image name or a container file for the container to be provisioned");
    }
    if !has_image && !has_containerfile && !has_conda_file && !has_conda_packages {
        return fail("Provide either a image name or a container file for the container to be provisioned");
    }
    if is_set(&args.build_repo) && config.tower.access_token.is_none() {
        return fail("Specify the Tower access token required to authenticate the access to the build repository either by using the --tower-token option or the TOWER_ACCESS_TOKEN environment variable");
    }

    if has_conda_file && has_conda_packages {
        return fail("Option --conda-file and --conda-package conflict each other");
    }
    if has_conda_file && has_image {
        return fail("Option --conda-file and --image conflict each other");
    }
    if has_conda_file && has_containerfile {
        return fail("Option --conda-file and --containerfile conflict each other");
    }
    if has_conda_packages && has_image {
        return fail("Option --conda-package and --image conflict each other");
    }
    if has_conda_packages && has_containerfile {
        return fail("Option --conda-package and --containerfile conflict each other");
    }
    if let Some(conda_file) = &args.conda_file {
        if !conda_file.exists() {
            return fail(format!(
                "The specified Conda file path cannot be accessed - offending file path: {}",
                conda_file.display()
            ));
        }
    }

    if let Some(context) = &args.context {
        if !has_containerfile {
            return fail("Option --context requires the use of a container file");
        }
        if !context.exists() {
            return fail(format!(
                "Context path does not exists - offending value: {}",
                context.display()
            ));
        }
        if !context.is_dir() {
            return fail(format!(
                "Context path is not a directory - offending value: {}",
                context.display()
            ));
        }
    }
    if args.singularity && !args.freeze {
        return fail("Singularity build requires enabling freeze mode");
    }

    if args.mirror {
        if has_containerfile {
            return fail("Argument --mirror and --containerfile conflict each other");
        }
        if has_conda_file {
            return fail("Argument --mirror and --conda-file conflict each other");
        }
        if has_conda_packages {
            return fail("Argument --mirror and --conda-package conflict each other");
        }
        if args.context.is_some() {
            return fail("Argument --mirror and --context conflict each other");
        }
        if args.freeze {
            return fail("Argument --mirror and --freeze conflict each other");
        }
        if !is_set(&args.build_repo) {
            return fail("Option --mirror requires the use of a build repository");
        }
    }
    if args.dry_run && args.await_for.is_some() {
        return fail("Options --dry-run and --await conflict each other");
    }

    if let Some(platform) = args.platform.as_deref() {
        if !VALID_PLATFORMS.contains(&platform) {
            return fail(format!("Unsupported container platform: '{}'", platform));
        }
    }

    validate_config_args(args)
}

fn validate_config_args(args: &SubmitArgs) -> Result<()> {
    if args.config_file.as_deref().is_some_and(|f| f.trim().is_empty()) {
        return fail("The specified config file is an empty string");
    }
    if args.config_cmd.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return fail("The command cannot be an empty string");
    }
    if let Some(entry) = args.config_env.iter().find(|e| !is_env_var(e)) {
        return fail(format!(
            "Invalid environment variable syntax - offending value: {}",
            entry
        ));
    }
    if args
        .config_working_dir
        .as_deref()
        .is_some_and(|d| d.trim().is_empty())
    {
        return fail("The working directory cannot be empty string");
    }
    if let Some(dir) = args.layers.iter().find(|l| !l.is_dir()) {
        return fail(format!(
            "Not a valid container layer directory - offending path: {}",
            dir.display()
        ));
    }
    Ok(())
}

/// Assemble the container request from validated arguments.
pub async fn build_request(args: &SubmitArgs, config: &ForgeConfig) -> Result<SubmitContainerRequest> {
    let budget = LayerBudget::new(config.limits.clone());

    let container_file = match args.containerfile.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(location) => Some(BASE64.encode(read_resource(location).await?)),
        None => None,
    };

    let build_context = match &args.context {
        Some(dir) => {
            let layer = pack_context(dir, args.preserve_timestamp)?;
            budget.check_context(&layer)?;
            Some(layer.into_wire())
        }
        None => None,
    };

    let container_config = prepare_config(args, &budget).await?;

    Ok(SubmitContainerRequest {
        container_image: args.image.clone().filter(|i| !i.trim().is_empty()),
        container_file,
        packages: packages_spec(args)?,
        container_platform: args.platform.clone(),
        build_repository: args.build_repo.clone(),
        cache_repository: args.cache_repo.clone(),
        build_context,
        container_config,
        tower_access_token: config.tower.access_token.clone(),
        tower_workspace_id: config.tower.workspace_id,
        tower_endpoint: config.tower.endpoint.clone(),
        format: args.singularity.then(|| SINGULARITY_FORMAT.to_string()),
        freeze: args.freeze,
        dry_run: args.dry_run,
        mirror: args.mirror,
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
        scan_mode: args.scan_mode.map(|m| m.as_wire().to_string()),
        scan_levels: (!args.scan_levels.is_empty()).then(|| {
            args.scan_levels
                .iter()
                .map(|l| l.as_wire().to_string())
                .collect()
        }),
        build_compression: args.build_compression.map(|c| BuildCompression {
            mode: c.as_wire().to_string(),
        }),
        container_includes: (!args.includes.is_empty()).then(|| args.includes.clone()),
        name_strategy: args.name_strategy.map(|n| n.as_wire().to_string()),
    })
}

fn pack_context(dir: &Path, preserve_timestamps: bool) -> Result<PackedLayer> {
    if cfg!(windows) {
        tracing::warn!("Build context file permissions may not be honoured on Windows");
    }
    let filter = IgnoreFilter::from_dir(dir)?;
    Packer::new()
        .with_filter(filter)
        .with_preserve_timestamps(preserve_timestamps)
        .pack(dir)
}

async fn prepare_config(args: &SubmitArgs, budget: &LayerBudget) -> Result<Option<ContainerConfig>> {
    let mut config = match args.config_file.as_deref() {
        Some(location) => read_config(location).await?,
        None => ContainerConfig::default(),
    };

    if let Some(entrypoint) = &args.config_entrypoint {
        config.entrypoint = Some(vec![entrypoint.clone()]);
    }
    if let Some(cmd) = &args.config_cmd {
        config.cmd = Some(vec![cmd.clone()]);
    }
    if !args.config_env.is_empty() {
        config.env = Some(args.config_env.clone());
    }
    if let Some(dir) = &args.config_working_dir {
        config.working_dir = Some(dir.clone());
    }

    let mut layers = LayerSet::from(
        config
            .layers
            .drain(..)
            .map(PackedLayer::from_wire)
            .collect::<Result<Vec<_>>>()?,
    );

    for dir in &args.layers {
        let layer = Packer::new()
            .with_preserve_timestamps(args.preserve_timestamp)
            .pack(dir)?;
        budget.check_layer(&layer)?;
        layers.push(layer);
    }
    budget.check_set(&layers)?;
    config.layers = layers.into_wire();

    Ok((!config.is_empty()).then_some(config))
}

fn packages_spec(args: &SubmitArgs) -> Result<Option<PackagesSpec>> {
    let environment = match &args.conda_file {
        Some(path) => Some(BASE64.encode(read_file(path)?)),
        None => None,
    };
    let entries = (!args.conda_packages.is_empty()).then(|| args.conda_packages.clone());
    if environment.is_none() && entries.is_none() {
        return Ok(None);
    }

    Ok(Some(PackagesSpec {
        kind: PackagesType::Conda,
        environment,
        entries,
        channels: Some(split_channels(&args.conda_channels)),
        conda_opts: Some(CondaOpts {
            mamba_image: Some(args.conda_base_image.clone()),
            commands: (!args.conda_run_commands.is_empty())
                .then(|| args.conda_run_commands.clone()),
        }),
    }))
}

/// Split a channel list on commas and spaces.
pub fn split_channels(value: &str) -> Vec<String> {
    value
        .split([',', ' '])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

async fn read_config(location: &str) -> Result<ContainerConfig> {
    let bytes = read_resource(location).await.map_err(|e| match e {
        ForgeError::Validation(msg) if msg.starts_with("File not found") => {
            ForgeError::validation(format!("Invalid container config file - {}", msg))
        }
        other => other,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ForgeError::validation(format!(
            "Unable to read container config file: {} - cause: {}",
            location, e
        ))
    })
}

/// Read a local path, a `file://` URI or an http(s) URL.
async fn read_resource(location: &str) -> Result<Vec<u8>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return fetch(location).await;
    }
    let path = location.strip_prefix("file://").unwrap_or(location);
    read_file(Path::new(path))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ForgeError::validation(format!("File not found: {}", path.display()))
        }
        _ => ForgeError::validation(format!(
            "Unable to read resource: {} - reason: {}",
            path.display(),
            e
        )),
    })
}

async fn fetch(url: &str) -> Result<Vec<u8>> {
    tracing::debug!(url, "Fetching remote resource");
    let response = reqwest::get(url)
        .await
        .map_err(|e| ForgeError::Transport(e.to_string()))?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return fail(format!("File not found: {}", url));
    }
    if !status.is_success() {
        return Err(ForgeError::protocol(
            Some(status.as_u16()),
            format!("Unable to read resource: {}", url),
        ));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ForgeError::Transport(e.to_string()))?;
    Ok(bytes.to_vec())
}

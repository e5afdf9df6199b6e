//! `a3s-forge inspect` command.

use clap::Args;

use a3s_forge_core::api::ContainerInspectRequest;
use a3s_forge_runtime::ForgeClient;

use super::ServiceArgs;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct InspectArgs {
    /// Container image to inspect
    #[arg(short = 'i', long, value_name = "IMAGE")]
    pub image: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "json")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub service: ServiceArgs,
}

pub async fn execute(args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.service.resolve()?;
    let client = ForgeClient::from_config(&config)?;

    let request = ContainerInspectRequest {
        container_image: args.image,
        tower_access_token: config.tower.access_token.clone(),
        tower_workspace_id: config.tower.workspace_id,
        tower_endpoint: config.tower.endpoint.clone(),
    };
    let response = client.inspect(&request).await?.with_layer_uris();

    println!("{}", output::render(&response, args.output)?);
    Ok(())
}

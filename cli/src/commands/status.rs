//! `a3s-forge status` command.

use clap::Args;

use a3s_forge_core::api::{BuildStatus, ContainerStatusResponse};
use a3s_forge_core::error::ForgeError;
use a3s_forge_runtime::ForgeClient;

use super::ServiceArgs;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct StatusArgs {
    /// Container request id
    pub request_id: String,

    /// Wait for the request to complete, optionally with a timeout (e.g. 10m)
    #[arg(
        long = "await",
        value_name = "DURATION",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub await_for: Option<String>,

    /// Print the full status in this format
    #[arg(short = 'o', long, value_enum)]
    pub output: Option<OutputFormat>,

    #[command(flatten)]
    pub service: ServiceArgs,
}

pub async fn execute(args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.service.resolve()?;
    let client = ForgeClient::from_config(&config)?;

    let Some(await_for) = args.await_for.as_deref().map(str::trim) else {
        let status = client.status(&args.request_id).await?;
        match args.output {
            Some(format) => println!("{}", output::render(&status, format)?),
            None => println!("{}", status_table(&args.request_id, &status)),
        }
        return Ok(());
    };

    let timeout = if await_for.is_empty() {
        config.poll.timeout()
    } else {
        output::parse_duration(await_for)
            .map_err(|e| ForgeError::validation(format!("Invalid --await value: {e}")))?
    };

    let (signal, ctrl_c) = super::cancel_on_ctrl_c();
    let result = client
        .await_completion(&args.request_id, timeout, &signal)
        .await;
    ctrl_c.abort();
    let (build_status, status) = result?;

    match args.output {
        Some(format) => println!("{}", output::render(&status, format)?),
        None if build_status == BuildStatus::Failed => {
            return Err(ForgeError::BuildFailed {
                reason: status.reason,
                details_uri: status.details_uri,
            }
            .into())
        }
        None => println!("{}", status_table(&args.request_id, &status)),
    }
    Ok(())
}

fn status_table(request_id: &str, status: &ContainerStatusResponse) -> comfy_table::Table {
    let build_status = status
        .build_status()
        .map(|s| s.to_string())
        .unwrap_or_else(|_| "UNKNOWN".to_string());
    let duration = status
        .duration
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut table = output::new_table(&["REQUEST ID", "STATUS", "DURATION", "REASON"]);
    table.add_row(vec![
        request_id,
        build_status.as_str(),
        duration.as_str(),
        status.reason.as_deref().unwrap_or("-"),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table_columns() {
        let status: ContainerStatusResponse = serde_json::from_str(
            r#"{"status":"DONE","succeeded":false,"reason":"exit 1","duration":3.0}"#,
        )
        .unwrap();
        let rendered = status_table("req-1", &status).to_string();
        assert!(rendered.contains("req-1"));
        assert!(rendered.contains("FAILED"));
        assert!(rendered.contains("3.0s"));
        assert!(rendered.contains("exit 1"));
    }

    #[test]
    fn test_status_table_pending() {
        let status: ContainerStatusResponse =
            serde_json::from_str(r#"{"status":"BUILDING"}"#).unwrap();
        let rendered = status_table("req-2", &status).to_string();
        assert!(rendered.contains("PENDING"));
        assert!(rendered.contains('-'));
    }
}

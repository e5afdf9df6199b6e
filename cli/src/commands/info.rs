//! `a3s-forge info` command.

use clap::Args;
use semver::Version;

use a3s_forge_runtime::ForgeClient;

use super::ServiceArgs;
use crate::output;

/// Oldest build service release this client is tested against.
const REQUIRED_SERVICE_VERSION: &str = "1.13.0";

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub service: ServiceArgs,
}

pub async fn execute(args: InfoArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.service.resolve()?;
    let client = ForgeClient::from_config(&config)?;

    let server_version = match client.service_info().await {
        Ok(info) => annotate_version(&info.version, REQUIRED_SERVICE_VERSION),
        Err(e) => {
            tracing::debug!(error = %e, "Unable to fetch service info");
            "-".to_string()
        }
    };

    let mut table = output::new_table(&["COMPONENT", "PROPERTY", "VALUE"]);
    table.add_row(vec!["Client", "Version", a3s_forge_core::VERSION]);
    table.add_row(vec!["", "System", std::env::consts::OS]);
    table.add_row(vec!["Server", "Version", server_version.as_str()]);
    table.add_row(vec!["", "Endpoint", config.endpoint.as_str()]);
    println!("{table}");

    Ok(())
}

/// Append the required release to versions older than it.
///
/// Versions that do not parse as semver are shown unchanged.
fn annotate_version(current: &str, required: &str) -> String {
    let parse = |v: &str| Version::parse(v.trim().trim_start_matches('v'));
    match (parse(current), parse(required)) {
        (Ok(c), Ok(r)) if c < r => format!("{} (required: {})", current, required),
        _ => current.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotate_old_version() {
        assert_eq!(
            annotate_version("1.12.9", "1.13.0"),
            "1.12.9 (required: 1.13.0)"
        );
    }

    #[test]
    fn test_annotate_current_version() {
        assert_eq!(annotate_version("1.13.0", "1.13.0"), "1.13.0");
        assert_eq!(annotate_version("v1.20.1", "1.13.0"), "v1.20.1");
    }

    #[test]
    fn test_annotate_unparseable_version() {
        assert_eq!(annotate_version("nightly", "1.13.0"), "nightly");
    }
}

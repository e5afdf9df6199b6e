//! Build service wire types.
//!
//! Request and response payloads exchanged with the remote build service.
//! All payloads use camelCase JSON field names; optional fields are omitted
//! when unset so the service applies its own defaults.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// A compressed filesystem layer as carried in a request.
///
/// `location` is either an inline `data:` URI holding the base64 gzip bytes
/// or a reference to external storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerLayer {
    pub location: String,
    pub gzip_digest: String,
    pub gzip_size: u64,
    pub tar_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_hashing: Option<bool>,
}

impl ContainerLayer {
    /// Prefix of inline layer locations.
    pub const DATA_URI_PREFIX: &'static str = "data:";

    pub fn is_inline(&self) -> bool {
        self.location.starts_with(Self::DATA_URI_PREFIX)
    }
}

/// Container configuration overrides applied on top of the base image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<ContainerLayer>,
}

impl ContainerConfig {
    pub fn is_empty(&self) -> bool {
        self.entrypoint.is_none()
            && self.cmd.is_none()
            && self.env.is_none()
            && self.working_dir.is_none()
            && self.layers.is_empty()
    }
}

/// Conda build options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CondaOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mamba_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
}

/// Package based build specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagesSpec {
    #[serde(rename = "type")]
    pub kind: PackagesType,
    /// Base64 encoded environment file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conda_opts: Option<CondaOpts>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackagesType {
    Conda,
}

/// Container request submitted to the build service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitContainerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
    /// Base64 encoded container file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<PackagesSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_context: Option<ContainerLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_config: Option<ContainerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_workspace_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub freeze: bool,
    pub dry_run: bool,
    pub mirror: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_levels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_compression: Option<BuildCompression>,
    /// Images whose content is merged into the base image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_includes: Option<Vec<String>>,
    /// One of `none`, `tagPrefix`, `imageSuffix`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_strategy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCompression {
    pub mode: String,
}

/// Response to a container request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitContainerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeze: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,
}

/// Terminal or pending state of a container request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Pending,
    Completed,
    Failed,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BuildStatus::Pending)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Pending => "PENDING",
            BuildStatus::Completed => "COMPLETED",
            BuildStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Status vocabulary as emitted by the service.
///
/// `BUILDING` and `SCANNING` are progress states; `DONE` is resolved
/// through the `succeeded` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerStatus {
    Pending,
    Building,
    Scanning,
    Done,
    Completed,
    Failed,
}

/// Duration as reported by the service: either seconds or an ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireDuration {
    Seconds(f64),
    Text(String),
}

impl fmt::Display for WireDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireDuration::Seconds(s) => write!(f, "{:.1}s", s),
            WireDuration::Text(t) => f.write_str(t),
        }
    }
}

/// Response of the container status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: ContainerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerabilities: Option<BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<WireDuration>,
}

impl ContainerStatusResponse {
    /// Collapse the service vocabulary into the tri-state build status.
    pub fn build_status(&self) -> Result<BuildStatus> {
        match self.status {
            ContainerStatus::Pending | ContainerStatus::Building | ContainerStatus::Scanning => {
                Ok(BuildStatus::Pending)
            }
            ContainerStatus::Completed => Ok(BuildStatus::Completed),
            ContainerStatus::Failed => Ok(BuildStatus::Failed),
            ContainerStatus::Done => match self.succeeded {
                Some(true) => Ok(BuildStatus::Completed),
                Some(false) => Ok(BuildStatus::Failed),
                None => Err(ForgeError::protocol(
                    None,
                    "status DONE reported without a `succeeded` flag",
                )),
            },
        }
    }
}

/// Submit response enriched with the final status of an awaited request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitedContainerResponse {
    #[serde(flatten)]
    pub response: SubmitContainerResponse,
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<WireDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerabilities: Option<BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_uri: Option<String>,
}

impl AwaitedContainerResponse {
    pub fn new(
        mut response: SubmitContainerResponse,
        status: BuildStatus,
        detail: &ContainerStatusResponse,
    ) -> Self {
        response.succeeded = Some(status == BuildStatus::Completed);
        Self {
            response,
            status,
            duration: detail.duration.clone(),
            vulnerabilities: detail.vulnerabilities.clone(),
            reason: detail.reason.clone(),
            details_uri: detail.details_uri.clone(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == BuildStatus::Completed
    }
}

/// Container inspection request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInspectRequest {
    pub container_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_workspace_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower_endpoint: Option<String>,
}

/// Container inspection response.
///
/// The container spec is kept as raw JSON; only the layer list is
/// interpreted, to attach blob URIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInspectResponse {
    pub container: serde_json::Value,
}

impl ContainerInspectResponse {
    /// Add a `uri` attribute to each manifest layer, pointing at its blob.
    pub fn with_layer_uris(mut self) -> Self {
        let host = self
            .container
            .get("hostName")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let image = self
            .container
            .get("imageName")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let (Some(host), Some(image)) = (host, image) else {
            return self;
        };

        if let Some(layers) = self
            .container
            .get_mut("manifest")
            .and_then(|m| m.get_mut("layers"))
            .and_then(|l| l.as_array_mut())
        {
            for layer in layers.iter_mut() {
                let digest = layer
                    .get("digest")
                    .and_then(|d| d.as_str())
                    .map(str::to_string);
                if let (Some(digest), Some(obj)) = (digest, layer.as_object_mut()) {
                    obj.insert(
                        "uri".to_string(),
                        serde_json::Value::String(format!("{}/v2/{}/blobs/{}", host, image, digest)),
                    );
                }
            }
        }
        self
    }
}

/// Service identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfoResponse {
    pub service_info: ServiceInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(json: &str) -> ContainerStatusResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_layer_inline_detection() {
        let layer = ContainerLayer {
            location: "data:H4sIAAAA".to_string(),
            gzip_digest: "sha256:abc".to_string(),
            gzip_size: 10,
            tar_digest: "sha256:def".to_string(),
            skip_hashing: None,
        };
        assert!(layer.is_inline());

        let external = ContainerLayer {
            location: "https://example.com/layer.tar.gz".to_string(),
            ..layer
        };
        assert!(!external.is_inline());
    }

    #[test]
    fn test_layer_camel_case() {
        let layer: ContainerLayer = serde_json::from_str(
            r#"{"location":"data:xx","gzipDigest":"sha256:a","gzipSize":4,"tarDigest":"sha256:b"}"#,
        )
        .unwrap();
        assert_eq!(layer.gzip_size, 4);
        let json = serde_json::to_string(&layer).unwrap();
        assert!(json.contains("\"gzipDigest\""));
        assert!(!json.contains("skipHashing"));
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let request = SubmitContainerRequest {
            container_image: Some("alpine:latest".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["containerImage"], "alpine:latest");
        assert_eq!(json["freeze"], false);
        assert!(json.get("buildContext").is_none());
        assert!(json.get("towerAccessToken").is_none());
        assert!(json.get("containerIncludes").is_none());
        assert!(json.get("nameStrategy").is_none());
    }

    #[test]
    fn test_request_includes_and_name_strategy() {
        let request = SubmitContainerRequest {
            container_image: Some("ubuntu:22.04".to_string()),
            container_includes: Some(vec!["alpine:latest".to_string()]),
            name_strategy: Some("tagPrefix".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["containerIncludes"][0], "alpine:latest");
        assert_eq!(json["nameStrategy"], "tagPrefix");
    }

    #[test]
    fn test_container_config_empty() {
        assert!(ContainerConfig::default().is_empty());
        let config = ContainerConfig {
            working_dir: Some("/work".to_string()),
            ..Default::default()
        };
        assert!(!config.is_empty());
    }

    #[test]
    fn test_tri_state_status() {
        assert_eq!(
            status(r#"{"status":"PENDING"}"#).build_status().unwrap(),
            BuildStatus::Pending
        );
        assert_eq!(
            status(r#"{"status":"COMPLETED"}"#).build_status().unwrap(),
            BuildStatus::Completed
        );
        assert_eq!(
            status(r#"{"status":"FAILED","reason":"boom"}"#)
                .build_status()
                .unwrap(),
            BuildStatus::Failed
        );
    }

    #[test]
    fn test_extended_status_vocabulary() {
        assert_eq!(
            status(r#"{"status":"BUILDING"}"#).build_status().unwrap(),
            BuildStatus::Pending
        );
        assert_eq!(
            status(r#"{"status":"SCANNING"}"#).build_status().unwrap(),
            BuildStatus::Pending
        );
        assert_eq!(
            status(r#"{"status":"DONE","succeeded":true}"#)
                .build_status()
                .unwrap(),
            BuildStatus::Completed
        );
        assert_eq!(
            status(r#"{"status":"DONE","succeeded":false}"#)
                .build_status()
                .unwrap(),
            BuildStatus::Failed
        );
        assert!(matches!(
            status(r#"{"status":"DONE"}"#).build_status(),
            Err(ForgeError::Protocol { .. })
        ));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: std::result::Result<ContainerStatusResponse, _> =
            serde_json::from_str(r#"{"status":"EXPLODED"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_status_duration_forms() {
        let s = status(r#"{"status":"COMPLETED","duration":12.5}"#);
        assert_eq!(s.duration, Some(WireDuration::Seconds(12.5)));
        assert_eq!(s.duration.unwrap().to_string(), "12.5s");

        let s = status(r#"{"status":"COMPLETED","duration":"PT1M"}"#);
        assert_eq!(s.duration, Some(WireDuration::Text("PT1M".to_string())));
    }

    #[test]
    fn test_awaited_response_flattens() {
        let resp = SubmitContainerResponse {
            request_id: Some("req-1".to_string()),
            target_image: Some("wave.io/wt/abc/alpine:latest".to_string()),
            ..Default::default()
        };
        let detail = status(
            r#"{"status":"FAILED","reason":"exit 1","detailsUri":"https://x/1","vulnerabilities":{"HIGH":2}}"#,
        );
        let awaited = AwaitedContainerResponse::new(resp, BuildStatus::Failed, &detail);
        assert!(!awaited.succeeded());

        let json = serde_json::to_value(&awaited).unwrap();
        assert_eq!(json["requestId"], "req-1");
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["succeeded"], false);
        assert_eq!(json["reason"], "exit 1");
        assert_eq!(json["detailsUri"], "https://x/1");
        assert_eq!(json["vulnerabilities"]["HIGH"], 2);
    }

    #[test]
    fn test_inspect_layer_uris() {
        let resp: ContainerInspectResponse = serde_json::from_str(
            r#"{"container":{"hostName":"https://registry.example.com","imageName":"library/alpine",
               "manifest":{"layers":[{"digest":"sha256:aaa","size":10},{"digest":"sha256:bbb"}]}}}"#,
        )
        .unwrap();
        let resp = resp.with_layer_uris();
        let layers = resp.container["manifest"]["layers"].as_array().unwrap();
        assert_eq!(
            layers[0]["uri"],
            "https://registry.example.com/v2/library/alpine/blobs/sha256:aaa"
        );
        assert_eq!(
            layers[1]["uri"],
            "https://registry.example.com/v2/library/alpine/blobs/sha256:bbb"
        );
    }

    #[test]
    fn test_inspect_without_manifest_is_untouched() {
        let raw = r#"{"container":{"imageName":"alpine"}}"#;
        let resp: ContainerInspectResponse = serde_json::from_str(raw).unwrap();
        let before = resp.clone();
        assert_eq!(resp.with_layer_uris(), before);
    }

    #[test]
    fn test_service_info_decode() {
        let resp: ServiceInfoResponse =
            serde_json::from_str(r#"{"serviceInfo":{"version":"1.13.2","commitId":"abc"}}"#)
                .unwrap();
        assert_eq!(resp.service_info.version, "1.13.2");
    }
}

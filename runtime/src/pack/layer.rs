//! Packed layer values and their wire encoding.

use std::path::{Path, PathBuf};

use a3s_forge_core::api::ContainerLayer;
use a3s_forge_core::error::{ForgeError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Where the compressed bytes of a layer live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerLocation {
    /// Bytes carried in the request as a `data:` URI
    Inline(Vec<u8>),
    /// Reference to bytes in external storage
    External(String),
}

/// An immutable compressed layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedLayer {
    source: Option<PathBuf>,
    location: LayerLocation,
    uncompressed_size: Option<u64>,
    compressed_size: u64,
    digest: String,
    tar_digest: String,
}

impl PackedLayer {
    /// Build an inline layer from its tar and gzip streams.
    pub(crate) fn from_streams(source: &Path, tar: &[u8], gzip: Vec<u8>) -> Self {
        Self {
            source: Some(source.to_path_buf()),
            uncompressed_size: Some(tar.len() as u64),
            compressed_size: gzip.len() as u64,
            digest: prefixed_digest(&gzip),
            tar_digest: prefixed_digest(tar),
            location: LayerLocation::Inline(gzip),
        }
    }

    /// Reference a layer already uploaded elsewhere.
    pub fn external(
        uri: impl Into<String>,
        digest: impl Into<String>,
        compressed_size: u64,
        tar_digest: impl Into<String>,
    ) -> Self {
        Self {
            source: None,
            location: LayerLocation::External(uri.into()),
            uncompressed_size: None,
            compressed_size,
            digest: digest.into(),
            tar_digest: tar_digest.into(),
        }
    }

    /// Decode a layer received in wire form (e.g. from a container config file).
    ///
    /// Inline layers are base64-decoded and their size and digest verified.
    pub fn from_wire(layer: ContainerLayer) -> Result<Self> {
        if !layer.is_inline() {
            return Ok(Self::external(
                layer.location,
                layer.gzip_digest,
                layer.gzip_size,
                layer.tar_digest,
            ));
        }

        let payload = &layer.location[ContainerLayer::DATA_URI_PREFIX.len()..];
        // Accept both `data:<b64>` and `data:<mime>;base64,<b64>`
        let encoded = payload.split_once(',').map(|(_, d)| d).unwrap_or(payload);
        let data = BASE64.decode(encoded.trim()).map_err(|e| {
            ForgeError::validation(format!("Invalid inline layer data: {}", e))
        })?;

        if data.len() as u64 != layer.gzip_size {
            return Err(ForgeError::validation(format!(
                "Inline layer size mismatch - declared: {}, actual: {}",
                layer.gzip_size,
                data.len()
            )));
        }
        let digest = prefixed_digest(&data);
        if layer.skip_hashing != Some(true) && digest != layer.gzip_digest {
            return Err(ForgeError::validation(format!(
                "Inline layer digest mismatch - declared: {}, actual: {}",
                layer.gzip_digest, digest
            )));
        }

        Ok(Self {
            source: None,
            compressed_size: data.len() as u64,
            uncompressed_size: None,
            digest,
            tar_digest: layer.tar_digest,
            location: LayerLocation::Inline(data),
        })
    }

    /// Attach the path the layer was produced from.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn location(&self) -> &LayerLocation {
        &self.location
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.location, LayerLocation::Inline(_))
    }

    /// Compressed bytes, for inline layers.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.location {
            LayerLocation::Inline(data) => Some(data),
            LayerLocation::External(_) => None,
        }
    }

    pub fn uncompressed_size(&self) -> Option<u64> {
        self.uncompressed_size
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// `sha256:<hex>` of the compressed bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// `sha256:<hex>` of the uncompressed tar stream.
    pub fn tar_digest(&self) -> &str {
        &self.tar_digest
    }

    /// Wire form, without consuming the layer.
    pub fn to_wire(&self) -> ContainerLayer {
        self.clone().into_wire()
    }

    /// Wire form; inline bytes become a `data:` URI.
    pub fn into_wire(self) -> ContainerLayer {
        let location = match self.location {
            LayerLocation::Inline(data) => {
                format!("{}{}", ContainerLayer::DATA_URI_PREFIX, BASE64.encode(data))
            }
            LayerLocation::External(uri) => uri,
        };
        ContainerLayer {
            location,
            gzip_digest: self.digest,
            gzip_size: self.compressed_size,
            tar_digest: self.tar_digest,
            skip_hashing: None,
        }
    }
}

/// Ordered layers of one request; insertion order is the stacking order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerSet {
    layers: Vec<PackedLayer>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: PackedLayer) {
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[PackedLayer] {
        &self.layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackedLayer> {
        self.layers.iter()
    }

    /// Sum of compressed sizes of inline layers.
    pub fn inline_size(&self) -> u64 {
        self.layers
            .iter()
            .filter(|l| l.is_inline())
            .map(|l| l.compressed_size)
            .sum()
    }

    /// Consume the set into wire layers, keeping order.
    pub fn into_wire(self) -> Vec<ContainerLayer> {
        self.layers.into_iter().map(PackedLayer::into_wire).collect()
    }
}

impl From<Vec<PackedLayer>> for LayerSet {
    fn from(layers: Vec<PackedLayer>) -> Self {
        Self { layers }
    }
}

impl Extend<PackedLayer> for LayerSet {
    fn extend<I: IntoIterator<Item = PackedLayer>>(&mut self, iter: I) {
        self.layers.extend(iter);
    }
}

/// Compute SHA256 digest of raw bytes.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest with the `sha256:` prefix.
pub fn prefixed_digest(data: &[u8]) -> String {
    format!("sha256:{}", sha256_bytes(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline_layer(bytes: &[u8]) -> PackedLayer {
        PackedLayer::from_streams(Path::new("ctx"), b"tar-bytes", bytes.to_vec())
    }

    #[test]
    fn test_sha256_bytes() {
        assert_eq!(
            sha256_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(prefixed_digest(b"hello").starts_with("sha256:2cf24dba"));
    }

    #[test]
    fn test_from_streams_sizes_and_digests() {
        let layer = inline_layer(b"gzip-bytes");
        assert_eq!(layer.uncompressed_size(), Some(9));
        assert_eq!(layer.compressed_size(), 10);
        assert_eq!(layer.digest(), prefixed_digest(b"gzip-bytes"));
        assert_eq!(layer.tar_digest(), prefixed_digest(b"tar-bytes"));
        assert_eq!(layer.source(), Some(Path::new("ctx")));
        assert_eq!(layer.data(), Some(&b"gzip-bytes"[..]));
    }

    #[test]
    fn test_inline_wire_encoding() {
        let layer = inline_layer(b"abc");
        let wire = layer.to_wire();
        assert_eq!(wire.location, "data:YWJj");
        assert_eq!(wire.gzip_size, 3);
        assert_eq!(wire.gzip_digest, layer.digest());
        assert!(wire.is_inline());

        let decoded = PackedLayer::from_wire(wire).unwrap();
        assert_eq!(decoded.data(), Some(&b"abc"[..]));
        assert_eq!(decoded.digest(), layer.digest());
    }

    #[test]
    fn test_from_wire_with_media_type() {
        let wire = ContainerLayer {
            location: "data:application/gzip;base64,YWJj".to_string(),
            gzip_digest: prefixed_digest(b"abc"),
            gzip_size: 3,
            tar_digest: "sha256:t".to_string(),
            skip_hashing: None,
        };
        let layer = PackedLayer::from_wire(wire).unwrap();
        assert_eq!(layer.data(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_from_wire_rejects_mismatches() {
        let wire = ContainerLayer {
            location: "data:YWJj".to_string(),
            gzip_digest: prefixed_digest(b"abc"),
            gzip_size: 4,
            tar_digest: "sha256:t".to_string(),
            skip_hashing: None,
        };
        assert!(matches!(
            PackedLayer::from_wire(wire.clone()),
            Err(ForgeError::Validation(_))
        ));

        let wrong_digest = ContainerLayer {
            gzip_size: 3,
            gzip_digest: "sha256:0000".to_string(),
            ..wire.clone()
        };
        assert!(PackedLayer::from_wire(wrong_digest.clone()).is_err());

        let skipped = ContainerLayer {
            skip_hashing: Some(true),
            ..wrong_digest
        };
        assert!(PackedLayer::from_wire(skipped).is_ok());

        let bad_base64 = ContainerLayer {
            location: "data:!!!".to_string(),
            ..wire
        };
        assert!(PackedLayer::from_wire(bad_base64).is_err());
    }

    #[test]
    fn test_external_layer() {
        let wire = ContainerLayer {
            location: "https://storage.example.com/l.tar.gz".to_string(),
            gzip_digest: "sha256:aa".to_string(),
            gzip_size: 20 * 1024 * 1024,
            tar_digest: "sha256:bb".to_string(),
            skip_hashing: None,
        };
        let layer = PackedLayer::from_wire(wire.clone()).unwrap();
        assert!(!layer.is_inline());
        assert_eq!(layer.data(), None);
        assert_eq!(layer.compressed_size(), 20 * 1024 * 1024);
        assert_eq!(layer.into_wire(), wire);
    }

    #[test]
    fn test_layer_set_order_and_inline_size() {
        let mut set = LayerSet::new();
        assert!(set.is_empty());
        set.push(inline_layer(b"first"));
        set.push(PackedLayer::external("s3://b/l", "sha256:x", 1000, "sha256:y"));
        set.push(inline_layer(b"second!"));

        assert_eq!(set.len(), 3);
        assert_eq!(set.inline_size(), 5 + 7);

        let wire = set.into_wire();
        assert_eq!(wire[0].location, format!("data:{}", BASE64.encode(b"first")));
        assert_eq!(wire[1].location, "s3://b/l");
        assert_eq!(wire[2].gzip_size, 7);
    }
}

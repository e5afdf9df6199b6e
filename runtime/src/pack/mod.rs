//! Build-context and layer packing.
//!
//! - `ignore`: `.dockerignore` rule compilation and matching
//! - `packer`: deterministic tar+gzip packing of a directory
//! - `layer`: packed layer values and their wire encoding
//! - `budget`: compressed-size limits per layer and per request

pub mod budget;
pub mod ignore;
pub mod layer;
pub mod packer;

pub use budget::{check_aggregate, check_layer, LayerBudget};
pub use ignore::{IgnoreFilter, IgnoreRule, IGNORE_FILE};
pub use layer::{sha256_bytes, LayerLocation, LayerSet, PackedLayer};
pub use packer::Packer;

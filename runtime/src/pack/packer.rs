//! Deterministic tar+gzip packing of a directory tree.
//!
//! Entries are enumerated recursively, filtered, sorted by relative path and
//! written with normalised headers, so the same tree always yields the same
//! bytes and digest.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use a3s_forge_core::error::{ForgeError, Result};
use flate2::{Compression, GzBuilder};

use super::ignore::IgnoreFilter;
use super::layer::PackedLayer;

/// Gzip OS byte for "unknown".
const GZIP_OS_UNKNOWN: u8 = 255;

/// Packs a directory into an inline [`PackedLayer`].
#[derive(Debug, Clone, Default)]
pub struct Packer {
    filter: IgnoreFilter,
    preserve_timestamps: bool,
}

#[derive(Debug)]
enum EntryKind {
    Dir,
    File,
    Symlink(PathBuf),
}

/// One archive member, collected before writing.
#[derive(Debug)]
struct ArchiveEntry {
    /// `/`-separated path relative to the packed root
    relative: String,
    full: PathBuf,
    kind: EntryKind,
    mode: u32,
    mtime: u64,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude paths matched by `filter`.
    pub fn with_filter(mut self, filter: IgnoreFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Keep file modification times instead of zeroing them.
    pub fn with_preserve_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_timestamps = preserve;
        self
    }

    /// Pack `dir` into a gzip-compressed tar layer held in memory.
    pub fn pack(&self, dir: &Path) -> Result<PackedLayer> {
        let metadata = std::fs::metadata(dir)
            .map_err(|e| ForgeError::pack(dir, format!("cannot access path: {}", e)))?;
        if !metadata.is_dir() {
            return Err(ForgeError::pack(dir, "not a directory"));
        }

        let mut entries = Vec::new();
        self.collect_entries(dir, "", &mut entries)?;
        entries.sort_by(|a, b| a.relative.cmp(&b.relative));

        let tar = self.write_tar(dir, &entries)?;
        let gzip = compress(&tar).map_err(|e| ForgeError::pack(dir, format!("gzip failed: {}", e)))?;

        let layer = PackedLayer::from_streams(dir, &tar, gzip);
        tracing::info!(
            path = %dir.display(),
            entries = entries.len(),
            uncompressed = tar.len(),
            compressed = layer.compressed_size(),
            digest = %layer.digest(),
            "Packed layer"
        );
        Ok(layer)
    }

    /// Recursively collect entries under `current`, applying the filter.
    fn collect_entries(
        &self,
        current: &Path,
        prefix: &str,
        out: &mut Vec<ArchiveEntry>,
    ) -> Result<()> {
        let read_dir = std::fs::read_dir(current)
            .map_err(|e| ForgeError::pack(current, format!("failed to read directory: {}", e)))?;

        for entry in read_dir {
            let entry = entry.map_err(|e| {
                ForgeError::pack(current, format!("failed to read directory entry: {}", e))
            })?;
            let full = entry.path();

            let name = entry.file_name();
            let name = name
                .to_str()
                .ok_or_else(|| ForgeError::pack(&full, "file name is not valid UTF-8"))?;
            let relative = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", prefix, name)
            };

            // symlink_metadata: links are archived, never followed
            let metadata = std::fs::symlink_metadata(&full)
                .map_err(|e| ForgeError::pack(&full, format!("failed to read metadata: {}", e)))?;
            let file_type = metadata.file_type();

            let kind = if file_type.is_symlink() {
                let target = std::fs::read_link(&full)
                    .map_err(|e| ForgeError::pack(&full, format!("failed to read link: {}", e)))?;
                EntryKind::Symlink(target)
            } else if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                tracing::warn!(path = %full.display(), "Skipping special file");
                continue;
            };

            let is_dir = matches!(kind, EntryKind::Dir);
            let excluded = self.filter.matches(&relative, is_dir);

            if excluded {
                // A negation may still re-include something below
                if is_dir && self.filter.has_negations() {
                    self.collect_entries(&full, &relative, out)?;
                }
                continue;
            }

            let mtime = if self.preserve_timestamps {
                metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0)
            } else {
                0
            };

            out.push(ArchiveEntry {
                relative: relative.clone(),
                full: full.clone(),
                mode: entry_mode(&metadata, &kind),
                kind,
                mtime,
            });

            if is_dir {
                self.collect_entries(&full, &relative, out)?;
            }
        }

        Ok(())
    }

    /// Write the sorted entries as a finalised tar stream.
    fn write_tar(&self, root: &Path, entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());

        for entry in entries {
            let mut header = tar::Header::new_gnu();
            header.set_mode(entry.mode);
            header.set_uid(0);
            header.set_gid(0);
            header.set_mtime(entry.mtime);

            let appended = match &entry.kind {
                EntryKind::Dir => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_size(0);
                    builder.append_data(&mut header, &entry.relative, std::io::empty())
                }
                EntryKind::File => {
                    let data = std::fs::read(&entry.full).map_err(|e| {
                        ForgeError::pack(&entry.full, format!("failed to read file: {}", e))
                    })?;
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_size(data.len() as u64);
                    builder.append_data(&mut header, &entry.relative, data.as_slice())
                }
                EntryKind::Symlink(target) => {
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    builder.append_link(&mut header, &entry.relative, target)
                }
            };
            appended.map_err(|e| {
                ForgeError::pack(
                    &entry.full,
                    format!("failed to add {} to archive: {}", entry.relative, e),
                )
            })?;
        }

        builder
            .into_inner()
            .map_err(|e| ForgeError::pack(root, format!("failed to finalize archive: {}", e)))
    }
}

/// Gzip with a fixed header so output does not depend on time or host.
fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .operating_system(GZIP_OS_UNKNOWN)
        .write(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(unix)]
fn entry_mode(metadata: &std::fs::Metadata, _kind: &EntryKind) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn entry_mode(metadata: &std::fs::Metadata, kind: &EntryKind) -> u32 {
    match kind {
        EntryKind::Dir => 0o755,
        EntryKind::Symlink(_) => 0o777,
        EntryKind::File if metadata.permissions().readonly() => 0o444,
        EntryKind::File => 0o644,
    }
}

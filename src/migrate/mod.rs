//! Version 0 to version 1 migration driver.
//!
//! [`migrate_bytes`] is the whole transform in memory. [`migrate_file`] adds
//! the filesystem side: outputs are staged as temp files next to their
//! destinations and only renamed into place once every step has succeeded.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::Result;
use crate::codec::recover;
use crate::container::TreeBuilder;
use crate::envelope::{UPGRADE_VERSION, assemble, inflate_metadata, parse_header, split_payload};
use crate::error::Effect;
use crate::stages::map_state;

mod report;

pub use report::MigrationReport;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MigrateError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move output into place at {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
    #[error("failed to write report: {0}")]
    Report(#[source] std::io::Error),
}

impl MigrateError {
    /// Temp files are dropped on failure, but if the intermediate rename fails
    /// the combined file is already in place.
    pub fn effect(&self) -> Effect {
        match self {
            MigrateError::Io { .. } => Effect::None,
            MigrateError::Persist { .. } | MigrateError::Report(_) => Effect::Unknown,
        }
    }
}

/// Where the outputs of [`migrate_file`] go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPaths {
    /// Standalone version 1 container, kept only when set.
    pub intermediate: Option<PathBuf>,
    /// Upgraded file: new header, container, original tail.
    pub combined: PathBuf,
}

impl MigrationPaths {
    pub fn in_dir(dir: &Path, intermediate_name: Option<&str>, combined_name: &str) -> Self {
        Self {
            intermediate: intermediate_name.map(|name| dir.join(name)),
            combined: dir.join(combined_name),
        }
    }
}

/// Output of an in-memory migration.
#[derive(Debug, Clone)]
pub struct Migrated {
    /// Encoded version 1 container on its own.
    pub container: Vec<u8>,
    /// Full upgraded file.
    pub combined: Vec<u8>,
    pub report: MigrationReport,
}

pub fn migrate_bytes(input: &[u8]) -> Result<Migrated> {
    let header = parse_header(input)?;
    tracing::debug!(
        format_code = header.format_code,
        version_code = header.version_code,
        metadata_len = header.metadata_len,
        "legacy header parsed"
    );
    if header.version_code != 0 {
        tracing::warn!(
            version_code = header.version_code,
            "legacy file does not declare version 0, migrating anyway"
        );
    }
    let (payload, tail) = split_payload(input, header.metadata_len)?;
    let document = inflate_metadata(payload)?;
    let state = recover(&document)?;

    let mut builder = TreeBuilder::new();
    let stages = map_state(&state, &mut builder)?;
    let container = builder.finish()?.encode()?;
    let combined = assemble(header.format_code, &container, tail);
    tracing::debug!(
        container_bytes = container.len(),
        tail_bytes = tail.len(),
        "container assembled"
    );

    let report = MigrationReport {
        format_code: header.format_code,
        source_version: header.version_code,
        target_version: UPGRADE_VERSION,
        metadata_bytes: header.metadata_len,
        container_bytes: container.len() as u64,
        tail_bytes: tail.len() as u64,
        stages,
    };
    Ok(Migrated {
        container,
        combined,
        report,
    })
}

/// Migrates `input` and writes the outputs named in `paths`.
///
/// Nothing appears at either destination unless the whole migration
/// succeeded.
pub fn migrate_file(input: &Path, paths: &MigrationPaths) -> Result<MigrationReport> {
    let migrated = migrate_bytes(&read_input(input)?)?;

    let intermediate = match &paths.intermediate {
        Some(path) => Some((stage(path, &migrated.container)?, path)),
        None => None,
    };
    let combined = stage(&paths.combined, &migrated.combined)?;

    // Combined first: a failed rename there leaves any earlier intermediate untouched.
    persist(combined, &paths.combined)?;
    if let Some((temp, path)) = intermediate {
        persist(temp, path)?;
    }

    tracing::info!(
        input = %input.display(),
        output = %paths.combined.display(),
        stages = migrated.report.stages.len(),
        "migration complete"
    );
    Ok(migrated.report)
}

pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path).map_err(|source| MigrateError::Io {
        path: path.to_path_buf(),
        source,
    })?)
}

/// Writes `data` to a temp file in the destination directory.
fn stage(dest: &Path, data: &[u8]) -> Result<NamedTempFile> {
    let dir = match dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let io_error = |source| MigrateError::Io {
        path: dest.to_path_buf(),
        source,
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
    temp.write_all(data).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    Ok(temp)
}

fn persist(temp: NamedTempFile, dest: &Path) -> Result<()> {
    temp.persist(dest).map_err(|source| MigrateError::Persist {
        path: dest.to_path_buf(),
        source,
    })?;
    Ok(())
}

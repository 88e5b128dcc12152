use thiserror::Error;

use crate::codec::CodecError;
use crate::container::ContainerError;
use crate::envelope::{EnvelopeError, MetadataError};
use crate::migrate::MigrateError;
use crate::stages::StageError;

/// What we know about side effects when an error is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Effect {
    /// Definitely no output files were written.
    None,
    /// Output files definitely exist.
    Some,
    /// We don't know whether output files were left behind.
    Unknown,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Some => "some",
            Effect::Unknown => "unknown",
        }
    }
}

/// Crate-level convenience error.
///
/// A thin wrapper over the per-component errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Migrate(#[from] MigrateError),
}

impl Error {
    /// Stable category name for logs and machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Envelope(_) => "format",
            Error::Metadata(MetadataError::Decompress(_)) => "decompression",
            Error::Metadata(_) => "parse",
            Error::Codec(CodecError::UnsupportedKind { .. }) => "unsupported_type",
            Error::Codec(_) => "parse",
            Error::Container(
                ContainerError::Decode(_)
                | ContainerError::MagicMismatch { .. }
                | ContainerError::UnsupportedVersion { .. }
                | ContainerError::CrcMismatch { .. }
                | ContainerError::Malformed { .. },
            ) => "format",
            Error::Container(_) => "write",
            Error::Stage(StageError::MissingField { .. }) => "missing_field",
            Error::Stage(_) => "invalid_field",
            Error::Migrate(_) => "io",
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Error::Migrate(e) => e.effect(),
            _ => Effect::None,
        }
    }
}

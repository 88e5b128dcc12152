#![forbid(unsafe_code)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod container;
pub mod envelope;
pub mod error;
pub mod migrate;
mod paths;
pub mod stages;
pub mod telemetry;

pub use error::{Effect, Error};
pub type Result<T> = std::result::Result<T, Error>;

pub use crate::codec::{BufferKind, LegacyNode, TypedBuffer, recover};
pub use crate::container::{Container, ContainerWriter, ElementKind, TreeBuilder, Values};
pub use crate::envelope::{Header, UPGRADE_VERSION};
pub use crate::migrate::{MigrationPaths, MigrationReport, migrate_bytes, migrate_file};

//! Version 1 hierarchical container: named groups holding typed, shaped datasets.
//!
//! Stage mapping talks to the [`ContainerWriter`] trait only. [`TreeBuilder`]
//! is the in-memory implementation; it enforces the writer contract and
//! yields a [`Container`] that serializes itself with [`Container::encode`].
//!
//! The serialized form is a CBOR tree framed with the `KHC01` magic. It is
//! not HDF5 and HDF5 readers cannot open it; outputs default to the `.khc`
//! extension.

use std::convert::Infallible;
use std::fmt;

use thiserror::Error;

use crate::codec::{BufferKind, TypedBuffer};

mod encode;
mod tree;

pub use encode::{CONTAINER_FORMAT_VERSION, CONTAINER_MAGIC};
pub use tree::{Container, Dataset, Group, TreeBuilder};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContainerError {
    #[error("invalid name {name:?} under {parent}")]
    InvalidName { parent: String, name: String },
    #[error("name already used: {path}")]
    DuplicateName { path: String },
    #[error("unknown group handle {0}")]
    UnknownGroup(usize),
    #[error("unknown dataset handle {0}")]
    UnknownDataset(usize),
    #[error("dataset {path} declared as {expected}, got {got} values")]
    KindMismatch {
        path: String,
        expected: ElementKind,
        got: String,
    },
    #[error("dataset {path} shape {shape:?} holds {expected} elements, got {got}")]
    ShapeMismatch {
        path: String,
        shape: Vec<u64>,
        expected: u64,
        got: u64,
    },
    #[error("dataset {path} already written")]
    AlreadyWritten { path: String },
    #[error("dataset {path} created but never written")]
    NeverWritten { path: String },
    #[error("container encode failed: {0}")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
    #[error("container decode failed: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("container magic mismatch: got {got:?}")]
    MagicMismatch { got: Vec<u8> },
    #[error("container format unsupported: got {got}, supported {supported}")]
    UnsupportedVersion { got: u32, supported: u32 },
    #[error("container crc32c mismatch: expected {expected:#x}, got {got:#x}")]
    CrcMismatch { expected: u32, got: u32 },
    #[error("container malformed: {reason}")]
    Malformed { reason: String },
}

/// Declared element type of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Number(BufferKind),
    /// Fixed-length string of exactly this many bytes.
    FixedString(usize),
}

impl ElementKind {
    pub const INT32: ElementKind = ElementKind::Number(BufferKind::Int32);
    pub const UINT8: ElementKind = ElementKind::Number(BufferKind::Uint8);
    pub const UINT32: ElementKind = ElementKind::Number(BufferKind::Uint32);
    pub const FLOAT64: ElementKind = ElementKind::Number(BufferKind::Float64);
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Number(kind) => f.write_str(kind.name()),
            ElementKind::FixedString(len) => write!(f, "String[{len}]"),
        }
    }
}

/// Payload written into a dataset.
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    Number(TypedBuffer),
    String(String),
}

impl Values {
    pub fn element_count(&self) -> u64 {
        match self {
            Values::Number(buffer) => buffer.len() as u64,
            Values::String(_) => 1,
        }
    }

    pub fn as_buffer(&self) -> Option<&TypedBuffer> {
        match self {
            Values::Number(buffer) => Some(buffer),
            Values::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Values::Number(_) => None,
            Values::String(s) => Some(s),
        }
    }

    fn describe(&self) -> String {
        match self {
            Values::Number(buffer) => buffer.kind().name().to_string(),
            Values::String(s) => format!("String[{}]", s.len()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatasetId(pub(crate) usize);

/// Append-only builder interface for a fresh container.
///
/// Names are unique within a group across both groups and datasets. Each
/// dataset is written exactly once, with a payload matching its declared
/// kind and shape.
pub trait ContainerWriter {
    fn root(&self) -> GroupId;

    fn create_group(&mut self, parent: GroupId, name: &str) -> Result<GroupId, ContainerError>;

    fn create_dataset(
        &mut self,
        parent: GroupId,
        name: &str,
        kind: ElementKind,
        shape: &[u64],
    ) -> Result<DatasetId, ContainerError>;

    fn write(&mut self, dataset: DatasetId, values: Values) -> Result<(), ContainerError>;
}

/// Writes a scalar-shaped fixed-length string sized to `value`.
pub fn write_string<W: ContainerWriter + ?Sized>(
    writer: &mut W,
    parent: GroupId,
    name: &str,
    value: &str,
) -> Result<(), ContainerError> {
    let handle = writer.create_dataset(parent, name, ElementKind::FixedString(value.len()), &[])?;
    writer.write(handle, Values::String(value.to_string()))
}

/// Writes a single number as a scalar dataset of `kind`.
pub fn write_scalar<W: ContainerWriter + ?Sized>(
    writer: &mut W,
    parent: GroupId,
    name: &str,
    kind: BufferKind,
    value: f64,
) -> Result<(), ContainerError> {
    let handle = writer.create_dataset(parent, name, ElementKind::Number(kind), &[])?;
    writer.write(handle, Values::Number(kind.cast(&[value])))
}

/// Writes `values` converted to `kind` as a one-dimensional dataset.
pub fn write_vector<W: ContainerWriter + ?Sized>(
    writer: &mut W,
    parent: GroupId,
    name: &str,
    kind: BufferKind,
    values: &[f64],
) -> Result<(), ContainerError> {
    write_shaped(writer, parent, name, kind, &[values.len() as u64], values)
}

pub fn write_shaped<W: ContainerWriter + ?Sized>(
    writer: &mut W,
    parent: GroupId,
    name: &str,
    kind: BufferKind,
    shape: &[u64],
    values: &[f64],
) -> Result<(), ContainerError> {
    let handle = writer.create_dataset(parent, name, ElementKind::Number(kind), shape)?;
    writer.write(handle, Values::Number(kind.cast(values)))
}

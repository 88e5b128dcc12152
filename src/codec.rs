//! Typed numeric buffers embedded in the legacy metadata document.
//!
//! The legacy writer serialized typed arrays as objects carrying a class tag
//! and a plain value list:
//!
//! ```json
//! {"_TypedArray_class": "Float64Array", "_TypedArray_values": [1.5, -2.25]}
//! ```
//!
//! [`recover`] turns a parsed document into a [`LegacyNode`] tree in which
//! every such object has been replaced by a [`TypedBuffer`] of the declared
//! kind. The input document is never modified.

use serde_json::Value;
use thiserror::Error;

pub const CLASS_KEY: &str = "_TypedArray_class";
pub const VALUES_KEY: &str = "_TypedArray_values";

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum CodecError {
    #[error("unrecognized typed array class '{tag}'")]
    UnsupportedKind { tag: String },
    #[error("typed array of class '{tag}' has no value list")]
    MissingValues { tag: String },
    #[error("typed array of class '{tag}' has non-numeric value at index {index}")]
    InvalidValue { tag: String, index: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

const KIND_TAGS: [(&str, BufferKind); 10] = [
    ("Int8Array", BufferKind::Int8),
    ("Uint8Array", BufferKind::Uint8),
    ("Int16Array", BufferKind::Int16),
    ("Uint16Array", BufferKind::Uint16),
    ("Int32Array", BufferKind::Int32),
    ("Uint32Array", BufferKind::Uint32),
    ("Int64Array", BufferKind::Int64),
    ("Uint64Array", BufferKind::Uint64),
    ("Float32Array", BufferKind::Float32),
    ("Float64Array", BufferKind::Float64),
];

impl BufferKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        KIND_TAGS
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, kind)| *kind)
    }

    pub fn tag(self) -> &'static str {
        match self {
            BufferKind::Int8 => "Int8Array",
            BufferKind::Uint8 => "Uint8Array",
            BufferKind::Int16 => "Int16Array",
            BufferKind::Uint16 => "Uint16Array",
            BufferKind::Int32 => "Int32Array",
            BufferKind::Uint32 => "Uint32Array",
            BufferKind::Int64 => "Int64Array",
            BufferKind::Uint64 => "Uint64Array",
            BufferKind::Float32 => "Float32Array",
            BufferKind::Float64 => "Float64Array",
        }
    }

    /// Short name used by the hierarchical container (`Float64`, `Uint8`, ...).
    pub fn name(self) -> &'static str {
        self.tag().trim_end_matches("Array")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        KIND_TAGS
            .iter()
            .find(|(_, kind)| kind.name() == name)
            .map(|(_, kind)| *kind)
    }

    /// Bytes per element.
    pub fn width(self) -> usize {
        match self {
            BufferKind::Int8 | BufferKind::Uint8 => 1,
            BufferKind::Int16 | BufferKind::Uint16 => 2,
            BufferKind::Int32 | BufferKind::Uint32 | BufferKind::Float32 => 4,
            BufferKind::Int64 | BufferKind::Uint64 | BufferKind::Float64 => 8,
        }
    }

    /// Builds a buffer of this kind, converting each value the way a typed
    /// array assignment does: integers truncate and wrap, floats round.
    pub fn cast(self, values: &[f64]) -> TypedBuffer {
        match self {
            BufferKind::Int8 => TypedBuffer::Int8(collect(values, |v| wrap(v, 8) as u8 as i8)),
            BufferKind::Uint8 => TypedBuffer::Uint8(collect(values, |v| wrap(v, 8) as u8)),
            BufferKind::Int16 => TypedBuffer::Int16(collect(values, |v| wrap(v, 16) as u16 as i16)),
            BufferKind::Uint16 => TypedBuffer::Uint16(collect(values, |v| wrap(v, 16) as u16)),
            BufferKind::Int32 => TypedBuffer::Int32(collect(values, |v| wrap(v, 32) as u32 as i32)),
            BufferKind::Uint32 => TypedBuffer::Uint32(collect(values, |v| wrap(v, 32) as u32)),
            BufferKind::Int64 => TypedBuffer::Int64(collect(values, |v| wrap(v, 64) as i64)),
            BufferKind::Uint64 => TypedBuffer::Uint64(collect(values, |v| wrap(v, 64))),
            BufferKind::Float32 => TypedBuffer::Float32(collect(values, |v| v as f32)),
            BufferKind::Float64 => TypedBuffer::Float64(values.to_vec()),
        }
    }
}

fn collect<T>(values: &[f64], f: impl Fn(f64) -> T) -> Vec<T> {
    values.iter().copied().map(f).collect()
}

/// Truncates toward zero and reduces modulo 2^bits; non-finite values map to 0.
///
/// The reduction happens in integer space: `2^64 - n` is not representable
/// in f64 for small `n`.
fn wrap(value: f64, bits: u32) -> u64 {
    if !value.is_finite() {
        return 0;
    }
    (value.trunc() as i128).rem_euclid(1i128 << bits) as u64
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypedBuffer {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Int16(Vec<i16>),
    Uint16(Vec<u16>),
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Int64(Vec<i64>),
    Uint64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl TypedBuffer {
    pub fn kind(&self) -> BufferKind {
        match self {
            TypedBuffer::Int8(_) => BufferKind::Int8,
            TypedBuffer::Uint8(_) => BufferKind::Uint8,
            TypedBuffer::Int16(_) => BufferKind::Int16,
            TypedBuffer::Uint16(_) => BufferKind::Uint16,
            TypedBuffer::Int32(_) => BufferKind::Int32,
            TypedBuffer::Uint32(_) => BufferKind::Uint32,
            TypedBuffer::Int64(_) => BufferKind::Int64,
            TypedBuffer::Uint64(_) => BufferKind::Uint64,
            TypedBuffer::Float32(_) => BufferKind::Float32,
            TypedBuffer::Float64(_) => BufferKind::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedBuffer::Int8(v) => v.len(),
            TypedBuffer::Uint8(v) => v.len(),
            TypedBuffer::Int16(v) => v.len(),
            TypedBuffer::Uint16(v) => v.len(),
            TypedBuffer::Int32(v) => v.len(),
            TypedBuffer::Uint32(v) => v.len(),
            TypedBuffer::Int64(v) => v.len(),
            TypedBuffer::Uint64(v) => v.len(),
            TypedBuffer::Float32(v) => v.len(),
            TypedBuffer::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            TypedBuffer::Int8(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Uint8(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Int16(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Uint16(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Int32(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Uint32(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Int64(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Uint64(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Float32(v) => collect_f64(v, |x| x as f64),
            TypedBuffer::Float64(v) => v.clone(),
        }
    }

    /// Converts into another kind, going through f64.
    pub fn cast(&self, kind: BufferKind) -> TypedBuffer {
        if self.kind() == kind {
            return self.clone();
        }
        kind.cast(&self.to_f64())
    }

    /// Packs elements little-endian.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * self.kind().width());
        match self {
            TypedBuffer::Int8(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TypedBuffer::Uint8(v) => out.extend_from_slice(v),
            TypedBuffer::Int16(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TypedBuffer::Uint16(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TypedBuffer::Int32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TypedBuffer::Uint32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TypedBuffer::Int64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TypedBuffer::Uint64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TypedBuffer::Float32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            TypedBuffer::Float64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        }
        out
    }

    /// Inverse of [`TypedBuffer::to_le_bytes`]; `None` if the length is not a
    /// multiple of the element width.
    pub fn from_le_bytes(kind: BufferKind, bytes: &[u8]) -> Option<TypedBuffer> {
        let width = kind.width();
        if bytes.len() % width != 0 {
            return None;
        }
        let chunks = bytes.chunks_exact(width);
        let buffer = match kind {
            BufferKind::Int8 => TypedBuffer::Int8(chunks.map(|c| c[0] as i8).collect()),
            BufferKind::Uint8 => TypedBuffer::Uint8(bytes.to_vec()),
            BufferKind::Int16 => TypedBuffer::Int16(chunks.map(|c| i16::from_le_bytes([c[0], c[1]])).collect()),
            BufferKind::Uint16 => TypedBuffer::Uint16(chunks.map(|c| u16::from_le_bytes([c[0], c[1]])).collect()),
            BufferKind::Int32 => TypedBuffer::Int32(chunks.map(|c| i32::from_le_bytes(array4(c))).collect()),
            BufferKind::Uint32 => TypedBuffer::Uint32(chunks.map(|c| u32::from_le_bytes(array4(c))).collect()),
            BufferKind::Float32 => TypedBuffer::Float32(chunks.map(|c| f32::from_le_bytes(array4(c))).collect()),
            BufferKind::Int64 => TypedBuffer::Int64(chunks.map(|c| i64::from_le_bytes(array8(c))).collect()),
            BufferKind::Uint64 => TypedBuffer::Uint64(chunks.map(|c| u64::from_le_bytes(array8(c))).collect()),
            BufferKind::Float64 => TypedBuffer::Float64(chunks.map(|c| f64::from_le_bytes(array8(c))).collect()),
        };
        Some(buffer)
    }
}

fn collect_f64<T: Copy>(values: &[T], f: impl Fn(T) -> f64) -> Vec<f64> {
    values.iter().copied().map(f).collect()
}

fn array4(chunk: &[u8]) -> [u8; 4] {
    [chunk[0], chunk[1], chunk[2], chunk[3]]
}

fn array8(chunk: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(chunk);
    out
}

/// Legacy document with typed arrays recovered.
///
/// Objects keep their document key order.
#[derive(Clone, Debug, PartialEq)]
pub enum LegacyNode {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<LegacyNode>),
    Object(Vec<(String, LegacyNode)>),
    Buffer(TypedBuffer),
}

impl LegacyNode {
    pub fn get(&self, key: &str) -> Option<&LegacyNode> {
        match self {
            LegacyNode::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LegacyNode::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LegacyNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LegacyNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[LegacyNode]> {
        match self {
            LegacyNode::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[(String, LegacyNode)]> {
        match self {
            LegacyNode::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Element count of an array or typed buffer.
    pub fn len(&self) -> Option<usize> {
        match self {
            LegacyNode::Array(items) => Some(items.len()),
            LegacyNode::Buffer(buffer) => Some(buffer.len()),
            _ => None,
        }
    }

    /// Numeric contents of a typed buffer or an array of plain numbers.
    pub fn numbers(&self) -> Option<Vec<f64>> {
        match self {
            LegacyNode::Buffer(buffer) => Some(buffer.to_f64()),
            LegacyNode::Array(items) => items.iter().map(number_like).collect(),
            _ => None,
        }
    }
}

fn number_like(node: &LegacyNode) -> Option<f64> {
    match node {
        LegacyNode::Number(n) => Some(*n),
        LegacyNode::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        LegacyNode::Null => Some(f64::NAN),
        _ => None,
    }
}

/// Rebuilds `value` with every tagged typed array decoded.
pub fn recover(value: &Value) -> Result<LegacyNode, CodecError> {
    match value {
        Value::Null => Ok(LegacyNode::Null),
        Value::Bool(b) => Ok(LegacyNode::Bool(*b)),
        Value::Number(n) => Ok(LegacyNode::Number(n.as_f64().unwrap_or(f64::NAN))),
        Value::String(s) => Ok(LegacyNode::String(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(recover)
            .collect::<Result<Vec<_>, _>>()
            .map(LegacyNode::Array),
        Value::Object(map) => {
            if let Some(class) = map.get(CLASS_KEY) {
                return recover_buffer(class, map.get(VALUES_KEY)).map(LegacyNode::Buffer);
            }
            map.iter()
                .map(|(key, value)| Ok((key.clone(), recover(value)?)))
                .collect::<Result<Vec<_>, _>>()
                .map(LegacyNode::Object)
        }
    }
}

fn recover_buffer(class: &Value, values: Option<&Value>) -> Result<TypedBuffer, CodecError> {
    let tag = match class {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let kind = BufferKind::from_tag(&tag).ok_or_else(|| CodecError::UnsupportedKind {
        tag: tag.clone(),
    })?;
    let Some(Value::Array(items)) = values else {
        return Err(CodecError::MissingValues { tag });
    };

    let mut numbers = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let n = match item {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            // NaN serializes as null.
            Value::Null => f64::NAN,
            Value::Bool(b) => f64::from(u8::from(*b)),
            _ => {
                return Err(CodecError::InvalidValue {
                    tag: tag.clone(),
                    index,
                });
            }
        };
        numbers.push(n);
    }
    Ok(kind.cast(&numbers))
}

//! Outer state file envelope (format + version + metadata length + payload + tail).
//!
//! Layout, all integers little-endian u64:
//!
//! ```text
//! offset 0   format code
//! offset 8   version code
//! offset 16  metadata length N
//! offset 24  metadata[N]   compressed JSON document
//! offset 24+N tail         opaque bytes to end of file
//! ```

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use thiserror::Error;

/// Version code written into every migrated file.
pub const UPGRADE_VERSION: u64 = 1_000_000;

pub const HEADER_FIELD_LEN: usize = 8;
pub const HEADER_LEN: usize = HEADER_FIELD_LEN * 3;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnvelopeError {
    #[error("header truncated: need {HEADER_LEN} bytes, got {got}")]
    HeaderTruncated { got: usize },
    #[error("metadata length {declared} exceeds available payload of {available} bytes")]
    PayloadTruncated { declared: u64, available: usize },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MetadataError {
    #[error("metadata decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("metadata is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("metadata is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata root must be a json object")]
    NotAnObject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub format_code: u64,
    pub version_code: u64,
    pub metadata_len: u64,
}

impl Header {
    pub fn new(format_code: u64, version_code: u64, metadata_len: u64) -> Self {
        Self {
            format_code,
            version_code,
            metadata_len,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        encode_header(self.format_code, self.version_code, self.metadata_len)
    }
}

pub fn parse_header(bytes: &[u8]) -> Result<Header, EnvelopeError> {
    if bytes.len() < HEADER_LEN {
        return Err(EnvelopeError::HeaderTruncated { got: bytes.len() });
    }
    let mut offset = 0;
    let format_code = read_u64_le(bytes, &mut offset);
    let version_code = read_u64_le(bytes, &mut offset);
    let metadata_len = read_u64_le(bytes, &mut offset);
    Ok(Header {
        format_code,
        version_code,
        metadata_len,
    })
}

/// Splits everything after the header into the metadata payload and the tail.
///
/// `bytes` is the whole file, header included.
pub fn split_payload(bytes: &[u8], metadata_len: u64) -> Result<(&[u8], &[u8]), EnvelopeError> {
    let available = bytes.len().saturating_sub(HEADER_LEN);
    let len = usize::try_from(metadata_len)
        .ok()
        .filter(|len| *len <= available)
        .ok_or(EnvelopeError::PayloadTruncated {
            declared: metadata_len,
            available,
        })?;
    let body = &bytes[HEADER_LEN..];
    Ok(body.split_at(len))
}

pub fn encode_header(format_code: u64, version_code: u64, metadata_len: u64) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[..8].copy_from_slice(&format_code.to_le_bytes());
    buf[8..16].copy_from_slice(&version_code.to_le_bytes());
    buf[16..].copy_from_slice(&metadata_len.to_le_bytes());
    buf
}

/// Builds the upgraded file: fresh header, new metadata, untouched tail.
pub fn assemble(format_code: u64, metadata: &[u8], tail: &[u8]) -> Vec<u8> {
    let header = encode_header(format_code, UPGRADE_VERSION, metadata.len() as u64);
    let mut out = Vec::with_capacity(HEADER_LEN + metadata.len() + tail.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(metadata);
    out.extend_from_slice(tail);
    out
}

/// Inflates the metadata payload (gzip or zlib) and parses it as a JSON object.
pub fn inflate_metadata(payload: &[u8]) -> Result<serde_json::Value, MetadataError> {
    let mut raw = Vec::new();
    if payload.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(payload)
            .read_to_end(&mut raw)
            .map_err(MetadataError::Decompress)?;
    } else {
        ZlibDecoder::new(payload)
            .read_to_end(&mut raw)
            .map_err(MetadataError::Decompress)?;
    }
    let text = String::from_utf8(raw)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    if !value.is_object() {
        return Err(MetadataError::NotAnObject);
    }
    Ok(value)
}

fn read_u64_le(bytes: &[u8], offset: &mut usize) -> u64 {
    let mut field = [0u8; HEADER_FIELD_LEN];
    field.copy_from_slice(&bytes[*offset..*offset + HEADER_FIELD_LEN]);
    *offset += HEADER_FIELD_LEN;
    u64::from_le_bytes(field)
}

//! Container serialization (magic + version + length + cbor body + crc32c).

use crc32c::crc32c;
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use super::tree::check_payload;
use super::{Container, ContainerError, Dataset, ElementKind, Group, Values};
use crate::codec::{BufferKind, TypedBuffer};

pub const CONTAINER_MAGIC: &[u8; 5] = b"KHC01";
pub const CONTAINER_FORMAT_VERSION: u32 = 1;
const PREFIX_LEN: usize = CONTAINER_MAGIC.len() + 4 + 8;
const CRC_LEN: usize = 4;
const STRING_KIND: &str = "String";

impl Container {
    pub fn encode(&self) -> Result<Vec<u8>, ContainerError> {
        let mut body = Vec::new();
        let mut enc = Encoder::new(&mut body);
        encode_group(&mut enc, &self.root)?;

        let mut buf = Vec::with_capacity(PREFIX_LEN + body.len() + CRC_LEN);
        buf.extend_from_slice(CONTAINER_MAGIC);
        buf.extend_from_slice(&CONTAINER_FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(body.len() as u64).to_le_bytes());
        buf.extend_from_slice(&body);
        buf.extend_from_slice(&crc32c(&body).to_le_bytes());
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Container, ContainerError> {
        if bytes.len() < PREFIX_LEN + CRC_LEN {
            return Err(malformed("container truncated"));
        }
        if &bytes[..CONTAINER_MAGIC.len()] != CONTAINER_MAGIC {
            return Err(ContainerError::MagicMismatch {
                got: bytes[..CONTAINER_MAGIC.len()].to_vec(),
            });
        }
        let mut offset = CONTAINER_MAGIC.len();
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[offset..offset + 4]);
        offset += 4;
        let version = u32::from_le_bytes(version);
        if version != CONTAINER_FORMAT_VERSION {
            return Err(ContainerError::UnsupportedVersion {
                got: version,
                supported: CONTAINER_FORMAT_VERSION,
            });
        }
        let mut body_len = [0u8; 8];
        body_len.copy_from_slice(&bytes[offset..offset + 8]);
        offset += 8;
        let body_len = usize::try_from(u64::from_le_bytes(body_len))
            .ok()
            .filter(|len| *len == bytes.len() - PREFIX_LEN - CRC_LEN)
            .ok_or_else(|| malformed("body length does not match container size"))?;

        let body = &bytes[offset..offset + body_len];
        let mut crc = [0u8; CRC_LEN];
        crc.copy_from_slice(&bytes[offset + body_len..]);
        let expected = u32::from_le_bytes(crc);
        let got = crc32c(body);
        if expected != got {
            return Err(ContainerError::CrcMismatch { expected, got });
        }

        let mut dec = Decoder::new(body);
        let root = decode_group(&mut dec, "")?;
        if dec.datatype().is_ok() {
            return Err(malformed("trailing bytes after container body"));
        }
        Ok(Container { root })
    }
}

fn encode_group(enc: &mut Encoder<&mut Vec<u8>>, group: &Group) -> Result<(), ContainerError> {
    enc.map(2)?;
    enc.str("groups")?;
    enc.map(group.groups.len() as u64)?;
    for (name, child) in &group.groups {
        enc.str(name)?;
        encode_group(enc, child)?;
    }
    enc.str("datasets")?;
    enc.map(group.datasets.len() as u64)?;
    for (name, dataset) in &group.datasets {
        enc.str(name)?;
        encode_dataset(enc, dataset)?;
    }
    Ok(())
}

fn encode_dataset(enc: &mut Encoder<&mut Vec<u8>>, dataset: &Dataset) -> Result<(), ContainerError> {
    enc.map(3)?;
    enc.str("kind")?;
    match dataset.kind {
        ElementKind::Number(kind) => enc.str(kind.name())?,
        ElementKind::FixedString(_) => enc.str(STRING_KIND)?,
    };
    enc.str("shape")?;
    enc.array(dataset.shape.len() as u64)?;
    for dim in &dataset.shape {
        enc.u64(*dim)?;
    }
    enc.str("data")?;
    match &dataset.values {
        Values::Number(buffer) => enc.bytes(&buffer.to_le_bytes())?,
        Values::String(s) => enc.str(s)?,
    };
    Ok(())
}

fn decode_group(dec: &mut Decoder<'_>, path: &str) -> Result<Group, ContainerError> {
    let mut group = Group::default();
    let mut seen_groups = false;
    let mut seen_datasets = false;
    for _ in 0..definite_map(dec)? {
        match dec.str()? {
            "groups" if !seen_groups => {
                seen_groups = true;
                for _ in 0..definite_map(dec)? {
                    let name = dec.str()?.to_string();
                    let child = decode_group(dec, &format!("{path}/{name}"))?;
                    group.groups.push((name, child));
                }
            }
            "datasets" if !seen_datasets => {
                seen_datasets = true;
                for _ in 0..definite_map(dec)? {
                    let name = dec.str()?.to_string();
                    let dataset = decode_dataset(dec, &format!("{path}/{name}"))?;
                    group.datasets.push((name, dataset));
                }
            }
            other => return Err(malformed(format!("unexpected group key {other:?} at {path}"))),
        }
    }
    if !(seen_groups && seen_datasets) {
        return Err(malformed(format!("incomplete group at {path}")));
    }
    Ok(group)
}

fn decode_dataset(dec: &mut Decoder<'_>, path: &str) -> Result<Dataset, ContainerError> {
    let mut kind_name: Option<String> = None;
    let mut shape: Option<Vec<u64>> = None;
    let mut data: Option<RawData> = None;
    for _ in 0..definite_map(dec)? {
        match dec.str()? {
            "kind" => kind_name = Some(dec.str()?.to_string()),
            "shape" => {
                let len = dec
                    .array()?
                    .ok_or_else(|| malformed(format!("indefinite shape at {path}")))?;
                let mut dims = Vec::new();
                for _ in 0..len {
                    dims.push(dec.u64()?);
                }
                shape = Some(dims);
            }
            "data" => {
                data = Some(match dec.datatype()? {
                    Type::Bytes => RawData::Bytes(dec.bytes()?.to_vec()),
                    Type::String => RawData::Text(dec.str()?.to_string()),
                    other => return Err(malformed(format!("unexpected data type {other} at {path}"))),
                });
            }
            other => return Err(malformed(format!("unexpected dataset key {other:?} at {path}"))),
        }
    }
    let (Some(kind_name), Some(shape), Some(data)) = (kind_name, shape, data) else {
        return Err(malformed(format!("incomplete dataset at {path}")));
    };

    let (kind, values) = match (kind_name.as_str(), data) {
        (STRING_KIND, RawData::Text(s)) => (ElementKind::FixedString(s.len()), Values::String(s)),
        (name, RawData::Bytes(bytes)) => {
            let kind = BufferKind::from_name(name)
                .ok_or_else(|| malformed(format!("unknown element kind {name:?} at {path}")))?;
            let buffer = TypedBuffer::from_le_bytes(kind, &bytes)
                .ok_or_else(|| malformed(format!("ragged {name} data at {path}")))?;
            (ElementKind::Number(kind), Values::Number(buffer))
        }
        (name, _) => return Err(malformed(format!("data does not fit kind {name:?} at {path}"))),
    };
    check_payload(path, kind, &shape, &values)?;
    Ok(Dataset {
        kind,
        shape,
        values,
    })
}

enum RawData {
    Bytes(Vec<u8>),
    Text(String),
}

fn definite_map(dec: &mut Decoder<'_>) -> Result<u64, ContainerError> {
    dec.map()?
        .ok_or_else(|| malformed("indefinite-length maps are not allowed"))
}

fn malformed(reason: impl Into<String>) -> ContainerError {
    ContainerError::Malformed {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ContainerWriter, TreeBuilder, write_shaped, write_string};

    fn sample() -> Container {
        let mut builder = TreeBuilder::new();
        let root = builder.root();
        let pca = builder.create_group(root, "pca").unwrap();
        let contents = builder.create_group(pca, "contents").unwrap();
        let values: Vec<f64> = (0..6).map(f64::from).collect();
        write_shaped(&mut builder, contents, "pcs", BufferKind::Float64, &[3, 2], &values).unwrap();
        write_string(&mut builder, pca, "note", "hello").unwrap();
        builder.create_group(root, "normalization").unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn encoded_container_reads_back() {
        let container = sample();
        let bytes = container.encode().unwrap();
        assert_eq!(&bytes[..5], CONTAINER_MAGIC);
        let decoded = Container::decode(&bytes).unwrap();
        assert_eq!(decoded, container);
        assert_eq!(decoded.root.group_names(), vec!["pca", "normalization"]);
    }

    #[test]
    fn corrupted_body_fails_crc() {
        let mut bytes = sample().encode().unwrap();
        bytes[PREFIX_LEN + 2] ^= 0xff;
        let err = Container::decode(&bytes).unwrap_err();
        assert!(matches!(err, ContainerError::CrcMismatch { .. }));
    }

    #[test]
    fn wrong_magic_and_truncation_fail() {
        let mut bytes = sample().encode().unwrap();
        let err = Container::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, ContainerError::Malformed { .. }));

        bytes[0] = b'X';
        let err = Container::decode(&bytes).unwrap_err();
        assert!(matches!(err, ContainerError::MagicMismatch { .. }));
    }

    #[test]
    fn empty_container_roundtrips() {
        let container = TreeBuilder::new().finish().unwrap();
        let decoded = Container::decode(&container.encode().unwrap()).unwrap();
        assert!(decoded.root.is_empty());
    }
}

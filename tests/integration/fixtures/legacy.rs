//! Legacy version 0 state files for driving the binary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use flate2::Compression;
use flate2::write::GzEncoder;
use kana_state_upgrade::Container;
use kana_state_upgrade::envelope::{Header, encode_header, parse_header, split_payload};
use serde_json::{Value, json};

pub const TAIL: &[u8] = b"\x00\x01\x02matrix payload\xfe\xff";

pub fn typed(class: &str, values: Value) -> Value {
    json!({ "_TypedArray_class": class, "_TypedArray_values": values })
}

/// A complete legacy document without the optional k-means step.
pub fn legacy_state(num_genes: usize, num_cells: usize) -> Value {
    let ids: Vec<String> = (0..num_genes).map(|i| format!("ENSG{i:05}")).collect();
    let per_cell: Vec<f64> = (0..num_cells).map(|i| i as f64 + 0.5).collect();
    let pcs: Vec<f64> = (0..5 * num_cells).map(|i| i as f64 / 10.0).collect();
    json!({
        "inputs": {
            "parameters": {
                "type": "10X",
                "files": [
                    { "type": "h5", "name": "pbmc.h5", "buffer": { "offset": 0, "size": TAIL.len() } }
                ]
            },
            "contents": {
                "genes": { "id": ids },
                "num_cells": num_cells
            }
        },
        "quality_control_metrics": {
            "parameters": { "use_mito_default": false, "mito_prefix": "MT-" },
            "contents": {
                "sums": typed("Float64Array", json!(per_cell)),
                "detected": typed("Int32Array", json!(vec![12; num_cells])),
                "proportion": typed("Float64Array", json!(vec![0.1; num_cells]))
            }
        },
        "quality_control_thresholds": {
            "parameters": { "nmads": 3 },
            "contents": {
                "sums": 10.0,
                "detected": 5,
                "proportion": 0.5,
                "discards": typed("Uint8Array", json!(vec![0; num_cells]))
            }
        },
        "normalization": { "parameters": {}, "contents": {} },
        "feature_selection": {
            "parameters": { "span": 0.3 },
            "contents": {
                "means": typed("Float64Array", json!(vec![1.0; num_genes])),
                "vars": typed("Float64Array", json!(vec![2.0; num_genes])),
                "fitted": typed("Float64Array", json!(vec![1.5; num_genes])),
                "resids": typed("Float64Array", json!(vec![0.5; num_genes]))
            }
        },
        "pca": {
            "parameters": { "num_hvgs": 2000, "num_pcs": 5, "approximate": true },
            "contents": {
                "var_exp": typed("Float64Array", json!([0.3, 0.2, 0.1, 0.05, 0.02])),
                "pcs": typed("Float64Array", json!(pcs))
            }
        },
        "tsne": {
            "parameters": { "perplexity": 30, "iterations": 1000, "animate": true },
            "contents": {
                "x": typed("Float64Array", json!(per_cell)),
                "y": typed("Float64Array", json!(per_cell)),
                "iterations": 1000
            }
        },
        "umap": {
            "parameters": { "num_neighbors": 15, "num_epochs": 500, "min_dist": 0.1, "animate": false },
            "contents": {
                "x": typed("Float64Array", json!(per_cell)),
                "y": typed("Float64Array", json!(per_cell)),
                "iterations": 500
            }
        }
    })
}

/// Header, gzip-compressed JSON metadata, then `tail`.
pub fn legacy_file(doc: &Value, tail: &[u8]) -> Vec<u8> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(doc.to_string().as_bytes())
        .expect("compress metadata");
    let meta = gz.finish().expect("finish gzip");
    let mut out = encode_header(0, 0, meta.len() as u64).to_vec();
    out.extend_from_slice(&meta);
    out.extend_from_slice(tail);
    out
}

pub fn write_legacy(dir: &Path, doc: &Value) -> PathBuf {
    let path = dir.join("session.kana");
    fs::write(&path, legacy_file(doc, TAIL)).expect("write legacy file");
    path
}

/// The binary with config and env isolated to `config_dir`.
pub fn kana_cmd(config_dir: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kana-upgrade");
    cmd.env("KANA_CONFIG_DIR", config_dir)
        .env_remove("KANA_OUTPUT_DIR")
        .env_remove("KANA_INTERMEDIATE_NAME")
        .env_remove("KANA_OUTPUT_NAME")
        .env_remove("KANA_LOG_FORMAT")
        .env_remove("KANA_LOG");
    cmd
}

/// Splits an upgraded file and decodes its container.
pub fn read_upgraded(path: &Path) -> (Header, Container, Vec<u8>) {
    let bytes = fs::read(path).expect("read upgraded file");
    let header = parse_header(&bytes).expect("header");
    let (container, tail) = split_payload(&bytes, header.metadata_len).expect("split");
    let container = Container::decode(container).expect("decode container");
    (header, container, tail.to_vec())
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

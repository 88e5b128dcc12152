//! Legacy stage objects to version 1 groups.
//!
//! Each stage becomes a top-level group with a `parameters` group of copied
//! scalars and a `contents` group of derived datasets. Stages are emitted in
//! a fixed order so the resulting layout is deterministic.

use thiserror::Error;

use crate::Result;
use crate::codec::LegacyNode;
use crate::container::{ContainerWriter, GroupId};

mod analysis;
mod clustering;
mod embeddings;
mod fields;
mod inputs;
mod quality_control;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum StageError {
    #[error("stage {stage}: missing required field '{field}'")]
    MissingField { stage: &'static str, field: String },
    #[error("stage {stage}: field '{field}' must be {expected}")]
    InvalidField {
        stage: &'static str,
        field: String,
        expected: &'static str,
    },
    #[error("stage {stage}: field '{field}' has unusable shape: {reason}")]
    InvalidShape {
        stage: &'static str,
        field: String,
        reason: String,
    },
}

impl StageError {
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::MissingField { stage, .. }
            | StageError::InvalidField { stage, .. }
            | StageError::InvalidShape { stage, .. } => stage,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            StageError::MissingField { field, .. }
            | StageError::InvalidField { field, .. }
            | StageError::InvalidShape { field, .. } => field,
        }
    }
}

type MapFn = fn(&LegacyNode, &mut dyn ContainerWriter, GroupId) -> Result<()>;

struct StageMapping {
    name: &'static str,
    /// Legacy key whose absence skips the stage entirely.
    optional_on: Option<&'static str>,
    map: MapFn,
}

const STAGES: [StageMapping; 9] = [
    StageMapping {
        name: "inputs",
        optional_on: None,
        map: inputs::map_inputs,
    },
    StageMapping {
        name: "quality_control",
        optional_on: None,
        map: quality_control::map_quality_control,
    },
    StageMapping {
        name: "normalization",
        optional_on: None,
        map: analysis::map_normalization,
    },
    StageMapping {
        name: "feature_selection",
        optional_on: None,
        map: analysis::map_feature_selection,
    },
    StageMapping {
        name: "pca",
        optional_on: None,
        map: analysis::map_pca,
    },
    StageMapping {
        name: "neighbor_index",
        optional_on: None,
        map: analysis::map_neighbor_index,
    },
    StageMapping {
        name: "tsne",
        optional_on: None,
        map: embeddings::map_tsne,
    },
    StageMapping {
        name: "umap",
        optional_on: None,
        map: embeddings::map_umap,
    },
    StageMapping {
        name: "kmeans_cluster",
        optional_on: Some("kmeans_cluster"),
        map: clustering::map_kmeans_cluster,
    },
];

/// Output group names in emission order.
pub fn stage_names() -> impl Iterator<Item = &'static str> {
    STAGES.iter().map(|stage| stage.name)
}

/// Writes every stage of `state` under the writer's root.
///
/// Returns the names of the stages that were emitted. The first failing
/// stage aborts the whole mapping.
pub fn map_state(state: &LegacyNode, writer: &mut dyn ContainerWriter) -> Result<Vec<&'static str>> {
    let root = writer.root();
    let mut emitted = Vec::with_capacity(STAGES.len());
    for stage in &STAGES {
        if let Some(key) = stage.optional_on
            && state.get(key).is_none()
        {
            tracing::debug!(stage = stage.name, "optional stage absent, skipping");
            continue;
        }
        (stage.map)(state, writer, root)?;
        tracing::info!(stage = stage.name, "stage migrated");
        emitted.push(stage.name);
    }
    Ok(emitted)
}

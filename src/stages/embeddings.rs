use crate::Result;
use crate::codec::{BufferKind, LegacyNode};
use crate::container::{ContainerWriter, GroupId, write_scalar, write_vector};

use super::fields::StageView;

/// Parameter name and stored element kind.
type ParamSpec = (&'static str, BufferKind);

const TSNE_PARAMS: [ParamSpec; 3] = [
    ("perplexity", BufferKind::Float64),
    ("iterations", BufferKind::Int32),
    ("animate", BufferKind::Uint8),
];

const UMAP_PARAMS: [ParamSpec; 4] = [
    ("num_neighbors", BufferKind::Int32),
    ("num_epochs", BufferKind::Int32),
    ("min_dist", BufferKind::Float64),
    ("animate", BufferKind::Uint8),
];

pub(super) fn map_tsne(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    map_embedding(state, writer, root, "tsne", &TSNE_PARAMS)
}

pub(super) fn map_umap(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    map_embedding(state, writer, root, "umap", &UMAP_PARAMS)
}

/// Copies parameters and the `x`/`y` coordinates. The iteration count the
/// legacy run reached is dropped.
fn map_embedding(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
    name: &'static str,
    param_specs: &[ParamSpec],
) -> Result<()> {
    let stage = StageView::top(state, name, name)?;
    let params = stage.section("parameters")?;
    let contents = stage.section("contents")?;

    let group = writer.create_group(root, name)?;
    let phandle = writer.create_group(group, "parameters")?;
    for (param, kind) in param_specs {
        let value = match kind {
            BufferKind::Uint8 => params.flag(param)?,
            _ => params.number(param)?,
        };
        write_scalar(writer, phandle, param, *kind, value)?;
    }

    let chandle = writer.create_group(group, "contents")?;
    for axis in ["x", "y"] {
        write_vector(writer, chandle, axis, BufferKind::Float64, &contents.numbers(axis)?)?;
    }
    Ok(())
}

use crate::Result;
use crate::codec::{BufferKind, LegacyNode};
use crate::container::{ContainerWriter, GroupId, write_scalar, write_vector};

use super::fields::StageView;

const STAGE: &str = "kmeans_cluster";

/// Only called when the legacy document has a k-means step.
pub(super) fn map_kmeans_cluster(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    let stage = StageView::top(state, STAGE, STAGE)?;
    let params = stage.section("parameters")?;
    let contents = stage.section("contents")?;

    let group = writer.create_group(root, STAGE)?;
    let phandle = writer.create_group(group, "parameters")?;
    write_scalar(writer, phandle, "k", BufferKind::Int32, params.number("k")?)?;

    let chandle = writer.create_group(group, "contents")?;
    let clusters = contents.numbers("clusters")?;
    write_vector(writer, chandle, "clusters", BufferKind::Int32, &clusters)?;
    Ok(())
}

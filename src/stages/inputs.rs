use crate::Result;
use crate::codec::{BufferKind, LegacyNode};
use crate::container::{ContainerWriter, GroupId, write_scalar, write_string, write_vector};

use super::fields::StageView;

const STAGE: &str = "inputs";

/// Source format, per-file buffer references, and `[genes, cells]` dimensions.
///
/// Gene annotations themselves are not carried over; only the row count of
/// the first annotation column is kept.
pub(super) fn map_inputs(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    let stage = StageView::top(state, STAGE, STAGE)?;
    let params = stage.section("parameters")?;
    let contents = stage.section("contents")?;

    let group = writer.create_group(root, STAGE)?;
    let phandle = writer.create_group(group, "parameters")?;
    write_string(writer, phandle, "format", params.string("type")?)?;

    let fhandle = writer.create_group(phandle, "files")?;
    for (index, file) in params.objects("files")?.iter().enumerate() {
        let xhandle = writer.create_group(fhandle, &index.to_string())?;
        write_string(writer, xhandle, "type", file.string("type")?)?;
        write_string(writer, xhandle, "name", file.string("name")?)?;
        let buffer = file.object("buffer")?;
        write_scalar(writer, xhandle, "offset", BufferKind::Uint32, buffer.number("offset")?)?;
        write_scalar(writer, xhandle, "size", BufferKind::Uint32, buffer.number("size")?)?;
    }

    let num_genes = first_column_len(&contents)?;
    let num_cells = contents.number("num_cells")?;
    let chandle = writer.create_group(group, "contents")?;
    write_vector(
        writer,
        chandle,
        "dimensions",
        BufferKind::Int32,
        &[num_genes as f64, num_cells],
    )?;
    Ok(())
}

fn first_column_len(contents: &StageView<'_>) -> Result<usize> {
    let genes = contents.object("genes")?;
    let (name, column) = contents
        .node("genes")?
        .entries()
        .and_then(|entries| entries.first())
        .ok_or_else(|| contents.invalid("genes", "non-empty object"))?;
    Ok(column.len().ok_or_else(|| genes.invalid(name, "array"))?)
}

use crate::Result;
use crate::codec::{BufferKind, LegacyNode};
use crate::container::{ContainerWriter, GroupId, write_scalar, write_string, write_vector};

use super::fields::StageView;

const STAGE: &str = "quality_control";
const THRESHOLD_METRICS: [&str; 3] = ["sums", "detected", "proportion"];

/// Merges the legacy metrics and thresholds steps into one group.
///
/// Thresholds are stored as per-batch arrays even though only one batch
/// exists. `retained` is not stored; it is the complement of `discards`.
pub(super) fn map_quality_control(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    let metrics = StageView::top(state, STAGE, "quality_control_metrics")?;
    let thresholds = StageView::top(state, STAGE, "quality_control_thresholds")?;

    let group = writer.create_group(root, STAGE)?;
    let phandle = writer.create_group(group, "parameters")?;
    let mparams = metrics.section("parameters")?;
    write_scalar(
        writer,
        phandle,
        "use_mito_default",
        BufferKind::Uint8,
        mparams.flag("use_mito_default")?,
    )?;
    write_string(writer, phandle, "mito_prefix", mparams.string("mito_prefix")?)?;
    let tparams = thresholds.section("parameters")?;
    write_scalar(writer, phandle, "nmads", BufferKind::Float64, tparams.number("nmads")?)?;

    let chandle = writer.create_group(group, "contents")?;
    let mcontents = metrics.section("contents")?;
    let mhandle = writer.create_group(chandle, "metrics")?;
    write_vector(writer, mhandle, "sums", BufferKind::Float64, &mcontents.numbers("sums")?)?;
    write_vector(writer, mhandle, "detected", BufferKind::Int32, &mcontents.numbers("detected")?)?;
    write_vector(
        writer,
        mhandle,
        "proportion",
        BufferKind::Float64,
        &mcontents.numbers("proportion")?,
    )?;

    let tcontents = thresholds.section("contents")?;
    let thandle = writer.create_group(chandle, "thresholds")?;
    for metric in THRESHOLD_METRICS {
        let values = tcontents.scalar_or_numbers(metric)?;
        write_vector(writer, thandle, metric, BufferKind::Float64, &values)?;
    }

    write_vector(writer, chandle, "discards", BufferKind::Uint8, &tcontents.numbers("discards")?)?;
    Ok(())
}

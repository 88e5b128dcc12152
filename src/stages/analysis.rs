use crate::Result;
use crate::codec::{BufferKind, LegacyNode};
use crate::container::{ContainerWriter, GroupId, write_scalar, write_shaped, write_vector};

use super::StageError;
use super::fields::StageView;

const FEATURE_STATS: [&str; 4] = ["means", "vars", "fitted", "resids"];

/// Placeholder group; normalization carries no state yet.
pub(super) fn map_normalization(
    _state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    writer.create_group(root, "normalization")?;
    Ok(())
}

pub(super) fn map_feature_selection(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    let stage = StageView::top(state, "feature_selection", "feature_selection")?;
    let params = stage.section("parameters")?;
    let contents = stage.section("contents")?;

    let group = writer.create_group(root, "feature_selection")?;
    let phandle = writer.create_group(group, "parameters")?;
    write_scalar(writer, phandle, "span", BufferKind::Float64, params.number("span")?)?;

    let chandle = writer.create_group(group, "contents")?;
    let mut expected_len = None;
    for stat in FEATURE_STATS {
        let values = contents.numbers(stat)?;
        match expected_len {
            None => expected_len = Some(values.len()),
            Some(len) if len != values.len() => {
                return Err(StageError::InvalidShape {
                    stage: stage.stage(),
                    field: stat.to_string(),
                    reason: format!("length {} differs from means length {len}", values.len()),
                }
                .into());
            }
            Some(_) => {}
        }
        write_vector(writer, chandle, stat, BufferKind::Float64, &values)?;
    }
    Ok(())
}

/// `pcs` is declared `[cells, pcs]` over the legacy flat buffer.
///
/// The legacy buffer keeps each cell's components contiguous (a column-major
/// pcs-by-cells matrix), so the row-major `[cells, pcs]` declaration needs no
/// data movement. Only the declared shape differs.
pub(super) fn map_pca(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    let stage = StageView::top(state, "pca", "pca")?;
    let params = stage.section("parameters")?;
    let contents = stage.section("contents")?;

    let group = writer.create_group(root, "pca")?;
    let phandle = writer.create_group(group, "parameters")?;
    for name in ["num_hvgs", "num_pcs"] {
        write_scalar(writer, phandle, name, BufferKind::Int32, params.number(name)?)?;
    }

    let var_exp = contents.numbers("var_exp")?;
    let pcs = contents.numbers("pcs")?;
    let num_pcs = var_exp.len();
    if num_pcs == 0 || pcs.len() % num_pcs != 0 {
        return Err(StageError::InvalidShape {
            stage: stage.stage(),
            field: "pcs".to_string(),
            reason: format!(
                "{} values cannot be split into rows of {num_pcs} components",
                pcs.len()
            ),
        }
        .into());
    }
    let num_cells = pcs.len() / num_pcs;

    let chandle = writer.create_group(group, "contents")?;
    write_vector(writer, chandle, "var_exp", BufferKind::Float64, &var_exp)?;
    write_shaped(
        writer,
        chandle,
        "pcs",
        BufferKind::Float64,
        &[num_cells as u64, num_pcs as u64],
        &pcs,
    )?;
    Ok(())
}

/// `approximate` lives on the legacy PCA step, not on a neighbor step.
pub(super) fn map_neighbor_index(
    state: &LegacyNode,
    writer: &mut dyn ContainerWriter,
    root: GroupId,
) -> Result<()> {
    let pca = StageView::top(state, "neighbor_index", "pca")?;
    let approximate = pca.section("parameters")?.flag("approximate")?;

    let group = writer.create_group(root, "neighbor_index")?;
    let phandle = writer.create_group(group, "parameters")?;
    write_scalar(writer, phandle, "approximate", BufferKind::Uint8, approximate)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{TypedBuffer, recover};
    use crate::container::{Container, TreeBuilder, Values};
    use crate::error::Error;
    use crate::stages::test_state::{legacy_state, typed};
    use serde_json::json;

    fn run(doc: &serde_json::Value, map: super::super::MapFn) -> Result<Container> {
        let state = recover(doc).unwrap();
        let mut builder = TreeBuilder::new();
        let root = builder.root();
        map(&state, &mut builder, root)?;
        Ok(builder.finish()?)
    }

    #[test]
    fn normalization_is_an_empty_group() {
        let container = run(&legacy_state(3, 2), map_normalization).unwrap();
        assert!(container.group("normalization").unwrap().is_empty());
    }

    #[test]
    fn feature_statistics_are_copied() {
        let container = run(&legacy_state(6, 2), map_feature_selection).unwrap();
        let contents = container.group("feature_selection/contents").unwrap();
        assert_eq!(
            contents.dataset_names(),
            vec!["means", "vars", "fitted", "resids"]
        );
        assert_eq!(
            contents.dataset("fitted").unwrap().values,
            Values::Number(TypedBuffer::Float64(vec![3.0; 6]))
        );
        assert_eq!(
            container.dataset("feature_selection/parameters/span").unwrap().values,
            Values::Number(TypedBuffer::Float64(vec![0.3]))
        );
    }

    #[test]
    fn feature_statistics_must_agree_in_length() {
        let mut doc = legacy_state(6, 2);
        doc["feature_selection"]["contents"]["resids"] = typed("Float64Array", json!([1.0]));
        let err = run(&doc, map_feature_selection).unwrap_err();
        assert!(matches!(
            err,
            Error::Stage(StageError::InvalidShape { ref field, .. }) if field == "resids"
        ));
    }

    #[test]
    fn pcs_shape_is_cells_by_components() {
        let container = run(&legacy_state(10, 100), map_pca).unwrap();
        let pcs = container.dataset("pca/contents/pcs").unwrap();
        assert_eq!(pcs.shape, vec![100, 5]);
        let expected: Vec<f64> = (0..500).map(f64::from).collect();
        assert_eq!(pcs.values, Values::Number(TypedBuffer::Float64(expected)));

        let var_exp = container.dataset("pca/contents/var_exp").unwrap();
        assert_eq!(var_exp.shape, vec![5]);
        assert_eq!(
            container.dataset("pca/parameters/num_hvgs").unwrap().values,
            Values::Number(TypedBuffer::Int32(vec![4000]))
        );
    }

    #[test]
    fn ragged_pcs_are_rejected() {
        let mut doc = legacy_state(10, 4);
        doc["pca"]["contents"]["pcs"] = typed("Float64Array", json!([1.0, 2.0, 3.0]));
        let err = run(&doc, map_pca).unwrap_err();
        assert!(matches!(
            err,
            Error::Stage(StageError::InvalidShape { stage: "pca", .. })
        ));
    }

    #[test]
    fn neighbor_index_reads_approximate_from_pca() {
        let container = run(&legacy_state(3, 2), map_neighbor_index).unwrap();
        assert_eq!(
            container
                .dataset("neighbor_index/parameters/approximate")
                .unwrap()
                .values,
            Values::Number(TypedBuffer::Uint8(vec![1]))
        );
        assert!(container.group("neighbor_index/contents").is_none());

        let mut doc = legacy_state(3, 2);
        doc["pca"]["parameters"]
            .as_object_mut()
            .unwrap()
            .remove("approximate");
        let err = run(&doc, map_neighbor_index).unwrap_err();
        assert!(matches!(
            err,
            Error::Stage(StageError::MissingField { stage: "neighbor_index", ref field })
                if field == "approximate"
        ));
    }
}

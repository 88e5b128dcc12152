//! In-memory container builder and the finished tree.

use super::{ContainerError, ContainerWriter, DatasetId, ElementKind, GroupId, Values};

#[derive(Debug)]
struct GroupSlot {
    path: String,
    groups: Vec<(String, GroupId)>,
    datasets: Vec<(String, DatasetId)>,
}

#[derive(Debug)]
struct DatasetSlot {
    path: String,
    kind: ElementKind,
    shape: Vec<u64>,
    values: Option<Values>,
}

/// Arena-backed [`ContainerWriter`].
#[derive(Debug)]
pub struct TreeBuilder {
    groups: Vec<GroupSlot>,
    datasets: Vec<DatasetSlot>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            groups: vec![GroupSlot {
                path: String::new(),
                groups: Vec::new(),
                datasets: Vec::new(),
            }],
            datasets: Vec::new(),
        }
    }

    /// Freezes the tree. Fails if any created dataset was left unwritten.
    pub fn finish(mut self) -> Result<Container, ContainerError> {
        let root = self.take_group(GroupId(0))?;
        Ok(Container { root })
    }

    fn take_group(&mut self, id: GroupId) -> Result<Group, ContainerError> {
        let slot = self
            .groups
            .get_mut(id.0)
            .ok_or(ContainerError::UnknownGroup(id.0))?;
        let child_groups = std::mem::take(&mut slot.groups);
        let child_datasets = std::mem::take(&mut slot.datasets);

        let mut groups = Vec::with_capacity(child_groups.len());
        for (name, child) in child_groups {
            groups.push((name, self.take_group(child)?));
        }
        let mut datasets = Vec::with_capacity(child_datasets.len());
        for (name, child) in child_datasets {
            let slot = self
                .datasets
                .get_mut(child.0)
                .ok_or(ContainerError::UnknownDataset(child.0))?;
            let values = slot.values.take().ok_or_else(|| ContainerError::NeverWritten {
                path: slot.path.clone(),
            })?;
            datasets.push((
                name,
                Dataset {
                    kind: slot.kind,
                    shape: std::mem::take(&mut slot.shape),
                    values,
                },
            ));
        }
        Ok(Group { groups, datasets })
    }

    fn claim_name(&self, parent: GroupId, name: &str) -> Result<String, ContainerError> {
        let slot = self
            .groups
            .get(parent.0)
            .ok_or(ContainerError::UnknownGroup(parent.0))?;
        if name.is_empty() || name.contains('/') || name == "." {
            return Err(ContainerError::InvalidName {
                parent: display_path(&slot.path),
                name: name.to_string(),
            });
        }
        let path = format!("{}/{}", slot.path, name);
        let taken = slot.groups.iter().any(|(n, _)| n == name)
            || slot.datasets.iter().any(|(n, _)| n == name);
        if taken {
            return Err(ContainerError::DuplicateName { path });
        }
        Ok(path)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

impl ContainerWriter for TreeBuilder {
    fn root(&self) -> GroupId {
        GroupId(0)
    }

    fn create_group(&mut self, parent: GroupId, name: &str) -> Result<GroupId, ContainerError> {
        let path = self.claim_name(parent, name)?;
        let id = GroupId(self.groups.len());
        self.groups.push(GroupSlot {
            path,
            groups: Vec::new(),
            datasets: Vec::new(),
        });
        self.groups[parent.0].groups.push((name.to_string(), id));
        Ok(id)
    }

    fn create_dataset(
        &mut self,
        parent: GroupId,
        name: &str,
        kind: ElementKind,
        shape: &[u64],
    ) -> Result<DatasetId, ContainerError> {
        let path = self.claim_name(parent, name)?;
        let id = DatasetId(self.datasets.len());
        self.datasets.push(DatasetSlot {
            path,
            kind,
            shape: shape.to_vec(),
            values: None,
        });
        self.groups[parent.0].datasets.push((name.to_string(), id));
        Ok(id)
    }

    fn write(&mut self, dataset: DatasetId, values: Values) -> Result<(), ContainerError> {
        let slot = self
            .datasets
            .get_mut(dataset.0)
            .ok_or(ContainerError::UnknownDataset(dataset.0))?;
        if slot.values.is_some() {
            return Err(ContainerError::AlreadyWritten {
                path: slot.path.clone(),
            });
        }
        check_payload(&slot.path, slot.kind, &slot.shape, &values)?;
        slot.values = Some(values);
        Ok(())
    }
}

pub(super) fn check_payload(
    path: &str,
    kind: ElementKind,
    shape: &[u64],
    values: &Values,
) -> Result<(), ContainerError> {
    let kind_ok = match (kind, values) {
        (ElementKind::Number(expected), Values::Number(buffer)) => buffer.kind() == expected,
        (ElementKind::FixedString(len), Values::String(s)) => s.len() == len,
        _ => false,
    };
    if !kind_ok {
        return Err(ContainerError::KindMismatch {
            path: path.to_string(),
            expected: kind,
            got: values.describe(),
        });
    }
    let expected = shape.iter().product::<u64>();
    let got = values.element_count();
    if expected != got {
        return Err(ContainerError::ShapeMismatch {
            path: path.to_string(),
            shape: shape.to_vec(),
            expected,
            got,
        });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub kind: ElementKind,
    pub shape: Vec<u64>,
    pub values: Values,
}

/// Children kept in creation order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    pub groups: Vec<(String, Group)>,
    pub datasets: Vec<(String, Dataset)>,
}

impl Group {
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.datasets.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Container {
    pub root: Group,
}

impl Container {
    /// Resolves a slash-separated group path; `""` is the root.
    pub fn group(&self, path: &str) -> Option<&Group> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(&self.root, |group, part| group.group(part))
    }

    /// Resolves a slash-separated dataset path such as `pca/contents/pcs`.
    pub fn dataset(&self, path: &str) -> Option<&Dataset> {
        let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
        self.group(parent)?.dataset(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BufferKind, TypedBuffer};
    use crate::container::{write_scalar, write_string, write_vector};

    #[test]
    fn builds_nested_tree_in_creation_order() {
        let mut builder = TreeBuilder::new();
        let root = builder.root();
        let pca = builder.create_group(root, "pca").unwrap();
        let params = builder.create_group(pca, "parameters").unwrap();
        write_scalar(&mut builder, params, "num_pcs", BufferKind::Int32, 5.0).unwrap();
        write_string(&mut builder, params, "label", "abc").unwrap();
        builder.create_group(root, "tsne").unwrap();

        let container = builder.finish().unwrap();
        assert_eq!(container.root.group_names(), vec!["pca", "tsne"]);
        let num_pcs = container.dataset("pca/parameters/num_pcs").unwrap();
        assert!(num_pcs.shape.is_empty());
        assert_eq!(num_pcs.values, Values::Number(TypedBuffer::Int32(vec![5])));
        let label = container.dataset("pca/parameters/label").unwrap();
        assert_eq!(label.kind, ElementKind::FixedString(3));
        assert!(container.group("tsne").unwrap().is_empty());
    }

    #[test]
    fn names_are_unique_across_groups_and_datasets() {
        let mut builder = TreeBuilder::new();
        let root = builder.root();
        builder.create_group(root, "x").unwrap();
        let err = builder
            .create_dataset(root, "x", ElementKind::FLOAT64, &[1])
            .unwrap_err();
        assert!(matches!(err, ContainerError::DuplicateName { path } if path == "/x"));

        let err = builder.create_group(root, "a/b").unwrap_err();
        assert!(matches!(err, ContainerError::InvalidName { .. }));
    }

    #[test]
    fn shape_must_match_payload() {
        let mut builder = TreeBuilder::new();
        let root = builder.root();
        let handle = builder
            .create_dataset(root, "m", ElementKind::FLOAT64, &[2, 3])
            .unwrap();
        let err = builder
            .write(handle, Values::Number(TypedBuffer::Float64(vec![0.0; 5])))
            .unwrap_err();
        assert!(matches!(
            err,
            ContainerError::ShapeMismatch {
                expected: 6,
                got: 5,
                ..
            }
        ));
        builder
            .write(handle, Values::Number(TypedBuffer::Float64(vec![0.0; 6])))
            .unwrap();
    }

    #[test]
    fn kind_must_match_declaration() {
        let mut builder = TreeBuilder::new();
        let root = builder.root();
        let handle = builder
            .create_dataset(root, "s", ElementKind::FixedString(4), &[])
            .unwrap();
        let err = builder
            .write(handle, Values::String("toolong".into()))
            .unwrap_err();
        assert!(matches!(err, ContainerError::KindMismatch { .. }));

        let handle = builder
            .create_dataset(root, "n", ElementKind::INT32, &[1])
            .unwrap();
        let err = builder
            .write(handle, Values::Number(TypedBuffer::Float64(vec![1.0])))
            .unwrap_err();
        assert!(matches!(err, ContainerError::KindMismatch { .. }));
    }

    #[test]
    fn datasets_are_write_once() {
        let mut builder = TreeBuilder::new();
        let root = builder.root();
        write_vector(&mut builder, root, "v", BufferKind::Float64, &[1.0]).unwrap();
        let handle = DatasetId(0);
        let err = builder
            .write(handle, Values::Number(TypedBuffer::Float64(vec![2.0])))
            .unwrap_err();
        assert!(matches!(err, ContainerError::AlreadyWritten { .. }));
    }

    #[test]
    fn unwritten_dataset_blocks_finish() {
        let mut builder = TreeBuilder::new();
        let root = builder.root();
        let group = builder.create_group(root, "g").unwrap();
        builder
            .create_dataset(group, "pending", ElementKind::UINT8, &[0])
            .unwrap();
        let err = builder.finish().unwrap_err();
        assert!(matches!(err, ContainerError::NeverWritten { path } if path == "/g/pending"));
    }
}

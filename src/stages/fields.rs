//! Checked access into legacy stage objects.

use crate::codec::LegacyNode;

use super::StageError;

/// A legacy object inside one stage, with enough context to name missing fields.
#[derive(Clone, Debug)]
pub(crate) struct StageView<'a> {
    stage: &'static str,
    prefix: String,
    node: &'a LegacyNode,
}

impl<'a> StageView<'a> {
    /// Top-level legacy object `key` feeding output stage `stage`.
    pub(crate) fn top(
        state: &'a LegacyNode,
        stage: &'static str,
        key: &str,
    ) -> Result<Self, StageError> {
        let node = state.get(key).ok_or_else(|| StageError::MissingField {
            stage,
            field: key.to_string(),
        })?;
        let view = StageView {
            stage,
            prefix: String::new(),
            node,
        };
        view.expect_object(key)?;
        Ok(view)
    }

    pub(crate) fn stage(&self) -> &'static str {
        self.stage
    }

    /// `parameters` or `contents`; field names below it are reported bare.
    pub(crate) fn section(&self, key: &str) -> Result<StageView<'a>, StageError> {
        let node = self.node(key)?;
        let view = StageView {
            stage: self.stage,
            prefix: String::new(),
            node,
        };
        view.expect_object(key)?;
        Ok(view)
    }

    pub(crate) fn node(&self, key: &str) -> Result<&'a LegacyNode, StageError> {
        self.node.get(key).ok_or_else(|| StageError::MissingField {
            stage: self.stage,
            field: self.field_name(key),
        })
    }

    /// Nested object; its fields are reported as `key.field`.
    pub(crate) fn object(&self, key: &str) -> Result<StageView<'a>, StageError> {
        let node = self.node(key)?;
        if node.entries().is_none() {
            return Err(self.invalid(key, "object"));
        }
        Ok(StageView {
            stage: self.stage,
            prefix: format!("{}.", self.field_name(key)),
            node,
        })
    }

    /// Object elements of array `key`; fields are reported as `key.index.field`.
    pub(crate) fn objects(&self, key: &str) -> Result<Vec<StageView<'a>>, StageError> {
        self.array(key)?
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let field = format!("{}.{index}", self.field_name(key));
                if node.entries().is_none() {
                    return Err(StageError::InvalidField {
                        stage: self.stage,
                        field,
                        expected: "object",
                    });
                }
                Ok(StageView {
                    stage: self.stage,
                    prefix: format!("{field}."),
                    node,
                })
            })
            .collect()
    }

    pub(crate) fn number(&self, key: &str) -> Result<f64, StageError> {
        self.node(key)?
            .as_f64()
            .ok_or_else(|| self.invalid(key, "number"))
    }

    /// Booleans are stored as 0/1; numeric legacy flags are accepted too.
    pub(crate) fn flag(&self, key: &str) -> Result<f64, StageError> {
        let node = self.node(key)?;
        match node {
            LegacyNode::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            LegacyNode::Number(n) => Ok(*n),
            _ => Err(self.invalid(key, "boolean")),
        }
    }

    pub(crate) fn string(&self, key: &str) -> Result<&'a str, StageError> {
        self.node(key)?
            .as_str()
            .ok_or_else(|| self.invalid(key, "string"))
    }

    pub(crate) fn array(&self, key: &str) -> Result<&'a [LegacyNode], StageError> {
        self.node(key)?
            .as_array()
            .ok_or_else(|| self.invalid(key, "array"))
    }

    /// Typed buffer or plain numeric array.
    pub(crate) fn numbers(&self, key: &str) -> Result<Vec<f64>, StageError> {
        self.node(key)?
            .numbers()
            .ok_or_else(|| self.invalid(key, "numeric array"))
    }

    /// A single number, or the elements of a numeric array.
    pub(crate) fn scalar_or_numbers(&self, key: &str) -> Result<Vec<f64>, StageError> {
        let node = self.node(key)?;
        if let Some(n) = node.as_f64() {
            return Ok(vec![n]);
        }
        node.numbers()
            .ok_or_else(|| self.invalid(key, "number or numeric array"))
    }

    pub(crate) fn field_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub(crate) fn invalid(&self, key: &str, expected: &'static str) -> StageError {
        StageError::InvalidField {
            stage: self.stage,
            field: self.field_name(key),
            expected,
        }
    }

    fn expect_object(&self, key: &str) -> Result<(), StageError> {
        if self.node.entries().is_none() {
            return Err(StageError::InvalidField {
                stage: self.stage,
                field: key.to_string(),
                expected: "object",
            });
        }
        Ok(())
    }
}

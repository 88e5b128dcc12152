use std::fmt;

use serde::Serialize;

/// Summary of one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub format_code: u64,
    pub source_version: u64,
    pub target_version: u64,
    /// Compressed legacy metadata size.
    pub metadata_bytes: u64,
    /// Encoded version 1 container size.
    pub container_bytes: u64,
    pub tail_bytes: u64,
    pub stages: Vec<&'static str>,
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "version {} -> {} (format {})",
            self.source_version, self.target_version, self.format_code
        )?;
        writeln!(
            f,
            "metadata {} bytes -> container {} bytes, tail {} bytes kept",
            self.metadata_bytes, self.container_bytes, self.tail_bytes
        )?;
        write!(f, "stages: {}", self.stages.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_stages() {
        let report = MigrationReport {
            format_code: 0,
            source_version: 0,
            target_version: 1_000_000,
            metadata_bytes: 10,
            container_bytes: 20,
            tail_bytes: 3,
            stages: vec!["inputs", "pca"],
        };
        let text = report.to_string();
        assert!(text.starts_with("version 0 -> 1000000"));
        assert!(text.ends_with("stages: inputs, pca"));
    }
}

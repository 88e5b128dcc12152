//! Human and JSON renderings of a finished run.

use std::path::Path;

use serde_json::json;

use super::display_path;
use crate::migrate::{MigrationPaths, MigrationReport};

pub(super) struct Outcome<'a> {
    pub input: &'a Path,
    pub paths: &'a MigrationPaths,
    pub dry_run: bool,
    pub report: &'a MigrationReport,
}

impl Outcome<'_> {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "dry_run": self.dry_run,
            "input": display_path(self.input),
            "intermediate": self.paths.intermediate.as_deref().map(display_path),
            "output": display_path(&self.paths.combined),
            "report": self.report,
        })
    }
}

pub(super) fn render_human(outcome: &Outcome<'_>) -> String {
    let verb = if outcome.dry_run {
        "would write"
    } else {
        "wrote"
    };
    let mut out = format!("migrated {}\n", outcome.input.display());
    if let Some(path) = &outcome.paths.intermediate {
        out.push_str(&format!("{verb} {}\n", path.display()));
    }
    out.push_str(&format!("{verb} {}\n", outcome.paths.combined.display()));
    out.push_str(&outcome.report.to_string());
    out
}

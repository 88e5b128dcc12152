//! CLI surface for kana-upgrade.
//!
//! One command: migrate a legacy state file. Output locations come from
//! config and can be overridden per run.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use serde_json::json;

use crate::config::Config;
use crate::migrate::{MigrateError, MigrationPaths, migrate_bytes, migrate_file, read_input};
use crate::{Error, Result};

mod render;

#[derive(Parser, Debug)]
#[command(
    name = "kana-upgrade",
    version,
    about = "Upgrade a version 0 kana state file to the version 1 container layout",
    infer_long_args = true
)]
pub struct Cli {
    /// Legacy state file to migrate.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Directory for the output files (default: config, else the working directory).
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// File name for the standalone version 1 container.
    #[arg(long, value_name = "NAME")]
    pub intermediate: Option<String>,

    /// File name for the upgraded state file.
    #[arg(long, value_name = "NAME")]
    pub output: Option<String>,

    /// Do not keep the standalone container next to the upgraded file.
    #[arg(long)]
    pub no_intermediate: bool,

    /// Run the whole migration in memory and report, writing nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Machine-readable JSON output on stdout.
    #[arg(long)]
    pub json: bool,

    /// More log output on stderr (repeat for more).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Output locations after applying flags on top of `config`.
    pub fn migration_paths(&self, config: &Config) -> MigrationPaths {
        let dir = self
            .out_dir
            .clone()
            .or_else(|| config.output.dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let keep_intermediate = config.output.keep_intermediate && !self.no_intermediate;
        let intermediate = keep_intermediate.then(|| {
            self.intermediate
                .as_deref()
                .unwrap_or(&config.output.intermediate_name)
        });
        let combined = self
            .output
            .as_deref()
            .unwrap_or(&config.output.combined_name);
        MigrationPaths::in_dir(&dir, intermediate, combined)
    }
}

/// Parse CLI args with flag normalization (used by bin).
pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let raw: Vec<OsString> = args.into_iter().map(|t| t.into()).collect();
    Cli::parse_from(normalize_args(raw))
}

/// Run the CLI (used by bin).
pub fn run(cli: Cli, config: &Config) -> Result<()> {
    let paths = cli.migration_paths(config);
    let _span = tracing::info_span!("migrate", input = %cli.input.display()).entered();

    let report = if cli.dry_run {
        migrate_bytes(&read_input(&cli.input)?)?.report
    } else {
        migrate_file(&cli.input, &paths)?
    };

    let outcome = render::Outcome {
        input: &cli.input,
        paths: &paths,
        dry_run: cli.dry_run,
        report: &report,
    };
    if cli.json {
        print_json(&outcome.to_json())
    } else {
        print_line(&render::render_human(&outcome))
    }
}

/// The `--json` error payload.
pub fn error_json(err: &Error) -> serde_json::Value {
    json!({
        "error": err.kind(),
        "effect": err.effect().as_str(),
        "message": err.to_string(),
    })
}

pub fn print_json(payload: &serde_json::Value) -> Result<()> {
    print_line(&format!("{payload:#}"))
}

fn print_line(s: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{s}")
        && e.kind() != std::io::ErrorKind::BrokenPipe
    {
        return Err(MigrateError::Report(e).into());
    }
    Ok(())
}

fn normalize_args(mut raw: Vec<OsString>) -> Vec<OsString> {
    if raw.is_empty() {
        return raw;
    }

    let mut out = Vec::with_capacity(raw.len());
    out.push(raw.remove(0)); // program name

    let mut positional_only = false;
    for arg in raw {
        let s = arg.to_string_lossy();
        if positional_only || !s.starts_with("--") {
            out.push(arg);
            continue;
        }
        if s == "--" {
            positional_only = true;
            out.push(arg);
            continue;
        }
        let (flag, value) = match s.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (&*s, None),
        };
        let canon = canonical_flag(&flag.to_lowercase().replace('_', "-")).to_string();
        match value {
            Some(v) => out.push(OsString::from(format!("{canon}={v}"))),
            None => out.push(OsString::from(canon)),
        }
    }
    out
}

fn canonical_flag(flag: &str) -> &str {
    match flag {
        "--outdir" | "--output-dir" => "--out-dir",
        "--skip-intermediate" => "--no-intermediate",
        "--dryrun" => "--dry-run",
        other => other,
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

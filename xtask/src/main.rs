use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use schemars::schema_for;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Repo automation tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the "CI local" suite: fmt, clippy, test.
    Ci,

    /// Generate JSON Schemas for results, baselines and input files into `schemas/`.
    Schema {
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Ci => ci(),
        Cmd::Schema { out_dir } => schema(out_dir),
    }
}

fn ci() -> Result<()> {
    run("cargo", &["fmt", "--check"])?;
    run(
        "cargo",
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
    )?;
    run("cargo", &["test", "--workspace"])?;
    Ok(())
}

fn schema(out_dir: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&out_dir).context("create schema output dir")?;

    let outputs = [
        (
            "specguard.result.v1.schema.json",
            serde_json::to_value(schema_for!(specguard_types::HarnessResult))?,
        ),
        (
            "specguard.baseline.v1.schema.json",
            serde_json::to_value(schema_for!(specguard_types::Baseline))?,
        ),
        (
            "specguard.catalog.schema.json",
            serde_json::to_value(schema_for!(specguard_types::CatalogFile))?,
        ),
        (
            "specguard.kb.schema.json",
            serde_json::to_value(schema_for!(specguard_types::KnowledgeBaseFile))?,
        ),
    ];

    for (name, schema) in &outputs {
        let path = out_dir.join(name);
        write_pretty_json(&path, schema)?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn write_pretty_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serialize json")?;
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn run(bin: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(bin)
        .args(args)
        .status()
        .with_context(|| format!("run {bin} {args:?}"))?;
    if !status.success() {
        bail!("command failed: {bin} {args:?}");
    }
    Ok(())
}

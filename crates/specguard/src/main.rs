use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use specguard_analytics::{baseline_from_result, normalize_baseline};
use specguard_core::{HarnessPlan, run_harness};
use specguard_domain::{Catalog, EvalMode, KnowledgeBase, compile_catalog};
use specguard_types::{
    BASELINE_SCHEMA_V1, Baseline, CatalogFile, CheckConfig, FailOn, HarnessResult,
    PredicateConfig, RESULT_SCHEMA_V1,
};

mod config_loader;

use config_loader::{load_catalog_with_includes, load_knowledge_base};

#[derive(Parser)]
#[command(name = "specguard")]
#[command(
    about = "Evaluate a conformance-check catalog against a specification knowledge base",
    long_about = None
)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every check against a knowledge base and report coverage.
    Check(Box<CheckArgs>),

    /// Compile the catalog (and optionally load a knowledge base) and report errors.
    Validate(ValidateArgs),

    /// Print the effective catalog after include resolution.
    Catalog(CatalogArgs),

    /// Show the definition of a single check.
    Explain(ExplainArgs),

    /// Build a baseline file from a previous result.
    Baseline(BaselineArgs),
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Catalog file (TOML).
    #[arg(long)]
    catalog: PathBuf,

    /// Knowledge base file (TOML, or JSON by extension).
    #[arg(long)]
    kb: PathBuf,

    /// Baseline file for delta tracking.
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Write the JSON result here.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the Markdown report here instead of stdout.
    #[arg(long)]
    md: Option<PathBuf>,

    /// Exit with code 2 when this condition holds (defaults to the catalog's setting, else never).
    #[arg(long, value_enum)]
    fail_on: Option<FailOnArg>,

    /// Evaluate checks in parallel.
    #[arg(long)]
    parallel: bool,

    /// Harness version tag recorded in the result.
    #[arg(long, default_value = "v1")]
    version_tag: String,

    /// Specification version label (defaults to the knowledge base label).
    #[arg(long)]
    spec_version: Option<String>,

    /// Dataset name recorded in the result.
    #[arg(long)]
    dataset: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FailOnArg {
    Missing,
    Failing,
    Never,
}

impl From<FailOnArg> for FailOn {
    fn from(v: FailOnArg) -> Self {
        match v {
            FailOnArg::Missing => FailOn::Missing,
            FailOnArg::Failing => FailOn::Failing,
            FailOnArg::Never => FailOn::Never,
        }
    }
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    #[arg(long)]
    catalog: PathBuf,

    /// Also load this knowledge base and report structural errors.
    #[arg(long)]
    kb: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CatalogArgs {
    #[arg(long)]
    catalog: PathBuf,

    #[arg(long, value_enum, default_value_t = CatalogFormat::Toml)]
    format: CatalogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CatalogFormat {
    Toml,
    Json,
}

#[derive(Parser, Debug)]
struct ExplainArgs {
    /// The check id to explain (e.g. "R-02").
    check_id: String,

    #[arg(long)]
    catalog: PathBuf,
}

#[derive(Parser, Debug)]
struct BaselineArgs {
    /// A JSON result written by `specguard check --out`.
    #[arg(long)]
    from: PathBuf,

    /// Where to write the baseline.
    #[arg(long)]
    out: PathBuf,

    /// Label stored in the baseline (defaults to "<version> <spec_version>").
    #[arg(long)]
    label: Option<String>,
}

#[cfg(not(test))]
fn main() -> std::process::ExitCode {
    match run_with_args(std::env::args_os()) {
        Ok(code) => std::process::ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::ExitCode::from(1)
        }
    }
}

fn run_with_args<I, T>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Check(args) => cmd_check(*args),
        Commands::Validate(args) => cmd_validate(args),
        Commands::Catalog(args) => {
            cmd_catalog(args)?;
            Ok(0)
        }
        Commands::Explain(args) => {
            cmd_explain(args)?;
            Ok(0)
        }
        Commands::Baseline(args) => {
            cmd_baseline(args)?;
            Ok(0)
        }
    }
}

/// Initialize tracing/logging based on CLI flags.
fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("Logging initialized at level: {}", level);
}

fn load_catalog(path: &Path) -> Result<(CatalogFile, Catalog)> {
    let file = load_catalog_with_includes(path)?;
    let catalog = compile_catalog(&file.check)
        .with_context(|| format!("compile catalog '{}'", path.display()))?;
    Ok((file, catalog))
}

fn load_kb(path: &Path) -> Result<KnowledgeBase> {
    let file = load_knowledge_base(path)?;
    KnowledgeBase::from_file(&file)
        .with_context(|| format!("load knowledge base '{}'", path.display()))
}

/// Loads a baseline file. A prior `check --out` result is accepted too and
/// converted the same way `specguard baseline` would.
fn load_baseline(path: &Path) -> Result<Baseline> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read baseline '{}'", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parse baseline '{}'", path.display()))?;

    let schema = value
        .get("schema")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    if schema == RESULT_SCHEMA_V1 {
        let result: HarnessResult = serde_json::from_value(value)
            .with_context(|| format!("parse result '{}'", path.display()))?;
        info!("Deriving baseline from result '{}'", path.display());
        return Ok(baseline_from_result(&result));
    }

    let baseline: Baseline = serde_json::from_value(value)
        .with_context(|| format!("parse baseline '{}'", path.display()))?;
    let baseline = normalize_baseline(baseline);
    if baseline.schema != BASELINE_SCHEMA_V1 {
        bail!(
            "'{}' has schema '{}', expected '{}'; build one with `specguard baseline --from <result.json>`",
            path.display(),
            baseline.schema,
            BASELINE_SCHEMA_V1
        );
    }
    Ok(baseline)
}

fn cmd_check(args: CheckArgs) -> Result<i32> {
    let (file, catalog) = load_catalog(&args.catalog)?;
    let kb = load_kb(&args.kb)?;
    let baseline = args.baseline.as_deref().map(load_baseline).transpose()?;

    let fail_on = args
        .fail_on
        .map(FailOn::from)
        .or(file.defaults.fail_on)
        .unwrap_or(FailOn::Never);
    let parallel = args.parallel || file.defaults.parallel.unwrap_or(false);

    let plan = HarnessPlan {
        version: args.version_tag,
        spec_version: args.spec_version,
        dataset: args.dataset,
        fail_on,
        mode: if parallel {
            EvalMode::Parallel
        } else {
            EvalMode::Sequential
        },
    };
    info!(
        checks = catalog.len(),
        structures = kb.len(),
        fail_on = fail_on.as_str(),
        parallel,
        "running harness"
    );

    let run = run_harness(&plan, &catalog, &kb, baseline.as_ref());

    if let Some(out) = &args.out {
        write_json(out, &run.result)?;
        info!("Wrote result to {}", out.display());
    }

    match &args.md {
        Some(md) => {
            write_text(md, &run.markdown)?;
            info!("Wrote markdown report to {}", md.display());
        }
        None => print!("{}", run.markdown),
    }

    Ok(run.exit_code)
}

fn cmd_validate(args: ValidateArgs) -> Result<i32> {
    info!("Validating catalog");

    let file = load_catalog_with_includes(&args.catalog)?;
    let catalog = match compile_catalog(&file.check) {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("Catalog '{}' is invalid: {err}", args.catalog.display());
            return Ok(1);
        }
    };

    println!(
        "Catalog OK: {} check(s) across {} modality(ies): {}",
        catalog.len(),
        catalog.modalities().len(),
        catalog.modalities().join(", ")
    );

    if let Some(kb_path) = &args.kb {
        let kb_file = load_knowledge_base(kb_path)?;
        match KnowledgeBase::from_file(&kb_file) {
            Ok(kb) => println!(
                "Knowledge base OK: {} structure(s){}",
                kb.len(),
                kb.label().map(|l| format!(" ({l})")).unwrap_or_default()
            ),
            Err(err) => {
                eprintln!("Knowledge base '{}' is invalid: {err}", kb_path.display());
                return Ok(1);
            }
        }
    }

    Ok(0)
}

fn cmd_catalog(args: CatalogArgs) -> Result<()> {
    let file = load_catalog_with_includes(&args.catalog)?;

    match args.format {
        CatalogFormat::Toml => {
            let s = toml::to_string_pretty(&file).context("render toml")?;
            print!("{s}");
        }
        CatalogFormat::Json => {
            let s = serde_json::to_string_pretty(&file).context("render json")?;
            println!("{s}");
        }
    }

    Ok(())
}

fn cmd_explain(args: ExplainArgs) -> Result<()> {
    let file = load_catalog_with_includes(&args.catalog)?;

    match file.check.iter().find(|c| c.id == args.check_id) {
        Some(c) => {
            print!("{}", format_check_explanation(c));
            Ok(())
        }
        None => {
            let suggestions = find_similar_checks(&args.check_id, &file.check);
            let mut msg = format!("Check '{}' not found.", args.check_id);

            if !suggestions.is_empty() {
                msg.push_str("\n\nDid you mean one of these?\n");
                for s in &suggestions {
                    msg.push_str(&format!("  - {s}\n"));
                }
            }

            msg.push_str("\nUse 'specguard catalog' to list all checks.");

            bail!("{}", msg);
        }
    }
}

fn cmd_baseline(args: BaselineArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.from)
        .with_context(|| format!("read result '{}'", args.from.display()))?;
    let result: HarnessResult = serde_json::from_str(&text)
        .with_context(|| format!("parse result '{}'", args.from.display()))?;

    let mut baseline = baseline_from_result(&result);
    if let Some(label) = args.label {
        baseline.label = Some(label);
    }
    baseline.created_at = Some(Utc::now().to_rfc3339());

    write_json(&args.out, &baseline)?;
    info!(
        checks = baseline.severities.len(),
        "Wrote baseline to {}",
        args.out.display()
    );
    Ok(())
}

/// Format a check definition for display.
fn format_check_explanation(c: &CheckConfig) -> String {
    let mut out = String::new();

    out.push_str(&format!("Check: {}\n", c.id));
    out.push_str(&format!("Modality: {}\n", c.modality));
    out.push_str(&format!("Title: {}\n", c.title));

    out.push_str(&format!("\nPredicate: {}\n", c.predicate.kind()));
    match &c.predicate {
        PredicateConfig::HasMember { structure, member } => {
            out.push_str(&format!("  - {structure} has '{member}'\n"));
        }
        PredicateConfig::HasAll { structure, members } => {
            out.push_str(&format!("  - {structure} has all of: {}\n", members.join(", ")));
        }
        PredicateConfig::HasAny { structure, members } => {
            out.push_str(&format!("  - {structure} has any of: {}\n", members.join(", ")));
        }
        PredicateConfig::Companion {
            structure,
            claim,
            requires,
        } => {
            out.push_str(&format!(
                "  - when {structure} has '{claim}', it also has: {}\n",
                requires.join(", ")
            ));
        }
        PredicateConfig::Path { structure, path } => {
            out.push_str(&format!("  - {structure}.{} resolves\n", path.join(".")));
        }
        PredicateConfig::Attest { severity, detail } => {
            out.push_str(&format!("  - attested {severity}: {detail}\n"));
        }
    }

    let policy = specguard_domain::FailurePolicy::from_config(
        &c.policy.clone().unwrap_or_default(),
    );
    out.push_str("\nFailure policy:\n");
    out.push_str(&format!("  - absent: {}\n", policy.absent));
    out.push_str(&format!("  - partial: {}\n", policy.partial));
    out.push_str(&format!("  - conflict: {}\n", policy.conflict));

    if let Some(note) = &c.note {
        out.push_str(&format!("\nNote: {note}\n"));
    }

    out
}

/// Find checks with ids similar to `check_id`.
fn find_similar_checks(check_id: &str, checks: &[CheckConfig]) -> Vec<String> {
    let wanted = check_id.to_lowercase();
    let mut candidates: Vec<(String, usize)> = Vec::new();

    for c in checks {
        let id_lower = c.id.to_lowercase();

        if id_lower.starts_with(&wanted) || wanted.starts_with(&id_lower) {
            candidates.push((c.id.clone(), 0));
            continue;
        }

        if id_lower.contains(&wanted) || wanted.contains(&id_lower) {
            candidates.push((c.id.clone(), 1));
            continue;
        }

        let distance = simple_edit_distance(&wanted, &id_lower);
        if distance <= 2 {
            candidates.push((c.id.clone(), distance + 2));
        }
    }

    candidates.sort_by_key(|(_, score)| *score);
    candidates.truncate(5);
    candidates.into_iter().map(|(id, _)| id).collect()
}

/// Simple edit distance calculation.
fn simple_edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    ensure_parent(path)?;
    let bytes = serde_json::to_vec_pretty(value).context("serialize json")?;
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use specguard_testkit::fixtures::radar;
    use tempfile::TempDir;

    fn radar_files(dir: &Path) -> (PathBuf, PathBuf) {
        let catalog = dir.join("catalog.toml");
        let kb = dir.join("kb.toml");
        std::fs::write(&catalog, radar::CATALOG_TOML).unwrap();
        std::fs::write(&kb, radar::KB_TOML).unwrap();
        (catalog, kb)
    }

    fn args(parts: &[&str]) -> Vec<String> {
        std::iter::once("specguard")
            .chain(parts.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn check_writes_result_and_honours_fail_on() {
        let td = TempDir::new().unwrap();
        let (catalog, kb) = radar_files(td.path());
        let out = td.path().join("out/result.json");
        let md = td.path().join("out/report.md");

        let code = run_with_args(args(&[
            "check",
            "--catalog",
            catalog.to_str().unwrap(),
            "--kb",
            kb.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--md",
            md.to_str().unwrap(),
            "--fail-on",
            "missing",
        ]))
        .unwrap();
        assert_eq!(code, 2);

        let result: HarnessResult =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(result.passes, 1);
        assert_eq!(result.spec_version, "SpatialDDS 1.4");
        assert!(std::fs::read_to_string(&md).unwrap().contains("| **TOTAL** |"));
    }

    #[test]
    fn check_defaults_to_never_failing() {
        let td = TempDir::new().unwrap();
        let (catalog, kb) = radar_files(td.path());
        let md = td.path().join("report.md");

        let code = run_with_args(args(&[
            "check",
            "--catalog",
            catalog.to_str().unwrap(),
            "--kb",
            kb.to_str().unwrap(),
            "--md",
            md.to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn validate_reports_duplicate_ids() {
        let td = TempDir::new().unwrap();
        let catalog = td.path().join("catalog.toml");
        std::fs::write(
            &catalog,
            format!("{}{}", radar::CATALOG_TOML, radar::CATALOG_TOML),
        )
        .unwrap();

        // Duplicates within one file are not merged away; only includes merge by id.
        let code = run_with_args(args(&["validate", "--catalog", catalog.to_str().unwrap()]))
            .unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn explain_suggests_similar_ids() {
        let td = TempDir::new().unwrap();
        let (catalog, _) = radar_files(td.path());

        let err = run_with_args(args(&[
            "explain",
            "AA",
            "--catalog",
            catalog.to_str().unwrap(),
        ]))
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Check 'AA' not found."));
        assert!(msg.contains("- A"));
    }

    #[test]
    fn explanation_lists_policy_defaults() {
        let text = format_check_explanation(&radar::checks()[1]);
        assert!(text.starts_with("Check: B\nModality: Radar\n"));
        assert!(text.contains("  - Detection has 'rcs'\n"));
        assert!(text.contains("  - absent: MISSING\n"));
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(simple_edit_distance("r-01", "r-02"), 1);
        assert_eq!(simple_edit_distance("", "abc"), 3);
        assert_eq!(simple_edit_distance("same", "same"), 0);
    }
}

//! Catalog and knowledge-base loading.
//!
//! Catalog files support:
//! - `includes` directive to compose catalogs from multiple files
//! - Circular include detection
//! - Merge semantics (later definitions override earlier ones by check id,
//!   keeping the position of the first definition)

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use specguard_types::{CatalogFile, Defaults, KnowledgeBaseFile};

/// Maximum depth for include resolution to prevent excessive nesting.
const MAX_INCLUDE_DEPTH: usize = 10;

/// Load a catalog file with include resolution.
///
/// Included checks come first, in include order, followed by the including
/// file's own checks.
pub fn load_catalog_with_includes(path: &Path) -> Result<CatalogFile> {
    let mut visited = HashSet::new();
    load_catalog_recursive(path, &mut visited, 0)
}

fn load_catalog_recursive(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    depth: usize,
) -> Result<CatalogFile> {
    if depth > MAX_INCLUDE_DEPTH {
        bail!(
            "Include depth exceeded maximum of {} levels at '{}'",
            MAX_INCLUDE_DEPTH,
            path.display()
        );
    }

    // Canonicalize path for consistent comparison
    let canonical = path
        .canonicalize()
        .with_context(|| format!("canonicalize path '{}'", path.display()))?;

    if !visited.insert(canonical.clone()) {
        bail!("Circular include detected: '{}'", path.display());
    }

    debug!("Loading catalog from '{}' (depth {})", path.display(), depth);

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read catalog '{}'", path.display()))?;
    let catalog: CatalogFile =
        toml::from_str(&text).with_context(|| format!("parse catalog '{}'", path.display()))?;

    if catalog.includes.is_empty() {
        visited.remove(&canonical);
        return Ok(catalog);
    }

    let base_dir = path.parent().unwrap_or(Path::new("."));

    let mut merged = CatalogFile::default();
    for include_path in &catalog.includes {
        let full_path = base_dir.join(include_path);
        debug!(
            "Resolving include '{}' relative to '{}'",
            include_path,
            base_dir.display()
        );

        if !full_path.exists() {
            bail!(
                "Included catalog file not found: '{}' (resolved from '{}')",
                full_path.display(),
                include_path
            );
        }

        let included = load_catalog_recursive(&full_path, visited, depth + 1)?;
        merged = merge_catalogs(merged, included);
    }

    // The including file wins over its includes.
    let own = CatalogFile {
        includes: vec![],
        defaults: catalog.defaults,
        check: catalog.check,
    };
    merged = merge_catalogs(merged, own);

    // A file may be included from two branches; only a path back to itself is a cycle.
    visited.remove(&canonical);
    Ok(merged)
}

/// Merge two catalogs. Checks from `other` replace same-id checks from `base` in place;
/// `[defaults]` keys set in `other` win, unset ones keep `base`'s value.
fn merge_catalogs(base: CatalogFile, other: CatalogFile) -> CatalogFile {
    let defaults = Defaults {
        fail_on: other.defaults.fail_on.or(base.defaults.fail_on),
        parallel: other.defaults.parallel.or(base.defaults.parallel),
    };

    let mut check = base.check;
    let mut position: HashMap<String, usize> = check
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.clone(), i))
        .collect();

    for c in other.check {
        match position.get(&c.id) {
            Some(&i) => check[i] = c,
            None => {
                position.insert(c.id.clone(), check.len());
                check.push(c);
            }
        }
    }

    CatalogFile {
        includes: vec![],
        defaults,
        check,
    }
}

/// Load a knowledge base; `.json` files are parsed as JSON, everything else as TOML.
pub fn load_knowledge_base(path: &Path) -> Result<KnowledgeBaseFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read knowledge base '{}'", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&text)
            .with_context(|| format!("parse knowledge base '{}'", path.display()))
    } else {
        toml::from_str(&text).with_context(|| format!("parse knowledge base '{}'", path.display()))
    }
}

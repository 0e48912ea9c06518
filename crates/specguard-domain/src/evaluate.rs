use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info};

use specguard_types::{Finding, Severity, SeverityCounts};

use crate::catalog::{Catalog, Check};
use crate::knowledge::KnowledgeBase;

/// How a [`Checker`] walks the catalog. Both modes produce findings in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("baseline severities were already applied to this run")]
    BaselineAlreadyApplied,
}

/// Ordered findings of one evaluation run, one per check in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindingStore {
    findings: Vec<Finding>,
    baseline_applied: bool,
}

impl FindingStore {
    pub fn as_slice(&self) -> &[Finding] {
        &self.findings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn get(&self, check_id: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.check_id == check_id)
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for f in &self.findings {
            counts.bump(f.severity);
        }
        counts
    }

    pub fn baseline_applied(&self) -> bool {
        self.baseline_applied
    }

    /// Records each finding's baseline severity, looked up by check id.
    ///
    /// This is the only mutation a finding sees after creation and may happen once per run.
    pub fn annotate_baseline(
        &mut self,
        severities: &BTreeMap<String, Severity>,
    ) -> Result<(), StoreError> {
        if self.baseline_applied {
            return Err(StoreError::BaselineAlreadyApplied);
        }
        for f in &mut self.findings {
            f.baseline_severity = severities.get(&f.check_id).copied();
        }
        self.baseline_applied = true;
        Ok(())
    }

    pub fn into_vec(self) -> Vec<Finding> {
        self.findings
    }
}

impl<'a> IntoIterator for &'a FindingStore {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}

/// One evaluation session over an immutable catalog and knowledge base.
#[derive(Debug)]
pub struct Checker<'a> {
    catalog: &'a Catalog,
    kb: &'a KnowledgeBase,
    mode: EvalMode,
}

impl<'a> Checker<'a> {
    pub fn new(catalog: &'a Catalog, kb: &'a KnowledgeBase) -> Self {
        Self {
            catalog,
            kb,
            mode: EvalMode::default(),
        }
    }

    pub fn mode(mut self, mode: EvalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Evaluates every check exactly once. Never fails: missing knowledge-base
    /// references surface as `MISSING` findings.
    pub fn run(&self) -> FindingStore {
        let kb = self.kb;
        let findings: Vec<Finding> = match self.mode {
            EvalMode::Sequential => self.catalog.iter().map(|c| c.evaluate(kb)).collect(),
            // Indexed collect keeps catalog order.
            EvalMode::Parallel => self
                .catalog
                .checks()
                .par_iter()
                .map(|c: &Check| c.evaluate(kb))
                .collect(),
        };

        let store = FindingStore {
            findings,
            baseline_applied: false,
        };
        debug_assert_eq!(store.len(), self.catalog.len());

        let counts = store.counts();
        info!(
            checks = counts.total,
            pass = counts.pass,
            failing = counts.failing(),
            mode = ?self.mode,
            kb = self.kb.label().unwrap_or("unlabelled"),
            "evaluation complete"
        );
        debug!(modalities = self.catalog.modalities().len(), "catalog modalities");
        store
    }
}

/// Evaluates `catalog` against `kb` sequentially.
pub fn evaluate(catalog: &Catalog, kb: &KnowledgeBase) -> FindingStore {
    Checker::new(catalog, kb).run()
}

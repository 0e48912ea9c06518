use std::collections::HashMap;

use tracing::debug;

use specguard_types::{CheckConfig, Finding, PolicyConfig, Severity};

use crate::knowledge::KnowledgeBase;
use crate::predicate::{FailurePolicy, Outcome, Predicate};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate check id '{id}'")]
    DuplicateId { id: String },

    #[error("check '{id}' has an empty {field}")]
    EmptyField { id: String, field: &'static str },

    #[error("check '{id}' uses a {kind} predicate with no members")]
    EmptyMembers { id: String, kind: &'static str },

    #[error("check '{id}' maps the '{case}' failure case to PASS")]
    InvalidPolicy { id: String, case: &'static str },
}

/// One conformance rule. Immutable once registered.
#[derive(Debug, Clone)]
pub struct Check {
    pub id: String,
    pub modality: String,
    pub title: String,
    pub predicate: Predicate,
    pub policy: FailurePolicy,
    pub note: Option<String>,
}

impl Check {
    pub fn new(id: &str, modality: &str, title: &str, predicate: Predicate) -> Self {
        Self {
            id: id.to_string(),
            modality: modality.to_string(),
            title: title.to_string(),
            predicate,
            policy: FailurePolicy::default(),
            note: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn from_config(cfg: &CheckConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            modality: cfg.modality.clone(),
            title: cfg.title.clone(),
            predicate: Predicate::from_config(&cfg.predicate),
            policy: cfg
                .policy
                .as_ref()
                .map(FailurePolicy::from_config)
                .unwrap_or_default(),
            note: cfg.note.clone(),
        }
    }

    /// The config form, or `None` for checks with a custom predicate.
    pub fn to_config(&self) -> Option<CheckConfig> {
        let defaults = FailurePolicy::default();
        let policy = (self.policy != defaults).then(|| PolicyConfig {
            absent: (self.policy.absent != defaults.absent).then_some(self.policy.absent),
            partial: (self.policy.partial != defaults.partial).then_some(self.policy.partial),
            conflict: (self.policy.conflict != defaults.conflict).then_some(self.policy.conflict),
        });

        Some(CheckConfig {
            id: self.id.clone(),
            modality: self.modality.clone(),
            title: self.title.clone(),
            predicate: self.predicate.to_config()?,
            policy,
            note: self.note.clone(),
        })
    }

    /// Evaluates the predicate. A missing knowledge-base reference becomes a
    /// `MISSING` finding; this never fails.
    pub fn evaluate(&self, kb: &KnowledgeBase) -> Finding {
        let outcome = match self.predicate.evaluate(kb, &self.policy) {
            Ok(outcome) => outcome,
            Err(missing) => Outcome::new(Severity::Missing, missing.to_string()),
        };

        let detail = match &self.note {
            Some(note) => format!("{}; {note}", outcome.detail),
            None => outcome.detail,
        };

        debug!(
            check_id = %self.id,
            severity = %outcome.severity,
            "evaluated check"
        );

        Finding {
            modality: self.modality.clone(),
            check_id: self.id.clone(),
            title: self.title.clone(),
            severity: outcome.severity,
            detail,
            baseline_severity: None,
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for (field, value) in [
            ("id", &self.id),
            ("modality", &self.modality),
            ("title", &self.title),
        ] {
            if value.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    id: self.id.clone(),
                    field,
                });
            }
        }

        if self
            .predicate
            .required_list()
            .is_some_and(|members| members.is_empty())
        {
            return Err(CatalogError::EmptyMembers {
                id: self.id.clone(),
                kind: self.predicate.kind(),
            });
        }

        if let Some((field, _)) = self
            .predicate
            .named_parts()
            .into_iter()
            .find(|(_, name)| name.trim().is_empty())
        {
            return Err(CatalogError::EmptyField {
                id: self.id.clone(),
                field,
            });
        }

        if let Some(case) = self.policy.passing_case() {
            return Err(CatalogError::InvalidPolicy {
                id: self.id.clone(),
                case,
            });
        }

        Ok(())
    }
}

/// The ordered, read-only set of checks for a process.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    checks: Vec<Check>,
    index: HashMap<String, usize>,
    modalities: Vec<String>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Checks in registration order.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Check> {
        self.checks.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Check> {
        self.index.get(id).map(|&i| &self.checks[i])
    }

    /// Modalities in first-registration order.
    pub fn modalities(&self) -> &[String] {
        &self.modalities
    }

    pub fn in_modality<'a>(&'a self, modality: &'a str) -> impl Iterator<Item = &'a Check> + 'a {
        self.checks.iter().filter(move |c| c.modality == modality)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Config form of every declarative check, in registration order.
    pub fn to_configs(&self) -> Vec<CheckConfig> {
        self.checks.iter().filter_map(Check::to_config).collect()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Check;
    type IntoIter = std::slice::Iter<'a, Check>;

    fn into_iter(self) -> Self::IntoIter {
        self.checks.iter()
    }
}

/// One-time, deterministic catalog construction.
///
/// Registrations are validated as they arrive. The first invalid one is
/// remembered, later registrations are ignored, and [`CatalogBuilder::build`]
/// returns that error.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: Catalog,
    error: Option<CatalogError>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, check: Check) -> Self {
        if self.error.is_none()
            && let Err(err) = self.push(check)
        {
            self.error = Some(err);
        }
        self
    }

    pub fn register_all(mut self, checks: impl IntoIterator<Item = Check>) -> Self {
        for c in checks {
            self = self.register(c);
        }
        self
    }

    pub fn build(self) -> Result<Catalog, CatalogError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        debug!(
            checks = self.catalog.checks.len(),
            modalities = self.catalog.modalities.len(),
            "catalog built"
        );
        Ok(self.catalog)
    }

    fn push(&mut self, check: Check) -> Result<(), CatalogError> {
        check.validate()?;

        let catalog = &mut self.catalog;
        if catalog.index.contains_key(&check.id) {
            return Err(CatalogError::DuplicateId { id: check.id });
        }
        if !catalog.modalities.contains(&check.modality) {
            catalog.modalities.push(check.modality.clone());
        }
        catalog.index.insert(check.id.clone(), catalog.checks.len());
        catalog.checks.push(check);
        Ok(())
    }
}

/// Compiles declarative check records into a catalog, in the given order.
pub fn compile_catalog(configs: &[CheckConfig]) -> Result<Catalog, CatalogError> {
    CatalogBuilder::new()
        .register_all(configs.iter().map(Check::from_config))
        .build()
}

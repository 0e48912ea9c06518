use std::fmt;
use std::sync::Arc;

use specguard_types::{PolicyConfig, PredicateConfig, Severity};

use crate::knowledge::{KnowledgeBase, MissingReference, Structure};

/// Severity and human-readable detail produced by one predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub severity: Severity,
    pub detail: String,
}

impl Outcome {
    pub fn new(severity: Severity, detail: impl Into<String>) -> Self {
        Self {
            severity,
            detail: detail.into(),
        }
    }

    pub fn pass(detail: impl Into<String>) -> Self {
        Self::new(Severity::Pass, detail)
    }
}

/// Which failing severity a check reports for each kind of shortfall.
///
/// Different checks disagree on how serious a given absence is, so this is
/// configured per check rather than fixed globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// The capability the check verifies is entirely absent.
    pub absent: Severity,
    /// Some, but not all, of a required set is present.
    pub partial: Severity,
    /// A claimed capability is present without its required companions.
    pub conflict: Severity,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            absent: Severity::Missing,
            partial: Severity::Gap,
            conflict: Severity::Mismatch,
        }
    }
}

impl FailurePolicy {
    pub fn from_config(cfg: &PolicyConfig) -> Self {
        let d = Self::default();
        Self {
            absent: cfg.absent.unwrap_or(d.absent),
            partial: cfg.partial.unwrap_or(d.partial),
            conflict: cfg.conflict.unwrap_or(d.conflict),
        }
    }

    /// Returns the name of the first case mapped to `PASS`, if any.
    pub(crate) fn passing_case(&self) -> Option<&'static str> {
        [
            ("absent", self.absent),
            ("partial", self.partial),
            ("conflict", self.conflict),
        ]
        .into_iter()
        .find(|(_, s)| *s == Severity::Pass)
        .map(|(case, _)| case)
    }
}

type PredicateFn = dyn Fn(&KnowledgeBase) -> Result<Outcome, MissingReference> + Send + Sync;

/// A caller-supplied predicate. Must be a pure function of the knowledge base.
#[derive(Clone)]
pub struct CustomPredicate {
    name: String,
    f: Arc<PredicateFn>,
}

impl CustomPredicate {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&KnowledgeBase) -> Result<Outcome, MissingReference> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPredicate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    HasMember {
        structure: String,
        member: String,
    },
    HasAll {
        structure: String,
        members: Vec<String>,
    },
    HasAny {
        structure: String,
        members: Vec<String>,
    },
    Companion {
        structure: String,
        claim: String,
        requires: Vec<String>,
    },
    Path {
        structure: String,
        path: Vec<String>,
    },
    Attest {
        severity: Severity,
        detail: String,
    },
    Custom(CustomPredicate),
}

impl Predicate {
    pub fn has_member(structure: &str, member: &str) -> Self {
        Predicate::HasMember {
            structure: structure.to_string(),
            member: member.to_string(),
        }
    }

    pub fn has_all(structure: &str, members: &[&str]) -> Self {
        Predicate::HasAll {
            structure: structure.to_string(),
            members: to_owned(members),
        }
    }

    pub fn has_any(structure: &str, members: &[&str]) -> Self {
        Predicate::HasAny {
            structure: structure.to_string(),
            members: to_owned(members),
        }
    }

    pub fn companion(structure: &str, claim: &str, requires: &[&str]) -> Self {
        Predicate::Companion {
            structure: structure.to_string(),
            claim: claim.to_string(),
            requires: to_owned(requires),
        }
    }

    pub fn path(structure: &str, path: &[&str]) -> Self {
        Predicate::Path {
            structure: structure.to_string(),
            path: to_owned(path),
        }
    }

    pub fn attest(severity: Severity, detail: &str) -> Self {
        Predicate::Attest {
            severity,
            detail: detail.to_string(),
        }
    }

    pub fn custom<F>(name: &str, f: F) -> Self
    where
        F: Fn(&KnowledgeBase) -> Result<Outcome, MissingReference> + Send + Sync + 'static,
    {
        Predicate::Custom(CustomPredicate::new(name, f))
    }

    pub fn from_config(cfg: &PredicateConfig) -> Self {
        match cfg {
            PredicateConfig::HasMember { structure, member } => Predicate::HasMember {
                structure: structure.clone(),
                member: member.clone(),
            },
            PredicateConfig::HasAll { structure, members } => Predicate::HasAll {
                structure: structure.clone(),
                members: members.clone(),
            },
            PredicateConfig::HasAny { structure, members } => Predicate::HasAny {
                structure: structure.clone(),
                members: members.clone(),
            },
            PredicateConfig::Companion {
                structure,
                claim,
                requires,
            } => Predicate::Companion {
                structure: structure.clone(),
                claim: claim.clone(),
                requires: requires.clone(),
            },
            PredicateConfig::Path { structure, path } => Predicate::Path {
                structure: structure.clone(),
                path: path.clone(),
            },
            PredicateConfig::Attest { severity, detail } => Predicate::Attest {
                severity: *severity,
                detail: detail.clone(),
            },
        }
    }

    /// The config form, or `None` for custom predicates.
    pub fn to_config(&self) -> Option<PredicateConfig> {
        Some(match self.clone() {
            Predicate::HasMember { structure, member } => {
                PredicateConfig::HasMember { structure, member }
            }
            Predicate::HasAll { structure, members } => {
                PredicateConfig::HasAll { structure, members }
            }
            Predicate::HasAny { structure, members } => {
                PredicateConfig::HasAny { structure, members }
            }
            Predicate::Companion {
                structure,
                claim,
                requires,
            } => PredicateConfig::Companion {
                structure,
                claim,
                requires,
            },
            Predicate::Path { structure, path } => PredicateConfig::Path { structure, path },
            Predicate::Attest { severity, detail } => PredicateConfig::Attest { severity, detail },
            Predicate::Custom(_) => return None,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::HasMember { .. } => "has_member",
            Predicate::HasAll { .. } => "has_all",
            Predicate::HasAny { .. } => "has_any",
            Predicate::Companion { .. } => "companion",
            Predicate::Path { .. } => "path",
            Predicate::Attest { .. } => "attest",
            Predicate::Custom(_) => "custom",
        }
    }

    /// The member list a predicate needs to be meaningful, for build-time validation.
    pub(crate) fn required_list(&self) -> Option<&[String]> {
        match self {
            Predicate::HasAll { members, .. } | Predicate::HasAny { members, .. } => {
                Some(members.as_slice())
            }
            Predicate::Companion { requires, .. } => Some(requires.as_slice()),
            Predicate::Path { path, .. } => Some(path.as_slice()),
            _ => None,
        }
    }

    /// Every name a predicate looks up, labelled by role, for build-time validation.
    pub(crate) fn named_parts(&self) -> Vec<(&'static str, &str)> {
        let mut parts = Vec::new();
        match self {
            Predicate::HasMember { structure, member } => {
                parts.push(("structure", structure.as_str()));
                parts.push(("member", member.as_str()));
            }
            Predicate::HasAll { structure, members } | Predicate::HasAny { structure, members } => {
                parts.push(("structure", structure.as_str()));
                parts.extend(members.iter().map(|m| ("member", m.as_str())));
            }
            Predicate::Companion {
                structure,
                claim,
                requires,
            } => {
                parts.push(("structure", structure.as_str()));
                parts.push(("claim", claim.as_str()));
                parts.extend(requires.iter().map(|m| ("member", m.as_str())));
            }
            Predicate::Path { structure, path } => {
                parts.push(("structure", structure.as_str()));
                parts.extend(path.iter().map(|p| ("path element", p.as_str())));
            }
            Predicate::Attest { .. } | Predicate::Custom(_) => {}
        }
        parts
    }

    pub fn evaluate(
        &self,
        kb: &KnowledgeBase,
        policy: &FailurePolicy,
    ) -> Result<Outcome, MissingReference> {
        match self {
            Predicate::HasMember { structure, member } => {
                let s = kb.require(structure)?;
                let noun = s.kind().member_noun();
                if s.contains(member) {
                    Ok(Outcome::pass(format!("{structure} has {noun} '{member}'")))
                } else {
                    Ok(Outcome::new(
                        policy.absent,
                        format!("{structure} has no {noun} '{member}'"),
                    ))
                }
            }
            Predicate::HasAll { structure, members } => {
                let s = kb.require(structure)?;
                let (present, missing) = partition(s, members);
                if missing.is_empty() {
                    Ok(Outcome::pass(format!(
                        "all present in {structure}: {}",
                        list(&present)
                    )))
                } else if present.is_empty() {
                    Ok(Outcome::new(
                        policy.absent,
                        format!("missing from {structure}: {}", list(&missing)),
                    ))
                } else {
                    Ok(Outcome::new(
                        policy.partial,
                        format!(
                            "missing from {structure}: {} (present: {})",
                            list(&missing),
                            list(&present)
                        ),
                    ))
                }
            }
            Predicate::HasAny { structure, members } => {
                let s = kb.require(structure)?;
                let (present, _) = partition(s, members);
                if present.is_empty() {
                    Ok(Outcome::new(
                        policy.absent,
                        format!("none of {} in {structure}", list_owned(members)),
                    ))
                } else {
                    Ok(Outcome::pass(format!(
                        "present in {structure}: {}",
                        list(&present)
                    )))
                }
            }
            Predicate::Companion {
                structure,
                claim,
                requires,
            } => {
                let s = kb.require(structure)?;
                if !s.contains(claim) {
                    return Ok(Outcome::new(
                        policy.absent,
                        format!(
                            "{structure} has no {} '{claim}'",
                            s.kind().member_noun()
                        ),
                    ));
                }
                let (present, missing) = partition(s, requires);
                if missing.is_empty() {
                    Ok(Outcome::pass(format!(
                        "{structure} has '{claim}' with companions {}",
                        list(&present)
                    )))
                } else {
                    Ok(Outcome::new(
                        policy.conflict,
                        format!(
                            "{structure} has '{claim}' but lacks companion(s) {}",
                            list(&missing)
                        ),
                    ))
                }
            }
            Predicate::Path { structure, path } => resolve_path(kb, structure, path, policy),
            Predicate::Attest { severity, detail } => Ok(Outcome::new(*severity, detail.clone())),
            Predicate::Custom(c) => (c.f)(kb),
        }
    }
}

fn resolve_path(
    kb: &KnowledgeBase,
    root: &str,
    path: &[String],
    policy: &FailurePolicy,
) -> Result<Outcome, MissingReference> {
    let dotted = std::iter::once(root)
        .chain(path.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(".");

    let mut current = kb.require(root)?;
    let Some((last, hops)) = path.split_last() else {
        return Ok(Outcome::pass(format!("{root} exists")));
    };

    for field in hops {
        if !current.contains(field) {
            return Ok(Outcome::new(
                policy.absent,
                format!(
                    "{dotted} does not resolve: {} has no field '{field}'",
                    current.name()
                ),
            ));
        }
        let Some(target) = current.reference(field) else {
            return Ok(Outcome::new(
                policy.absent,
                format!(
                    "{dotted} does not resolve: {}.{field} does not reference a structure",
                    current.name()
                ),
            ));
        };
        current = kb
            .get(target)
            .ok_or_else(|| MissingReference::Referenced {
                structure: target.to_string(),
                from: current.name().to_string(),
                field: field.clone(),
            })?;
    }

    if current.contains(last) {
        Ok(Outcome::pass(format!("{dotted} resolves")))
    } else {
        Ok(Outcome::new(
            policy.absent,
            format!(
                "{dotted} does not resolve: {} has no {} '{last}'",
                current.name(),
                current.kind().member_noun()
            ),
        ))
    }
}

fn partition<'a>(s: &Structure, members: &'a [String]) -> (Vec<&'a str>, Vec<&'a str>) {
    members
        .iter()
        .map(String::as_str)
        .partition(|m| s.contains(m))
}

fn list(items: &[&str]) -> String {
    format!("[{}]", items.join(", "))
}

fn list_owned(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new()
            .with_fields("Detection", ["position", "velocity", "has_velocity"])
            .with_values("SensorType", ["SHORT_RANGE", "IMAGING_4D"])
            .with_fields("Frame", ["hdr", "stamp"])
            .with_ref("Frame", "hdr", "FrameHeader")
            .with_fields("FrameHeader", ["frame_seq", "blobs"])
    }

    fn eval(p: &Predicate) -> Result<Outcome, MissingReference> {
        p.evaluate(&kb(), &FailurePolicy::default())
    }

    #[test]
    fn has_member_pass_and_absent() {
        let ok = eval(&Predicate::has_member("Detection", "velocity")).unwrap();
        assert_eq!(ok.severity, Severity::Pass);
        assert_eq!(ok.detail, "Detection has field 'velocity'");

        let absent = eval(&Predicate::has_member("SensorType", "LONG_RANGE")).unwrap();
        assert_eq!(absent.severity, Severity::Missing);
        assert_eq!(absent.detail, "SensorType has no value 'LONG_RANGE'");
    }

    #[test]
    fn has_all_distinguishes_partial_from_absent() {
        let partial = eval(&Predicate::has_all("Detection", &["velocity", "rcs"])).unwrap();
        assert_eq!(partial.severity, Severity::Gap);
        assert_eq!(
            partial.detail,
            "missing from Detection: [rcs] (present: [velocity])"
        );

        let absent = eval(&Predicate::has_all("Detection", &["rcs", "snr"])).unwrap();
        assert_eq!(absent.severity, Severity::Missing);
    }

    #[test]
    fn has_any_passes_on_one_alternative() {
        let ok = eval(&Predicate::has_any("SensorType", &["MEDIUM_RANGE", "IMAGING_4D"])).unwrap();
        assert_eq!(ok.severity, Severity::Pass);
        assert_eq!(ok.detail, "present in SensorType: [IMAGING_4D]");

        let policy = FailurePolicy {
            absent: Severity::Gap,
            ..FailurePolicy::default()
        };
        let gap = Predicate::has_any("SensorType", &["SAR"])
            .evaluate(&kb(), &policy)
            .unwrap();
        assert_eq!(gap.severity, Severity::Gap);
    }

    #[test]
    fn companion_reports_conflict_when_claim_lacks_companion() {
        let conflict =
            eval(&Predicate::companion("Detection", "has_velocity", &["velocity", "velocity_cov"]))
                .unwrap();
        assert_eq!(conflict.severity, Severity::Mismatch);
        assert!(conflict.detail.contains("lacks companion(s) [velocity_cov]"));

        let absent = eval(&Predicate::companion("Detection", "has_rcs", &["rcs"])).unwrap();
        assert_eq!(absent.severity, Severity::Missing);
    }

    #[test]
    fn path_resolves_through_refs() {
        let ok = eval(&Predicate::path("Frame", &["hdr", "blobs"])).unwrap();
        assert_eq!(ok.severity, Severity::Pass);
        assert_eq!(ok.detail, "Frame.hdr.blobs resolves");

        let no_ref = eval(&Predicate::path("Frame", &["stamp", "sec"])).unwrap();
        assert_eq!(no_ref.severity, Severity::Missing);
        assert!(no_ref.detail.contains("Frame.stamp does not reference a structure"));
    }

    #[test]
    fn path_to_unknown_structure_is_missing_reference() {
        let kb = KnowledgeBase::new()
            .with_fields("Frame", ["hdr"])
            .with_ref("Frame", "hdr", "FrameHeader");
        let err = Predicate::path("Frame", &["hdr", "blobs"])
            .evaluate(&kb, &FailurePolicy::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "knowledge base has no structure 'FrameHeader' (referenced by Frame.hdr)"
        );
    }

    #[test]
    fn missing_structure_is_missing_reference() {
        let err = eval(&Predicate::has_member("RadarMeta", "n_tx")).unwrap_err();
        assert_eq!(
            err,
            MissingReference::Structure {
                structure: "RadarMeta".to_string()
            }
        );
    }

    #[test]
    fn policy_from_config_fills_defaults() {
        let policy = FailurePolicy::from_config(&PolicyConfig {
            absent: Some(Severity::Gap),
            ..PolicyConfig::default()
        });
        assert_eq!(policy.absent, Severity::Gap);
        assert_eq!(policy.partial, Severity::Gap);
        assert_eq!(policy.conflict, Severity::Mismatch);
        assert_eq!(policy.passing_case(), None);
    }

    #[test]
    fn config_round_trips_except_custom() {
        let p = Predicate::companion("Detection", "has_velocity", &["velocity"]);
        let cfg = p.to_config().expect("declarative predicate");
        assert_eq!(cfg.kind(), "companion");
        assert_eq!(Predicate::from_config(&cfg).kind(), "companion");

        let custom = Predicate::custom("always", |_| Ok(Outcome::pass("ok")));
        assert!(custom.to_config().is_none());
    }
}

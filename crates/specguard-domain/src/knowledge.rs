use std::collections::{BTreeMap, HashSet};

use specguard_types::{KnowledgeBaseFile, StructureKind};

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeBaseError {
    #[error("structure '{structure}' has a ref for '{field}', which is not one of its members")]
    DanglingRef { structure: String, field: String },

    #[error("structure '{structure}' is an enumeration and cannot carry field refs")]
    RefOnEnumeration { structure: String },
}

/// A structure lookup that found nothing in the knowledge base.
///
/// Evaluation turns this into a `MISSING` finding instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissingReference {
    #[error("knowledge base has no structure '{structure}'")]
    Structure { structure: String },

    #[error("knowledge base has no structure '{structure}' (referenced by {from}.{field})")]
    Referenced {
        structure: String,
        from: String,
        field: String,
    },
}

/// One named structure: a field list or an enumeration.
#[derive(Debug, Clone)]
pub struct Structure {
    name: String,
    kind: StructureKind,
    members: Vec<String>,
    index: HashSet<String>,
    refs: BTreeMap<String, String>,
}

impl Structure {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    /// Members in declaration order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, member: &str) -> bool {
        self.index.contains(member)
    }

    /// Name of the structure a field references, if any.
    pub fn reference(&self, field: &str) -> Option<&str> {
        self.refs.get(field).map(String::as_str)
    }
}

/// The reference structures one run is evaluated against. Never mutated by evaluation.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    label: Option<String>,
    structures: BTreeMap<String, Structure>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file: &KnowledgeBaseFile) -> Result<Self, KnowledgeBaseError> {
        let mut kb = KnowledgeBase {
            label: file.label.clone(),
            structures: BTreeMap::new(),
        };

        for (name, def) in &file.structure {
            if def.kind == StructureKind::Enumeration && !def.refs.is_empty() {
                return Err(KnowledgeBaseError::RefOnEnumeration {
                    structure: name.clone(),
                });
            }
            if let Some(field) = def.refs.keys().find(|f| !def.members.contains(f)) {
                return Err(KnowledgeBaseError::DanglingRef {
                    structure: name.clone(),
                    field: field.clone(),
                });
            }

            kb.insert(name, def.kind, def.members.iter().cloned());
            if let Some(s) = kb.structures.get_mut(name) {
                s.refs = def.refs.clone();
            }
        }

        Ok(kb)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_fields<I, S>(mut self, name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, StructureKind::Fields, fields);
        self
    }

    pub fn with_values<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, StructureKind::Enumeration, values);
        self
    }

    /// Marks `field` of structure `name` as referencing structure `target`.
    ///
    /// Ignored when `name` has not been inserted.
    pub fn with_ref(mut self, name: &str, field: &str, target: &str) -> Self {
        if let Some(s) = self.structures.get_mut(name) {
            s.refs.insert(field.to_string(), target.to_string());
        }
        self
    }

    /// Inserts or replaces a structure.
    pub fn insert<I, S>(&mut self, name: &str, kind: StructureKind, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        let index = members.iter().cloned().collect();
        self.structures.insert(
            name.to_string(),
            Structure {
                name: name.to_string(),
                kind,
                members,
                index,
                refs: BTreeMap::new(),
            },
        );
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Structure> {
        self.structures.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Structure, MissingReference> {
        self.get(name).ok_or_else(|| MissingReference::Structure {
            structure: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Structure names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.structures.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specguard_types::StructureDef;

    #[test]
    fn membership_is_exact_and_case_sensitive() {
        let kb = KnowledgeBase::new().with_fields("Detection", ["position", "velocity"]);
        let s = kb.require("Detection").expect("structure present");

        assert!(s.contains("velocity"));
        assert!(!s.contains("Velocity"));
        assert!(!s.contains("vel"));
        assert_eq!(s.kind(), StructureKind::Fields);
    }

    #[test]
    fn require_reports_missing_structure() {
        let kb = KnowledgeBase::new();
        let err = kb.require("SensorType").unwrap_err();
        assert_eq!(
            err.to_string(),
            "knowledge base has no structure 'SensorType'"
        );
    }

    #[test]
    fn from_file_keeps_refs_and_label() {
        let mut file = KnowledgeBaseFile {
            label: Some("Spec 1.5".to_string()),
            ..KnowledgeBaseFile::default()
        };
        file.structure.insert(
            "Frame".to_string(),
            StructureDef {
                kind: StructureKind::Fields,
                members: vec!["hdr".to_string()],
                refs: BTreeMap::from([("hdr".to_string(), "FrameHeader".to_string())]),
            },
        );

        let kb = KnowledgeBase::from_file(&file).expect("valid kb");
        assert_eq!(kb.label(), Some("Spec 1.5"));
        assert_eq!(
            kb.get("Frame").and_then(|s| s.reference("hdr")),
            Some("FrameHeader")
        );
    }

    #[test]
    fn from_file_rejects_ref_to_unknown_member() {
        let mut file = KnowledgeBaseFile::default();
        file.structure.insert(
            "Frame".to_string(),
            StructureDef {
                kind: StructureKind::Fields,
                members: vec!["stamp".to_string()],
                refs: BTreeMap::from([("hdr".to_string(), "FrameHeader".to_string())]),
            },
        );

        let err = KnowledgeBase::from_file(&file).unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::DanglingRef { ref field, .. } if field == "hdr"));
    }
}

//! Domain logic: knowledge base model, check predicates, catalog and evaluation.
//!
//! This crate is designed to be I/O-free and highly testable.

pub mod catalog;
pub mod evaluate;
pub mod knowledge;
pub mod predicate;

pub use catalog::{Catalog, CatalogBuilder, CatalogError, Check, compile_catalog};
pub use evaluate::{Checker, EvalMode, FindingStore, StoreError, evaluate};
pub use knowledge::{KnowledgeBase, KnowledgeBaseError, MissingReference, Structure};
pub use predicate::{CustomPredicate, FailurePolicy, Outcome, Predicate};

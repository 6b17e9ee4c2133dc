//! Ontology document model and the read-only views built over it.
//!
//! Documents are plain values: a set of axioms, the imports they declare and
//! the imported documents attached once resolved. Traversals such as the
//! hierarchy collector and the taxonomic decomposition never mutate a
//! document; reasoning sits behind the [`Reasoner`] trait so the structural
//! reasoner shipped here can be swapped for a complete one.

pub mod collector;
pub mod decomposition;
pub mod entities;
pub mod expressions;
pub mod reasoner;
pub mod repositories;
pub mod source;
pub mod value_objects;

pub use collector::{Direction, HierarchyCollector};
pub use decomposition::decompose;
pub use entities::{AnnotationValue, Axiom, OntologyDocument, OntologyError};
pub use expressions::{ClassExpression, RestrictionKind};
pub use reasoner::StructuralReasoner;
pub use repositories::{Classification, OntologySource, Reasoner, ReasonerError, SourceError};
pub use source::{DocumentFile, FileOntologySource, InMemoryOntologySource};
pub use value_objects::{Iri, IriError};

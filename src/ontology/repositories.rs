use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::entities::{Axiom, OntologyDocument};
use super::value_objects::Iri;

/// Contract for loading ontology documents by identity.
///
/// Implementations resolve an ontology IRI to a concrete document. They do not
/// follow imports; import resolution is performed by the caller so that
/// remapping and memoisation stay in one place.
#[async_trait]
pub trait OntologySource {
    /// Loads the document identified by `uri`.
    ///
    /// Implementors must return [`SourceError::Unresolvable`] when they have no
    /// location for the IRI, so callers can distinguish missing imports from
    /// broken documents.
    async fn load(&self, uri: &Iri) -> Result<OntologyDocument, SourceError>;
}

/// Errors produced while loading ontology documents.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No document location is known for the IRI.
    #[error("no document location known for `{uri}`")]
    Unresolvable { uri: Iri },
    /// Reading the document failed.
    #[error("failed to read ontology `{uri}` from `{path}`: {source}")]
    Io {
        uri: Iri,
        path: PathBuf,
        source: std::io::Error,
    },
    /// The document content could not be parsed.
    #[error("failed to parse ontology `{uri}`: {reason}")]
    Parse { uri: Iri, reason: String },
}

/// Result of classifying an ontology.
pub trait Classification: Send + Sync {
    /// Whether the axiom follows from the classified ontology.
    fn is_entailed(&self, axiom: &Axiom) -> Result<bool, ReasonerError>;

    /// Named classes that cannot have instances (`owl:Nothing` excluded).
    fn unsatisfiable_classes(&self) -> BTreeSet<Iri>;
}

/// Entailment capability the normalizers rely on.
///
/// The core treats implementations as black boxes: answers are trusted as
/// given and never retried.
pub trait Reasoner: Send + Sync {
    /// Classifies the document together with its import closure.
    fn classify(&self, ontology: &OntologyDocument) -> Result<Box<dyn Classification>, ReasonerError>;
}

impl<R: Reasoner + ?Sized> Reasoner for Arc<R> {
    fn classify(&self, ontology: &OntologyDocument) -> Result<Box<dyn Classification>, ReasonerError> {
        (**self).classify(ontology)
    }
}

/// Errors raised by reasoners.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReasonerError {
    /// The ontology has no model.
    #[error("ontology `{ontology}` is inconsistent: `{individual}` is an instance of an unsatisfiable class")]
    Inconsistent { ontology: Iri, individual: Iri },
    /// The reasoner cannot answer for this kind of axiom or ontology.
    #[error("reasoner unavailable: {0}")]
    Unavailable(String),
}

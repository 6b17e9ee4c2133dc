//! Structural normalisation of ontology documents.
//!
//! Every stage is a value transform: it reads a document and returns the
//! rewritten copy, so a failing stage leaves nothing half-applied. Stages are
//! composed into a [`NormalizerChain`] that the ontology cache runs once per
//! loaded document.

pub mod conjunction;
pub mod decomposition;
pub mod import_rewriting;
pub mod materialization;
pub mod naming;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ontology::{
    entities::{Axiom, OntologyDocument, OntologyError},
    repositories::{Reasoner, ReasonerError},
    value_objects::{Iri, IriError},
};

pub use conjunction::SuperClassConjunctionNormalizer;
pub use decomposition::TaxonomicDecompositionNormalizer;
pub use import_rewriting::{ImportMap, ImportRewritingNormalizer};
pub use materialization::SubsumptionMaterializationNormalizer;
pub use naming::{ClassExpressionNamingNormalizer, ClassNamer};

/// A single normalisation stage.
pub trait Normalizer: Send + Sync {
    /// Stable stage name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Normalises the parts of `ontology` that mention one of `classes`.
    fn normalize_classes(
        &self,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<OntologyDocument, NormalizationError>;

    /// Normalises the whole document, imported classes included.
    fn normalize(&self, ontology: &OntologyDocument) -> Result<OntologyDocument, NormalizationError> {
        self.normalize_classes(ontology, &ontology.classes_in_signature(true))
    }
}

/// Errors raised while normalising a document.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("normalizer `{stage}` failed: {source}")]
    Reasoner {
        stage: &'static str,
        #[source]
        source: ReasonerError,
    },
    #[error("rewritten IRI is invalid: {0}")]
    InvalidIri(#[from] IriError),
    #[error(transparent)]
    Ontology(#[from] OntologyError),
    #[error("normalization cancelled before `{stage}`")]
    Cancelled { stage: &'static str },
}

/// Stage identifiers accepted by the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    ImportRewriting,
    ClassExpressionNaming,
    TaxonomicDecomposition,
    SuperClassConjunction,
    SubsumptionMaterialization,
}

impl NormalizerKind {
    /// The full pipeline in its usual order.
    #[must_use]
    pub fn standard_chain() -> Vec<Self> {
        vec![
            Self::ImportRewriting,
            Self::ClassExpressionNaming,
            Self::TaxonomicDecomposition,
            Self::SuperClassConjunction,
            Self::SubsumptionMaterialization,
        ]
    }
}

/// Collaborators a stage may need when it is built from configuration.
#[derive(Clone)]
pub struct NormalizerDependencies {
    pub import_map: ImportMap,
    pub namer: ClassNamer,
    pub reasoner: Arc<dyn Reasoner>,
    pub test_marker: String,
}

/// Ordered list of stages applied one after another.
#[derive(Clone, Default)]
pub struct NormalizerChain {
    stages: Vec<Arc<dyn Normalizer>>,
}

impl std::fmt::Debug for NormalizerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

impl NormalizerChain {
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn Normalizer>>) -> Self {
        Self { stages }
    }

    /// Builds the stages named by `kinds`, in order.
    #[must_use]
    pub fn from_kinds(kinds: &[NormalizerKind], deps: &NormalizerDependencies) -> Self {
        let stages = kinds
            .iter()
            .map(|kind| -> Arc<dyn Normalizer> {
                match kind {
                    NormalizerKind::ImportRewriting => {
                        Arc::new(ImportRewritingNormalizer::new(deps.import_map.clone()))
                    }
                    NormalizerKind::ClassExpressionNaming => {
                        Arc::new(ClassExpressionNamingNormalizer::new(deps.namer.clone()))
                    }
                    NormalizerKind::TaxonomicDecomposition => {
                        Arc::new(TaxonomicDecompositionNormalizer::new(deps.namer.clone()))
                    }
                    NormalizerKind::SuperClassConjunction => {
                        Arc::new(SuperClassConjunctionNormalizer)
                    }
                    NormalizerKind::SubsumptionMaterialization => Arc::new(
                        SubsumptionMaterializationNormalizer::new(Arc::clone(&deps.reasoner))
                            .with_test_marker(deps.test_marker.clone()),
                    ),
                }
            })
            .collect();
        Self { stages }
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Normalizer>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs every stage over the whole document, checking `cancel` before
    /// each one.
    pub fn run(
        &self,
        ontology: OntologyDocument,
        cancel: &CancellationToken,
    ) -> Result<OntologyDocument, NormalizationError> {
        let mut current = ontology;
        for stage in &self.stages {
            if cancel.is_cancelled() {
                return Err(NormalizationError::Cancelled { stage: stage.name() });
            }
            let next = stage.normalize(&current)?;
            log_stage(stage.name(), &current, &next);
            current = next;
        }
        Ok(current)
    }
}

impl Normalizer for NormalizerChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn normalize_classes(
        &self,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<OntologyDocument, NormalizationError> {
        let mut current = ontology.clone();
        for stage in &self.stages {
            let next = stage.normalize_classes(&current, classes)?;
            log_stage(stage.name(), &current, &next);
            current = next;
        }
        Ok(current)
    }

    fn normalize(&self, ontology: &OntologyDocument) -> Result<OntologyDocument, NormalizationError> {
        self.run(ontology.clone(), &CancellationToken::new())
    }
}

fn log_stage(stage: &str, before: &OntologyDocument, after: &OntologyDocument) {
    let removed = before.axioms().difference(after.axioms()).count();
    let added = after.axioms().difference(before.axioms()).count();
    tracing::debug!(
        stage,
        ontology = %after.id(),
        added,
        removed,
        "normalizer_stage_applied"
    );
}

/// Whether `axiom` falls under a class-restricted normalisation.
pub(crate) fn in_scope(axiom: &Axiom, classes: &BTreeSet<Iri>) -> bool {
    let mentioned = axiom.classes();
    mentioned.is_empty() || mentioned.iter().any(|class| classes.contains(class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::{expressions::ClassExpression, reasoner::StructuralReasoner};

    fn iri(name: &str) -> Iri {
        Iri::new(format!("http://example.org/chain#{name}")).expect("valid iri")
    }

    fn deps() -> NormalizerDependencies {
        NormalizerDependencies {
            import_map: ImportMap::default(),
            namer: ClassNamer::default(),
            reasoner: Arc::new(StructuralReasoner),
            test_marker: "Test".to_owned(),
        }
    }

    #[test]
    fn builds_stages_in_configured_order() {
        let chain = NormalizerChain::from_kinds(&NormalizerKind::standard_chain(), &deps());
        assert_eq!(
            chain.stage_names(),
            vec![
                "import_rewriting",
                "class_expression_naming",
                "taxonomic_decomposition",
                "super_class_conjunction",
                "subsumption_materialization",
            ]
        );
    }

    #[test]
    fn cancelled_runs_stop_before_the_next_stage() {
        let chain = NormalizerChain::from_kinds(&NormalizerKind::standard_chain(), &deps());
        let token = CancellationToken::new();
        token.cancel();
        let err = chain
            .run(OntologyDocument::new(iri("onto")), &token)
            .expect_err("cancelled");
        assert_eq!(
            err,
            NormalizationError::Cancelled {
                stage: "import_rewriting"
            }
        );
    }

    #[test]
    fn full_chain_leaves_only_named_subsumptions() {
        let p = iri("hasPart");
        let ontology = OntologyDocument::new(iri("onto")).with_axioms([
            Axiom::sub_class_of(
                ClassExpression::some(
                    p.clone(),
                    ClassExpression::intersection([
                        ClassExpression::Class(iri("A")),
                        ClassExpression::Class(iri("B")),
                    ]),
                ),
                iri("Whole"),
            ),
            Axiom::sub_class_of(iri("Dog"), iri("Animal")),
            Axiom::sub_class_of(iri("Dog"), iri("Pet")),
        ]);
        let chain = NormalizerChain::from_kinds(&NormalizerKind::standard_chain(), &deps());
        let normalized = chain.normalize(&ontology).expect("normalized");

        for axiom in normalized.axioms() {
            if let Axiom::SubClassOf { sub, .. } = axiom {
                assert!(sub.is_named(), "compound subclass left in {axiom:?}");
            }
        }
        assert!(normalized.contains_axiom(&Axiom::sub_class_of(iri("Dog"), iri("Animal"))));
        assert!(normalized.contains_axiom(&Axiom::sub_class_of(iri("Dog"), iri("Pet"))));
    }
}

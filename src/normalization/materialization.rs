use std::collections::BTreeSet;
use std::sync::Arc;

use super::{NormalizationError, Normalizer};
use crate::ontology::{
    collector::HierarchyCollector,
    entities::{Axiom, OntologyDocument},
    repositories::{Classification, Reasoner},
    value_objects::Iri,
};

const STAGE: &str = "subsumption_materialization";

/// Asserts every entailed subsumption between named classes, then strips the
/// hierarchy back to its non-redundant edges.
///
/// Mutually entailed pairs become equivalences, so cycles among named classes
/// are collapsed. Cleanup removes subclass axioms that lie on a cycle, those
/// implied through other retained axioms, and those pointing at the test
/// marker class.
#[derive(Clone)]
pub struct SubsumptionMaterializationNormalizer {
    reasoner: Arc<dyn Reasoner>,
    test_marker: String,
}

impl SubsumptionMaterializationNormalizer {
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            reasoner,
            test_marker: "Test".to_owned(),
        }
    }

    /// Sets the fragment of the marker class whose subclass edges are dropped.
    #[must_use]
    pub fn with_test_marker(mut self, marker: impl Into<String>) -> Self {
        self.test_marker = marker.into();
        self
    }

    fn entailed(
        classification: &dyn Classification,
        sub: &Iri,
        sup: &Iri,
    ) -> Result<bool, NormalizationError> {
        classification
            .is_entailed(&Axiom::sub_class_of(sub.clone(), sup.clone()))
            .map_err(|source| NormalizationError::Reasoner { stage: STAGE, source })
    }

    fn materialize(
        &self,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<BTreeSet<Axiom>, NormalizationError> {
        let classification = self
            .reasoner
            .classify(ontology)
            .map_err(|source| NormalizationError::Reasoner { stage: STAGE, source })?;
        let targets = ontology.classes_in_signature(true);

        let mut additions = BTreeSet::new();
        for class in classes.iter().filter(|class| targets.contains(*class)) {
            for target in targets.iter().filter(|target| *target != class) {
                let down = Self::entailed(classification.as_ref(), class, target)?;
                let up = Self::entailed(classification.as_ref(), target, class)?;
                match (down, up) {
                    (true, true) => {
                        additions.insert(Axiom::equivalent_classes([class.clone(), target.clone()]));
                    }
                    (true, false) => {
                        additions.insert(Axiom::sub_class_of(class.clone(), target.clone()));
                    }
                    (false, true) => {
                        additions.insert(Axiom::sub_class_of(target.clone(), class.clone()));
                    }
                    (false, false) => {}
                }
            }
        }
        Ok(additions)
    }

    fn is_test_marker(&self, class: &Iri) -> bool {
        class
            .fragment()
            .is_some_and(|fragment| fragment.eq_ignore_ascii_case(&self.test_marker))
    }

    /// Subclass axioms to drop from a materialised document.
    fn redundant_axioms(&self, ontology: &OntologyDocument) -> BTreeSet<Axiom> {
        let collector = HierarchyCollector::new(ontology, true);
        let mut redundant: BTreeSet<Axiom> = ontology
            .axioms()
            .iter()
            .filter(|axiom| {
                axiom.as_named_sub_class_of().is_some_and(|(sub, sup)| {
                    self.is_test_marker(sup) || collector.super_classes(sup).contains(sub)
                })
            })
            .cloned()
            .collect();

        let acyclic = ontology.clone().with_changes(redundant.iter().cloned(), []);
        let collector = HierarchyCollector::new(&acyclic, true);
        redundant.extend(
            acyclic
                .axioms()
                .iter()
                .filter(|axiom| {
                    axiom.as_named_sub_class_of().is_some_and(|(sub, sup)| {
                        let mut supers = collector.super_classes(sub);
                        supers.remove(sup);
                        let mut subs = collector.sub_classes(sup);
                        subs.remove(sub);
                        !supers.is_disjoint(&subs)
                    })
                })
                .cloned(),
        );
        redundant
    }
}

impl Normalizer for SubsumptionMaterializationNormalizer {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn normalize_classes(
        &self,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<OntologyDocument, NormalizationError> {
        let additions = self.materialize(ontology, classes)?;
        let materialized = ontology.clone().with_changes([], additions);
        let removals = self.redundant_axioms(&materialized);
        tracing::debug!(
            ontology = %ontology.id(),
            removed = removals.len(),
            "hierarchy_cleanup"
        );
        Ok(materialized.with_changes(removals, []))
    }
}

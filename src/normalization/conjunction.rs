use std::collections::{BTreeMap, BTreeSet};

use super::{NormalizationError, Normalizer};
use crate::ontology::{
    entities::{Axiom, OntologyDocument},
    expressions::ClassExpression,
    value_objects::Iri,
};

/// Folds the asserted superclasses of a class into one intersection.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuperClassConjunctionNormalizer;

impl Normalizer for SuperClassConjunctionNormalizer {
    fn name(&self) -> &'static str {
        "super_class_conjunction"
    }

    fn normalize_classes(
        &self,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<OntologyDocument, NormalizationError> {
        let mut supers: BTreeMap<&Iri, Vec<&Axiom>> = BTreeMap::new();
        for axiom in ontology.axioms() {
            if let Axiom::SubClassOf {
                sub: ClassExpression::Class(sub),
                ..
            } = axiom
            {
                if classes.contains(sub) {
                    supers.entry(sub).or_default().push(axiom);
                }
            }
        }

        let mut removals = Vec::new();
        let mut additions = Vec::new();
        for (sub, axioms) in supers.into_iter().filter(|(_, axioms)| axioms.len() > 1) {
            let conjunction = ClassExpression::intersection(axioms.iter().filter_map(|axiom| {
                match axiom {
                    Axiom::SubClassOf { sup, .. } => Some(sup.clone()),
                    _ => None,
                }
            }));
            removals.extend(axioms.into_iter().cloned());
            additions.push(Axiom::sub_class_of(sub.clone(), conjunction));
        }

        Ok(ontology.clone().with_changes(removals, additions))
    }
}

use std::collections::BTreeSet;

use super::{in_scope, naming::NamingPass, ClassNamer, NormalizationError, Normalizer};
use crate::ontology::{
    decomposition::decompose,
    entities::{Axiom, OntologyDocument},
    expressions::ClassExpression,
    value_objects::Iri,
};

/// Names every taxonomically relevant sub-expression of defined classes and
/// parks each new name under `owl:Thing`, leaving the real placement to the
/// reasoner.
#[derive(Clone, Debug, Default)]
pub struct TaxonomicDecompositionNormalizer {
    namer: ClassNamer,
}

impl TaxonomicDecompositionNormalizer {
    #[must_use]
    pub fn new(namer: ClassNamer) -> Self {
        Self { namer }
    }
}

impl Normalizer for TaxonomicDecompositionNormalizer {
    fn name(&self) -> &'static str {
        "taxonomic_decomposition"
    }

    fn normalize_classes(
        &self,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<OntologyDocument, NormalizationError> {
        let mut pass = NamingPass::new(&self.namer, ontology);
        let thing = ClassExpression::Class(Iri::thing());

        for axiom in ontology.axioms() {
            let Axiom::EquivalentClasses(expressions) = axiom else {
                continue;
            };
            if !in_scope(axiom, classes) {
                continue;
            }
            for expression in expressions.iter().filter(|e| !e.is_named()) {
                for component in decompose(expression).iter().filter(|c| !c.is_named()) {
                    let name = pass.define(component)?;
                    pass.additions
                        .insert(Axiom::sub_class_of(name, thing.clone()));
                }
            }
        }

        Ok(pass.apply(ontology))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(name: &str) -> Iri {
        Iri::new(format!("http://example.org/decomposition#{name}")).expect("valid iri")
    }

    fn class(name: &str) -> ClassExpression {
        ClassExpression::Class(iri(name))
    }

    #[test]
    fn names_restriction_components() {
        let p = iri("p");
        let definition = ClassExpression::some(
            p.clone(),
            ClassExpression::intersection([class("A"), class("B")]),
        );
        let ontology = OntologyDocument::new(iri("onto"))
            .with_axioms([Axiom::equivalent_classes([class("C"), definition])]);
        let normalized = TaxonomicDecompositionNormalizer::default()
            .normalize(&ontology)
            .expect("normalized");

        let namer = ClassNamer::default();
        for component in [
            ClassExpression::some(p.clone(), class("A")),
            ClassExpression::some(p.clone(), class("B")),
        ] {
            let name = namer.name_for(&component).expect("name");
            assert!(normalized.contains_axiom(&Axiom::Declaration(name.clone())));
            assert!(normalized.contains_axiom(&Axiom::equivalent_classes([
                ClassExpression::Class(name.clone()),
                component,
            ])));
            assert!(normalized.contains_axiom(&Axiom::sub_class_of(name, Iri::thing())));
        }
        assert!(normalized.contains_axiom(&Axiom::sub_class_of(iri("C"), Iri::thing())));
    }

    #[test]
    fn leaves_named_equivalences_alone() {
        let ontology = OntologyDocument::new(iri("onto"))
            .with_axioms([Axiom::equivalent_classes([class("A"), class("B")])]);
        let normalized = TaxonomicDecompositionNormalizer::default()
            .normalize(&ontology)
            .expect("normalized");
        assert_eq!(normalized, ontology);
    }
}

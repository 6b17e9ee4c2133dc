use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use super::{in_scope, NormalizationError, Normalizer};
use crate::ontology::{
    entities::{Axiom, OntologyDocument},
    expressions::ClassExpression,
    value_objects::{Iri, IriError},
};

/// Namespace used for synthesised class names unless configured otherwise.
pub const DEFAULT_AUTOGEN_NAMESPACE: &str = "urn:ontoeval:autogen#Class-";

/// Deterministic name provider for compound class expressions.
///
/// The name is a v5 UUID of the expression's canonical rendering, so two
/// ontologies that contain the same expression agree on its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassNamer {
    namespace: String,
}

impl Default for ClassNamer {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_AUTOGEN_NAMESPACE.to_owned(),
        }
    }
}

impl ClassNamer {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn name_for(&self, expression: &ClassExpression) -> Result<Iri, IriError> {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, expression.to_string().as_bytes());
        Iri::new(format!("{}{}", self.namespace, id))
    }

    /// Whether `iri` was synthesised by a namer with this namespace.
    #[must_use]
    pub fn is_synthesised(&self, iri: &Iri) -> bool {
        iri.as_str().starts_with(&self.namespace)
    }
}

/// Scratch state of one naming run: known names plus the pending changes.
pub(crate) struct NamingPass<'a> {
    namer: &'a ClassNamer,
    known: BTreeMap<ClassExpression, Iri>,
    pub(crate) additions: BTreeSet<Axiom>,
    pub(crate) removals: BTreeSet<Axiom>,
}

impl<'a> NamingPass<'a> {
    /// Indexes every compound expression that an equivalence in the import
    /// closure already pairs with a named class.
    pub(crate) fn new(namer: &'a ClassNamer, ontology: &OntologyDocument) -> Self {
        let mut known = BTreeMap::new();
        for axiom in ontology.scoped_axioms(true) {
            let Axiom::EquivalentClasses(expressions) = axiom else {
                continue;
            };
            let Some(name) = expressions.iter().find_map(ClassExpression::as_class) else {
                continue;
            };
            for expression in expressions.iter().filter(|e| !e.is_named()) {
                known.entry(expression.clone()).or_insert_with(|| name.clone());
            }
        }
        Self {
            namer,
            known,
            additions: BTreeSet::new(),
            removals: BTreeSet::new(),
        }
    }

    /// Returns the name of `expression`, declaring a fresh one if needed.
    pub(crate) fn name(&mut self, expression: &ClassExpression) -> Result<Iri, NormalizationError> {
        if let Some(name) = expression.as_class() {
            return Ok(name.clone());
        }
        if let Some(name) = self.known.get(expression) {
            return Ok(name.clone());
        }
        let name = self.namer.name_for(expression)?;
        self.additions.insert(Axiom::Declaration(name.clone()));
        self.known.insert(expression.clone(), name.clone());
        Ok(name)
    }

    /// Names `expression` and records the defining equivalence.
    pub(crate) fn define(&mut self, expression: &ClassExpression) -> Result<Iri, NormalizationError> {
        let name = self.name(expression)?;
        if !expression.is_named() {
            self.additions.insert(Axiom::equivalent_classes([
                ClassExpression::Class(name.clone()),
                expression.clone(),
            ]));
        }
        Ok(name)
    }

    pub(crate) fn apply(self, ontology: &OntologyDocument) -> OntologyDocument {
        ontology.clone().with_changes(self.removals, self.additions)
    }
}

/// Replaces compound expressions in subclass, equivalence and class assertion
/// axioms with named classes defined by equivalence.
#[derive(Clone, Debug, Default)]
pub struct ClassExpressionNamingNormalizer {
    namer: ClassNamer,
}

impl ClassExpressionNamingNormalizer {
    #[must_use]
    pub fn new(namer: ClassNamer) -> Self {
        Self { namer }
    }

    fn name_sub_class_axioms(
        pass: &mut NamingPass<'_>,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<(), NormalizationError> {
        for axiom in ontology.axioms() {
            let Axiom::SubClassOf { sub, sup } = axiom else {
                continue;
            };
            if (sub.is_named() && sup.is_named()) || !in_scope(axiom, classes) {
                continue;
            }
            let sub = pass.define(sub)?;
            let sup = pass.define(sup)?;
            pass.removals.insert(axiom.clone());
            pass.additions.insert(Axiom::sub_class_of(sub, sup));
        }
        Ok(())
    }

    fn name_equivalences(
        pass: &mut NamingPass<'_>,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<(), NormalizationError> {
        for axiom in ontology.axioms() {
            let Axiom::EquivalentClasses(expressions) = axiom else {
                continue;
            };
            let named: Vec<&Iri> = expressions.iter().filter_map(ClassExpression::as_class).collect();
            if expressions.len() < 2
                || (expressions.len() == 2 && !named.is_empty())
                || !in_scope(axiom, classes)
            {
                continue;
            }

            let names: Vec<Iri> = if named.is_empty() {
                expressions
                    .iter()
                    .map(|expression| pass.define(expression))
                    .collect::<Result<_, _>>()?
            } else {
                for name in &named {
                    for expression in expressions.iter().filter(|e| !e.is_named()) {
                        pass.additions.insert(Axiom::equivalent_classes([
                            ClassExpression::Class((*name).clone()),
                            expression.clone(),
                        ]));
                    }
                }
                named.into_iter().cloned().collect()
            };
            for pair in names.windows(2) {
                pass.additions
                    .insert(Axiom::equivalent_classes([pair[0].clone(), pair[1].clone()]));
            }
            pass.removals.insert(axiom.clone());
        }
        Ok(())
    }

    fn name_class_assertions(
        pass: &mut NamingPass<'_>,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<(), NormalizationError> {
        for axiom in ontology.axioms() {
            let Axiom::ClassAssertion { class, individual } = axiom else {
                continue;
            };
            if class.is_named() || !in_scope(axiom, classes) {
                continue;
            }
            let name = pass.define(class)?;
            pass.removals.insert(axiom.clone());
            pass.additions.insert(Axiom::ClassAssertion {
                class: ClassExpression::Class(name),
                individual: individual.clone(),
            });
        }
        Ok(())
    }
}

impl Normalizer for ClassExpressionNamingNormalizer {
    fn name(&self) -> &'static str {
        "class_expression_naming"
    }

    fn normalize_classes(
        &self,
        ontology: &OntologyDocument,
        classes: &BTreeSet<Iri>,
    ) -> Result<OntologyDocument, NormalizationError> {
        let mut pass = NamingPass::new(&self.namer, ontology);
        Self::name_sub_class_axioms(&mut pass, ontology, classes)?;
        Self::name_equivalences(&mut pass, ontology, classes)?;
        Self::name_class_assertions(&mut pass, ontology, classes)?;
        Ok(pass.apply(ontology))
    }
}

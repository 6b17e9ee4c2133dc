use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::expressions::ClassExpression;
use super::value_objects::Iri;

/// Value carried by an annotation assertion.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationValue {
    Boolean(bool),
    Literal(String),
    Iri(Iri),
}

/// Logical statement held by an [`OntologyDocument`].
///
/// Axioms are immutable; rewriting one means removing it and adding its
/// replacement.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axiom {
    /// Class declaration.
    Declaration(Iri),
    SubClassOf {
        sub: ClassExpression,
        sup: ClassExpression,
    },
    EquivalentClasses(BTreeSet<ClassExpression>),
    ClassAssertion {
        class: ClassExpression,
        individual: Iri,
    },
    AnnotationAssertion {
        property: Iri,
        subject: Iri,
        value: AnnotationValue,
    },
}

impl Axiom {
    /// `sub ⊑ sup`.
    #[must_use]
    pub fn sub_class_of(sub: impl Into<ClassExpression>, sup: impl Into<ClassExpression>) -> Self {
        Self::SubClassOf {
            sub: sub.into(),
            sup: sup.into(),
        }
    }

    /// Equivalence between all supplied expressions.
    pub fn equivalent_classes<I, E>(expressions: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<ClassExpression>,
    {
        Self::EquivalentClasses(expressions.into_iter().map(Into::into).collect())
    }

    /// Named-class subsumption `sub ⊑ sup`, when this axiom is one.
    #[must_use]
    pub fn as_named_sub_class_of(&self) -> Option<(&Iri, &Iri)> {
        match self {
            Self::SubClassOf { sub, sup } => Some((sub.as_class()?, sup.as_class()?)),
            _ => None,
        }
    }

    /// Named classes mentioned by the axiom. Annotation subjects are not part
    /// of the class signature.
    #[must_use]
    pub fn classes(&self) -> BTreeSet<Iri> {
        let mut classes = BTreeSet::new();
        match self {
            Self::Declaration(iri) => {
                classes.insert(iri.clone());
            }
            Self::SubClassOf { sub, sup } => {
                sub.collect_classes(&mut classes);
                sup.collect_classes(&mut classes);
            }
            Self::EquivalentClasses(expressions) => {
                for expression in expressions {
                    expression.collect_classes(&mut classes);
                }
            }
            Self::ClassAssertion { class, .. } => class.collect_classes(&mut classes),
            Self::AnnotationAssertion { .. } => {}
        }
        classes
    }

    /// Every IRI the axiom mentions, annotation subjects and values included.
    #[must_use]
    pub fn iris(&self) -> BTreeSet<Iri> {
        let mut iris = BTreeSet::new();
        match self {
            Self::Declaration(iri) => {
                iris.insert(iri.clone());
            }
            Self::SubClassOf { sub, sup } => {
                sub.collect_iris(&mut iris);
                sup.collect_iris(&mut iris);
            }
            Self::EquivalentClasses(expressions) => {
                for expression in expressions {
                    expression.collect_iris(&mut iris);
                }
            }
            Self::ClassAssertion { class, individual } => {
                class.collect_iris(&mut iris);
                iris.insert(individual.clone());
            }
            Self::AnnotationAssertion {
                property,
                subject,
                value,
            } => {
                iris.insert(property.clone());
                iris.insert(subject.clone());
                if let AnnotationValue::Iri(value) = value {
                    iris.insert(value.clone());
                }
            }
        }
        iris
    }

    /// Rebuilds the axiom with every IRI passed through `f`.
    #[must_use]
    pub fn map_iris(&self, f: &mut impl FnMut(&Iri) -> Iri) -> Self {
        match self {
            Self::Declaration(iri) => Self::Declaration(f(iri)),
            Self::SubClassOf { sub, sup } => Self::SubClassOf {
                sub: sub.map_iris(f),
                sup: sup.map_iris(f),
            },
            Self::EquivalentClasses(expressions) => {
                Self::EquivalentClasses(expressions.iter().map(|e| e.map_iris(f)).collect())
            }
            Self::ClassAssertion { class, individual } => Self::ClassAssertion {
                class: class.map_iris(f),
                individual: f(individual),
            },
            Self::AnnotationAssertion {
                property,
                subject,
                value,
            } => Self::AnnotationAssertion {
                property: f(property),
                subject: f(subject),
                value: match value {
                    AnnotationValue::Iri(iri) => AnnotationValue::Iri(f(iri)),
                    other => other.clone(),
                },
            },
        }
    }
}

/// Errors raised when assembling an ontology document.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OntologyError {
    /// A document attempted to import itself.
    #[error("ontology `{0}` cannot import itself")]
    SelfImport(Iri),
}

/// Ontology document: identity, import declarations and axioms.
///
/// Resolved imports are attached as shared read-only documents; queries can be
/// scoped to the document alone or to its whole import closure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OntologyDocument {
    id: Iri,
    imports: BTreeSet<Iri>,
    axioms: BTreeSet<Axiom>,
    imported: BTreeMap<Iri, Arc<OntologyDocument>>,
}

impl OntologyDocument {
    /// Creates an empty document with the supplied identifier.
    #[must_use]
    pub fn new(id: Iri) -> Self {
        Self {
            id,
            imports: BTreeSet::new(),
            axioms: BTreeSet::new(),
            imported: BTreeMap::new(),
        }
    }

    /// Adds axioms while building a document.
    #[must_use]
    pub fn with_axioms(mut self, axioms: impl IntoIterator<Item = Axiom>) -> Self {
        self.axioms.extend(axioms);
        self
    }

    /// Adds an import declaration while building a document.
    #[must_use]
    pub fn with_import(mut self, import: Iri) -> Self {
        self.imports.insert(import);
        self
    }

    #[must_use]
    pub fn id(&self) -> &Iri {
        &self.id
    }

    /// Import declarations of this document.
    #[must_use]
    pub fn imports(&self) -> &BTreeSet<Iri> {
        &self.imports
    }

    /// Axioms owned by this document, excluding imports.
    #[must_use]
    pub fn axioms(&self) -> &BTreeSet<Axiom> {
        &self.axioms
    }

    #[must_use]
    pub fn contains_axiom(&self, axiom: &Axiom) -> bool {
        self.axioms.contains(axiom)
    }

    pub fn add_axiom(&mut self, axiom: Axiom) -> bool {
        self.axioms.insert(axiom)
    }

    pub fn remove_axiom(&mut self, axiom: &Axiom) -> bool {
        self.axioms.remove(axiom)
    }

    pub fn add_import(&mut self, import: Iri) -> Result<bool, OntologyError> {
        if import == self.id {
            return Err(OntologyError::SelfImport(import));
        }
        Ok(self.imports.insert(import))
    }

    pub fn remove_import(&mut self, import: &Iri) -> bool {
        self.imported.remove(import);
        self.imports.remove(import)
    }

    /// Attaches a resolved import under the IRI it was declared with.
    pub fn attach_import(&mut self, declared: Iri, document: Arc<OntologyDocument>) {
        self.imported.insert(declared, document);
    }

    /// Resolved imports, keyed by declared IRI.
    #[must_use]
    pub fn imported(&self) -> &BTreeMap<Iri, Arc<OntologyDocument>> {
        &self.imported
    }

    /// Applies a batch of removals then additions and returns the new document.
    #[must_use]
    pub fn with_changes(
        mut self,
        removals: impl IntoIterator<Item = Axiom>,
        additions: impl IntoIterator<Item = Axiom>,
    ) -> Self {
        for axiom in removals {
            self.axioms.remove(&axiom);
        }
        self.axioms.extend(additions);
        self
    }

    /// This document followed by every transitively imported document, each
    /// listed once.
    #[must_use]
    pub fn closure(&self) -> Vec<&OntologyDocument> {
        let mut seen = BTreeSet::from([self.id.clone()]);
        let mut ordered = vec![self];
        let mut cursor = 0;
        while cursor < ordered.len() {
            let current = ordered[cursor];
            cursor += 1;
            for document in current.imported.values() {
                if seen.insert(document.id.clone()) {
                    ordered.push(document.as_ref());
                }
            }
        }
        ordered
    }

    /// The documents a query should consult.
    #[must_use]
    pub fn scope(&self, include_imports: bool) -> Vec<&OntologyDocument> {
        if include_imports {
            self.closure()
        } else {
            vec![self]
        }
    }

    /// Iterates the axioms of every document in scope.
    pub fn scoped_axioms(&self, include_imports: bool) -> impl Iterator<Item = &Axiom> + '_ {
        self.scope(include_imports)
            .into_iter()
            .flat_map(|document| document.axioms.iter())
    }

    /// Named classes referenced by any axiom in scope.
    #[must_use]
    pub fn classes_in_signature(&self, include_imports: bool) -> BTreeSet<Iri> {
        self.scoped_axioms(include_imports)
            .flat_map(Axiom::classes)
            .collect()
    }

    #[must_use]
    pub fn contains_class(&self, class: &Iri, include_imports: bool) -> bool {
        self.scoped_axioms(include_imports)
            .any(|axiom| axiom.classes().contains(class))
    }

    /// Whether `class` carries the originally-defined marker in this document.
    #[must_use]
    pub fn is_originally_defined(&self, class: &Iri) -> bool {
        self.axioms.contains(&originally_defined_marker(class))
    }

    /// Classes tagged as originally defined by this document.
    #[must_use]
    pub fn originally_defined_classes(&self) -> BTreeSet<Iri> {
        let marker = Iri::originally_defined();
        self.axioms
            .iter()
            .filter_map(|axiom| match axiom {
                Axiom::AnnotationAssertion {
                    property,
                    subject,
                    value: AnnotationValue::Boolean(true),
                } if *property == marker => Some(subject.clone()),
                _ => None,
            })
            .collect()
    }

    /// Tags every class of this document's own signature as originally
    /// defined. Returns the number of new tags.
    pub fn mark_originally_defined(&mut self) -> usize {
        let markers: Vec<Axiom> = self
            .classes_in_signature(false)
            .iter()
            .map(originally_defined_marker)
            .collect();
        markers
            .into_iter()
            .filter(|marker| self.axioms.insert(marker.clone()))
            .count()
    }
}

fn originally_defined_marker(class: &Iri) -> Axiom {
    Axiom::AnnotationAssertion {
        property: Iri::originally_defined(),
        subject: class.clone(),
        value: AnnotationValue::Boolean(true),
    }
}

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{
    entities::{Axiom, OntologyDocument},
    expressions::ClassExpression,
    repositories::{Classification, Reasoner, ReasonerError},
    value_objects::Iri,
};

/// Reasoner over told subsumptions.
///
/// Builds a graph whose nodes are the class expressions of the import closure
/// and answers subsumption by reachability plus a handful of structural rules.
/// It is sound for the constructs it understands and deliberately incomplete
/// beyond them.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralReasoner;

impl StructuralReasoner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Reasoner for StructuralReasoner {
    fn classify(&self, ontology: &OntologyDocument) -> Result<Box<dyn Classification>, ReasonerError> {
        let taxonomy = ToldTaxonomy::build(ontology);
        for axiom in ontology.scoped_axioms(true) {
            if let Axiom::ClassAssertion { class, individual } = axiom {
                if taxonomy.is_unsatisfiable(class) {
                    return Err(ReasonerError::Inconsistent {
                        ontology: ontology.id().clone(),
                        individual: individual.clone(),
                    });
                }
            }
        }
        tracing::debug!(
            ontology = %ontology.id(),
            nodes = taxonomy.ancestors.len(),
            "ontology_classified"
        );
        Ok(Box::new(taxonomy))
    }
}

/// Reachability closure of the told subsumption graph.
#[derive(Debug, Default)]
struct ToldTaxonomy {
    ancestors: BTreeMap<ClassExpression, BTreeSet<ClassExpression>>,
    types: BTreeMap<Iri, BTreeSet<ClassExpression>>,
}

impl ToldTaxonomy {
    fn build(ontology: &OntologyDocument) -> Self {
        let mut edges: BTreeMap<ClassExpression, BTreeSet<ClassExpression>> = BTreeMap::new();
        let mut types: BTreeMap<Iri, BTreeSet<ClassExpression>> = BTreeMap::new();

        for axiom in ontology.scoped_axioms(true) {
            match axiom {
                Axiom::Declaration(class) => {
                    register(&mut edges, &ClassExpression::Class(class.clone()));
                }
                Axiom::SubClassOf { sub, sup } => {
                    register(&mut edges, sub);
                    register(&mut edges, sup);
                    edges.entry(sub.clone()).or_default().insert(sup.clone());
                }
                Axiom::EquivalentClasses(expressions) => {
                    for expression in expressions {
                        register(&mut edges, expression);
                        let others = expressions.iter().filter(|other| *other != expression);
                        edges
                            .entry(expression.clone())
                            .or_default()
                            .extend(others.cloned());
                    }
                }
                Axiom::ClassAssertion { class, individual } => {
                    register(&mut edges, class);
                    types
                        .entry(individual.clone())
                        .or_default()
                        .insert(class.clone());
                }
                Axiom::AnnotationAssertion { .. } => {}
            }
        }

        let ancestors = edges
            .keys()
            .map(|node| (node.clone(), reachable(&edges, node)))
            .collect();
        Self { ancestors, types }
    }

    fn reach(&self, expression: &ClassExpression) -> Option<&BTreeSet<ClassExpression>> {
        self.ancestors.get(expression)
    }

    fn is_unsatisfiable(&self, expression: &ClassExpression) -> bool {
        if expression.as_class().is_some_and(Iri::is_nothing) {
            return true;
        }
        let Some(reach) = self.reach(expression) else {
            return false;
        };
        reach.iter().any(|ancestor| {
            ancestor.as_class().is_some_and(Iri::is_nothing)
                || reach.contains(&ClassExpression::complement(ancestor.clone()))
                || *ancestor == ClassExpression::complement(expression.clone())
        })
    }

    fn subsumes(&self, sub: &ClassExpression, sup: &ClassExpression) -> bool {
        if sub == sup || sup.is_thing() || self.is_unsatisfiable(sub) {
            return true;
        }
        if self.reach(sub).is_some_and(|reach| reach.contains(sup)) {
            return true;
        }
        if let ClassExpression::Intersection(operands) = sup {
            if !operands.is_empty() && operands.iter().all(|op| self.subsumes(sub, op)) {
                return true;
            }
        }
        match sub {
            ClassExpression::Union(operands) if !operands.is_empty() => {
                operands.iter().all(|op| self.subsumes(op, sup))
            }
            ClassExpression::Intersection(operands) if self.reach(sub).is_none() => {
                operands.iter().any(|op| self.subsumes(op, sup))
            }
            _ => false,
        }
    }
}

impl Classification for ToldTaxonomy {
    fn is_entailed(&self, axiom: &Axiom) -> Result<bool, ReasonerError> {
        Ok(match axiom {
            Axiom::Declaration(_) | Axiom::AnnotationAssertion { .. } => true,
            Axiom::SubClassOf { sub, sup } => self.subsumes(sub, sup),
            Axiom::EquivalentClasses(expressions) => expressions.iter().all(|left| {
                expressions
                    .iter()
                    .all(|right| self.subsumes(left, right) && self.subsumes(right, left))
            }),
            Axiom::ClassAssertion { class, individual } => self
                .types
                .get(individual)
                .is_some_and(|types| types.iter().any(|asserted| self.subsumes(asserted, class))),
        })
    }

    fn unsatisfiable_classes(&self) -> BTreeSet<Iri> {
        self.ancestors
            .keys()
            .filter(|node| self.is_unsatisfiable(node))
            .filter_map(ClassExpression::as_class)
            .filter(|class| !class.is_nothing())
            .cloned()
            .collect()
    }
}

/// Adds `expression` and its structural sub-expressions as graph nodes, with
/// intersection → operand and operand → union edges.
fn register(
    edges: &mut BTreeMap<ClassExpression, BTreeSet<ClassExpression>>,
    expression: &ClassExpression,
) {
    if edges.contains_key(expression) {
        return;
    }
    edges.insert(expression.clone(), BTreeSet::new());
    match expression {
        ClassExpression::Intersection(operands) => {
            for operand in operands {
                register(edges, operand);
                edges
                    .entry(expression.clone())
                    .or_default()
                    .insert(operand.clone());
            }
        }
        ClassExpression::Union(operands) => {
            for operand in operands {
                register(edges, operand);
                edges
                    .entry(operand.clone())
                    .or_default()
                    .insert(expression.clone());
            }
        }
        ClassExpression::Complement(operand) => register(edges, operand),
        ClassExpression::Restriction { kind, .. } => {
            if let Some(filler) = kind.filler() {
                register(edges, filler);
            }
        }
        ClassExpression::Class(_) | ClassExpression::Enumeration(_) => {}
    }
}

fn reachable(
    edges: &BTreeMap<ClassExpression, BTreeSet<ClassExpression>>,
    start: &ClassExpression,
) -> BTreeSet<ClassExpression> {
    let mut visited = BTreeSet::new();
    let mut queue: VecDeque<&ClassExpression> = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let Some(targets) = edges.get(current) else {
            continue;
        };
        for target in targets {
            if visited.insert(target.clone()) {
                queue.push_back(target);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::value_objects::OWL_NOTHING;

    fn iri(name: &str) -> Iri {
        Iri::new(format!("http://example.org/reasoner#{name}")).expect("valid iri")
    }

    fn class(name: &str) -> ClassExpression {
        ClassExpression::Class(iri(name))
    }

    fn document(axioms: impl IntoIterator<Item = Axiom>) -> OntologyDocument {
        OntologyDocument::new(iri("onto")).with_axioms(axioms)
    }

    #[test]
    fn derives_subsumption_through_equivalent_complement() {
        let not_a = ClassExpression::complement(class("A"));
        let ontology = document([
            Axiom::equivalent_classes([class("B"), not_a.clone()]),
            Axiom::sub_class_of(class("C"), not_a),
        ]);
        let classification = StructuralReasoner.classify(&ontology).expect("classify");
        assert!(classification
            .is_entailed(&Axiom::sub_class_of(class("C"), class("B")))
            .expect("entailment"));
        assert!(!classification
            .is_entailed(&Axiom::sub_class_of(class("B"), class("C")))
            .expect("entailment"));
    }

    #[test]
    fn intersections_and_thing() {
        let ontology = document([
            Axiom::sub_class_of(class("Dog"), class("Animal")),
            Axiom::sub_class_of(class("Dog"), class("Pet")),
        ]);
        let classification = StructuralReasoner.classify(&ontology).expect("classify");
        let both = ClassExpression::intersection([class("Animal"), class("Pet")]);
        assert!(classification
            .is_entailed(&Axiom::sub_class_of(class("Dog"), both.clone()))
            .expect("entailment"));
        assert!(classification
            .is_entailed(&Axiom::sub_class_of(both, class("Pet")))
            .expect("entailment"));
        assert!(classification
            .is_entailed(&Axiom::sub_class_of(class("Dog"), Iri::thing()))
            .expect("entailment"));
    }

    #[test]
    fn detects_unsatisfiable_classes() {
        let ontology = document([
            Axiom::sub_class_of(class("A"), class("B")),
            Axiom::sub_class_of(class("A"), ClassExpression::complement(class("B"))),
            Axiom::sub_class_of(
                class("N"),
                ClassExpression::Class(Iri::new(OWL_NOTHING).expect("valid iri")),
            ),
        ]);
        let classification = StructuralReasoner.classify(&ontology).expect("classify");
        assert_eq!(
            classification.unsatisfiable_classes(),
            BTreeSet::from([iri("A"), iri("N")])
        );
    }

    #[test]
    fn instances_of_unsatisfiable_classes_are_inconsistent() {
        let ontology = document([
            Axiom::sub_class_of(class("A"), class("B")),
            Axiom::sub_class_of(class("A"), ClassExpression::complement(class("B"))),
            Axiom::ClassAssertion {
                class: class("A"),
                individual: iri("a1"),
            },
        ]);
        let err = StructuralReasoner
            .classify(&ontology)
            .err()
            .expect("inconsistent ontology");
        assert!(matches!(err, ReasonerError::Inconsistent { .. }));
    }
}

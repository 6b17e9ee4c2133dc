use std::collections::{BTreeMap, BTreeSet};

use super::{entities::OntologyDocument, value_objects::Iri};

/// Which way the collector walks the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Follow direct subclass edges.
    Down,
    /// Follow direct superclass edges.
    Up,
}

/// Transitive sub/superclass walker over named-class subsumption axioms.
///
/// Direct edges are indexed once per collector; compound sub or super
/// expressions are ignored. The start class is never part of a result.
#[derive(Clone, Debug, Default)]
pub struct HierarchyCollector {
    parents: BTreeMap<Iri, BTreeSet<Iri>>,
    children: BTreeMap<Iri, BTreeSet<Iri>>,
}

impl HierarchyCollector {
    /// Indexes the subclass axioms of `ontology`, optionally including its
    /// import closure.
    #[must_use]
    pub fn new(ontology: &OntologyDocument, include_imports: bool) -> Self {
        let mut collector = Self::default();
        for (sub, sup) in ontology
            .scoped_axioms(include_imports)
            .filter_map(|axiom| axiom.as_named_sub_class_of())
        {
            collector
                .parents
                .entry(sub.clone())
                .or_default()
                .insert(sup.clone());
            collector
                .children
                .entry(sup.clone())
                .or_default()
                .insert(sub.clone());
        }
        collector
    }

    /// Direct named subclasses or superclasses of `class`.
    #[must_use]
    pub fn direct(&self, class: &Iri, direction: Direction) -> Option<&BTreeSet<Iri>> {
        match direction {
            Direction::Down => self.children.get(class),
            Direction::Up => self.parents.get(class),
        }
    }

    /// All classes reachable from `start` by repeatedly following direct edges.
    #[must_use]
    pub fn collect(&self, start: &Iri, direction: Direction) -> BTreeSet<Iri> {
        let mut visited = BTreeSet::new();
        let mut frontier = BTreeSet::from([start.clone()]);

        while !frontier.is_empty() {
            let mut next = BTreeSet::new();
            for class in &frontier {
                let Some(neighbours) = self.direct(class, direction) else {
                    continue;
                };
                next.extend(
                    neighbours
                        .iter()
                        .filter(|candidate| *candidate != start && !visited.contains(*candidate))
                        .cloned(),
                );
            }
            visited.extend(next.iter().cloned());
            frontier = next;
        }

        visited
    }

    #[must_use]
    pub fn sub_classes(&self, class: &Iri) -> BTreeSet<Iri> {
        self.collect(class, Direction::Down)
    }

    #[must_use]
    pub fn super_classes(&self, class: &Iri) -> BTreeSet<Iri> {
        self.collect(class, Direction::Up)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ontology::entities::Axiom;

    fn iri(value: &str) -> Iri {
        Iri::new(value).expect("valid iri")
    }

    fn c(name: &str) -> Iri {
        iri(&format!("http://example.org/collector#{name}"))
    }

    fn chain() -> OntologyDocument {
        OntologyDocument::new(iri("http://example.org/collector")).with_axioms([
            Axiom::sub_class_of(c("C"), c("B")),
            Axiom::sub_class_of(c("B"), c("A")),
            Axiom::sub_class_of(c("E"), c("D")),
        ])
    }

    #[test]
    fn collects_transitive_sub_classes() {
        let collector = HierarchyCollector::new(&chain(), false);
        assert_eq!(collector.sub_classes(&c("A")), BTreeSet::from([c("B"), c("C")]));
        assert_eq!(collector.sub_classes(&c("D")), BTreeSet::from([c("E")]));
        assert!(collector.sub_classes(&c("C")).is_empty());
    }

    #[test]
    fn collects_transitive_super_classes() {
        let collector = HierarchyCollector::new(&chain(), false);
        assert_eq!(collector.super_classes(&c("C")), BTreeSet::from([c("A"), c("B")]));
    }

    #[test]
    fn terminates_on_cycles_without_returning_start() {
        let document = OntologyDocument::new(iri("http://example.org/collector")).with_axioms([
            Axiom::sub_class_of(c("A"), c("B")),
            Axiom::sub_class_of(c("B"), c("C")),
            Axiom::sub_class_of(c("C"), c("A")),
        ]);
        let collector = HierarchyCollector::new(&document, false);
        assert_eq!(collector.super_classes(&c("A")), BTreeSet::from([c("B"), c("C")]));
        assert_eq!(collector.sub_classes(&c("A")), BTreeSet::from([c("B"), c("C")]));
    }

    #[test]
    fn import_scope_controls_reachability() {
        let background = OntologyDocument::new(iri("http://example.org/bg"))
            .with_axioms([Axiom::sub_class_of(c("B"), c("Top"))]);
        let mut document = chain();
        document.attach_import(iri("http://example.org/bg"), Arc::new(background));

        let local = HierarchyCollector::new(&document, false);
        assert!(!local.super_classes(&c("C")).contains(&c("Top")));

        let closure = HierarchyCollector::new(&document, true);
        assert!(closure.super_classes(&c("C")).contains(&c("Top")));
    }
}

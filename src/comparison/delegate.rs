use super::ScopedOntology;
use crate::ontology::value_objects::Iri;

/// Class matching and weighting policy used by comparators.
pub trait ComparatorDelegate: Send + Sync {
    /// Finds the counterpart of `class` (from `reference`) in `search`.
    fn find_class(
        &self,
        class: &Iri,
        reference: &ScopedOntology<'_>,
        search: &ScopedOntology<'_>,
    ) -> Option<Iri>;

    /// Weight of `class` in the aggregated scores.
    fn class_weight(
        &self,
        _class: &Iri,
        _reference: &ScopedOntology<'_>,
        _search: &ScopedOntology<'_>,
    ) -> f64 {
        1.0
    }

    /// Whether two classes denote the same concept.
    fn classes_considered_equal(
        &self,
        a: &Iri,
        ontology_a: &ScopedOntology<'_>,
        b: &Iri,
        ontology_b: &ScopedOntology<'_>,
    ) -> bool;
}

/// Matches classes by IRI, falling back to equal fragments, all weighted 1.
///
/// Student ontologies often redeclare shared classes under their own
/// namespace while keeping the local name.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultComparatorDelegate;

impl ComparatorDelegate for DefaultComparatorDelegate {
    fn find_class(
        &self,
        class: &Iri,
        _reference: &ScopedOntology<'_>,
        search: &ScopedOntology<'_>,
    ) -> Option<Iri> {
        if search.contains(class) {
            return Some(class.clone());
        }
        class
            .fragment()
            .and_then(|fragment| search.class_with_fragment(fragment))
            .cloned()
    }

    fn classes_considered_equal(
        &self,
        a: &Iri,
        _ontology_a: &ScopedOntology<'_>,
        b: &Iri,
        _ontology_b: &ScopedOntology<'_>,
    ) -> bool {
        a == b || a.same_fragment(b)
    }
}

use std::{collections::BTreeSet, sync::Arc};

use super::{
    delegate::{ComparatorDelegate, DefaultComparatorDelegate},
    result::ComparisonResult,
    Comparator, ComparisonError, ComparisonMethod, OntologyPair, ScopedOntology,
};
use crate::ontology::value_objects::Iri;

/// Semantic cotopy (SC) and common semantic cotopy (CSC) comparison.
///
/// The cotopy of a class is the class together with all of its transitive
/// sub- and superclasses. Taxonomic precision of a class pair is the share of
/// A's cotopy that also occurs in B's. CSC first restricts each cotopy to
/// classes that have a counterpart in the other ontology.
#[derive(Clone)]
pub struct CotopyComparator {
    method: ComparisonMethod,
    include_imports: bool,
    delegate: Arc<dyn ComparatorDelegate>,
}

impl std::fmt::Debug for CotopyComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CotopyComparator")
            .field("method", &self.method)
            .field("include_imports", &self.include_imports)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    precision: f64,
    precision_weight: f64,
    recall: f64,
    recall_weight: f64,
}

impl Accumulator {
    /// Adds one class. A side whose weighted term is not finite is skipped.
    fn add(&mut self, weight: f64, precision: f64, recall: f64) {
        if !weight.is_finite() {
            return;
        }
        let term = weight * precision;
        if term.is_finite() {
            self.precision += term;
            self.precision_weight += weight;
        }
        let term = weight * recall;
        if term.is_finite() {
            self.recall += term;
            self.recall_weight += weight;
        }
    }

    fn is_empty(&self) -> bool {
        self.precision_weight == 0.0 && self.recall_weight == 0.0
    }

    fn scores(&self) -> (f64, f64) {
        let ratio = |sum: f64, weight: f64| if weight > 0.0 { sum / weight } else { 0.0 };
        (
            ratio(self.precision, self.precision_weight),
            ratio(self.recall, self.recall_weight),
        )
    }
}

impl CotopyComparator {
    #[must_use]
    pub fn new(method: ComparisonMethod, include_imports: bool) -> Self {
        Self {
            method,
            include_imports,
            delegate: Arc::new(DefaultComparatorDelegate),
        }
    }

    #[must_use]
    pub fn semantic_cotopy(include_imports: bool) -> Self {
        Self::new(ComparisonMethod::Sc, include_imports)
    }

    #[must_use]
    pub fn common_semantic_cotopy(include_imports: bool) -> Self {
        Self::new(ComparisonMethod::Csc, include_imports)
    }

    /// Replaces the class matching policy.
    #[must_use]
    pub fn with_delegate(mut self, delegate: Arc<dyn ComparatorDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    #[must_use]
    pub fn method(&self) -> ComparisonMethod {
        self.method
    }

    #[must_use]
    pub fn include_imports(&self) -> bool {
        self.include_imports
    }

    /// The cotopy of `class` in `own`, as used for this method.
    fn extract(&self, class: &Iri, own: &ScopedOntology<'_>, other: &ScopedOntology<'_>) -> BTreeSet<Iri> {
        let mut cotopy = own.super_classes(class);
        cotopy.extend(own.sub_classes(class));
        match self.method {
            ComparisonMethod::Sc => {
                cotopy.insert(class.clone());
                cotopy
            }
            ComparisonMethod::Csc => {
                cotopy.insert(class.clone());
                cotopy
                    .into_iter()
                    .filter(|candidate| self.delegate.find_class(candidate, own, other).is_some())
                    .collect()
            }
        }
    }

    fn common_count(
        &self,
        extract_a: &BTreeSet<Iri>,
        a: &ScopedOntology<'_>,
        extract_b: &BTreeSet<Iri>,
        b: &ScopedOntology<'_>,
    ) -> usize {
        extract_a
            .iter()
            .filter(|class_a| {
                extract_b
                    .iter()
                    .any(|class_b| self.delegate.classes_considered_equal(class_a, a, class_b, b))
            })
            .count()
    }

    /// Precision of a pair of present classes.
    fn pair_precision(
        &self,
        class_a: &Iri,
        class_b: &Iri,
        a: &ScopedOntology<'_>,
        b: &ScopedOntology<'_>,
    ) -> f64 {
        let extract_a = self.extract(class_a, a, b);
        if extract_a.is_empty() {
            return 0.0;
        }
        let extract_b = self.extract(class_b, b, a);
        self.common_count(&extract_a, a, &extract_b, b) as f64 / extract_a.len() as f64
    }

    /// Taxonomic precision of `class_a` in `a` against `class_b` in `b`.
    ///
    /// With one side missing, SC scores 0 while CSC takes the best precision
    /// any class of the present side's partner ontology without a counterpart
    /// would reach.
    fn taxonomic_precision(
        &self,
        class_a: Option<&Iri>,
        class_b: Option<&Iri>,
        a: &ScopedOntology<'_>,
        b: &ScopedOntology<'_>,
    ) -> f64 {
        match (class_a, class_b, self.method) {
            (Some(class_a), Some(class_b), _) => self.pair_precision(class_a, class_b, a, b),
            (None, None, _) | (_, _, ComparisonMethod::Sc) => 0.0,
            (None, Some(class_b), ComparisonMethod::Csc) => a
                .document()
                .classes_in_signature(false)
                .iter()
                .filter(|candidate| self.delegate.find_class(candidate, a, b).is_none())
                .map(|candidate| self.pair_precision(candidate, class_b, a, b))
                .fold(0.0, f64::max),
            (Some(class_a), None, ComparisonMethod::Csc) => b
                .document()
                .classes_in_signature(false)
                .iter()
                .filter(|candidate| self.delegate.find_class(candidate, b, a).is_none())
                .map(|candidate| self.pair_precision(class_a, candidate, a, b))
                .fold(0.0, f64::max),
        }
    }

    fn score(
        &self,
        pair: &OntologyPair,
        requested: Option<&BTreeSet<Iri>>,
    ) -> Result<ComparisonResult, ComparisonError> {
        let a = ScopedOntology::new(pair.ontology_a(), self.include_imports);
        let b = ScopedOntology::new(pair.ontology_b(), self.include_imports);

        let (classes_a, classes_b): (BTreeSet<Iri>, BTreeSet<Iri>) = match requested {
            None => (
                a.defined_classes(),
                b.defined_classes()
                    .into_iter()
                    .filter(|class| self.delegate.find_class(class, &b, &a).is_none())
                    .collect(),
            ),
            Some(requested) => {
                let found: BTreeSet<Iri> = a.signature().intersection(requested).cloned().collect();
                let missing = b
                    .signature()
                    .iter()
                    .filter(|class| requested.contains(*class) && !found.contains(*class))
                    .cloned()
                    .collect();
                (found, missing)
            }
        };

        let mut totals = Accumulator::default();
        for class_a in &classes_a {
            let class_b = self.delegate.find_class(class_a, &a, &b);
            totals.add(
                self.delegate.class_weight(class_a, &a, &b),
                self.taxonomic_precision(Some(class_a), class_b.as_ref(), &a, &b),
                self.taxonomic_precision(class_b.as_ref(), Some(class_a), &b, &a),
            );
        }
        for class_b in &classes_b {
            let class_a = self.delegate.find_class(class_b, &b, &a);
            totals.add(
                self.delegate.class_weight(class_b, &b, &a),
                self.taxonomic_precision(class_a.as_ref(), Some(class_b), &a, &b),
                self.taxonomic_precision(Some(class_b), class_a.as_ref(), &b, &a),
            );
        }

        if totals.is_empty() {
            return Err(ComparisonError::NothingToCompare {
                ontology_a: a.id().clone(),
                ontology_b: b.id().clone(),
            });
        }
        let (precision, recall) = totals.scores();
        tracing::debug!(
            method = self.method.as_str(),
            ontology_a = %a.id(),
            ontology_b = %b.id(),
            classes_a = classes_a.len(),
            classes_b = classes_b.len(),
            precision,
            recall,
            "pair_compared"
        );
        Ok(ComparisonResult::new(
            self.method_name(),
            a.id().clone(),
            b.id().clone(),
            precision,
            recall,
        ))
    }
}

impl Comparator for CotopyComparator {
    fn method_name(&self) -> &'static str {
        match self.method {
            ComparisonMethod::Sc => "Semantic Cotopy Comparison",
            ComparisonMethod::Csc => "Common Semantic Cotopy Comparison",
        }
    }

    fn compare(&self, pair: &OntologyPair) -> Result<ComparisonResult, ComparisonError> {
        self.score(pair, None)
    }

    fn compare_classes(
        &self,
        pair: &OntologyPair,
        classes: &BTreeSet<Iri>,
    ) -> Result<ComparisonResult, ComparisonError> {
        self.score(pair, Some(classes))
    }
}

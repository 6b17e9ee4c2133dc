//! Taxonomic comparison of ontology pairs.
//!
//! A [`Comparator`] scores how well the class hierarchy of ontology A matches
//! that of ontology B. Scores are taxonomic precision and recall averaged over
//! the compared classes; recall of `(A, B)` is computed as the precision of
//! `(B, A)`. Comparators only read the documents they are given, so a pair
//! may be compared from any number of threads at once.

pub mod cotopy;
pub mod delegate;
pub mod result;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

pub use cotopy::CotopyComparator;
pub use delegate::{ComparatorDelegate, DefaultComparatorDelegate};
pub use result::ComparisonResult;

use crate::{
    cache::{CacheError, OntologyCache},
    ontology::{collector::HierarchyCollector, entities::OntologyDocument, value_objects::Iri},
};

/// Errors raised while comparing a pair.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComparisonError {
    /// Neither ontology contributed a class to score.
    #[error("no classes to compare between `{ontology_a}` and `{ontology_b}`")]
    NothingToCompare { ontology_a: Iri, ontology_b: Iri },
}

/// Scores one ontology against another.
pub trait Comparator: Send + Sync {
    /// Human readable method name recorded on results.
    fn method_name(&self) -> &'static str;

    /// Compares every class of A that A defines itself (or every class in
    /// scope when imports are included).
    fn compare(&self, pair: &OntologyPair) -> Result<ComparisonResult, ComparisonError>;

    /// Compares only the requested classes.
    fn compare_classes(
        &self,
        pair: &OntologyPair,
        classes: &BTreeSet<Iri>,
    ) -> Result<ComparisonResult, ComparisonError>;
}

/// Available comparison methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMethod {
    /// Semantic cotopy.
    #[default]
    Sc,
    /// Common semantic cotopy.
    Csc,
}

impl ComparisonMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sc => "sc",
            Self::Csc => "csc",
        }
    }

    /// Builds the comparator for this method.
    #[must_use]
    pub fn comparator(self, include_imports: bool) -> CotopyComparator {
        CotopyComparator::new(self, include_imports)
    }
}

impl fmt::Display for ComparisonMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sc" => Ok(Self::Sc),
            "csc" => Ok(Self::Csc),
            other => Err(format!("unknown comparison method `{other}`, expected `sc` or `csc`")),
        }
    }
}

/// Two normalised ontologies, A being the one under evaluation.
#[derive(Clone, Debug)]
pub struct OntologyPair {
    a: Arc<OntologyDocument>,
    b: Arc<OntologyDocument>,
}

impl OntologyPair {
    #[must_use]
    pub fn new(a: Arc<OntologyDocument>, b: Arc<OntologyDocument>) -> Self {
        Self { a, b }
    }

    /// Fetches both documents from the cache, loading them concurrently.
    pub async fn load(cache: &OntologyCache, a: &Iri, b: &Iri) -> Result<Self, CacheError> {
        let (a, b) = tokio::try_join!(cache.get_ontology(a), cache.get_ontology(b))?;
        Ok(Self { a, b })
    }

    #[must_use]
    pub fn ontology_a(&self) -> &Arc<OntologyDocument> {
        &self.a
    }

    #[must_use]
    pub fn ontology_b(&self) -> &Arc<OntologyDocument> {
        &self.b
    }

    /// The same pair with its roles exchanged.
    #[must_use]
    pub fn swapped(&self) -> Self {
        Self {
            a: Arc::clone(&self.b),
            b: Arc::clone(&self.a),
        }
    }
}

/// Read-only view of a document within a fixed import scope, with the
/// signature and hierarchy indexed once per comparison.
#[derive(Debug)]
pub struct ScopedOntology<'a> {
    document: &'a OntologyDocument,
    include_imports: bool,
    signature: BTreeSet<Iri>,
    by_fragment: BTreeMap<String, Iri>,
    hierarchy: HierarchyCollector,
}

impl<'a> ScopedOntology<'a> {
    #[must_use]
    pub fn new(document: &'a OntologyDocument, include_imports: bool) -> Self {
        let signature = document.classes_in_signature(include_imports);
        let mut by_fragment = BTreeMap::new();
        for class in &signature {
            if let Some(fragment) = class.fragment() {
                by_fragment
                    .entry(fragment.to_owned())
                    .or_insert_with(|| class.clone());
            }
        }
        Self {
            document,
            include_imports,
            hierarchy: HierarchyCollector::new(document, include_imports),
            signature,
            by_fragment,
        }
    }

    #[must_use]
    pub fn document(&self) -> &'a OntologyDocument {
        self.document
    }

    #[must_use]
    pub fn id(&self) -> &Iri {
        self.document.id()
    }

    #[must_use]
    pub fn include_imports(&self) -> bool {
        self.include_imports
    }

    /// Named classes in scope.
    #[must_use]
    pub fn signature(&self) -> &BTreeSet<Iri> {
        &self.signature
    }

    #[must_use]
    pub fn contains(&self, class: &Iri) -> bool {
        self.signature.contains(class)
    }

    /// The smallest in-scope class carrying `fragment`.
    #[must_use]
    pub fn class_with_fragment(&self, fragment: &str) -> Option<&Iri> {
        self.by_fragment.get(fragment)
    }

    #[must_use]
    pub fn super_classes(&self, class: &Iri) -> BTreeSet<Iri> {
        self.hierarchy.super_classes(class)
    }

    #[must_use]
    pub fn sub_classes(&self, class: &Iri) -> BTreeSet<Iri> {
        self.hierarchy.sub_classes(class)
    }

    /// Classes this comparison scores when no explicit set is requested.
    #[must_use]
    pub fn defined_classes(&self) -> BTreeSet<Iri> {
        if self.include_imports {
            self.signature.clone()
        } else {
            self.document.originally_defined_classes()
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::ontology::entities::Axiom;

    fn iri(value: &str) -> Iri {
        Iri::new(value).expect("valid iri")
    }

    #[rstest]
    #[case("sc", ComparisonMethod::Sc)]
    #[case("CSC", ComparisonMethod::Csc)]
    fn parses_methods(#[case] input: &str, #[case] expected: ComparisonMethod) {
        assert_eq!(input.parse::<ComparisonMethod>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_methods() {
        assert!("cosine".parse::<ComparisonMethod>().is_err());
    }

    #[test]
    fn scoped_view_indexes_fragments_and_hierarchy() {
        let document = OntologyDocument::new(iri("http://x.org/o")).with_axioms([
            Axiom::sub_class_of(iri("http://x.org/o#Dog"), iri("http://x.org/o#Animal")),
            Axiom::sub_class_of(iri("http://y.org/o#Dog"), iri("http://x.org/o#Animal")),
        ]);
        let view = ScopedOntology::new(&document, false);

        assert_eq!(
            view.class_with_fragment("Dog"),
            Some(&iri("http://x.org/o#Dog"))
        );
        assert_eq!(view.sub_classes(&iri("http://x.org/o#Animal")).len(), 2);
        assert!(view.defined_classes().is_empty());
    }
}

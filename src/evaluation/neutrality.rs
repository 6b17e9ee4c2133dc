use std::{collections::BTreeSet, fmt, sync::Arc};

use serde::Serialize;

use crate::{
    cache::{DocumentLoader, MissingImports},
    errors::Result,
    normalization::{ImportRewritingNormalizer, Normalizer, NormalizerChain},
    ontology::{
        collector::HierarchyCollector, repositories::Reasoner, value_objects::Iri,
    },
};

/// Unsatisfiable classes of an ontology before and after its imports were
/// remapped onto the canonical background ontology.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NeutralityReport {
    ontology: Iri,
    before: BTreeSet<Iri>,
    after: BTreeSet<Iri>,
}

impl NeutralityReport {
    #[must_use]
    pub fn ontology(&self) -> &Iri {
        &self.ontology
    }

    #[must_use]
    pub fn before(&self) -> &BTreeSet<Iri> {
        &self.before
    }

    /// Unsatisfiable classes after remapping, without those that only became
    /// unsatisfiable as subclasses of a class that already was.
    #[must_use]
    pub fn after(&self) -> &BTreeSet<Iri> {
        &self.after
    }

    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.before.len() == self.after.len()
    }
}

impl fmt::Display for NeutralityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_neutral() {
            write!(f, "{}: OK", self.ontology)
        } else {
            write!(
                f,
                "{}: import change is not neutral to inconsistencies ({}/{})",
                self.ontology,
                self.before.len(),
                self.after.len()
            )
        }
    }
}

/// Checks that remapping the imports of `uri` does not change which classes
/// are unsatisfiable.
///
/// The first pass resolves imports as declared; the second resolves them
/// through `loader`'s import map, skipping missing ones, and rewrites the
/// document's own IRIs the same way.
pub async fn check_import_neutrality(
    loader: &DocumentLoader,
    reasoner: &dyn Reasoner,
    uri: &Iri,
) -> Result<NeutralityReport> {
    let declared = DocumentLoader::new(Arc::clone(loader.source()), NormalizerChain::default())
        .load_raw(uri)
        .await?;
    let before = reasoner.classify(&declared)?.unsatisfiable_classes();

    let remapped = DocumentLoader::new(Arc::clone(loader.source()), NormalizerChain::default())
        .with_import_map(loader.import_map().clone())
        .with_missing_imports(MissingImports::Silent)
        .load_raw(uri)
        .await?;
    let remapped = ImportRewritingNormalizer::new(loader.import_map().clone()).normalize(&remapped)?;
    let mut after = reasoner.classify(&remapped)?.unsatisfiable_classes();

    let hierarchy = HierarchyCollector::new(&remapped, true);
    for class in &before {
        for sub in hierarchy.sub_classes(class) {
            if !before.contains(&sub) {
                after.remove(&sub);
            }
        }
    }

    let report = NeutralityReport {
        ontology: uri.clone(),
        before,
        after,
    };
    if report.is_neutral() {
        tracing::info!(uri = %uri, "import_change_neutral");
    } else {
        tracing::warn!(
            uri = %uri,
            before = report.before.len(),
            after = report.after.len(),
            "import_change_not_neutral"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        normalization::ImportMap,
        ontology::{
            entities::{Axiom, OntologyDocument},
            expressions::ClassExpression,
            reasoner::StructuralReasoner,
            source::InMemoryOntologySource,
        },
    };

    const CANONICAL: &str = "http://bg.org/canonical";
    const VARIANT: &str = "http://bg.org/variant";

    fn iri(value: &str) -> Iri {
        Iri::new(value).expect("valid iri")
    }

    fn loader(documents: Vec<OntologyDocument>) -> DocumentLoader {
        DocumentLoader::new(
            Arc::new(InMemoryOntologySource::from_documents(documents)),
            NormalizerChain::default(),
        )
        .with_import_map(ImportMap::with_canonical(&iri(CANONICAL), [iri(VARIANT)]))
    }

    fn student() -> OntologyDocument {
        OntologyDocument::new(iri("http://x.org/student"))
            .with_import(iri(VARIANT))
            .with_axioms([
                Axiom::sub_class_of(iri("http://x.org/student#Heart"), iri(&format!("{VARIANT}#Organ"))),
                Axiom::sub_class_of(
                    iri("http://x.org/student#Heart"),
                    ClassExpression::complement(iri(&format!("{VARIANT}#Process")).into()),
                ),
            ])
    }

    #[tokio::test]
    async fn identical_backgrounds_are_neutral() {
        let background = |id: &str| {
            OntologyDocument::new(iri(id)).with_axioms([
                Axiom::sub_class_of(iri(&format!("{id}#Organ")), iri(&format!("{id}#Entity"))),
                Axiom::sub_class_of(iri(&format!("{id}#Process")), iri(&format!("{id}#Entity"))),
            ])
        };
        let loader = loader(vec![student(), background(CANONICAL), background(VARIANT)]);

        let report = check_import_neutrality(&loader, &StructuralReasoner, &iri("http://x.org/student"))
            .await
            .expect("checked");
        assert!(report.is_neutral());
        assert!(report.before().is_empty());
        assert!(report.to_string().ends_with(": OK"));
    }

    #[tokio::test]
    async fn detects_backgrounds_that_change_satisfiability() {
        let variant = OntologyDocument::new(iri(VARIANT))
            .with_axioms([Axiom::Declaration(iri(&format!("{VARIANT}#Organ")))]);
        let canonical = OntologyDocument::new(iri(CANONICAL)).with_axioms([Axiom::sub_class_of(
            iri(&format!("{CANONICAL}#Organ")),
            iri(&format!("{CANONICAL}#Process")),
        )]);
        let loader = loader(vec![student(), variant, canonical]);

        let report = check_import_neutrality(&loader, &StructuralReasoner, &iri("http://x.org/student"))
            .await
            .expect("checked");
        assert!(!report.is_neutral());
        assert!(report.after().contains(&iri("http://x.org/student#Heart")));
    }
}

use std::collections::{BTreeMap, BTreeSet};

use super::{NormalizationError, Normalizer};
use crate::ontology::{
    entities::{Axiom, OntologyDocument},
    value_objects::{Iri, IriError},
};

/// Maps variant IRI prefixes onto canonical ones.
///
/// Student ontologies import private copies of a shared background ontology;
/// remapping makes those copies compare as the canonical one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportMap {
    entries: BTreeMap<Iri, Iri>,
}

impl ImportMap {
    #[must_use]
    pub fn new(entries: BTreeMap<Iri, Iri>) -> Self {
        Self { entries }
    }

    /// Maps every ignored IRI onto `canonical`.
    pub fn with_canonical(canonical: &Iri, ignored: impl IntoIterator<Item = Iri>) -> Self {
        Self {
            entries: ignored
                .into_iter()
                .filter(|iri| iri != canonical)
                .map(|iri| (iri, canonical.clone()))
                .collect(),
        }
    }

    pub fn insert(&mut self, variant: Iri, canonical: Iri) {
        self.entries.insert(variant, canonical);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether `iri` names an import that is never fetched on its own.
    #[must_use]
    pub fn is_ignored(&self, iri: &Iri) -> bool {
        self.entries.contains_key(iri)
    }

    /// Rewrites `iri` through the longest matching prefix, following chained
    /// entries until no further entry applies. Returns `None` when no key
    /// matches or the IRI already lives under its target. A cycle of entries
    /// stops at the last IRI before it repeats.
    pub fn remap(&self, iri: &Iri) -> Result<Option<Iri>, IriError> {
        let mut visited = BTreeSet::from([iri.clone()]);
        let mut current = None;
        while let Some(next) = self.step(current.as_ref().unwrap_or(iri))? {
            if !visited.insert(next.clone()) {
                tracing::warn!(iri = %iri, cycle_at = %next, "import_map_cycle");
                break;
            }
            current = Some(next);
        }
        Ok(current)
    }

    fn step(&self, iri: &Iri) -> Result<Option<Iri>, IriError> {
        let text = iri.as_str();
        let Some((variant, canonical)) = self
            .entries
            .iter()
            .filter(|(variant, _)| text.starts_with(variant.as_str()))
            .max_by_key(|(variant, _)| variant.as_str().len())
        else {
            return Ok(None);
        };
        if text.starts_with(canonical.as_str()) {
            return Ok(None);
        }
        let suffix = &text[variant.as_str().len()..];
        Iri::new(format!("{canonical}{suffix}")).map(Some)
    }

    /// Like [`ImportMap::remap`] but returns the input when nothing matches.
    pub fn resolve(&self, iri: &Iri) -> Result<Iri, IriError> {
        Ok(self.remap(iri)?.unwrap_or_else(|| iri.clone()))
    }
}

/// Rewrites import declarations and every remapped IRI in the document's
/// axioms. Affected axioms are replaced, never edited.
#[derive(Clone, Debug, Default)]
pub struct ImportRewritingNormalizer {
    map: ImportMap,
}

impl ImportRewritingNormalizer {
    #[must_use]
    pub fn new(map: ImportMap) -> Self {
        Self { map }
    }

    fn rewrite(&self, axiom: &Axiom) -> Result<Option<Axiom>, NormalizationError> {
        let mut replacements = BTreeMap::new();
        for iri in axiom.iris() {
            if let Some(target) = self.map.remap(&iri)? {
                replacements.insert(iri, target);
            }
        }
        if replacements.is_empty() {
            return Ok(None);
        }
        Ok(Some(axiom.map_iris(&mut |iri: &Iri| {
            replacements.get(iri).cloned().unwrap_or_else(|| iri.clone())
        })))
    }
}

impl Normalizer for ImportRewritingNormalizer {
    fn name(&self) -> &'static str {
        "import_rewriting"
    }

    /// Import declarations belong to the document as a whole, so the class
    /// restriction does not narrow this stage.
    fn normalize_classes(
        &self,
        ontology: &OntologyDocument,
        _classes: &BTreeSet<Iri>,
    ) -> Result<OntologyDocument, NormalizationError> {
        if self.map.is_empty() {
            return Ok(ontology.clone());
        }

        let mut next = ontology.clone();
        for import in ontology.imports() {
            if let Some(target) = self.map.remap(import)? {
                next.remove_import(import);
                if target != *next.id() {
                    next.add_import(target)?;
                }
            }
        }

        let mut removals = Vec::new();
        let mut additions = Vec::new();
        for axiom in ontology.axioms() {
            if let Some(rewritten) = self.rewrite(axiom)? {
                removals.push(axiom.clone());
                additions.push(rewritten);
            }
        }
        tracing::debug!(
            ontology = %ontology.id(),
            rewritten = additions.len(),
            "import_iris_rewritten"
        );
        Ok(next.with_changes(removals, additions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::expressions::ClassExpression;

    const CANONICAL: &str = "http://purl.org/biotop/biotoplite.owl";
    const VARIANT: &str = "http://purl.org/biotop/biotoplite_group_A_TEST.owl";

    fn iri(value: &str) -> Iri {
        Iri::new(value).expect("valid iri")
    }

    fn map() -> ImportMap {
        ImportMap::with_canonical(&iri(CANONICAL), [iri(VARIANT)])
    }

    fn student() -> OntologyDocument {
        OntologyDocument::new(iri("http://example.org/student"))
            .with_import(iri(VARIANT))
            .with_axioms([
                Axiom::sub_class_of(
                    iri("http://example.org/student#Heart"),
                    iri(&format!("{VARIANT}#Organ")),
                ),
                Axiom::sub_class_of(
                    iri("http://example.org/student#Lung"),
                    iri("http://example.org/student#Heart"),
                ),
            ])
    }

    #[test]
    fn remaps_variant_prefixes() {
        let rewritten = ImportRewritingNormalizer::new(map())
            .normalize(&student())
            .expect("normalized");

        assert_eq!(rewritten.imports(), &BTreeSet::from([iri(CANONICAL)]));
        assert!(rewritten.contains_axiom(&Axiom::sub_class_of(
            iri("http://example.org/student#Heart"),
            iri(&format!("{CANONICAL}#Organ")),
        )));
        assert!(rewritten.contains_axiom(&Axiom::sub_class_of(
            ClassExpression::Class(iri("http://example.org/student#Lung")),
            ClassExpression::Class(iri("http://example.org/student#Heart")),
        )));
        assert_eq!(rewritten.axioms().len(), 2);
    }

    #[test]
    fn rewriting_is_idempotent() {
        let normalizer = ImportRewritingNormalizer::new(map());
        let once = normalizer.normalize(&student()).expect("first pass");
        let twice = normalizer.normalize(&once).expect("second pass");
        assert_eq!(once, twice);
    }

    #[test]
    fn chained_entries_resolve_in_one_pass() {
        let mut map = ImportMap::default();
        map.insert(iri("http://a.org/onto"), iri("http://b.org/onto"));
        map.insert(iri("http://b.org/onto"), iri("http://c.org/onto"));
        let normalizer = ImportRewritingNormalizer::new(map);
        let document = OntologyDocument::new(iri("http://example.org/student"))
            .with_import(iri("http://a.org/onto"))
            .with_axioms([Axiom::sub_class_of(
                iri("http://example.org/student#Heart"),
                iri("http://a.org/onto#Organ"),
            )]);

        let once = normalizer.normalize(&document).expect("first pass");
        let twice = normalizer.normalize(&once).expect("second pass");

        assert_eq!(once.imports(), &BTreeSet::from([iri("http://c.org/onto")]));
        assert!(once.contains_axiom(&Axiom::sub_class_of(
            iri("http://example.org/student#Heart"),
            iri("http://c.org/onto#Organ"),
        )));
        assert_eq!(once, twice);
    }

    #[test]
    fn cyclic_entries_terminate() {
        let mut map = ImportMap::default();
        map.insert(iri("http://a.org/onto"), iri("http://b.org/onto"));
        map.insert(iri("http://b.org/onto"), iri("http://a.org/onto"));

        assert_eq!(
            map.remap(&iri("http://a.org/onto#X")).expect("remap"),
            Some(iri("http://b.org/onto#X"))
        );
    }

    #[test]
    fn prefers_longest_prefix_and_skips_canonical_extensions() {
        let mut map = ImportMap::default();
        map.insert(iri("http://a.org/"), iri("http://a.org/canonical/"));
        map.insert(iri("http://a.org/legacy/"), iri("http://b.org/"));

        assert_eq!(
            map.remap(&iri("http://a.org/legacy/X")).expect("remap"),
            Some(iri("http://b.org/X"))
        );
        assert_eq!(
            map.remap(&iri("http://a.org/Y")).expect("remap"),
            Some(iri("http://a.org/canonical/Y"))
        );
        assert_eq!(map.remap(&iri("http://a.org/canonical/Y")).expect("remap"), None);
        assert_eq!(map.remap(&iri("http://c.org/Z")).expect("remap"), None);
    }

    #[test]
    fn empty_map_is_a_no_op() {
        let document = student();
        let rewritten = ImportRewritingNormalizer::default()
            .normalize(&document)
            .expect("normalized");
        assert_eq!(rewritten, document);
    }
}

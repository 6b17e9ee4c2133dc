use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{
    entities::{Axiom, OntologyDocument},
    repositories::{OntologySource, SourceError},
    value_objects::Iri,
};

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// On-disk representation of an ontology document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentFile {
    pub iri: Option<Iri>,
    #[serde(default)]
    pub imports: Vec<Iri>,
    /// Shorthand for class declarations.
    #[serde(default)]
    pub classes: Vec<Iri>,
    #[serde(default)]
    pub axioms: Vec<Axiom>,
}

impl DocumentFile {
    /// Builds the document, defaulting its identifier to `uri`.
    pub fn into_document(self, uri: &Iri) -> OntologyDocument {
        let id = self.iri.unwrap_or_else(|| uri.clone());
        let mut document = OntologyDocument::new(id)
            .with_axioms(self.classes.into_iter().map(Axiom::Declaration))
            .with_axioms(self.axioms);
        for import in self.imports {
            if import != *document.id() {
                document = document.with_import(import);
            }
        }
        document
    }
}

impl From<&OntologyDocument> for DocumentFile {
    fn from(document: &OntologyDocument) -> Self {
        Self {
            iri: Some(document.id().clone()),
            imports: document.imports().iter().cloned().collect(),
            classes: Vec::new(),
            axioms: document.axioms().iter().cloned().collect(),
        }
    }
}

/// Reads YAML that spells enum variants as single-key maps
/// (`sub_class_of: {sub: ..., sup: ...}`) rather than `!tags`.
pub fn from_yaml<T: DeserializeOwned>(content: &str) -> Result<T, serde_yaml::Error> {
    serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(content))
}

/// Parses YAML or JSON document text. JSON is chosen by `.json` extension.
pub fn parse_document(uri: &Iri, path: &Path, content: &str) -> Result<OntologyDocument, SourceError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let file: DocumentFile = if is_json {
        serde_json::from_str(content).map_err(|err| SourceError::Parse {
            uri: uri.clone(),
            reason: err.to_string(),
        })?
    } else {
        from_yaml(content).map_err(|err| SourceError::Parse {
            uri: uri.clone(),
            reason: err.to_string(),
        })?
    };
    Ok(file.into_document(uri))
}

/// Loads documents from the file system.
///
/// An IRI is located through an explicit mapping first, then as a `file:` IRI,
/// and finally as `<root>/<local name>` with one of the supported extensions.
#[derive(Clone, Debug, Default)]
pub struct FileOntologySource {
    root: PathBuf,
    mappings: BTreeMap<Iri, PathBuf>,
}

impl FileOntologySource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mappings: BTreeMap::new(),
        }
    }

    /// Maps an IRI onto a concrete path. Relative paths resolve against the root.
    #[must_use]
    pub fn with_mapping(mut self, iri: Iri, path: impl Into<PathBuf>) -> Self {
        self.mappings.insert(iri, path.into());
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path a given IRI would be read from.
    #[must_use]
    pub fn locate(&self, uri: &Iri) -> Option<PathBuf> {
        if let Some(path) = self.mappings.get(uri) {
            return Some(self.root.join(path));
        }
        if let Some(path) = uri.as_str().strip_prefix("file://") {
            return Some(PathBuf::from(path));
        }
        let name = uri.fragment()?;
        let direct = self.root.join(name);
        if direct.is_file() {
            return Some(direct);
        }
        EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl OntologySource for FileOntologySource {
    async fn load(&self, uri: &Iri) -> Result<OntologyDocument, SourceError> {
        let Some(path) = self.locate(uri) else {
            return Err(SourceError::Unresolvable { uri: uri.clone() });
        };
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::Unresolvable { uri: uri.clone() });
            }
            Err(source) => {
                return Err(SourceError::Io {
                    uri: uri.clone(),
                    path,
                    source,
                })
            }
        };
        tracing::debug!(uri = %uri, path = %path.display(), "ontology_document_read");
        parse_document(uri, &path, &content)
    }
}

/// Keeps documents in memory. Every load hands out a fresh copy.
#[derive(Debug, Default)]
pub struct InMemoryOntologySource {
    documents: Mutex<BTreeMap<Iri, OntologyDocument>>,
    loads: AtomicUsize,
}

impl InMemoryOntologySource {
    /// Builds a source from an initial set of documents, keyed by their ids.
    pub fn from_documents(documents: impl IntoIterator<Item = OntologyDocument>) -> Self {
        let source = Self::default();
        for document in documents {
            source.insert(document);
        }
        source
    }

    /// Stores or replaces a document under its own identifier.
    pub fn insert(&self, document: OntologyDocument) {
        self.guard().insert(document.id().clone(), document);
    }

    /// Number of `load` calls served so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, BTreeMap<Iri, OntologyDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl OntologySource for InMemoryOntologySource {
    async fn load(&self, uri: &Iri) -> Result<OntologyDocument, SourceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.guard()
            .get(uri)
            .cloned()
            .ok_or_else(|| SourceError::Unresolvable { uri: uri.clone() })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;
    use crate::ontology::expressions::{ClassExpression, RestrictionKind};

    fn iri(value: &str) -> Iri {
        Iri::new(value).expect("valid iri")
    }

    fn scratch_dir(label: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("ontoeval-{label}-{unique}"));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    const ZOO: &str = r"
iri: http://example.org/zoo
imports:
  - http://example.org/background
classes:
  - http://example.org/zoo#Animal
axioms:
  - sub_class_of:
      sub:
        class: http://example.org/zoo#Dog
      sup:
        class: http://example.org/zoo#Animal
";

    #[tokio::test]
    async fn loads_yaml_document_by_local_name() {
        let dir = scratch_dir("yaml");
        fs::write(dir.join("zoo.yaml"), ZOO).expect("write document");
        let source = FileOntologySource::new(&dir);

        let document = source
            .load(&iri("http://example.org/zoo"))
            .await
            .expect("document");
        assert_eq!(document.id(), &iri("http://example.org/zoo"));
        assert_eq!(document.imports().len(), 1);
        assert!(document.contains_axiom(&Axiom::Declaration(iri("http://example.org/zoo#Animal"))));
        assert!(document.contains_axiom(&Axiom::sub_class_of(
            ClassExpression::Class(iri("http://example.org/zoo#Dog")),
            ClassExpression::Class(iri("http://example.org/zoo#Animal")),
        )));
    }

    #[test]
    fn parses_nested_expressions_in_yaml_axioms() {
        let content = r"
classes: [http://example.org/body#Heart]
axioms:
  - equivalent_classes:
      - class: http://example.org/body#Heart
      - intersection:
          - class: http://example.org/body#Organ
          - restriction:
              property: http://example.org/body#hasPart
              kind:
                min:
                  - 2
                  - class: http://example.org/body#Chamber
  - sub_class_of:
      sub:
        class: http://example.org/body#Organ
      sup:
        restriction:
          property: http://example.org/body#partOf
          kind: has_self
";
        let uri = iri("http://example.org/body");
        let document =
            parse_document(&uri, Path::new("body.yaml"), content).expect("nested yaml parses");

        let body = |name: &str| iri(&format!("http://example.org/body#{name}"));
        assert_eq!(document.id(), &uri);
        assert!(document.contains_axiom(&Axiom::equivalent_classes([
            ClassExpression::class(body("Heart")),
            ClassExpression::intersection([
                ClassExpression::class(body("Organ")),
                ClassExpression::Restriction {
                    property: body("hasPart"),
                    kind: RestrictionKind::Min(2, Box::new(ClassExpression::class(body("Chamber")))),
                },
            ]),
        ])));
        assert!(document.contains_axiom(&Axiom::sub_class_of(
            body("Organ"),
            ClassExpression::Restriction {
                property: body("partOf"),
                kind: RestrictionKind::HasSelf,
            },
        )));
    }

    #[tokio::test]
    async fn mapped_json_document_round_trips() {
        let dir = scratch_dir("json");
        let original = OntologyDocument::new(iri("http://example.org/json")).with_axioms([
            Axiom::Declaration(iri("http://example.org/json#A")),
        ]);
        let content = serde_json::to_string(&DocumentFile::from(&original)).expect("serialize");
        fs::write(dir.join("stored.json"), content).expect("write document");
        let source = FileOntologySource::new(&dir)
            .with_mapping(iri("http://example.org/json"), "stored.json");

        let loaded = source
            .load(&iri("http://example.org/json"))
            .await
            .expect("document");
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn unknown_documents_are_unresolvable() {
        let source = FileOntologySource::new(scratch_dir("missing"));
        let err = source
            .load(&iri("http://example.org/nowhere"))
            .await
            .expect_err("missing");
        assert!(matches!(err, SourceError::Unresolvable { .. }));
    }

    #[tokio::test]
    async fn malformed_documents_fail_to_parse() {
        let dir = scratch_dir("broken");
        fs::write(dir.join("broken.yaml"), "axioms: [ {unknown: 1} ]").expect("write");
        let source = FileOntologySource::new(&dir);
        let err = source
            .load(&iri("http://example.org/broken"))
            .await
            .expect_err("parse failure");
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[tokio::test]
    async fn in_memory_source_counts_loads() {
        let source = InMemoryOntologySource::from_documents([OntologyDocument::new(iri(
            "http://example.org/a",
        ))]);
        source.load(&iri("http://example.org/a")).await.expect("load");
        assert!(source.load(&iri("http://example.org/b")).await.is_err());
        assert_eq!(source.load_count(), 2);
    }
}

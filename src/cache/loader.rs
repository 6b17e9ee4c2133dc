use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::CacheError;
use crate::{
    normalization::{ImportMap, NormalizationError, NormalizerChain},
    ontology::{
        entities::OntologyDocument,
        repositories::{OntologySource, SourceError},
        value_objects::Iri,
    },
};

/// Type alias simplifying source trait object usage.
pub type SourceHandle = dyn OntologySource + Send + Sync + 'static;

/// What to do with an import whose document cannot be located.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingImports {
    /// Fail the importing document.
    #[default]
    Fail,
    /// Log a warning and continue without the import.
    Silent,
}

/// Loads a document, resolves its imports and runs the normalizer chain.
pub struct DocumentLoader {
    source: Arc<SourceHandle>,
    pipeline: Arc<NormalizerChain>,
    import_map: ImportMap,
    missing_imports: MissingImports,
    imported: moka::future::Cache<Iri, Arc<OntologyDocument>>,
}

impl DocumentLoader {
    /// Default number of imported documents kept in memory.
    pub const DEFAULT_IMPORT_CAPACITY: u64 = 64;

    #[must_use]
    pub fn new(source: Arc<SourceHandle>, pipeline: NormalizerChain) -> Self {
        Self {
            source,
            pipeline: Arc::new(pipeline),
            import_map: ImportMap::default(),
            missing_imports: MissingImports::default(),
            imported: moka::future::Cache::new(Self::DEFAULT_IMPORT_CAPACITY),
        }
    }

    /// Remaps import IRIs before resolving them.
    #[must_use]
    pub fn with_import_map(mut self, import_map: ImportMap) -> Self {
        self.import_map = import_map;
        self
    }

    #[must_use]
    pub fn with_missing_imports(mut self, policy: MissingImports) -> Self {
        self.missing_imports = policy;
        self
    }

    /// Bounds the number of imported documents kept for reuse.
    #[must_use]
    pub fn with_import_capacity(mut self, capacity: u64) -> Self {
        self.imported = moka::future::Cache::new(capacity);
        self
    }

    #[must_use]
    pub fn source(&self) -> &Arc<SourceHandle> {
        &self.source
    }

    #[must_use]
    pub fn import_map(&self) -> &ImportMap {
        &self.import_map
    }

    /// Loads `uri` with its imports attached and the originally-defined
    /// markers in place, without normalising it.
    pub async fn load_raw(&self, uri: &Iri) -> Result<OntologyDocument, CacheError> {
        let mut document = self
            .source
            .load(uri)
            .await
            .map_err(|source| CacheError::load(uri, source))?;
        let tagged = document.mark_originally_defined();
        tracing::debug!(uri = %uri, tagged, "ontology_classes_tagged");
        self.attach_imports(uri, &mut document, vec![uri.clone()])
            .await?;
        Ok(document)
    }

    /// Loads `uri` and runs the normalizer chain on a blocking thread.
    pub async fn load(
        &self,
        uri: &Iri,
        cancel: CancellationToken,
    ) -> Result<Arc<OntologyDocument>, CacheError> {
        let document = self.load_raw(uri).await?;
        let pipeline = Arc::clone(&self.pipeline);
        let normalized = tokio::task::spawn_blocking(move || pipeline.run(document, &cancel))
            .await
            .map_err(|err| CacheError::Panicked {
                uri: uri.clone(),
                reason: err.to_string(),
            })?
            .map_err(|source| CacheError::Normalization {
                uri: uri.clone(),
                source,
            })?;
        Ok(Arc::new(normalized))
    }

    async fn attach_imports(
        &self,
        root: &Iri,
        document: &mut OntologyDocument,
        chain: Vec<Iri>,
    ) -> Result<(), CacheError> {
        let declared: Vec<Iri> = document.imports().iter().cloned().collect();
        for import in declared {
            let target = self
                .import_map
                .resolve(&import)
                .map_err(|err| CacheError::Normalization {
                    uri: root.clone(),
                    source: NormalizationError::InvalidIri(err),
                })?;
            if chain.contains(&target) || document.imported().contains_key(&target) {
                continue;
            }
            if let Some(resolved) = self.resolve_import(root, target.clone(), chain.clone()).await? {
                document.attach_import(target, resolved);
            }
        }
        Ok(())
    }

    fn resolve_import<'a>(
        &'a self,
        root: &'a Iri,
        import: Iri,
        mut chain: Vec<Iri>,
    ) -> BoxFuture<'a, Result<Option<Arc<OntologyDocument>>, CacheError>> {
        Box::pin(async move {
            if let Some(document) = self.imported.get(&import).await {
                return Ok(Some(document));
            }
            let mut document = match self.source.load(&import).await {
                Ok(document) => document,
                Err(SourceError::Unresolvable { .. })
                    if self.missing_imports == MissingImports::Silent =>
                {
                    tracing::warn!(uri = %root, import = %import, "ontology_import_missing");
                    return Ok(None);
                }
                Err(source) => return Err(CacheError::import(root, &import, source)),
            };
            chain.push(import.clone());
            self.attach_imports(root, &mut document, chain).await?;
            let document = Arc::new(document);
            self.imported.insert(import.clone(), Arc::clone(&document)).await;
            tracing::debug!(uri = %root, import = %import, "ontology_import_resolved");
            Ok(Some(document))
        })
    }
}

//! Builds the evaluation context from configuration.
//!
//! The context owns the ontology cache and the comparator; it is created
//! once at start-up, passed by reference to whatever needs it and torn down
//! explicitly at the end.

use std::sync::Arc;

use crate::{
    cache::{DocumentLoader, OntologyCache, SourceHandle},
    comparison::Comparator,
    config::Config,
    errors::{Error, Result},
    normalization::{ClassNamer, NormalizerChain, NormalizerDependencies},
    ontology::{reasoner::StructuralReasoner, repositories::Reasoner},
};

/// Shared state of an evaluation run.
#[derive(Clone)]
pub struct EvalContext {
    /// Configuration the context was built from.
    pub config: Config,
    /// Loads and normalises ontologies once per IRI.
    pub cache: Arc<OntologyCache>,
    /// Scores ontology pairs.
    pub comparator: Arc<dyn Comparator>,
    /// Reasoner used by normalisation and import checks.
    pub reasoner: Arc<dyn Reasoner>,
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("config", &self.config)
            .field("comparator", &self.comparator.method_name())
            .finish_non_exhaustive()
    }
}

impl EvalContext {
    /// Concurrency budget shared by loads and comparisons.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.cache.budget()
    }

    /// Cancels outstanding loads. The cache refuses requests afterwards.
    pub fn teardown(&self) {
        self.cache.teardown();
        tracing::info!("evaluation_context_torn_down");
    }
}

/// Creates a context reading ontologies from the configured file root.
///
/// # Errors
///
/// Fails when the ontology root is not a directory.
pub fn create_context(config: Config) -> Result<EvalContext> {
    if !config.sources.root.is_dir() {
        return Err(Error::Message(format!(
            "ontology root `{}` is not a directory",
            config.sources.root.display()
        )));
    }
    let source: Arc<SourceHandle> = Arc::new(config.sources.file_source());
    Ok(create_context_with_source(config, source))
}

/// Creates a context over an arbitrary ontology source.
#[must_use]
pub fn create_context_with_source(config: Config, source: Arc<SourceHandle>) -> EvalContext {
    let reasoner: Arc<dyn Reasoner> = Arc::new(StructuralReasoner::new());
    let import_map = config.imports.import_map();
    let dependencies = NormalizerDependencies {
        import_map: import_map.clone(),
        namer: ClassNamer::new(config.normalization.autogen_namespace.clone()),
        reasoner: Arc::clone(&reasoner),
        test_marker: config.normalization.test_marker.clone(),
    };
    let chain = NormalizerChain::from_kinds(&config.normalization.chain, &dependencies);

    let loader = DocumentLoader::new(source, chain)
        .with_import_map(import_map)
        .with_missing_imports(config.imports.missing)
        .with_import_capacity(config.cache.import_capacity);
    let cache = Arc::new(OntologyCache::new(loader, config.cache.threads));
    let comparator: Arc<dyn Comparator> = Arc::new(
        config
            .comparison
            .method
            .comparator(config.comparison.include_imports),
    );

    tracing::info!(
        threads = cache.budget(),
        method = %config.comparison.method,
        include_imports = config.comparison.include_imports,
        stages = ?config.normalization.chain,
        "evaluation_context_created"
    );
    EvalContext {
        config,
        cache,
        comparator,
        reasoner,
    }
}

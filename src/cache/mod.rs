//! Memoising ontology cache.
//!
//! The first request for a URI admits a load-and-normalize task, at most
//! `threads` of them in flight at once; later requests for the same URI share
//! its [`OntologyFuture`]. Failures stay on the entry and are handed to every
//! waiter. Teardown cancels unfinished work and closes the cache for good.

mod loader;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

pub use loader::{DocumentLoader, MissingImports, SourceHandle};

use crate::{
    normalization::NormalizationError,
    ontology::{entities::OntologyDocument, repositories::SourceError, value_objects::Iri},
};

/// Errors surfaced to whoever awaits a cache entry.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to load ontology `{uri}`: {source}")]
    Load {
        uri: Iri,
        #[source]
        source: Arc<SourceError>,
    },
    #[error("failed to resolve import `{import}` of `{uri}`: {source}")]
    Import {
        uri: Iri,
        import: Iri,
        #[source]
        source: Arc<SourceError>,
    },
    #[error("failed to normalize ontology `{uri}`: {source}")]
    Normalization {
        uri: Iri,
        #[source]
        source: NormalizationError,
    },
    #[error("loading ontology `{uri}` panicked: {reason}")]
    Panicked { uri: Iri, reason: String },
    #[error("loading ontology `{uri}` was cancelled")]
    Cancelled { uri: Iri },
    #[error("ontology cache has been torn down")]
    TornDown,
}

impl CacheError {
    fn load(uri: &Iri, source: SourceError) -> Self {
        Self::Load {
            uri: uri.clone(),
            source: Arc::new(source),
        }
    }

    fn import(uri: &Iri, import: &Iri, source: SourceError) -> Self {
        Self::Import {
            uri: uri.clone(),
            import: import.clone(),
            source: Arc::new(source),
        }
    }
}

/// Lifecycle of a cache entry.
#[derive(Clone, Debug)]
pub enum EntryState {
    /// Admitted, not yet started.
    Pending,
    Running,
    Ready(Arc<OntologyDocument>),
    Failed(CacheError),
    Cancelled,
}

impl EntryState {
    /// Whether the entry has reached a final state.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// Shared handle on the outcome of one cache entry.
#[derive(Clone, Debug)]
pub struct OntologyFuture {
    uri: Iri,
    state: watch::Receiver<EntryState>,
}

impl OntologyFuture {
    #[must_use]
    pub fn uri(&self) -> &Iri {
        &self.uri
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> EntryState {
        self.state.borrow().clone()
    }

    /// Waits until the entry settles and returns its document.
    pub async fn wait(mut self) -> Result<Arc<OntologyDocument>, CacheError> {
        let settled = self
            .state
            .wait_for(EntryState::is_settled)
            .await
            .map(|state| state.clone())
            .unwrap_or(EntryState::Cancelled);
        match settled {
            EntryState::Ready(document) => Ok(document),
            EntryState::Failed(error) => Err(error),
            EntryState::Pending | EntryState::Running | EntryState::Cancelled => {
                Err(CacheError::Cancelled { uri: self.uri })
            }
        }
    }
}

struct CacheEntry {
    state: watch::Receiver<EntryState>,
    cancel: CancellationToken,
}

/// Identity-keyed memoising loader with bounded admission.
pub struct OntologyCache {
    loader: Arc<DocumentLoader>,
    permits: Arc<Semaphore>,
    budget: usize,
    entries: Mutex<HashMap<Iri, CacheEntry>>,
    closed: AtomicBool,
}

impl OntologyCache {
    /// Creates a cache running at most `threads` loads at a time.
    #[must_use]
    pub fn new(loader: DocumentLoader, threads: usize) -> Self {
        let budget = threads.max(1);
        Self {
            loader: Arc::new(loader),
            permits: Arc::new(Semaphore::new(budget)),
            budget,
            entries: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn loader(&self) -> &DocumentLoader {
        &self.loader
    }

    /// Number of memoised entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Returns the shared handle for `uri`, admitting a new load if this is the
    /// first request. Waits while the in-flight budget is exhausted.
    pub async fn get(&self, uri: &Iri) -> Result<OntologyFuture, CacheError> {
        if let Some(existing) = self.lookup(uri)? {
            return Ok(existing);
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| CacheError::TornDown)?;

        let mut entries = self.guard();
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::TornDown);
        }
        if let Some(entry) = entries.get(uri) {
            return Ok(OntologyFuture {
                uri: uri.clone(),
                state: entry.state.clone(),
            });
        }

        let (sender, receiver) = watch::channel(EntryState::Pending);
        let cancel = CancellationToken::new();
        tokio::spawn(run_entry(
            Arc::clone(&self.loader),
            uri.clone(),
            sender,
            cancel.clone(),
            permit,
        ));
        entries.insert(
            uri.clone(),
            CacheEntry {
                state: receiver.clone(),
                cancel,
            },
        );
        tracing::info!(uri = %uri, in_flight = self.in_flight(), "ontology_load_admitted");

        Ok(OntologyFuture {
            uri: uri.clone(),
            state: receiver,
        })
    }

    /// Loads `uri` if needed and waits for the normalised document.
    pub async fn get_ontology(&self, uri: &Iri) -> Result<Arc<OntologyDocument>, CacheError> {
        let future = self.get(uri).await?;
        let outcome = future.wait().await;
        if let Err(error) = &outcome {
            tracing::error!(uri = %uri, err.msg = %error, err.detail = ?error, "ontology_unavailable");
        }
        outcome
    }

    /// Cancels and forgets the entry for `uri`.
    pub fn remove(&self, uri: &Iri) -> bool {
        let Some(entry) = self.guard().remove(uri) else {
            return false;
        };
        entry.cancel.cancel();
        tracing::info!(uri = %uri, "ontology_evicted");
        true
    }

    /// Cancels and forgets every entry. The cache stays usable.
    pub fn flush(&self) {
        let drained: Vec<(Iri, CacheEntry)> = self.guard().drain().collect();
        for (uri, entry) in &drained {
            if !entry.state.borrow().is_settled() {
                tracing::debug!(uri = %uri, "ontology_load_cancelled");
            }
            entry.cancel.cancel();
        }
        tracing::info!(entries = drained.len(), "ontology_cache_flushed");
    }

    /// Flushes the cache and refuses all later requests.
    pub fn teardown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.permits.close();
        self.flush();
    }

    /// Concurrency budget for loads.
    #[must_use]
    pub fn budget(&self) -> usize {
        self.budget
    }

    fn in_flight(&self) -> usize {
        self.budget.saturating_sub(self.permits.available_permits())
    }

    fn lookup(&self, uri: &Iri) -> Result<Option<OntologyFuture>, CacheError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::TornDown);
        }
        Ok(self.guard().get(uri).map(|entry| OntologyFuture {
            uri: uri.clone(),
            state: entry.state.clone(),
        }))
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<Iri, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for OntologyCache {
    fn drop(&mut self) {
        for entry in self.guard().values() {
            entry.cancel.cancel();
        }
    }
}

async fn run_entry(
    loader: Arc<DocumentLoader>,
    uri: Iri,
    state: watch::Sender<EntryState>,
    cancel: CancellationToken,
    _permit: OwnedSemaphorePermit,
) {
    state.send_replace(EntryState::Running);
    tracing::debug!(uri = %uri, "ontology_load_started");

    let outcome = tokio::select! {
        () = cancel.cancelled() => EntryState::Cancelled,
        result = loader.load(&uri, cancel.clone()) => match result {
            Ok(document) => EntryState::Ready(document),
            Err(CacheError::Normalization { source: NormalizationError::Cancelled { .. }, .. }) => {
                EntryState::Cancelled
            }
            Err(error) => EntryState::Failed(error),
        },
    };

    match &outcome {
        EntryState::Ready(document) => {
            tracing::info!(uri = %uri, axioms = document.axioms().len(), "ontology_load_finished");
        }
        EntryState::Failed(error) => {
            tracing::error!(uri = %uri, err.msg = %error, err.detail = ?error, "ontology_load_failed");
        }
        EntryState::Cancelled => tracing::info!(uri = %uri, "ontology_load_cancelled"),
        EntryState::Pending | EntryState::Running => {}
    }
    state.send_replace(outcome);
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        normalization::{NormalizerChain, SubsumptionMaterializationNormalizer},
        ontology::{
            entities::Axiom,
            expressions::ClassExpression,
            reasoner::StructuralReasoner,
            repositories::OntologySource,
            source::InMemoryOntologySource,
        },
    };

    fn iri(value: &str) -> Iri {
        Iri::new(value).expect("valid iri")
    }

    /// Source that sleeps on every load and records peak concurrency.
    #[derive(Default)]
    struct SlowSource {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl OntologySource for SlowSource {
        async fn load(&self, uri: &Iri) -> Result<OntologyDocument, SourceError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(OntologyDocument::new(uri.clone())
                .with_axioms([Axiom::Declaration(iri(&format!("{uri}#Thing")))]))
        }
    }

    fn cache_over(source: Arc<SourceHandle>, threads: usize) -> OntologyCache {
        OntologyCache::new(DocumentLoader::new(source, NormalizerChain::default()), threads)
    }

    #[tokio::test]
    async fn memoizes_documents_per_uri() {
        let source = Arc::new(InMemoryOntologySource::from_documents([OntologyDocument::new(
            iri("http://x.org/a"),
        )
        .with_axioms([Axiom::Declaration(iri("http://x.org/a#A"))])]));
        let cache = cache_over(source.clone(), 2);

        let uri = iri("http://x.org/a");
        let (first, second) = tokio::join!(cache.get_ontology(&uri), cache.get_ontology(&uri));
        let first = first.expect("first");
        let second = second.expect("second");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.load_count(), 1);
        assert_eq!(cache.len(), 1);
        assert!(first.is_originally_defined(&iri("http://x.org/a#A")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn caps_in_flight_loads() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(50),
            ..SlowSource::default()
        });
        let cache = Arc::new(cache_over(source.clone(), 2));

        let mut handles = Vec::new();
        for idx in 0..6 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .get_ontology(&iri(&format!("http://x.org/doc{idx}")))
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("loaded");
        }

        assert!(source.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(cache.len(), 6);
    }

    #[tokio::test]
    async fn failures_stay_on_their_entry() {
        let source = Arc::new(InMemoryOntologySource::from_documents([OntologyDocument::new(
            iri("http://x.org/good"),
        )]));
        let cache = cache_over(source, 2);

        let missing = cache
            .get_ontology(&iri("http://x.org/missing"))
            .await
            .expect_err("missing document");
        assert!(matches!(missing, CacheError::Load { .. }));
        cache
            .get_ontology(&iri("http://x.org/good"))
            .await
            .expect("unaffected");

        let again = cache
            .get(&iri("http://x.org/missing"))
            .await
            .expect("memoized failure");
        assert!(matches!(again.state(), EntryState::Failed(_)));
    }

    #[tokio::test]
    async fn normalization_failures_are_reported() {
        let inconsistent = OntologyDocument::new(iri("http://x.org/bad")).with_axioms([
            Axiom::sub_class_of(iri("http://x.org/bad#A"), iri("http://x.org/bad#B")),
            Axiom::sub_class_of(
                iri("http://x.org/bad#A"),
                ClassExpression::complement(iri("http://x.org/bad#B").into()),
            ),
            Axiom::ClassAssertion {
                class: iri("http://x.org/bad#A").into(),
                individual: iri("http://x.org/bad#a1"),
            },
        ]);
        let source = Arc::new(InMemoryOntologySource::from_documents([inconsistent]));
        let pipeline = NormalizerChain::default().with_stage(Arc::new(
            SubsumptionMaterializationNormalizer::new(Arc::new(StructuralReasoner)),
        ));
        let cache = OntologyCache::new(DocumentLoader::new(source, pipeline), 1);

        let err = cache
            .get_ontology(&iri("http://x.org/bad"))
            .await
            .expect_err("inconsistent");
        assert!(matches!(err, CacheError::Normalization { .. }));
    }

    #[tokio::test]
    async fn teardown_cancels_pending_work() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(30),
            ..SlowSource::default()
        });
        let cache = cache_over(source, 1);

        let pending = cache.get(&iri("http://x.org/slow")).await.expect("admitted");
        cache.teardown();

        let err = pending.wait().await.expect_err("cancelled");
        assert!(matches!(err, CacheError::Cancelled { .. }));
        assert!(cache.is_empty());
        assert!(matches!(
            cache.get(&iri("http://x.org/other")).await,
            Err(CacheError::TornDown)
        ));
    }

    #[tokio::test]
    async fn removal_allows_reload() {
        let source = Arc::new(InMemoryOntologySource::from_documents([OntologyDocument::new(
            iri("http://x.org/a"),
        )]));
        let cache = cache_over(source.clone(), 1);

        cache.get_ontology(&iri("http://x.org/a")).await.expect("first");
        assert!(cache.remove(&iri("http://x.org/a")));
        assert!(!cache.remove(&iri("http://x.org/a")));
        cache.get_ontology(&iri("http://x.org/a")).await.expect("second");
        assert_eq!(source.load_count(), 2);
    }
}

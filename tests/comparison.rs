use std::{collections::BTreeSet, sync::Arc};

use ontoeval::{
    boot::create_context_with_source,
    cache::SourceHandle,
    comparison::{ComparisonMethod, OntologyPair},
    config::Config,
    ontology::{Axiom, InMemoryOntologySource, Iri, OntologyDocument},
};
use rstest::rstest;

fn iri(value: &str) -> Iri {
    Iri::new(value).expect("valid iri")
}

/// `Animal` with the given children, every class in `namespace`.
fn zoo(id: &str, namespace: &str, children: &[&str]) -> OntologyDocument {
    let class = |name: &str| iri(&format!("{namespace}#{name}"));
    let mut document = OntologyDocument::new(iri(id)).with_axioms([Axiom::Declaration(class("Animal"))]);
    for child in children {
        document = document.with_axioms([
            Axiom::Declaration(class(child)),
            Axiom::sub_class_of(class(child), class("Animal")),
        ]);
    }
    document
}

fn source() -> Arc<InMemoryOntologySource> {
    Arc::new(InMemoryOntologySource::from_documents([
        zoo("http://example.org/model", "http://example.org/model", &["Dog", "Cat"]),
        zoo("http://example.org/same", "http://example.org/same", &["Dog", "Cat"]),
        zoo("http://example.org/partial", "http://example.org/partial", &["Dog"]),
    ]))
}

fn config(method: ComparisonMethod) -> Config {
    let mut config = Config::default();
    config.cache.threads = 2;
    config.comparison.method = method;
    config
}

#[rstest]
#[case(ComparisonMethod::Sc, "http://example.org/same", 1.0, 1.0)]
#[case(ComparisonMethod::Csc, "http://example.org/same", 1.0, 1.0)]
#[case(ComparisonMethod::Sc, "http://example.org/partial", 5.0 / 9.0, 2.0 / 3.0)]
#[case(ComparisonMethod::Csc, "http://example.org/partial", 2.0 / 3.0, 2.0 / 3.0)]
#[tokio::test]
async fn compares_normalized_ontologies(
    #[case] method: ComparisonMethod,
    #[case] other: &str,
    #[case] precision: f64,
    #[case] recall: f64,
) {
    let source = source();
    let handle: Arc<SourceHandle> = source.clone();
    let ctx = create_context_with_source(config(method), handle);

    let pair = OntologyPair::load(&ctx.cache, &iri("http://example.org/model"), &iri(other))
        .await
        .expect("pair loads");
    let result = ctx.comparator.compare(&pair).expect("comparable");

    assert_eq!(result.method(), ctx.comparator.method_name());
    assert!((result.precision() - precision).abs() < 1e-9, "{result}");
    assert!((result.recall() - recall).abs() < 1e-9, "{result}");
    ctx.teardown();
}

#[tokio::test]
async fn swapping_the_pair_swaps_precision_and_recall() {
    let source = source();
    let handle: Arc<SourceHandle> = source.clone();
    let ctx = create_context_with_source(config(ComparisonMethod::Sc), handle);

    let pair = OntologyPair::load(
        &ctx.cache,
        &iri("http://example.org/model"),
        &iri("http://example.org/partial"),
    )
    .await
    .expect("pair loads");
    let forward = ctx.comparator.compare(&pair).expect("comparable");
    let backward = ctx.comparator.compare(&pair.swapped()).expect("comparable");

    assert!((forward.precision() - backward.recall()).abs() < 1e-9);
    assert!((forward.recall() - backward.precision()).abs() < 1e-9);
    assert!((forward.f_measure() - backward.f_measure()).abs() < 1e-9);
}

#[tokio::test]
async fn documents_are_loaded_once_across_pairs() {
    let source = source();
    let handle: Arc<SourceHandle> = source.clone();
    let ctx = create_context_with_source(config(ComparisonMethod::Sc), handle);

    for other in ["http://example.org/same", "http://example.org/partial"] {
        let pair = OntologyPair::load(&ctx.cache, &iri("http://example.org/model"), &iri(other))
            .await
            .expect("pair loads");
        ctx.comparator.compare(&pair).expect("comparable");
    }

    assert_eq!(source.load_count(), 3);
    assert_eq!(ctx.cache.len(), 3);
}

#[tokio::test]
async fn restricted_comparison_scores_requested_classes_only() {
    let shared = "http://example.org/zoo";
    let source = Arc::new(InMemoryOntologySource::from_documents([
        zoo("http://example.org/model", shared, &["Dog", "Cat"]),
        zoo("http://example.org/partial", shared, &["Dog"]),
    ]));
    let handle: Arc<SourceHandle> = source.clone();
    let ctx = create_context_with_source(config(ComparisonMethod::Sc), handle);

    let pair = OntologyPair::load(
        &ctx.cache,
        &iri("http://example.org/partial"),
        &iri("http://example.org/model"),
    )
    .await
    .expect("pair loads");
    let classes = BTreeSet::from([iri("http://example.org/zoo#Dog"), iri("http://example.org/zoo#Cat")]);
    let result = ctx
        .comparator
        .compare_classes(&pair, &classes)
        .expect("comparable");

    assert!((result.precision() - 0.5).abs() < 1e-9, "{result}");
    assert!((result.recall() - 0.5).abs() < 1e-9, "{result}");
}

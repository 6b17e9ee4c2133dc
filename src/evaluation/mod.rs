//! Group evaluation of student ontologies.
//!
//! A test description names a model ontology and two groups of student
//! ontologies. Every ordered pair of distinct ontologies is compared and the
//! outcomes are summarised per group in a [`TestReport`].

pub mod neutrality;
pub mod report;

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::Path,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::Semaphore,
    task::{Id, JoinSet},
};

pub use neutrality::{check_import_neutrality, NeutralityReport};
pub use report::{GroupSummary, TestReport};

use crate::{
    boot::EvalContext,
    cache::OntologyCache,
    comparison::{Comparator, ComparisonResult, OntologyPair},
    errors::{Error, Result},
    ontology::{
        collector::{Direction, HierarchyCollector},
        value_objects::Iri,
    },
};

fn default_name() -> String {
    "Unnamed Test".to_owned()
}

fn default_marker() -> String {
    "Test".to_owned()
}

/// What to compare, read from a YAML test file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDescription {
    #[serde(default = "default_name")]
    pub name: String,
    /// Ontology whose marker class lists the classes under test.
    #[serde(default)]
    pub raw_ontology: Option<Iri>,
    pub model_ontology: Iri,
    #[serde(default)]
    pub group_a: Vec<Iri>,
    #[serde(default)]
    pub group_b: Vec<Iri>,
    /// Explicit classes under test; overrides the raw ontology.
    #[serde(default)]
    pub classes: Option<BTreeSet<Iri>>,
    #[serde(default = "default_marker")]
    pub test_marker: String,
}

impl TestDescription {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }
}

/// Role of an ontology within a test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Model,
    A,
    B,
}

impl Group {
    /// Prefix used for short names in tables.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::Model => "",
            Self::A => "A:",
            Self::B => "B:",
        }
    }
}

/// Outcome of comparing one ordered pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Compared(ComparisonResult),
    Failed { reason: String },
}

impl PairOutcome {
    fn failed(error: impl std::fmt::Display) -> Self {
        Self::Failed {
            reason: error.to_string(),
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&ComparisonResult> {
        match self {
            Self::Compared(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }
}

/// A prepared test: the description plus the classes it restricts to.
#[derive(Clone, Debug)]
pub struct OntologyTest {
    description: TestDescription,
    classes: Option<BTreeSet<Iri>>,
}

impl OntologyTest {
    /// Resolves the classes under test. An explicit non-empty list wins;
    /// otherwise the direct subclasses of the raw ontology's marker class are
    /// used. No classes means every class is compared.
    pub async fn prepare(ctx: &EvalContext, description: TestDescription) -> Result<Self> {
        let classes = match (&description.classes, &description.raw_ontology) {
            (Some(classes), _) if !classes.is_empty() => Some(classes.clone()),
            (_, Some(raw)) => {
                marked_classes(&ctx.cache, raw, &description.test_marker).await?
            }
            _ => None,
        };
        tracing::info!(
            test = %description.name,
            classes = classes.as_ref().map_or(0, BTreeSet::len),
            "ontology_test_prepared"
        );
        Ok(Self {
            description,
            classes,
        })
    }

    /// A test restricted to exactly `classes`, or unrestricted when `None`.
    #[must_use]
    pub fn with_classes(description: TestDescription, classes: Option<BTreeSet<Iri>>) -> Self {
        Self {
            description,
            classes: classes.filter(|classes| !classes.is_empty()),
        }
    }

    #[must_use]
    pub fn description(&self) -> &TestDescription {
        &self.description
    }

    #[must_use]
    pub fn classes(&self) -> Option<&BTreeSet<Iri>> {
        self.classes.as_ref()
    }

    /// Every ontology of the test with its role. An ontology listed in more
    /// than one place keeps its first role (model, then A, then B).
    #[must_use]
    pub fn members(&self) -> BTreeMap<Iri, Group> {
        let mut members = BTreeMap::new();
        members.insert(self.description.model_ontology.clone(), Group::Model);
        for (group, ontologies) in [
            (Group::A, &self.description.group_a),
            (Group::B, &self.description.group_b),
        ] {
            for ontology in ontologies {
                members.entry(ontology.clone()).or_insert(group);
            }
        }
        members
    }

    /// Compares every ordered pair of distinct ontologies, at most
    /// `ctx.threads()` comparisons at a time, and builds the report.
    pub async fn execute(&self, ctx: &EvalContext) -> TestReport {
        let members = self.members();
        let permits = Arc::new(Semaphore::new(ctx.threads()));
        let mut tasks = JoinSet::new();
        let mut pairs = HashMap::new();

        tracing::info!(
            test = %self.description.name,
            ontologies = members.len(),
            "ontology_test_started"
        );
        for a in members.keys() {
            for b in members.keys().filter(|b| *b != a) {
                let cache = Arc::clone(&ctx.cache);
                let comparator = Arc::clone(&ctx.comparator);
                let permits = Arc::clone(&permits);
                let classes = self.classes.clone();
                let (task_a, task_b) = (a.clone(), b.clone());
                let handle = tasks.spawn(async move {
                    compare_pair(&cache, comparator, permits, &task_a, &task_b, classes).await
                });
                pairs.insert(handle.id(), (a.clone(), b.clone()));
            }
        }

        let results = collect_outcomes(tasks, pairs).await;
        tracing::info!(test = %self.description.name, "ontology_test_completed");

        TestReport::new(
            &self.description.name,
            ctx.comparator.method_name(),
            self.classes.clone(),
            members,
            results,
        )
    }
}

/// Runs a test description end to end.
pub async fn run_test(ctx: &EvalContext, description: TestDescription) -> Result<TestReport> {
    let test = OntologyTest::prepare(ctx, description).await?;
    Ok(test.execute(ctx).await)
}

async fn compare_pair(
    cache: &OntologyCache,
    comparator: Arc<dyn Comparator>,
    permits: Arc<Semaphore>,
    a: &Iri,
    b: &Iri,
    classes: Option<BTreeSet<Iri>>,
) -> PairOutcome {
    let pair = match OntologyPair::load(cache, a, b).await {
        Ok(pair) => pair,
        Err(error) => {
            tracing::warn!(ontology_a = %a, ontology_b = %b, err.msg = %error, "pair_skipped");
            return PairOutcome::failed(error);
        }
    };
    let Ok(_permit) = permits.acquire_owned().await else {
        return PairOutcome::failed("evaluation was shut down");
    };

    let joined = tokio::task::spawn_blocking(move || match &classes {
        Some(classes) => comparator.compare_classes(&pair, classes),
        None => comparator.compare(&pair),
    })
    .await;

    match joined {
        Ok(Ok(result)) => PairOutcome::Compared(result),
        Ok(Err(error)) => {
            tracing::warn!(ontology_a = %a, ontology_b = %b, err.msg = %error, "pair_not_comparable");
            PairOutcome::failed(error)
        }
        Err(error) => {
            tracing::error!(ontology_a = %a, ontology_b = %b, err.msg = %error, err.detail = ?error, "pair_comparison_panicked");
            PairOutcome::failed(format!("comparison panicked: {error}"))
        }
    }
}

/// Drains `tasks` into a table keyed by ontology A, then ontology B. A task
/// that panicked or was cancelled is recorded as a failure of its pair.
async fn collect_outcomes(
    mut tasks: JoinSet<PairOutcome>,
    mut pairs: HashMap<Id, (Iri, Iri)>,
) -> BTreeMap<Iri, BTreeMap<Iri, PairOutcome>> {
    let mut results: BTreeMap<Iri, BTreeMap<Iri, PairOutcome>> = BTreeMap::new();
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(error) => {
                tracing::error!(err.msg = %error, err.detail = ?error, "pair_task_failed");
                (error.id(), PairOutcome::failed(format!("comparison task failed: {error}")))
            }
        };
        if let Some((a, b)) = pairs.remove(&id) {
            results.entry(a).or_default().insert(b, outcome);
        }
    }
    results
}

/// Direct named subclasses of the class in `raw` whose fragment matches
/// `marker`, read from the unnormalised document.
async fn marked_classes(
    cache: &OntologyCache,
    raw: &Iri,
    marker: &str,
) -> Result<Option<BTreeSet<Iri>>> {
    let document = cache.loader().load_raw(raw).await?;
    let Some(marker_class) = document
        .classes_in_signature(false)
        .into_iter()
        .find(|class| {
            class
                .fragment()
                .is_some_and(|fragment| fragment.eq_ignore_ascii_case(marker))
        })
    else {
        tracing::warn!(raw = %raw, marker, "test_marker_missing");
        return Ok(None);
    };
    let classes = HierarchyCollector::new(&document, false)
        .direct(&marker_class, Direction::Down)
        .cloned()
        .unwrap_or_default();
    Ok((!classes.is_empty()).then_some(classes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_descriptions_with_defaults() {
        let description = TestDescription::from_yaml(
            "model_ontology: http://x.org/model\ngroup_a: [http://x.org/a1]\n",
        )
        .expect("parsed");
        assert_eq!(description.name, "Unnamed Test");
        assert_eq!(description.test_marker, "Test");
        assert!(description.group_b.is_empty());
        assert_eq!(description.classes, None);
    }

    async fn exploding_comparison() -> PairOutcome {
        panic!("comparator blew up")
    }

    #[tokio::test]
    async fn failed_pair_tasks_are_recorded_as_failures() {
        let iri = |value: &str| Iri::new(value).expect("valid iri");
        let (model, student) = (iri("http://x.org/model"), iri("http://x.org/s1"));
        let mut tasks = JoinSet::new();
        let mut pairs = HashMap::new();

        let ok = tasks.spawn(async { PairOutcome::failed("not comparable") });
        pairs.insert(ok.id(), (model.clone(), student.clone()));
        let panicked = tasks.spawn(exploding_comparison());
        pairs.insert(panicked.id(), (student.clone(), model.clone()));
        let cancelled = tasks.spawn(std::future::pending::<PairOutcome>());
        pairs.insert(cancelled.id(), (model.clone(), iri("http://x.org/s2")));
        cancelled.abort();

        let results = collect_outcomes(tasks, pairs).await;

        assert_eq!(
            results[&model][&student],
            PairOutcome::failed("not comparable")
        );
        let PairOutcome::Failed { reason } = &results[&student][&model] else {
            panic!("panicking task must fail its pair");
        };
        assert!(reason.contains("panic"), "{reason}");
        assert!(matches!(
            results[&model].get(&iri("http://x.org/s2")),
            Some(PairOutcome::Failed { .. })
        ));
    }

    #[test]
    fn members_keep_their_first_role() {
        let description = TestDescription::from_yaml(
            r"
name: roles
model_ontology: http://x.org/model
group_a: [http://x.org/s1, http://x.org/model]
group_b: [http://x.org/s1, http://x.org/s2]
",
        )
        .expect("parsed");
        let members = OntologyTest::with_classes(description, None).members();
        let roles: Vec<Group> = members.values().copied().collect();
        assert_eq!(roles, vec![Group::Model, Group::A, Group::B]);
    }
}

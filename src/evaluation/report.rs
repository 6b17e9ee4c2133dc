use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Write as _},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Group, PairOutcome};
use crate::{
    comparison::ComparisonResult,
    errors::{Error, Result},
    ontology::value_objects::Iri,
};

/// Mean scores of every comparison from a computed set against a reference
/// set, self-pairs excluded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    label: String,
    compared: usize,
    failed: usize,
    #[serde(skip)]
    precision: f64,
    #[serde(skip)]
    recall: f64,
    #[serde(skip)]
    f_measure: f64,
    mean_precision: Option<f64>,
    mean_recall: Option<f64>,
    mean_f_measure: Option<f64>,
}

impl GroupSummary {
    fn between(
        label: &str,
        results: &BTreeMap<Iri, BTreeMap<Iri, PairOutcome>>,
        computed: &BTreeSet<&Iri>,
        reference: &BTreeSet<&Iri>,
    ) -> Self {
        let mut summary = Self {
            label: label.to_owned(),
            compared: 0,
            failed: 0,
            precision: 0.0,
            recall: 0.0,
            f_measure: 0.0,
            mean_precision: None,
            mean_recall: None,
            mean_f_measure: None,
        };
        for (a, row) in results.iter().filter(|(a, _)| computed.contains(a)) {
            for (_, outcome) in row
                .iter()
                .filter(|(b, _)| *b != a && reference.contains(b))
            {
                match outcome {
                    PairOutcome::Compared(result) => {
                        summary.compared += 1;
                        summary.precision += result.precision();
                        summary.recall += result.recall();
                        summary.f_measure += result.f_measure();
                    }
                    PairOutcome::Failed { .. } => summary.failed += 1,
                }
            }
        }
        if summary.compared > 0 {
            let count = summary.compared as f64;
            summary.mean_precision = Some(summary.precision / count);
            summary.mean_recall = Some(summary.recall / count);
            summary.mean_f_measure = Some(summary.f_measure / count);
        }
        summary
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of pairs that produced a score.
    #[must_use]
    pub fn compared(&self) -> usize {
        self.compared
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// `None` when no pair of this group was compared.
    #[must_use]
    pub fn mean_precision(&self) -> Option<f64> {
        self.mean_precision
    }

    #[must_use]
    pub fn mean_recall(&self) -> Option<f64> {
        self.mean_recall
    }

    #[must_use]
    pub fn mean_f_measure(&self) -> Option<f64> {
        self.mean_f_measure
    }
}

#[derive(Clone, Copy, Debug)]
enum Statistic {
    Precision,
    Recall,
    FMeasure,
}

impl Statistic {
    fn of(self, result: &ComparisonResult) -> f64 {
        match self {
            Self::Precision => result.precision(),
            Self::Recall => result.recall(),
            Self::FMeasure => result.f_measure(),
        }
    }

    fn file_suffix(self) -> &'static str {
        match self {
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::FMeasure => "fmeasure",
        }
    }
}

/// Everything a test run produced.
#[derive(Clone, Debug, Serialize)]
pub struct TestReport {
    name: String,
    method: String,
    generated_at: DateTime<Utc>,
    classes: Option<BTreeSet<Iri>>,
    ontologies: BTreeMap<Iri, Group>,
    summaries: Vec<GroupSummary>,
    results: BTreeMap<Iri, BTreeMap<Iri, PairOutcome>>,
}

impl TestReport {
    #[must_use]
    pub fn new(
        name: &str,
        method: &str,
        classes: Option<BTreeSet<Iri>>,
        ontologies: BTreeMap<Iri, Group>,
        results: BTreeMap<Iri, BTreeMap<Iri, PairOutcome>>,
    ) -> Self {
        let in_group = |group: Group| -> BTreeSet<&Iri> {
            ontologies
                .iter()
                .filter(|(_, member)| **member == group)
                .map(|(iri, _)| iri)
                .collect()
        };
        let model = in_group(Group::Model);
        let group_a = in_group(Group::A);
        let group_b = in_group(Group::B);
        let students: BTreeSet<&Iri> = group_a.union(&group_b).copied().collect();

        let summaries = [
            ("all vs. model", &students, &model),
            ("A vs. model", &group_a, &model),
            ("B vs. model", &group_b, &model),
            ("all vs. all", &students, &students),
            ("A vs. B", &group_a, &group_b),
            ("B vs. A", &group_b, &group_a),
            ("A internal", &group_a, &group_a),
            ("B internal", &group_b, &group_b),
        ]
        .into_iter()
        .map(|(label, computed, reference)| {
            GroupSummary::between(label, &results, computed, reference)
        })
        .collect();

        Self {
            name: name.to_owned(),
            method: method.to_owned(),
            generated_at: Utc::now(),
            classes,
            summaries,
            ontologies,
            results,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    #[must_use]
    pub fn summaries(&self) -> &[GroupSummary] {
        &self.summaries
    }

    #[must_use]
    pub fn summary(&self, label: &str) -> Option<&GroupSummary> {
        self.summaries.iter().find(|summary| summary.label == label)
    }

    /// Outcome of comparing `a` against `b`, if that pair was run.
    #[must_use]
    pub fn outcome(&self, a: &Iri, b: &Iri) -> Option<&PairOutcome> {
        self.results.get(a).and_then(|row| row.get(b))
    }

    /// Number of pairs that failed to compare.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.results
            .values()
            .flat_map(BTreeMap::values)
            .filter(|outcome| matches!(outcome, PairOutcome::Failed { .. }))
            .count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn precision_table(&self) -> String {
        self.table(Statistic::Precision)
    }

    #[must_use]
    pub fn recall_table(&self) -> String {
        self.table(Statistic::Recall)
    }

    #[must_use]
    pub fn f_measure_table(&self) -> String {
        self.table(Statistic::FMeasure)
    }

    /// Writes the three CSV matrices into `dir` and returns their paths.
    pub fn write_tables(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let stem = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>();
        let mut written = Vec::new();
        for statistic in [Statistic::Precision, Statistic::Recall, Statistic::FMeasure] {
            let path = dir.join(format!("{stem}-{}.csv", statistic.file_suffix()));
            std::fs::write(&path, self.table(statistic)).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            tracing::info!(path = %path.display(), "report_table_written");
            written.push(path);
        }
        Ok(written)
    }

    fn short_name(&self, iri: &Iri) -> String {
        let marker = self.ontologies.get(iri).map_or("", |group| group.marker());
        let local = iri
            .as_str()
            .trim_end_matches('/')
            .rsplit(['/', '#', ':'])
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or(iri.as_str());
        format!("{marker}{local}")
    }

    /// Square matrix over every ontology; rows are A, columns B. Cells of
    /// self-pairs and failed pairs are empty.
    fn table(&self, statistic: Statistic) -> String {
        let mut table = String::from("\"\"");
        for column in self.ontologies.keys() {
            let _ = write!(table, ",\"{}\"", self.short_name(column));
        }
        table.push('\n');
        for row in self.ontologies.keys() {
            let _ = write!(table, "\"{}\"", self.short_name(row));
            for column in self.ontologies.keys() {
                match self.outcome(row, column).and_then(PairOutcome::result) {
                    Some(result) => {
                        let _ = write!(table, ",\"{}\"", statistic.of(result));
                    }
                    None => table.push_str(",\"\""),
                }
            }
            table.push('\n');
        }
        table
    }
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_owned(), |value| format!("{value:.4}"))
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test result report for '{}' (mean values)", self.name)?;
        write!(
            f,
            "{:<16}{:>12}{:>12}{:>12}{:>10}{:>8}",
            "", "Precision", "Recall", "F-Measure", "Compared", "Failed"
        )?;
        for summary in &self.summaries {
            write!(
                f,
                "\n{:<16}{:>12}{:>12}{:>12}{:>10}{:>8}",
                summary.label,
                cell(summary.mean_precision),
                cell(summary.mean_recall),
                cell(summary.mean_f_measure),
                summary.compared,
                summary.failed
            )?;
        }
        Ok(())
    }
}

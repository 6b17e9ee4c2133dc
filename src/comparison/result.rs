use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ontology::value_objects::Iri;

/// Precision and recall of one ontology pair under one method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    method: String,
    ontology_a: Iri,
    ontology_b: Iri,
    precision: f64,
    recall: f64,
}

impl ComparisonResult {
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        ontology_a: Iri,
        ontology_b: Iri,
        precision: f64,
        recall: f64,
    ) -> Self {
        Self {
            method: method.into(),
            ontology_a,
            ontology_b,
            precision,
            recall,
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn ontology_a(&self) -> &Iri {
        &self.ontology_a
    }

    #[must_use]
    pub fn ontology_b(&self) -> &Iri {
        &self.ontology_b
    }

    #[must_use]
    pub fn precision(&self) -> f64 {
        self.precision
    }

    #[must_use]
    pub fn recall(&self) -> f64 {
        self.recall
    }

    /// Harmonic mean of precision and recall; 0 when both are 0.
    #[must_use]
    pub fn f_measure(&self) -> f64 {
        let sum = self.precision + self.recall;
        if sum == 0.0 {
            return 0.0;
        }
        2.0 * self.precision * self.recall / sum
    }

    /// The single similarity figure, which is the F-measure.
    #[must_use]
    pub fn similarity(&self) -> f64 {
        self.f_measure()
    }

    #[must_use]
    pub fn similarity_type(&self) -> &'static str {
        "F-Measure"
    }
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} and {}: precision {:.4}, recall {:.4}, {} {:.4}",
            self.method,
            self.ontology_a,
            self.ontology_b,
            self.precision,
            self.recall,
            self.similarity_type(),
            self.f_measure()
        )
    }
}

//! Crate-wide error type.
//!
//! Each concern keeps its own error enum; this one wraps them for the
//! configuration, boot and command-line layers.

use std::path::PathBuf;

use crate::{
    cache::CacheError,
    comparison::ComparisonError,
    normalization::NormalizationError,
    ontology::{
        entities::OntologyError,
        repositories::{ReasonerError, SourceError},
        value_objects::IriError,
    },
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("cannot access `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    YAML(#[from] serde_yaml::Error),

    #[error(transparent)]
    JSON(#[from] serde_json::Error),

    #[error(transparent)]
    Tera(#[from] tera::Error),

    #[error(transparent)]
    Iri(#[from] IriError),

    #[error(transparent)]
    Ontology(#[from] OntologyError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Comparison(#[from] ComparisonError),

    #[error("logger initialisation failed: {0}")]
    Logger(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

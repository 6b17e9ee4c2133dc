//! Configuration loading.
//!
//! A configuration file is YAML rendered through tera first, so values can be
//! pulled from the environment:
//!
//! ```yaml
//! sources:
//!   root: {{ get_env(name="ONTOEVAL_ROOT", default=".") }}
//! ```
//!
//! Every section has defaults, so an empty file is a valid configuration.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    cache::{DocumentLoader, MissingImports},
    comparison::ComparisonMethod,
    errors::{Error, Result},
    logger::{Format, LogLevel, Rotation},
    normalization::{naming::DEFAULT_AUTOGEN_NAMESPACE, ImportMap, NormalizerKind},
    ontology::{source::FileOntologySource, value_objects::Iri},
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logger: Logger,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub imports: ImportSettings,
    #[serde(default)]
    pub sources: SourceSettings,
    #[serde(default)]
    pub normalization: NormalizationSettings,
    #[serde(default)]
    pub comparison: ComparisonSettings,
}

/// Logger configuration
///
/// Example (development):
/// ```yaml
/// logger:
///   enable: true
///   level: debug
///   format: compact
///   override_filter: ontoeval=trace
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Logger {
    /// Enable log write to stdout
    pub enable: bool,

    /// Set the logger level.
    ///
    /// * options: `trace` | `debug` | `info` | `warn` | `error`
    #[serde(default)]
    pub level: LogLevel,

    /// Set the logger format.
    ///
    /// * options: `compact` | `pretty` | `json`
    #[serde(default)]
    pub format: Format,

    /// Override our custom tracing filter.
    ///
    /// Set this to your own filter if you want to see traces from internal
    /// libraries.
    pub override_filter: Option<String>,

    /// Set this if you want to write log to file
    #[serde(default)]
    pub file_appender: Option<LoggerFileAppender>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            enable: true,
            level: LogLevel::default(),
            format: Format::default(),
            override_filter: None,
            file_appender: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggerFileAppender {
    /// Enable logger file appender
    pub enable: bool,

    /// Enable write log to file non-blocking
    #[serde(default)]
    pub non_blocking: bool,

    /// Set the logger file appender level.
    #[serde(default)]
    pub level: LogLevel,

    /// Set the logger file appender format.
    #[serde(default)]
    pub format: Format,

    /// Set the logger file appender rotation.
    #[serde(default)]
    pub rotation: Rotation,

    /// Set the logger file appender dir
    ///
    /// default is `./logs`
    pub dir: Option<String>,

    /// Set log filename prefix
    pub filename_prefix: Option<String>,

    /// Set log filename suffix
    pub filename_suffix: Option<String>,

    /// Set the logger file appender keep max log files.
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

fn default_max_log_files() -> usize {
    7
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn default_import_capacity() -> u64 {
    DocumentLoader::DEFAULT_IMPORT_CAPACITY
}

/// Ontology cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Maximum number of ontologies loaded and normalised at once. Also bounds
    /// concurrent pair comparisons.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Number of imported documents kept for reuse.
    #[serde(default = "default_import_capacity")]
    pub import_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            import_capacity: default_import_capacity(),
        }
    }
}

/// Import remapping.
///
/// ```yaml
/// imports:
///   canonical: http://purl.org/biotop/biotoplite.owl
///   ignored:
///     - http://purl.org/biotop/biotoplite_group_A_TEST.owl
///   missing: silent
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportSettings {
    /// The background ontology every ignored import is mapped onto.
    pub canonical: Option<Iri>,
    #[serde(default)]
    pub ignored: Vec<Iri>,
    /// Additional variant → canonical prefix mappings.
    #[serde(default)]
    pub mappings: BTreeMap<Iri, Iri>,
    #[serde(default)]
    pub missing: MissingImports,
}

impl ImportSettings {
    /// Builds the import map. Explicit mappings override the ignored list.
    #[must_use]
    pub fn import_map(&self) -> ImportMap {
        let mut map = self.canonical.as_ref().map_or_else(ImportMap::default, |canonical| {
            ImportMap::with_canonical(canonical, self.ignored.iter().cloned())
        });
        for (variant, canonical) in &self.mappings {
            map.insert(variant.clone(), canonical.clone());
        }
        map
    }
}

/// Where ontology documents are read from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceSettings {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// IRI → file path; relative paths resolve against `root`.
    #[serde(default)]
    pub mappings: BTreeMap<Iri, PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            mappings: BTreeMap::new(),
        }
    }
}

impl SourceSettings {
    #[must_use]
    pub fn file_source(&self) -> FileOntologySource {
        self.mappings
            .iter()
            .fold(FileOntologySource::new(&self.root), |source, (iri, path)| {
                source.with_mapping(iri.clone(), path)
            })
    }
}

fn default_chain() -> Vec<NormalizerKind> {
    NormalizerKind::standard_chain()
}

fn default_namespace() -> String {
    DEFAULT_AUTOGEN_NAMESPACE.to_owned()
}

fn default_test_marker() -> String {
    "Test".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NormalizationSettings {
    /// Stages run on every loaded ontology, in order.
    #[serde(default = "default_chain")]
    pub chain: Vec<NormalizerKind>,
    /// Prefix of synthesised class names.
    #[serde(default = "default_namespace")]
    pub autogen_namespace: String,
    /// Fragment of the marker class whose subclass edges are dropped.
    #[serde(default = "default_test_marker")]
    pub test_marker: String,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            autogen_namespace: default_namespace(),
            test_marker: default_test_marker(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ComparisonSettings {
    #[serde(default)]
    pub method: ComparisonMethod,
    /// Walk the import closure and score imported classes too.
    #[serde(default)]
    pub include_imports: bool,
}

impl Config {
    /// Reads and renders a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, rendered or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "config_loaded");
        Self::from_str(&content)
    }

    /// Renders `content` through tera and parses the YAML result.
    ///
    /// # Errors
    ///
    /// Returns an error when rendering or parsing fails.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let rendered = tera::Tera::one_off(content, &tera::Context::new(), false)?;
        if rendered.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&rendered)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(value: &str) -> Iri {
        Iri::new(value).expect("valid iri")
    }

    #[test]
    fn empty_configuration_uses_defaults() {
        let config = Config::from_str("").expect("config");
        assert_eq!(config.normalization.chain, NormalizerKind::standard_chain());
        assert_eq!(config.comparison.method, ComparisonMethod::Sc);
        assert!(config.cache.threads >= 1);
        assert_eq!(config.imports.missing, MissingImports::Fail);
    }

    #[test]
    fn renders_environment_lookups() {
        let config = Config::from_str(
            r#"
sources:
  root: {{ get_env(name="ONTOEVAL_TEST_UNSET_VARIABLE", default="/data/ontologies") }}
comparison:
  method: csc
  include_imports: true
cache:
  threads: 3
"#,
        )
        .expect("config");
        assert_eq!(config.sources.root, PathBuf::from("/data/ontologies"));
        assert_eq!(config.comparison.method, ComparisonMethod::Csc);
        assert!(config.comparison.include_imports);
        assert_eq!(config.cache.threads, 3);
    }

    #[test]
    fn builds_the_import_map() {
        let config = Config::from_str(
            r"
imports:
  canonical: http://bg.org/canonical
  ignored: [http://bg.org/a, http://bg.org/b]
  mappings:
    http://old.org/: http://bg.org/canonical
  missing: silent
",
        )
        .expect("config");
        let map = config.imports.import_map();
        assert_eq!(map.len(), 3);
        assert!(map.is_ignored(&iri("http://bg.org/a")));
        assert_eq!(config.imports.missing, MissingImports::Silent);
    }

    #[test]
    fn rejects_unknown_stages() {
        let err = Config::from_str("normalization:\n  chain: [reticulate]\n").expect_err("bad stage");
        assert!(matches!(err, Error::YAML(_)));
    }
}

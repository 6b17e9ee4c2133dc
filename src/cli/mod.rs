//! Command line entry point.
//!
//! ```sh
//! ontoeval evaluate tests/anatomy.yaml --config config.yaml --tables out/
//! ontoeval compare model.yaml student.yaml --method csc --class http://x.org/o#Heart
//! ontoeval check-imports student.yaml --config config.yaml
//! ```

use std::{collections::BTreeSet, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::{
    boot::{self, EvalContext},
    comparison::{Comparator, ComparisonMethod, OntologyPair},
    config::Config,
    errors::{Error, Result},
    evaluation::{self, TestDescription},
    logger,
    ontology::value_objects::Iri,
};

#[derive(Parser)]
#[command(version, about = "Compare ontology taxonomies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML, rendered through tera)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a group evaluation described by a test file
    Evaluate {
        /// Test description (YAML)
        test: PathBuf,
        /// Write precision, recall and F-measure matrices as CSV into this directory
        #[arg(long)]
        tables: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Compare two ontologies
    Compare {
        /// Ontology under evaluation (IRI or path)
        a: String,
        /// Reference ontology (IRI or path)
        b: String,
        /// Override the configured comparison method (`sc` or `csc`)
        #[arg(short, long)]
        method: Option<ComparisonMethod>,
        /// Restrict the comparison to these classes
        #[arg(long = "class")]
        classes: Vec<Iri>,
        /// Include imported classes
        #[arg(long)]
        include_imports: bool,
    },
    /// Check that remapping imports does not change unsatisfiable classes
    CheckImports {
        /// Ontology to check (IRI or path)
        ontology: String,
    },
}

/// Resolves a command line argument to an ontology IRI. Existing paths become
/// `file://` IRIs.
fn ontology_iri(value: &str) -> Result<Iri> {
    let path = std::path::Path::new(value);
    if path.exists() {
        let absolute = path.canonicalize().map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(Iri::new(format!("file://{}", absolute.display()))?);
    }
    Ok(Iri::new(value)?)
}

async fn evaluate(
    ctx: &EvalContext,
    test: PathBuf,
    tables: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let description = TestDescription::from_file(&test)?;
    let report = evaluation::run_test(ctx, description).await?;
    match format {
        OutputFormat::Text => println!("{report}"),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    if let Some(dir) = tables {
        for path in report.write_tables(&dir)? {
            println!("{} {}", "wrote".green(), path.display());
        }
    }
    if report.failures() > 0 {
        eprintln!(
            "{} {} pair(s) could not be compared",
            "warning:".yellow().bold(),
            report.failures()
        );
    }
    Ok(())
}

async fn compare(
    ctx: &EvalContext,
    comparator: &dyn Comparator,
    a: &Iri,
    b: &Iri,
    classes: BTreeSet<Iri>,
) -> Result<()> {
    let pair = OntologyPair::load(&ctx.cache, a, b).await?;
    let result = if classes.is_empty() {
        comparator.compare(&pair)?
    } else {
        comparator.compare_classes(&pair, &classes)?
    };
    println!("{}", result.method().bold());
    println!("  precision  {:.4}", result.precision());
    println!("  recall     {:.4}", result.recall());
    println!("  {:<10} {:.4}", result.similarity_type(), result.f_measure());
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Evaluate {
            test,
            tables,
            format,
        } => {
            let ctx = boot::create_context(config)?;
            let outcome = evaluate(&ctx, test, tables, format).await;
            ctx.teardown();
            outcome
        }
        Commands::Compare {
            a,
            b,
            method,
            classes,
            include_imports,
        } => {
            let ctx = boot::create_context(config)?;
            let method = method.unwrap_or(ctx.config.comparison.method);
            let comparator =
                method.comparator(include_imports || ctx.config.comparison.include_imports);
            let outcome = compare(
                &ctx,
                &comparator,
                &ontology_iri(&a)?,
                &ontology_iri(&b)?,
                classes.into_iter().collect(),
            )
            .await;
            ctx.teardown();
            outcome
        }
        Commands::CheckImports { ontology } => {
            let ctx = boot::create_context(config)?;
            let uri = ontology_iri(&ontology)?;
            let report =
                evaluation::check_import_neutrality(ctx.cache.loader(), ctx.reasoner.as_ref(), &uri)
                    .await?;
            if report.is_neutral() {
                println!("{}", report.to_string().green());
            } else {
                println!("{}", report.to_string().red());
            }
            ctx.teardown();
            Ok(())
        }
    }
}

/// Parses the command line and runs the selected command.
///
/// # Errors
///
/// Returns the first error of the selected command.
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    logger::init(&config.logger)?;
    run(cli, config).await
}

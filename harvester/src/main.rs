//! Harvest CLI - load a CSV file through a JSON schema
//!
//! ```bash
//! harvest --csv people.csv --schema people.json             # harvest and print saved records
//! harvest --csv people.csv --schema people.json --validate  # check rows only
//! harvest --list-filters                                    # show the filter library
//! ```

use clap::Parser;
use csv_harvester::logs::log_error;
use csv_harvester::{filters::operations_description, Processor, SchemaConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Harvest CSV rows into records through a declarative schema", long_about = None)]
struct Cli {
    /// Input CSV file
    #[arg(long, required_unless_present = "list_filters")]
    csv: Option<PathBuf>,

    /// Schema declaration (JSON)
    #[arg(long, required_unless_present = "list_filters")]
    schema: Option<PathBuf>,

    /// Only validate the rows, do not save them
    #[arg(long)]
    validate: bool,

    /// Output file for saved records (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Show the filters a schema file can use
    #[arg(long)]
    list_filters: bool,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match (&cli.csv, &cli.schema) {
        _ if cli.list_filters => {
            println!("{}", operations_description());
            Ok(())
        }
        (Some(csv), Some(schema)) => cmd_harvest(csv, schema, cli.validate, cli.output.as_deref()),
        _ => Err("both --csv and --schema are required".into()),
    };

    if let Err(e) = result {
        log_error(e.to_string());
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn cmd_harvest(
    csv: &Path,
    schema: &Path,
    validate_only: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (schema, _) = SchemaConfig::from_file(schema)?.into_schema()?;
    let mut processor = Processor::new(Arc::new(schema));
    processor.parse_file(csv)?;

    eprintln!("📄 {}", processor.summary());
    if let Some(labels) = processor.labels() {
        eprintln!("   Columns: {}", labels.join(", "));
    }

    if validate_only {
        return Ok(());
    }

    let saved = processor.save()?;
    let json = serde_json::to_string_pretty(&saved)?;
    write_output(&json, output)?;
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

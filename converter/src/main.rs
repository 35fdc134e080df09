//! Grantmap CLI - convert grant records to Crossref Grant ID XML
//!
//! # Main Commands
//!
//! ```bash
//! grantmap convert --input grants.csv --output grants.xml --config mapping.yaml
//! grantmap convert -i grants.json -o grants.xml -c mapping.yaml --related-works works.csv
//! grantmap validate grants.xml --schema grant_id0.2.0.xsd
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! grantmap parse grants.csv         # Show records as the converter sees them
//! grantmap check-config mapping.yaml
//! grantmap transforms               # Show available field rules and transforms
//! grantmap example-config           # Print an example mapping configuration
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use grantmap::logging::{init_logging, LogConfig};
use grantmap::{
    read_records, Converter, MappingConfig, SchemaValidator, XmllintValidator, EXAMPLE_CONFIG,
};

#[derive(Parser)]
#[command(name = "grantmap")]
#[command(
    about = "Convert grant data from CSV/JSON to Crossref Grant ID XML with related works support",
    long_about = None
)]
struct Cli {
    /// Append logs to this file instead of stdout
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV or JSON file to Grant ID XML
    Convert {
        /// Source data file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output XML file
        #[arg(short, long)]
        output: PathBuf,

        /// YAML mapping configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Related works files (CSV or JSON)
        #[arg(long, num_args = 1..)]
        related_works: Vec<PathBuf>,
    },

    /// Validate an XML document against an XSD schema using xmllint
    Validate {
        /// XML document
        document: PathBuf,

        /// XSD schema
        #[arg(short, long, default_value = "grant_id0.2.0.xsd")]
        schema: PathBuf,

        /// Validator program
        #[arg(long, default_value = grantmap::validation::XMLLINT)]
        validator: String,
    },

    /// Read an input file and print its records as JSON
    Parse {
        /// Input file (CSV or JSON)
        input: PathBuf,

        /// Dotted path to the record list in a JSON object
        #[arg(long)]
        json_root: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a mapping configuration and show the compiled rules
    CheckConfig {
        /// YAML mapping configuration
        config: PathBuf,
    },

    /// Show available field rules and transforms
    Transforms,

    /// Show an example mapping configuration
    ExampleConfig,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_log_file(cli.log.clone());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Error: cannot initialize logging: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            config,
            related_works,
        } => cmd_convert(&input, &output, &config, &related_works),

        Commands::Validate {
            document,
            schema,
            validator,
        } => cmd_validate(&document, &schema, validator),

        Commands::Parse {
            input,
            json_root,
            output,
        } => cmd_parse(&input, json_root.as_deref(), output.as_deref()),

        Commands::CheckConfig { config } => cmd_check_config(&config),

        Commands::Transforms => cmd_transforms(),

        Commands::ExampleConfig => cmd_example_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_convert(
    input: &Path,
    output: &Path,
    config: &Path,
    related_works: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut converter = Converter::from_config_file(config)?;
    let summary = converter.convert_file(input, output, related_works)?;

    eprintln!("✅ Converted: {} grants", summary.processed);
    if summary.failed > 0 {
        eprintln!("⚠️  Skipped: {} records (see log)", summary.failed);
    }
    if summary.related_works > 0 {
        eprintln!("   Related works indexed: {}", summary.related_works);
    }
    eprintln!("💾 Output written to: {}", summary.output.display());
    Ok(())
}

fn cmd_validate(
    document: &Path,
    schema: &Path,
    validator: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = XmllintValidator::new(validator).validate(document, schema)?;

    if report.valid {
        println!(
            "✓ XML file '{}' is valid against the schema",
            document.display()
        );
        return Ok(());
    }

    println!(
        "✗ XML file '{}' is NOT valid against the schema",
        document.display()
    );
    println!("\nValidation errors:");
    for issue in &report.errors {
        println!("  Line {}: {}", issue.line, issue.message);
    }
    std::process::exit(1);
}

fn cmd_parse(
    input: &Path,
    json_root: Option<&str>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());

    let records = read_records(input, json_root)?;
    eprintln!("✅ Read {} records", records.len());

    let json: Vec<serde_json::Value> = records.iter().map(serde_json::Value::from).collect();
    let content = serde_json::to_string_pretty(&json)?;

    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = MappingConfig::load(path)?;

    println!("✅ Configuration is valid: {}", path.display());
    println!("\nField mappings:");
    for (field, rule) in config.fields.describe() {
        println!("  {:<18} <- {}", field, rule);
    }
    println!("  {:<18} = {}", "funding-type", config.fields.funding_type);

    let related = &config.related_works;
    println!("\nRelated works:");
    println!("  join key: {}", related.join_key);
    match &related.embedded_field {
        Some(field) => println!("  embedded: {} ({})", field, related.doi_field),
        None => println!("  embedded: disabled"),
    }
    Ok(())
}

fn cmd_transforms() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", grantmap::transforms_description());
    Ok(())
}

fn cmd_example_config() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", EXAMPLE_CONFIG);
    Ok(())
}

//! Resource Model CLI
//!
//! Command-line interface for generating and checking resource models.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use resource_model::{
    check_source, generate, load_document_auto, CheckStatus, ConfigError, GeneratorConfig,
    OpenApiDocument, Severity,
};
use tracing::warn;

#[derive(Parser)]
#[command(name = "resource-model")]
#[command(about = "Generate canonical resource models from an OpenAPI document")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build resource models and print them as JSON
    Generate {
        /// OpenAPI document: file path or URL (http:// or https://)
        document: String,

        /// Generator config (JSON or YAML)
        #[arg(long, short)]
        config: PathBuf,

        /// Only build the named resource (repeatable)
        #[arg(long = "resource", short = 'r')]
        resources: Vec<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check a config against a document without generating
    Check {
        /// OpenAPI document: file path or URL (http:// or https://)
        document: String,

        /// Generator config (JSON or YAML)
        #[arg(long, short)]
        config: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_model=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            document,
            config,
            resources,
            output,
            pretty,
        } => run_generate(&document, &config, &resources, output, pretty),

        Commands::Check {
            document,
            config,
            format,
            strict,
        } => run_check(&document, &config, &format, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_config(path: &Path) -> Result<GeneratorConfig, u8> {
    GeneratorConfig::load(path).map_err(|e| {
        eprintln!("Error: {}", e);
        if let ConfigError::Invalid { errors } = &e {
            for issue in errors {
                eprintln!("  {}", issue);
            }
        }
        e.exit_code() as u8
    })
}

fn run_generate(
    source: &str,
    config_path: &Path,
    only: &[String],
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let config = load_config(config_path)?;

    let root = load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let document = OpenApiDocument::new(root);

    let report = generate(&document, &config, only);
    for collision in &report.collisions {
        warn!(
            requested = %collision.requested,
            assigned = %collision.assigned,
            path = %collision.path,
            "nested type name collision"
        );
    }

    let value = report.to_json();
    let json_output = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    if report.is_ok() {
        Ok(())
    } else {
        for failure in &report.failures {
            eprintln!("Error: {}", failure);
        }
        Err(2)
    }
}

fn run_check(source: &str, config_path: &Path, format: &str, strict: bool) -> Result<(), u8> {
    let config = load_config(config_path)?;
    let result = check_source(source, &config, strict);

    if format == "json" {
        let json_output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", json_output);
    } else {
        println!("Checking {} against {} ...\n", config_path.display(), source);

        for diag in &result.diagnostics {
            print_diagnostic(diag.severity, &diag.code, &diag.path, &diag.message);
        }

        for resource in &result.results {
            let status_icon = match resource.status {
                CheckStatus::Ok => "\x1b[32m✓\x1b[0m",
                CheckStatus::Warning => "\x1b[33m⚠\x1b[0m",
                CheckStatus::Error => "\x1b[31m✗\x1b[0m",
            };
            println!("  {} {}", status_icon, resource.resource);

            for diag in &resource.diagnostics {
                print_diagnostic(diag.severity, &diag.code, &diag.path, &diag.message);
            }
        }

        println!();
        if result.passes(strict) {
            println!(
                "\x1b[32m✓ {} resources checked, all passed\x1b[0m",
                result.resources_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} resources checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.resources_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.passes(strict) {
        Ok(())
    } else {
        Err(1)
    }
}

fn print_diagnostic(severity: Severity, code: &str, path: &str, message: &str) {
    let (color, label) = match severity {
        Severity::Error => ("\x1b[31m", "error"),
        Severity::Warning => ("\x1b[33m", "warning"),
    };
    println!("    {}{}[{}]\x1b[0m: {} - {}", color, label, code, path, message);
}

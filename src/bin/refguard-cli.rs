//! Refguard CLI - validate documents described by a JSON manifest
//!
//! Loads schemas, store contents and a document from a manifest, installs
//! reference validators and reports per-field failures.

use anyhow::Result;
use clap::{Parser, Subcommand};
use refguard::ValidateError;
use refguard::manifest::load_manifest;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "refguard")]
#[command(about = "Check that document references point at existing documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the document in a manifest
    Check {
        /// Path to the manifest file
        manifest: PathBuf,

        /// Run with reference checks disabled
        #[arg(long)]
        disabled: bool,

        /// Override the manifest's duplicate tolerance
        #[arg(long)]
        allow_duplicates: bool,
    },

    /// Print the validator configuration a manifest resolves to
    Config {
        /// Path to the manifest file
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            manifest,
            disabled,
            allow_duplicates,
        } => {
            let mut manifest = load_manifest(&manifest)?;
            if allow_duplicates {
                manifest.config.allow_duplicates = true;
            }

            let scenario = manifest.build()?;
            if disabled {
                scenario.validator.disable();
            }

            match scenario.validate().await {
                Ok(()) => {
                    println!("Document is valid");
                    Ok(ExitCode::SUCCESS)
                }
                Err(ValidateError::Invalid(errors)) => {
                    println!("Document is invalid:");
                    for error in errors.iter() {
                        println!("  {}: {}", error.path, error.message);
                    }
                    Ok(ExitCode::FAILURE)
                }
                Err(err) => Err(err.into()),
            }
        }

        Commands::Config { manifest } => {
            let manifest = load_manifest(&manifest)?;
            println!("{}", serde_json::to_string_pretty(&manifest.config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

//! Command-line interface for stackplan.
//!
//! Thin surface over the library's operation entry points: each
//! subcommand loads the project document, runs one operation, and writes
//! the resulting configuration document to stdout or a file. All
//! provisioning semantics live in the library.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::operations;
use crate::project::Project;
use crate::registry::ServiceRegistry;
use crate::stack::StackDocument;

/// Declarative service descriptions turned into provisioning plans.
#[derive(Parser, Debug)]
#[command(name = "stackplan", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the deployment plan for an environment
    Deploy(OperationArgs),
    /// Compute the teardown plan for an environment
    Destroy(OperationArgs),
    /// Compute the bootstrap plan (state backend) for an environment
    Setup(OperationArgs),
    /// Validate the project document without running an operation
    Validate {
        /// Path to the project document
        #[arg(short, long, default_value = "stackplan.yml")]
        project: PathBuf,
    },
}

#[derive(Args, Debug)]
struct OperationArgs {
    /// Path to the project document
    #[arg(short, long, default_value = "stackplan.yml")]
    project: PathBuf,

    /// Environment to operate on
    #[arg(short, long)]
    environment: String,

    /// Write the resulting document to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    /// Execute the parsed command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            Command::Deploy(args) => {
                let project = Project::from_yaml_file(&args.project)?;
                emit(operations::deployment(&project, &args.environment)?, args.output)
            }
            Command::Destroy(args) => {
                let project = Project::from_yaml_file(&args.project)?;
                emit(operations::destruction(&project, &args.environment)?, args.output)
            }
            Command::Setup(args) => {
                let project = Project::from_yaml_file(&args.project)?;
                emit(operations::setup(&project, &args.environment)?, args.output)
            }
            Command::Validate { project } => {
                let document = Project::from_yaml_file(&project)?;
                let registry = ServiceRegistry::standard()?;
                document.validate(&registry)?;
                println!("Project document is valid");
                Ok(())
            }
        }
    }
}

fn emit(document: StackDocument, output: Option<PathBuf>) -> Result<()> {
    let rendered = document.to_json()?;
    match output {
        Some(path) => std::fs::write(&path, rendered)
            .with_context(|| format!("Cannot write output file: {}", path.display())),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

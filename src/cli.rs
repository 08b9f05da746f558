// ABOUTME: Command-line interface definitions for the svgrad binary.
// ABOUTME: Declares the run, parse, apply, and demo subcommands with clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "svgrad",
    version,
    about = "Apply gradients to SVG shapes from natural-language prompts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the two-agent crew over an input SVG and write the result.
    Run(RunArgs),
    /// Parse a prompt into a gradient config and print it.
    Parse {
        prompt: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Apply a prompt to an SVG file without any agents.
    Apply {
        prompt: String,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        gradient_id: Option<String>,
    },
    /// Write the sample input SVG.
    Demo {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Input SVG (default: SVGRAD_INPUT or input.svg).
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Output SVG (default: SVGRAD_OUTPUT or output.svg).
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Gradient request in plain language.
    #[arg(long)]
    pub prompt: Option<String>,
    /// openai, anthropic, or direct.
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub max_iterations: Option<usize>,
    #[arg(long)]
    pub gradient_id: Option<String>,
    /// Also write the crew output as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Write the sample SVG to the input path before running.
    #[arg(long, default_value_t = false)]
    pub demo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

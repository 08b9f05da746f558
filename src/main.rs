// ABOUTME: Entry point for the svgrad binary.
// ABOUTME: Loads .env, initializes tracing, parses CLI arguments, and dispatches subcommands.

mod cli;
mod config;

use anyhow::Context;
use clap::Parser;

use svgrad_agent::{
    CrewOptions, DEMO_PROMPT, PipelineRequest, create_runtime, run_pipeline, write_demo_svg,
    write_file,
};
use svgrad_core::{GradientConfig, apply_gradient, parse_gradient_prompt, validate_svg};

use crate::cli::{Cli, Command, OutputFormat, RunArgs};
use crate::config::{SvgradConfig, parse_max_iterations, validate_gradient_id, validate_provider};

const DEFAULT_LOG_FILTER: &str = "svgrad=info,svgrad_agent=info,svgrad_core=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(err) = dispatch(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn load_config() -> anyhow::Result<SvgradConfig> {
    SvgradConfig::from_env().context("invalid configuration")
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => run(load_config()?, args).await,
        Command::Parse { prompt, format } => {
            let parsed = parse_gradient_prompt(&prompt);
            println!("{}", render_config(&parsed, format)?);
            Ok(())
        }
        Command::Apply {
            prompt,
            input,
            output,
            gradient_id,
        } => {
            let config = load_config()?;
            let input = input.unwrap_or(config.input);
            let output = output.unwrap_or(config.output);
            let gradient_id = gradient_id.unwrap_or(config.gradient_id);
            validate_gradient_id(&gradient_id)?;

            let svg = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let parsed = parse_gradient_prompt(&prompt);
            let applied = apply_gradient(&svg, &parsed, &gradient_id)?;
            validate_svg(&applied.svg)?;

            write_file(&output, &applied.svg)?;
            tracing::info!(
                path = %output.display(),
                shapes_updated = applied.shapes_updated,
                "applied gradient"
            );
            if applied.shapes_updated == 0 {
                tracing::warn!(shape = %parsed.target_shape, "no matching shapes in input");
            }
            println!("{}", output.display());
            Ok(())
        }
        Command::Demo { path } => {
            let path = match path {
                Some(path) => path,
                None => load_config()?.input,
            };
            write_demo_svg(&path)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

async fn run(config: SvgradConfig, args: RunArgs) -> anyhow::Result<()> {
    let provider = match args.provider {
        Some(p) => p.trim().to_ascii_lowercase(),
        None => config.provider,
    };
    validate_provider(&provider)?;

    let max_iterations = match args.max_iterations {
        Some(n) => parse_max_iterations(&n.to_string())?,
        None => config.max_iterations,
    };
    let gradient_id = args.gradient_id.unwrap_or(config.gradient_id);
    validate_gradient_id(&gradient_id)?;

    let input_path = args.input.unwrap_or(config.input);
    if args.demo {
        write_demo_svg(&input_path)?;
        tracing::info!(path = %input_path.display(), "wrote demo input");
    }

    let runtime = create_runtime(&provider, args.model.as_deref().or(config.model.as_deref()))?;
    tracing::info!(
        provider = runtime.provider_name(),
        model = runtime.model_name(),
        "runtime ready"
    );

    let request = PipelineRequest {
        prompt: args.prompt.unwrap_or_else(|| DEMO_PROMPT.to_string()),
        input_path,
        output_path: args.output.unwrap_or(config.output),
        report_path: args.report,
        options: CrewOptions {
            max_iterations,
            gradient_id,
            ..CrewOptions::default()
        },
    };

    let outcome = run_pipeline(runtime, &request).await?;
    eprintln!("Wrote {}", outcome.output_path.display());
    println!("{}", outcome.svg);
    Ok(())
}

fn render_config(config: &GradientConfig, format: OutputFormat) -> anyhow::Result<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(rendered.trim_end().to_string())
}

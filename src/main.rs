mod cli;

use clipforge::{batch, config, controller, exec, llm, packs};
use clipforge_skills::{standard_catalog, Builtins, SkillRegistry};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipforge=trace,clipforge_skills=trace".to_string()
        } else {
            "clipforge=info,clipforge_skills=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Edit {
            instruction,
            input,
            extra,
            output,
            dry_run,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_edit(
                &instruction,
                input,
                extra,
                output,
                dry_run,
                cli.config.as_deref(),
            ))
        }
        Commands::Batch {
            instruction,
            inputs,
            output_dir,
            concurrency,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_batch(
                &instruction,
                inputs,
                output_dir,
                concurrency,
                cli.config.as_deref(),
            ))
        }
        Commands::Skills { json } => list_skills(json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Build the registry (catalog plus configured packs) and the shared
/// controller pieces.
fn build_controller(config: &config::Config) -> Result<controller::EditController> {
    let mut registry = SkillRegistry::new();
    let errors = registry.register_all(standard_catalog());
    for error in &errors {
        tracing::error!(%error, "catalog skill rejected");
    }
    packs::load_packs(&mut registry, &config.packs)?;

    let api_key = std::env::var(&config.model.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        anyhow::bail!(
            "no API key found in ${} (set model.api_key_env to change the variable)",
            config.model.api_key_env
        );
    }
    let provider = llm::OpenAiProvider::new(
        &config.model.name,
        config.model.endpoint.as_deref(),
        api_key,
    );
    let runner = exec::FfmpegRunner::discover(config.engine.ffmpeg_path.as_deref())?;

    Ok(controller::EditController::new(
        Arc::new(registry),
        Arc::new(Builtins::standard()),
        Arc::new(provider),
        Arc::new(runner),
        config.retry.clone(),
        config.engine.clone(),
    ))
}

async fn run_edit(
    instruction: &str,
    input: PathBuf,
    extra: Vec<PathBuf>,
    output: PathBuf,
    dry_run: bool,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }
    for path in &extra {
        if !path.exists() {
            anyhow::bail!("Extra input does not exist: {:?}", path);
        }
    }

    let ctl = build_controller(&config)?;
    let mut inputs = vec![input];
    inputs.extend(extra);
    let job = controller::EditJob {
        instruction: instruction.to_string(),
        inputs,
        output,
    };

    if dry_run {
        let (set, plan) = ctl.preview(&job).await?;
        if !set.interpretation.is_empty() {
            println!("Interpretation: {}", set.interpretation);
        }
        for warning in set.warnings.iter().chain(&plan.warnings) {
            println!("Warning: {warning}");
        }
        println!("\n[DRY RUN] Would execute:");
        println!("ffmpeg {}", plan.to_args().join(" "));
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    let outcome = ctl.run(&job, &cancel).await?;
    if !outcome.interpretation.is_empty() {
        println!("Interpretation: {}", outcome.interpretation);
    }
    for warning in &outcome.warnings {
        println!("Warning: {warning}");
    }
    println!(
        "Done in {} attempt{}: {:?}",
        outcome.attempts,
        if outcome.attempts == 1 { "" } else { "s" },
        outcome.plan.output
    );

    Ok(())
}

async fn run_batch(
    instruction: &str,
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    concurrency: Option<usize>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    for path in &inputs {
        if !path.exists() {
            anyhow::bail!("Input file does not exist: {:?}", path);
        }
    }
    std::fs::create_dir_all(&output_dir)?;

    let ctl = build_controller(&config)?;
    let mut batch_config = config.batch.clone();
    if let Some(n) = concurrency {
        batch_config.concurrency = n.max(1);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling batch");
            ctrl_c.cancel();
        }
    });

    let report = batch::run_batch(
        ctl,
        instruction,
        &inputs,
        &output_dir,
        &batch_config,
        cancel,
    )
    .await;

    println!(
        "\nBatch finished in {:.1}s: {} succeeded, {} failed",
        report.elapsed_secs,
        report.succeeded(),
        report.failed()
    );
    for result in &report.results {
        match &result.error {
            None => println!("  ✓ {} -> {}", result.input.display(), result.output.display()),
            Some(e) => println!("  ✗ {}: {}", result.input.display(), e),
        }
    }

    if report.failed() > 0 {
        anyhow::bail!("{} job(s) failed", report.failed());
    }
    Ok(())
}

fn list_skills(json: bool, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut registry = SkillRegistry::new();
    registry.register_all(standard_catalog());
    packs::load_packs(&mut registry, &config.packs)?;

    if json {
        let defs: Vec<serde_json::Value> = registry
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "category": s.category,
                    "description": s.description,
                    "aliases": s.aliases,
                    "params": s.params,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&defs)?);
        return Ok(());
    }

    println!("Available skills ({}):\n", registry.len());
    for skill in registry.iter() {
        print!("  {}", skill.name);
        if !skill.aliases.is_empty() {
            print!(" (aka {})", skill.aliases.join(", "));
        }
        println!();
        if !skill.description.is_empty() {
            println!("      {}", skill.description);
        }
        for spec in &skill.params {
            let mut line = format!("      - {}: {:?}", spec.name, spec.kind);
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                line.push_str(&format!(" [{min}..{max}]"));
            }
            if spec.required {
                line.push_str(" (required)");
            } else if let Some(default) = &spec.default {
                line.push_str(&format!(" (default {})", default.render()));
            }
            println!("{line}");
        }
    }

    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let mut all_ok = true;
    for tool in ["ffmpeg", "ffprobe"] {
        match which::which(tool) {
            Ok(path) => {
                let version = tool_version(&path).unwrap_or_else(|| "version unknown".to_string());
                println!("✓ {} - {} ({})", tool, path.display(), version);
            }
            Err(_) => {
                all_ok = false;
                println!("✗ {} - not found on PATH", tool);
            }
        }
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

/// First line of `<tool> -version`, e.g. "ffmpeg version 7.1".
fn tool_version(path: &std::path::Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("-version").output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next()?.trim();
    if line.is_empty() {
        return None;
    }
    Some(line.split(" Copyright").next().unwrap_or(line).to_string())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Model: {}", config.model.name);
            println!("  Engine timeout: {}s", config.engine.timeout_secs);
            println!(
                "  Retries: {} decode, {} execution",
                config.retry.decode_retries, config.retry.execution_retries
            );
            println!("  Batch concurrency: {}", config.batch.concurrency);
            println!("  Skill packs: {}", config.packs.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Model: {}", config.model.name);
            println!("  Batch concurrency: {}", config.batch.concurrency);
        }
    }

    Ok(())
}

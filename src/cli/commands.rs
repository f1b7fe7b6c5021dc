//! Handlers for `run`, `list`, `models` and `key`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::{render, Cli, KeyArgs, ListArgs, RunArgs};
use crate::auth::{CredentialResolver, FileCredentialStore};
use crate::config::StepwiseConfig;
use crate::engine::{Engine, EngineContext, EngineOptions};
use crate::error::{Result, StepError};
use crate::provider::http::build_client;
use crate::provider::ProviderProfile;
use crate::script::{find_scripts, Script};
use crate::tools::builtin::all_tools;
use crate::tools::ToolRegistry;
use crate::transcript::TranscriptWriter;
use crate::types::RunTotals;
use crate::util::{NonInteractive, Prompter, StdinPrompter};

fn load_config(cli: &Cli) -> Result<StepwiseConfig> {
    StepwiseConfig::load(cli.config.as_deref(), &crate::provider::ProviderRegistry::builtin())
}

fn prompter(cli: &Cli) -> Arc<dyn Prompter> {
    if cli.non_interactive {
        Arc::new(NonInteractive)
    } else {
        Arc::new(StdinPrompter)
    }
}

fn credentials(config: &StepwiseConfig, prompter: Arc<dyn Prompter>) -> CredentialResolver {
    CredentialResolver::new(Arc::new(FileCredentialStore::new_default()), prompter)
        .with_explicit(config.api_keys.clone())
}

/// Paths named directly, or scripts in the steps directory starting with
/// each pattern. Order follows the arguments; each glob is sorted.
fn resolve_scripts(config: &StepwiseConfig, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let direct = Path::new(pattern);
        let found = if direct.is_file() {
            vec![direct.to_path_buf()]
        } else {
            find_scripts(&config.step_pattern(pattern))?
        };
        if found.is_empty() {
            return Err(StepError::Configuration(format!(
                "no step files match {pattern:?} in {}",
                config.steps_dir.display()
            )));
        }
        for path in found {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

/// Handle `stepwise run <patterns...>`.
pub async fn handle_run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    let files = resolve_scripts(&config, &args.patterns)?;

    let prompter = prompter(cli);
    let client = build_client()?;
    let tools = ToolRegistry::with_tools(all_tools(client.clone(), prompter.clone()));
    let options = EngineOptions {
        progress: config.progress && !cli.no_progress,
        max_tool_rounds: config.max_tool_rounds,
        transcript: (config.transcript && !args.no_transcript)
            .then(|| TranscriptWriter::new(&config.logs_dir)),
        event_sink: Some(render::terminal_sink()),
        ..EngineOptions::default()
    };
    let ctx = EngineContext::new(
        config.model_catalog()?,
        config.provider_registry()?,
        Arc::new(tools),
        credentials(&config, prompter),
    )?
    .with_client(client)
    .with_options(options);

    let mut grand = RunTotals::default();
    for path in &files {
        let script = Script::load(path)?;
        let outcome = Engine::run(&ctx, &script).await?;
        grand.input_tokens += outcome.totals.input_tokens;
        grand.output_tokens += outcome.totals.output_tokens;
        grand.input_cost += outcome.totals.input_cost;
        grand.output_cost += outcome.totals.output_cost;
        grand.requests += outcome.totals.requests;

        if let Some(model) = outcome.model.as_deref() {
            if let Err(e) = config.remember_model(model) {
                warn!(error = %e, "cannot remember model");
            }
        }
    }

    if files.len() > 1 {
        println!("All scripts: {grand}");
    }
    info!(scripts = files.len(), requests = grand.requests, "run complete");
    Ok(())
}

/// Handle `stepwise list [pattern]`.
pub fn handle_list(cli: &Cli, args: &ListArgs) -> Result<()> {
    let config = load_config(cli)?;
    let pattern = config.step_pattern(args.pattern.as_deref().unwrap_or(""));
    let files = find_scripts(&pattern)?;
    if files.is_empty() {
        println!("No step files match {pattern}");
        return Ok(());
    }

    for path in files {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match Script::load(&path) {
            Ok(script) if args.statements => {
                println!("{name}");
                for statement in &script.statements {
                    println!("  {statement}");
                }
            }
            Ok(script) => println!("{name:<24} {}", script.description().unwrap_or("")),
            Err(e) => println!("{name:<24} (unparsable: {e})"),
        }
    }
    Ok(())
}

/// Handle `stepwise models`.
pub fn handle_models(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let catalog = config.model_catalog()?;

    println!(
        "{:<12} {:<32} {:>10} {:>10} {:>10}",
        "Provider", "Model", "Context", "In $/M", "Out $/M"
    );
    for (name, info) in catalog.by_provider() {
        println!(
            "{:<12} {:<32} {:>10} {:>10.2} {:>10.2}",
            info.provider,
            name,
            info.context,
            info.input * 1_000_000.0,
            info.output * 1_000_000.0
        );
    }
    if let Some(last) = &config.last_model {
        println!("\nLast used: {last}");
    }
    Ok(())
}

/// Handle `stepwise key <provider>`.
pub async fn handle_key(cli: &Cli, args: &KeyArgs) -> Result<()> {
    let config = load_config(cli)?;
    let registry = config.provider_registry()?;
    let profile: ProviderProfile = registry
        .profiles()
        .find(|p| p.name.eq_ignore_ascii_case(&args.provider))
        .ok_or_else(|| {
            let known: Vec<&str> = registry.profiles().map(|p| p.name.as_str()).collect();
            StepError::Configuration(format!(
                "unknown provider {}; expected one of {}",
                args.provider,
                known.join(", ")
            ))
        })?
        .clone();

    let resolver = credentials(&config, prompter(cli));
    let name = profile.name.clone();
    tokio::task::spawn_blocking(move || resolver.replace(&profile))
        .await
        .map_err(|e| StepError::Credential(format!("{name}: {e}")))??;
    println!("Stored API key for {name}");
    Ok(())
}

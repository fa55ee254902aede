use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

mod cli;

use chainpilot::bootstrap;
use chainpilot::capabilities::{CapabilityContext, CapabilityRegistry, DryRunPoster, SimulatedWallet, SocialPoster};
use chainpilot::config::Config;
use chainpilot::domain::{LoopExit, LoopReport};
use chainpilot::llm::{LlmClient, OpenAiClient, OpenAiConfig, Usage};
use chainpilot::runner::LoopController;
use chainpilot::status::{self, AppState};
use chainpilot::storage::{Progress, TaskStore};
use cli::Cli;
use cli::commands::Commands;

fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chainpilot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("chainpilot.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_level = if verbose {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: Cli, config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command {
        Commands::Run {
            goal,
            max_iterations,
            serve,
        } => handle_run_command(config, goal, max_iterations, serve).await,
        Commands::Status { limit } => handle_status_command(&config, limit),
        Commands::Capabilities => handle_capabilities_command(&config),
    }
}

async fn handle_run_command(
    mut config: Config,
    goal: Option<String>,
    max_iterations: Option<u64>,
    serve: bool,
) -> Result<()> {
    if let Some(goal) = goal {
        config.agent.initial_goal = goal;
    }
    if max_iterations.is_some() {
        config.agent.max_iterations = max_iterations;
    }
    config.validate()?;

    let store = Arc::new(
        TaskStore::open(config.data_dir())
            .with_context(|| format!("Failed to open task store at {}", config.data_dir().display()))?,
    );
    let client = Arc::new(
        OpenAiClient::new(OpenAiConfig::from(&config.llm), &config.llm.api_key_env)
            .context("Failed to create model client")?,
    );
    let llm: Arc<dyn LlmClient> = client.clone();

    println!("{}", "Provisioning wallet...".cyan());
    let capabilities = bootstrap::provision(&config).await.context("Bootstrap failed")?;
    let details = capabilities.wallet.details();
    println!(
        "{} {} on {} ({})",
        "Wallet:".green(),
        details.id,
        details.network,
        details.address
    );
    let registry = Arc::new(CapabilityRegistry::new(capabilities));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut controller = LoopController::from_config(&config, llm, registry, store.clone(), shutdown_rx.clone())
        .context("Failed to build agent loop")?;

    let server = if serve || config.status.enabled {
        let listener = status::bind(config.status.bind)
            .await
            .with_context(|| format!("Failed to bind status server on {}", config.status.bind))?;
        println!("{} http://{}", "Status API:".green(), listener.local_addr()?);
        let state = AppState::new(store.clone(), config.status.recent_limit).with_snapshot(controller.subscribe());
        Some(tokio::spawn(status::serve(listener, state, shutdown_rx)))
    } else {
        None
    };

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current step");
            signal_tx.send_replace(true);
        }
    });

    println!("{} {}", "Goal:".green(), config.agent.initial_goal);
    let report = controller.run().await;

    // Loop is done; stop the status server too
    shutdown_tx.send_replace(true);
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Status server failed: {}", e),
            Err(e) => warn!("Status server task failed: {}", e),
        }
    }

    print_report(&report, &client.total_usage());
    match report.exit {
        LoopExit::Fatal { stage, message } => Err(eyre::eyre!("Agent loop failed during {}: {}", stage, message)),
        _ => Ok(()),
    }
}

fn print_report(report: &LoopReport, usage: &Usage) {
    let exit = match &report.exit {
        LoopExit::GoalSatisfied { reason } => format!("goal satisfied ({})", reason).green(),
        LoopExit::MaxIterations { iterations } => format!("reached {} iterations", iterations).yellow(),
        LoopExit::Fatal { stage, message } => format!("fatal error in {}: {}", stage, message).red(),
        LoopExit::Shutdown => "shut down".yellow(),
    };
    println!("{} {}", "Stopped:".bold(), exit);
    println!("  Iterations: {}", report.iterations);
    println!("  Final goal: {}", report.final_goal);
    println!(
        "  Tokens: {} ({} in, {} out)",
        usage.total(),
        usage.input_tokens,
        usage.output_tokens
    );
    info!("Token usage: {} in, {} out", usage.input_tokens, usage.output_tokens);
}

fn handle_status_command(config: &Config, limit: Option<usize>) -> Result<()> {
    let progress = if TaskStore::exists(config.data_dir()) {
        let store = TaskStore::open_read_only(config.data_dir())
            .with_context(|| format!("Failed to open task store at {}", config.data_dir().display()))?;
        store
            .progress(limit.unwrap_or(config.status.recent_limit))
            .context("Failed to read progress")?
    } else {
        Progress::default()
    };
    info!("Status: {} tasks recorded", progress.stats.total);
    print!("{}", status::render_progress_text(&progress));
    Ok(())
}

fn handle_capabilities_command(config: &Config) -> Result<()> {
    // Catalogue only; no provisioning needed
    let social: Option<Arc<dyn SocialPoster>> = if config.social.enabled {
        Some(Arc::new(DryRunPoster::default()))
    } else {
        None
    };
    let registry = CapabilityRegistry::new(CapabilityContext {
        wallet: Arc::new(SimulatedWallet::new(config.wallet.network_id.clone())),
        social,
    });
    for descriptor in registry.descriptors() {
        println!("{}", descriptor.name.to_string().cyan());
        println!("  {}", descriptor.description);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging
    setup_logging(&config, cli.is_verbose()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(cli, config).await.context("Application failed")?;

    Ok(())
}

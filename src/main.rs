use anyhow::{Context, Result};
use kara_pipeline::cli::commands::{PlanCommand, RunCommand, ScheduleCommand, ValidateCommand};
use kara_pipeline::cli::output::*;
use kara_pipeline::cli::{Cli, Command};
use kara_pipeline::core::config::PipelineConfig;
use kara_pipeline::{OverlapPolicy, PipelineGraph, Scheduler, ShellCommandRunner, Supervisor};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let ok = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Schedule(cmd) => schedule_pipeline(cmd).await?,
        Command::Plan(cmd) => plan_pipeline(cmd)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn load(file: &str, vars: &[(String, String)]) -> Result<(PipelineConfig, PipelineGraph)> {
    let config = PipelineConfig::from_file(file)
        .with_context(|| format!("Failed to load pipeline config from {}", file))?;
    let mut graph = config.to_pipeline();

    // Apply variable overrides
    for (key, value) in vars {
        graph.set_variable(key.clone(), value.clone());
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    Ok((config, graph))
}

fn supervisor_for(config: &PipelineConfig, graph: &PipelineGraph) -> Supervisor<ShellCommandRunner> {
    let mut supervisor = Supervisor::new(ShellCommandRunner::new(config.runner.clone()));
    let printer = EventPrinter::new(graph.len());
    supervisor.add_event_handler(move |event| println!("{}", printer.format(&event)));
    supervisor
}

/// Flip `cancel` on the first Ctrl-C
fn cancel_on_ctrl_c(cancel: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.send_replace(true);
        }
    });
}

async fn run_pipeline(cmd: &RunCommand) -> Result<bool> {
    let (config, graph) = load(&cmd.file, &cmd.var)?;
    println!("{} Loaded pipeline: {}", INFO, style(graph.name()).bold());

    let supervisor = supervisor_for(&config, &graph);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_on_ctrl_c(cancel_tx);

    println!();
    let report = supervisor.run_with_cancel(&graph, cancel_rx).await;
    println!("{}", format_report(&report));

    if report.is_success() {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(graph.name()).bold(),
            style("successfully").green()
        );
        Ok(true)
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(graph.name()).bold(),
            format_run_state(&report.state)
        );
        Ok(false)
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<bool> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Variables: {}", style(config.variables.len()).cyan());
            if let Some(schedule) = &config.schedule {
                println!(
                    "  Schedule: {} ({})",
                    style(&schedule.cron).cyan(),
                    style(&schedule.timezone).dim()
                );
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(true)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            Ok(false)
        }
    }
}

fn plan_pipeline(cmd: &PlanCommand) -> Result<bool> {
    let (config, graph) = load(&cmd.file, &cmd.var)?;

    println!("{} Plan for {}", INFO, style(graph.name()).bold());
    if let Some(description) = graph.description() {
        println!("  {}", style(description).dim());
    }
    println!("{}", format_plan(&graph));

    if let Some(spec) = config.schedule_spec() {
        let compiled = spec.compile()?;
        println!(
            "\n{} Schedule {} ({})",
            CLOCK,
            style(&spec.expression).cyan(),
            style(&spec.timezone).dim()
        );
        for at in compiled.upcoming(chrono::Utc::now(), cmd.upcoming) {
            println!("  {}", at.to_rfc3339());
        }
    }
    Ok(true)
}

async fn schedule_pipeline(cmd: &ScheduleCommand) -> Result<bool> {
    let (config, graph) = load(&cmd.file, &cmd.var)?;
    let Some(spec) = config.schedule_spec() else {
        println!(
            "{} Pipeline {} has no schedule section",
            CROSS,
            style(graph.name()).bold()
        );
        return Ok(false);
    };

    let policy = cmd
        .overlap
        .map(OverlapPolicy::from)
        .or_else(|| config.schedule.as_ref().map(|s| s.overlap))
        .unwrap_or_default();

    let name = graph.name().to_string();
    let supervisor = Arc::new(supervisor_for(&config, &graph));
    let scheduler = Scheduler::new(supervisor, policy);
    scheduler
        .register(graph, &spec)
        .context("Failed to register schedule")?;

    info!(pipeline = %name, ?policy, "Scheduler started");
    if let Some(next) = scheduler.next_fire(&name) {
        println!(
            "{} {} scheduled, next run at {}",
            CLOCK,
            style(&name).bold(),
            style(next.to_rfc3339()).cyan()
        );
    }

    if cmd.run_now {
        let dispatch = scheduler.trigger(&name)?;
        if let Some(report) = dispatch.report().await {
            println!("{}", format_report(&report));
            if !report.is_success() {
                error!(pipeline = %name, state = ?report.state, "Initial run did not succeed");
            }
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    warn!(pipeline = %name, "Interrupt received, stopping scheduler");
    scheduler.shutdown();
    Ok(true)
}

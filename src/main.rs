//! AutoPattern: binary entrypoint.
//! Converts a recorded workflow (CSV export) into a task description and replays
//! it with the browser agent, or serves the same pipeline over HTTP.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use autopattern::config::settings::SettingsHandle;
use autopattern::config::Config;
use autopattern::dispatch::{AgentSettings, AutomationRunner, CommandAgent};
use autopattern::hitl::HumanLoop;
use autopattern::synth::{build_chat_model, workflow_plan, GenerationError, Synthesizer};
use autopattern::telemetry::Metrics;
use autopattern::{api, WorkflowLoader};

#[derive(Parser, Debug)]
#[command(
    name = "autopattern",
    version,
    about = "Convert recorded workflows to automated browser actions"
)]
#[command(group(ArgGroup::new("mode").required(true).args(["workflow", "task", "server"])))]
struct Cli {
    /// Path to CSV workflow export file
    #[arg(long)]
    workflow: Option<PathBuf>,

    /// Direct task description to execute (skips LLM generation)
    #[arg(long)]
    task: Option<String>,

    /// Run as API server for extension integration
    #[arg(long)]
    server: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 5001)]
    port: u16,

    /// Workflow id to process (defaults to the first one in the file)
    #[arg(long)]
    workflow_id: Option<String>,

    /// Print the structured step plan instead of a free-text description
    #[arg(long)]
    plan: bool,

    /// Generate the task description but don't execute it
    #[arg(long)]
    dry_run: bool,

    /// Run browser in headless mode
    #[arg(long)]
    headless: bool,

    #[arg(short, long)]
    verbose: bool,
}

/// `RUST_LOG` wins; otherwise info (debug with --verbose) for this crate.
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "autopattern=debug,info"
    } else {
        "autopattern=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = ?e, "fatal");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::from_env();
    if cli.headless {
        config.headless = true;
    }

    if cli.server {
        serve(config, &cli.host, cli.port).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let settings = SettingsHandle::load(&config)?.snapshot();

    let task = if let Some(task) = cli.task.clone() {
        println!("Task: {task}");
        task
    } else {
        let path = cli.workflow.clone().context("--workflow is required")?;
        let workflow = WorkflowLoader::new(&path)?.load_single(cli.workflow_id.as_deref())?;
        println!("Loaded workflow: {}", workflow.workflow_id());
        println!("  events:    {}", workflow.events().len());
        println!("  start url: {}", workflow.start_url());
        if cli.verbose {
            println!("\nWorkflow summary:\n{}", workflow.summary());
        }

        let synth = build_chat_model(&config).map(|chat| {
            Synthesizer::new(chat, settings.analysis_model.clone())
                .with_fallback(config.description_fallback)
        });
        if cli.plan {
            let plan = workflow_plan(synth.as_ref(), &workflow).await;
            println!("\n{}", serde_json::to_string_pretty(&plan)?);
            plan.to_task_text()
        } else {
            let synth = synth.ok_or(GenerationError::MissingCredential)?;
            let task = synth.generate_task_description(&workflow).await?;
            println!("\nGenerated task description:\n  {task}");
            task
        }
    };

    if cli.dry_run {
        println!("\nDry run: skipping automation");
        return Ok(ExitCode::SUCCESS);
    }

    let mut runner = AutomationRunner::new(
        Arc::new(CommandAgent::new(
            config.agent_command.clone(),
            config.agent_args.clone(),
        )),
        AgentSettings {
            model: settings.llm_model.clone(),
            headless: config.headless || settings.headless,
        },
    );
    if settings.enable_human_in_loop {
        // no operator channel on the CLI; questions resolve to the default answer
        runner = runner.with_human_loop(HumanLoop::new(config.human_loop_timeout));
    }

    let result = runner
        .run_task_with_timeout(&task, config.automation_timeout)
        .await;
    if result.success {
        println!("\nAutomation completed successfully");
        if cli.verbose {
            if let Some(steps) = result.history.as_ref().and_then(|h| h.as_array()) {
                for (i, step) in steps.iter().enumerate() {
                    println!("  {}. {step}", i + 1);
                }
            }
        }
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "\nAutomation failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        Ok(ExitCode::FAILURE)
    }
}

async fn serve(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let metrics = Metrics::init()?;
    let state = api::AppState::from_config(config)?;
    let app = api::router(state).merge(metrics.router());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "automation API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("server error")
}

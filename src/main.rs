use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ocihunt::config::{Config, ConfigCheck};
use ocihunt::daemon::{self, DaemonContext};
use ocihunt::domain::{DomainId, Event, EventLevel, RunState};
use ocihunt::events::LogPage;
use ocihunt::ipc::{DaemonResponse, Events, IpcClient};
use ocihunt::provider::{RawResponse, ScriptedProvider};
use ocihunt::runner::{DomainList, Engine, RunConfig, StatusSnapshot};
use ocihunt::storage::MemorySink;

mod cli;

use cli::{Cli, Commands};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocihunt")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ocihunt.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn print_event(event: &Event) {
    let time = event.timestamp.format("%H:%M:%S").to_string().dimmed();
    let message = match event.level {
        EventLevel::Info => event.message.normal(),
        EventLevel::Warn => event.message.yellow(),
        EventLevel::Error => event.message.red(),
        EventLevel::Success => event.message.green().bold(),
    };
    println!("{} {}", time, message);
}

fn print_state(state: RunState) -> ColoredString {
    match state {
        RunState::Succeeded => state.as_str().green().bold(),
        RunState::Failed => state.as_str().red().bold(),
        RunState::Running | RunState::Stopping => state.as_str().cyan(),
        RunState::Idle | RunState::Stopped => state.as_str().normal(),
    }
}

fn print_check(check: &ConfigCheck) {
    for (field, present) in &check.fields {
        let mark = if *present { "✓".green() } else { "✗".red() };
        println!("  {} {}", mark, field);
    }
    if check.missing.is_empty() {
        println!("{}", "Configuration complete".green());
    } else {
        println!("{} {}", "Missing:".red(), check.missing.join(", "));
    }
}

/// Print events of an in-process engine until its run ends.
async fn drive(engine: Engine, run: RunConfig) -> Result<RunState> {
    let mut events = engine.subscribe();
    engine.start(run)?;

    let mut interrupted = false;
    let state = loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => print_event(&event),
                    None => break engine.state(),
                }
            }
            state = engine.wait() => {
                while let Some(event) = events.try_recv() {
                    print_event(&event);
                }
                break state;
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                println!("{}", "Stopping after the current attempt...".yellow());
                let _ = engine.stop();
            }
        }
    };

    let snapshot = engine.snapshot();
    println!("{} {}", "Finished:".bold(), print_state(state));
    println!("  {}", snapshot.summary());
    if events.missed() > 0 {
        println!("  {} events were dropped from this view", events.missed());
    }
    Ok(state)
}

fn finish(state: RunState) -> Result<()> {
    match state {
        RunState::Failed => Err(eyre!("Run failed")),
        _ => Ok(()),
    }
}

async fn handle_run(config: &Config) -> Result<()> {
    let run = config.run_config().context("Cannot start run")?;
    let ctx = DaemonContext::from_config(config.clone());
    info!("Running in foreground, results go to {}", config.storage.result_path.display());
    finish(drive(ctx.engine, run).await?)
}

async fn handle_simulate(config: &Config, capacity_failures: u32, interval: u64, fatal: bool) -> Result<()> {
    let mut script: Vec<RawResponse> = (0..capacity_failures).map(|_| RawResponse::out_of_capacity()).collect();
    script.push(if fatal {
        RawResponse::service_error(
            401,
            "NotAuthenticated",
            "The required information to complete authentication was not provided.",
        )
    } else {
        RawResponse::launched(json!({
            "data": {
                "id": "ocid1.instance.oc1.simulated",
                "display-name": config.oci.display_name,
                "shape": config.shape.name,
                "lifecycle-state": "PROVISIONING"
            }
        }))
    });

    let provider = Arc::new(ScriptedProvider::new(script).with_delay(Duration::from_millis(200)));
    let engine = Engine::new(provider, Arc::new(MemorySink::new()), config.engine_config());
    let domains = DomainList::new(config.oci.availability_domains.iter().map(|d| DomainId::new(d.as_str())))?;
    let run = RunConfig::new(domains, config.launch_spec()).with_retry_interval(Duration::from_secs(interval));

    println!("{}", "Simulation: no instance will be created".yellow());
    finish(drive(engine, run).await?)
}

async fn handle_daemon(config: Config, socket: PathBuf) -> Result<()> {
    let check = config.check();
    if !check.is_complete() {
        println!(
            "{} {} (run.start will be rejected until fixed)",
            "Warning: missing config:".yellow(),
            check.missing.join(", ")
        );
    }

    let ctx = Arc::new(DaemonContext::from_config(config));
    println!("{} {}", "Daemon listening on".green(), socket.display());
    daemon::serve(ctx, socket, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    println!("{}", "Daemon stopped".cyan());
    Ok(())
}

fn expect_success(response: DaemonResponse) -> Result<serde_json::Value> {
    match response.error {
        Some(error) => Err(eyre!("{} (code {})", error.message, error.code)),
        None => Ok(response.result.unwrap_or_default()),
    }
}

async fn handle_client(command: &Commands, socket: PathBuf) -> Result<()> {
    let client = IpcClient::with_socket(socket);
    client.connect().await?;

    match command {
        Commands::Start => {
            let result = expect_success(client.start_run().await?)?;
            println!("{} run #{}", "Started".green(), result["run_id"]);
        }
        Commands::Stop => {
            expect_success(client.stop_run().await?)?;
            println!("{}", "Stop requested; the run ends after the current attempt".yellow());
        }
        Commands::Status { json } => {
            let value = client.status().await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                let snapshot: StatusSnapshot = serde_json::from_value(value)?;
                println!("{} {}", "State:".bold(), print_state(snapshot.state));
                println!("  {}", snapshot.summary());
                if let Some(instance) = &snapshot.instance {
                    println!("  {} {}", "Instance:".green(), instance.id);
                }
                if let Some(event) = &snapshot.last_event {
                    print!("  ");
                    print_event(event);
                }
            }
        }
        Commands::Logs { since } => {
            let page: LogPage = serde_json::from_value(client.logs(*since).await?)?;
            for event in &page.events {
                print_event(event);
            }
            info!("Printed {} events (latest seq {})", page.events.len(), page.latest_seq);
        }
        Commands::Watch => {
            client.stream().await?;
            println!("{}", "Watching run events (Ctrl-C to quit)".cyan());
            loop {
                tokio::select! {
                    pushed = client.recv_event() => {
                        let Some(pushed) = pushed else {
                            println!("{}", "Daemon closed the connection".yellow());
                            break;
                        };
                        match pushed.event.as_str() {
                            Events::RUN_EVENT => print_event(&serde_json::from_value(pushed.data)?),
                            Events::RUN_STATE => {
                                let snapshot: StatusSnapshot = serde_json::from_value(pushed.data)?;
                                println!("{} {}", "State:".bold(), print_state(snapshot.state));
                            }
                            Events::RUN_LAGGED => {
                                println!("{} {} events skipped", "Lagging:".yellow(), pushed.data["missed"]);
                            }
                            other => info!("Ignoring pushed event {}", other),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        Commands::ConfigCheck { .. } => {
            let check: ConfigCheck = serde_json::from_value(client.config_check().await?)?;
            print_check(&check);
        }
        Commands::Daemon | Commands::Run | Commands::Simulate { .. } => {
            return Err(eyre!("{:?} is not a client command", command));
        }
    }
    Ok(())
}

async fn run_application(cli: &Cli, config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let socket = cli.socket.clone().unwrap_or_else(|| config.socket_path());

    match &cli.command {
        Commands::Daemon => handle_daemon(config, socket).await,
        Commands::Run => handle_run(&config).await,
        Commands::Simulate {
            capacity_failures,
            interval,
            fatal,
        } => handle_simulate(&config, *capacity_failures, *interval, *fatal).await,
        Commands::ConfigCheck { local: true } => {
            print_check(&config.check());
            Ok(())
        }
        command => handle_client(command, socket).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Credentials usually live in a .env next to the working directory
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => info!("No .env loaded: {}", e),
    }

    // Load configuration
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_env().context("Invalid environment override")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}

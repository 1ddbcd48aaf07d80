use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{BufReader, Stdin};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use cockpit_client::config::file;
use cockpit_client::telemetry::display;
use cockpit_client::voice::find_quick_command;
use cockpit_client::{
    BackendClient, Config, ConsoleSpeech, DashboardClient, Error, Metric, QUICK_COMMANDS,
    SessionOutcome, Source, TelemetrySynchronizer, TelemetryView, VoiceInteractionController,
    VoiceSession, VoiceState,
};

type Console = ConsoleSpeech<BufReader<Stdin>>;

/// Cockpit - live vehicle telemetry dashboard with a voice assistant
#[derive(Parser)]
#[command(name = "cockpit", version, about)]
struct Cli {
    /// Backend REST base URL
    #[arg(long, env = "COCKPIT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Push websocket URL (derived from the backend URL by default)
    #[arg(long, env = "COCKPIT_PUSH_URL")]
    push_url: Option<String>,

    /// Disable the push channel and rely on polling only
    #[arg(long)]
    no_push: bool,

    /// Telemetry poll interval in milliseconds
    #[arg(long, env = "COCKPIT_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Config file (defaults to ~/.config/cockpit/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the dashboard with an interactive voice prompt (default)
    Run,
    /// Show live telemetry only
    Monitor,
    /// Send one command to the assistant and print the answer
    Ask {
        /// Command text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Fetch and print one telemetry snapshot
    Status,
    /// Fetch a single metric (speed, rpm, temperature, fuel, engine-load, throttle, battery)
    Metric {
        /// Metric name
        name: String,
    },
    /// Probe backend health
    Health,
    /// List the quick command catalogue
    QuickCommands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,cockpit_client=info",
        1 => "info,cockpit_client=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            if let Some(kind) = e.downcast_ref::<Error>().and_then(Error::kind) {
                eprintln!("{}", kind.message());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(&config, true).await,
        Command::Monitor => cmd_run(&config, false).await,
        Command::Ask { text } => cmd_ask(&config, &text.join(" ")).await,
        Command::Status => cmd_status(&config).await,
        Command::Metric { name } => cmd_metric(&config, &name).await,
        Command::Health => cmd_health(&config).await,
        Command::QuickCommands => {
            for quick in QUICK_COMMANDS {
                println!("{:<12} {:<14} {}", quick.slug(), quick.label, quick.command);
            }
            Ok(())
        }
    }
}

/// Defaults < config file < env < flags
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            Config::from_sources(file::load_from(path)?, |key| std::env::var(key).ok())?
        }
        None => Config::load()?,
    };

    if let Some(url) = &cli.backend_url {
        config.backend.url.clone_from(url);
    }
    if let Some(url) = &cli.push_url {
        config.backend.push_url = Some(url.clone());
    }
    if cli.no_push {
        config.backend.push_enabled = false;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.telemetry.poll_interval = Duration::from_millis(ms);
    }

    config.validate()?;
    Ok(config)
}

fn console(config: &Config) -> anyhow::Result<Arc<Console>> {
    let interactive = std::io::stdin().is_terminal();
    let mut speech = ConsoleSpeech::new(
        BufReader::new(tokio::io::stdin()),
        interactive,
        config.voice.locale.clone(),
    );

    if config.voice.server_tts {
        let backend = BackendClient::new(&config.backend.url, config.backend.request_timeout)?;
        speech = speech.with_server_tts(backend);
    }

    Ok(Arc::new(speech))
}

/// Dashboard plus optional command prompt, until Ctrl-C or `/quit`
async fn cmd_run(config: &Config, prompt: bool) -> anyhow::Result<()> {
    let speech = console(config)?;
    let client = DashboardClient::start(config, speech.clone())?;
    let renderer = spawn_renderer(client.telemetry(), client.voice());

    if prompt {
        println!("Type a command, /listen, /repeat, /quick <name> or /quit");
        repl(&client, &speech).await?;
    } else {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received shutdown signal");
    }

    client.shutdown().await;
    renderer.abort();
    Ok(())
}

async fn repl(client: &DashboardClient, speech: &Console) -> anyhow::Result<()> {
    let controller = client.controller();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal");
                return Ok(());
            }
            line = speech.read_line() => line?,
        };

        let Some(line) = line else {
            return Ok(());
        };
        let line = line.trim();

        let session = async {
            match line.split_once(' ').map_or((line, ""), |(head, rest)| (head, rest.trim())) {
                ("", _) => None,
                ("/quit" | "/exit", _) => Some(None),
                ("/listen", _) => Some(Some(controller.start_listening().await)),
                ("/repeat", _) => Some(Some(controller.speak_again().await)),
                ("/quick", name) => match find_quick_command(name) {
                    Some(quick) => Some(Some(controller.run_quick_command(quick).await)),
                    None => {
                        println!("Unknown quick command: {name}");
                        None
                    }
                },
                _ => Some(Some(controller.process_command(line).await)),
            }
        };

        // Ctrl-C mid-session drops the session future, which releases speech
        let step = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal");
                return Ok(());
            }
            step = session => step,
        };

        match step {
            Some(None) => return Ok(()),
            Some(Some(SessionOutcome::Rejected(rejection))) => println!("({rejection})"),
            Some(Some(_)) | None => {}
        }
    }
}

/// Print telemetry and voice changes as they are published
fn spawn_renderer(
    mut telemetry: watch::Receiver<TelemetryView>,
    mut voice: watch::Receiver<VoiceSession>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_state = VoiceState::Idle;

        loop {
            tokio::select! {
                changed = telemetry.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let view = telemetry.borrow_and_update().clone();
                    print_view(&view);
                }
                changed = voice.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let session = voice.borrow_and_update().clone();
                    if session.state() != last_state {
                        last_state = session.state();
                        print_session(&session);
                    }
                }
            }
        }
    })
}

fn print_view(view: &TelemetryView) {
    let source = view.source().map_or_else(String::new, |s: Source| format!(" via {s}"));
    println!(
        "{}{source}  {}",
        display::connectivity_label(view.connectivity()),
        dashboard_line(view)
    );

    if let Some(snapshot) = view.snapshot() {
        if display::low_fuel(snapshot) {
            println!("⚠ Low fuel");
        }
        if let Some(error) = snapshot.backend_error() {
            println!("⚠ Backend: {error}");
        }
    }
}

fn dashboard_line(view: &TelemetryView) -> String {
    let snapshot = view.snapshot();

    Metric::ALL
        .iter()
        .filter(|metric| !metric.is_optional() || snapshot.is_some_and(|s| s.get(**metric).is_some()))
        .map(|&metric| {
            let reading = display::reading_or_default(snapshot, metric);
            let text = format!("{} {}", metric.label(), display::format_reading(metric, &reading));
            match display::gauge_fraction(metric, &reading) {
                Some(fraction) => format!("{text} {}", gauge_bar(fraction)),
                None => text,
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Ten-cell bar for a gauge fraction
fn gauge_bar(fraction: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = (fraction * 10.0).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(10 - filled.min(10)))
}

fn print_session(session: &VoiceSession) {
    match session.state() {
        VoiceState::Idle => {
            if let Some(error) = session.error() {
                println!("⚠ {}", error.message());
            }
        }
        VoiceState::Errored => {}
        state => println!("[voice] {state}"),
    }
}

/// One command round trip
async fn cmd_ask(config: &Config, text: &str) -> anyhow::Result<()> {
    let backend = BackendClient::new(&config.backend.url, config.backend.request_timeout)?;
    let controller = VoiceInteractionController::new(console(config)?, Arc::new(backend))
        .with_speak_fallback(config.voice.speak_fallback);

    match controller.process_command(text).await {
        SessionOutcome::Completed { .. } => Ok(()),
        SessionOutcome::Failed(kind) => {
            anyhow::bail!("{kind}: {}", kind.message())
        }
        SessionOutcome::Rejected(rejection) => anyhow::bail!("command rejected: {rejection}"),
    }
}

/// Fetch one snapshot and print it
async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let backend = BackendClient::new(&config.backend.url, config.backend.request_timeout)?;
    let snapshot = backend.fetch_snapshot().await?;

    let synchronizer = TelemetrySynchronizer::new(config.staleness_window());
    synchronizer.submit(snapshot, Source::Poll);
    let view = synchronizer.current();

    if let Some(observed_at) = view.snapshot().and_then(|s| s.observed_at()) {
        println!("Observed at {observed_at}");
    }
    print_view(&view);

    Ok(())
}

async fn cmd_metric(config: &Config, name: &str) -> anyhow::Result<()> {
    let metric: Metric = name.parse()?;
    let backend = BackendClient::new(&config.backend.url, config.backend.request_timeout)?;
    let reading = backend.fetch_metric(metric).await?;

    println!("{}: {}", metric.label(), display::format_reading(metric, &reading));
    Ok(())
}

async fn cmd_health(config: &Config) -> anyhow::Result<()> {
    let backend = BackendClient::new(&config.backend.url, config.backend.request_timeout)?;
    let health = backend.health().await?;

    println!(
        "Backend {} ({}), OBD {}",
        health.status,
        backend.base_url(),
        if health.obd_connected { "connected" } else { "disconnected" }
    );

    if !health.is_healthy() {
        anyhow::bail!("backend reports {}", health.status);
    }
    Ok(())
}

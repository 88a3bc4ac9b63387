//! `cancel-bus` command line.
//!
//! Drives the library from a shell: simulate a timed operation, fetch a JSON
//! document under a deadline, or validate a configuration file.
//!
//! ```text
//!   Ctrl-C ──► Shutdown ──┐
//!   --abort-after-ms ─────┼──► run_with_timeout ──► Outcome ──► exit code
//!   deadline ─────────────┘            │
//!                                      └──► EventBus<CoreEvent> ──► stderr
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use url::Url;

use cancel_bus::config::{load_config, Config};
use cancel_bus::events::{CoreEvent, EventBus, TimeoutSink};
use cancel_bus::http::{FetchRequest, JsonFetcher};
use cancel_bus::lifecycle::{signals, Shutdown};
use cancel_bus::observability::logging;
use cancel_bus::resilience::{run_with_timeout, Outcome, RunOptions};
use cancel_bus::signal::{AbortReason, SignalController};

#[derive(Parser)]
#[command(name = "cancel-bus")]
#[command(about = "Timed operations with cancellation signals", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `observability.log_level`.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated operation under a deadline
    Run {
        /// How long the operation takes.
        #[arg(long)]
        work_ms: u64,

        /// Deadline; defaults to `timeouts.default_ms`.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Abort through an external signal after this long.
        #[arg(long)]
        abort_after_ms: Option<u64>,
    },
    /// Fetch a JSON document under a deadline
    Fetch {
        #[arg(long)]
        url: Url,

        /// Deadline; defaults to `fetch.timeout_ms`.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Validate the configuration and print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    logging::init(level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cancel-bus starting");

    let bus: Arc<EventBus<CoreEvent>> = Arc::new(EventBus::new());
    bus.subscribe_any(|key, event| match event {
        CoreEvent::TimeoutError(notice) => {
            eprintln!("[{key:?}] {} after {:?}", notice.message, notice.timeout);
        }
    });

    let shutdown = Shutdown::new();
    let listener = signals::spawn_listener(shutdown.clone());

    let code = match cli.command {
        Commands::Run {
            work_ms,
            timeout_ms,
            abort_after_ms,
        } => run(&config, &shutdown, bus.clone(), work_ms, timeout_ms, abort_after_ms).await,
        Commands::Fetch { url, timeout_ms } => {
            fetch(&config, &shutdown, bus.clone(), url, timeout_ms).await?
        }
        Commands::CheckConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            ExitCode::SUCCESS
        }
    };

    listener.abort();
    Ok(code)
}

async fn run(
    config: &Config,
    shutdown: &Shutdown,
    bus: Arc<dyn TimeoutSink>,
    work_ms: u64,
    timeout_ms: Option<u64>,
    abort_after_ms: Option<u64>,
) -> ExitCode {
    let mut options = RunOptions::from_config(&config.timeouts)
        .with_signal(shutdown.signal())
        .with_notifier(bus);
    if let Some(ms) = timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }

    let user = SignalController::new();
    options = options.with_signal(user.signal());
    let aborter = abort_after_ms.map(|ms| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            user.abort_with(AbortReason::aborted_with("aborted from the command line"));
        })
    });

    let operation = async move {
        tokio::time::sleep(Duration::from_millis(work_ms)).await;
        Ok::<_, std::convert::Infallible>(work_ms)
    };
    let outcome = run_with_timeout(operation, options).await;

    if let Some(aborter) = aborter {
        aborter.abort();
    }
    report(outcome.map(|ms| format!("finished after {ms}ms")))
}

async fn fetch(
    config: &Config,
    shutdown: &Shutdown,
    bus: Arc<dyn TimeoutSink>,
    url: Url,
    timeout_ms: Option<u64>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut request = FetchRequest::get(url)
        .with_config(&config.fetch)
        .signal(shutdown.signal());
    if let Some(ms) = timeout_ms {
        request = request.timeout(Duration::from_millis(ms));
    }

    let fetcher = JsonFetcher::new(reqwest::Client::new()).with_notifier(bus);
    let outcome: Outcome<Value> = fetcher.fetch(request).await;

    Ok(match outcome {
        Outcome::Success(value) => report(Outcome::Success(serde_json::to_string_pretty(&value)?)),
        Outcome::Failure(error) => report(Outcome::Failure(error)),
    })
}

fn report(outcome: Outcome<String>) -> ExitCode {
    match outcome {
        Outcome::Success(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Outcome::Failure(error) => {
            eprintln!("{} ({})", error, error.kind());
            ExitCode::FAILURE
        }
    }
}

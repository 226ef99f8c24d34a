//! CLI for pubsub-relocate
//!
//! Subcommands:
//! - `move`: relocate every message unattended
//! - `dlr`: review each message and decide to move, discard or quit

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser};
use pubsub_relocate::broker::PubSubBroker;
use pubsub_relocate::config::{
    DESTINATION_TYPE_PUBSUB_TOPIC, RelocationConfig, SOURCE_TYPE_PUBSUB_SUBSCRIPTION, Settings,
    load_config,
};
use pubsub_relocate::relocate::{Console, Handler, OperatorInput, Relocator};
use pubsub_relocate::utils::error::RelocationError;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pubsub-relocate")]
enum Command {
    /// Move every message from the source to the destination
    Move(RunArgs),
    /// Dead-letter review: inspect each message and move, discard or quit
    Dlr {
        #[command(flatten)]
        run: RunArgs,
        /// Re-indent JSON payloads when displaying them
        #[arg(long)]
        pretty_json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Source broker type
    #[arg(long, default_value = SOURCE_TYPE_PUBSUB_SUBSCRIPTION)]
    source_type: String,
    /// Source subscription, e.g. projects/<project>/subscriptions/<name>
    #[arg(long)]
    source: String,
    /// Destination broker type
    #[arg(long, default_value = DESTINATION_TYPE_PUBSUB_TOPIC)]
    destination_type: String,
    /// Destination topic, e.g. projects/<project>/topics/<name>
    #[arg(long)]
    destination: String,
    /// Stop after this many messages (0 = until the source is drained)
    #[arg(long, default_value_t = 0)]
    max_messages: u64,
    /// Seconds to wait for a message before treating the source as drained
    #[arg(long)]
    timeout: Option<u64>,
    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            pubsub_relocate::utils::logging::init("info");
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (run, interactive, pretty_json) = match &cmd {
        Command::Move(run) => (run, false, false),
        Command::Dlr { run, pretty_json } => {
            (run, true, *pretty_json || settings.relocate.pretty_json)
        }
    };
    pubsub_relocate::utils::logging::init(
        run.log_level.as_deref().unwrap_or(&settings.log.level),
    );

    match execute(&settings, run, interactive, pretty_json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(
    settings: &Settings,
    run: &RunArgs,
    interactive: bool,
    pretty_json: bool,
) -> Result<(), RelocationError> {
    let poll_timeout = run.timeout.unwrap_or(settings.relocate.poll_timeout_secs);
    let config = RelocationConfig::new(
        &run.source_type,
        &run.source,
        &run.destination_type,
        &run.destination,
        run.max_messages,
        Duration::from_secs(poll_timeout),
        pretty_json,
    )?;

    let broker = PubSubBroker::connect(
        config.source.full(),
        config.destination.full(),
        &settings.pubsub_options(),
    )
    .map_err(RelocationError::Broker)?;

    let input = interactive.then(OperatorInput::stdin);
    let mut handler = Handler::for_config(&config, input);

    info!(
        "Relocating from {} to {}",
        config.source, config.destination
    );
    let console = Console::stdout();
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received. Cancelling run.");
        } else {
            std::future::pending::<()>().await;
        }
    };

    Relocator::new(&broker, &console, &config)
        .run_until(&mut handler, shutdown)
        .await?;
    Ok(())
}

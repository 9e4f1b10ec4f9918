//! CLI for mq-interceptor
//!
//! Connects to the mapping database and both brokers, then forwards messages
//! until a fatal condition or Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info};

use mq_interceptor::channel::{AmqpChannel, MqChannel};
use mq_interceptor::config::{Settings, load_config};
use mq_interceptor::identity::{Direction, IdentityTranslator, PgMappingStore};
use mq_interceptor::router::{Channels, Router, run_consumer, standard_rules};
use mq_interceptor::supervisor::{BrokerLink, RetryPolicy, dial, supervise};
use mq_interceptor::utils::error::AppError;
use mq_interceptor::utils::logging;

#[derive(Parser)]
#[command(name = "mq-interceptor", version, about = "Bridges the CEGA and LEGA message brokers")]
struct Cli {
    /// Configuration file; defaults to `config/default.*` when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level, overriding `logging.level`
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let settings = match load_config(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(cli.log_level.as_deref().unwrap_or("info"));
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(cli.log_level.as_deref().unwrap_or(&settings.logging.level));
    info!(settings = %settings, "Starting mq-interceptor");

    match run(settings).await {
        Ok(()) => {
            info!("Shutdown signal received. Exiting gracefully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Interceptor stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), AppError> {
    let store = PgMappingStore::connect(&settings.database).await?;
    let translator = IdentityTranslator::new(store);

    let policy = RetryPolicy::from(&settings.supervisor);
    let mut lega = dial(&settings.lega.connection, &settings.tls, &policy).await?;
    let mut cega = dial(&settings.cega.connection, &settings.tls, &policy).await?;

    let cega_consume = AmqpChannel::new(cega.open_channel().await?);
    let lega_consume = AmqpChannel::new(lega.open_channel().await?);
    let channels = Channels {
        cega_consume: Arc::new(cega_consume.clone()),
        cega_publish: publish_channel(&cega).await?,
        lega_consume: Arc::new(lega_consume.clone()),
        lega_publish: publish_channel(&lega).await?,
    };
    let router = Arc::new(Router::new(translator, channels, &settings));

    let mut consumers = JoinSet::new();
    for rule in standard_rules(&settings) {
        let source = match rule.direction {
            Direction::CegaToLega => &cega_consume,
            Direction::LegaToCega => &lega_consume,
        };
        let deliveries = source
            .consume(&rule.queue)
            .await
            .map_err(|source| AppError::Subscribe {
                queue: rule.queue.clone(),
                source,
            })?;
        consumers.spawn(run_consumer(router.clone(), rule, deliveries));
    }
    info!(consumers = consumers.len(), "Waiting for messages. To exit press CTRL+C");

    let outcome = supervise(
        lega.closed(),
        cega.closed(),
        &mut consumers,
        tokio::signal::ctrl_c(),
    )
    .await;
    if outcome.is_ok() {
        consumers.abort_all();
        close(&lega).await;
        close(&cega).await;
    }
    outcome
}

async fn publish_channel(link: &BrokerLink) -> Result<Arc<dyn MqChannel>, AppError> {
    let channel = AmqpChannel::with_confirms(link.open_channel().await?).await?;
    Ok(Arc::new(channel))
}

async fn close(link: &BrokerLink) {
    if let Err(e) = link.connection().close(200, "shutting down").await {
        error!(host = link.host(), error = %e, "Failed to close broker connection");
    }
}

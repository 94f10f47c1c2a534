use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sentrix::broker::{AmqpBroker, Broker};
use sentrix::config::{self, Registry};
use sentrix::reactor::Reactor;
use sentrix::store::{RedisStateStore, StateStore};

/// The central event-processing server of a distributed monitoring
/// platform (spec §1).
#[derive(Debug, Parser)]
#[command(name = "sentrix-server", version)]
struct Cli {
    /// Path to the YAML or JSON configuration file.
    #[arg(long, short = 'c', env = "SENTRIX_CONFIG")]
    config: PathBuf,

    /// Log level filter (e.g. "info", "sentrix=debug").
    #[arg(long, env = "SENTRIX_LOG", default_value = "info")]
    log_level: String,

    /// Shorten intervals and disable pause-on-reconnect (spec §6 test hook).
    /// Overrides the config file's `testing` key when set.
    #[arg(long)]
    testing: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut loaded = config::load(&cli.config)?;
    if cli.testing {
        loaded.testing = true;
    }

    let store_url = loaded.store.url.clone();
    let broker_url = loaded.broker.url.clone();

    let store: Arc<dyn StateStore> = Arc::new(RedisStateStore::connect(&store_url).await?);
    let broker: Arc<dyn Broker> = Arc::new(AmqpBroker::connect(&broker_url).await?);
    let registry = Arc::new(Registry::new(loaded));

    let reactor = Arc::new(Reactor::new(registry, store, broker));
    reactor.run().await;

    Ok(())
}

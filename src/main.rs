//! Markov chat bot server.
//!
//! ```bash
//! markov-chatter --port 8000 --state-file state
//! markov-chatter --import-dir ./export --import-chan general
//! ```

use anyhow::Context;
use clap::Parser;
use markov_chatter::bot::{webhook, Bot};
use markov_chatter::chain::Chain;
use markov_chatter::config::Config;
use markov_chatter::import::import_export;
use markov_chatter::poller::{run_poller, TwitterSource};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "markov_chatter=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate()?;

    let chain = Arc::new(Chain::with_compression(config.prefix, config.compression()));

    if let Some(dir) = &config.import_dir {
        let stats = import_export(dir, config.import_chan.as_deref(), &chain)
            .with_context(|| format!("importing {}", dir.display()))?;
        info!(messages = stats.messages, trained = stats.trained, "imported chat export");
        if let Err(e) = chain.save(&config.state_file) {
            warn!(error = %e, "could not save imported state");
        }
    } else {
        match chain.load(&config.state_file) {
            Ok(stats) => info!(
                prefixes = stats.prefixes,
                "loaded previous state from '{}'",
                config.state_file.display()
            ),
            Err(e) => warn!(
                error = %e,
                "could not load from '{}', this may be expected",
                config.state_file.display()
            ),
        }
    }

    if let Some(twitter) = config.twitter()? {
        let source = Arc::new(TwitterSource::new(
            twitter.consumer_key,
            twitter.consumer_secret,
            twitter.source_user,
        ));
        tokio::spawn(run_poller(source, Arc::clone(&chain), config.poller_config()));
    } else {
        info!("not enabling timeline polling");
    }

    let bot = Arc::new(Bot::new(config.bot_config(), chain));
    webhook::serve(config.listen_addr(), bot)
        .await
        .context("HTTP server failed")?;
    Ok(())
}

//! Example bot entry point
//!
//! Run with:
//! ```bash
//! DISCORD_TOKEN=... cargo run -p concord-client --bin concord-bot
//! ```
//!
//! Configuration is loaded from environment variables or a `.env` file.

use anyhow::Context as _;
use async_trait::async_trait;
use concord_client::{Client, Context, Event, EventHandler, HandlerError};
use concord_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use concord_http::CreateMessage;
use tracing::{debug, error, info};

struct PingBot;

#[async_trait]
impl EventHandler for PingBot {
    async fn on_event(&self, ctx: Context, event: Event) -> Result<(), HandlerError> {
        match event {
            Event::ShardReady {
                shard_id,
                unavailable_guilds,
            } => {
                info!(
                    shard_id,
                    unavailable = unavailable_guilds.len(),
                    "Shard ready"
                );
            }
            Event::AllShardsReady { shard_count } => {
                info!(shard_count, guilds = ctx.cache.stats().guilds, "All shards ready");
            }
            Event::MessageCreate(message) if message.content == "!ping" && !message.author.bot => {
                let reply = CreateMessage::text("pong").reply_to(message.id);
                ctx.http.create_message(message.channel_id, &reply).await?;
            }
            other => debug!(shard_id = ctx.shard_id, event = other.name(), "Event"),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Client failed");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    info!(
        env = ?config.app.env,
        intents = %config.intents,
        "Configuration loaded"
    );

    let client = Client::builder(config)
        .event_handler(PingBot)
        .build()
        .context("failed to build client")?;

    let stopper = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            stopper.shutdown();
        }
    });

    client.start().await?;
    Ok(())
}

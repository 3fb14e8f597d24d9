//! # concord-client
//!
//! One object that wires the REST client, entity cache and shard supervisor
//! together.
//!
//! ```no_run
//! use concord_client::{Client, Context, Event, HandlerError};
//! use concord_common::ClientConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder(ClientConfig::from_env()?)
//!     .event_handler(|_ctx: Context, event: Event| async move {
//!         tracing::info!(event = event.name(), "received");
//!         Ok::<(), HandlerError>(())
//!     })
//!     .build()?;
//! client.start().await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod client;
mod error;

pub use builder::ClientBuilder;
pub use client::Client;
pub use error::{ClientError, ClientResult};

pub use concord_cache::EntityCache;
pub use concord_core::Event;
pub use concord_gateway::{Context, EventHandler, HandlerError, ShardMessenger, ShardState};

//! # concord-gateway
//!
//! Gateway shards for the concord client.
//!
//! ## Layout
//!
//! - **protocol**: frames, op codes, close codes and payloads
//! - **transport**: the duplex frame transport (websocket, or in-memory for tests)
//! - **link**: one shard's connection state machine with heartbeat, resume and backoff
//! - **identify**: the identify concurrency gate shared by all shards
//! - **dispatch**: in-order event processing, cache updates and callback isolation
//! - **supervisor**: starts, restarts and stops every local shard
//!
//! ## Example
//!
//! ```ignore
//! use concord_gateway::{ShardSupervisor, WsConnector};
//!
//! let connector = Arc::new(WsConnector);
//! let supervisor = ShardSupervisor::new(config, connector, http, cache, handler, hook);
//! supervisor.run().await?;
//! ```

mod backoff;
pub mod dispatch;
mod error;
mod heartbeat;
mod identify;
mod link;
mod messenger;
pub mod protocol;
mod session;
mod state;
mod supervisor;
pub mod transport;
mod writer;

pub use backoff::Backoff;
pub use dispatch::{Context, EventDispatcher, EventHandler, HandlerError};
pub use error::{GatewayError, SupervisorError, TransportError};
pub use heartbeat::HeartbeatMonitor;
pub use identify::{IdentifyGate, IdentifyPermit};
pub use link::{DispatchFrame, GatewayLink, LinkConfig, LinkHandle};
pub use messenger::ShardMessenger;
pub use session::{Sequence, Session};
pub use state::ShardState;
pub use supervisor::{ShardPlan, ShardSupervisor};
pub use transport::{Connector, WsConnector};

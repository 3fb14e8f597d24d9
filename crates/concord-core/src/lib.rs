//! # concord-core
//!
//! Domain layer containing the snowflake and intent value objects, cached
//! entities, and the closed set of gateway events.
//! This crate has no dependencies on the transport, HTTP stack or runtime.

pub mod entities;
pub mod error;
pub mod events;
mod serde_ext;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Channel, ChannelKind, Emoji, Guild, Member, MemberData, Message, PermissionOverwrite, Reaction,
    Role, TextChannel, User, VoiceChannel,
};
pub use error::ModelError;
pub use events::{DispatchEvent, Event};
pub use value_objects::{Intents, IntentsParseError, Snowflake, SnowflakeParseError};

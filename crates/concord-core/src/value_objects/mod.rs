//! Value objects - immutable types shared by entities and events

mod intents;
mod snowflake;

pub use intents::{Intents, IntentsParseError};
pub use snowflake::{Snowflake, SnowflakeParseError};

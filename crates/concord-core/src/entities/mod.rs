//! Domain entities - the objects held by the cache

mod channel;
mod guild;
mod member;
mod message;
mod role;
mod user;

pub use channel::{Channel, ChannelKind, PermissionOverwrite, TextChannel, VoiceChannel};
pub use guild::Guild;
pub use member::{Member, MemberData};
pub use message::{Emoji, Message, Reaction};
pub use role::Role;
pub use user::User;

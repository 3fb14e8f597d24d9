//! Gateway protocol definitions
//!
//! Op codes, close codes, the frame envelope and the payloads of
//! non-dispatch frames.

mod close_codes;
mod frame;
mod opcodes;
mod payloads;

pub use close_codes::{close_action, CloseAction, CloseCode};
pub use frame::GatewayFrame;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    RequestGuildMembersPayload, ResumePayload, Status,
};

pub(crate) use payloads::ReadySession;

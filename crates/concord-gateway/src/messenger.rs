use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::protocol::{GatewayFrame, PresenceUpdatePayload, RequestGuildMembersPayload};

/// Commands a shard may send per minute, leaving room for heartbeats
/// within the gateway's limit of 120
const COMMANDS_PER_MINUTE: u32 = 110;

/// Handle for sending gateway commands on one shard
///
/// Commands queue while the shard is reconnecting and go out once the
/// session is established again.
#[derive(Clone)]
pub struct ShardMessenger {
    shard_id: u32,
    commands: mpsc::Sender<GatewayFrame>,
    budget: Arc<DefaultDirectRateLimiter>,
}

impl ShardMessenger {
    pub(crate) fn new(shard_id: u32, commands: mpsc::Sender<GatewayFrame>) -> Self {
        let per_minute = NonZeroU32::new(COMMANDS_PER_MINUTE).unwrap_or(NonZeroU32::MIN);
        Self {
            shard_id,
            commands,
            budget: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub async fn update_presence(
        &self,
        presence: &PresenceUpdatePayload,
    ) -> Result<(), GatewayError> {
        let frame = GatewayFrame::presence_update(presence).map_err(|source| GatewayError::Encode {
            op: "PresenceUpdate",
            source,
        })?;
        self.send(frame).await
    }

    pub async fn request_guild_members(
        &self,
        request: &RequestGuildMembersPayload,
    ) -> Result<(), GatewayError> {
        let frame = GatewayFrame::request_guild_members(request).map_err(|source| {
            GatewayError::Encode {
                op: "RequestGuildMembers",
                source,
            }
        })?;
        self.send(frame).await
    }

    /// Queue a raw frame once the command budget allows it
    pub async fn send(&self, frame: GatewayFrame) -> Result<(), GatewayError> {
        self.budget.until_ready().await;
        self.commands
            .send(frame)
            .await
            .map_err(|_| GatewayError::ShardNotRunning {
                shard_id: self.shard_id,
            })
    }
}

impl fmt::Debug for ShardMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardMessenger")
            .field("shard_id", &self.shard_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Activity, OpCode, Status};
    use concord_core::Snowflake;

    #[tokio::test]
    async fn test_commands_are_queued_as_frames() {
        let (tx, mut rx) = mpsc::channel(4);
        let messenger = ShardMessenger::new(2, tx);

        messenger
            .update_presence(&PresenceUpdatePayload::new(Status::Idle).with_activity(Activity::playing("chess")))
            .await
            .unwrap();
        messenger
            .request_guild_members(&RequestGuildMembersPayload::all(Snowflake::new(9)))
            .await
            .unwrap();

        let presence = rx.recv().await.unwrap();
        assert_eq!(presence.op, OpCode::PresenceUpdate);
        assert_eq!(presence.d["status"], "idle");

        let request = rx.recv().await.unwrap();
        assert_eq!(request.op, OpCode::RequestGuildMembers);
        assert_eq!(request.d["guild_id"], "9");
    }

    #[tokio::test]
    async fn test_stopped_shard_reports_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let messenger = ShardMessenger::new(5, tx);
        let err = messenger
            .send(GatewayFrame::heartbeat(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ShardNotRunning { shard_id: 5 }));
    }
}

//! Gateway intents - the subscription flags sent with Identify
//!
//! Intents decide which dispatch events the service delivers to a shard,
//! and the cache uses them to decide what it may retain.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Gateway intent flags
    ///
    /// Sent as an integer bitmask in the Identify payload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        const GUILDS                        = 1 << 0;
        /// Privileged
        const GUILD_MEMBERS                 = 1 << 1;
        const GUILD_MODERATION              = 1 << 2;
        const GUILD_EMOJIS_AND_STICKERS     = 1 << 3;
        const GUILD_INTEGRATIONS            = 1 << 4;
        const GUILD_WEBHOOKS                = 1 << 5;
        const GUILD_INVITES                 = 1 << 6;
        const GUILD_VOICE_STATES            = 1 << 7;
        /// Privileged
        const GUILD_PRESENCES               = 1 << 8;
        const GUILD_MESSAGES                = 1 << 9;
        const GUILD_MESSAGE_REACTIONS       = 1 << 10;
        const GUILD_MESSAGE_TYPING          = 1 << 11;
        const DIRECT_MESSAGES               = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS      = 1 << 13;
        const DIRECT_MESSAGE_TYPING         = 1 << 14;
        /// Privileged
        const MESSAGE_CONTENT               = 1 << 15;

        /// Intents that must be enabled for the application before use
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();
    }
}

impl Intents {
    /// Every intent that does not require approval
    pub fn non_privileged() -> Self {
        Self::all().difference(Self::PRIVILEGED)
    }

    /// Whether member entries may be retained by the cache
    #[inline]
    pub fn caches_members(&self) -> bool {
        self.contains(Self::GUILD_MEMBERS)
    }

    /// Whether any privileged intent is requested
    #[inline]
    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Names of all flags that are set
    pub fn list(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::non_privileged()
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Error when parsing intents from configuration text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown intent: {0}")]
pub struct IntentsParseError(pub String);

/// Accepts a raw bitmask (`"33281"`) or flag names joined by `|` or `,`
/// (`"GUILDS|GUILD_MESSAGES"`).
impl FromStr for Intents {
    type Err = IntentsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(bits) = s.parse::<u64>() {
            return Ok(Intents::from_bits_truncate(bits));
        }

        let mut intents = Intents::empty();
        for name in s.split(['|', ',']).map(str::trim).filter(|n| !n.is_empty()) {
            let flag = Intents::from_name(&name.to_ascii_uppercase())
                .ok_or_else(|| IntentsParseError(name.to_string()))?;
            intents |= flag;
        }
        Ok(intents)
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Intents::from_bits_truncate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_non_privileged() {
        let default = Intents::default();
        assert!(default.contains(Intents::GUILDS));
        assert!(default.contains(Intents::GUILD_MESSAGES));
        assert!(!default.contains(Intents::GUILD_MEMBERS));
        assert!(!default.contains(Intents::MESSAGE_CONTENT));
        assert!(!default.is_privileged());
    }

    #[test]
    fn test_bit_values() {
        assert_eq!(Intents::GUILDS.bits(), 1);
        assert_eq!(Intents::GUILD_MEMBERS.bits(), 2);
        assert_eq!(Intents::GUILD_MESSAGES.bits(), 512);
        assert_eq!(Intents::MESSAGE_CONTENT.bits(), 32768);
    }

    #[test]
    fn test_parse_names_and_bits() {
        let parsed: Intents = "GUILDS|guild_members, GUILD_MESSAGES".parse().unwrap();
        assert_eq!(
            parsed,
            Intents::GUILDS | Intents::GUILD_MEMBERS | Intents::GUILD_MESSAGES
        );

        let parsed: Intents = "513".parse().unwrap();
        assert_eq!(parsed, Intents::GUILDS | Intents::GUILD_MESSAGES);

        assert!("GUILDS|NOT_A_FLAG".parse::<Intents>().is_err());
    }

    #[test]
    fn test_serialize_as_number() {
        let intents = Intents::GUILDS | Intents::GUILD_MEMBERS;
        assert_eq!(serde_json::to_string(&intents).unwrap(), "3");
        let back: Intents = serde_json::from_str("3").unwrap();
        assert_eq!(back, intents);
    }

    #[test]
    fn test_caches_members() {
        assert!(!Intents::default().caches_members());
        assert!((Intents::GUILDS | Intents::GUILD_MEMBERS).caches_members());
    }
}

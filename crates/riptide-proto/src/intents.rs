//! Intent flags and the intent/event relations.
//!
//! An intent is a capability flag declared at identify time; each flag
//! unlocks a category of events. The relations here are bidirectional:
//! given intents, the reachable events; given wanted events, the minimal
//! intents. Guild-scoped and direct-message-scoped lists are related
//! separately because some events appear in both under different intents.

use std::collections::HashSet;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::events::EventType;

/// A bitmask of capability flags declared at identify time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intents(u64);

impl Intents {
    /// No intents.
    pub const NONE: Self = Self(0);
    /// Guild lifecycle, channels, threads and roles.
    pub const GUILDS: Self = Self(1 << 0);
    /// Guild member joins, updates and removals.
    pub const GUILD_MEMBERS: Self = Self(1 << 1);
    /// Guild bans.
    pub const GUILD_MODERATION: Self = Self(1 << 2);
    /// Guild emoji changes.
    pub const GUILD_EMOJIS: Self = Self(1 << 3);
    /// Guild integration changes.
    pub const GUILD_INTEGRATIONS: Self = Self(1 << 4);
    /// Guild webhook changes.
    pub const GUILD_WEBHOOKS: Self = Self(1 << 5);
    /// Guild invites.
    pub const GUILD_INVITES: Self = Self(1 << 6);
    /// Guild voice state changes.
    pub const GUILD_VOICE_STATES: Self = Self(1 << 7);
    /// Guild presence changes.
    pub const GUILD_PRESENCES: Self = Self(1 << 8);
    /// Messages in guild channels.
    pub const GUILD_MESSAGES: Self = Self(1 << 9);
    /// Reactions in guild channels.
    pub const GUILD_MESSAGE_REACTIONS: Self = Self(1 << 10);
    /// Typing indicators in guild channels.
    pub const GUILD_MESSAGE_TYPING: Self = Self(1 << 11);
    /// Messages in direct-message channels.
    pub const DIRECT_MESSAGES: Self = Self(1 << 12);
    /// Reactions in direct-message channels.
    pub const DIRECT_MESSAGE_REACTIONS: Self = Self(1 << 13);
    /// Typing indicators in direct-message channels.
    pub const DIRECT_MESSAGE_TYPING: Self = Self(1 << 14);
    /// Access to full message content; unlocks no events of its own.
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);

    /// Build an intents value from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether every flag in `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Every event reachable from the flags set in `self`, across both
    /// the guild and direct-message relations.
    #[must_use]
    pub fn events(self) -> HashSet<EventType> {
        let mut events = HashSet::new();
        for (intent, unlocked) in GUILD_RELATION.iter().chain(DM_RELATION) {
            if self.contains(*intent) {
                events.extend(unlocked.iter().copied());
            }
        }
        events
    }

    /// The minimal intents needed to receive `wanted` as guild-scoped
    /// events. Control events contribute nothing.
    #[must_use]
    pub fn for_guild_events(wanted: &[EventType]) -> Self {
        Self::for_events(GUILD_RELATION, wanted)
    }

    /// The minimal intents needed to receive `wanted` as direct-message
    /// events. Control events contribute nothing.
    #[must_use]
    pub fn for_dm_events(wanted: &[EventType]) -> Self {
        Self::for_events(DM_RELATION, wanted)
    }

    fn for_events(relation: &[(Self, &[EventType])], wanted: &[EventType]) -> Self {
        let mut intents = Self::NONE;
        for event in wanted {
            for (intent, unlocked) in relation {
                if unlocked.contains(event) {
                    intents |= *intent;
                }
            }
        }
        intents
    }
}

impl BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Intents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Intents {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Guild-scoped intent → event relation.
const GUILD_RELATION: &[(Intents, &[EventType])] = &[
    (
        Intents::GUILDS,
        &[
            EventType::GuildCreate,
            EventType::GuildUpdate,
            EventType::GuildDelete,
            EventType::GuildRoleCreate,
            EventType::GuildRoleUpdate,
            EventType::GuildRoleDelete,
            EventType::ChannelCreate,
            EventType::ChannelUpdate,
            EventType::ChannelDelete,
            EventType::ChannelPinsUpdate,
            EventType::ThreadCreate,
            EventType::ThreadUpdate,
            EventType::ThreadDelete,
        ],
    ),
    (
        Intents::GUILD_MEMBERS,
        &[
            EventType::GuildMemberAdd,
            EventType::GuildMemberUpdate,
            EventType::GuildMemberRemove,
        ],
    ),
    (
        Intents::GUILD_MODERATION,
        &[EventType::GuildBanAdd, EventType::GuildBanRemove],
    ),
    (Intents::GUILD_EMOJIS, &[EventType::GuildEmojisUpdate]),
    (
        Intents::GUILD_INTEGRATIONS,
        &[EventType::GuildIntegrationsUpdate],
    ),
    (Intents::GUILD_WEBHOOKS, &[EventType::WebhooksUpdate]),
    (
        Intents::GUILD_INVITES,
        &[EventType::InviteCreate, EventType::InviteDelete],
    ),
    (Intents::GUILD_VOICE_STATES, &[EventType::VoiceStateUpdate]),
    (Intents::GUILD_PRESENCES, &[EventType::PresenceUpdate]),
    (
        Intents::GUILD_MESSAGES,
        &[
            EventType::MessageCreate,
            EventType::MessageUpdate,
            EventType::MessageDelete,
            EventType::MessageDeleteBulk,
        ],
    ),
    (
        Intents::GUILD_MESSAGE_REACTIONS,
        &[
            EventType::MessageReactionAdd,
            EventType::MessageReactionRemove,
            EventType::MessageReactionRemoveAll,
            EventType::MessageReactionRemoveEmoji,
        ],
    ),
    (Intents::GUILD_MESSAGE_TYPING, &[EventType::TypingStart]),
];

/// Direct-message-scoped intent → event relation.
const DM_RELATION: &[(Intents, &[EventType])] = &[
    (
        Intents::DIRECT_MESSAGES,
        &[
            EventType::MessageCreate,
            EventType::MessageUpdate,
            EventType::MessageDelete,
            EventType::ChannelPinsUpdate,
        ],
    ),
    (
        Intents::DIRECT_MESSAGE_REACTIONS,
        &[
            EventType::MessageReactionAdd,
            EventType::MessageReactionRemove,
            EventType::MessageReactionRemoveAll,
            EventType::MessageReactionRemoveEmoji,
        ],
    ),
    (Intents::DIRECT_MESSAGE_TYPING, &[EventType::TypingStart]),
];

/// Union of the intents required to receive exactly the requested guild
/// and direct-message event lists.
#[must_use]
pub fn derive_from_event_lists(guild_events: &[EventType], dm_events: &[EventType]) -> Intents {
    Intents::for_guild_events(guild_events) | Intents::for_dm_events(dm_events)
}

/// Whitelisted events that no declared intent unlocks.
///
/// Control events (Ready, Resumed) always pass and are never reported.
/// The result is sorted so callers get deterministic diagnostics.
#[must_use]
pub fn unreachable_events<'a, I>(whitelist: I, intents: Intents) -> Vec<EventType>
where
    I: IntoIterator<Item = &'a EventType>,
{
    let reachable = intents.events();
    let mut missing: Vec<EventType> = whitelist
        .into_iter()
        .copied()
        .filter(|e| !e.is_control() && !reachable.contains(e))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    missing
}

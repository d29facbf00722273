//! The event catalog.
//!
//! Dispatch payloads name their event in the `t` field. The catalog is a
//! closed enumeration so the intent/event relations can be checked
//! exhaustively; names the catalog does not know are dropped by the
//! session rather than delivered as free-form strings.

/// Application events deliverable on a gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    /// Handshake completed; carries the session id and resume URL.
    Ready,
    /// A resume handshake completed and the replay is done.
    Resumed,
    /// A channel was created.
    ChannelCreate,
    /// A channel was updated.
    ChannelUpdate,
    /// A channel was deleted.
    ChannelDelete,
    /// A channel's pinned messages changed.
    ChannelPinsUpdate,
    /// A thread was created.
    ThreadCreate,
    /// A thread was updated.
    ThreadUpdate,
    /// A thread was deleted.
    ThreadDelete,
    /// The client joined a guild, or a guild became available.
    GuildCreate,
    /// A guild was updated.
    GuildUpdate,
    /// The client left a guild, or a guild became unavailable.
    GuildDelete,
    /// A user was banned from a guild.
    GuildBanAdd,
    /// A user was unbanned from a guild.
    GuildBanRemove,
    /// A guild's emojis changed.
    GuildEmojisUpdate,
    /// A guild's integrations changed.
    GuildIntegrationsUpdate,
    /// A member joined a guild.
    GuildMemberAdd,
    /// A guild member was updated.
    GuildMemberUpdate,
    /// A member left a guild.
    GuildMemberRemove,
    /// A role was created.
    GuildRoleCreate,
    /// A role was updated.
    GuildRoleUpdate,
    /// A role was deleted.
    GuildRoleDelete,
    /// An invite was created.
    InviteCreate,
    /// An invite was deleted.
    InviteDelete,
    /// A message was sent.
    MessageCreate,
    /// A message was edited.
    MessageUpdate,
    /// A message was deleted.
    MessageDelete,
    /// Multiple messages were deleted at once.
    MessageDeleteBulk,
    /// A reaction was added to a message.
    MessageReactionAdd,
    /// A reaction was removed from a message.
    MessageReactionRemove,
    /// All reactions were removed from a message.
    MessageReactionRemoveAll,
    /// All reactions of one emoji were removed from a message.
    MessageReactionRemoveEmoji,
    /// A user's presence changed.
    PresenceUpdate,
    /// A user started typing.
    TypingStart,
    /// A user's voice state changed.
    VoiceStateUpdate,
    /// A channel's webhooks changed.
    WebhooksUpdate,
}

impl EventType {
    /// Every event in the catalog.
    pub const ALL: &'static [Self] = &[
        Self::Ready,
        Self::Resumed,
        Self::ChannelCreate,
        Self::ChannelUpdate,
        Self::ChannelDelete,
        Self::ChannelPinsUpdate,
        Self::ThreadCreate,
        Self::ThreadUpdate,
        Self::ThreadDelete,
        Self::GuildCreate,
        Self::GuildUpdate,
        Self::GuildDelete,
        Self::GuildBanAdd,
        Self::GuildBanRemove,
        Self::GuildEmojisUpdate,
        Self::GuildIntegrationsUpdate,
        Self::GuildMemberAdd,
        Self::GuildMemberUpdate,
        Self::GuildMemberRemove,
        Self::GuildRoleCreate,
        Self::GuildRoleUpdate,
        Self::GuildRoleDelete,
        Self::InviteCreate,
        Self::InviteDelete,
        Self::MessageCreate,
        Self::MessageUpdate,
        Self::MessageDelete,
        Self::MessageDeleteBulk,
        Self::MessageReactionAdd,
        Self::MessageReactionRemove,
        Self::MessageReactionRemoveAll,
        Self::MessageReactionRemoveEmoji,
        Self::PresenceUpdate,
        Self::TypingStart,
        Self::VoiceStateUpdate,
        Self::WebhooksUpdate,
    ];

    /// The wire name carried in a dispatch payload's `t` field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::ChannelPinsUpdate => "CHANNEL_PINS_UPDATE",
            Self::ThreadCreate => "THREAD_CREATE",
            Self::ThreadUpdate => "THREAD_UPDATE",
            Self::ThreadDelete => "THREAD_DELETE",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::GuildBanAdd => "GUILD_BAN_ADD",
            Self::GuildBanRemove => "GUILD_BAN_REMOVE",
            Self::GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
            Self::GuildIntegrationsUpdate => "GUILD_INTEGRATIONS_UPDATE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            Self::GuildRoleCreate => "GUILD_ROLE_CREATE",
            Self::GuildRoleUpdate => "GUILD_ROLE_UPDATE",
            Self::GuildRoleDelete => "GUILD_ROLE_DELETE",
            Self::InviteCreate => "INVITE_CREATE",
            Self::InviteDelete => "INVITE_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageDeleteBulk => "MESSAGE_DELETE_BULK",
            Self::MessageReactionAdd => "MESSAGE_REACTION_ADD",
            Self::MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL",
            Self::MessageReactionRemoveEmoji => "MESSAGE_REACTION_REMOVE_EMOJI",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::TypingStart => "TYPING_START",
            Self::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            Self::WebhooksUpdate => "WEBHOOKS_UPDATE",
        }
    }

    /// Look up a catalogued event by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.name() == name)
    }

    /// Whether this is a control-plane event the session itself depends on.
    ///
    /// Control events sit outside the intent system and always pass any
    /// configured event whitelist.
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Ready | Self::Resumed)
    }
}

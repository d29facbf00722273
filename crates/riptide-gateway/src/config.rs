//! Session configuration.
//!
//! Built with the usual `with_*` chain and validated before a session is
//! constructed. Capability flags come either from an explicit intents
//! bitmask or from guild/direct-message event lists to derive them from;
//! supplying both (or neither) is a configuration error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use riptide_proto::{
    derive_from_event_lists, unreachable_events, ConnectionProperties, EventType, Intents,
};

use crate::error::GatewayError;
use crate::limiter::TokenBucket;

/// Guilds above this member count are sent without offline members by
/// default.
pub const DEFAULT_LARGE_THRESHOLD: u8 = 50;

/// Largest accepted `large_threshold`.
pub const MAX_LARGE_THRESHOLD: u8 = 250;

/// Settings for the general outbound-command bucket.
///
/// The gateway enforces a burst ceiling per window; the bucket keeps
/// slots below that ceiling reserved so mandatory heartbeats (plus one
/// contingency beat) can never be starved by commands. Both numbers are
/// service tuning, not structure, so they are configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRateLimit {
    /// The gateway's documented commands-per-window ceiling.
    pub burst_ceiling: u32,
    /// Slots held back from the ceiling for heartbeats.
    pub reserved_heartbeats: u32,
    /// The refill window.
    pub window: Duration,
}

impl Default for CommandRateLimit {
    fn default() -> Self {
        Self {
            burst_ceiling: 120,
            reserved_heartbeats: 3,
            window: Duration::from_secs(60),
        }
    }
}

impl CommandRateLimit {
    /// Tokens actually grantable to commands per window.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.burst_ceiling.saturating_sub(self.reserved_heartbeats)
    }
}

/// Settings for the identify bucket.
///
/// Identify slots are scarce and process-wide on the remote side; denial
/// is surfaced immediately rather than waited out, because the handshake
/// window may expire during a stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifyRateLimit {
    /// Identify attempts grantable per window.
    pub capacity: u32,
    /// The refill window.
    pub window: Duration,
}

impl Default for IdentifyRateLimit {
    fn default() -> Self {
        Self {
            capacity: 1,
            window: Duration::from_secs(5),
        }
    }
}

/// State carried over from an earlier session to resume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorSession {
    /// The session id captured from that session's Ready event.
    pub session_id: String,
    /// The last sequence number that session processed.
    pub sequence: i64,
    /// The resume URL the gateway handed out, if any.
    pub resume_url: Option<String>,
}

/// Configuration for one gateway session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot authentication token.
    pub token: String,
    /// `[shard_index, shard_count]`.
    pub shard: [u32; 2],
    /// Explicit capability flags; mutually exclusive with the event lists.
    pub intents: Option<Intents>,
    /// Guild-scoped events to derive intents from.
    pub guild_events: Vec<EventType>,
    /// Direct-message-scoped events to derive intents from.
    pub dm_events: Vec<EventType>,
    /// Events to deliver to the handler; `None` delivers everything.
    pub event_whitelist: Option<HashSet<EventType>>,
    /// Client properties sent at identify time.
    pub properties: ConnectionProperties,
    /// Whether to request transport-level payload compression.
    pub compress: bool,
    /// Member-count threshold for offline-member-less guilds.
    pub large_threshold: u8,
    /// Initial presence, if any.
    pub presence: Option<Value>,
    /// General command bucket settings.
    pub command_limit: CommandRateLimit,
    /// Identify bucket settings.
    pub identify_limit: IdentifyRateLimit,
    /// A shared identify bucket, for processes running several sessions.
    ///
    /// The remote side paces identify attempts per process, not per
    /// connection; when set, this takes precedence over `identify_limit`.
    pub identify_bucket: Option<Arc<TokenBucket>>,
    /// Prior session to resume instead of identifying fresh.
    pub prior_session: Option<PriorSession>,
}

impl Config {
    /// Create a configuration with defaults for everything but the token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            shard: [0, 1],
            intents: None,
            guild_events: Vec::new(),
            dm_events: Vec::new(),
            event_whitelist: None,
            properties: ConnectionProperties::default(),
            compress: false,
            large_threshold: DEFAULT_LARGE_THRESHOLD,
            presence: None,
            command_limit: CommandRateLimit::default(),
            identify_limit: IdentifyRateLimit::default(),
            identify_bucket: None,
            prior_session: None,
        }
    }

    /// Set the shard index and count.
    #[must_use]
    pub const fn with_shard(mut self, index: u32, count: u32) -> Self {
        self.shard = [index, count];
        self
    }

    /// Declare explicit intents.
    #[must_use]
    pub const fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = Some(intents);
        self
    }

    /// Derive intents from a guild-scoped event list.
    #[must_use]
    pub fn with_guild_events(mut self, events: impl IntoIterator<Item = EventType>) -> Self {
        self.guild_events = events.into_iter().collect();
        self
    }

    /// Derive intents from a direct-message-scoped event list.
    #[must_use]
    pub fn with_dm_events(mut self, events: impl IntoIterator<Item = EventType>) -> Self {
        self.dm_events = events.into_iter().collect();
        self
    }

    /// Deliver only the listed events (Ready and Resumed always pass).
    #[must_use]
    pub fn with_event_whitelist(mut self, events: impl IntoIterator<Item = EventType>) -> Self {
        self.event_whitelist = Some(events.into_iter().collect());
        self
    }

    /// Set the client properties.
    #[must_use]
    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Request transport-level payload compression.
    #[must_use]
    pub const fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set the large-guild member threshold.
    #[must_use]
    pub const fn with_large_threshold(mut self, threshold: u8) -> Self {
        self.large_threshold = threshold;
        self
    }

    /// Set the initial presence.
    #[must_use]
    pub fn with_presence(mut self, presence: Value) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Override the general command bucket settings.
    #[must_use]
    pub const fn with_command_limit(mut self, limit: CommandRateLimit) -> Self {
        self.command_limit = limit;
        self
    }

    /// Override the identify bucket settings.
    #[must_use]
    pub const fn with_identify_limit(mut self, limit: IdentifyRateLimit) -> Self {
        self.identify_limit = limit;
        self
    }

    /// Share one identify bucket across every session in this process.
    #[must_use]
    pub fn with_identify_bucket(mut self, bucket: Arc<TokenBucket>) -> Self {
        self.identify_bucket = Some(bucket);
        self
    }

    /// Resume the given prior session instead of identifying fresh.
    #[must_use]
    pub fn with_prior_session(mut self, prior: PriorSession) -> Self {
        self.prior_session = Some(prior);
        self
    }

    /// The intents this configuration declares, explicit or derived.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when both modes are supplied, or
    /// neither.
    pub fn effective_intents(&self) -> Result<Intents, GatewayError> {
        let has_event_lists = !self.guild_events.is_empty() || !self.dm_events.is_empty();
        match self.intents {
            Some(_) if has_event_lists => Err(GatewayError::Config(
                "explicit intents and event-list derivation are mutually exclusive".to_string(),
            )),
            Some(intents) => Ok(intents),
            None if has_event_lists => {
                Ok(derive_from_event_lists(&self.guild_events, &self.dm_events))
            }
            None => Err(GatewayError::Config(
                "either intents or event lists must be supplied".to_string(),
            )),
        }
    }

    /// Validate the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.token.is_empty() {
            return Err(GatewayError::Config("token cannot be empty".to_string()));
        }

        let [index, count] = self.shard;
        if count == 0 {
            return Err(GatewayError::Config(
                "shard count must be at least 1".to_string(),
            ));
        }
        if index >= count {
            return Err(GatewayError::Config(format!(
                "shard index {index} out of range for count {count}"
            )));
        }

        if self.large_threshold > MAX_LARGE_THRESHOLD {
            return Err(GatewayError::Config(format!(
                "large_threshold {} exceeds maximum {MAX_LARGE_THRESHOLD}",
                self.large_threshold
            )));
        }

        if self.command_limit.capacity() == 0 {
            return Err(GatewayError::Config(
                "command burst ceiling leaves no capacity after heartbeat reservation".to_string(),
            ));
        }
        if self.identify_bucket.is_none() && self.identify_limit.capacity == 0 {
            return Err(GatewayError::Config(
                "identify capacity must be at least 1".to_string(),
            ));
        }

        let intents = self.effective_intents()?;
        if let Some(whitelist) = &self.event_whitelist {
            let missing = unreachable_events(whitelist.iter(), intents);
            if !missing.is_empty() {
                return Err(GatewayError::Config(format!(
                    "whitelisted events unreachable from declared intents: {missing:?}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::new("token").with_intents(Intents::GUILD_MESSAGES)
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_valid_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_empty_token_rejected() {
        let config = Config::new("").with_intents(Intents::GUILDS);
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_shard_index_out_of_range() {
        let config = base().with_shard(2, 2);
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_zero_shard_count_rejected() {
        let config = base().with_shard(0, 0);
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_large_threshold_cap() {
        let config = base().with_large_threshold(MAX_LARGE_THRESHOLD);
        assert!(config.validate().is_ok());

        let config = base().with_large_threshold(251);
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_reservation_swallowing_ceiling_rejected() {
        let config = base().with_command_limit(CommandRateLimit {
            burst_ceiling: 3,
            reserved_heartbeats: 3,
            window: Duration::from_secs(60),
        });
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));
    }

    // ==================== Intent Mode Tests ====================

    #[test]
    fn test_intents_and_event_lists_mutually_exclusive() {
        let config = Config::new("token")
            .with_intents(Intents::GUILDS)
            .with_guild_events([EventType::MessageCreate]);

        assert!(matches!(
            config.effective_intents(),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_neither_mode_rejected() {
        let config = Config::new("token");
        assert!(matches!(
            config.effective_intents(),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_derived_intents() {
        let config = Config::new("token")
            .with_guild_events([EventType::MessageCreate])
            .with_dm_events([EventType::TypingStart]);

        let intents = config.effective_intents().unwrap();
        assert_eq!(
            intents,
            Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGE_TYPING
        );
    }

    // ==================== Whitelist Tests ====================

    #[test]
    fn test_whitelist_must_be_reachable() {
        let config = Config::new("token")
            .with_intents(Intents::GUILD_MESSAGES)
            .with_event_whitelist([EventType::MessageCreate, EventType::GuildBanAdd]);

        let err = config.validate().unwrap_err();
        match err {
            GatewayError::Config(msg) => assert!(msg.contains("GuildBanAdd")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_whitelist_control_events_always_reachable() {
        let config = Config::new("token")
            .with_intents(Intents::GUILD_MESSAGES)
            .with_event_whitelist([
                EventType::Ready,
                EventType::Resumed,
                EventType::MessageCreate,
            ]);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shared_identify_bucket_overrides_settings() {
        let bucket = Arc::new(TokenBucket::new(1, Duration::from_secs(5)));
        let config = base()
            .with_identify_limit(IdentifyRateLimit {
                capacity: 0,
                window: Duration::from_secs(5),
            })
            .with_identify_bucket(bucket);

        // The zero-capacity settings are ignored when a bucket is shared.
        assert!(config.validate().is_ok());
    }

    // ==================== Defaults Tests ====================

    #[test]
    fn test_defaults() {
        let config = Config::new("token");
        assert_eq!(config.shard, [0, 1]);
        assert_eq!(config.large_threshold, DEFAULT_LARGE_THRESHOLD);
        assert!(!config.compress);
        assert_eq!(config.command_limit.capacity(), 117);
        assert_eq!(config.identify_limit.capacity, 1);
        assert!(config.prior_session.is_none());
    }
}

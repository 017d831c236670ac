//! Admission policy and the single-flight busy gate.

use crate::config::BotConfig;
use crate::{GuildContext, InboundMessage};

use regex::Regex;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

static USER_MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("hardcoded user mention regex"));

static ANY_MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:@[!&]?|#)\d+>").expect("hardcoded mention regex"));

/// Why an inbound message did not start a generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Sent by the bot itself.
    OwnMessage,
    /// Outside the configured guild.
    WrongGuild,
    /// Bot neither mentioned nor named, and sender not on the allow-list.
    NotAddressed,
    /// Nothing left once mention tokens are removed.
    EmptyMessage,
    /// Another cycle is in flight.
    Busy,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::OwnMessage => write!(f, "own message"),
            DropReason::WrongGuild => write!(f, "wrong guild"),
            DropReason::NotAddressed => write!(f, "bot not addressed"),
            DropReason::EmptyMessage => write!(f, "empty message"),
            DropReason::Busy => write!(f, "busy"),
        }
    }
}

/// Stateless admission checks, evaluated in a fixed order.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    bot_name: String,
    guild: Option<String>,
    always_respond: Vec<String>,
}

impl AdmissionPolicy {
    pub fn new(bot_name: impl Into<String>, guild: Option<String>, always_respond: Vec<String>) -> Self {
        Self {
            bot_name: bot_name.into().to_lowercase(),
            guild,
            always_respond: always_respond
                .into_iter()
                .map(|entry| entry.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(&config.name, config.guild.clone(), config.always_respond.clone())
    }

    /// Run every check except the busy gate.
    pub fn check(&self, message: &InboundMessage, bot_user_id: u64) -> Result<(), DropReason> {
        if bot_user_id != 0 && message.author.id == bot_user_id {
            return Err(DropReason::OwnMessage);
        }

        if let Some(required) = &self.guild {
            let in_guild = message
                .guild
                .as_ref()
                .is_some_and(|guild| &guild.name == required);
            if !in_guild {
                return Err(DropReason::WrongGuild);
            }
        }

        if !self.is_addressed(message) && !self.is_always_respond(message) {
            return Err(DropReason::NotAddressed);
        }

        if strip_mentions(&message.content).trim().is_empty() {
            return Err(DropReason::EmptyMessage);
        }

        Ok(())
    }

    fn is_addressed(&self, message: &InboundMessage) -> bool {
        message.mentions_bot || message.content.to_lowercase().contains(&self.bot_name)
    }

    fn is_always_respond(&self, message: &InboundMessage) -> bool {
        let id = message.author.id.to_string();
        let name = message.author.name.to_lowercase();
        self.always_respond
            .iter()
            .any(|entry| *entry == id || *entry == name)
    }
}

/// Remove every user, role and channel mention token.
pub fn strip_mentions(content: &str) -> String {
    ANY_MENTION_REGEX.replace_all(content, "").into_owned()
}

/// Replace `<@id>` tokens with member display names.
///
/// The bot's own mention and ids that are not guild members are removed.
pub fn resolve_mentions(content: &str, guild: Option<&GuildContext>, bot_user_id: u64) -> String {
    let resolved = USER_MENTION_REGEX.replace_all(content, |captures: &regex::Captures<'_>| {
        let Ok(id) = captures[1].parse::<u64>() else {
            return String::new();
        };
        if id == bot_user_id {
            return String::new();
        }
        guild
            .and_then(|guild| guild.members.iter().find(|member| member.id == id))
            .map(|member| member.name.clone())
            .unwrap_or_default()
    });

    resolved.trim().to_string()
}

/// Bot-wide single-flight flag.
#[derive(Debug, Default)]
pub struct BusyFlag {
    busy: AtomicBool,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag for one cycle. `None` if a cycle is already running.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds the busy flag; clears it on drop, whatever the exit path.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a BusyFlag,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Author, Member};

    const BOT_ID: u64 = 900;

    fn message(author: &str, content: &str) -> InboundMessage {
        InboundMessage {
            message_id: 1,
            channel_id: 2,
            author: Author {
                id: 10,
                name: author.into(),
            },
            content: content.into(),
            guild: Some(GuildContext {
                name: "Misty Lake".into(),
                members: vec![
                    Member {
                        id: 10,
                        name: "Alice".into(),
                    },
                    Member {
                        id: 11,
                        name: "Marisa".into(),
                    },
                ],
            }),
            mentions_bot: false,
        }
    }

    fn policy() -> AdmissionPolicy {
        AdmissionPolicy::new("Cirno", None, Vec::new())
    }

    #[test]
    fn admits_messages_naming_the_bot() {
        assert_eq!(policy().check(&message("Alice", "cirno, what's 2+2?"), BOT_ID), Ok(()));
    }

    #[test]
    fn admits_mentions_without_the_name() {
        let mut msg = message("Alice", "<@900> hello there");
        msg.mentions_bot = true;
        assert_eq!(policy().check(&msg, BOT_ID), Ok(()));
    }

    #[test]
    fn drops_own_messages_first() {
        let mut msg = message("Cirno", "Cirno is the strongest");
        msg.author.id = BOT_ID;
        assert_eq!(policy().check(&msg, BOT_ID), Err(DropReason::OwnMessage));
    }

    #[test]
    fn drops_messages_outside_restricted_guild() {
        let policy = AdmissionPolicy::new("Cirno", Some("Scarlet Mansion".into()), Vec::new());
        assert_eq!(
            policy.check(&message("Alice", "Cirno?"), BOT_ID),
            Err(DropReason::WrongGuild)
        );

        let mut direct = message("Alice", "Cirno?");
        direct.guild = None;
        assert_eq!(policy.check(&direct, BOT_ID), Err(DropReason::WrongGuild));

        let policy = AdmissionPolicy::new("Cirno", Some("Misty Lake".into()), Vec::new());
        assert_eq!(policy.check(&message("Alice", "Cirno?"), BOT_ID), Ok(()));
    }

    #[test]
    fn drops_unaddressed_messages_unless_allow_listed() {
        let msg = message("Alice", "nice weather today");
        assert_eq!(policy().check(&msg, BOT_ID), Err(DropReason::NotAddressed));

        let by_name = AdmissionPolicy::new("Cirno", None, vec!["alice".into()]);
        assert_eq!(by_name.check(&msg, BOT_ID), Ok(()));

        let by_id = AdmissionPolicy::new("Cirno", None, vec!["10".into()]);
        assert_eq!(by_id.check(&msg, BOT_ID), Ok(()));
    }

    #[test]
    fn drops_mention_only_messages() {
        let mut msg = message("Alice", "  <@900>  <@!11> ");
        msg.mentions_bot = true;
        assert_eq!(policy().check(&msg, BOT_ID), Err(DropReason::EmptyMessage));
    }

    #[test]
    fn resolves_member_mentions_and_strips_self() {
        let msg = message("Alice", "<@900> tell <@!11> and <@10> a joke <@12345>");

        let resolved = resolve_mentions(&msg.content, msg.guild.as_ref(), BOT_ID);

        assert_eq!(resolved, "tell Marisa and Alice a joke");
    }

    #[test]
    fn resolves_without_guild_by_removing_tokens() {
        assert_eq!(resolve_mentions("hi <@11>", None, BOT_ID), "hi");
    }

    #[test]
    fn busy_flag_is_single_flight_and_released_on_drop() {
        let flag = BusyFlag::new();

        let guard = flag.try_acquire().expect("first acquire succeeds");
        assert!(flag.is_busy());
        assert!(flag.try_acquire().is_none());

        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn busy_flag_is_released_on_early_return() {
        fn fails_midway(flag: &BusyFlag) -> Result<(), &'static str> {
            let _guard = flag.try_acquire().ok_or("busy")?;
            Err("upstream failed")
        }

        let flag = BusyFlag::new();
        assert_eq!(fails_midway(&flag), Err("upstream failed"));
        assert!(!flag.is_busy());
    }
}

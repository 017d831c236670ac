//! Discord messaging adapter using serenity.
//!
//! Converts gateway messages into [`InboundMessage`]s for the session, posts
//! replies, and serves the administrative slash commands:
//! `/clear_history`, `/show_history [count]`, `/pop_response`, `/model_name`.

use crate::agent::BotSession;
use crate::agent::session::MAX_SHOW_HISTORY;
use crate::error::{Error, Result};
use crate::llm::InferenceBackend;
use crate::messaging::traits::Responder;
use crate::startup;
use crate::{Author, GuildContext, InboundMessage, Member};

use async_trait::async_trait;
use serenity::all::{
    ChannelId, Client, Command, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption, EditInteractionResponse, EventHandler, GatewayIntents, Http, Interaction,
    Message, Ready,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Discord rejects messages longer than this many characters.
const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Posts replies through the Discord HTTP API.
#[derive(Clone)]
pub struct DiscordResponder {
    http: Arc<Http>,
}

impl DiscordResponder {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl Responder for DiscordResponder {
    async fn respond(&self, message: &InboundMessage, text: String) -> Result<()> {
        let channel_id = ChannelId::new(message.channel_id);
        for chunk in split_message(&text, DISCORD_MESSAGE_LIMIT) {
            channel_id.say(&self.http, chunk).await?;
        }
        Ok(())
    }

    async fn send_typing(&self, message: &InboundMessage) -> Result<()> {
        ChannelId::new(message.channel_id)
            .broadcast_typing(&self.http)
            .await?;
        Ok(())
    }
}

/// Gateway event handler bound to one bot session.
pub struct DiscordHandler<B> {
    session: Arc<BotSession<B>>,
    guild_restriction: Option<String>,
    /// Fatal startup errors are handed to [`run`], which stops the gateway.
    fatal_tx: mpsc::UnboundedSender<Error>,
}

impl<B: InferenceBackend> DiscordHandler<B> {
    pub fn new(
        session: Arc<BotSession<B>>,
        guild_restriction: Option<String>,
        fatal_tx: mpsc::UnboundedSender<Error>,
    ) -> Self {
        Self {
            session,
            guild_restriction,
            fatal_tx,
        }
    }

    async fn verify_guild(&self, ctx: &Context) -> Result<()> {
        let Some(required) = self.guild_restriction.as_deref() else {
            return Ok(());
        };
        let guilds = ctx.http.get_guilds(None, None).await?;
        let names: Vec<String> = guilds.into_iter().map(|guild| guild.name).collect();
        startup::verify_guild(&names, Some(required))
    }

    async fn to_inbound(&self, ctx: &Context, msg: &Message) -> InboundMessage {
        let bot_user_id = self.session.bot_user_id();

        let guild = match msg.guild_id {
            Some(guild_id) => {
                let name = match guild_id.name(&ctx.cache) {
                    Some(name) => Some(name),
                    None => guild_id
                        .to_partial_guild(&ctx.http)
                        .await
                        .map(|guild| guild.name)
                        .map_err(|error| {
                            tracing::warn!(%error, guild_id = guild_id.get(), "failed to resolve guild name");
                        })
                        .ok(),
                };
                Some(GuildContext {
                    name: name.unwrap_or_default(),
                    members: msg.mentions.iter().map(member_from_user).collect(),
                })
            }
            None => None,
        };

        InboundMessage {
            message_id: msg.id.get(),
            channel_id: msg.channel_id.get(),
            author: Author {
                id: msg.author.id.get(),
                name: msg.author.display_name().to_string(),
            },
            content: msg.content.clone(),
            guild,
            mentions_bot: bot_user_id != 0 && msg.mentions_user_id(bot_user_id),
        }
    }

    async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) {
        tracing::info!(
            command = %command.data.name,
            user = %command.user.name,
            "slash command received"
        );

        if let Err(error) = command.defer(&ctx.http).await {
            tracing::warn!(%error, "failed to defer command response");
            return;
        }

        let reply = match command.data.name.as_str() {
            "clear_history" => self.session.clear_history().await,
            "show_history" => {
                let count = command
                    .data
                    .options
                    .iter()
                    .find(|option| option.name == "count")
                    .and_then(|option| option.value.as_i64())
                    .map(|count| count.max(1) as usize);
                self.session.show_history(count).await
            }
            "pop_response" => self.session.pop_response().await,
            "model_name" => self.session.model_name().await,
            other => {
                tracing::warn!(command = other, "unknown slash command");
                format!("Unknown command: {other}")
            }
        };

        let content = truncate_chars(&reply, DISCORD_MESSAGE_LIMIT);
        if let Err(error) = command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
            .await
        {
            tracing::warn!(%error, "failed to send command response");
        }
    }
}

#[async_trait]
impl<B: InferenceBackend> EventHandler for DiscordHandler<B> {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.session.set_bot_user_id(ready.user.id.get());
        tracing::info!(
            user = %ready.user.name,
            id = ready.user.id.get(),
            guilds = ready.guilds.len(),
            "discord gateway ready"
        );

        if let Err(error) = self.verify_guild(&ctx).await {
            tracing::error!(%error, "startup guild check failed");
            let _ = self.fatal_tx.send(error);
            return;
        }

        match Command::set_global_commands(&ctx.http, slash_commands()).await {
            Ok(registered) => tracing::info!(count = registered.len(), "slash commands registered"),
            Err(error) => tracing::error!(%error, "failed to register slash commands"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let inbound = self.to_inbound(&ctx, &msg).await;
        let responder = DiscordResponder::new(ctx.http.clone());
        let outcome = self.session.handle_message(&inbound, &responder).await;
        tracing::trace!(message_id = inbound.message_id, ?outcome, "message handled");
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            self.handle_command(&ctx, &command).await;
        }
    }
}

/// Connect to the gateway and serve until shutdown or a fatal startup error.
pub async fn run<B: InferenceBackend>(
    token: &str,
    session: Arc<BotSession<B>>,
    guild_restriction: Option<String>,
) -> Result<()> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
    let handler = DiscordHandler::new(session, guild_restriction, fatal_tx);

    let mut client = Client::builder(token, intents)
        .event_handler(handler)
        .await?;
    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => {
            result?;
            tracing::info!("discord client stopped");
            Ok(())
        }
        Some(error) = fatal_rx.recv() => {
            shard_manager.shutdown_all().await;
            Err(error)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            shard_manager.shutdown_all().await;
            Ok(())
        }
    }
}

fn slash_commands() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("clear_history").description("Clears the chat history of the bot."),
        CreateCommand::new("show_history")
            .description("Shows the most recent interactions, oldest first.")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "count",
                    "How many interactions to show",
                )
                .required(false)
                .min_int_value(1)
                .max_int_value(MAX_SHOW_HISTORY as u64),
            ),
        CreateCommand::new("pop_response").description("Removes the last interaction from the history."),
        CreateCommand::new("model_name").description("Shows the model loaded on the inference server."),
    ]
}

fn member_from_user(user: &serenity::all::User) -> Member {
    let name = user
        .member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .unwrap_or_else(|| user.display_name().to_string());
    Member {
        id: user.id.get(),
        name,
    }
}

/// Split text into chunks of at most `max_chars` characters, preferring line breaks.
fn split_message(content: &str, max_chars: usize) -> Vec<String> {
    if content.chars().count() <= max_chars {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.lines() {
        let line_len = line.chars().count();
        let separator = usize::from(!current.is_empty());

        if current_len + separator + line_len <= max_chars {
            if separator == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += separator + line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            let mut pieces = chars.chunks(max_chars).map(|piece| piece.iter().collect::<String>());
            let last = pieces.next_back();
            chunks.extend(pieces);
            if let Some(last) = last {
                current_len = last.chars().count();
                current = last;
            }
        } else {
            current.push_str(line);
            current_len = line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

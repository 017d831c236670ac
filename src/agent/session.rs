//! BotSession: owns the history and busy gate, runs generation cycles.

use crate::InboundMessage;
use crate::agent::gate::{AdmissionPolicy, BusyFlag, DropReason, resolve_mentions};
use crate::config::Config;
use crate::conversation::{History, InteractionRecord, sanitize};
use crate::error::{GenerationError, Result};
use crate::llm::InferenceBackend;
use crate::messaging::Responder;
use crate::prompts::PromptAssembler;

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Upper bound for `/show_history`.
pub const MAX_SHOW_HISTORY: usize = 25;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dropped(DropReason),
    Replied { response: String },
    Failed { error: String },
}

/// Per-bot conversation state shared by every handler.
pub struct BotSession<B> {
    backend: B,
    assembler: PromptAssembler,
    policy: AdmissionPolicy,
    history: RwLock<History>,
    busy: BusyFlag,
    /// Set once the gateway reports ready. 0 until then.
    bot_user_id: AtomicU64,
    show_history_count: usize,
}

impl<B: InferenceBackend> BotSession<B> {
    pub fn new(config: &Config, backend: B) -> Self {
        Self {
            backend,
            assembler: PromptAssembler::from_config(config),
            policy: AdmissionPolicy::from_config(&config.bot),
            history: RwLock::new(History::new()),
            busy: BusyFlag::new(),
            bot_user_id: AtomicU64::new(0),
            show_history_count: config.bot.show_history_count.clamp(1, MAX_SHOW_HISTORY),
        }
    }

    pub fn set_bot_user_id(&self, id: u64) {
        self.bot_user_id.store(id, Ordering::Relaxed);
    }

    pub fn bot_user_id(&self) -> u64 {
        self.bot_user_id.load(Ordering::Relaxed)
    }

    pub fn bot_name(&self) -> &str {
        &self.assembler.persona().name
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn gate(&self) -> &BusyFlag {
        &self.busy
    }

    /// Copy of the current history, oldest first.
    pub async fn history_snapshot(&self) -> Vec<InteractionRecord> {
        self.history.read().await.as_slice().to_vec()
    }

    /// Admit or drop `message`, and run one generation cycle if admitted.
    ///
    /// Errors never escape: they are reported to the channel and returned as
    /// `DispatchOutcome::Failed`.
    pub async fn handle_message<R: Responder>(
        &self,
        message: &InboundMessage,
        responder: &R,
    ) -> DispatchOutcome {
        if let Err(reason) = self.policy.check(message, self.bot_user_id()) {
            tracing::debug!(
                message_id = message.message_id,
                author = %message.author.name,
                %reason,
                "message dropped"
            );
            return DispatchOutcome::Dropped(reason);
        }

        let Some(_guard) = self.busy.try_acquire() else {
            tracing::info!(
                message_id = message.message_id,
                author = %message.author.name,
                "generation in flight, message dropped"
            );
            return DispatchOutcome::Dropped(DropReason::Busy);
        };

        tracing::info!(
            message_id = message.message_id,
            channel_id = message.channel_id,
            author = %message.author.name,
            "message admitted"
        );

        if let Err(error) = responder.send_typing(message).await {
            tracing::debug!(%error, "failed to send typing indicator");
        }

        match self.run_cycle(message, responder).await {
            Ok(response) => DispatchOutcome::Replied { response },
            Err(error) => {
                tracing::warn!(message_id = message.message_id, %error, "generation cycle failed");
                if let Err(send_error) = responder.respond(message, format!("Error: {error}")).await {
                    tracing::warn!(error = %send_error, "failed to report generation error");
                }
                DispatchOutcome::Failed {
                    error: error.to_string(),
                }
            }
        }
    }

    async fn run_cycle<R: Responder>(&self, message: &InboundMessage, responder: &R) -> Result<String> {
        let resolved = resolve_mentions(&message.content, message.guild.as_ref(), self.bot_user_id());
        let user_name = sanitize(&message.author.name);
        let user_prompt = sanitize(&resolved);

        let request = {
            let history = self.history.read().await;
            self.assembler.build(history.as_slice(), &user_name, &user_prompt)
        };

        let response = self.backend.generate(&request).await?;
        let response = response.trim().to_string();
        if response.is_empty() {
            return Err(GenerationError::MalformedResponse("empty completion".into()).into());
        }

        responder.respond(message, response.clone()).await?;

        let record = InteractionRecord::new(user_name, user_prompt, sanitize(&response));
        let mut history = self.history.write().await;
        history.append(record);
        tracing::debug!(history_len = history.len(), "interaction recorded");

        Ok(response)
    }

    /// Empty the history and report how many interactions were removed.
    pub async fn clear_history(&self) -> String {
        let removed = self.history.write().await.clear();
        tracing::info!(removed, "history cleared");
        format!("Chat history cleared ({removed} interactions removed).")
    }

    /// Report the most recent interactions, oldest first.
    pub async fn show_history(&self, count: Option<usize>) -> String {
        let count = count
            .unwrap_or(self.show_history_count)
            .clamp(1, MAX_SHOW_HISTORY);
        let records = self.history.read().await.recent(count);

        if records.is_empty() {
            return "History is empty.".into();
        }

        let bot_name = self.bot_name();
        let mut report = format!("Last {} interaction(s), oldest first:\n", records.len());
        for record in &records {
            report.push_str(&format!(
                "**{}**: {}\n**{}**: {}\n",
                record.user_name(),
                record.user_prompt(),
                bot_name,
                record.bot_response()
            ));
        }
        report
    }

    /// Remove the last interaction and report it.
    pub async fn pop_response(&self) -> String {
        match self.history.write().await.pop_last() {
            Ok(record) => {
                tracing::info!(user = %record.user_name(), "last interaction removed");
                format!(
                    "Removed last interaction: **{}**: {} / **{}**: {}",
                    record.user_name(),
                    record.user_prompt(),
                    self.bot_name(),
                    record.bot_response()
                )
            }
            Err(_) => "History is empty.".into(),
        }
    }

    /// Report the inference server's model info body, or the error.
    pub async fn model_name(&self) -> String {
        match self.backend.model_info().await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(%error, "model info request failed");
                format!("Error: {error}")
            }
        }
    }
}

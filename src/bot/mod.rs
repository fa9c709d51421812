//! Chat-bot behaviour on top of the chain: what to learn, when to answer,
//! and the enable/disable control commands.

pub mod markup;
pub mod webhook;

use crate::chain::Chain;
use markup::clean_text;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Name the bot speaks as, and answers to.
    pub username: String,
    /// Name the chat service reports for the bot's own messages.
    pub api_name: String,
    /// Leading keyword that turns a message into a control command.
    pub control_word: String,
    /// Answer when the name appears anywhere, not only at the start.
    pub always_reply: bool,
    /// Allow the bot to answer its own messages.
    pub chatty: bool,
    /// Percent chance of answering an arbitrary message.
    pub response_chance: u32,
    /// Word budget for generated replies.
    pub reply_words: usize,
    /// Pause before a reply is returned, for flood control.
    pub response_delay: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            username: "markov-bot".to_string(),
            api_name: "slackbot".to_string(),
            control_word: "markovctl".to_string(),
            always_reply: false,
            chatty: false,
            response_chance: 10,
            reply_words: 100,
            response_delay: Duration::from_secs(2),
        }
    }
}

/// Form fields of an outgoing-webhook request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    pub text: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub username: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Status,
    Start,
    Stop,
    Unknown(String),
}

impl ControlCommand {
    pub fn parse(command: &str) -> Self {
        match command.trim() {
            "status" => Self::Status,
            "start" => Self::Start,
            "stop" | "shutdown" => Self::Stop,
            other => Self::Unknown(other.to_string()),
        }
    }
}

pub struct Bot {
    config: BotConfig,
    chain: Arc<Chain>,
    enabled: AtomicBool,
    username_lc: String,
}

impl Bot {
    pub fn new(config: BotConfig, chain: Arc<Chain>) -> Self {
        Self {
            username_lc: config.username.to_lowercase(),
            config,
            chain,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Handles one message, rolling the response chance with the thread RNG.
    pub fn handle(&self, message: &IncomingMessage) -> Option<WebhookResponse> {
        let roll = rand::thread_rng().gen_range(0..100);
        self.handle_with_roll(message, roll)
    }

    /// Handles one message given a response-chance roll in `0..100`.
    ///
    /// Returns the reply to send, if any. Ordinary messages from users are
    /// always learned, whether or not the bot answers them.
    pub fn handle_with_roll(
        &self,
        message: &IncomingMessage,
        roll: u32,
    ) -> Option<WebhookResponse> {
        let raw = message.text.as_deref().filter(|t| !t.is_empty())?;
        message.user_id.as_deref().filter(|u| !u.is_empty())?;

        let text = clean_text(raw);
        let from_bot = message.user_name.as_deref() == Some(self.config.api_name.as_str());

        if !from_bot && text.starts_with(&self.config.control_word) {
            info!(%text, "handling control command");
            let command = text.replacen(&self.config.control_word, "", 1);
            return Some(self.control(ControlCommand::parse(&command)));
        }

        if from_bot {
            if !self.config.chatty {
                return None;
            }
        } else {
            self.chain.train(&text);
        }

        if !self.is_enabled() {
            return None;
        }
        if roll >= self.config.response_chance && !self.sees_name(&text) {
            return None;
        }

        let reply = self.chain.generate(self.config.reply_words);
        if reply.is_empty() {
            debug!("chain had nothing to say");
            return None;
        }
        Some(self.respond(reply))
    }

    /// Applies a control command and describes the outcome.
    pub fn control(&self, command: ControlCommand) -> WebhookResponse {
        let name = &self.config.username;
        let status = match command {
            ControlCommand::Status => {
                let state = if self.is_enabled() { "enabled" } else { "disabled" };
                format!("{name} is currently {state}")
            }
            ControlCommand::Stop => {
                if self.enabled.swap(false, Ordering::SeqCst) {
                    format!("{name} is shutting down")
                } else {
                    format!("{name} is already disabled")
                }
            }
            ControlCommand::Start => {
                if self.enabled.swap(true, Ordering::SeqCst) {
                    format!("{name} is already running")
                } else {
                    format!("{name} is starting up")
                }
            }
            ControlCommand::Unknown(other) => {
                format!("{name} doesn't know that command |{other}|")
            }
        };
        self.respond(status)
    }

    /// Whether `text` addresses the bot by name, case-insensitively.
    pub fn sees_name(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        if self.config.always_reply {
            text.contains(&self.username_lc)
        } else {
            text.starts_with(&self.username_lc)
        }
    }

    fn respond(&self, text: String) -> WebhookResponse {
        info!(%text, "sending response");
        WebhookResponse {
            username: self.config.username.clone(),
            text,
        }
    }
}

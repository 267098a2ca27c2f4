//! Telegram Bot Integration
//!
//! Long-polling transport for the dialogue runner. Each chat is its own
//! session: the chat id is used as the sender id, so runs persisted from
//! Telegram can be traced back to the conversation they came from.

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use sdk::errors::{EngineError, LabErrorExt};
use sdk::types::Step;

use crate::dialogue::DialogueRunner;

/// Telegram rejects messages longer than 4096 characters
const MAX_MESSAGE_CHARS: usize = 4000;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramBot {
    token: String,
    api_base: String,
    allowed_users: Vec<i64>,
    poll_timeout_secs: u64,
    client: Client,
    runner: Arc<DialogueRunner>,
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("api_base", &self.api_base)
            .field("allowed_users", &self.allowed_users)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

#[derive(Deserialize, Debug)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Deserialize, Debug)]
struct Message {
    chat: Chat,
    text: Option<String>,
    from: Option<User>,
}

#[derive(Deserialize, Debug)]
struct Chat {
    id: i64,
}

#[derive(Deserialize, Debug)]
struct User {
    id: i64,
}

#[derive(Deserialize, Debug)]
struct GetUpdatesResponse {
    ok: bool,
    result: Option<Vec<Update>>,
}

impl TelegramBot {
    pub fn new(token: String, allowed_users: Vec<i64>, runner: Arc<DialogueRunner>) -> Self {
        let poll_timeout_secs = 30;
        Self {
            token,
            api_base: DEFAULT_API_BASE.to_string(),
            allowed_users,
            poll_timeout_secs,
            client: build_client(poll_timeout_secs),
            runner,
        }
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the long-poll timeout
    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self.client = build_client(secs);
        self
    }

    /// Start the long-polling loop
    ///
    /// This will block the current task. Should be spawned in a background tokio::task.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot long-polling loop...");
        let mut offset = 0;

        loop {
            match self.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = update.update_id + 1;
                        if let Some(msg) = update.message {
                            self.handle_message(&msg).await;
                        }
                    }
                    self.runner.evict_idle_sessions().await;
                }
                Err(e) => {
                    error!("Failed to fetch Telegram updates: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let url = format!(
            "{}?offset={}&timeout={}",
            self.method_url("getUpdates"),
            offset,
            self.poll_timeout_secs
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<GetUpdatesResponse>()
            .await?;

        if !response.ok {
            return Err(EngineError::Transport("getUpdates returned ok=false".to_string()).into());
        }

        Ok(response.result.unwrap_or_default())
    }

    fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }

    async fn handle_message(&self, msg: &Message) {
        let chat_id = msg.chat.id;

        let user_id = match msg.from.as_ref() {
            Some(u) => u.id,
            None => {
                warn!("Message with no user info - ignoring");
                return;
            }
        };

        if !self.is_allowed(user_id) {
            warn!("Unauthorized user {} attempted to use the bot", user_id);
            let _ = self
                .send_message(chat_id, "Unauthorized. Access denied.")
                .await;
            return;
        }

        let Some(text) = &msg.text else {
            return;
        };

        info!("Received message from {} in chat {}", user_id, chat_id);

        for reply in self.replies_for(chat_id, text).await {
            if let Err(e) = self.send_message(chat_id, &reply).await {
                error!("Failed to send reply to {}: {}", chat_id, e);
            }
        }
    }

    /// Replies for one incoming text, including built-in commands
    async fn replies_for(&self, chat_id: i64, text: &str) -> Vec<String> {
        let sender_id = chat_id.to_string();
        let messages = self.runner.machine().messages();

        let result = match text.split_whitespace().next().unwrap_or("") {
            "/start" | "/help" => return vec![messages.help()],
            "/reset" | "/new" => self.runner.invoke(&sender_id, Step::Reset).await,
            _ => self.runner.handle_message(&sender_id, text).await,
        };

        match result {
            Ok(replies) => replies,
            Err(e) => {
                if e.is_recoverable() {
                    warn!("Dialogue turn failed for chat {}: {}", chat_id, e);
                } else {
                    error!("Dialogue failed for chat {}: {}", chat_id, e);
                }
                vec![e.user_hint().to_string()]
            }
        }
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        #[derive(Serialize)]
        struct SendMsgReq<'a> {
            chat_id: i64,
            text: &'a str,
        }

        let text = truncate_chars(text, MAX_MESSAGE_CHARS);
        let req = SendMsgReq {
            chat_id,
            text: &text,
        };

        self.client
            .post(self.method_url("sendMessage"))
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn build_client(poll_timeout_secs: u64) -> Client {
    // Leave headroom above the long-poll timeout
    Client::builder()
        .timeout(Duration::from_secs(poll_timeout_secs + 30))
        .build()
        .unwrap_or_default()
}

/// Truncate on a character boundary, marking the cut
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...\n\n(truncated)", &text[..idx]),
        None => text.to_string(),
    }
}

//! The ledger chat assistant.
//!
//! Wraps a text-completion collaborator and grounds every question in a
//! snapshot of the full ledger, so answers reflect the user's actual
//! accounts and history rather than the model's guesses.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;

use crate::{
    Error,
    chat::{ChatMessage, NewChatMessage},
    store::LedgerStore,
};

/// A generative text-completion backend. The concrete vendor is a
/// deployment concern; the assistant only needs prompt-in, text-out.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete a text prompt.
    async fn complete(&self, prompt: &str) -> Result<String, Error>;

    /// Complete a prompt about an attached image.
    async fn complete_with_image(&self, prompt: &str, image: &[u8]) -> Result<String, Error>;
}

const IDENTIFY_PROMPT: &str =
    "Name the product shown in this image in at most five words. \
     Reply with the product name only.";

/// Answers questions about the ledger through a [TextCompletion] backend,
/// keeping the conversation in the persistent chat transcript.
#[derive(Clone)]
pub struct ChatAssistant {
    store: LedgerStore,
    completion: Arc<dyn TextCompletion>,
}

impl ChatAssistant {
    /// Create an assistant over the given store and completion backend.
    pub fn new(store: LedgerStore, completion: Arc<dyn TextCompletion>) -> Self {
        Self { store, completion }
    }

    fn context_prompt(&self, question: &str) -> Result<String, Error> {
        let accounts = serde_json::to_string(&self.store.get_all_accounts()?)?;
        let purchases = serde_json::to_string(&self.store.get_all_purchases()?)?;
        let payments = serde_json::to_string(&self.store.get_all_payments()?)?;

        Ok(format!(
            "You are the assistant for a personal credit ledger. Answer the \
             question using only the ledger data below. Amounts are in the \
             user's local currency.\n\n\
             Accounts: {accounts}\n\
             Purchases: {purchases}\n\
             Payments: {payments}\n\n\
             Question: {question}"
        ))
    }

    /// Answer `question` against the current ledger.
    ///
    /// The user turn is stored before the backend is called; the assistant
    /// turn is stored and returned only if the completion succeeds.
    ///
    /// # Errors
    /// Returns an error if the database cannot be read or written, or if
    /// the completion backend fails.
    pub async fn ask(&self, question: &str) -> Result<ChatMessage, Error> {
        self.store
            .insert_chat_message(NewChatMessage::from_user(question))?;

        let prompt = self.context_prompt(question)?;
        let answer = self.completion.complete(&prompt).await?;

        self.store
            .insert_chat_message(NewChatMessage::from_assistant(&answer))
    }

    /// Identify the product shown in `image`, for pre-filling a purchase's
    /// item name. Returns `None` on any failure or an empty answer.
    pub async fn identify_product(&self, image: &[u8]) -> Option<String> {
        match self
            .completion
            .complete_with_image(IDENTIFY_PROMPT, image)
            .await
        {
            Ok(answer) => {
                let name = answer.trim();
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_owned())
                }
            }
            Err(error) => {
                tracing::warn!("could not identify product from image: {error}");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// A [TextCompletion] over a plain HTTP completion endpoint: `POST`s
/// `{"prompt": …}` (plus a base64 `"image"` field for image prompts) and
/// reads `{"text": …}` back.
pub struct HttpTextCompletion {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTextCompletion {
    /// Create a client for the completion endpoint at `endpoint`,
    /// attaching `api_key` as a bearer token when given.
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_owned(),
            api_key,
        }
    }

    async fn post(&self, body: serde_json::Value) -> Result<String, Error> {
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Remote(format!(
                "completion endpoint returned {status}"
            )));
        }

        let completion: CompletionResponse = response.json().await?;
        Ok(completion.text)
    }
}

#[async_trait]
impl TextCompletion for HttpTextCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, Error> {
        self.post(serde_json::json!({ "prompt": prompt })).await
    }

    async fn complete_with_image(&self, prompt: &str, image: &[u8]) -> Result<String, Error> {
        self.post(serde_json::json!({
            "prompt": prompt,
            "image": STANDARD.encode(image),
        }))
        .await
    }
}

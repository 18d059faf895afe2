use futures::StreamExt;

use crate::context::{Conversation, ConversationStore, Message};
use crate::error::{CortexError, Result};
use crate::llm::{ModelId, ModelRouter, StreamEvent};

/// One chat turn end to end: append the user message, ask the router,
/// append the reply, persist.
///
/// The conversation is saved even when the remote call fails, so the user
/// message is never lost; in that case no assistant message is appended.
pub struct ChatSession<'a> {
    store: &'a ConversationStore,
    router: &'a ModelRouter,
}

impl<'a> ChatSession<'a> {
    pub fn new(store: &'a ConversationStore, router: &'a ModelRouter) -> Self {
        Self { store, router }
    }

    /// Validates the model and records the user message. Nothing is
    /// appended when the model is unknown. A title the user already chose
    /// is kept.
    fn begin_turn(conversation: &mut Conversation, input: &str, model_id: &str) -> Result<ModelId> {
        let model = ModelId::parse(model_id)?;

        let first_message = conversation.is_empty();
        conversation.push(Message::user(input));
        conversation.set_model(model.alias());
        if first_message {
            conversation.title_from_first_message();
        }
        Ok(model)
    }

    fn finish_turn(&self, conversation: &mut Conversation, reply: Result<String>) -> Result<String> {
        match reply {
            Ok(text) => {
                conversation.push(Message::assistant(text.clone()));
                self.store.save(conversation)?;
                Ok(text)
            }
            Err(e) => {
                self.store.save(conversation)?;
                Err(e)
            }
        }
    }

    /// Send `input` and wait for the full reply.
    pub async fn send(
        &self,
        conversation: &mut Conversation,
        input: &str,
        model_id: &str,
        profile: Option<&str>,
    ) -> Result<String> {
        let model = Self::begin_turn(conversation, input, model_id)?;
        let reply = self
            .router
            .complete(conversation, model.alias(), profile)
            .await;
        self.finish_turn(conversation, reply)
    }

    /// Like [`ChatSession::send`], but hands each text delta to `on_delta`
    /// as it arrives.
    pub async fn send_streaming<F>(
        &self,
        conversation: &mut Conversation,
        input: &str,
        model_id: &str,
        profile: Option<&str>,
        mut on_delta: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let model = Self::begin_turn(conversation, input, model_id)?;

        let reply = match self
            .router
            .complete_stream(conversation, model.alias(), profile)
            .await
        {
            Ok(mut events) => {
                let mut text = String::new();
                let mut failure = None;
                let mut finished = false;
                while let Some(event) = events.next().await {
                    match event {
                        StreamEvent::TextDelta(delta) => {
                            on_delta(&delta);
                            text.push_str(&delta);
                        }
                        StreamEvent::Usage(usage) => {
                            tracing::debug!(
                                input_tokens = usage.input_tokens,
                                output_tokens = usage.output_tokens,
                                "Stream usage"
                            );
                        }
                        StreamEvent::Error(message) => {
                            failure = Some(CortexError::Remote(message));
                            break;
                        }
                        StreamEvent::Done => {
                            finished = true;
                            break;
                        }
                    }
                }
                match failure {
                    Some(e) => Err(e),
                    None if !finished => Err(CortexError::remote("Stream closed before completion")),
                    None => Ok(text),
                }
            }
            Err(e) => Err(e),
        };

        self.finish_turn(conversation, reply)
    }
}

use crate::config::Settings;
use crate::context::Conversation;
use crate::error::CortexError;
use crate::llm::catalog::{ModelId, ModelSpec};
use crate::llm::openrouter::OpenRouterClient;
use crate::llm::traits::*;
use futures::channel::mpsc;
use std::collections::HashMap;
use std::time::Duration;

/// Routes a conversation to one of the catalog models.
///
/// Each catalog entry gets its own pre-built client carrying that model's
/// slug and request parameters. There is no fallback client: a model id
/// outside the catalog is an error.
pub struct ModelRouter {
    routes: HashMap<ModelId, Box<dyn LlmClient>>,
    /// Trailing conversation messages sent per request; 0 sends all of them.
    history_window: usize,
}

impl ModelRouter {
    /// Build one OpenRouter client per catalog model from settings.
    ///
    /// Fails with a configuration error when the API key env var is unset.
    pub fn from_settings(settings: &Settings) -> Result<Self, CortexError> {
        let api_key = settings.api_key().ok_or_else(|| {
            CortexError::Config(format!(
                "API key not configured. Set the {} environment variable.",
                settings.llm.api_key_env
            ))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.llm.timeout_secs))
            .build()
            .map_err(|e| CortexError::Config(format!("Failed to build HTTP client: {e}")))?;

        let mut routes: HashMap<ModelId, Box<dyn LlmClient>> = HashMap::new();
        for id in ModelId::all() {
            let client = OpenRouterClient::with_http_client(http.clone(), api_key.clone())
                .with_spec(&id.spec())
                .with_base_url(settings.llm.base_url.clone())
                .with_attribution(settings.llm.app_name.clone(), settings.llm.referer.clone());
            tracing::info!("Model route: {} -> {}", id, client.model());
            routes.insert(*id, Box::new(client));
        }

        Ok(Self {
            routes,
            history_window: settings.llm.history_window,
        })
    }

    /// Build a router from pre-made clients. Models without a client are
    /// treated as unavailable.
    pub fn with_clients(
        clients: HashMap<ModelId, Box<dyn LlmClient>>,
        history_window: usize,
    ) -> Self {
        Self {
            routes: clients,
            history_window,
        }
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// The catalog entries this router can serve.
    pub fn models(&self) -> Vec<ModelSpec> {
        ModelId::all()
            .iter()
            .filter(|id| self.routes.contains_key(*id))
            .map(|id| id.spec())
            .collect()
    }

    fn client_for(&self, model_id: &str) -> Result<(ModelId, &dyn LlmClient), CortexError> {
        let id = ModelId::parse(model_id)?;
        let client = self
            .routes
            .get(&id)
            .ok_or_else(|| CortexError::UnknownModel(model_id.to_string()))?;
        Ok((id, client.as_ref()))
    }

    /// Compose the wire messages: the profile (when present) as a leading
    /// system message, then the trailing window of the conversation.
    pub fn build_request(&self, conversation: &Conversation, profile: Option<&str>) -> Vec<ChatMessage> {
        let history = conversation.messages();
        let start = match self.history_window {
            0 => 0,
            n => history.len().saturating_sub(n),
        };

        let mut messages = Vec::with_capacity(history.len() - start + 1);
        if let Some(profile) = profile.map(str::trim).filter(|p| !p.is_empty()) {
            messages.push(ChatMessage::system(profile));
        }
        messages.extend(history[start..].iter().map(ChatMessage::from));
        messages
    }

    /// Send the conversation to `model_id` and return the reply text.
    pub async fn complete(
        &self,
        conversation: &Conversation,
        model_id: &str,
        profile: Option<&str>,
    ) -> Result<String, CortexError> {
        let (id, client) = self.client_for(model_id)?;
        let messages = self.build_request(conversation, profile);

        tracing::debug!(
            model = %id,
            conversation = conversation.id(),
            sent = messages.len(),
            "Routing completion"
        );

        match client.chat(&messages).await {
            Ok(response) => {
                if let Some(usage) = response.usage {
                    tracing::debug!(
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Completion usage"
                    );
                }
                Ok(response.content)
            }
            Err(e) => {
                tracing::warn!("Completion via {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    /// Streaming variant of [`ModelRouter::complete`].
    pub async fn complete_stream(
        &self,
        conversation: &Conversation,
        model_id: &str,
        profile: Option<&str>,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, CortexError> {
        let (id, client) = self.client_for(model_id)?;
        let messages = self.build_request(conversation, profile);

        tracing::debug!(
            model = %id,
            conversation = conversation.id(),
            sent = messages.len(),
            "Routing streaming completion"
        );

        client.chat_stream(&messages).await.inspect_err(|e| {
            tracing::warn!("Streaming completion via {} failed: {}", id, e);
        })
    }
}

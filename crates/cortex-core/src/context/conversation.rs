use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::storage::TITLE_MAX_CHARS;
use crate::llm::Role;

/// A single stored chat message. Once pushed onto a [`Conversation`] it is
/// only reachable through shared references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A named, append-only sequence of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    id: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    messages: Vec<Message>,
    /// Set once the user renames the conversation; a custom title is
    /// never replaced by one derived from the first message.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    custom_title: bool,
}

impl Conversation {
    /// Start an empty conversation with a freshly generated id.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(Self::generate_id(), title)
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            model: None,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            custom_title: false,
        }
    }

    /// Timestamp prefix keeps ids in creation order; the uuid suffix keeps
    /// them unique within the same microsecond.
    pub fn generate_id() -> String {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%6f");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", stamp, &suffix[..8])
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    pub fn rename(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.custom_title = true;
        self.touch();
    }

    pub fn has_custom_title(&self) -> bool {
        self.custom_title
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    /// Derive the title from the first user message, truncated to
    /// [`TITLE_MAX_CHARS`] characters. Leaves the title alone when there is
    /// no user message yet or the user has renamed the conversation.
    pub fn title_from_first_message(&mut self) {
        if self.custom_title {
            return;
        }
        let Some(first) = self.messages.iter().find(|m| m.role == Role::User) else {
            return;
        };
        let text = first.content.trim();
        let title: String = text.chars().take(TITLE_MAX_CHARS).collect();
        self.title = if text.chars().count() > TITLE_MAX_CHARS {
            format!("{}...", title.trim_end())
        } else {
            title
        };
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

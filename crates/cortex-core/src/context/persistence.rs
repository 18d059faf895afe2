use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{defaults, storage};
use crate::context::Conversation;
use crate::error::{CortexError, Result};

/// Metadata about a saved conversation, kept in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&Conversation> for ConversationMetadata {
    fn from(conv: &Conversation) -> Self {
        Self {
            id: conv.id().to_string(),
            title: conv.title().to_string(),
            model: conv.model().map(str::to_string),
            created_at: conv.created_at(),
            updated_at: conv.updated_at(),
            message_count: conv.len(),
        }
    }
}

/// Index of all conversations, most recently updated first.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConversationIndex {
    conversations: Vec<ConversationMetadata>,
}

/// Persists conversations as one JSON file each plus an `index.json`.
pub struct ConversationStore {
    base_dir: PathBuf,
}

impl ConversationStore {
    /// Open the store in the default directory (`<data_dir>/cortex/conversations/`).
    pub fn open_default() -> Result<Self> {
        Self::with_dir(Self::default_dir()?)
    }

    /// Open a store rooted at `base_dir`, creating it if missing.
    pub fn with_dir(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|e| {
            CortexError::Config(format!(
                "Failed to create conversations directory {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        Ok(Self { base_dir })
    }

    pub fn default_dir() -> Result<PathBuf> {
        let data = dirs::data_dir().ok_or_else(|| {
            CortexError::Config("Could not determine data directory".to_string())
        })?;

        Ok(data
            .join(defaults::APP_DIR)
            .join(storage::CONVERSATIONS_DIR))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn index_path(&self) -> PathBuf {
        self.base_dir.join(storage::INDEX_FILE)
    }

    fn conversation_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", id))
    }

    /// Ids become file names, so only `[A-Za-z0-9_-]` is accepted, and the
    /// index file's stem is reserved (in any case, for case-insensitive
    /// filesystems).
    fn validate_id(id: &str) -> Result<()> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && !id.eq_ignore_ascii_case(storage::INDEX_STEM);
        if valid {
            Ok(())
        } else {
            Err(CortexError::InvalidId(id.to_string()))
        }
    }

    fn load_index(&self) -> Result<ConversationIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(ConversationIndex::default());
        }

        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| {
            CortexError::Config(format!("Failed to parse index file: {}", e))
        })
    }

    fn save_index(&self, index: &ConversationIndex) -> Result<()> {
        let contents = serde_json::to_string_pretty(index)?;
        write_atomic(&self.index_path(), &contents)
    }

    /// Persist the full message sequence under the conversation's id,
    /// replacing any earlier version.
    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        Self::validate_id(conversation.id())?;

        let contents = serde_json::to_string_pretty(conversation)?;
        write_atomic(&self.conversation_path(conversation.id()), &contents)?;

        let mut index = self.load_index()?;
        index.conversations.retain(|m| m.id != conversation.id());
        index.conversations.push(ConversationMetadata::from(conversation));
        index
            .conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.save_index(&index)?;

        tracing::info!(
            id = conversation.id(),
            messages = conversation.len(),
            "Saved conversation"
        );
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Conversation> {
        Self::validate_id(id)?;

        let path = self.conversation_path(id);
        if !path.exists() {
            return Err(CortexError::NotFound(id.to_string()));
        }

        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| {
            CortexError::Config(format!("Failed to parse conversation {}: {}", id, e))
        })
    }

    /// All known ids, each exactly once, most recently updated first.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .load_index()?
            .conversations
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    pub fn list_metadata(&self) -> Result<Vec<ConversationMetadata>> {
        Ok(self.load_index()?.conversations)
    }

    pub fn exists(&self, id: &str) -> bool {
        Self::validate_id(id).is_ok() && self.conversation_path(id).exists()
    }

    /// Remove a conversation. Deleting an unknown id is not an error.
    pub fn delete(&self, id: &str) -> Result<()> {
        Self::validate_id(id)?;

        let path = self.conversation_path(id);
        if path.exists() {
            fs::remove_file(&path)?;
            tracing::info!(id, "Deleted conversation");
        }

        let mut index = self.load_index()?;
        let before = index.conversations.len();
        index.conversations.retain(|m| m.id != id);
        if index.conversations.len() != before {
            self.save_index(&index)?;
        }

        Ok(())
    }

    /// Change the title of a stored conversation.
    pub fn rename(&self, id: &str, title: &str) -> Result<Conversation> {
        let mut conversation = self.load(id)?;
        conversation.rename(title);
        self.save(&conversation)?;
        Ok(conversation)
    }

    /// Delete every stored conversation. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let ids = self.list()?;
        for id in &ids {
            self.delete(id)?;
        }
        Ok(ids.len())
    }

    /// Case-insensitive title search.
    pub fn search(&self, query: &str) -> Result<Vec<ConversationMetadata>> {
        let query_lower = query.to_lowercase();

        Ok(self
            .load_index()?
            .conversations
            .into_iter()
            .filter(|m| m.title.to_lowercase().contains(&query_lower))
            .collect())
    }
}

/// Write to a sibling `.tmp` file, then rename over the target.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub mod error;
pub mod constants;
pub mod llm;
pub mod context;
pub mod config;
pub mod session;

// Re-export key types
pub use error::{CortexError, Result};
pub use llm::{ChatMessage, LlmClient, LlmResponse, ModelId, ModelRouter, ModelSpec, Role, StreamEvent};
pub use context::{Conversation, ConversationMetadata, ConversationStore, Message};
pub use config::{Settings, UserProfile};
pub use session::ChatSession;

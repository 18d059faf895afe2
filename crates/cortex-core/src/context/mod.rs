mod conversation;
pub mod persistence;

pub use conversation::{Conversation, Message};
pub use persistence::{ConversationMetadata, ConversationStore};

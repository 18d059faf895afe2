use crate::constants::models;
use crate::error::CortexError;
use std::str::FromStr;

/// The models Cortex can route to. The set is closed: unknown names are
/// rejected rather than mapped to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelId {
    Gpt35Turbo,
    Claude3Haiku,
    Llama31_8b,
}

impl ModelId {
    pub fn all() -> &'static [ModelId] {
        &[ModelId::Gpt35Turbo, ModelId::Claude3Haiku, ModelId::Llama31_8b]
    }

    /// Short alias used in settings and on the command line.
    pub fn alias(&self) -> &'static str {
        match self {
            ModelId::Gpt35Turbo => "gpt-3.5-turbo",
            ModelId::Claude3Haiku => "claude-3-haiku",
            ModelId::Llama31_8b => "llama-3.1-8b",
        }
    }

    /// Model name as understood by OpenRouter.
    pub fn slug(&self) -> &'static str {
        match self {
            ModelId::Gpt35Turbo => models::GPT_35_TURBO,
            ModelId::Claude3Haiku => models::CLAUDE_3_HAIKU,
            ModelId::Llama31_8b => models::LLAMA_31_8B,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelId::Gpt35Turbo => "GPT-3.5 Turbo",
            ModelId::Claude3Haiku => "Claude 3 Haiku",
            ModelId::Llama31_8b => "Llama 3.1 8B",
        }
    }

    /// Accepts an alias or an OpenRouter slug, ignoring case.
    pub fn parse(name: &str) -> Result<Self, CortexError> {
        let lower = name.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|m| m.alias() == lower || m.slug() == lower)
            .ok_or_else(|| CortexError::UnknownModel(name.to_string()))
    }

    pub fn spec(&self) -> ModelSpec {
        match self {
            ModelId::Gpt35Turbo => ModelSpec {
                id: *self,
                max_tokens: 1024,
                temperature: 0.7,
                context_window: 16_385,
            },
            ModelId::Claude3Haiku => ModelSpec {
                id: *self,
                max_tokens: 1024,
                temperature: 0.7,
                context_window: 200_000,
            },
            ModelId::Llama31_8b => ModelSpec {
                id: *self,
                max_tokens: 1024,
                temperature: 0.6,
                context_window: 131_072,
            },
        }
    }
}

impl FromStr for ModelId {
    type Err = CortexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.alias())
    }
}

/// Request parameters for one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub id: ModelId,
    pub max_tokens: u32,
    pub temperature: f32,
    pub context_window: usize,
}

impl ModelSpec {
    pub fn slug(&self) -> &'static str {
        self.id.slug()
    }

    pub fn display_name(&self) -> &'static str {
        self.id.display_name()
    }
}

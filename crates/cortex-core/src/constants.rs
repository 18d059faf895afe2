/// Cortex — centralized constants.
/// Model slugs, endpoints and defaults live here.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    /// OpenRouter slugs for the supported models
    pub const GPT_35_TURBO: &str = "openai/gpt-3.5-turbo";
    pub const CLAUDE_3_HAIKU: &str = "anthropic/claude-3-haiku";
    pub const LLAMA_31_8B: &str = "meta-llama/llama-3.1-8b-instruct";

    pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api";
    pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
}

// ─── Default Settings ─────────────────────────────────────────────────────────

pub mod defaults {
    pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
    pub const THEME: &str = "dark";
    pub const TIMEOUT_SECS: u64 = 60;
    /// Number of trailing conversation messages sent with each request.
    pub const HISTORY_WINDOW: usize = 3;
    pub const APP_NAME: &str = "Cortex";
    pub const APP_DIR: &str = "cortex";
}

// ─── Storage ──────────────────────────────────────────────────────────────────

pub mod storage {
    pub const CONVERSATIONS_DIR: &str = "conversations";
    pub const INDEX_STEM: &str = "index";
    pub const INDEX_FILE: &str = "index.json";
    pub const CONFIG_FILE: &str = "config.toml";
    /// Max characters kept when deriving a title from the first message.
    pub const TITLE_MAX_CHARS: usize = 30;
}

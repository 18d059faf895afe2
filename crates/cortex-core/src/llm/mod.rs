mod traits;
mod openrouter;
pub mod catalog;
pub mod model_router;

pub use traits::*;
pub use openrouter::OpenRouterClient;
pub use catalog::{ModelId, ModelSpec};
pub use model_router::ModelRouter;

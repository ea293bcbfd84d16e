pub mod openai_compatible;
pub mod scripted;
pub mod traits;

pub use openai_compatible::OpenAICompatibleModel;
pub use scripted::{last_tool_result, last_user_text, ScriptedModel};
pub use traits::{ChatModel, ModelError};

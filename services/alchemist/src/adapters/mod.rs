mod api_error;
pub mod factory;
pub mod gemini_chat;
pub mod openai_chat;
pub mod workspace_store;

pub use factory::ProviderSessionFactory;
pub use gemini_chat::GeminiChatSession;
pub use openai_chat::OpenAiChatSession;
pub use workspace_store::{Workspace, WorkspaceStore};

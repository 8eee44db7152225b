pub mod domain;
pub mod generation;
pub mod pages;
pub mod ports;
pub mod prompt;
pub mod retry;

pub use domain::{
    AiProvider, ApiConfig, Audience, BookData, ChatMessage, ChatRole, Genre, Project, Scope,
    WizardStep, WritingStyle, EMOTIONS, UNNAMED_PROJECT,
};
pub use generation::{
    GenerationController, GenerationError, GenerationOutcome, GenerationPhase,
    GenerationSettings, GenerationStatus, StopReason, FETCH_INTERRUPTED, FIRST_TURN_FAILED,
    RUN_INTERRUPTED,
};
pub use pages::{blocks_manual_fetch, ends_auto_loop, split_pages, PAGE_DELIMITER};
pub use ports::{
    ChatSession, ChatSessionFactory, PortError, PortResult, ProjectStore, Sleeper, TokioSleeper,
    CONTINUE_TOKEN,
};
pub use prompt::{build_seed, ConversationSeed, FIRST_TURN};
pub use retry::{RetryDecision, RetryPolicy};

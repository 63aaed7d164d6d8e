pub mod config;
pub mod logging;
pub mod model;
pub mod prompts;
pub mod story;

pub use config::{
    Config, ConfigError, ConfigStore, Credential, LlmConfig, PromptConfig, RecentUsage,
    DEFAULT_API_KEY_ENV, DEFAULT_PROFILE_NAME,
};
pub use logging::{
    FacadeLogSink, LogLevel, LogRecord, LogSink, StderrLogSink, TeeLogSink, VecLogSink,
};
pub use model::{ChatMessage, ChatRole, LanguageModel, LanguageModelError};
pub use prompts::{
    PromptArguments, PromptError, PromptMetadata, PromptRegistry, PromptSource, PromptTemplate,
};
pub use story::{
    preflight, PreflightError, StoryDocument, StoryError, StoryField, StoryRequest, StoryService,
    StoryStage, StoryState,
};

pub mod document;
pub mod stage;

pub use document::StoryDocument;
pub use stage::{StoryField, StoryStage};

use crate::config::{ConfigError, Credential, LlmConfig};
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::model::{LanguageModel, LanguageModelError};
use crate::prompts::{PromptArguments, PromptError, PromptRegistry};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("the story idea is empty")]
    EmptyRequest,
    #[error("failed to render prompt for stage {stage}: {source}")]
    Prompt {
        stage: StoryStage,
        #[source]
        source: PromptError,
    },
    #[error("language model invocation failed for stage {stage}: {source}")]
    Model {
        stage: StoryStage,
        #[source]
        source: LanguageModelError,
    },
    #[error("missing {dependency} when generating stage {stage}")]
    MissingDependency {
        stage: StoryStage,
        dependency: StoryField,
    },
    #[error("stage {stage} produced no output")]
    MissingOutput { stage: StoryStage },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoryRequest {
    pub idea: String,
}

impl StoryRequest {
    pub fn new(idea: impl Into<String>) -> Self {
        Self { idea: idea.into() }
    }

    pub fn is_blank(&self) -> bool {
        self.idea.trim().is_empty()
    }
}

/// Fields produced so far during one run. Nothing here outlives the run.
#[derive(Clone, Debug, Default)]
pub struct StoryState {
    request: String,
    plot: Option<String>,
    character: Option<String>,
    setting: Option<String>,
    dialogue: Option<String>,
    emotion: Option<String>,
}

impl StoryState {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, field: StoryField) -> Option<&str> {
        match field {
            StoryField::Request => Some(self.request.as_str()),
            StoryField::Plot => self.plot.as_deref(),
            StoryField::Character => self.character.as_deref(),
            StoryField::Setting => self.setting.as_deref(),
            StoryField::Dialogue => self.dialogue.as_deref(),
            StoryField::Emotion => self.emotion.as_deref(),
        }
    }

    pub fn set(&mut self, stage: StoryStage, value: String) {
        let value = Some(value);
        match stage {
            StoryStage::Plot => self.plot = value,
            StoryStage::Character => self.character = value,
            StoryStage::Setting => self.setting = value,
            StoryStage::Dialogue => self.dialogue = value,
            StoryStage::Emotion => self.emotion = value,
        }
    }

    /// Prompt arguments for `stage`: every field produced so far, verbatim.
    /// The stage's own dependencies must be present.
    pub fn arguments_for(&self, stage: StoryStage) -> Result<PromptArguments, StoryError> {
        if let Some(dependency) = stage
            .dependencies()
            .iter()
            .find(|dependency| self.get(**dependency).is_none())
        {
            return Err(StoryError::MissingDependency {
                stage,
                dependency: *dependency,
            });
        }

        Ok(StoryField::ALL
            .iter()
            .filter_map(|field| {
                self.get(*field)
                    .map(|value| (field.key().to_string(), value.to_string()))
            })
            .collect())
    }

    pub fn into_document(self) -> Result<StoryDocument, StoryError> {
        let missing = |stage: StoryStage| StoryError::MissingOutput { stage };
        Ok(StoryDocument::new(
            self.plot.ok_or_else(|| missing(StoryStage::Plot))?,
            self.character.ok_or_else(|| missing(StoryStage::Character))?,
            self.setting.ok_or_else(|| missing(StoryStage::Setting))?,
            self.dialogue.ok_or_else(|| missing(StoryStage::Dialogue))?,
            self.emotion.ok_or_else(|| missing(StoryStage::Emotion))?,
        ))
    }
}

/// Why a run was refused before any model call.
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("Please enter a story idea first!")]
    EmptyIdea,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PreflightError {
    /// Empty input is a warning; everything else is an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::EmptyIdea)
    }
}

/// Checks the idea, then the credential. Neither check touches the network.
pub fn preflight<F>(
    idea: &str,
    profile_name: &str,
    profile: &LlmConfig,
    lookup: F,
) -> Result<(StoryRequest, Credential), PreflightError>
where
    F: Fn(&str) -> Option<String>,
{
    let request = StoryRequest::new(idea);
    if request.is_blank() {
        return Err(PreflightError::EmptyIdea);
    }
    let credential = Credential::resolve_with(profile_name, profile, lookup)?;
    Ok((request, credential))
}

/// Runs the five agents in order, one blocking call at a time.
pub struct StoryService<'a> {
    prompts: &'a PromptRegistry,
    sink: &'a dyn LogSink,
}

impl<'a> StoryService<'a> {
    pub fn new(prompts: &'a PromptRegistry, sink: &'a dyn LogSink) -> Self {
        Self { prompts, sink }
    }

    pub fn generate<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        request: &StoryRequest,
    ) -> Result<StoryDocument, StoryError> {
        if request.is_blank() {
            self.log(LogLevel::Warn, "Story idea is empty; nothing was generated.");
            return Err(StoryError::EmptyRequest);
        }

        let mut state = StoryState::new(request.idea.clone());
        for stage in StoryStage::ALL {
            self.run_stage(model, stage, &mut state)?;
        }

        self.log(LogLevel::Info, "All five sections generated.");
        state.into_document()
    }

    fn run_stage<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        stage: StoryStage,
        state: &mut StoryState,
    ) -> Result<(), StoryError> {
        self.log(
            LogLevel::Info,
            format!(
                "Step {}/{}: generating {}...",
                stage.position(),
                StoryStage::ALL.len(),
                stage.label()
            ),
        );

        let arguments = state.arguments_for(stage)?;
        let messages = self
            .prompts
            .compose(stage.key(), &arguments)
            .map_err(|source| StoryError::Prompt { stage, source })?;

        for message in &messages {
            self.log(
                LogLevel::Debug,
                format!("prompt ({}, {}):\n{}", stage.label(), message.role, message.content),
            );
        }

        let response = match model.invoke(&messages) {
            Ok(response) => response,
            Err(source) => {
                self.log(
                    LogLevel::Error,
                    format!("LLM call failed for {}: {}", stage.label(), source),
                );
                return Err(StoryError::Model { stage, source });
            }
        };

        self.log(
            LogLevel::Info,
            format!(
                "{} ready ({} characters).",
                stage.label(),
                response.chars().count()
            ),
        );
        self.log(
            LogLevel::Debug,
            format!("response ({}):\n{}", stage.label(), response),
        );

        state.set(stage, response);
        Ok(())
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message.into()));
    }
}

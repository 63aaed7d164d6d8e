use std::collections::VecDeque;
use std::path::PathBuf;

use story_core::{
    preflight, Config, ConfigError, ConfigStore, LogRecord, PreflightError, StoryDocument,
};

use crate::tasks::{GenerateStoryCommand, TaskError};

pub const IDEA_HINT: &str =
    "Enter your story idea (e.g., 'A detective story set in Mumbai with a twist ending')";

/// One-line feedback shown under the form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

#[derive(Clone, Debug)]
pub struct LogPanelState {
    records: VecDeque<LogRecord>,
    capacity: usize,
}

impl LogPanelState {
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
            capacity: 500,
        }
    }

    pub fn push(&mut self, record: LogRecord) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }
}

impl Default for LogPanelState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AppState {
    config_store: ConfigStore,
    pub idea: String,
    pub selected_llm: Option<String>,
    pub document: Option<StoryDocument>,
    pub notice: Option<Notice>,
    pub logs: LogPanelState,
    busy: bool,
    running_profile: Option<String>,
}

impl AppState {
    pub fn new(config_path: PathBuf) -> Result<Self, ConfigError> {
        Ok(Self::from_store(ConfigStore::open(config_path)?))
    }

    /// Falls back to the built-in defaults, keeping `config_path` as the
    /// place to save to.
    pub fn with_defaults(config_path: PathBuf) -> Self {
        Self::from_store(ConfigStore::with_config(config_path, Config::default()))
    }

    fn from_store(mut store: ConfigStore) -> Self {
        store.ensure_recent_defaults();
        let selected_llm = store.last_llm_interface().map(str::to_string);
        Self {
            config_store: store,
            idea: String::new(),
            selected_llm,
            document: None,
            notice: None,
            logs: LogPanelState::new(),
            busy: false,
            running_profile: None,
        }
    }

    pub fn llm_profiles(&self) -> Vec<String> {
        self.config_store
            .config()
            .llm_profiles
            .keys()
            .cloned()
            .collect()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn push_log(&mut self, record: LogRecord) {
        self.logs.push(record);
    }

    /// Validates the form and resolves the credential. Fails without any
    /// side effect on the current document.
    pub fn prepare_generation<F>(&self, lookup: F) -> Result<GenerateStoryCommand, PreflightError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.idea.trim().is_empty() {
            return Err(PreflightError::EmptyIdea);
        }

        let profile_name = self
            .config_store
            .select_llm_profile(self.selected_llm.as_deref())?;
        let profile = self
            .config_store
            .config()
            .get_llm_profile(&profile_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile(profile_name.clone()))?;
        let (request, credential) = preflight(&self.idea, &profile_name, &profile, lookup)?;

        Ok(GenerateStoryCommand {
            profile_name,
            profile,
            credential,
            prompts: self.config_store.config().prompts.clone(),
            request,
        })
    }

    /// Records the outcome of the "Generate Story" button before dispatch.
    pub fn reject(&mut self, err: &PreflightError) {
        self.notice = Some(if err.is_warning() {
            Notice::Warning(err.to_string())
        } else {
            Notice::Error(err.to_string())
        });
    }

    pub fn start_generation(&mut self, profile_name: &str) {
        self.busy = true;
        self.notice = None;
        self.running_profile = Some(profile_name.to_string());
    }

    pub fn finish_generation(&mut self, result: Result<StoryDocument, TaskError>) {
        self.busy = false;
        let profile = self.running_profile.take();
        match result {
            Ok(document) => {
                self.document = Some(document);
                self.notice = None;
                if let Some(profile) = profile {
                    self.remember_profile(profile);
                }
            }
            Err(err) => {
                self.notice = Some(Notice::Error(format!("Story generation failed: {err}")));
            }
        }
    }

    fn remember_profile(&mut self, profile: String) {
        self.config_store.touch_llm_interface(profile);
        if !self.config_store.path().exists() {
            return;
        }
        if let Err(err) = self.config_store.save() {
            self.notice = Some(Notice::Error(format!("Failed to save configuration: {err}")));
        }
    }
}

/// How one line of a rendered story is displayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentLine<'a> {
    Heading(&'a str),
    Text(&'a str),
    Blank,
}

pub fn document_lines(rendered: &str) -> impl Iterator<Item = DocumentLine<'_>> {
    rendered.lines().map(|line| {
        if let Some(heading) = line.strip_prefix("### ") {
            DocumentLine::Heading(heading)
        } else if line.trim().is_empty() {
            DocumentLine::Blank
        } else {
            DocumentLine::Text(line)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_core::{LlmConfig, StoryError, StoryStage};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn state_in(dir: &Path) -> AppState {
        AppState::new(dir.join("config.json")).unwrap()
    }

    fn sample_document() -> StoryDocument {
        StoryDocument::new("P", "C", "S", "D", "E")
    }

    #[test]
    fn empty_idea_is_a_warning_even_without_credential() {
        let dir = tempdir().unwrap();
        let mut state = state_in(dir.path());
        state.idea = "   ".into();

        let err = state.prepare_generation(|_| None).unwrap_err();
        state.reject(&err);

        assert_eq!(
            state.notice,
            Some(Notice::Warning("Please enter a story idea first!".into()))
        );
    }

    #[test]
    fn missing_credential_is_an_error() {
        let dir = tempdir().unwrap();
        let mut state = state_in(dir.path());
        state.idea = "A detective story set in Mumbai".into();

        let err = state.prepare_generation(|_| None).unwrap_err();
        state.reject(&err);

        match state.notice {
            Some(Notice::Error(message)) => assert!(message.contains("OPENAI_API_KEY")),
            other => panic!("unexpected notice: {other:?}"),
        }
    }

    #[test]
    fn command_carries_profile_and_credential() {
        let dir = tempdir().unwrap();
        let mut state = state_in(dir.path());
        state.idea = "A heist on the moon".into();

        let command = state
            .prepare_generation(|name| (name == "OPENAI_API_KEY").then(|| "sk-env".into()))
            .unwrap();

        assert_eq!(command.profile_name, "openai");
        assert_eq!(command.profile, LlmConfig::default());
        assert_eq!(command.credential.expose(), "sk-env");
        assert_eq!(command.request.idea, "A heist on the moon");
    }

    #[test]
    fn unknown_selected_profile_is_an_error() {
        let dir = tempdir().unwrap();
        let mut state = state_in(dir.path());
        state.idea = "idea".into();
        state.selected_llm = Some("missing".into());

        let err = state.prepare_generation(|_| Some("sk".into())).unwrap_err();
        assert!(!err.is_warning());
    }

    #[test]
    fn failure_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let mut state = state_in(dir.path());
        state.document = Some(sample_document());

        state.start_generation("openai");
        assert!(state.is_busy());
        state.finish_generation(Err(TaskError::Story(StoryError::EmptyRequest)));

        assert!(!state.is_busy());
        assert_eq!(state.document, Some(sample_document()));
        assert!(matches!(state.notice, Some(Notice::Error(_))));
    }

    #[test]
    fn success_does_not_create_config_file() {
        let dir = tempdir().unwrap();
        let mut state = state_in(dir.path());

        state.start_generation("openai");
        state.finish_generation(Ok(sample_document()));

        assert_eq!(
            state.document.as_ref().map(|doc| doc.section(StoryStage::Plot)),
            Some("P")
        );
        assert!(!dir.path().join("config.json").exists());
    }

    #[test]
    fn success_updates_existing_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config::default().to_path(&path).unwrap();
        let mut state = AppState::new(path.clone()).unwrap();

        state.start_generation("openai");
        state.finish_generation(Ok(sample_document()));

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("\"last_llm_interface\": \"openai\""));
    }

    #[test]
    fn log_panel_drops_oldest_records() {
        let mut logs = LogPanelState::new();
        for index in 0..510 {
            logs.push(LogRecord::info(format!("line {index}")));
        }
        assert_eq!(logs.len(), 500);
        assert_eq!(logs.iter().next().unwrap().message, "line 10");
    }

    #[test]
    fn rendered_document_splits_into_headings() {
        let rendered = sample_document().render();
        let lines: Vec<_> = document_lines(&rendered).collect();
        assert_eq!(lines[0], DocumentLine::Heading("Story Outline:"));
        assert_eq!(lines[1], DocumentLine::Text("P"));
        assert_eq!(lines[2], DocumentLine::Blank);
        assert_eq!(lines[3], DocumentLine::Heading("Character Development:"));
        assert_eq!(
            lines
                .iter()
                .filter(|line| matches!(line, DocumentLine::Heading(_)))
                .count(),
            5
        );
    }
}

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

use story_core::{
    preflight, ChatMessage, ChatRole, ConfigError, LanguageModel, LanguageModelError, LlmConfig,
    LogLevel, PreflightError, PromptRegistry, StoryRequest, StoryService, VecLogSink,
};

struct MockLanguageModel {
    responses: Mutex<VecDeque<String>>,
    received: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockLanguageModel {
    fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            received: Mutex::new(Vec::new()),
        }
    }

    fn received(&self) -> Vec<Vec<ChatMessage>> {
        self.received.lock().expect("mock mutex poisoned").clone()
    }

    fn assert_empty(&self) {
        let guard = self.responses.lock().expect("mock mutex poisoned");
        assert!(
            guard.is_empty(),
            "expected all mock responses to be consumed"
        );
    }
}

impl LanguageModel for MockLanguageModel {
    fn invoke(&self, messages: &[ChatMessage]) -> Result<String, LanguageModelError> {
        self.received
            .lock()
            .expect("mock mutex poisoned")
            .push(messages.to_vec());
        let mut guard = self.responses.lock().expect("mock mutex poisoned");
        guard.pop_front().ok_or_else(|| {
            LanguageModelError::new(io::Error::new(
                io::ErrorKind::Other,
                "mock language model has no remaining responses",
            ))
        })
    }
}

const IDEA: &str = "A detective story set in Mumbai with a twist ending";

#[test]
fn full_pipeline_produces_expected_document() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptRegistry::new()?;
    let sink = VecLogSink::new();
    let mock = MockLanguageModel::new(["P", "C", "S", "D", "E"]);

    let service = StoryService::new(&prompts, &sink);
    let document = service.generate(&mock, &StoryRequest::new(IDEA))?;

    assert_eq!(
        document.render(),
        "### Story Outline:\nP\n\n### Character Development:\nC\n\n### Setting Description:\nS\n\n### First Dialogue:\nD\n\n### Emotional Twist:\nE\n"
    );
    mock.assert_empty();
    Ok(())
}

#[test]
fn agents_run_in_fixed_order_with_their_roles() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptRegistry::new()?;
    let sink = VecLogSink::new();
    let mock = MockLanguageModel::new(["P", "C", "S", "D", "E"]);

    StoryService::new(&prompts, &sink).generate(&mock, &StoryRequest::new(IDEA))?;

    let received = mock.received();
    let roles: Vec<&str> = received
        .iter()
        .map(|messages| {
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].role, ChatRole::System);
            assert_eq!(messages[1].role, ChatRole::User);
            messages[0].content.as_str()
        })
        .collect();
    assert_eq!(
        roles,
        vec![
            "You are a story planner.",
            "You are a character creator.",
            "You are a world builder.",
            "You are a dialogue writer.",
            "You are an emotional depth creator.",
        ]
    );

    assert_eq!(
        received[0][1].content,
        format!("Create a plot outline for this request: {IDEA}")
    );
    assert_eq!(
        received[3][1].content,
        "Write the first conversation between the hero C and a mysterious guide. The setting is S."
    );
    assert_eq!(
        received[4][1].content,
        "Based on the character C and the plot 'P', create an emotional twist that tests the hero."
    );

    let steps = sink
        .messages_at(LogLevel::Info)
        .into_iter()
        .filter(|message| message.starts_with("Step "))
        .count();
    assert_eq!(steps, 5);
    Ok(())
}

#[test]
fn failure_mid_pipeline_yields_no_document() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptRegistry::new()?;
    let sink = VecLogSink::new();
    let mock = MockLanguageModel::new(["P", "C"]);

    let result = StoryService::new(&prompts, &sink).generate(&mock, &StoryRequest::new(IDEA));

    let err = result.expect_err("third call has no scripted response");
    assert!(err.to_string().contains("setting"));
    assert_eq!(mock.received().len(), 3);
    Ok(())
}

#[test]
fn missing_credential_blocks_every_idea() {
    let profile = LlmConfig::default();

    for idea in [IDEA, "x", "  padded idea  "] {
        let err = preflight(idea, "openai", &profile, |_| None).unwrap_err();
        assert!(!err.is_warning(), "{idea:?}");
        assert!(
            matches!(
                err,
                PreflightError::Config(ConfigError::MissingCredential { .. })
            ),
            "{idea:?}: {err}"
        );
    }

    let err = preflight("   ", "openai", &profile, |_| None).unwrap_err();
    assert!(err.is_warning());
    assert!(matches!(err, PreflightError::EmptyIdea));
}

use std::thread;

use story_adapters::{create_llm_adapter_from_profile, AdapterError};
use story_core::{
    Credential, FacadeLogSink, LlmConfig, LogRecord, LogSink, PromptConfig, PromptError,
    PromptRegistry, StoryDocument, StoryError, StoryRequest, StoryService, TeeLogSink,
};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub type EventSender = UnboundedSender<TaskEvent>;

/// Everything a background run needs. The credential is resolved on the UI
/// thread before the command is queued, so the worker never reads the
/// environment.
#[derive(Clone, Debug)]
pub struct GenerateStoryCommand {
    pub profile_name: String,
    pub profile: LlmConfig,
    pub credential: Credential,
    pub prompts: PromptConfig,
    pub request: StoryRequest,
}

#[derive(Debug)]
pub struct TaskController {
    sender: UnboundedSender<GenerateStoryCommand>,
    receiver: UnboundedReceiver<TaskEvent>,
    _worker: thread::JoinHandle<()>,
}

impl TaskController {
    pub fn new() -> Self {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let handle = thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("failed to start the background runtime: {err}");
                    return;
                }
            };

            runtime.block_on(async move {
                while let Some(command) = command_rx.recv().await {
                    tokio::spawn(run_command(command, event_tx.clone()));
                }
            });
        });

        Self {
            sender: command_tx,
            receiver: event_rx,
            _worker: handle,
        }
    }

    pub fn send(&self, command: GenerateStoryCommand) -> Result<(), TaskSendError> {
        self.sender
            .send(command)
            .map_err(|_| TaskSendError::ChannelClosed)
    }

    pub fn try_recv(&mut self) -> Option<TaskEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Default for TaskController {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum TaskSendError {
    #[error("the background worker is not running")]
    ChannelClosed,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("failed to load prompts: {0}")]
    Prompt(#[from] PromptError),
    #[error("{0}")]
    Story(#[from] StoryError),
    #[error("background task crashed: {0}")]
    Join(String),
}

#[derive(Debug)]
pub enum TaskEvent {
    Log(LogRecord),
    Started,
    Finished(Result<StoryDocument, TaskError>),
}

struct ChannelLogSink {
    sender: EventSender,
}

impl ChannelLogSink {
    fn new(sender: EventSender) -> Self {
        Self { sender }
    }
}

impl LogSink for ChannelLogSink {
    fn log(&self, record: LogRecord) {
        let _ = self.sender.send(TaskEvent::Log(record));
    }
}

async fn run_command(command: GenerateStoryCommand, sender: EventSender) {
    let _ = sender.send(TaskEvent::Started);
    let worker_sender = sender.clone();
    let outcome =
        match tokio::task::spawn_blocking(move || generate_story(command, worker_sender)).await {
            Ok(result) => result,
            Err(err) => Err(TaskError::Join(err.to_string())),
        };
    let _ = sender.send(TaskEvent::Finished(outcome));
}

fn generate_story(
    command: GenerateStoryCommand,
    sender: EventSender,
) -> Result<StoryDocument, TaskError> {
    let channel = ChannelLogSink::new(sender);
    let facade = FacadeLogSink::new("story_ui");
    let sink = TeeLogSink::new(vec![&channel as &dyn LogSink, &facade]);
    sink.log(LogRecord::info(format!(
        "Using LLM profile `{}` ({}).",
        command.profile_name, command.profile.model_name
    )));

    let prompts = PromptRegistry::from_prompt_config(&command.prompts)?;
    let adapter = create_llm_adapter_from_profile(&command.profile, &command.credential)?;
    Ok(StoryService::new(&prompts, &sink).generate(adapter.as_ref(), &command.request)?)
}

use clap::{Args, Parser, Subcommand};
use story_adapters::{create_llm_adapter, create_llm_adapter_from_profile, AdapterError};
use story_core::{
    preflight, ConfigError, ConfigStore, LanguageModelError, LogLevel, LogRecord, LogSink,
    PreflightError, PromptArguments, PromptError, PromptRegistry, StderrLogSink, StoryError,
    StoryRequest, StoryService,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let sink = StderrLogSink::new(level);

    match cli.command {
        Command::Generate(args) => run_generate(&cli.config, args, &sink),
        Command::Config(command) => handle_config(&cli.config, command, &sink),
        Command::Prompts(command) => handle_prompts(&cli.config, command),
    }
}

fn handle_config(
    config_path: &Path,
    command: ConfigCommand,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    match command {
        ConfigCommand::TestLlm(args) => run_test_llm(config_path, args, sink),
    }
}

fn handle_prompts(config_path: &Path, command: PromptsCommand) -> Result<(), CliError> {
    match command {
        PromptsCommand::List => run_list_prompts(config_path),
    }
}

fn run_generate(
    config_path: &Path,
    args: GenerateArgs,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    if StoryRequest::new(args.idea.as_str()).is_blank() {
        sink.log(LogRecord::warn(PreflightError::EmptyIdea.to_string()));
        return Ok(());
    }

    let mut store = ConfigStore::open(config_path.to_path_buf())?;
    store.ensure_recent_defaults();

    let selected_llm = store.select_llm_profile(args.llm_interface.as_deref())?;
    let profile = store
        .config()
        .get_llm_profile(&selected_llm)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownProfile(selected_llm.clone()))?;

    let (request, credential) =
        preflight(&args.idea, &selected_llm, &profile, |name| std::env::var(name).ok())?;

    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;
    let llm_adapter = create_llm_adapter_from_profile(&profile, &credential)?;

    sink.log(LogRecord::new(
        LogLevel::Info,
        format!(
            "Crafting your story with `{}` ({})...",
            selected_llm, profile.model_name
        ),
    ));

    let document = StoryService::new(&prompts, sink).generate(llm_adapter.as_ref(), &request)?;
    let rendered = document.render();
    print!("{rendered}");

    if let Some(output) = args.output {
        fs::write(&output, &rendered).map_err(|source| CliError::Io {
            path: output.clone(),
            source,
        })?;
        sink.log(LogRecord::new(
            LogLevel::Info,
            format!("Story written to {}", output.display()),
        ));
    }

    if store.path().exists() {
        store.touch_llm_interface(selected_llm);
        store.save()?;
    }

    Ok(())
}

fn run_test_llm(config_path: &Path, args: TestLlmArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let mut store = ConfigStore::open(config_path.to_path_buf())?;
    store.ensure_recent_defaults();

    let selected = store.select_llm_profile(args.interface.as_deref())?;
    if let Some(profile) = store.config().get_llm_profile(&selected) {
        sink.log(LogRecord::new(
            LogLevel::Debug,
            format!(
                "model: {} | interface: {} | base URL: {}",
                profile.model_name, profile.interface_format, profile.base_url
            ),
        ));
    }

    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;
    let messages = prompts.compose("connection_test", &PromptArguments::new())?;
    let adapter = create_llm_adapter(store.config(), &selected)?;

    sink.log(LogRecord::new(
        LogLevel::Info,
        format!("Testing LLM profile `{selected}`..."),
    ));
    let response = adapter.invoke(&messages)?;
    if response.trim().is_empty() {
        return Err(CliError::TestFailed(format!(
            "profile `{selected}` returned an empty reply"
        )));
    }

    sink.log(LogRecord::new(
        LogLevel::Info,
        format!("LLM profile `{selected}` works. Reply: {}", response.trim()),
    ));

    if store.path().exists() {
        store.touch_llm_interface(selected);
        store.save()?;
    }
    Ok(())
}

fn run_list_prompts(config_path: &Path) -> Result<(), CliError> {
    let store = ConfigStore::open(config_path.to_path_buf())?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;

    for template in prompts.templates() {
        let source = match template.metadata().source().as_path() {
            Some(path) => path.display().to_string(),
            None => "built-in".to_string(),
        };
        println!(
            "{:<16} {:<12} {}",
            template.key(),
            source,
            template.metadata().description().unwrap_or_default()
        );
    }
    Ok(())
}

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Preflight(#[from] PreflightError),
    #[error("failed to write `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("LLM call failed: {0}")]
    Model(#[from] LanguageModelError),
    #[error("failed to load prompts: {0}")]
    Prompt(#[from] PromptError),
    #[error("story generation failed: {0}")]
    Story(#[from] StoryError),
    #[error("{0}")]
    TestFailed(String),
}

#[derive(Parser)]
#[command(
    name = "storyctl",
    version,
    about = "Expand a story idea into outline, character, setting, dialogue and twist"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Log prompts, responses and HTTP activity
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a story document from an idea
    Generate(GenerateArgs),
    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Prompt template helpers
    #[command(subcommand)]
    Prompts(PromptsCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Send a short test prompt through an LLM profile
    TestLlm(TestLlmArgs),
}

#[derive(Subcommand)]
enum PromptsCommand {
    /// List the prompt templates in effect and where they come from
    List,
}

#[derive(Args)]
struct GenerateArgs {
    /// Story idea, e.g. "A detective story set in Mumbai with a twist ending"
    #[arg(value_name = "IDEA")]
    idea: String,
    /// LLM profile to use; defaults to the most recently used one
    #[arg(long)]
    llm_interface: Option<String>,
    /// Also write the document to this file
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct TestLlmArgs {
    /// Profile to test; defaults to the most recently used one
    #[arg(long)]
    interface: Option<String>,
}

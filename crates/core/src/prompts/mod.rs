use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::PromptConfig;
use crate::model::ChatMessage;

const BUILT_IN_PROMPTS: &str = include_str!("../../prompts/default.toml");

pub type PromptArguments = HashMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptSource {
    BuiltIn,
    File(PathBuf),
}

impl PromptSource {
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::BuiltIn)
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::BuiltIn => None,
            Self::File(path) => Some(path.as_path()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PromptMetadata {
    description: Option<String>,
    source: PromptSource,
}

impl PromptMetadata {
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn source(&self) -> &PromptSource {
        &self.source
    }
}

/// One agent: a fixed role statement plus a user template with `{name}`
/// placeholders. `{{` and `}}` render as literal braces.
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    key: String,
    system: Option<String>,
    template: String,
    segments: Vec<TemplateSegment>,
    required: BTreeSet<String>,
    metadata: PromptMetadata,
}

impl PromptTemplate {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn metadata(&self) -> &PromptMetadata {
        &self.metadata
    }

    pub fn render(&self, arguments: &PromptArguments) -> Result<String, PromptError> {
        for required in &self.required {
            if !arguments.contains_key(required) {
                return Err(PromptError::MissingArgument {
                    key: self.key.clone(),
                    argument: required.clone(),
                });
            }
        }

        let mut output = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => output.push_str(text),
                TemplateSegment::Placeholder(name) => {
                    if let Some(value) = arguments.get(name) {
                        output.push_str(value);
                    }
                }
            }
        }

        Ok(output)
    }

    pub fn render_with<I, K, V>(&self, arguments: I) -> Result<String, PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.render(&collect_arguments(arguments))
    }

    /// Builds the message list sent to the model: the role statement (when
    /// present) followed by the rendered request.
    pub fn compose(&self, arguments: &PromptArguments) -> Result<Vec<ChatMessage>, PromptError> {
        let user = self.render(arguments)?;
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system.as_deref() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(user));
        Ok(messages)
    }

    fn from_raw(key: String, raw: RawPrompt, source: PromptSource) -> Result<Self, PromptError> {
        let (segments, placeholders) = parse_template(&raw.template);
        let required = if raw.required.is_empty() {
            placeholders
        } else {
            let mut set = BTreeSet::new();
            for argument in raw.required {
                let trimmed = argument.trim().to_string();
                if !placeholders.contains(&trimmed) {
                    return Err(PromptError::InvalidRequired {
                        key: key.clone(),
                        argument: trimmed,
                    });
                }
                set.insert(trimmed);
            }
            set
        };

        let system = raw
            .system
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        Ok(Self {
            key,
            system,
            template: raw.template,
            segments,
            required,
            metadata: PromptMetadata {
                description: raw.description,
                source,
            },
        })
    }
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt `{0}` not found")]
    NotFound(String),
    #[error("missing argument `{argument}` when rendering prompt `{key}`")]
    MissingArgument { key: String, argument: String },
    #[error("failed to read prompt file `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse built-in prompt definitions: {0}")]
    ParseBuiltIn(toml::de::Error),
    #[error("failed to parse prompt file `{path}` as TOML: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse prompt file `{path}` as YAML: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error(
        "required key `{argument}` declared for prompt `{key}` but no matching placeholder was found"
    )]
    InvalidRequired { key: String, argument: String },
}

#[derive(Debug)]
pub struct PromptRegistry {
    prompts: BTreeMap<String, PromptTemplate>,
    directories: Vec<PathBuf>,
}

impl PromptRegistry {
    pub fn new() -> Result<Self, PromptError> {
        Self::from_prompt_config(&PromptConfig::default())
    }

    pub fn from_prompt_config(config: &PromptConfig) -> Result<Self, PromptError> {
        Self::with_directories(config.custom_directories.clone())
    }

    pub fn with_custom_directories<P: AsRef<Path>>(directories: &[P]) -> Result<Self, PromptError> {
        let dirs = directories
            .iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        Self::with_directories(dirs)
    }

    pub fn reload(&mut self) -> Result<(), PromptError> {
        self.prompts = Self::build_prompts(&self.directories)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PromptTemplate> {
        self.prompts.get(key)
    }

    pub fn templates(&self) -> impl Iterator<Item = &PromptTemplate> {
        self.prompts.values()
    }

    pub fn format(&self, key: &str, args: &PromptArguments) -> Result<String, PromptError> {
        self.template(key)?.render(args)
    }

    pub fn format_with<I, K, V>(&self, key: &str, arguments: I) -> Result<String, PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.template(key)?.render_with(arguments)
    }

    pub fn compose(
        &self,
        key: &str,
        args: &PromptArguments,
    ) -> Result<Vec<ChatMessage>, PromptError> {
        self.template(key)?.compose(args)
    }

    fn template(&self, key: &str) -> Result<&PromptTemplate, PromptError> {
        self.get(key)
            .ok_or_else(|| PromptError::NotFound(key.to_string()))
    }

    fn with_directories(directories: Vec<PathBuf>) -> Result<Self, PromptError> {
        let mut registry = Self {
            prompts: BTreeMap::new(),
            directories,
        };
        registry.reload()?;
        Ok(registry)
    }

    fn build_prompts(
        directories: &[PathBuf],
    ) -> Result<BTreeMap<String, PromptTemplate>, PromptError> {
        let mut prompts = BTreeMap::new();

        let built_in = parse_document(BUILT_IN_PROMPTS, PromptSource::BuiltIn)?;
        for template in built_in {
            prompts.insert(template.key().to_string(), template);
        }

        for dir in directories {
            load_directory(dir, &mut prompts)?;
        }

        Ok(prompts)
    }
}

fn collect_arguments<I, K, V>(arguments: I) -> PromptArguments
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    arguments
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

fn load_directory(
    dir: &Path,
    prompts: &mut BTreeMap<String, PromptTemplate>,
) -> Result<(), PromptError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let mut files = Vec::new();
    let read_dir = fs::read_dir(dir).map_err(|source| PromptError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in read_dir {
        let entry = entry.map_err(|source| PromptError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) if file_type.is_file() => files.push(path),
            Ok(_) => {}
            Err(source) => {
                return Err(PromptError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    files.sort();

    for path in files {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        let templates = match ext.to_ascii_lowercase().as_str() {
            "toml" => {
                let contents = read_prompt_file(&path)?;
                parse_document(&contents, PromptSource::File(path.clone())).map_err(|err| {
                    match err {
                        PromptError::ParseBuiltIn(source) => PromptError::ParseToml {
                            path: path.clone(),
                            source,
                        },
                        other => other,
                    }
                })?
            }
            "yaml" | "yml" => {
                let contents = read_prompt_file(&path)?;
                let document: PromptDocument =
                    serde_yaml::from_str(&contents).map_err(|source| PromptError::ParseYaml {
                        path: path.clone(),
                        source,
                    })?;
                document.into_templates(&PromptSource::File(path.clone()))?
            }
            _ => continue,
        };

        for template in templates {
            prompts.insert(template.key().to_string(), template);
        }
    }

    Ok(())
}

fn read_prompt_file(path: &Path) -> Result<String, PromptError> {
    fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_document(source: &str, origin: PromptSource) -> Result<Vec<PromptTemplate>, PromptError> {
    let document: PromptDocument = toml::from_str(source).map_err(PromptError::ParseBuiltIn)?;
    document.into_templates(&origin)
}

#[derive(Debug, Deserialize)]
struct PromptDocument {
    #[serde(default)]
    prompts: BTreeMap<String, RawPrompt>,
}

impl PromptDocument {
    fn into_templates(self, origin: &PromptSource) -> Result<Vec<PromptTemplate>, PromptError> {
        self.prompts
            .into_iter()
            .map(|(key, raw)| PromptTemplate::from_raw(key, raw, origin.clone()))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawPrompt {
    #[serde(default, alias = "role")]
    system: Option<String>,
    #[serde(alias = "text")]
    template: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required: Vec<String>,
}

#[derive(Clone, Debug)]
enum TemplateSegment {
    Literal(String),
    Placeholder(String),
}

fn parse_template(template: &str) -> (Vec<TemplateSegment>, BTreeSet<String>) {
    let mut segments = Vec::new();
    let mut placeholders = BTreeSet::new();
    let mut buffer = String::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some('{')) {
                    chars.next();
                    buffer.push('{');
                    continue;
                }

                if !buffer.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut buffer)));
                }

                let mut placeholder = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    placeholder.push(next);
                }

                if closed {
                    let trimmed = placeholder.trim();
                    if trimmed.is_empty() {
                        segments.push(TemplateSegment::Literal("{}".to_string()));
                    } else {
                        let key = trimmed.to_string();
                        placeholders.insert(key.clone());
                        segments.push(TemplateSegment::Placeholder(key));
                    }
                } else {
                    buffer.push('{');
                    buffer.push_str(&placeholder);
                }
            }
            '}' => {
                if matches!(chars.peek(), Some('}')) {
                    chars.next();
                }
                buffer.push('}');
            }
            _ => buffer.push(ch),
        }
    }

    if !buffer.is_empty() {
        segments.push(TemplateSegment::Literal(buffer));
    }

    (segments, placeholders)
}

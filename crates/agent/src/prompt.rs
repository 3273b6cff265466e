//! System template loading and prompt assembly.
//!
//! The template is read and rendered once when the assembler is built.
//! Every request afterwards only pairs the rendered text with the user
//! message, so a bad template surfaces at startup and never mid-request.

use discovery_core::message::ChatMessage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("System template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("Failed to read system template {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to render system template: {0}")]
    Render(String),
}

/// The two messages of a turn before history is spliced in.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: ChatMessage,
    pub user: ChatMessage,
}

impl Prompt {
    /// `[system, user]`, system first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![self.system.clone(), self.user.clone()]
    }
}

/// An unrendered tera template (`{{ name }}` placeholders).
#[derive(Debug, Clone)]
pub struct SystemTemplate {
    source: String,
}

impl SystemTemplate {
    pub fn load(path: &Path) -> Result<Self, PromptError> {
        if !path.exists() {
            return Err(PromptError::TemplateNotFound(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path).map_err(|e| PromptError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self { source })
    }

    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn render(&self, params: &BTreeMap<String, String>) -> Result<String, PromptError> {
        let mut context = tera::Context::new();
        for (key, value) in params {
            context.insert(key.as_str(), value);
        }
        let mut tera = tera::Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, &self.source)
            .map_err(render_error)?;
        tera.render(TEMPLATE_NAME, &context).map_err(render_error)
    }
}

const TEMPLATE_NAME: &str = "system";

fn render_error(e: tera::Error) -> PromptError {
    // tera nests the useful message in the source chain
    let mut reason = e.to_string();
    let mut source = std::error::Error::source(&e);
    while let Some(inner) = source {
        reason = format!("{reason}: {inner}");
        source = inner.source();
    }
    PromptError::Render(reason)
}

/// Pairs the rendered system text with each user message.
pub struct PromptAssembler {
    system_text: String,
}

impl PromptAssembler {
    pub fn new(template: &SystemTemplate, params: &BTreeMap<String, String>) -> Result<Self, PromptError> {
        Ok(Self {
            system_text: template.render(params)?,
        })
    }

    pub fn from_config(config: &discovery_config::PromptConfig) -> Result<Self, PromptError> {
        Self::new(&SystemTemplate::load(&config.template_path)?, &config.params)
    }

    pub fn build(&self, user_message: impl Into<String>) -> Prompt {
        Prompt {
            system: ChatMessage::system(self.system_text.clone()),
            user: ChatMessage::user(user_message),
        }
    }

    pub fn system_text(&self) -> &str {
        &self.system_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::message::Role;

    fn params(name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("name".to_string(), name.to_string())])
    }

    #[test]
    fn renders_placeholders() {
        let template = SystemTemplate::from_source("Tu es {{ name }}.");
        let assembler = PromptAssembler::new(&template, &params("L'assistant IA officiel")).unwrap();
        assert_eq!(assembler.system_text(), "Tu es L'assistant IA officiel.");
    }

    #[test]
    fn build_puts_system_first() {
        let template = SystemTemplate::from_source("Tu es {{ name }}.");
        let assembler = PromptAssembler::new(&template, &params("Bot")).unwrap();
        let prompt = assembler.build("qui es tu ?");

        let messages = prompt.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "Tu es Bot.");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "qui es tu ?");
    }

    #[test]
    fn missing_param_is_render_error() {
        let template = SystemTemplate::from_source("Tu es {{ name }}.");
        let err = PromptAssembler::new(&template, &BTreeMap::new()).err().unwrap();
        assert!(matches!(err, PromptError::Render(_)));
    }

    #[test]
    fn unclosed_tag_is_render_error() {
        let template = SystemTemplate::from_source("Tu es {{ name.");
        let err = template.render(&params("Bot")).unwrap_err();
        assert!(matches!(err, PromptError::Render(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system-prompt.txt");
        std::fs::write(&path, "Bonjour, je suis {{ name }}").unwrap();

        let config = discovery_config::PromptConfig {
            template_path: path,
            params: params("Assistant"),
        };
        let assembler = PromptAssembler::from_config(&config).unwrap();
        assert_eq!(assembler.system_text(), "Bonjour, je suis Assistant");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SystemTemplate::load(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound(_)));
    }
}

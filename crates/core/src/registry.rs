//! Slash-command registry.
//!
//! Every recognised command is a [`CommandId`] variant, and [`definition_for`]
//! matches on it exhaustively, so adding a command without declaring its
//! deployment and input rule does not compile. Deployment keys are stored as
//! suffixes and namespaced with the configured prefix when the registry is
//! built at startup.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::args::split_arguments;
use crate::domain::inputs::InputMapping;
use crate::domain::plan::{InvocationPlan, PersonaTarget};
use crate::errors::RelayError;

const CONVERSATION_DEPLOYMENT: &str = "slack-app";
const IMAGE_PROMPT_DEPLOYMENT: &str = "image-creator-prompt";
const IMAGE_RENDER_DEPLOYMENT: &str = "image-creator";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    Blog,
    LinkedinPost,
    Mail,
    ContentToPersona,
    Image,
    PersonaInnovator,
    PersonaScience,
    PersonaPatient,
    AllPersonas,
}

impl CommandId {
    pub const ALL: [CommandId; 9] = [
        CommandId::Blog,
        CommandId::LinkedinPost,
        CommandId::Mail,
        CommandId::ContentToPersona,
        CommandId::Image,
        CommandId::PersonaInnovator,
        CommandId::PersonaScience,
        CommandId::PersonaPatient,
        CommandId::AllPersonas,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blog => "/blog",
            Self::LinkedinPost => "/linkedin-post",
            Self::Mail => "/mail",
            Self::ContentToPersona => "/content-to-persona",
            Self::Image => "/image",
            Self::PersonaInnovator => "/content-BEMelanoma-Innovator",
            Self::PersonaScience => "/content-BEMelanoma-Science",
            Self::PersonaPatient => "/content-BEMelanoma-Patient",
            Self::AllPersonas => "/content-BEMelanoma-All",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL.into_iter().find(|id| id.as_str() == trimmed)
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the raw command text becomes named inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputRule {
    /// Exactly this many quoted/whitespace-separated tokens, mapped in order.
    Positional(&'static [&'static str]),
    /// The whole trimmed text as one field; the argument parser is bypassed.
    RawText(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Persona {
    pub label: &'static str,
    pub deployment: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentSpec {
    Single(&'static str),
    ImageChain { prompt: &'static str, image: &'static str },
    FanOut(&'static [Persona]),
}

const PERSONA_INNOVATOR: Persona = Persona {
    label: "content-BEMelanoma-Innovator",
    deployment: "content-BEMelanoma-Innovator-creator",
};
const PERSONA_SCIENCE: Persona = Persona {
    label: "content-BEMelanoma-Science",
    deployment: "content-BEMelanoma-Science-creator",
};
const PERSONA_PATIENT: Persona = Persona {
    label: "content-BEMelanoma-Patient",
    deployment: "content-BEMelanoma-Patient-creator",
};
const ALL_PERSONAS: [Persona; 3] = [PERSONA_INNOVATOR, PERSONA_SCIENCE, PERSONA_PATIENT];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandDefinition {
    pub id: CommandId,
    pub deployment: DeploymentSpec,
    pub inputs: InputRule,
}

pub fn definition_for(id: CommandId) -> CommandDefinition {
    let (deployment, inputs) = match id {
        CommandId::Blog => (
            DeploymentSpec::Single("blog-post-creator"),
            InputRule::Positional(&["keywords", "content"]),
        ),
        CommandId::LinkedinPost => (
            DeploymentSpec::Single("linkedin-post-creator"),
            InputRule::Positional(&["user", "content"]),
        ),
        CommandId::Mail => (
            DeploymentSpec::Single("mail-creator"),
            InputRule::Positional(&["to", "from", "content"]),
        ),
        CommandId::ContentToPersona => {
            (DeploymentSpec::Single("content-to-persona-creator"), InputRule::RawText("content"))
        }
        CommandId::Image => (
            DeploymentSpec::ImageChain {
                prompt: IMAGE_PROMPT_DEPLOYMENT,
                image: IMAGE_RENDER_DEPLOYMENT,
            },
            InputRule::RawText("goal_of_image"),
        ),
        CommandId::PersonaInnovator => {
            (DeploymentSpec::Single(PERSONA_INNOVATOR.deployment), InputRule::RawText("content"))
        }
        CommandId::PersonaScience => {
            (DeploymentSpec::Single(PERSONA_SCIENCE.deployment), InputRule::RawText("content"))
        }
        CommandId::PersonaPatient => {
            (DeploymentSpec::Single(PERSONA_PATIENT.deployment), InputRule::RawText("content"))
        }
        CommandId::AllPersonas => {
            (DeploymentSpec::FanOut(&ALL_PERSONAS), InputRule::RawText("content"))
        }
    };

    CommandDefinition { id, deployment, inputs }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(
        "deployment key prefix `{0}` may only contain ASCII letters, digits, `-` and `_`"
    )]
    InvalidKeyPrefix(String),
}

#[derive(Clone, Debug)]
pub struct CommandRegistry {
    key_prefix: String,
    definitions: Vec<CommandDefinition>,
}

impl CommandRegistry {
    pub fn new(key_prefix: impl Into<String>) -> Result<Self, RegistryError> {
        let key_prefix = key_prefix.into().trim().trim_end_matches('-').to_owned();
        if !is_valid_prefix(&key_prefix) {
            return Err(RegistryError::InvalidKeyPrefix(key_prefix));
        }

        let definitions = CommandId::ALL.into_iter().map(definition_for).collect();
        Ok(Self { key_prefix, definitions })
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn definitions(&self) -> &[CommandDefinition] {
        &self.definitions
    }

    pub fn lookup(&self, command: &str) -> Result<&CommandDefinition, RelayError> {
        CommandId::parse(command)
            .and_then(|id| self.definitions.iter().find(|definition| definition.id == id))
            .ok_or_else(|| RelayError::UnrecognizedCommand(command.trim().to_owned()))
    }

    /// Full deployment key for a registry suffix.
    pub fn deployment_key(&self, suffix: &str) -> String {
        if self.key_prefix.is_empty() {
            suffix.to_owned()
        } else {
            format!("{}-{suffix}", self.key_prefix)
        }
    }

    pub fn usage(&self, id: CommandId) -> String {
        match definition_for(id).inputs {
            InputRule::Positional(fields) => {
                let placeholders =
                    fields.iter().map(|field| format!("\"<{field}>\"")).collect::<Vec<_>>();
                if placeholders.is_empty() {
                    format!("Usage: {id}")
                } else {
                    format!("Usage: {id} {}", placeholders.join(" "))
                }
            }
            InputRule::RawText(field) => format!("Usage: {id} <{field}>"),
        }
    }

    /// Resolves a slash command and its raw text into the work to perform.
    pub fn plan(&self, command: &str, raw_text: &str) -> Result<InvocationPlan, RelayError> {
        let definition = *self.lookup(command)?;
        let inputs = self.map_inputs(&definition, raw_text)?;

        Ok(match definition.deployment {
            DeploymentSpec::Single(suffix) => InvocationPlan::Single {
                deployment_key: self.deployment_key(suffix),
                inputs,
                context: None,
            },
            DeploymentSpec::ImageChain { prompt, image } => InvocationPlan::ImageChain {
                prompt_key: self.deployment_key(prompt),
                image_key: self.deployment_key(image),
                inputs,
            },
            DeploymentSpec::FanOut(personas) => InvocationPlan::FanOut {
                personas: personas
                    .iter()
                    .map(|persona| PersonaTarget {
                        label: persona.label.to_owned(),
                        deployment_key: self.deployment_key(persona.deployment),
                    })
                    .collect(),
                inputs,
            },
        })
    }

    /// Plan for a mention or direct message, optionally carrying attachment text.
    pub fn conversation_plan(&self, prompt: &str, document: Option<String>) -> InvocationPlan {
        let document = document.filter(|text| !text.trim().is_empty());
        let mut context = Map::new();
        let mut inputs = InputMapping::new();

        match document {
            Some(document) => {
                context.insert("environments".to_owned(), json!([]));
                context.insert("doc".to_owned(), Value::Null);
                inputs.insert("doc", document);
            }
            None => {
                context.insert("doc".to_owned(), Value::Bool(false));
            }
        }
        inputs.insert("prompt", prompt.trim());

        InvocationPlan::Single {
            deployment_key: self.deployment_key(CONVERSATION_DEPLOYMENT),
            inputs,
            context: Some(context),
        }
    }

    fn map_inputs(
        &self,
        definition: &CommandDefinition,
        raw_text: &str,
    ) -> Result<InputMapping, RelayError> {
        let command = definition.id.as_str();
        match definition.inputs {
            InputRule::RawText(field) => {
                let text = raw_text.trim();
                if text.is_empty() {
                    return Err(RelayError::malformed(
                        command,
                        raw_text,
                        format!(
                            "{command} needs some text to work with. {}",
                            self.usage(definition.id)
                        ),
                    ));
                }
                Ok(InputMapping::new().with(field, text))
            }
            InputRule::Positional(fields) => {
                let tokens = split_arguments(command, raw_text)?;
                if tokens.len() != fields.len() {
                    return Err(RelayError::malformed(
                        command,
                        raw_text,
                        format!(
                            "{command} expects {} argument(s) but got {}. {}",
                            fields.len(),
                            tokens.len(),
                            self.usage(definition.id)
                        ),
                    ));
                }

                Ok(fields.iter().zip(tokens).fold(InputMapping::new(), |inputs, (field, token)| {
                    inputs.with(*field, token)
                }))
            }
        }
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    prefix
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'))
}

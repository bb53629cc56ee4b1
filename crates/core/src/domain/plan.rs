use serde_json::{Map, Value};

use crate::domain::inputs::InputMapping;
use crate::errors::RelayError;

/// One labelled deployment in a fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonaTarget {
    pub label: String,
    pub deployment_key: String,
}

/// The downstream work a background unit performs for one request.
#[derive(Clone, Debug, PartialEq)]
pub enum InvocationPlan {
    Single { deployment_key: String, inputs: InputMapping, context: Option<Map<String, Value>> },
    /// Stage one turns `inputs` into a prompt; stage two renders it as an image.
    ImageChain { prompt_key: String, image_key: String, inputs: InputMapping },
    /// Same inputs sent to every persona; results are joined in persona order.
    FanOut { personas: Vec<PersonaTarget>, inputs: InputMapping },
}

impl InvocationPlan {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Single { .. } => "single",
            Self::ImageChain { .. } => "image_chain",
            Self::FanOut { .. } => "fan_out",
        }
    }

    pub fn deployment_keys(&self) -> Vec<&str> {
        match self {
            Self::Single { deployment_key, .. } => vec![deployment_key.as_str()],
            Self::ImageChain { prompt_key, image_key, .. } => {
                vec![prompt_key.as_str(), image_key.as_str()]
            }
            Self::FanOut { personas, .. } => {
                personas.iter().map(|persona| persona.deployment_key.as_str()).collect()
            }
        }
    }

    pub fn inputs(&self) -> &InputMapping {
        match self {
            Self::Single { inputs, .. }
            | Self::ImageChain { inputs, .. }
            | Self::FanOut { inputs, .. } => inputs,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeploymentOutcome {
    Text(String),
    Image { url: String },
    Failed(RelayError),
}

impl DeploymentOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

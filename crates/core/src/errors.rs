use thiserror::Error;

/// Which downstream call a deployment failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamStage {
    Single,
    Conversation,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("malformed arguments for `{command}`: {reason}")]
    MalformedArguments { command: String, raw_text: String, reason: String },
    #[error("unrecognized command `{0}`")]
    UnrecognizedCommand(String),
    #[error("deployment `{deployment_key}` returned no content")]
    UpstreamEmpty { deployment_key: String },
    #[error("deployment `{deployment_key}` failed: {detail}")]
    UpstreamFailure { deployment_key: String, stage: UpstreamStage, detail: String },
    #[error("prompt generation via `{deployment_key}` failed: {detail}")]
    PromptGenerationFailed { deployment_key: String, detail: String },
    #[error("image generation via `{deployment_key}` failed: {detail}")]
    ImageGenerationFailed { deployment_key: String, detail: String },
    #[error("message could not be published: {0}")]
    PublishFailure(String),
}

impl RelayError {
    /// Text shown to the Slack user. Upstream detail never appears here.
    pub fn user_message(&self) -> String {
        match self {
            Self::MalformedArguments { reason, .. } => reason.clone(),
            Self::UnrecognizedCommand(command) => {
                format!("Sorry, I don't recognize the command '{command}'.")
            }
            Self::UpstreamEmpty { .. } => "There was an error processing your request.".to_owned(),
            Self::UpstreamFailure { .. } => {
                "An error occurred while processing your request.".to_owned()
            }
            Self::PromptGenerationFailed { .. } => {
                "There was an error processing your prompt request.".to_owned()
            }
            Self::ImageGenerationFailed { .. } => {
                "There was an error generating your image.".to_owned()
            }
            Self::PublishFailure(_) => "The reply could not be delivered.".to_owned(),
        }
    }

    pub fn malformed(
        command: impl Into<String>,
        raw_text: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedArguments {
            command: command.into(),
            raw_text: raw_text.into(),
            reason: reason.into(),
        }
    }

    /// Validation failures are answered inline and never reach a deployment.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MalformedArguments { .. } | Self::UnrecognizedCommand(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{RelayError, UpstreamStage};

    #[test]
    fn upstream_failure_does_not_leak_detail_to_users() {
        let error = RelayError::UpstreamFailure {
            deployment_key: "acme-blog-post-creator".to_owned(),
            stage: UpstreamStage::Single,
            detail: "connection reset by peer at 10.0.0.4:443".to_owned(),
        };

        assert!(error.to_string().contains("connection reset"));
        assert!(!error.user_message().contains("connection reset"));
        assert_eq!(error.user_message(), "An error occurred while processing your request.");
    }

    #[test]
    fn unrecognized_command_names_the_command() {
        let error = RelayError::UnrecognizedCommand("/poem".to_owned());
        assert_eq!(error.user_message(), "Sorry, I don't recognize the command '/poem'.");
        assert!(error.is_validation());
    }

    #[test]
    fn malformed_arguments_surface_their_reason() {
        let error = RelayError::malformed("/blog", "seo", "Usage: /blog \"<keywords>\" \"<content>\"");
        assert!(error.user_message().starts_with("Usage: /blog"));
        assert!(error.is_validation());
    }

    #[test]
    fn image_chain_failures_have_distinct_messages() {
        let prompt = RelayError::PromptGenerationFailed {
            deployment_key: "image-creator-prompt".to_owned(),
            detail: "empty".to_owned(),
        };
        let image = RelayError::ImageGenerationFailed {
            deployment_key: "image-creator".to_owned(),
            detail: "empty".to_owned(),
        };

        assert_ne!(prompt.user_message(), image.user_message());
        assert!(!prompt.is_validation());
    }
}

use promptrelay_core::{InvocationPlan, ReplyTarget};
use serde::{Deserialize, Serialize};

/// Form fields Slack posts for a slash command. Every field defaults so that a
/// sparse body still reaches the dispatcher instead of failing extraction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub response_url: String,
    #[serde(default)]
    pub ts: Option<String>,
}

impl SlashCommandPayload {
    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget::new(self.channel_id.clone(), self.ts.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    pub text: String,
}

impl CommandReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn acknowledge(payload: &SlashCommandPayload, plan: &InvocationPlan) -> Self {
        let text = match plan {
            InvocationPlan::FanOut { .. } => format!(
                "Processing your request for all personas with content: '{}'",
                payload.text
            ),
            _ => format!(
                "Processing your request for command: '{}' with content: '{}'",
                payload.command, payload.text
            ),
        };
        Self { text }
    }
}

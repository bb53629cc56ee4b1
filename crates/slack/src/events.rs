use serde::Deserialize;
use serde_json::Value;

const FILE_SHARE_SUBTYPE: &str = "file_share";

/// Body of an Events API callback. URL verification requests carry only `challenge`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub challenge: Option<Value>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event: Option<SlackEvent>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SlackEvent {
    #[serde(default, rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlackFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub url_private_download: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Mention,
    DirectMessage,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mention => "app_mention",
            Self::DirectMessage => "direct_message",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    NoEvent,
    OwnMessage,
    BotMessage,
    Subtype,
    UnsupportedType,
    MissingFields,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoEvent => "no_event",
            Self::OwnMessage => "own_message",
            Self::BotMessage => "bot_message",
            Self::Subtype => "subtype",
            Self::UnsupportedType => "unsupported_type",
            Self::MissingFields => "missing_fields",
        }
    }
}

/// A user message addressed to the bot. Mentions lose their leading bot token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub channel_id: String,
    pub thread_ts: String,
    pub user_id: String,
    pub prompt: String,
    pub files: Vec<SlackFile>,
}

impl InboundMessage {
    pub fn is_empty(&self) -> bool {
        self.prompt.is_empty() && self.files.is_empty()
    }
}

/// Decides whether an event is a user message the bot must answer.
///
/// The author check runs first so the bot never reacts to its own posts,
/// whatever their type.
pub fn classify(event: &SlackEvent, bot_user_id: &str) -> Result<InboundMessage, IgnoreReason> {
    if event.user.as_deref() == Some(bot_user_id) {
        return Err(IgnoreReason::OwnMessage);
    }
    if event.bot_id.is_some() {
        return Err(IgnoreReason::BotMessage);
    }
    if event.subtype.as_deref().is_some_and(|subtype| subtype != FILE_SHARE_SUBTYPE) {
        return Err(IgnoreReason::Subtype);
    }

    let kind = match (event.event_type.as_str(), event.channel_type.as_deref()) {
        ("app_mention", _) => MessageKind::Mention,
        ("message", Some("im")) => MessageKind::DirectMessage,
        _ => return Err(IgnoreReason::UnsupportedType),
    };

    let (Some(channel_id), Some(ts), Some(user_id)) =
        (event.channel.as_ref(), event.ts.as_ref(), event.user.as_ref())
    else {
        return Err(IgnoreReason::MissingFields);
    };

    let text = event.text.as_deref().unwrap_or_default();
    let prompt = match kind {
        MessageKind::Mention => strip_leading_mention(text),
        MessageKind::DirectMessage => text.trim(),
    };

    Ok(InboundMessage {
        kind,
        channel_id: channel_id.clone(),
        thread_ts: event.thread_ts.clone().unwrap_or_else(|| ts.clone()),
        user_id: user_id.clone(),
        prompt: prompt.to_owned(),
        files: event.files.clone(),
    })
}

/// Removes a leading `<@U…>` token and surrounding whitespace.
pub fn strip_leading_mention(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("<@") {
        if let Some(end) = rest.find('>') {
            return rest[end + 1..].trim();
        }
    }
    trimmed
}

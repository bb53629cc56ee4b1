use promptrelay_core::RelayError;
use serde::Serialize;

pub const IMAGE_TITLE: &str = "Generated Image";
pub const IMAGE_ALT_TEXT: &str = "Generated image";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Image { block_id: String, title: TextObject, image_url: String, alt_text: String },
}

/// A message ready for `chat.postMessage`. `fallback_text` is sent as the
/// top-level `text`, which Slack shows in notifications and when blocks are absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn image(
        mut self,
        block_id: impl Into<String>,
        title: impl Into<String>,
        image_url: impl Into<String>,
        alt_text: impl Into<String>,
    ) -> Self {
        self.blocks.push(Block::Image {
            block_id: block_id.into(),
            title: TextObject::plain(title),
            image_url: image_url.into(),
            alt_text: alt_text.into(),
        });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

/// Plain text reply. Slack renders the top-level `text` itself when there are no blocks.
pub fn text_message(text: impl Into<String>) -> MessageTemplate {
    MessageBuilder::new(text).build()
}

pub fn image_message(image_url: &str) -> MessageTemplate {
    MessageBuilder::new(IMAGE_TITLE)
        .image("relay.image.result.v1", IMAGE_TITLE, image_url, IMAGE_ALT_TEXT)
        .build()
}

pub fn error_message(error: &RelayError) -> MessageTemplate {
    let summary = error.user_message();
    MessageBuilder::new(summary.clone())
        .section("relay.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .build()
}

use std::sync::Arc;

use promptrelay_core::{DeploymentOutcome, RelayError, ReplyTarget};
use tracing::{info, warn};

use crate::blocks::{error_message, image_message, text_message, MessageTemplate};
use crate::client::SlackMessenger;

/// Posts outcomes back into Slack. Delivery failures end here: they are logged
/// and reported to the caller, never retried.
#[derive(Clone)]
pub struct ResultPublisher {
    messenger: Arc<dyn SlackMessenger>,
}

impl ResultPublisher {
    pub fn new(messenger: Arc<dyn SlackMessenger>) -> Self {
        Self { messenger }
    }

    pub async fn publish(&self, target: &ReplyTarget, outcome: DeploymentOutcome) {
        let message = render(&outcome);
        if self.deliver(target, &message).await.is_ok() {
            info!(
                event_name = "relay.reply.published",
                channel_id = %target.channel_id,
                success = outcome.is_success(),
                "reply published"
            );
        }
    }

    pub async fn post_text(&self, target: &ReplyTarget, text: &str) -> Result<(), RelayError> {
        self.deliver(target, &text_message(text)).await
    }

    async fn deliver(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
    ) -> Result<(), RelayError> {
        self.messenger.post_message(target, message).await.map_err(|error| {
            warn!(
                event_name = "relay.reply.publish_failed",
                channel_id = %target.channel_id,
                thread_ts = target.thread_ts.as_deref().unwrap_or(""),
                error = %error,
                "failed to post message to slack"
            );
            RelayError::PublishFailure(error.to_string())
        })
    }
}

pub fn render(outcome: &DeploymentOutcome) -> MessageTemplate {
    match outcome {
        DeploymentOutcome::Text(text) => text_message(text.clone()),
        DeploymentOutcome::Image { url } => image_message(url),
        DeploymentOutcome::Failed(error) => error_message(error),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use promptrelay_core::{DeploymentOutcome, RelayError, ReplyTarget};

    use super::{render, ResultPublisher};
    use crate::blocks::Block;
    use crate::test_support::RecordingMessenger;

    #[tokio::test]
    async fn text_outcome_is_posted_to_the_thread() {
        let messenger = Arc::new(RecordingMessenger::default());
        let publisher = ResultPublisher::new(messenger.clone());
        let target = ReplyTarget::thread("C1", "1.1");

        publisher.publish(&target, DeploymentOutcome::Text("draft ready".to_owned())).await;

        let posts = messenger.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, target);
        assert_eq!(posts[0].1.fallback_text, "draft ready");
    }

    #[tokio::test]
    async fn post_failure_is_reported_not_raised() {
        let messenger = Arc::new(RecordingMessenger::failing());
        let publisher = ResultPublisher::new(messenger.clone());
        let target = ReplyTarget::new("C1", None);

        publisher.publish(&target, DeploymentOutcome::Text("lost".to_owned())).await;
        let error = publisher.post_text(&target, "also lost").await.expect_err("post fails");

        assert!(matches!(error, RelayError::PublishFailure(_)));
        assert_eq!(messenger.attempts(), 2);
    }

    #[test]
    fn image_outcome_renders_an_image_block() {
        let message = render(&DeploymentOutcome::Image { url: "https://img.example/x.png".to_owned() });
        assert!(matches!(
            message.blocks.as_slice(),
            [Block::Image { image_url, .. }] if image_url == "https://img.example/x.png"
        ));
    }

    #[test]
    fn failed_outcome_renders_the_user_message() {
        let message = render(&DeploymentOutcome::Failed(RelayError::ImageGenerationFailed {
            deployment_key: "acme-image-creator".to_owned(),
            detail: "empty url".to_owned(),
        }));
        assert_eq!(message.fallback_text, "There was an error generating your image.");
    }
}

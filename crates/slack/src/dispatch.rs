use std::future::Future;
use std::sync::Arc;

use promptrelay_core::{CommandRegistry, ReplyTarget};
use promptrelay_deploy::DeploymentInvoker;
use serde_json::Value;
use tracing::{debug, info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::client::SlackMessenger;
use crate::commands::{CommandReply, SlashCommandPayload};
use crate::events::{classify, EventEnvelope, IgnoreReason, InboundMessage};
use crate::extract::first_document_text;
use crate::publisher::ResultPublisher;
use crate::spawner::TaskSpawner;

pub const EVENT_ACKNOWLEDGEMENT: &str = "Processing your request, please wait...";
pub const EMPTY_MESSAGE_HINT: &str =
    "Please include a question or attach a document when you mention me.";

#[derive(Clone, Debug, PartialEq)]
pub enum EventReply {
    Challenge(Value),
    Accepted,
    Ignored(IgnoreReason),
}

/// Turns inbound Slack traffic into an immediate acknowledgement plus one
/// detached unit of work that ends with a reply in the originating thread.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    invoker: DeploymentInvoker,
    messenger: Arc<dyn SlackMessenger>,
    publisher: ResultPublisher,
    spawner: Arc<dyn TaskSpawner>,
    bot_user_id: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        invoker: DeploymentInvoker,
        messenger: Arc<dyn SlackMessenger>,
        spawner: Arc<dyn TaskSpawner>,
        bot_user_id: impl Into<String>,
    ) -> Self {
        let publisher = ResultPublisher::new(Arc::clone(&messenger));
        Self { registry, invoker, messenger, publisher, spawner, bot_user_id: bot_user_id.into() }
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Validates a slash command and schedules its deployment run. Returns the
    /// text for the synchronous HTTP response; never waits on the deployment.
    pub fn handle_command(&self, payload: SlashCommandPayload) -> CommandReply {
        let correlation_id = Uuid::new_v4();
        info!(
            event_name = "ingress.slack.command_received",
            correlation_id = %correlation_id,
            command = %payload.command,
            channel_id = %payload.channel_id,
            user_id = %payload.user_id,
            "slash command received"
        );

        let plan = match self.registry.plan(&payload.command, &payload.text) {
            Ok(plan) => plan,
            Err(error) => {
                info!(
                    event_name = "ingress.slack.command_rejected",
                    correlation_id = %correlation_id,
                    command = %payload.command,
                    error = %error,
                    "slash command rejected"
                );
                return CommandReply::new(error.user_message());
            }
        };

        let reply = CommandReply::acknowledge(&payload, &plan);
        let target = payload.reply_target();
        let invoker = self.invoker.clone();
        let publisher = self.publisher.clone();
        let span = info_span!(
            "relay.work",
            correlation_id = %correlation_id,
            plan = plan.kind(),
            deployments = %plan.deployment_keys().join(",")
        );

        self.schedule(correlation_id, span, async move {
            let outcome = invoker.run(&plan).await;
            info!(
                event_name = "relay.work.completed",
                success = outcome.is_success(),
                "deployment work completed"
            );
            publisher.publish(&target, outcome).await;
        });
        reply
    }

    /// Handles one Events API callback. Acknowledges addressed messages in
    /// their thread before scheduling work; everything else is dropped.
    pub async fn handle_event(&self, envelope: EventEnvelope) -> EventReply {
        if let Some(challenge) = envelope.challenge {
            info!(event_name = "ingress.slack.url_verification", "answering url verification");
            return EventReply::Challenge(challenge);
        }

        let Some(event) = envelope.event else {
            return EventReply::Ignored(IgnoreReason::NoEvent);
        };
        let message = match classify(&event, &self.bot_user_id) {
            Ok(message) => message,
            Err(reason) => {
                debug!(
                    event_name = "ingress.slack.event_ignored",
                    event_type = %event.event_type,
                    reason = reason.as_str(),
                    "event ignored"
                );
                return EventReply::Ignored(reason);
            }
        };

        let correlation_id = Uuid::new_v4();
        info!(
            event_name = "ingress.slack.message_received",
            correlation_id = %correlation_id,
            slack_event_id = envelope.event_id.as_deref().unwrap_or("unknown"),
            kind = message.kind.as_str(),
            channel_id = %message.channel_id,
            user_id = %message.user_id,
            attachments = message.files.len(),
            "message received"
        );

        let target = ReplyTarget::thread(message.channel_id.clone(), message.thread_ts.clone());
        if message.is_empty() {
            // Delivery errors are already logged by the publisher.
            let _ = self.publisher.post_text(&target, EMPTY_MESSAGE_HINT).await;
            return EventReply::Accepted;
        }

        if let Err(error) = self.publisher.post_text(&target, EVENT_ACKNOWLEDGEMENT).await {
            debug!(
                event_name = "ingress.slack.ack_failed",
                correlation_id = %correlation_id,
                error = %error,
                "continuing without acknowledgement"
            );
        }

        self.schedule_conversation(correlation_id, message, target);
        EventReply::Accepted
    }

    fn schedule_conversation(
        &self,
        correlation_id: Uuid,
        message: InboundMessage,
        target: ReplyTarget,
    ) {
        let registry = Arc::clone(&self.registry);
        let messenger = Arc::clone(&self.messenger);
        let invoker = self.invoker.clone();
        let publisher = self.publisher.clone();
        let span =
            info_span!("relay.work", correlation_id = %correlation_id, plan = "conversation");

        self.schedule(correlation_id, span, async move {
            let document = first_document_text(messenger.as_ref(), &message.files).await;
            let plan = registry.conversation_plan(&message.prompt, document);
            let outcome = invoker.run(&plan).await;
            info!(
                event_name = "relay.work.completed",
                success = outcome.is_success(),
                "deployment work completed"
            );
            publisher.publish(&target, outcome).await;
        });
    }

    fn schedule<F>(&self, correlation_id: Uuid, span: Span, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawner.spawn(Box::pin(work.instrument(span)));
        debug!(
            event_name = "relay.work.scheduled",
            correlation_id = %correlation_id,
            "work scheduled"
        );
    }
}

//! Slack Integration - Events API and slash command relay
//!
//! This crate turns Slack traffic into deployment runs:
//! - **Slash Commands** (`commands`) - `/blog`, `/mail`, `/image`, persona commands
//! - **Events** (`events`) - app mentions and direct messages, with loop prevention
//! - **Attachments** (`extract`) - PDF, DOCX, PPTX and plain text documents
//! - **Block Kit** (`blocks`) - text and image replies
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Point Event Subscriptions at `/slack/events` and subscribe to
//!    `app_mention` and `message.im`
//! 3. Register the slash commands against `/slack/commands`
//! 4. Set env vars: `SLACK_BOT_TOKEN`, `ORQUESTA_API_KEY`
//!
//! # Architecture
//!
//! ```text
//! HTTP handler → Dispatcher ──ack──→ Slack
//!                    ↓ spawn
//!              DeploymentInvoker → ResultPublisher → Slack thread
//! ```
//!
//! # Key Types
//!
//! - `Dispatcher` - validates input, acknowledges, schedules background work
//! - `SlackMessenger` - Web API seam (`chat.postMessage`, `auth.test`, downloads)
//! - `TaskSpawner` - where background work runs
//! - `MessageBuilder` - Constructs Slack messages

pub mod blocks;
pub mod client;
pub mod commands;
pub mod dispatch;
pub mod events;
pub mod extract;
pub mod publisher;
pub mod spawner;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{BotIdentity, SlackApiError, SlackMessenger, SlackWebClient};
pub use commands::{CommandReply, SlashCommandPayload};
pub use dispatch::{Dispatcher, EventReply};
pub use events::EventEnvelope;
pub use spawner::{BackgroundTask, DeferredSpawner, TaskSpawner, TokioSpawner};

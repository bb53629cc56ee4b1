use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use promptrelay_core::ReplyTarget;

use crate::blocks::MessageTemplate;
use crate::client::{BotIdentity, SlackApiError, SlackMessenger};

#[derive(Default)]
pub(crate) struct RecordingMessenger {
    fail_posts: bool,
    files: HashMap<String, Vec<u8>>,
    attempts: AtomicUsize,
    posts: Mutex<Vec<(ReplyTarget, MessageTemplate)>>,
}

impl RecordingMessenger {
    pub(crate) fn failing() -> Self {
        Self { fail_posts: true, ..Self::default() }
    }

    pub(crate) fn with_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_owned(), bytes.to_vec());
        self
    }

    pub(crate) fn posts(&self) -> Vec<(ReplyTarget, MessageTemplate)> {
        self.posts.lock().expect("posts lock").clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.posts().into_iter().map(|(_, message)| message.fallback_text).collect()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlackMessenger for RecordingMessenger {
    async fn post_message(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_posts {
            return Err(SlackApiError::Api {
                method: "chat.postMessage".to_owned(),
                error: "not_in_channel".to_owned(),
            });
        }
        self.posts.lock().expect("posts lock").push((target.clone(), message.clone()));
        Ok(())
    }

    async fn download_file(&self, url: &str) -> Result<Vec<u8>, SlackApiError> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| SlackApiError::Download("status 404".to_owned()))
    }

    async fn auth_test(&self) -> Result<BotIdentity, SlackApiError> {
        Ok(BotIdentity { user_id: "UBOT".to_owned(), user_name: None, team: None })
    }
}

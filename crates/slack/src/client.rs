use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use promptrelay_core::{config::SlackConfig, ReplyTarget};
use reqwest::{redirect, Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::blocks::{Block, MessageTemplate};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_DOWNLOAD_REDIRECTS: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack client could not be built: {0}")]
    Build(String),
    #[error("slack request failed: {0}")]
    Transport(String),
    #[error("slack returned HTTP {status} for {method}")]
    Status { method: String, status: u16 },
    #[error("slack method {method} failed: {error}")]
    Api { method: String, error: String },
    #[error("slack response could not be decoded: {0}")]
    Decode(String),
    #[error("file download failed: {0}")]
    Download(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub user_name: Option<String>,
    pub team: Option<String>,
}

#[async_trait]
pub trait SlackMessenger: Send + Sync {
    async fn post_message(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;

    async fn download_file(&self, url: &str) -> Result<Vec<u8>, SlackApiError>;

    async fn auth_test(&self) -> Result<BotIdentity, SlackApiError>;
}

#[derive(Serialize)]
struct PostMessageBody<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<&'a [Block]>,
}

/// Slack Web API over HTTPS, authenticated with the bot token.
pub struct SlackWebClient {
    client: Client,
    download_client: Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(api_base_url: &str, bot_token: SecretString) -> Result<Self, SlackApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| SlackApiError::Build(error.to_string()))?;
        // Redirects are followed by hand so the bearer token survives host changes.
        let download_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|error| SlackApiError::Build(error.to_string()))?;

        Ok(Self {
            client,
            download_client,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            bot_token,
        })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackApiError> {
        Self::new(&config.api_base_url, config.bot_token.clone())
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<Value, SlackApiError> {
        let url = format!("{}/{method}", self.api_base_url);
        debug!(slack_method = method, "calling slack web api");

        let response = self
            .client
            .post(url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Status {
                method: method.to_owned(),
                status: status.as_u16(),
            });
        }

        let payload: Value =
            response.json().await.map_err(|error| SlackApiError::Decode(error.to_string()))?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = payload.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            return Err(SlackApiError::Api { method: method.to_owned(), error: error.to_owned() });
        }

        Ok(payload)
    }
}

#[async_trait]
impl SlackMessenger for SlackWebClient {
    async fn post_message(
        &self,
        target: &ReplyTarget,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let body = PostMessageBody {
            channel: &target.channel_id,
            thread_ts: target.thread_ts.as_deref(),
            text: &message.fallback_text,
            blocks: (!message.blocks.is_empty()).then_some(message.blocks.as_slice()),
        };
        self.call("chat.postMessage", &body).await.map(|_| ())
    }

    async fn download_file(&self, url: &str) -> Result<Vec<u8>, SlackApiError> {
        let mut current =
            Url::parse(url).map_err(|error| SlackApiError::Download(error.to_string()))?;
        let mut seen = HashSet::new();

        for _ in 0..MAX_DOWNLOAD_REDIRECTS {
            if !seen.insert(current.to_string()) {
                return Err(SlackApiError::Download(format!(
                    "redirect loop at {current}; the bot token may lack the files:read scope"
                )));
            }

            let response = self
                .download_client
                .get(current.clone())
                .bearer_auth(self.bot_token.expose_secret())
                .send()
                .await
                .map_err(|error| SlackApiError::Transport(error.to_string()))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        SlackApiError::Download("redirect without a location header".to_owned())
                    })?;
                current = current
                    .join(location)
                    .map_err(|error| SlackApiError::Download(error.to_string()))?;
                continue;
            }

            if !status.is_success() {
                return Err(SlackApiError::Download(format!("status {}", status.as_u16())));
            }

            let html = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.starts_with("text/html"));
            if html {
                return Err(SlackApiError::Download(
                    "received an HTML page instead of file content".to_owned(),
                ));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|error| SlackApiError::Transport(error.to_string()))?;
            return Ok(bytes.to_vec());
        }

        Err(SlackApiError::Download(format!("more than {MAX_DOWNLOAD_REDIRECTS} redirects")))
    }

    async fn auth_test(&self) -> Result<BotIdentity, SlackApiError> {
        let payload = self.call("auth.test", &serde_json::json!({})).await?;
        let field = |name: &str| payload.get(name).and_then(Value::as_str).map(str::to_owned);

        let user_id = field("user_id").ok_or_else(|| {
            SlackApiError::Decode("auth.test response has no user_id".to_owned())
        })?;
        Ok(BotIdentity { user_id, user_name: field("user"), team: field("team") })
    }
}

#[cfg(test)]
mod tests {
    use promptrelay_core::ReplyTarget;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{SlackApiError, SlackMessenger, SlackWebClient};
    use crate::blocks::{image_message, text_message};

    fn client(server: &MockServer) -> SlackWebClient {
        SlackWebClient::new(&format!("{}/api", server.uri()), "xoxb-test".to_owned().into())
            .expect("client builds")
    }

    #[tokio::test]
    async fn posts_text_into_a_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_json(json!({
                "channel": "C123",
                "thread_ts": "1700000000.000100",
                "text": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let target = ReplyTarget::thread("C123", "1700000000.000100");
        client(&server).post_message(&target, &text_message("hello")).await.expect("posted");
    }

    #[tokio::test]
    async fn posts_image_blocks_without_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(body_json(json!({
                "channel": "C123",
                "text": "Generated Image",
                "blocks": [{
                    "type": "image",
                    "block_id": "relay.image.result.v1",
                    "title": {"type": "plain_text", "text": "Generated Image"},
                    "image_url": "https://img.example/a.png",
                    "alt_text": "Generated image"
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let target = ReplyTarget::new("C123", None);
        client(&server)
            .post_message(&target, &image_message("https://img.example/a.png"))
            .await
            .expect("posted");
    }

    #[tokio::test]
    async fn ok_false_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let error = client(&server)
            .post_message(&ReplyTarget::new("C404", None), &text_message("hi"))
            .await
            .expect_err("api error");
        assert_eq!(
            error,
            SlackApiError::Api {
                method: "chat.postMessage".to_owned(),
                error: "channel_not_found".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn auth_test_returns_bot_user_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user_id": "UBOT",
                "user": "promptrelay",
                "team": "Acme"
            })))
            .mount(&server)
            .await;

        let identity = client(&server).auth_test().await.expect("auth ok");
        assert_eq!(identity.user_id, "UBOT");
        assert_eq!(identity.user_name.as_deref(), Some("promptrelay"));
    }

    #[tokio::test]
    async fn download_follows_redirects_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/F1/report.txt"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "/download/F1/report.txt"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/download/F1/report.txt"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("quarterly numbers"),
            )
            .mount(&server)
            .await;

        let bytes = client(&server)
            .download_file(&format!("{}/files/F1/report.txt", server.uri()))
            .await
            .expect("download ok");
        assert_eq!(bytes, b"quarterly numbers");
    }

    #[tokio::test]
    async fn download_rejects_html_login_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>sign in</html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let error = client(&server)
            .download_file(&format!("{}/files/F2/deck.pptx", server.uri()))
            .await
            .expect_err("html is rejected");
        assert!(matches!(error, SlackApiError::Download(_)));
    }
}

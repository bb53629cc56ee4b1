use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use promptrelay_slack::{CommandReply, Dispatcher, EventEnvelope, EventReply, SlashCommandPayload};
use serde_json::json;
use tracing::warn;

use crate::health;

const UNREADABLE_COMMAND: &str = "Sorry, I could not read that command. Please try again.";

#[derive(Clone)]
pub struct RelayState {
    dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/slack/commands", post(slack_commands))
        .with_state(RelayState { dispatcher })
}

/// Slack routes plus `/health`.
pub fn app_router(dispatcher: Arc<Dispatcher>) -> Router {
    let bot_user_id = dispatcher.bot_user_id().to_owned();
    router(dispatcher).merge(health::router(&bot_user_id))
}

async fn slack_events(
    State(state): State<RelayState>,
    payload: Result<Json<EventEnvelope>, JsonRejection>,
) -> Response {
    let Json(envelope) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(
                event_name = "ingress.slack.event_rejected",
                error = %rejection.body_text(),
                "malformed event body"
            );
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    match state.dispatcher.handle_event(envelope).await {
        EventReply::Challenge(challenge) => {
            (StatusCode::OK, Json(json!({ "challenge": challenge }))).into_response()
        }
        EventReply::Accepted | EventReply::Ignored(_) => StatusCode::OK.into_response(),
    }
}

async fn slack_commands(
    State(state): State<RelayState>,
    payload: Result<Form<SlashCommandPayload>, FormRejection>,
) -> Response {
    let Form(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(
                event_name = "ingress.slack.command_rejected",
                error = %rejection.body_text(),
                "malformed slash command body"
            );
            return (StatusCode::OK, Json(CommandReply::new(UNREADABLE_COMMAND))).into_response();
        }
    };

    let reply: CommandReply = state.dispatcher.handle_command(payload);
    (StatusCode::OK, Json(reply)).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use promptrelay_core::{CommandRegistry, ReplyTarget};
    use promptrelay_deploy::{
        DeploymentClient, DeploymentError, DeploymentInvoker, DeploymentRequest,
        DeploymentResponse,
    };
    use promptrelay_slack::blocks::MessageTemplate;
    use promptrelay_slack::{BotIdentity, DeferredSpawner, Dispatcher, SlackApiError, SlackMessenger};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::app_router;

    #[derive(Default)]
    struct CapturingSlack {
        posts: Mutex<Vec<(ReplyTarget, String)>>,
    }

    #[async_trait]
    impl SlackMessenger for CapturingSlack {
        async fn post_message(
            &self,
            target: &ReplyTarget,
            message: &MessageTemplate,
        ) -> Result<(), SlackApiError> {
            self.posts.lock().expect("lock").push((target.clone(), message.fallback_text.clone()));
            Ok(())
        }

        async fn download_file(&self, _url: &str) -> Result<Vec<u8>, SlackApiError> {
            Err(SlackApiError::Download("not available".to_owned()))
        }

        async fn auth_test(&self) -> Result<BotIdentity, SlackApiError> {
            Ok(BotIdentity { user_id: "UBOT".to_owned(), user_name: None, team: None })
        }
    }

    struct EchoDeployments;

    #[async_trait]
    impl DeploymentClient for EchoDeployments {
        async fn invoke(
            &self,
            request: &DeploymentRequest,
        ) -> Result<DeploymentResponse, DeploymentError> {
            Ok(DeploymentResponse { content: Some(format!("ran {}", request.key)), image_url: None })
        }
    }

    struct TestApp {
        router: Router,
        slack: Arc<CapturingSlack>,
        spawner: Arc<DeferredSpawner>,
    }

    fn app() -> TestApp {
        let slack = Arc::new(CapturingSlack::default());
        let spawner = Arc::new(DeferredSpawner::default());
        let dispatcher = Dispatcher::new(
            Arc::new(CommandRegistry::new("acme").expect("prefix")),
            DeploymentInvoker::new(Arc::new(EchoDeployments)),
            slack.clone(),
            spawner.clone(),
            "UBOT",
        );
        TestApp { router: app_router(Arc::new(dispatcher)), slack, spawner }
    }

    fn json_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/slack/commands")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.expect("body").to_vec()
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let app = app();
        let response = app
            .router
            .oneshot(json_request(r#"{"type":"url_verification","challenge":"c-123"}"#))
            .await
            .expect("responds");

        assert_eq!(response.status(), StatusCode::OK);
        let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
        assert_eq!(payload, json!({"challenge": "c-123"}));
    }

    #[tokio::test]
    async fn malformed_event_body_is_bad_request() {
        let app = app();
        let response = app.router.oneshot(json_request("{not json")).await.expect("responds");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mention_returns_empty_ok_and_replies_later() {
        let app = app();
        let body = json!({
            "type": "event_callback",
            "event": {
                "type": "app_mention",
                "user": "U1",
                "text": "<@UBOT> hello",
                "ts": "9.1",
                "channel": "C1"
            }
        })
        .to_string();

        let response = app.router.oneshot(json_request(&body)).await.expect("responds");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
        assert_eq!(app.spawner.pending(), 1);

        app.spawner.run_all().await;
        let posts = app.slack.posts.lock().expect("lock").clone();
        assert_eq!(
            posts,
            vec![
                (ReplyTarget::thread("C1", "9.1"), "Processing your request, please wait...".to_owned()),
                (ReplyTarget::thread("C1", "9.1"), "ran acme-slack-app".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn ignored_event_still_returns_ok() {
        let app = app();
        let body = json!({
            "type": "event_callback",
            "event": {"type": "message", "channel_type": "im", "user": "UBOT", "text": "hi", "ts": "1.1", "channel": "D1"}
        })
        .to_string();

        let response = app.router.oneshot(json_request(&body)).await.expect("responds");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.spawner.pending(), 0);
    }

    #[tokio::test]
    async fn slash_command_is_acknowledged_synchronously() {
        let app = app();
        let response = app
            .router
            .oneshot(form_request(
                "command=%2Fimage&text=sunset+over+dunes&channel_id=C9&user_id=U1&response_url=https%3A%2F%2Fhooks.slack.com%2Fx",
            ))
            .await
            .expect("responds");

        assert_eq!(response.status(), StatusCode::OK);
        let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
        assert_eq!(
            payload,
            json!({"text": "Processing your request for command: '/image' with content: 'sunset over dunes'"})
        );
        assert_eq!(app.spawner.pending(), 1);
    }

    #[tokio::test]
    async fn unreadable_command_body_still_gets_text_with_status_ok() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/slack/commands")
            .body(Body::from("command=%2Fblog&text=x"))
            .expect("request");

        let response = app.router.oneshot(request).await.expect("responds");

        assert_eq!(response.status(), StatusCode::OK);
        let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
        assert_eq!(payload, json!({"text": "Sorry, I could not read that command. Please try again."}));
        assert_eq!(app.spawner.pending(), 0);
        assert!(app.slack.posts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn usage_errors_are_returned_with_status_ok() {
        let app = app();
        let response = app
            .router
            .oneshot(form_request("command=%2Fblog&text=%22only+one%22&channel_id=C9"))
            .await
            .expect("responds");

        assert_eq!(response.status(), StatusCode::OK);
        let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
        assert!(payload["text"].as_str().is_some_and(|text| text.contains("Usage: /blog")));
        assert_eq!(app.spawner.pending(), 0);
    }
}

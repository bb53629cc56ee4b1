use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

pub const SERVICE_NAME: &str = "promptrelay-server";

#[derive(Clone)]
pub struct HealthState {
    bot_user_id: Arc<str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub bot_user_id: String,
    pub checked_at: String,
}

pub fn router(bot_user_id: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { bot_user_id: Arc::from(bot_user_id) })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: SERVICE_NAME,
        bot_user_id: state.bot_user_id.to_string(),
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::router;

    #[tokio::test]
    async fn health_endpoint_reports_identity() {
        let response = router("UBOT")
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health route responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["status"], "ready");
        assert_eq!(payload["service"], "promptrelay-server");
        assert_eq!(payload["bot_user_id"], "UBOT");
        assert!(payload["checked_at"].as_str().is_some_and(|value| !value.is_empty()));
    }
}

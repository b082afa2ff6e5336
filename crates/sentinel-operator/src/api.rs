//! HTTP routes of the operator.
//!
//! - `GET <endpoint>?apikey=..&project=..` - the event stream
//! - `GET <endpoint>/resources?apikey=..&project=..[&group=..]` - snapshot
//!   of the attached persister
//! - `GET <endpoint>/stats` - hub statistics

use crate::error::ApiError;
use crate::operator::{ConnectionInfo, SseOperator};
use crate::stream::event_stream;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use sentinel_realtime::HubStats;
use sentinel_types::{Resource, ResourceQuery};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Query parameters of the stream and snapshot routes.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    /// Credential checked by the verifier.
    pub apikey: Option<String>,
    /// Project to subscribe to.
    pub project: Option<String>,
    /// Restrict a snapshot to one group.
    pub group: Option<String>,
}

impl SseOperator {
    /// Routes serving this operator, ready to merge into an axum app.
    pub fn router(self: Arc<Self>) -> Router {
        let base = self.endpoint.trim_end_matches('/').to_string();
        let stream_path = if base.is_empty() { "/".to_string() } else { base.clone() };

        Router::new()
            .route(&stream_path, get(stream_handler))
            .route(&format!("{base}/resources"), get(list_resources))
            .route(&format!("{base}/stats"), get(get_stats))
            .with_state(self)
    }

    /// Check the credentials in `params`, returning the project on success.
    async fn authenticate(&self, params: &StreamParams) -> Result<String, ApiError> {
        let apikey = params.apikey.as_deref().unwrap_or_default();
        let project = params.project.as_deref().unwrap_or_default();

        if apikey.is_empty() || project.is_empty() {
            warn!(parent: &self.span, "Missing apikey or project");
            return Err(ApiError::Unauthorized(
                "apikey and project are required".to_string(),
            ));
        }

        if let Err(err) = self.verifier.verify(apikey, project).await {
            warn!(parent: &self.span, project_id = %project, error = %err, "Credential check failed");
            return Err(ApiError::Unauthorized(err.to_string()));
        }
        Ok(project.to_string())
    }
}

/// Accept a subscriber stream.
async fn stream_handler(
    State(operator): State<Arc<SseOperator>>,
    Query(params): Query<StreamParams>,
) -> Result<Response, ApiError> {
    let project = operator.authenticate(&params).await?;

    let (connection, receiver) = operator.hub.connect(&project);
    info!(
        parent: &operator.span,
        project_id = %project,
        connection_id = %connection.id,
        "Stream accepted"
    );
    operator.connected(&ConnectionInfo {
        id: connection.id.clone(),
        project_id: project,
    });

    // Sse sets the content type and `Cache-Control: no-cache`.
    let body = Sse::new(event_stream(operator.clone(), connection, receiver));
    Ok((
        [
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Cache-Control"),
        ],
        body,
    )
        .into_response())
}

/// Current resources of a project.
async fn list_resources(
    State(operator): State<Arc<SseOperator>>,
    Query(params): Query<StreamParams>,
) -> Result<Json<Vec<Resource>>, ApiError> {
    let project = operator.authenticate(&params).await?;
    let persister = operator
        .persister
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("no persister attached".to_string()))?;

    let mut query = ResourceQuery::project(project);
    if let Some(group) = params.group.filter(|g| !g.is_empty()) {
        query = query.in_group(group);
    }
    Ok(Json(persister.list(&query).await?))
}

/// Hub statistics.
async fn get_stats(State(operator): State<Arc<SseOperator>>) -> Json<HubStats> {
    Json(operator.hub.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sentinel_auth::{AuthError, StaticApiKeys};
    use sentinel_storage::{MemoryPersister, Persister};
    use sentinel_types::ResourceType;
    use tower::ServiceExt;

    fn operator() -> Arc<SseOperator> {
        Arc::new(
            SseOperator::new("/events")
                .with_verifier(StaticApiKeys::new().with_key("proj-1", "key-1")),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn next_chunk(body: &mut axum::body::BodyDataStream) -> String {
        use futures::StreamExt;
        let chunk = body.next().await.unwrap().unwrap();
        String::from_utf8(chunk.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_apikey_is_rejected() {
        let operator = operator();
        let app = operator.clone().router();

        let response = app.oneshot(get("/events?apikey=&project=proj-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(operator.hub().total_count(), 0);
        assert_eq!(operator.hub().stats().total_connections, 0);
    }

    #[tokio::test]
    async fn test_missing_params_are_rejected() {
        let operator = operator();
        let response = operator.clone().router().oneshot(get("/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(operator.hub().total_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_apikey_is_rejected() {
        let operator = operator();
        let response = operator
            .clone()
            .router()
            .oneshot(get("/events?apikey=nope&project=proj-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(operator.hub().total_count(), 0);
    }

    #[tokio::test]
    async fn test_default_verifier_rejects() {
        let operator = Arc::new(SseOperator::default());
        let response = operator
            .clone()
            .router()
            .oneshot(get("/events?apikey=k&project=p"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_closure_verifier() {
        let operator = Arc::new(SseOperator::default().with_verifier(
            |apikey: &str, _project: &str| -> sentinel_auth::Result<()> {
                if apikey == "secret" {
                    Ok(())
                } else {
                    Err(AuthError::Unauthorized("bad key".into()))
                }
            },
        ));

        let response = operator
            .clone()
            .router()
            .oneshot(get("/events?apikey=secret&project=p"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_accepted_stream_headers_and_registration() {
        let operator = operator();
        let response = operator
            .clone()
            .router()
            .oneshot(get("/events?apikey=key-1&project=proj-1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(operator.hub().count("proj-1"), 1);

        // Dropping the body tears the connection down.
        drop(response);
        assert_eq!(operator.hub().total_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_body_frames() {
        use sentinel_realtime::HubConfig;
        use sentinel_types::wire::{
            connected_payload, decode_payload, encode_changed_payload, Payload,
        };
        use sentinel_types::{Action, ChangedEvent};
        use std::time::Duration;

        let operator = Arc::new(
            SseOperator::new("/events")
                .with_hub_config(
                    HubConfig::default().with_keepalive_interval(Duration::from_millis(50)),
                )
                .with_verifier(StaticApiKeys::new().with_key("proj-1", "key-1")),
        );
        let response = operator
            .clone()
            .router()
            .oneshot(get("/events?apikey=key-1&project=proj-1"))
            .await
            .unwrap();
        let mut body = response.into_body().into_data_stream();

        let handshake = next_chunk(&mut body).await;
        let data = handshake
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        let Payload::Connected { id } = decode_payload("", data).unwrap() else {
            panic!("expected handshake, got {handshake:?}");
        };
        assert_eq!(data, connected_payload(&id));

        let event = ChangedEvent::new(
            Action::Create,
            Resource::new("proj-1", "r1", ResourceType::Text, b"x".to_vec()),
        );
        operator.broadcast(&event).await.unwrap();
        assert_eq!(
            next_chunk(&mut body).await,
            format!("data: {}\n\n", encode_changed_payload(&event).unwrap())
        );

        assert_eq!(next_chunk(&mut body).await, ": keepalive\n\n");
    }

    #[tokio::test]
    async fn test_stats_route() {
        let operator = operator();
        let (_c, _rx) = operator.hub().connect("proj-1");

        let response = operator.clone().router().oneshot(get("/events/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let stats: HubStats = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats.current_connections, 1);
        assert_eq!(stats.projects, 1);
    }

    #[tokio::test]
    async fn test_resources_without_persister() {
        let response = operator()
            .router()
            .oneshot(get("/events/resources?apikey=key-1&project=proj-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resources_snapshot() {
        let persister = Arc::new(MemoryPersister::new());
        persister
            .save(Resource::new("proj-1", "r1", ResourceType::Text, b"a".to_vec()))
            .await
            .unwrap();
        persister
            .save(Resource::new("proj-1", "r2", ResourceType::Text, b"b".to_vec()).with_group("g"))
            .await
            .unwrap();
        persister
            .save(Resource::new("proj-2", "r3", ResourceType::Text, Vec::new()))
            .await
            .unwrap();

        let operator = Arc::new(
            SseOperator::new("/events")
                .with_verifier(StaticApiKeys::new().with_key("proj-1", "key-1"))
                .with_persister(persister),
        );

        let response = operator
            .clone()
            .router()
            .oneshot(get("/events/resources?apikey=key-1&project=proj-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let resources: Vec<Resource> = serde_json::from_slice(&body).unwrap();
        assert_eq!(resources.len(), 2);

        let response = operator
            .router()
            .oneshot(get("/events/resources?apikey=key-1&project=proj-1&group=g"))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let resources: Vec<Resource> = serde_json::from_slice(&body).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].resource_id, "r2");
    }
}

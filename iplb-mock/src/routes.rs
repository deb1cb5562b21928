//! HTTP handlers for `/ipLoadbalancing/{service}/http/frontend`.

use axum::{
    Json,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, info};

use crate::state::{Frontend, FrontendInput, MockError, MockState};

/// Error body, shaped like the real API's.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
    class: &'static str,
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            class: self.class(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Count every request and answer with an injected failure when one is queued.
pub async fn inject_faults(State(state): State<MockState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if let Some(err) = state.record_request(&method, &path).await {
        info!(%method, %path, status = err.status.as_u16(), "Injecting failure");
        return err.into_response();
    }
    debug!(%method, %path, "Request");
    next.run(req).await
}

pub async fn list_frontends(
    State(state): State<MockState>,
    Path(service): Path<String>,
) -> Result<Json<Vec<i64>>, MockError> {
    state.list(&service).await.map(Json)
}

pub async fn get_frontend(
    State(state): State<MockState>,
    Path((service, id)): Path<(String, i64)>,
) -> Result<Json<Frontend>, MockError> {
    state.get(&service, id).await.map(Json)
}

pub async fn create_frontend(
    State(state): State<MockState>,
    Path(service): Path<String>,
    Json(input): Json<FrontendInput>,
) -> Result<Json<Frontend>, MockError> {
    let frontend = state.create(&service, input).await?;
    info!(%service, frontend_id = frontend.frontend_id, port = %frontend.port, "Created frontend");
    Ok(Json(frontend))
}

pub async fn update_frontend(
    State(state): State<MockState>,
    Path((service, id)): Path<(String, i64)>,
    Json(input): Json<FrontendInput>,
) -> Result<StatusCode, MockError> {
    state.replace(&service, id, input).await?;
    info!(%service, frontend_id = id, "Replaced frontend");
    Ok(StatusCode::OK)
}

pub async fn delete_frontend(
    State(state): State<MockState>,
    Path((service, id)): Path<(String, i64)>,
) -> Result<StatusCode, MockError> {
    state.delete(&service, id).await?;
    info!(%service, frontend_id = id, "Deleted frontend");
    Ok(StatusCode::OK)
}

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use controller::ControllerEvent;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        CatalogSummary, ChartKind, ChartSpec, DashboardEvent, Publication, SelectionOutcome,
        SelectionRequest, StatusSummary,
    },
};
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::WatchStream;
use tower_http::limit::RequestBodyLimitLayer;

use crate::app_state::AppState;

const MAX_REQUEST_BODY_BYTES: usize = 4 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SelectionResponse {
    pub(crate) species: String,
    pub(crate) outcome: SelectionOutcome,
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/catalog", get(http_catalog))
        .route("/charts", get(http_charts))
        .route("/charts/:kind", get(http_chart))
        .route("/status", get(http_status))
        .route("/selection", post(http_select))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_catalog(State(state): State<Arc<AppState>>) -> Json<CatalogSummary> {
    Json(state.controller.catalog().summary())
}

async fn http_charts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Publication>> {
    let publication = current_publication(&state)?;
    Ok(Json(publication.as_ref().clone()))
}

async fn http_chart(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> ApiResult<Json<ChartSpec>> {
    let kind = parse_chart_kind(&kind)?;
    let publication = current_publication(&state)?;
    Ok(Json(publication.charts.spec(kind)))
}

async fn http_status(State(state): State<Arc<AppState>>) -> Json<StatusSummary> {
    Json(state.controller.status().await)
}

async fn http_select(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectionRequest>,
) -> ApiResult<(StatusCode, Json<SelectionResponse>)> {
    if !state.controller.catalog().contains_species(&req.species) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            format!("unknown species '{}'", req.species),
        ));
    }

    let outcome = state.controller.select(req.species.clone()).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(SelectionResponse {
            species: req.species,
            outcome,
        }),
    ))
}

fn parse_chart_kind(raw: &str) -> ApiResult<ChartKind> {
    match raw {
        "city" => Ok(ChartKind::City),
        "boroughs" => Ok(ChartKind::Boroughs),
        "steward" => Ok(ChartKind::Steward),
        other => Err(api_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            format!("unknown chart '{other}'; expected city, boroughs or steward"),
        )),
    }
}

fn current_publication(state: &AppState) -> ApiResult<Arc<Publication>> {
    state.controller.current().ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            "no charts have been published yet",
        )
    })
}

fn api_error(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError::new(code, message)))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let mut publications = WatchStream::new(state.controller.subscribe());
    let mut events = state.controller.subscribe_events();

    let send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                Some(publication) = publications.next() => match publication {
                    Some(publication) => DashboardEvent::Published {
                        publication: publication.as_ref().clone(),
                    },
                    None => continue,
                },
                event = events.recv() => match event {
                    Ok(ControllerEvent::Failed { species, error }) => {
                        DashboardEvent::Failed { species, error }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                else => break,
            };

            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use pdf_rag_core::{Embedder, QueryRequest, QueryResponse, QueryService, VectorIndex};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

pub fn router<E, V>(service: QueryService<E, V>) -> Router
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/query", post(query_handler::<E, V>))
        .with_state(service)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn query_handler<E, V>(
    State(service): State<QueryService<E, V>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<ErrorBody>)>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
{
    debug!(question = %request.question, "query");
    let response = service.answer(&request.question).await.map_err(|err| {
        error!(error = %err, "query failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;

    Ok(Json(response))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

//! The answer service: an HTTP endpoint that forwards a profile plus a
//! field list to the model and returns its flat answer map.

pub mod model;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::Result;
use crate::fields::FillRequest;

pub use model::{build_prompt, AnswerGenerator, AnthropicGenerator};

/// Shared state for the answer service.
pub struct AppState {
    generator: Arc<dyn AnswerGenerator>,
    /// When set, requests must carry `Authorization: Bearer <secret>`.
    /// Unset disables the check entirely.
    secret: Option<String>,
}

impl AppState {
    pub fn new(generator: Arc<dyn AnswerGenerator>, secret: Option<String>) -> Self {
        Self { generator, secret }
    }
}

/// Create the Axum router for the answer service.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/fill", post(fill_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

/// `POST /api/fill`: authorize, delegate to the model, return its map.
///
/// Authorization is checked before anything else so an unauthorized caller
/// never triggers a model call. Model failures are not recovered here;
/// they surface as 502 with the error text.
async fn fill_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Json<FillRequest>,
) -> Response {
    if let Some(ref secret) = state.secret {
        let expected = format!("Bearer {secret}");
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response();
        }
    }

    let Json(request) = body;
    match state.generator.generate(&request).await {
        Ok(answers) => {
            info!(
                fields = request.form_fields.len(),
                answers = answers.len(),
                "fill request served"
            );
            Json(answers).into_response()
        }
        Err(e) => {
            error!("answer generation failed: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Answer service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// The answer service server.
pub struct FillServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl FillServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Bind and serve until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self.addr().parse().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad listen address: {e}"))
        })?;
        let listener = TcpListener::bind(addr).await?;

        info!("answer service listening on {addr}");
        axum::serve(listener, app).await?;

        Ok(())
    }
}

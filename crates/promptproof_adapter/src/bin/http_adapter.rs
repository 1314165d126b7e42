#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use promptproof_adapter::{
    AdapterErrorResponse, AdapterFailure, AdapterRuntime, GenerateAdapterRequest,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("PROMPTPROOF_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime = Arc::new(Mutex::new(AdapterRuntime::default_from_env()?));
    let app = Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/receipts/:id", get(get_receipt))
        .with_state(runtime);

    println!("promptproof_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(runtime): State<Arc<Mutex<AdapterRuntime>>>) -> Response {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return poisoned_lock_response(),
    };
    (StatusCode::OK, Json(runtime.health_report())).into_response()
}

async fn generate(
    State(runtime): State<Arc<Mutex<AdapterRuntime>>>,
    Json(request): Json<GenerateAdapterRequest>,
) -> Response {
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return poisoned_lock_response(),
    };
    match runtime.handle_generate(request) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(failure) => failure_response(failure),
    }
}

async fn get_receipt(
    State(runtime): State<Arc<Mutex<AdapterRuntime>>>,
    Path(id): Path<u64>,
) -> Response {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return poisoned_lock_response(),
    };
    match runtime.handle_get_receipt(id) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(failure) => failure_response(failure),
    }
}

fn failure_response(failure: AdapterFailure) -> Response {
    let status = match &failure {
        AdapterFailure::NotFound(_) => StatusCode::NOT_FOUND,
        AdapterFailure::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(AdapterErrorResponse {
            error: failure.message().to_string(),
        }),
    )
        .into_response()
}

fn poisoned_lock_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AdapterErrorResponse {
            error: "adapter runtime lock poisoned".to_string(),
        }),
    )
        .into_response()
}

//! HTTP inference server
//!
//! A small axum service over the local adapter backend. A bad request
//! gets a 400 with an error body; a model failure gets a 500; neither
//! ever takes the process down.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use haetae_backends::LocalAdapterBackend;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

pub fn create_router(backend: Arc<LocalAdapterBackend>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/predict", post(predict))
        .with_state(backend)
}

/// Bind and serve until ctrl-c or SIGTERM
pub async fn run(addr: SocketAddr, backend: Arc<LocalAdapterBackend>) -> anyhow::Result<()> {
    let app = create_router(backend);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Inference server listening on http://{addr}");

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    #[serde(default)]
    text: Option<String>,
}

async fn predict(
    State(backend): State<Arc<LocalAdapterBackend>>,
    Json(request): Json<PredictRequest>,
) -> Response {
    let text = match request.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "request must include a non-empty 'text' field" })),
            )
                .into_response();
        }
    };

    match backend.probabilities(text) {
        Ok((not_hate, hate)) => {
            let is_hate = u8::from(hate > not_hate);
            Json(json!({
                "is_hate": is_hate,
                "probability": { "not_hate": not_hate, "hate": hate },
            }))
            .into_response()
        }
        Err(err) => {
            error!(%err, "prediction failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};
    use haetae_model::{Backbone, BackboneConfig, LoraConfig, TextEncoder};
    use std::collections::HashMap;
    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::Tokenizer;
    use tower::ServiceExt;

    fn tiny_router() -> Router {
        let device = Device::Cpu;
        let config: BackboneConfig = serde_json::from_str(
            r#"{ "vocab_size": 16, "hidden_size": 8, "num_hidden_layers": 1,
                 "num_attention_heads": 2, "intermediate_size": 16,
                 "max_position_embeddings": 32, "type_vocab_size": 2 }"#,
        )
        .unwrap();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let mut backbone =
            Backbone::from_varbuilder("test/backbone", config, &vb, &device).unwrap();
        backbone
            .attach_adapters(&LoraConfig::default(), &vb)
            .unwrap();

        let mut vocab = HashMap::new();
        vocab.insert("[UNK]".to_string(), 0u32);
        for (i, word) in ["hello", "world", "bad"].iter().enumerate() {
            vocab.insert(word.to_string(), (i + 1) as u32);
        }
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("[UNK]".to_string())
            .build()
            .unwrap();
        let mut tokenizer = Tokenizer::new(model);
        tokenizer.with_pre_tokenizer(Some(tokenizers::pre_tokenizers::whitespace::Whitespace {}));

        let backend =
            LocalAdapterBackend::new(backbone, TextEncoder::new(tokenizer, 16, &device)).unwrap();
        create_router(Arc::new(backend))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn predict_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = tiny_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_predict_returns_verdict_and_probabilities() {
        let response = tiny_router()
            .oneshot(predict_request(r#"{ "text": "hello bad world" }"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let is_hate = json["is_hate"].as_u64().unwrap();
        assert!(is_hate == 0 || is_hate == 1);

        let not_hate = json["probability"]["not_hate"].as_f64().unwrap();
        let hate = json["probability"]["hate"].as_f64().unwrap();
        assert!((not_hate + hate - 1.0).abs() < 1e-4);
        assert_eq!(is_hate == 1, hate > not_hate);
    }

    #[tokio::test]
    async fn test_missing_text_is_bad_request() {
        for body in [r#"{}"#, r#"{ "text": "" }"#, r#"{ "text": "   " }"#] {
            let response = tiny_router().oneshot(predict_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let json = body_json(response).await;
            assert!(json["error"].is_string());
        }
    }
}

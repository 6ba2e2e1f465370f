//! HTTP API server.
//!
//! `POST /process` takes a multipart upload (`file` plus an `instruction`
//! form field) and returns the agent's result as JSON.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::MediaError;
use crate::handler::{ErrorResponse, ProcessResponse, RequestHandler, StagedUpload};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Serve)?;
    for program in preflight::missing_programs(&settings) {
        Output::warning(&format!("{} not found; tools that need it will fail", program));
    }

    let handler = Arc::new(RequestHandler::from_settings(&settings)?);
    let app = router(handler, settings.server.max_upload_bytes);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Smart Media API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Process", "POST /process (multipart: file, instruction)");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(handler: Arc<RequestHandler>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/process", post(process))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(handler)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn process(State(handler): State<Arc<RequestHandler>>, multipart: Multipart) -> Response {
    let span = info_span!("request", id = %Uuid::new_v4());

    async move {
        match process_upload(&handler, multipart).await {
            Ok(response) => {
                info!("Request finished with {:?}", response.status);
                Json(response).into_response()
            }
            Err(e) => {
                error!("Error processing request: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new(e.to_string())),
                )
                    .into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Pull the file and instruction out of the form and run the handler.
///
/// The file field is streamed into staging chunk by chunk.
async fn process_upload(
    handler: &RequestHandler,
    mut multipart: Multipart,
) -> Result<ProcessResponse, MediaError> {
    let mut staged: Option<StagedUpload> = None;
    let mut instruction: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(bad_upload)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                // A repeated field replaces the earlier upload
                drop(staged.take());
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mut upload = handler.begin_upload(&file_name).await?;
                while let Some(chunk) = field.chunk().await.map_err(bad_upload)? {
                    upload.write(&chunk).await?;
                }
                staged = Some(upload.finish().await?);
            }
            "instruction" => {
                instruction = Some(field.text().await.map_err(bad_upload)?);
            }
            _ => {}
        }
    }

    let staged =
        staged.ok_or_else(|| MediaError::InvalidInput("Missing form field: file".to_string()))?;
    let instruction = instruction
        .ok_or_else(|| MediaError::InvalidInput("Missing form field: instruction".to_string()))?;

    Ok(handler.process(staged, &instruction).await)
}

fn bad_upload(e: axum::extract::multipart::MultipartError) -> MediaError {
    MediaError::InvalidInput(format!("Malformed upload: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentLoop, ScriptedDispatcher};
    use crate::tools::ToolCatalog;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    const BOUNDARY: &str = "smartmedia-test-boundary";

    fn app(replies: Vec<crate::error::Result<crate::agent::ModelReply>>) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.temp_dir = dir.path().join("temp").display().to_string();
        settings.general.output_dir = dir.path().join("output").display().to_string();

        let catalog = Arc::new(ToolCatalog::new(vec![]).unwrap());
        let agent = AgentLoop::new(
            Arc::new(ScriptedDispatcher::new(replies)),
            catalog,
            &settings.agent,
        );
        let handler = Arc::new(RequestHandler::new(agent, &settings));
        (router(handler, 1024 * 1024), dir)
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match file_name {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    name, f
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    fn process_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/process")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = app(vec![]);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_process_returns_five_keys() {
        let (app, _dir) = app(vec![ScriptedDispatcher::answer("It is a text file.")]);
        let body = multipart_body(&[
            ("file", Some("notes.txt"), "hello"),
            ("instruction", None, "what is this?"),
        ]);

        let response = app.oneshot(process_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["instruction"], "what is this?");
        assert_eq!(json["file_type"], "text/plain");
        assert_eq!(json["result"], "It is a text file.");
        assert_eq!(json["message"], "");
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_agent_error_is_still_200() {
        let (app, _dir) = app(vec![Err(MediaError::OpenAI("rate limited".into()))]);
        let body = multipart_body(&[
            ("file", Some("clip.mp4"), ""),
            ("instruction", None, "compress"),
        ]);

        let response = app.oneshot(process_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["file_type"], "video/mp4");
        assert!(json["message"].as_str().unwrap().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_truncated_upload_leaves_nothing_staged() {
        let (app, dir) = app(vec![]);
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"big.bin\"\r\n\r\n",
            BOUNDARY
        );
        body.push_str(&"x".repeat(64 * 1024));

        let response = app.oneshot(process_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["status"], "error");
        assert!(!dir.path().join("temp").join("big.bin").exists());
    }

    #[tokio::test]
    async fn test_missing_instruction_is_500() {
        let (app, _dir) = app(vec![]);
        let body = multipart_body(&[("file", Some("photo.png"), "data")]);

        let response = app.oneshot(process_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = json_body(response).await;
        assert_eq!(json["status"], "error");
        assert!(json["message"].as_str().unwrap().contains("instruction"));
        assert_eq!(json.as_object().unwrap().len(), 2);
    }
}

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::{json, Value};

use neon_eraser::{EditService, Error, GeminiClient, ImageSource, ServiceConfig, StateKind, Workflow};

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    api_key: Option<String>,
    body: Value,
}

/// In-process stand-in for the Gemini REST endpoint.
#[derive(Clone)]
struct FakeGemini {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<Captured>>>,
}

impl FakeGemini {
    fn new(status: StatusCode, reply: Value) -> Self {
        Self {
            status,
            reply,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn seen(&self) -> Vec<Captured> {
        self.seen.lock().unwrap().clone()
    }
}

async fn generate(
    State(fake): State<FakeGemini>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    fake.seen.lock().unwrap().push(Captured {
        path: uri.path().to_string(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    (fake.status, Json(fake.reply.clone()))
}

async fn serve(fake: FakeGemini) -> String {
    let app = Router::new().fallback(generate).with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client_for(endpoint: String) -> GeminiClient {
    GeminiClient::new(ServiceConfig {
        api_key: Some("test-key".to_string()),
        model: "test-model".to_string(),
        endpoint,
    })
}

fn image_reply(data: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "parts": [
                    { "text": "Done." },
                    { "inlineData": { "mimeType": "image/jpeg", "data": data } }
                ]
            },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn sends_stripped_payload_with_instruction() {
    let fake = FakeGemini::new(StatusCode::OK, image_reply("RURJVEVE"));
    let client = client_for(serve(fake.clone()).await);

    let result = client
        .remove_watermark("data:image/jpeg;base64,QUJD", "on the left side")
        .await
        .unwrap();
    assert_eq!(result, "data:image/png;base64,RURJVEVE");

    let seen = fake.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/v1beta/models/test-model:generateContent");
    assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));

    let parts = &seen[0].body["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
    let text = parts[1]["text"].as_str().unwrap();
    assert!(text.contains("located on the left side."));
    assert!(text.ends_with("Return ONLY the edited image."));
}

#[tokio::test]
async fn text_only_reply_is_no_image_returned() {
    let reply = json!({
        "candidates": [{ "content": { "parts": [{ "text": "I can't edit this." }] } }]
    });
    let client = client_for(serve(FakeGemini::new(StatusCode::OK, reply)).await);

    let err = client
        .remove_watermark("QUJD", "in the center")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoImageReturned));
}

#[tokio::test]
async fn server_error_is_request_failed() {
    let reply = json!({ "error": { "code": 500, "message": "internal" } });
    let client = client_for(serve(FakeGemini::new(StatusCode::INTERNAL_SERVER_ERROR, reply)).await);

    let err = client
        .remove_watermark("QUJD", "in the center")
        .await
        .unwrap_err();
    match err {
        Error::RequestFailed(msg) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("internal"));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_request_failed() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{addr}"));
    let err = client
        .remove_watermark("QUJD", "in the center")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RequestFailed(_)));
}

#[tokio::test]
async fn workflow_completes_against_http_service() {
    let fake = FakeGemini::new(StatusCode::OK, image_reply("AAAA"));
    let client = client_for(serve(fake.clone()).await);

    let mut png = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::new(16, 16))
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let mut wf = Workflow::new();
    wf.select_file(ImageSource::Bytes {
        name: "small.png".to_string(),
        bytes: png.into_inner(),
    })
    .await;
    wf.process(&client).await;

    assert_eq!(wf.kind(), StateKind::Complete);
    assert_eq!(wf.download().unwrap().data_uri, "data:image/png;base64,AAAA");

    let seen = fake.seen();
    assert_eq!(seen[0].body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
}

//! HTTP API integration tests

#[path = "../common/mod.rs"]
mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{fast_session_config, MockApi};
use sd_studio::api::routes::create_router;
use sd_studio::config::Settings;
use sd_studio::history::{HistoryRecord, MemoryStorage};
use sd_studio::AppState;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> (Arc<MockApi>, Arc<AppState>, Router) {
    let api = Arc::new(MockApi::new());
    let settings = Settings {
        session: fast_session_config(),
        ..Settings::default()
    };
    let state = Arc::new(AppState::new(
        settings,
        api.clone(),
        Arc::new(MemoryStorage::new()),
    ));
    let router = create_router(state.clone());
    (api, state, router)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(router, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_reports_upstream() {
    let (_api, _state, router) = test_app();

    let (status, body) = send_json(&router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["upstream"]["reachable"], true);
    assert_eq!(body["upstream"]["base_url"], "http://127.0.0.1:7860");
}

#[tokio::test]
async fn test_generate_returns_records_and_session() {
    let (api, state, router) = test_app();

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/api/generate",
        Some(json!({ "prompt": "a cat", "negative_prompt": "blurry", "steps": 25 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
    assert_eq!(body["images"][0]["prompt"], "a cat");
    assert_eq!(body["images"][0]["negativePrompt"], "blurry");
    assert!(body["images"][0]["formattedTimestamp"].is_string());
    assert_eq!(body["session"]["state"], "settled");
    assert_eq!(body["session"]["outcome"], "success");
    assert_eq!(api.last_request().unwrap().steps, 25);
    assert_eq!(state.history.len(), 1);
}

#[tokio::test]
async fn test_generate_with_blank_prompt_is_bad_request() {
    let (api, _state, router) = test_app();

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/api/generate",
        Some(json!({ "prompt": "  " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
    assert_eq!(body["error"]["message"], "Please enter a prompt");
    assert_eq!(api.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_generate_out_of_range_is_bad_request() {
    let (_api, _state, router) = test_app();

    let (status, _body) = send_json(
        &router,
        Method::POST,
        "/api/generate",
        Some(json!({ "prompt": "a cat", "steps": 500 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_upstream_failure_is_bad_gateway() {
    let (api, _state, router) = test_app();
    api.fail_generate("CUDA out of memory");

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/api/generate",
        Some(json!({ "prompt": "a cat" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["message"], "CUDA out of memory");

    let (_, session) = send_json(&router, Method::GET, "/api/session", None).await;
    assert_eq!(session["outcome"], "failure");
    assert_eq!(session["message"], "Failed to generate image: CUDA out of memory");
}

#[tokio::test]
async fn test_idle_session_and_interrupt() {
    let (api, _state, router) = test_app();

    let (status, body) = send_json(&router, Method::GET, "/api/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");

    let (status, body) = send_json(&router, Method::POST, "/api/interrupt", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(api.interrupt_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_catalog_degrades_on_failed_queries() {
    let (api, state, router) = test_app();
    api.set_samplers(Some(vec!["DPM++ 2M Karras", "Euler a"]));

    let (status, body) = send_json(&router, Method::GET, "/api/catalog", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["samplers"].as_array().unwrap().len(), 2);
    assert_eq!(body["models"][0]["model_name"], "sd_xl_base_1.0");
    assert_eq!(body["loras"], json!([]));
    assert_eq!(body["default_sampler"], "DPM++ 2M Karras");
    assert_eq!(body["default_model"], "sd_xl_base_1.0");
    assert_eq!(state.session.default_sampler(), "DPM++ 2M Karras");
}

#[tokio::test]
async fn test_presets_and_seed() {
    let (_api, _state, router) = test_app();

    let (_, presets) = send_json(&router, Method::GET, "/api/presets", None).await;
    let presets = presets.as_array().unwrap();
    assert_eq!(presets.len(), 8);
    assert_eq!(presets[0]["width"], 512);

    let (_, body) = send_json(&router, Method::GET, "/api/seed", None).await;
    let seed = body["seed"].as_i64().unwrap();
    assert!((0..=2_147_483_647).contains(&seed));
}

#[tokio::test]
async fn test_history_endpoints() {
    let (_api, state, router) = test_app();
    send(
        &router,
        Method::POST,
        "/api/generate",
        Some(json!({ "prompt": "a cat", "negative_prompt": "dogs" })),
    )
    .await;
    let id = state.history.list()[0].id.clone();

    let (status, body) = send_json(&router, Method::GET, "/api/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["images"][0]["id"], id.as_str());

    let (status, body) = send_json(&router, Method::GET, &format!("/api/history/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prompt"], "a cat");
    assert_eq!(body["negativePrompt"], "dogs");

    let (status, text) = send(&router, Method::GET, &format!("/api/history/{}/prompt", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(text).unwrap(),
        "a cat\n\nNegative prompt: dogs"
    );

    let (_, stats) = send_json(&router, Method::GET, "/api/stats", None).await;
    assert_eq!(stats["total_images"], 1);
    assert!(stats["newest_image"].is_string());

    let (status, body) = send_json(&router, Method::DELETE, &format!("/api/history/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(state.history.is_empty());

    // Removing again is still a success
    let (status, body) = send_json(&router, Method::DELETE, &format!("/api/history/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_download_image_sets_attachment_headers() {
    let (_api, state, router) = test_app();
    send(&router, Method::POST, "/api/generate", Some(json!({ "prompt": "a cat" }))).await;
    let id = state.history.list()[0].id.clone();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/history/{}/image", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"sd_image_{}.png\"", id).as_str()
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello");
}

#[tokio::test]
async fn test_history_bodies_carry_display_fields() {
    let (_api, state, router) = test_app();
    state.history.add(HistoryRecord {
        id: "img_1700000000000_abcdefghi".to_string(),
        url: format!("data:image/png;base64,{}", "A".repeat(4096)),
        prompt: "a lighthouse".to_string(),
        negative_prompt: None,
        timestamp: 1_700_000_000_000,
        parameters: None,
        info: None,
    });

    let (_, body) = send_json(&router, Method::GET, "/api/history", None).await;
    let image = &body["images"][0];
    assert_eq!(image["id"], "img_1700000000000_abcdefghi");
    assert_eq!(image["formattedTimestamp"], "14/11/2023 22:13");
    assert_eq!(image["estimatedSizeKb"], 3);

    let (status, image) = send_json(
        &router,
        Method::GET,
        "/api/history/img_1700000000000_abcdefghi",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(image["timestamp"], 1_700_000_000_000i64);
    assert_eq!(image["formattedTimestamp"], "14/11/2023 22:13");
    assert_eq!(image["estimatedSizeKb"], 3);
}

#[tokio::test]
async fn test_corrupt_stored_image_is_server_error() {
    let (_api, state, router) = test_app();
    state.history.add(HistoryRecord {
        id: "img_broken".to_string(),
        url: "data:image/png;base64,not*base64".to_string(),
        prompt: "a cat".to_string(),
        negative_prompt: None,
        timestamp: 1_700_000_000_000,
        parameters: None,
        info: None,
    });

    let (status, body) = send_json(&router, Method::GET, "/api/history/img_broken/image", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "persistence_error");
}

#[tokio::test]
async fn test_unknown_image_is_not_found() {
    let (_api, _state, router) = test_app();

    let (status, body) = send_json(&router, Method::GET, "/api/history/img_missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");

    let (status, _) = send(&router, Method::GET, "/api/history/img_missing/image", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_history() {
    let (_api, state, router) = test_app();
    send(&router, Method::POST, "/api/generate", Some(json!({ "prompt": "a cat" }))).await;
    assert_eq!(state.history.len(), 1);

    let (status, body) = send_json(&router, Method::DELETE, "/api/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, stats) = send_json(&router, Method::GET, "/api/stats", None).await;
    assert_eq!(stats["total_images"], 0);
    assert!(stats["oldest_image"].is_null());
}

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use emotion_ai_server::pipeline::ClassifierSelection;

use crate::common::fixtures::png_base64;
use crate::common::{spawn_app, FailingClassifier, TEST_BODY_LIMIT};

async fn assert_no_image(resp: reqwest::Response) {
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No image provided");
}

async fn assert_server_error(resp: reqwest::Response) -> String {
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap().to_string();
    assert!(!error.is_empty());
    error
}

#[tokio::test]
async fn test_missing_image_field() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let resp = client
        .post("/api/analyze-emotion", &serde_json::json!({ "picture": "abc" }))
        .await
        .unwrap();
    assert_no_image(resp).await;
}

#[tokio::test]
async fn test_null_image_field() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let resp = client
        .post("/api/analyze-emotion", &serde_json::json!({ "image": null }))
        .await
        .unwrap();
    assert_no_image(resp).await;
}

#[tokio::test]
async fn test_empty_body() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let resp = client.post_raw("/api/analyze-emotion", None, Vec::new()).await.unwrap();
    assert_no_image(resp).await;
}

#[tokio::test]
async fn test_non_json_body() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let resp = client
        .post_raw("/api/analyze-emotion", Some("application/json"), b"{not json".to_vec())
        .await
        .unwrap();
    assert_no_image(resp).await;

    let resp = client
        .post_raw("/api/analyze-emotion", Some("text/plain"), b"image=abc".to_vec())
        .await
        .unwrap();
    assert_no_image(resp).await;
}

#[tokio::test]
async fn test_non_string_image_is_500() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let images = [
        serde_json::json!(123),
        serde_json::json!(["abc"]),
        serde_json::json!({ "data": "abc" }),
        serde_json::json!(true),
    ];
    for image in images {
        let resp = client
            .post("/api/analyze-emotion", &serde_json::json!({ "image": image }))
            .await
            .unwrap();
        let error = assert_server_error(resp).await;
        assert_eq!(error, "image must be a base64 string");
    }
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let oversized = "A".repeat(TEST_BODY_LIMIT * 2);
    let resp = client.analyze(&oversized).await.unwrap();
    assert_eq!(resp.status(), 413);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("length limit"), "unexpected body: {}", body);

    // Normal-sized payloads are unaffected.
    let resp = client.analyze(&png_base64(4, 4)).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_malformed_base64() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let resp = client.analyze("this is *not* base64!").await.unwrap();
    let error = assert_server_error(resp).await;
    assert!(error.contains("base64"), "unexpected error: {}", error);
}

#[tokio::test]
async fn test_valid_base64_that_is_not_an_image() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let payload = general_purpose::STANDARD.encode(b"NOT AN IMAGE FILE");
    let resp = client.analyze(&payload).await.unwrap();
    assert_server_error(resp).await;
}

#[tokio::test]
async fn test_empty_image_string() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let resp = client.analyze("").await.unwrap();
    assert_server_error(resp).await;
}

#[tokio::test]
async fn test_classifier_failure_is_500() {
    let client = spawn_app(ClassifierSelection::model(Arc::new(FailingClassifier))).await;
    let resp = client.analyze(&png_base64(4, 4)).await.unwrap();
    let error = assert_server_error(resp).await;
    assert_eq!(error, "inference backend exploded");
}

#[tokio::test]
async fn test_errors_do_not_poison_the_server() {
    let client = spawn_app(ClassifierSelection::fallback()).await;
    let resp = client.analyze("%%%").await.unwrap();
    assert_eq!(resp.status(), 500);
    let resp = client.analyze(&png_base64(4, 4)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let resp = client.get("/api/health").await.unwrap();
    assert_eq!(resp.status(), 200);
}

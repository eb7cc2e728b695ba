use std::sync::Arc;

use emotion_ai_server::pipeline::fallback::{RandomClassifier, FALLBACK_EMOTIONS};
use emotion_ai_server::pipeline::ClassifierSelection;

use crate::common::fixtures::{data_uri, jpeg_base64, png_base64};
use crate::common::{analysis, spawn_app, FixedClassifier, RecordingClassifier};

#[tokio::test]
async fn test_analyze_with_model_backed_classifier() {
    let classifier = FixedClassifier {
        analyses: vec![analysis(
            &[("angry", 2.5), ("happy", 81.25), ("neutral", 10.0), ("sad", 6.25)],
            "happy",
        )],
    };
    let client = spawn_app(ClassifierSelection::model(Arc::new(classifier))).await;

    let resp = client.analyze(&png_base64(8, 8)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    let emotion = body["emotion"].as_str().unwrap();
    assert_eq!(emotion, "happy");
    let emotions = body["emotions"].as_object().unwrap();
    assert_eq!(emotions.len(), 4);
    let score = emotions[emotion].as_f64().unwrap();
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((confidence - score / 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_analyze_uses_first_face_record() {
    let classifier = FixedClassifier {
        analyses: vec![
            analysis(&[("sad", 70.0), ("neutral", 30.0)], "sad"),
            analysis(&[("happy", 99.0), ("neutral", 1.0)], "happy"),
        ],
    };
    let client = spawn_app(ClassifierSelection::model(Arc::new(classifier))).await;

    let body: serde_json::Value = client.analyze(&jpeg_base64(16, 16)).await.unwrap().json().await.unwrap();
    assert_eq!(body["emotion"], "sad");
    assert!((body["confidence"].as_f64().unwrap() - 0.7).abs() < 1e-9);
    assert!(body["emotions"].get("happy").is_none());
}

#[tokio::test]
async fn test_analyze_dominant_without_score_has_zero_confidence() {
    let classifier = FixedClassifier {
        analyses: vec![analysis(&[("happy", 60.0)], "surprise")],
    };
    let client = spawn_app(ClassifierSelection::model(Arc::new(classifier))).await;

    let resp = client.analyze(&png_base64(4, 4)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["emotion"], "surprise");
    assert_eq!(body["confidence"].as_f64().unwrap(), 0.0);
}

#[tokio::test]
async fn test_analyze_in_fallback_mode() {
    let client = spawn_app(ClassifierSelection::fallback()).await;

    for _ in 0..20 {
        let resp = client.analyze(&png_base64(8, 8)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        let emotion = body["emotion"].as_str().unwrap();
        assert!(FALLBACK_EMOTIONS.contains(&emotion), "unexpected label {}", emotion);
        let confidence = body["confidence"].as_f64().unwrap();
        assert!((0.6..=0.95).contains(&confidence), "confidence {} out of range", confidence);
        assert_eq!(body["emotions"], serde_json::json!({}));
    }
}

#[tokio::test]
async fn test_seeded_fallback_is_still_a_fallback() {
    let selection = ClassifierSelection {
        classifier: Arc::new(RandomClassifier::with_seed(3)),
        model_available: false,
    };
    let client = spawn_app(selection).await;

    let body: serde_json::Value = client.analyze(&png_base64(2, 2)).await.unwrap().json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["emotions"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_data_uri_decodes_like_bare_base64() {
    let recorder = Arc::new(RecordingClassifier::default());
    let client = spawn_app(ClassifierSelection::model(recorder.clone())).await;

    let bare = png_base64(12, 9);
    let resp = client.analyze(&bare).await.unwrap();
    assert_eq!(resp.status(), 200);
    let resp = client.analyze(&data_uri("image/png", &bare)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let seen = recorder.seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].dimensions(), (12, 9));
    assert_eq!(seen[0], seen[1]);
}

#[tokio::test]
async fn test_analyze_accepts_jpeg_data_uri() {
    let recorder = Arc::new(RecordingClassifier::default());
    let client = spawn_app(ClassifierSelection::model(recorder.clone())).await;

    let resp = client.analyze(&data_uri("image/jpeg", &jpeg_base64(32, 24))).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["emotion"], "neutral");
    assert_eq!(recorder.seen.lock()[0].dimensions(), (32, 24));
}
